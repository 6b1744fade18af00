use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::AttributePath;

use crate::resources::common::{
    api_error, configure_provider_data, not_configured, required_string, set_optional_string,
    set_string,
};

#[derive(Default)]
pub struct RegionDataSource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl RegionDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for RegionDataSource {
    fn type_name(&self) -> &str {
        "gcore_region"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Looks up a cloud region by its display name")
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Display name, e.g. Luxembourg-2")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("state", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("country", AttributeType::String)
                    .computed()
                    .build(),
            )
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadDataSourceResponse {
                state: request.config,
                diagnostics: vec![not_configured()],
                deferred: None,
            };
        };

        let name = match required_string(&request.config, "name") {
            Ok(name) => name,
            Err(diag) => {
                return ReadDataSourceResponse {
                    state: request.config,
                    diagnostics: vec![diag],
                    deferred: None,
                }
            }
        };

        let regions = match data.client.cloud().regions().await {
            Ok(regions) => regions,
            Err(e) => {
                return ReadDataSourceResponse {
                    state: request.config,
                    diagnostics: vec![api_error("Failed to list regions", &e)],
                    deferred: None,
                }
            }
        };

        let mut state = request.config.clone();
        let diagnostics = match regions.iter().find(|r| r.display_name == name) {
            Some(region) => {
                set_string(&mut state, "id", region.id.to_string());
                set_optional_string(&mut state, "state", region.state.clone());
                set_optional_string(&mut state, "country", region.country.clone());
                vec![]
            }
            None => vec![super::not_found(
                "Region",
                &name,
                regions.iter().map(|r| r.display_name.clone()),
            )
            .with_attribute(AttributePath::new("name"))],
        };

        ReadDataSourceResponse {
            state,
            diagnostics,
            deferred: None,
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for RegionDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        ConfigureDataSourceResponse {
            diagnostics: configure_provider_data(request.provider_data, &mut self.provider_data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::{provider_data, value};
    use mockito::Server;
    use tfplug::types::{ClientCapabilities, Dynamic};

    #[tokio::test]
    async fn finds_region_by_display_name() {
        let mut server = Server::new_async().await;
        let _list = server
            .mock("GET", "/v1/regions")
            .with_body(
                r#"{"count":2,"results":[
                    {"id":76,"display_name":"Luxembourg-2","keystone_name":"ED-10","state":"ACTIVE","country":"LU"},
                    {"id":38,"display_name":"Frankfurt","keystone_name":"ED-4","state":"ACTIVE","country":"DE"}]}"#,
            )
            .create_async()
            .await;

        let data_source = RegionDataSource {
            provider_data: Some(provider_data(&server.url())),
        };
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: "gcore_region".to_string(),
                    config: value(&[
                        ("name", Dynamic::from("Frankfurt")),
                        ("id", Dynamic::Unknown),
                        ("state", Dynamic::Unknown),
                        ("country", Dynamic::Unknown),
                    ]),
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(response.state.get_string(&AttributePath::new("id")).unwrap(), "38");
        assert_eq!(response.state.get_string(&AttributePath::new("country")).unwrap(), "DE");
    }
}
