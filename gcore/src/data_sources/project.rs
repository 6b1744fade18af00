use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, DynamicValue};

use crate::api::cloud::Project;
use crate::resources::common::{
    api_error, configure_provider_data, not_configured, required_string, set_bool, set_number,
    set_optional_string, set_string,
};

#[derive(Default)]
pub struct ProjectDataSource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl ProjectDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_project(state: &mut DynamicValue, project: &Project) {
    set_string(state, "id", project.id.to_string());
    if let Some(client_id) = project.client_id {
        set_number(state, "client_id", client_id);
    }
    set_optional_string(state, "state", project.state.clone());
    set_optional_string(state, "description", project.description.clone());
    set_bool(state, "is_default", project.is_default);
}

#[async_trait]
impl DataSource for ProjectDataSource {
    fn type_name(&self) -> &str {
        "gcore_project"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Looks up a cloud project by name")
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("client_id", AttributeType::Number)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("state", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_default", AttributeType::Bool)
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

        let projects = match data.client.cloud().projects().await {
            Ok(projects) => projects,
            Err(e) => {
                return ReadDataSourceResponse {
                    state: request.config,
                    diagnostics: vec![api_error("Failed to list projects", &e)],
                    deferred: None,
                }
            }
        };

        let mut state = request.config.clone();
        let diagnostics = match projects.iter().find(|p| p.name == name) {
            Some(project) => {
                tracing::debug!(project_id = project.id, %name, "project found");
                apply_project(&mut state, project);
                vec![]
            }
            None => vec![super::not_found(
                "Project",
                &name,
                projects.iter().map(|p| p.name.clone()),
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
impl DataSourceWithConfigure for ProjectDataSource {
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
