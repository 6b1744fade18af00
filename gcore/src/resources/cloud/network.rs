use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::RequiresReplaceIfChanged;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::timeouts::{timeouts_block, TimeoutOperation, Timeouts};
use tfplug::types::DynamicValue;
use tfplug::validator::{NumberRangeValidator, StringOneOfValidator};

use crate::api::cloud::{CreateNetworkRequest, Network};
use crate::resources::common::{
    api_error, cloud_location, configure_provider_data, id_attribute, import_cloud_id,
    not_configured, optional_bool, optional_i64, optional_string, project_id_attribute,
    region_id_attribute, required_string, resolve_timeouts, set_bool, set_number, set_string,
    set_string_map, string_map, wait_created, wait_finished, ApplyError,
};

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::uniform(Duration::from_secs(20 * 60));

#[derive(Default)]
pub struct NetworkResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl NetworkResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_network(
        &self,
        ctx: &Context,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, ApplyError> {
        let (project_id, region_id) = cloud_location(planned)?;
        let timeouts = resolve_timeouts(planned, DEFAULT_TIMEOUTS)?;
        let api = data.client.cloud().networks(project_id, region_id);

        let request = CreateNetworkRequest {
            name: required_string(planned, "name")?,
            mtu: optional_i64(planned, "mtu"),
            type_: optional_string(planned, "type").unwrap_or_else(|| "vxlan".to_string()),
            create_router: optional_bool(planned, "create_router").unwrap_or(true),
            metadata: string_map(planned, "metadata"),
        };
        let results = api
            .create(&request)
            .await
            .map_err(|e| api_error("Failed to create network", &e))?;
        let id = wait_created(ctx, &data.client, &results, "networks", timeouts.create)
            .await
            .map_err(|e| api_error("Failed to create network", &e))?;

        let mut state = planned.clone();
        set_string(&mut state, "id", id.clone());

        let network = api.get(&id).await.map_err(|e| {
            ApplyError::partial(api_error("Failed to read created network", &e), &state)
        })?;
        apply_network(&mut state, &network);
        Ok(state)
    }
}

fn apply_network(state: &mut DynamicValue, network: &Network) {
    set_string(state, "name", network.name.clone());
    set_number(state, "mtu", network.mtu);
    set_string(state, "type", network.type_.clone());
    set_bool(state, "external", network.external);
    set_bool(state, "shared", network.shared);
    set_string_map(state, "metadata", &network.metadata);
}

#[async_trait]
impl Resource for NetworkResource {
    fn type_name(&self) -> &str {
        "gcore_network"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a private cloud network")
            .attribute(id_attribute("Network ID"))
            .attribute(project_id_attribute())
            .attribute(region_id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("mtu", AttributeType::Number)
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator::between(68.0, 9000.0))
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("vxlan or vlan")
                    .optional()
                    .computed()
                    .default(StaticDefault::string("vxlan"))
                    .validator(StringOneOfValidator::create(&["vxlan", "vlan"]))
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("create_router", AttributeType::Bool)
                    .description("Create a router attached to the network")
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(true))
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("metadata", AttributeType::map(AttributeType::String))
                    .optional()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("external", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("shared", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .block(timeouts_block(&[
                TimeoutOperation::Create,
                TimeoutOperation::Delete,
            ]))
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        match self.create_network(&ctx, data, &request.planned_state).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(e) => {
                let (new_state, diagnostics) = e.into_response(request.planned_state);
                CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
                private: request.private,
                deferred: None,
            };
        };

        let state = &request.current_state;
        let (project_id, region_id, id) = match (cloud_location(state), required_string(state, "id")) {
            (Ok((p, r)), Ok(id)) => (p, r, id),
            (Err(diag), _) | (_, Err(diag)) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                    private: request.private,
                    deferred: None,
                }
            }
        };

        match data.client.cloud().networks(project_id, region_id).get(&id).await {
            Ok(network) => {
                let mut new_state = request.current_state.clone();
                apply_network(&mut new_state, &network);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(network_id = %id, "network not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read network", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    /// Only the name is mutable in place
    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        let planned = &request.planned_state;
        let target = cloud_location(planned).and_then(|(p, r)| {
            Ok((p, r, required_string(&request.prior_state, "id")?, required_string(planned, "name")?))
        });
        let (project_id, region_id, id, name) = match target {
            Ok(target) => target,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };

        match data
            .client
            .cloud()
            .networks(project_id, region_id)
            .rename(&id, &name)
            .await
        {
            Ok(network) => {
                let mut new_state = request.planned_state.clone();
                apply_network(&mut new_state, &network);
                UpdateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics: vec![],
                }
            }
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to rename network", &e)],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let prior = &request.prior_state;
        let (project_id, region_id, id, timeouts) = match (
            cloud_location(prior),
            required_string(prior, "id"),
            resolve_timeouts(prior, DEFAULT_TIMEOUTS),
        ) {
            (Ok((p, r)), Ok(id), Ok(t)) => (p, r, id, t),
            (Err(diag), _, _) | (_, Err(diag), _) | (_, _, Err(diag)) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        let api = data.client.cloud().networks(project_id, region_id);
        let results = match api.delete(&id).await {
            Ok(results) => results,
            Err(e) if e.is_not_found() => return DeleteResourceResponse { diagnostics: vec![] },
            Err(e) => {
                return DeleteResourceResponse {
                    diagnostics: vec![api_error("Failed to delete network", &e)],
                }
            }
        };

        let diagnostics = match wait_finished(&ctx, &data.client, &results, timeouts.delete).await {
            Ok(()) => vec![],
            Err(e) => vec![api_error("Failed to delete network", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for NetworkResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        ConfigureResourceResponse {
            diagnostics: configure_provider_data(request.provider_data, &mut self.provider_data),
        }
    }
}

#[async_trait]
impl ResourceWithImportState for NetworkResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_cloud_id(&ctx, &request)
    }
}
