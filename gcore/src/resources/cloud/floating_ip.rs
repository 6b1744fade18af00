use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::plan_modifier::RequiresReplaceIfChanged;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::timeouts::{timeouts_block, TimeoutOperation, Timeouts};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::api::cloud::{CreateFloatingIpRequest, FloatingIp};
use crate::resources::common::{
    api_error, cloud_location, configure_provider_data, id_attribute, import_cloud_id,
    not_configured, optional_string, project_id_attribute, region_id_attribute,
    required_string, resolve_timeouts, set_optional_string, set_string, set_string_map,
    string_map, wait_created, wait_finished, ApplyError,
};

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::uniform(Duration::from_secs(20 * 60));

#[derive(Default)]
pub struct FloatingIpResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl FloatingIpResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_floating_ip(
        &self,
        ctx: &Context,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, ApplyError> {
        let (project_id, region_id) = cloud_location(planned)?;
        let timeouts = resolve_timeouts(planned, DEFAULT_TIMEOUTS)?;
        let api = data.client.cloud().floating_ips(project_id, region_id);

        let request = CreateFloatingIpRequest {
            port_id: optional_string(planned, "port_id"),
            fixed_ip_address: optional_string(planned, "fixed_ip_address"),
            metadata: string_map(planned, "metadata"),
        };
        let results = api
            .create(&request)
            .await
            .map_err(|e| api_error("Failed to create floating IP", &e))?;
        let id = wait_created(ctx, &data.client, &results, "floatingips", timeouts.create)
            .await
            .map_err(|e| api_error("Failed to create floating IP", &e))?;

        let mut state = planned.clone();
        set_string(&mut state, "id", id.clone());

        let floating_ip = api.get(&id).await.map_err(|e| {
            ApplyError::partial(api_error("Failed to read created floating IP", &e), &state)
        })?;
        apply_floating_ip(&mut state, &floating_ip);
        Ok(state)
    }

    /// Assigns to the planned port, or unassigns when the port was cleared
    async fn update_assignment(
        &self,
        data: &crate::GcoreProviderData,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let (project_id, region_id) = cloud_location(planned)?;
        let id = required_string(prior, "id")?;
        let api = data.client.cloud().floating_ips(project_id, region_id);

        let port_id = optional_string(planned, "port_id");
        let fixed_ip = optional_string(planned, "fixed_ip_address");
        let changed = port_id != optional_string(prior, "port_id")
            || fixed_ip != optional_string(prior, "fixed_ip_address");

        let floating_ip = match (changed, port_id) {
            (false, _) => api.get(&id).await,
            (true, Some(port_id)) => {
                tracing::info!(floating_ip_id = %id, %port_id, "assigning floating IP");
                api.assign(&id, &port_id, fixed_ip.as_deref()).await
            }
            (true, None) => {
                tracing::info!(floating_ip_id = %id, "unassigning floating IP");
                api.unassign(&id).await
            }
        }
        .map_err(|e| api_error("Failed to update floating IP", &e))?;

        let mut state = planned.clone();
        apply_floating_ip(&mut state, &floating_ip);
        Ok(state)
    }
}

fn apply_floating_ip(state: &mut DynamicValue, floating_ip: &FloatingIp) {
    set_optional_string(state, "floating_ip_address", floating_ip.floating_ip_address.clone());
    set_optional_string(state, "fixed_ip_address", floating_ip.fixed_ip_address.clone());
    set_optional_string(state, "port_id", floating_ip.port_id.clone());
    set_optional_string(state, "router_id", floating_ip.router_id.clone());
    set_string(state, "status", floating_ip.status.clone());
    set_string_map(state, "metadata", &floating_ip.metadata);
}

#[async_trait]
impl Resource for FloatingIpResource {
    fn type_name(&self) -> &str {
        "gcore_floatingip"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a floating IP, optionally assigned to a port")
            .attribute(id_attribute("Floating IP ID"))
            .attribute(project_id_attribute())
            .attribute(region_id_attribute())
            .attribute(
                AttributeBuilder::new("port_id", AttributeType::String)
                    .description("Port the address is assigned to; clear to unassign")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("fixed_ip_address", AttributeType::String)
                    .description("Fixed address on the port to map to")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("metadata", AttributeType::map(AttributeType::String))
                    .optional()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("floating_ip_address", AttributeType::String)
                    .description("The public address")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("router_id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
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

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];
        let port_null = request
            .config
            .get(&AttributePath::new("port_id"))
            .map(|v| v.is_null())
            .unwrap_or(true);
        let fixed_set = optional_string(&request.config, "fixed_ip_address").is_some();
        if port_null && fixed_set {
            diagnostics.push(
                Diagnostic::error(
                    "fixed_ip_address requires port_id",
                    "A fixed address can only be mapped together with its port",
                )
                .with_attribute(AttributePath::new("fixed_ip_address")),
            );
        }
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        match self.create_floating_ip(&ctx, data, &request.planned_state).await {
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

        match data
            .client
            .cloud()
            .floating_ips(project_id, region_id)
            .get(&id)
            .await
        {
            Ok(floating_ip) => {
                let mut new_state = request.current_state.clone();
                apply_floating_ip(&mut new_state, &floating_ip);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            },
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read floating IP", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        match self
            .update_assignment(data, &request.prior_state, &request.planned_state)
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![diag],
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

        let api = data.client.cloud().floating_ips(project_id, region_id);
        let results = match api.delete(&id).await {
            Ok(results) => results,
            Err(e) if e.is_not_found() => return DeleteResourceResponse { diagnostics: vec![] },
            Err(e) => {
                return DeleteResourceResponse {
                    diagnostics: vec![api_error("Failed to delete floating IP", &e)],
                }
            }
        };

        let diagnostics = match wait_finished(&ctx, &data.client, &results, timeouts.delete).await {
            Ok(()) => vec![],
            Err(e) => vec![api_error("Failed to delete floating IP", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for FloatingIpResource {
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
impl ResourceWithImportState for FloatingIpResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_cloud_id(&ctx, &request)
    }
}
