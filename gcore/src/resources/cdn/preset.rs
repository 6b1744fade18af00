use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import_state_composite_id;
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
use tfplug::types::{Diagnostic, DynamicValue};

use crate::api::cdn::AppliedPreset;
use crate::resources::common::{
    api_error, configure_provider_data, empty_import_response, id_attribute, not_configured,
    required_i64, set_optional_string, set_string,
};

/// Binds a CDN preset to a resource or origin group
#[derive(Default)]
pub struct CdnPresetResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl CdnPresetResource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn target(value: &DynamicValue) -> Result<(i64, i64), Diagnostic> {
    Ok((required_i64(value, "preset_id")?, required_i64(value, "object_id")?))
}

fn apply_preset(state: &mut DynamicValue, preset_id: i64, applied: &AppliedPreset) {
    set_string(state, "id", format!("{}:{}", preset_id, applied.object_id));
    set_optional_string(state, "object_type", applied.object_type.clone());
}

#[async_trait]
impl Resource for CdnPresetResource {
    fn type_name(&self) -> &str {
        "gcore_cdn_preset"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Applies a CDN preset to a CDN resource or origin group")
            .attribute(id_attribute("<preset_id>:<object_id>"))
            .attribute(
                AttributeBuilder::new("preset_id", AttributeType::Number)
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("object_id", AttributeType::Number)
                    .description("CDN resource or origin group the preset is applied to")
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("object_type", AttributeType::String)
                    .computed()
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        let (preset_id, object_id) = match target(&request.planned_state) {
            Ok(target) => target,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };

        let result = {
            let _guard = data.cdn_mutex.lock().await;
            data.client.cdn().presets().apply(preset_id, object_id).await
        };
        match result {
            Ok(applied) => {
                tracing::info!(preset_id, object_id, "CDN preset applied");
                let mut new_state = request.planned_state;
                apply_preset(&mut new_state, preset_id, &applied);
                CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics: vec![],
                }
            }
            Err(e) => CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to apply CDN preset", &e)],
            },
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

        let (preset_id, object_id) = match target(&request.current_state) {
            Ok(target) => target,
            Err(diag) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                    private: request.private,
                    deferred: None,
                }
            }
        };

        match data.client.cdn().presets().find_applied(preset_id, object_id).await {
            Ok(Some(applied)) => {
                let mut new_state = request.current_state.clone();
                apply_preset(&mut new_state, preset_id, &applied);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Ok(None) => {
                tracing::warn!(preset_id, object_id, "CDN preset no longer applied, removing from state");
                ReadResourceResponse {
                    new_state: None,
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
                diagnostics: vec![api_error("Failed to read CDN preset", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let (preset_id, object_id) = match target(&request.prior_state) {
            Ok(target) => target,
            Err(diag) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        let result = {
            let _guard = data.cdn_mutex.lock().await;
            data.client.cdn().presets().unapply(preset_id, object_id).await
        };
        let diagnostics = match result {
            Ok(()) => vec![],
            Err(e) if e.is_not_found() => vec![],
            Err(e) => vec![api_error("Failed to unapply CDN preset", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for CdnPresetResource {
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
impl ResourceWithImportState for CdnPresetResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = empty_import_response();
        import_state_composite_id(
            &ctx,
            &[("preset_id", AttributeType::Number), ("object_id", AttributeType::Number)],
            &request,
            &mut response,
        );
        response
    }
}
