use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::StringLengthValidator;

use crate::api::cloud::{CreateKeypairRequest, Keypair};
use crate::resources::common::{
    api_error, configure_provider_data, empty_import_response, id_attribute, not_configured,
    optional_string, required_i64, required_string, set_number, set_optional_string, set_string,
};

#[derive(Default)]
pub struct KeypairResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl KeypairResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_keypair(
        &self,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let request = CreateKeypairRequest {
            sshkey_name: required_string(planned, "sshkey_name")?,
            public_key: optional_string(planned, "public_key"),
            project_id: required_i64(planned, "project_id")?,
        };
        let keypair = data
            .client
            .cloud()
            .keypairs()
            .create(&request)
            .await
            .map_err(|e| api_error("Failed to create keypair", &e))?;
        tracing::info!(keypair_id = %keypair.sshkey_id, "keypair created");

        let mut state = planned.clone();
        set_string(&mut state, "id", keypair.sshkey_id.clone());
        // only returned on creation, for generated pairs
        set_optional_string(&mut state, "private_key", keypair.private_key.clone());
        apply_keypair(&mut state, &keypair);
        Ok(state)
    }
}

fn apply_keypair(state: &mut DynamicValue, keypair: &Keypair) {
    set_string(state, "sshkey_name", keypair.sshkey_name.clone());
    set_string(state, "public_key", keypair.public_key.clone());
    set_string(state, "fingerprint", keypair.fingerprint.clone());
    if let Some(project_id) = keypair.project_id {
        set_number(state, "project_id", project_id);
    }
}

#[async_trait]
impl Resource for KeypairResource {
    fn type_name(&self) -> &str {
        "gcore_keypair"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an SSH keypair. Without public_key a new pair is generated")
            .attribute(id_attribute("Keypair ID"))
            .attribute(
                AttributeBuilder::new("project_id", AttributeType::Number)
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("sshkey_name", AttributeType::String)
                    .required()
                    .validator(StringLengthValidator::between(1, 255))
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public_key", AttributeType::String)
                    .optional()
                    .computed()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("private_key", AttributeType::String)
                    .description("Generated private key, known only after creation")
                    .computed()
                    .sensitive()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("fingerprint", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
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

        match self.create_keypair(data, &request.planned_state).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![diag],
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

        let id = match required_string(&request.current_state, "id") {
            Ok(id) => id,
            Err(diag) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                    private: request.private,
                    deferred: None,
                }
            }
        };

        match data.client.cloud().keypairs().get(&id).await {
            Ok(keypair) => {
                let mut new_state = request.current_state.clone();
                apply_keypair(&mut new_state, &keypair);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(keypair_id = %id, "keypair not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read keypair", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    /// Every attribute forces replacement, so there is nothing to send
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

        let id = match required_string(&request.prior_state, "id") {
            Ok(id) => id,
            Err(diag) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        let diagnostics = match data.client.cloud().keypairs().delete(&id).await {
            Ok(()) => vec![],
            Err(e) if e.is_not_found() => vec![],
            Err(e) => vec![api_error("Failed to delete keypair", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for KeypairResource {
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
impl ResourceWithImportState for KeypairResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = empty_import_response();
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}
