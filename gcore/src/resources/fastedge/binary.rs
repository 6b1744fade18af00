//! Uploaded wasm binaries. The API has no update, so a changed file
//! replaces the binary; changes are detected through the sha256 of the file.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tfplug::context::Context;
use tfplug::import_state_passthrough_id;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ModifyPlanRequest,
    ModifyPlanResponse, ReadResourceRequest, ReadResourceResponse, Resource,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, ResourceWithModifyPlan, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use crate::api::fastedge::Binary;
use crate::resources::common::{
    api_error, configure_provider_data, empty_import_response, id_attribute, not_configured,
    numeric_id, optional_string, required_string, set_number, set_optional_string, set_string,
};

pub(crate) fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

async fn read_wasm(filename: &str) -> Result<Vec<u8>, Diagnostic> {
    tokio::fs::read(filename).await.map_err(|e| {
        Diagnostic::error(
            "Failed to read wasm file",
            format!("{}: {}", filename, e),
        )
        .with_attribute(AttributePath::new("filename"))
    })
}

fn apply_binary(state: &mut DynamicValue, binary: &Binary) {
    set_string(state, "id", binary.id.to_string());
    set_optional_string(state, "api_type", binary.api_type.clone());
    if let Some(status) = binary.status {
        set_number(state, "status", status);
    }
    if optional_string(state, "checksum").is_none() {
        set_optional_string(state, "checksum", binary.checksum.clone());
    }
}

#[derive(Default)]
pub struct FastEdgeBinaryResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl FastEdgeBinaryResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn upload(
        &self,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let filename = required_string(planned, "filename")?;
        let wasm = read_wasm(&filename).await?;
        let sum = checksum(&wasm);
        tracing::info!(%filename, size = wasm.len(), checksum = %sum, "uploading wasm binary");

        let binary = data
            .client
            .fastedge()
            .upload_binary(wasm)
            .await
            .map_err(|e| api_error("Failed to upload binary", &e))?;

        let mut state = planned.clone();
        set_string(&mut state, "checksum", sum);
        apply_binary(&mut state, &binary);
        Ok(state)
    }
}

#[async_trait]
impl Resource for FastEdgeBinaryResource {
    fn type_name(&self) -> &str {
        "gcore_fastedge_binary"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Uploads a FastEdge wasm binary")
            .attribute(id_attribute("Binary ID"))
            .attribute(
                AttributeBuilder::new("filename", AttributeType::String)
                    .description("Path to the compiled .wasm file")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("checksum", AttributeType::String)
                    .description("sha256 of the uploaded file")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_type", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::Number)
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

        match self.upload(data, &request.planned_state).await {
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

        let id = match numeric_id(&request.current_state) {
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

        match data.client.fastedge().get_binary(id).await {
            Ok(binary) => {
                let mut new_state = request.current_state.clone();
                apply_binary(&mut new_state, &binary);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(binary_id = id, "binary not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read binary", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    /// Only a rename of an identical file gets here
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

        let diagnostics = match numeric_id(&request.prior_state) {
            Ok(id) => match data.client.fastedge().delete_binary(id).await {
                Ok(()) => vec![],
                Err(e) if e.is_not_found() => vec![],
                Err(e) => vec![api_error("Failed to delete binary", &e)],
            },
            Err(diag) => vec![diag],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }

    fn as_modify_plan(&self) -> Option<&dyn ResourceWithModifyPlan> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for FastEdgeBinaryResource {
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
impl ResourceWithModifyPlan for FastEdgeBinaryResource {
    /// Plans the checksum of the file on disk and replaces on a mismatch
    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        let mut planned_state = request.planned_state;
        let mut response_diagnostics = vec![];
        let mut requires_replace = vec![];

        if !planned_state.is_null() {
            if let Some(filename) = optional_string(&planned_state, "filename") {
                match read_wasm(&filename).await {
                    Ok(wasm) => {
                        let sum = checksum(&wasm);
                        let prior = optional_string(&request.prior_state, "checksum");
                        if prior.as_deref().is_some_and(|p| p != sum) {
                            tracing::debug!(%filename, "wasm file changed");
                            requires_replace.push(AttributePath::new("checksum"));
                        }
                        set_string(&mut planned_state, "checksum", sum);
                    }
                    Err(diag) => response_diagnostics.push(diag),
                }
            } else {
                let _ = planned_state.mark_unknown(&AttributePath::new("checksum"));
            }
        }

        ModifyPlanResponse {
            planned_state,
            requires_replace,
            planned_private: request.prior_private,
            diagnostics: response_diagnostics,
        }
    }
}

#[async_trait]
impl ResourceWithImportState for FastEdgeBinaryResource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::{provider_data, value};
    use mockito::{Matcher, Server};
    use tfplug::types::Dynamic;

    const WASM: &[u8] = b"\0asm\x01\0\0\0";

    fn wasm_file(name: &str, bytes: &[u8]) -> String {
        let path = std::env::temp_dir().join(format!("gcore-{}-{}.wasm", name, std::process::id()));
        std::fs::write(&path, bytes).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn state(filename: &str, checksum: Dynamic) -> DynamicValue {
        value(&[
            ("id", Dynamic::from("12")),
            ("filename", Dynamic::from(filename)),
            ("checksum", checksum),
            ("api_type", Dynamic::from("wasi-http")),
            ("status", Dynamic::Number(1.0)),
        ])
    }

    #[test]
    fn checksum_is_sha256_hex() {
        assert_eq!(
            checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn create_uploads_file_contents() {
        let filename = wasm_file("create", WASM);
        let mut server = Server::new_async().await;
        let upload = server
            .mock("POST", "/v1/binaries/raw")
            .match_header("content-type", "application/octet-stream")
            .match_body(Matcher::Exact(String::from_utf8_lossy(WASM).into_owned()))
            .with_body(r#"{"id":12,"api_type":"wasi-http","status":1}"#)
            .create_async()
            .await;

        let mut planned = state(&filename, Dynamic::Unknown);
        planned.mark_unknown(&AttributePath::new("id")).unwrap();
        let response = FastEdgeBinaryResource {
            provider_data: Some(provider_data(&server.url())),
        }
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "gcore_fastedge_binary".to_string(),
                planned_state: planned.clone(),
                config: planned,
                planned_private: vec![],
                provider_meta: None,
            },
        )
        .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response.new_state.get_string(&AttributePath::new("checksum")).unwrap(),
            checksum(WASM)
        );
        assert_eq!(response.new_state.get_string(&AttributePath::new("id")).unwrap(), "12");
        upload.assert_async().await;
        let _ = std::fs::remove_file(filename);
    }

    #[tokio::test]
    async fn changed_file_forces_replacement() {
        let filename = wasm_file("changed", b"\0asm\x01\0\0\0new");
        let prior = state(&filename, Dynamic::from(checksum(WASM)));
        let response = FastEdgeBinaryResource::new()
            .modify_plan(
                Context::new(),
                ModifyPlanRequest {
                    type_name: "gcore_fastedge_binary".to_string(),
                    config: prior.clone(),
                    prior_state: prior.clone(),
                    proposed_new_state: prior.clone(),
                    planned_state: prior,
                    prior_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.requires_replace, vec![AttributePath::new("checksum")]);
        assert_eq!(
            response.planned_state.get_string(&AttributePath::new("checksum")).unwrap(),
            checksum(b"\0asm\x01\0\0\0new")
        );
        let _ = std::fs::remove_file(filename);
    }

    #[tokio::test]
    async fn unchanged_file_plans_no_replacement() {
        let filename = wasm_file("same", WASM);
        let prior = state(&filename, Dynamic::from(checksum(WASM)));
        let response = FastEdgeBinaryResource::new()
            .modify_plan(
                Context::new(),
                ModifyPlanRequest {
                    type_name: "gcore_fastedge_binary".to_string(),
                    config: prior.clone(),
                    prior_state: prior.clone(),
                    proposed_new_state: prior.clone(),
                    planned_state: prior,
                    prior_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.requires_replace.is_empty());
        assert!(response.diagnostics.is_empty());
        let _ = std::fs::remove_file(filename);
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let planned = state("/nonexistent/app.wasm", Dynamic::Unknown);
        let response = FastEdgeBinaryResource::new()
            .modify_plan(
                Context::new(),
                ModifyPlanRequest {
                    type_name: "gcore_fastedge_binary".to_string(),
                    config: planned.clone(),
                    prior_state: DynamicValue::null(),
                    proposed_new_state: planned.clone(),
                    planned_state: planned,
                    prior_private: vec![],
                    provider_meta: None,
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "Failed to read wasm file");
    }
}
