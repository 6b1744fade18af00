use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import_state_passthrough_id;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{StringLengthValidator, StringOneOfValidator};

use crate::api::fastedge::{App, AppRequest, AppStatus, SecretRef};
use crate::resources::common::{
    api_error, configure_provider_data, empty_import_response, id_attribute, not_configured,
    numeric_id, optional_bool, optional_string, required_i64, required_string, set_bool,
    set_number, set_optional_string, set_string, set_string_map, string_map,
};

fn app_request(value: &DynamicValue) -> Result<AppRequest, Diagnostic> {
    let status_name = optional_string(value, "status").unwrap_or_else(|| "enabled".to_string());
    let status = AppStatus::parse(&status_name).ok_or_else(|| {
        Diagnostic::error(
            "Invalid status",
            format!("'{}' is not one of {}", status_name, AppStatus::NAMES.join(", ")),
        )
        .with_attribute(AttributePath::new("status"))
    })?;

    let secrets = value
        .get_map(&AttributePath::new("secrets"))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, id)| id.as_i64().map(|id| (name, SecretRef { id })))
        .collect();

    Ok(AppRequest {
        name: required_string(value, "name")?,
        binary: required_i64(value, "binary")?,
        status: status.code(),
        env: string_map(value, "env"),
        rsp_headers: string_map(value, "rsp_headers"),
        secrets,
        debug: optional_bool(value, "debug").unwrap_or(false),
        comment: optional_string(value, "comment"),
    })
}

fn apply_app(state: &mut DynamicValue, app: &App) {
    set_string(state, "id", app.id.to_string());
    set_string(state, "name", app.name.clone());
    set_number(state, "binary", app.binary);
    match AppStatus::from_code(app.status) {
        Some(status) => set_string(state, "status", status.as_str()),
        None => tracing::warn!(app_id = app.id, code = app.status, "unknown app status code"),
    }
    set_string_map(state, "env", &app.env);
    set_string_map(state, "rsp_headers", &app.rsp_headers);

    let secrets_path = AttributePath::new("secrets");
    let secrets_null = state.get(&secrets_path).map(Dynamic::is_null).unwrap_or(true);
    let _ = if app.secrets.is_empty() && secrets_null {
        state.set_null(&secrets_path)
    } else {
        state.set_map(
            &secrets_path,
            app.secrets
                .iter()
                .map(|(name, secret)| (name.clone(), Dynamic::Number(secret.id as f64)))
                .collect::<HashMap<_, _>>(),
        )
    };

    set_bool(state, "debug", app.debug);
    if optional_string(state, "comment").is_some() || app.comment.as_deref().is_some_and(|c| !c.is_empty()) {
        set_optional_string(state, "comment", app.comment.clone());
    }
    set_optional_string(state, "url", app.url.clone());
}

/// A FastEdge application running an uploaded binary
#[derive(Default)]
pub struct FastEdgeAppResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl FastEdgeAppResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_app(
        &self,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let request = app_request(planned)?;
        let app = data
            .client
            .fastedge()
            .create_app(&request)
            .await
            .map_err(|e| api_error("Failed to create app", &e))?;
        tracing::info!(app_id = app.id, binary = app.binary, "FastEdge app created");

        let mut state = planned.clone();
        apply_app(&mut state, &app);
        Ok(state)
    }

    async fn update_app(
        &self,
        data: &crate::GcoreProviderData,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let id = numeric_id(prior)?;
        let request = app_request(planned)?;
        let app = data
            .client
            .fastedge()
            .update_app(id, &request)
            .await
            .map_err(|e| api_error("Failed to update app", &e))?;

        let mut state = planned.clone();
        apply_app(&mut state, &app);
        Ok(state)
    }
}

#[async_trait]
impl Resource for FastEdgeAppResource {
    fn type_name(&self) -> &str {
        "gcore_fastedge_app"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a FastEdge application")
            .attribute(id_attribute("App ID"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(StringLengthValidator::between(1, 64))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("binary", AttributeType::Number)
                    .description("ID of the wasm binary to run")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .optional()
                    .computed()
                    .default(StaticDefault::string("enabled"))
                    .validator(StringOneOfValidator::create(&AppStatus::NAMES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("env", AttributeType::map(AttributeType::String))
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("rsp_headers", AttributeType::map(AttributeType::String))
                    .description("Headers added to every response")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secrets", AttributeType::map(AttributeType::Number))
                    .description("Secret ids by the name the app reads them under")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("debug", AttributeType::Bool)
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("comment", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("url", AttributeType::String)
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

        match self.create_app(data, &request.planned_state).await {
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

        match data.client.fastedge().get_app(id).await {
            Ok(app) => {
                let mut new_state = request.current_state.clone();
                apply_app(&mut new_state, &app);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(app_id = id, "app not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read app", &e)],
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
            .update_app(data, &request.prior_state, &request.planned_state)
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

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let diagnostics = match numeric_id(&request.prior_state) {
            Ok(id) => match data.client.fastedge().delete_app(id).await {
                Ok(()) => vec![],
                Err(e) if e.is_not_found() => vec![],
                Err(e) => vec![api_error("Failed to delete app", &e)],
            },
            Err(diag) => vec![diag],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for FastEdgeAppResource {
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
impl ResourceWithImportState for FastEdgeAppResource {
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
    use crate::resources::test_helpers::{object, provider_data, string_map, value};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tfplug::types::ClientCapabilities;

    fn planned(status: &str) -> DynamicValue {
        value(&[
            ("id", Dynamic::Unknown),
            ("name", Dynamic::from("edge-auth")),
            ("binary", Dynamic::Number(12.0)),
            ("status", Dynamic::from(status)),
            ("env", string_map(&[("MODE", "strict")])),
            ("rsp_headers", Dynamic::Null),
            ("secrets", object(&[("TOKEN", Dynamic::Number(4.0))])),
            ("debug", Dynamic::Bool(false)),
            ("comment", Dynamic::Null),
            ("url", Dynamic::Unknown),
        ])
    }

    const APP: &str = r#"{"id":33,"name":"edge-auth","binary":12,"status":1,"env":{"MODE":"strict"},
        "rsp_headers":{},"secrets":{"TOKEN":{"id":4}},"debug":false,"comment":null,
        "url":"https://edge-auth-1234.fastedge.app"}"#;

    fn resource(url: &str) -> FastEdgeAppResource {
        FastEdgeAppResource {
            provider_data: Some(provider_data(url)),
        }
    }

    #[test]
    fn request_maps_status_and_secrets() {
        let request = app_request(&planned("suspended")).unwrap();
        assert_eq!(request.status, 5);
        assert_eq!(request.secrets["TOKEN"], SecretRef { id: 4 });
        assert!(request.rsp_headers.is_empty());
    }

    #[tokio::test]
    async fn create_sets_url() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/v1/apps")
            .match_body(Matcher::Json(json!({
                "name": "edge-auth",
                "binary": 12,
                "status": 1,
                "env": {"MODE": "strict"},
                "rsp_headers": {},
                "secrets": {"TOKEN": {"id": 4}},
                "debug": false,
            })))
            .with_body(APP)
            .create_async()
            .await;

        let response = resource(&server.url())
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "gcore_fastedge_app".to_string(),
                    planned_state: planned("enabled"),
                    config: planned("enabled"),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "33");
        assert_eq!(
            state.get_string(&AttributePath::new("url")).unwrap(),
            "https://edge-auth-1234.fastedge.app"
        );
        assert!(state.get(&AttributePath::new("rsp_headers")).unwrap().is_null());
        create.assert_async().await;
    }

    #[tokio::test]
    async fn read_reports_disabled_app() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/v1/apps/33")
            .with_body(APP.replace(r#""status":1"#, r#""status":2"#))
            .create_async()
            .await;

        let mut current = planned("enabled");
        current.set_string(&AttributePath::new("id"), "33".to_string()).unwrap();
        let response = resource(&server.url())
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "gcore_fastedge_app".to_string(),
                    current_state: current,
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        assert_eq!(state.get_string(&AttributePath::new("status")).unwrap(), "disabled");
    }

    #[tokio::test]
    async fn update_puts_full_app() {
        let mut server = Server::new_async().await;
        let put = server
            .mock("PUT", "/v1/apps/33")
            .match_body(Matcher::PartialJson(json!({"status": 2, "binary": 12})))
            .with_body(APP.replace(r#""status":1"#, r#""status":2"#))
            .create_async()
            .await;

        let mut prior = planned("enabled");
        prior.set_string(&AttributePath::new("id"), "33".to_string()).unwrap();
        let mut next = prior.clone();
        next.set_string(&AttributePath::new("status"), "disabled".to_string()).unwrap();

        let response = resource(&server.url())
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "gcore_fastedge_app".to_string(),
                    prior_state: prior,
                    planned_state: next.clone(),
                    config: next,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        put.assert_async().await;
    }
}
