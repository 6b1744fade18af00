//! Everywhere Inference deployment resource
//!
//! Deployments are named within a project. Creation and updates run as
//! tasks, after which the deployment itself rolls out until it reports
//! ACTIVE.

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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, SchemaBuilder};
use tfplug::timeouts::{timeouts_block, TimeoutOperation, Timeouts};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::NumberRangeValidator;
use tfplug::import_state_composite_id;

use crate::api::cloud::{
    CreateInferenceRequest, InferenceApi, InferenceContainer, InferenceDeployment, InferenceScale,
    UpdateInferenceRequest,
};
use crate::api::tasks::StateChangeConf;
use crate::api::ApiError;
use crate::resources::common::{
    api_error, configure_provider_data, empty_import_response, not_configured, optional_bool,
    optional_string, required_i64, required_string, resolve_timeouts, run_cancellable,
    set_bool, set_number, set_optional_string, set_string, string_map, string_map_to_dynamic,
    strings_to_dynamic, wait_finished, ApplyError,
};

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::uniform(Duration::from_secs(30 * 60));
const ROLLOUT_PENDING: [&str; 3] = ["PENDING", "DEPLOYING", "PARTIALLYDEPLOYED"];
const ROLLOUT_TARGET: [&str; 1] = ["ACTIVE"];

#[derive(Default)]
pub struct InferenceDeploymentResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl InferenceDeploymentResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_deployment(
        &self,
        ctx: &Context,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, ApplyError> {
        let project_id = required_i64(planned, "project_id")?;
        let timeouts = resolve_timeouts(planned, DEFAULT_TIMEOUTS)?;
        let request = create_request(planned)?;
        let api = data.client.cloud().inference(project_id);

        let results = api
            .create(&request)
            .await
            .map_err(|e| api_error("Failed to create inference deployment", &e))?;

        // deployments are addressed by name, so the id is known once accepted
        let mut state = planned.clone();
        set_string(&mut state, "id", request.name.clone());

        wait_finished(ctx, &data.client, &results, timeouts.create)
            .await
            .map_err(|e| {
                ApplyError::partial(api_error("Failed to create inference deployment", &e), &state)
            })?;
        let deployment = wait_active(ctx, &api, &request.name, timeouts.create)
            .await
            .map_err(|e| {
                ApplyError::partial(
                    api_error("Inference deployment did not become active", &e),
                    &state,
                )
            })?;

        apply_deployment(&mut state, &deployment);
        Ok(state)
    }

    async fn update_deployment(
        &self,
        ctx: &Context,
        data: &crate::GcoreProviderData,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, ApplyError> {
        let project_id = required_i64(planned, "project_id")?;
        let name = required_string(planned, "name")?;
        let timeouts = resolve_timeouts(planned, DEFAULT_TIMEOUTS)?;
        let api = data.client.cloud().inference(project_id);

        let request = update_request(prior, planned);
        if request.is_empty() {
            let deployment = api
                .get(&name)
                .await
                .map_err(|e| api_error("Failed to read inference deployment", &e))?;
            let mut state = planned.clone();
            apply_deployment(&mut state, &deployment);
            return Ok(state);
        }

        tracing::info!(deployment = %name, "updating inference deployment");
        let results = api.update(&name, &request).await.map_err(|e| {
            ApplyError::partial(api_error("Failed to update inference deployment", &e), prior)
        })?;
        wait_finished(ctx, &data.client, &results, timeouts.update)
            .await
            .map_err(|e| {
                ApplyError::partial(api_error("Failed to update inference deployment", &e), prior)
            })?;

        let mut state = planned.clone();
        let deployment = wait_active(ctx, &api, &name, timeouts.update)
            .await
            .map_err(|e| {
                ApplyError::partial(api_error("Failed to read inference deployment", &e), &state)
            })?;
        apply_deployment(&mut state, &deployment);
        Ok(state)
    }
}

/// Polls the deployment until its rollout finishes
async fn wait_active(
    ctx: &Context,
    api: &InferenceApi<'_>,
    name: &str,
    timeout: Duration,
) -> Result<InferenceDeployment, ApiError> {
    let refresh = move || async move {
        match api.get(name).await {
            Ok(deployment) => {
                let status = deployment.status.clone();
                Ok(Some((deployment, status)))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    };
    let conf = StateChangeConf::new(&ROLLOUT_PENDING, &ROLLOUT_TARGET, refresh).with_timeout(timeout);
    run_cancellable(ctx, conf.wait_for_state()).await
}

fn containers(value: &DynamicValue) -> Vec<InferenceContainer> {
    value
        .get_list(&AttributePath::new("containers"))
        .unwrap_or_default()
        .iter()
        .map(|block| {
            let number = |name: &str| block.field(name).and_then(Dynamic::as_i64).unwrap_or_default();
            InferenceContainer {
                region_id: number("region_id"),
                scale: InferenceScale {
                    min: number("scale_min"),
                    max: number("scale_max"),
                },
                address: None,
            }
        })
        .collect()
}

fn command(value: &DynamicValue) -> Option<Vec<String>> {
    value.get_string_list(&AttributePath::new("command")).ok()
}

fn create_request(planned: &DynamicValue) -> Result<CreateInferenceRequest, Diagnostic> {
    Ok(CreateInferenceRequest {
        name: required_string(planned, "name")?,
        image: required_string(planned, "image")?,
        listening_port: required_i64(planned, "listening_port")?,
        flavor_name: required_string(planned, "flavor_name")?,
        containers: containers(planned),
        envs: string_map(planned, "envs"),
        description: optional_string(planned, "description"),
        auth_enabled: optional_bool(planned, "auth_enabled").unwrap_or(false),
        command: command(planned),
    })
}

/// Only the fields that differ from the prior state
fn update_request(prior: &DynamicValue, planned: &DynamicValue) -> UpdateInferenceRequest {
    fn changed<T: PartialEq>(prior: T, planned: T) -> Option<T> {
        (prior != planned).then_some(planned)
    }
    let string = |v: &DynamicValue, name: &str| optional_string(v, name);
    let number = |v: &DynamicValue, name: &str| v.get_i64(&AttributePath::new(name)).ok();

    UpdateInferenceRequest {
        image: changed(string(prior, "image"), string(planned, "image")).flatten(),
        listening_port: changed(number(prior, "listening_port"), number(planned, "listening_port"))
            .flatten(),
        flavor_name: changed(string(prior, "flavor_name"), string(planned, "flavor_name")).flatten(),
        containers: changed(containers(prior), containers(planned)),
        envs: changed(string_map(prior, "envs"), string_map(planned, "envs")),
        description: changed(string(prior, "description"), string(planned, "description"))
            .map(Option::unwrap_or_default),
        auth_enabled: changed(optional_bool(prior, "auth_enabled"), optional_bool(planned, "auth_enabled"))
            .flatten(),
        command: changed(command(prior), command(planned)).map(Option::unwrap_or_default),
    }
}

fn apply_deployment(state: &mut DynamicValue, deployment: &InferenceDeployment) {
    set_string(state, "id", deployment.name.clone());
    set_string(state, "name", deployment.name.clone());
    set_string(state, "image", deployment.image.clone());
    set_number(state, "listening_port", deployment.listening_port);
    set_string(state, "flavor_name", deployment.flavor_name.clone());
    set_bool(state, "auth_enabled", deployment.auth_enabled);
    set_string(state, "status", deployment.status.clone());
    set_optional_string(state, "address", deployment.address.clone());

    let description_set = optional_string(state, "description").is_some();
    if description_set || deployment.description.as_deref().is_some_and(|d| !d.is_empty()) {
        set_optional_string(state, "description", deployment.description.clone());
    }

    let envs_null = state
        .get(&AttributePath::new("envs"))
        .map(Dynamic::is_null)
        .unwrap_or(true);
    if !(envs_null && deployment.envs.is_empty()) {
        let _ = state.set_map(&AttributePath::new("envs"), string_map_to_dynamic(&deployment.envs));
    }
    if let Some(command) = &deployment.command {
        let _ = state.set_list(&AttributePath::new("command"), strings_to_dynamic(command));
    }

    let containers = deployment
        .containers
        .iter()
        .map(|c| {
            Dynamic::Map(
                [
                    ("region_id".to_string(), Dynamic::Number(c.region_id as f64)),
                    ("scale_min".to_string(), Dynamic::Number(c.scale.min as f64)),
                    ("scale_max".to_string(), Dynamic::Number(c.scale.max as f64)),
                ]
                .into_iter()
                .collect(),
            )
        })
        .collect();
    let _ = state.set_list(&AttributePath::new("containers"), containers);
}

#[async_trait]
impl Resource for InferenceDeploymentResource {
    fn type_name(&self) -> &str {
        "gcore_inference_deployment"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let containers = NestedBlockBuilder::new("containers", NestingMode::List)
            .description("Regions the deployment runs in and their scaling bounds")
            .attribute(
                AttributeBuilder::new("region_id", AttributeType::Number)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("scale_min", AttributeType::Number)
                    .required()
                    .validator(NumberRangeValidator::at_least(0.0))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("scale_max", AttributeType::Number)
                    .required()
                    .validator(NumberRangeValidator::at_least(1.0))
                    .build(),
            )
            .min_items(1)
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an Everywhere Inference deployment")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Same as name")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("project_id", AttributeType::Number)
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("image", AttributeType::String)
                    .description("Container image")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("listening_port", AttributeType::Number)
                    .required()
                    .validator(NumberRangeValidator::between(1.0, 65535.0))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("flavor_name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("auth_enabled", AttributeType::Bool)
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("command", AttributeType::list(AttributeType::String))
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("envs", AttributeType::map(AttributeType::String))
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("address", AttributeType::String)
                    .description("Public endpoint")
                    .computed()
                    .build(),
            )
            .block(containers)
            .block(timeouts_block(&[
                TimeoutOperation::Create,
                TimeoutOperation::Update,
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

        match self.create_deployment(&ctx, data, &request.planned_state).await {
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
        let (project_id, name) = match (required_i64(state, "project_id"), required_string(state, "name")) {
            (Ok(p), Ok(n)) => (p, n),
            (Err(diag), _) | (_, Err(diag)) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                    private: request.private,
                    deferred: None,
                }
            }
        };

        match data.client.cloud().inference(project_id).get(&name).await {
            Ok(deployment) => {
                let mut new_state = request.current_state.clone();
                apply_deployment(&mut new_state, &deployment);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(deployment = %name, "inference deployment not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read inference deployment", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        match self
            .update_deployment(&ctx, data, &request.prior_state, &request.planned_state)
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(e) => {
                let (new_state, diagnostics) = e.into_response(request.prior_state);
                UpdateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics,
                }
            }
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let prior = &request.prior_state;
        let (project_id, name, timeouts) = match (
            required_i64(prior, "project_id"),
            required_string(prior, "name"),
            resolve_timeouts(prior, DEFAULT_TIMEOUTS),
        ) {
            (Ok(p), Ok(n), Ok(t)) => (p, n, t),
            (Err(diag), _, _) | (_, Err(diag), _) | (_, _, Err(diag)) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        let results = match data.client.cloud().inference(project_id).delete(&name).await {
            Ok(results) => results,
            Err(e) if e.is_not_found() => return DeleteResourceResponse { diagnostics: vec![] },
            Err(e) => {
                return DeleteResourceResponse {
                    diagnostics: vec![api_error("Failed to delete inference deployment", &e)],
                }
            }
        };

        let diagnostics = match wait_finished(&ctx, &data.client, &results, timeouts.delete).await {
            Ok(()) => vec![],
            Err(e) => vec![api_error("Failed to delete inference deployment", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for InferenceDeploymentResource {
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
impl ResourceWithImportState for InferenceDeploymentResource {
    /// `<project_id>:<name>`
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = empty_import_response();
        import_state_composite_id(
            &ctx,
            &[("project_id", AttributeType::Number), ("name", AttributeType::String)],
            &request,
            &mut response,
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::{object, provider_data, string_map as envs, value};
    use mockito::{Matcher, Server};
    use tfplug::types::ClientCapabilities;

    fn deployment_body(status: &str, image: &str) -> String {
        format!(
            r#"{{"name":"llama","image":"{}","listening_port":8080,"flavor_name":"inference-4vcpu-16gib",
                "status":"{}","address":"https://llama.ai.example","description":null,
                "auth_enabled":false,"command":null,"envs":{{"MODEL":"7b"}},
                "containers":[{{"region_id":76,"scale":{{"min":1,"max":2}},"address":null}}]}}"#,
            image, status
        )
    }

    fn resource(url: &str) -> InferenceDeploymentResource {
        InferenceDeploymentResource {
            provider_data: Some(provider_data(url)),
        }
    }

    fn planned(image: &str, scale_max: f64) -> DynamicValue {
        value(&[
            ("id", Dynamic::Unknown),
            ("project_id", Dynamic::Number(1.0)),
            ("name", Dynamic::from("llama")),
            ("image", Dynamic::from(image)),
            ("listening_port", Dynamic::Number(8080.0)),
            ("flavor_name", Dynamic::from("inference-4vcpu-16gib")),
            ("description", Dynamic::Null),
            ("auth_enabled", Dynamic::Bool(false)),
            ("command", Dynamic::Null),
            ("envs", envs(&[("MODEL", "7b")])),
            ("status", Dynamic::Unknown),
            ("address", Dynamic::Unknown),
            (
                "containers",
                Dynamic::List(vec![object(&[
                    ("region_id", Dynamic::Number(76.0)),
                    ("scale_min", Dynamic::Number(1.0)),
                    ("scale_max", Dynamic::Number(scale_max)),
                ])]),
            ),
            ("timeouts", Dynamic::Null),
        ])
    }

    #[test]
    fn update_request_holds_only_changes() {
        let request = update_request(&planned("llama:1", 2.0), &planned("llama:2", 3.0));
        assert_eq!(request.image.as_deref(), Some("llama:2"));
        assert_eq!(request.containers.unwrap()[0].scale.max, 3);
        assert!(request.envs.is_none());
        assert!(request.flavor_name.is_none());
        assert!(request.command.is_none());

        assert!(update_request(&planned("llama:1", 2.0), &planned("llama:1", 2.0)).is_empty());
    }

    #[tokio::test]
    async fn create_waits_for_rollout() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/v3/inference/1/deployments")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "name": "llama",
                "image": "llama:1",
                "containers": [{"region_id": 76, "scale": {"min": 1, "max": 2}}],
                "envs": {"MODEL": "7b"},
            })))
            .with_body(r#"{"tasks":["t-1"]}"#)
            .create_async()
            .await;
        let _task = server
            .mock("GET", "/v1/tasks/t-1")
            .with_body(r#"{"id":"t-1","state":"FINISHED"}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/v3/inference/1/deployments/llama")
            .with_body(deployment_body("ACTIVE", "llama:1"))
            .create_async()
            .await;

        let response = resource(&server.url())
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "gcore_inference_deployment".to_string(),
                    planned_state: planned("llama:1", 2.0),
                    config: planned("llama:1", 2.0),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "llama");
        assert_eq!(state.get_string(&AttributePath::new("status")).unwrap(), "ACTIVE");
        assert_eq!(
            state.get_string(&AttributePath::new("address")).unwrap(),
            "https://llama.ai.example"
        );
        assert!(state.get(&AttributePath::new("description")).unwrap().is_null());
        create.assert_async().await;
    }

    #[tokio::test]
    async fn failed_rollout_keeps_deployment_in_state() {
        let mut server = Server::new_async().await;
        let _create = server
            .mock("POST", "/v3/inference/1/deployments")
            .with_body(r#"{"tasks":["t-1"]}"#)
            .create_async()
            .await;
        let _task = server
            .mock("GET", "/v1/tasks/t-1")
            .with_body(r#"{"id":"t-1","state":"FINISHED"}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/v3/inference/1/deployments/llama")
            .with_body(deployment_body("FAILED", "llama:1"))
            .create_async()
            .await;

        let response = resource(&server.url())
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "gcore_inference_deployment".to_string(),
                    planned_state: planned("llama:1", 2.0),
                    config: planned("llama:1", 2.0),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("FAILED"));
        let state = response.new_state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "llama");
        assert!(!state.value.contains_unknown());
    }

    #[tokio::test]
    async fn update_patches_changed_fields() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/v3/inference/1/deployments/llama")
            .match_body(Matcher::Json(serde_json::json!({"image": "llama:2"})))
            .with_body(r#"{"tasks":["t-2"]}"#)
            .create_async()
            .await;
        let _task = server
            .mock("GET", "/v1/tasks/t-2")
            .with_body(r#"{"id":"t-2","state":"FINISHED"}"#)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/v3/inference/1/deployments/llama")
            .with_body(deployment_body("ACTIVE", "llama:2"))
            .create_async()
            .await;

        let mut prior = planned("llama:1", 2.0);
        prior.set_string(&AttributePath::new("id"), "llama".to_string()).unwrap();
        let response = resource(&server.url())
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "gcore_inference_deployment".to_string(),
                    prior_state: prior,
                    planned_state: planned("llama:2", 2.0),
                    config: planned("llama:2", 2.0),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response.new_state.get_string(&AttributePath::new("image")).unwrap(),
            "llama:2"
        );
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn import_takes_project_and_name() {
        let response = InferenceDeploymentResource::new()
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "gcore_inference_deployment".to_string(),
                    id: "1:llama".to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_i64(&AttributePath::new("project_id")).unwrap(), 1);
        assert_eq!(state.get_string(&AttributePath::new("name")).unwrap(), "llama");
    }
}
