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
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::timeouts::{timeouts_block, TimeoutOperation, Timeouts};
use tfplug::types::DynamicValue;
use tfplug::validator::StringLengthValidator;

use crate::api::cloud::{CreateLoadBalancerRequest, LoadBalancer};
use crate::resources::common::{
    api_error, cloud_location, configure_provider_data, copy_attribute, id_attribute,
    import_cloud_id, not_configured, optional_string, project_id_attribute, region_id_attribute,
    required_string, resolve_timeouts, set_optional_string, set_string, set_string_map,
    string_map, wait_created, wait_finished, ApplyError,
};

const DEFAULT_TIMEOUTS: Timeouts = Timeouts::uniform(Duration::from_secs(40 * 60));

#[derive(Default)]
pub struct LoadBalancerResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl LoadBalancerResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_load_balancer(
        &self,
        ctx: &Context,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, ApplyError> {
        let (project_id, region_id) = cloud_location(planned)?;
        let timeouts = resolve_timeouts(planned, DEFAULT_TIMEOUTS)?;
        let api = data.client.cloud().load_balancers(project_id, region_id);

        let request = CreateLoadBalancerRequest {
            name: required_string(planned, "name")?,
            flavor: optional_string(planned, "flavor"),
            vip_network_id: optional_string(planned, "vip_network_id"),
            vip_subnet_id: optional_string(planned, "vip_subnet_id"),
            metadata: string_map(planned, "tags"),
        };
        let results = api
            .create(&request)
            .await
            .map_err(|e| api_error("Failed to create load balancer", &e))?;
        let id = wait_created(ctx, &data.client, &results, "loadbalancers", timeouts.create)
            .await
            .map_err(|e| api_error("Failed to create load balancer", &e))?;
        tracing::info!(load_balancer_id = %id, "load balancer created");

        let mut state = planned.clone();
        set_string(&mut state, "id", id.clone());

        let lb = api.get(&id).await.map_err(|e| {
            ApplyError::partial(api_error("Failed to read created load balancer", &e), &state)
        })?;
        apply_computed(&mut state, &lb);
        Ok(state)
    }

    async fn update_load_balancer(
        &self,
        data: &crate::GcoreProviderData,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, ApplyError> {
        let (project_id, region_id) = cloud_location(planned)?;
        let id = required_string(prior, "id")?;
        let api = data.client.cloud().load_balancers(project_id, region_id);
        let mut state = prior.clone();

        let name = required_string(planned, "name")?;
        if optional_string(prior, "name").as_deref() != Some(name.as_str()) {
            api.rename(&id, &name).await.map_err(|e| {
                ApplyError::partial(api_error("Failed to rename load balancer", &e), &state)
            })?;
            set_string(&mut state, "name", name);
        }

        let tags = string_map(planned, "tags");
        if tags != string_map(prior, "tags") {
            api.replace_metadata(&id, &tags).await.map_err(|e| {
                ApplyError::partial(api_error("Failed to update load balancer tags", &e), &state)
            })?;
            copy_attribute(&mut state, planned, "tags");
        }

        let lb = api.get(&id).await.map_err(|e| {
            ApplyError::partial(api_error("Failed to read load balancer", &e), &state)
        })?;
        let mut state = planned.clone();
        apply_computed(&mut state, &lb);
        Ok(state)
    }
}

fn apply_computed(state: &mut DynamicValue, lb: &LoadBalancer) {
    set_optional_string(state, "vip_address", lb.vip_address.clone());
    set_optional_string(state, "vip_port_id", lb.vip_port_id.clone());
    set_string(state, "provisioning_status", lb.provisioning_status.clone());
    set_string(state, "operating_status", lb.operating_status.clone());
}

fn apply_load_balancer(state: &mut DynamicValue, lb: &LoadBalancer) {
    set_string(state, "name", lb.name.clone());
    if let Some(flavor) = &lb.flavor {
        set_string(state, "flavor", flavor.flavor_name.clone());
    }
    set_string_map(state, "tags", &lb.metadata);
    apply_computed(state, lb);
}

#[async_trait]
impl Resource for LoadBalancerResource {
    fn type_name(&self) -> &str {
        "gcore_loadbalancer"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a cloud load balancer")
            .attribute(id_attribute("Load balancer ID"))
            .attribute(project_id_attribute())
            .attribute(region_id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(StringLengthValidator::between(1, 63))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("flavor", AttributeType::String)
                    .description("Flavor name, e.g. lb1-1-2")
                    .optional()
                    .computed()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vip_network_id", AttributeType::String)
                    .optional()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vip_subnet_id", AttributeType::String)
                    .optional()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::map(AttributeType::String))
                    .description("User metadata")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vip_address", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vip_port_id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("provisioning_status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("operating_status", AttributeType::String)
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

        match self.create_load_balancer(&ctx, data, &request.planned_state).await {
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
            .load_balancers(project_id, region_id)
            .get(&id)
            .await
        {
            Ok(lb) => {
                let mut new_state = request.current_state.clone();
                apply_load_balancer(&mut new_state, &lb);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(load_balancer_id = %id, "load balancer not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read load balancer", &e)],
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
            .update_load_balancer(data, &request.prior_state, &request.planned_state)
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

        let api = data.client.cloud().load_balancers(project_id, region_id);
        let results = match api.delete(&id).await {
            Ok(results) => results,
            Err(e) if e.is_not_found() => return DeleteResourceResponse { diagnostics: vec![] },
            Err(e) => {
                return DeleteResourceResponse {
                    diagnostics: vec![api_error("Failed to delete load balancer", &e)],
                }
            }
        };

        let diagnostics = match wait_finished(&ctx, &data.client, &results, timeouts.delete).await {
            Ok(()) => vec![],
            Err(e) => vec![api_error("Failed to delete load balancer", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for LoadBalancerResource {
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
impl ResourceWithImportState for LoadBalancerResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_cloud_id(&ctx, &request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::{provider_data, string_map as tags, value};
    use mockito::{Matcher, Server};
    use tfplug::types::{AttributePath, ClientCapabilities, Dynamic};

    const LB: &str = r#"{"id":"lb-1","name":"web-lb","vip_address":"203.0.113.10",
        "vip_port_id":"port-9","provisioning_status":"ACTIVE","operating_status":"ONLINE",
        "flavor":{"flavor_id":"f-1","flavor_name":"lb1-1-2"},
        "metadata":[{"key":"team","value":"web","read_only":false}]}"#;

    fn resource(url: &str) -> LoadBalancerResource {
        LoadBalancerResource {
            provider_data: Some(provider_data(url)),
        }
    }

    fn state(name: &str, tag_value: &str) -> DynamicValue {
        value(&[
            ("id", Dynamic::from("lb-1")),
            ("project_id", Dynamic::Number(1.0)),
            ("region_id", Dynamic::Number(76.0)),
            ("name", Dynamic::from(name)),
            ("flavor", Dynamic::from("lb1-1-2")),
            ("vip_network_id", Dynamic::Null),
            ("vip_subnet_id", Dynamic::Null),
            ("tags", tags(&[("team", tag_value)])),
            ("vip_address", Dynamic::Unknown),
            ("vip_port_id", Dynamic::Unknown),
            ("provisioning_status", Dynamic::Unknown),
            ("operating_status", Dynamic::Unknown),
            ("timeouts", Dynamic::Null),
        ])
    }

    #[tokio::test]
    async fn create_sends_tags_as_metadata() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/v1/loadbalancers/1/76")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "web-lb",
                "flavor": "lb1-1-2",
                "metadata": {"team": "web"},
            })))
            .with_body(r#"{"tasks":["t-1"]}"#)
            .create_async()
            .await;
        let _task = server
            .mock("GET", "/v1/tasks/t-1")
            .with_body(
                r#"{"id":"t-1","state":"FINISHED","created_resources":{"loadbalancers":["lb-1"]}}"#,
            )
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/v1/loadbalancers/1/76/lb-1")
            .with_body(LB)
            .create_async()
            .await;

        let mut planned = state("web-lb", "web");
        planned.mark_unknown(&AttributePath::new("id")).unwrap();
        let response = resource(&server.url())
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "gcore_loadbalancer".to_string(),
                    planned_state: planned.clone(),
                    config: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "lb-1");
        assert_eq!(
            state.get_string(&AttributePath::new("vip_address")).unwrap(),
            "203.0.113.10"
        );
        assert_eq!(
            state.get_string(&AttributePath::new("operating_status")).unwrap(),
            "ONLINE"
        );
        create.assert_async().await;
    }

    #[tokio::test]
    async fn update_renames_and_replaces_tags() {
        let mut server = Server::new_async().await;
        let rename = server
            .mock("PATCH", "/v1/loadbalancers/1/76/lb-1")
            .match_body(Matcher::Json(serde_json::json!({"name": "api-lb"})))
            .with_body(LB)
            .create_async()
            .await;
        let metadata = server
            .mock("PUT", "/v1/loadbalancers/1/76/lb-1/metadata")
            .match_body(Matcher::Json(serde_json::json!({"team": "api"})))
            .with_status(204)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/v1/loadbalancers/1/76/lb-1")
            .with_body(LB)
            .create_async()
            .await;

        let planned = state("api-lb", "api");
        let response = resource(&server.url())
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "gcore_loadbalancer".to_string(),
                    prior_state: state("web-lb", "web"),
                    planned_state: planned.clone(),
                    config: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        rename.assert_async().await;
        metadata.assert_async().await;
    }

    #[tokio::test]
    async fn create_keeps_id_when_reading_load_balancer_fails() {
        let mut server = Server::new_async().await;
        let _create = server
            .mock("POST", "/v1/loadbalancers/1/76")
            .with_body(r#"{"tasks":["t-2"]}"#)
            .create_async()
            .await;
        let _task = server
            .mock("GET", "/v1/tasks/t-2")
            .with_body(
                r#"{"id":"t-2","state":"FINISHED","created_resources":{"loadbalancers":["lb-2"]}}"#,
            )
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/v1/loadbalancers/1/76/lb-2")
            .with_status(503)
            .create_async()
            .await;

        let mut planned = state("web-lb", "web");
        planned.mark_unknown(&AttributePath::new("id")).unwrap();
        let response = resource(&server.url())
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "gcore_loadbalancer".to_string(),
                    planned_state: planned.clone(),
                    config: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        let state = response.new_state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "lb-2");
        assert!(!state.value.contains_unknown());
    }

    #[tokio::test]
    async fn update_keeps_rename_when_tag_update_fails() {
        let mut server = Server::new_async().await;
        let _rename = server
            .mock("PATCH", "/v1/loadbalancers/1/76/lb-1")
            .with_body(LB)
            .create_async()
            .await;
        let _metadata = server
            .mock("PUT", "/v1/loadbalancers/1/76/lb-1/metadata")
            .with_status(400)
            .with_body(r#"{"message":"invalid key"}"#)
            .create_async()
            .await;

        let planned = state("api-lb", "api");
        let response = resource(&server.url())
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "gcore_loadbalancer".to_string(),
                    prior_state: state("web-lb", "web"),
                    planned_state: planned.clone(),
                    config: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        let state = response.new_state;
        assert_eq!(state.get_string(&AttributePath::new("name")).unwrap(), "api-lb");
        assert_eq!(state.get_string_map(&AttributePath::new("tags")).unwrap()["team"], "web");
    }

    #[tokio::test]
    async fn imported_load_balancer_keeps_configured_vip_network() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/v1/loadbalancers/1/76/lb-1")
            .with_body(LB)
            .create_async()
            .await;
        let resource = resource(&server.url());

        let imported = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "gcore_loadbalancer".to_string(),
                    id: "1:76:lb-1".to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        let read = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "gcore_loadbalancer".to_string(),
                    current_state: imported.imported_resources[0].state.clone(),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        let prior = read.new_state.unwrap();

        let schema = resource
            .schema(Context::new(), ResourceSchemaRequest)
            .await
            .schema;
        let path = AttributePath::new("vip_network_id");
        let attribute = schema
            .block
            .attributes
            .iter()
            .find(|a| a.name == "vip_network_id")
            .unwrap();
        for modifier in &attribute.plan_modifiers {
            let response = modifier.modify(tfplug::schema::PlanModifierRequest {
                config_value: DynamicValue::new(Dynamic::from("net-1")),
                state_value: DynamicValue::new(prior.get(&path).cloned().unwrap_or(Dynamic::Null)),
                plan_value: DynamicValue::new(Dynamic::from("net-1")),
                path: path.clone(),
            });
            assert!(!response.requires_replace);
        }
    }

    #[tokio::test]
    async fn read_reports_server_side_changes() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/v1/loadbalancers/1/76/lb-1")
            .with_body(LB)
            .create_async()
            .await;

        let response = resource(&server.url())
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "gcore_loadbalancer".to_string(),
                    current_state: state("renamed-in-portal", "ops"),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        assert_eq!(state.get_string(&AttributePath::new("name")).unwrap(), "web-lb");
        assert_eq!(
            state
                .get_string_map(&AttributePath::new("tags"))
                .unwrap()
                .get("team")
                .map(String::as_str),
            Some("web")
        );
    }

    #[tokio::test]
    async fn delete_tolerates_missing_load_balancer() {
        let mut server = Server::new_async().await;
        let _delete = server
            .mock("DELETE", "/v1/loadbalancers/1/76/lb-1")
            .with_status(404)
            .with_body(r#"{"message":"not found"}"#)
            .create_async()
            .await;

        let response = resource(&server.url())
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "gcore_loadbalancer".to_string(),
                    prior_state: state("web-lb", "web"),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
    }
}
