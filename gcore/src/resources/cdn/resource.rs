//! CDN resource
//!
//! Options are table driven: every entry of [`OPTIONS`] becomes a nested
//! block under `options` holding `enabled` and a typed `value`, and maps to
//! `{"enabled": .., "value": ..}` in the API payload.

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import_state_passthrough_id;
use tfplug::plan_modifier::RequiresReplaceIfChanged;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{
    AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, NestingMode, SchemaBuilder,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

use crate::api::cdn::{CdnResource, CdnResourceRequest};
use crate::resources::common::{
    api_error, configure_provider_data, dynamic_to_json, empty_import_response, id_attribute,
    json_to_dynamic, not_configured, numeric_id, optional_bool, optional_i64, optional_string,
    set_bool, set_optional_string, set_string, single_block, string_list, strings_to_dynamic,
};

const ORIGIN_PROTOCOLS: [&str; 3] = ["HTTP", "HTTPS", "MATCH"];

#[derive(Clone, Copy)]
enum OptionValue {
    Bool,
    String,
    /// Whole seconds, sent as a "<n>s" string
    Seconds,
    StringList,
    StringMap,
}

impl OptionValue {
    fn attribute_type(self) -> AttributeType {
        match self {
            OptionValue::Bool => AttributeType::Bool,
            OptionValue::Seconds => AttributeType::Number,
            OptionValue::String => AttributeType::String,
            OptionValue::StringList => AttributeType::list(AttributeType::String),
            OptionValue::StringMap => AttributeType::map(AttributeType::String),
        }
    }
}

/// Terraform block name, API option name, value type
const OPTIONS: &[(&str, &str, OptionValue)] = &[
    ("allowed_http_methods", "allowedHttpMethods", OptionValue::StringList),
    ("browser_cache_settings", "browser_cache_settings", OptionValue::String),
    ("cors", "cors", OptionValue::StringList),
    ("fetch_compressed", "fetch_compressed", OptionValue::Bool),
    ("follow_origin_redirect", "follow_origin_redirect", OptionValue::StringList),
    ("gzip_on", "gzipOn", OptionValue::Bool),
    ("host_header", "hostHeader", OptionValue::String),
    ("ignore_cookie", "ignore_cookie", OptionValue::Bool),
    ("ignore_query_string", "ignoreQueryString", OptionValue::Bool),
    ("image_stack", "image_stack", OptionValue::Bool),
    ("redirect_http_to_https", "redirect_http_to_https", OptionValue::Bool),
    ("response_headers_hiding_policy", "response_headers_hiding_policy", OptionValue::StringList),
    ("rewrite", "rewrite", OptionValue::String),
    ("slice", "slice", OptionValue::Bool),
    ("sni_host", "sni", OptionValue::String),
    ("static_headers", "staticHeaders", OptionValue::StringMap),
    ("static_request_headers", "staticRequestHeaders", OptionValue::StringMap),
    ("tls_versions", "tls_versions", OptionValue::StringList),
    ("use_rsa_le_cert", "use_rsa_le_cert", OptionValue::Bool),
    ("websockets", "websockets", OptionValue::Bool),
    ("edge_cache_ttl", "edge_cache_settings", OptionValue::Seconds),
];

fn option_block((name, _, kind): &(&str, &str, OptionValue)) -> NestedBlock {
    NestedBlockBuilder::new(name, NestingMode::List)
        .attribute(
            AttributeBuilder::new("enabled", AttributeType::Bool)
                .optional()
                .computed()
                .default(StaticDefault::bool(true))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("value", kind.attribute_type())
                .required()
                .build(),
        )
        .max_items(1)
        .build()
}

/// The `options` block as the API's option object. Unset options are left
/// out; the API keeps them at their defaults.
fn options_to_json(value: &DynamicValue) -> serde_json::Map<String, serde_json::Value> {
    let Some(options) = single_block(value, "options") else {
        return serde_json::Map::new();
    };

    let mut json = serde_json::Map::new();
    for (name, api_name, kind) in OPTIONS {
        let Some(block) = options.field(name).and_then(first_element) else {
            continue;
        };
        let enabled = block.field("enabled").and_then(Dynamic::as_bool).unwrap_or(true);
        let raw = block.field("value").unwrap_or(&Dynamic::Null);
        let value = match kind {
            OptionValue::Seconds => serde_json::json!(raw.as_i64().map(|ttl| format!("{}s", ttl))),
            _ => dynamic_to_json(raw),
        };
        json.insert(
            api_name.to_string(),
            serde_json::json!({"enabled": enabled, "value": value}),
        );
    }
    json
}

fn first_element(block: &Dynamic) -> Option<&Dynamic> {
    match block {
        Dynamic::List(items) => items.first(),
        Dynamic::Map(_) => Some(block),
        _ => None,
    }
}

/// Builds the elements of the `options` block from the API. With
/// `only_known`, options not already present in `prior` are skipped so
/// server-side defaults do not show up as drift.
fn options_from_json(
    api: &serde_json::Map<String, serde_json::Value>,
    prior: Option<&Dynamic>,
    only_known: bool,
) -> Vec<Dynamic> {
    let mut fields = HashMap::new();
    for (name, api_name, kind) in OPTIONS {
        let known = prior
            .and_then(|p| p.field(name))
            .and_then(first_element)
            .is_some();
        let option = api.get(*api_name).filter(|v| !v.is_null());
        let block = match option {
            Some(option) if known || !only_known => {
                let enabled = option.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true);
                let raw = option.get("value").cloned().unwrap_or(serde_json::Value::Null);
                let value = match kind {
                    OptionValue::Seconds => raw
                        .as_str()
                        .and_then(|s| s.trim_end_matches('s').parse::<f64>().ok())
                        .map(Dynamic::Number)
                        .unwrap_or(Dynamic::Null),
                    _ => json_to_dynamic(&raw),
                };
                Dynamic::List(vec![Dynamic::Map(HashMap::from([
                    ("enabled".to_string(), Dynamic::Bool(enabled)),
                    ("value".to_string(), value),
                ]))])
            }
            _ => Dynamic::List(vec![]),
        };
        fields.insert(name.to_string(), block);
    }

    let empty = fields.values().all(|b| matches!(b, Dynamic::List(items) if items.is_empty()));
    if empty && prior.is_none() {
        vec![]
    } else {
        vec![Dynamic::Map(fields)]
    }
}

fn request_from(value: &DynamicValue) -> CdnResourceRequest {
    CdnResourceRequest {
        cname: optional_string(value, "cname"),
        origin: optional_string(value, "origin"),
        origin_group: optional_i64(value, "origin_group"),
        origin_protocol: optional_string(value, "origin_protocol").unwrap_or_else(|| "HTTP".to_string()),
        secondary_hostnames: string_list(value, "secondary_hostnames"),
        active: optional_bool(value, "active").unwrap_or(true),
        description: optional_string(value, "description"),
        options: options_to_json(value),
    }
}

fn apply_resource(state: &mut DynamicValue, resource: &CdnResource, only_known_options: bool) {
    set_string(state, "id", resource.id.to_string());
    set_string(state, "cname", resource.cname.clone());
    set_string(state, "origin_protocol", resource.origin_protocol.clone());
    set_bool(state, "active", resource.active);
    set_string(state, "status", resource.status.clone());
    if let Some(group) = resource.origin_group {
        let _ = state.set_number(&AttributePath::new("origin_group"), group as f64);
    }
    if optional_string(state, "origin").is_none() {
        set_optional_string(state, "origin", resource.origin_group_name.clone());
    }
    if optional_string(state, "description").is_some()
        || resource.description.as_deref().is_some_and(|d| !d.is_empty())
    {
        set_optional_string(state, "description", resource.description.clone());
    }

    let hostnames_null = state
        .get(&AttributePath::new("secondary_hostnames"))
        .map(Dynamic::is_null)
        .unwrap_or(true);
    if !(hostnames_null && resource.secondary_hostnames.is_empty()) {
        let _ = state.set_list(
            &AttributePath::new("secondary_hostnames"),
            strings_to_dynamic(&resource.secondary_hostnames),
        );
    }

    let prior = single_block(state, "options").cloned();
    let options = options_from_json(&resource.options, prior.as_ref(), only_known_options);
    let _ = state.set_list(&AttributePath::new("options"), options);
}

#[derive(Default)]
pub struct CdnResourceResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl CdnResourceResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for CdnResourceResource {
    fn type_name(&self) -> &str {
        "gcore_cdn_resource"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let options = OPTIONS
            .iter()
            .fold(
                NestedBlockBuilder::new("options", NestingMode::List)
                    .description("CDN delivery options"),
                |builder, option| builder.block(option_block(option)),
            )
            .max_items(1)
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a CDN resource")
            .attribute(id_attribute("CDN resource ID"))
            .attribute(
                AttributeBuilder::new("cname", AttributeType::String)
                    .description("Delivery domain")
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("origin", AttributeType::String)
                    .description("Origin host; conflicts with origin_group")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("origin_group", AttributeType::Number)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("origin_protocol", AttributeType::String)
                    .optional()
                    .computed()
                    .default(StaticDefault::string("HTTP"))
                    .validator(StringOneOfValidator::create(&ORIGIN_PROTOCOLS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secondary_hostnames", AttributeType::set(AttributeType::String))
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("active", AttributeType::Bool)
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .block(options)
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
        let is_set = |name: &str| {
            request
                .config
                .get(&AttributePath::new(name))
                .map(|v| !v.is_null())
                .unwrap_or(false)
        };
        let diagnostics = match (is_set("origin"), is_set("origin_group")) {
            (true, true) => vec![Diagnostic::error(
                "Conflicting origin",
                "Only one of origin and origin_group can be set",
            )
            .with_attribute(AttributePath::new("origin_group"))],
            (false, false) => vec![Diagnostic::error(
                "Missing origin",
                "One of origin or origin_group must be set",
            )],
            _ => vec![],
        };
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };

        match data
            .client
            .cdn()
            .resources()
            .create(&request_from(&request.planned_state))
            .await
        {
            Ok(resource) => {
                tracing::info!(cdn_resource_id = resource.id, "CDN resource created");
                let mut new_state = request.planned_state;
                apply_resource(&mut new_state, &resource, true);
                CreateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics: vec![],
                }
            }
            Err(e) => CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to create CDN resource", &e)],
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

        match data.client.cdn().resources().get(id).await {
            Ok(resource) => {
                // a freshly imported state has nothing but the id
                let importing = optional_string(&request.current_state, "cname").is_none();
                let mut new_state = request.current_state.clone();
                apply_resource(&mut new_state, &resource, !importing);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(cdn_resource_id = id, "CDN resource not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read CDN resource", &e)],
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

        let id = match numeric_id(&request.prior_state) {
            Ok(id) => id,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };

        let mut body = request_from(&request.planned_state);
        // the update endpoint does not take the cname
        body.cname = None;
        match data.client.cdn().resources().update(id, &body).await {
            Ok(resource) => {
                let mut new_state = request.planned_state;
                apply_resource(&mut new_state, &resource, true);
                UpdateResourceResponse {
                    new_state,
                    private: vec![],
                    diagnostics: vec![],
                }
            }
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to update CDN resource", &e)],
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
            Ok(id) => match data.client.cdn().resources().delete(id).await {
                Ok(()) => vec![],
                Err(e) if e.is_not_found() => vec![],
                Err(e) => vec![api_error("Failed to delete CDN resource", &e)],
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
impl ResourceWithConfigure for CdnResourceResource {
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
impl ResourceWithImportState for CdnResourceResource {
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
    use crate::resources::test_helpers::{object, provider_data, strings, value};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tfplug::types::ClientCapabilities;

    const RESOURCE: &str = r#"{"id":101,"cname":"cdn.example.com","originGroup":55,
        "originGroup_name":"origin.example.com","originProtocol":"HTTPS",
        "secondaryHostnames":[],"active":true,"status":"active","description":null,
        "options":{"gzipOn":{"enabled":true,"value":true},
                   "cors":{"enabled":true,"value":["*"]},
                   "websockets":{"enabled":false,"value":false},
                   "hostHeader":null}}"#;

    fn resource(url: &str) -> CdnResourceResource {
        CdnResourceResource {
            provider_data: Some(provider_data(url)),
        }
    }

    fn option(value: Dynamic) -> Dynamic {
        Dynamic::List(vec![object(&[
            ("enabled", Dynamic::Bool(true)),
            ("value", value),
        ])])
    }

    fn planned() -> DynamicValue {
        value(&[
            ("id", Dynamic::Unknown),
            ("cname", Dynamic::from("cdn.example.com")),
            ("origin", Dynamic::from("origin.example.com")),
            ("origin_group", Dynamic::Unknown),
            ("origin_protocol", Dynamic::from("HTTPS")),
            ("secondary_hostnames", Dynamic::Null),
            ("active", Dynamic::Bool(true)),
            ("description", Dynamic::Null),
            ("status", Dynamic::Unknown),
            (
                "options",
                Dynamic::List(vec![object(&[
                    ("gzip_on", option(Dynamic::Bool(true))),
                    ("cors", option(strings(&["*"]))),
                ])]),
            ),
        ])
    }

    #[test]
    fn options_map_to_api_names() {
        let json = options_to_json(&planned());
        assert_eq!(json["gzipOn"], json!({"enabled": true, "value": true}));
        assert_eq!(json["cors"], json!({"enabled": true, "value": ["*"]}));
        assert_eq!(json.len(), 2);
    }

    #[test]
    fn edge_cache_ttl_uses_seconds_string() {
        let config = value(&[(
            "options",
            Dynamic::List(vec![object(&[(
                "edge_cache_ttl",
                option(Dynamic::Number(3600.0)),
            )])]),
        )]);
        let json = options_to_json(&config);
        assert_eq!(
            json["edge_cache_settings"],
            json!({"enabled": true, "value": "3600s"})
        );
    }

    #[test]
    fn read_keeps_only_configured_options() {
        let api: serde_json::Map<String, serde_json::Value> = serde_json::from_value(json!({
            "gzipOn": {"enabled": true, "value": true},
            "websockets": {"enabled": false, "value": false},
        }))
        .unwrap();
        let prior = object(&[("gzip_on", option(Dynamic::Bool(true)))]);

        let options = options_from_json(&api, Some(&prior), true);
        let block = &options[0];
        assert_eq!(block.field("gzip_on").unwrap().as_list().unwrap().len(), 1);
        assert!(block.field("websockets").unwrap().as_list().unwrap().is_empty());

        let imported = options_from_json(&api, None, false);
        let block = &imported[0];
        assert_eq!(block.field("websockets").unwrap().as_list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn origin_and_origin_group_conflict() {
        let mut config = planned();
        config
            .set_number(&AttributePath::new("origin_group"), 55.0)
            .unwrap();
        let response = CdnResourceResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "gcore_cdn_resource".to_string(),
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "Conflicting origin");
    }

    #[tokio::test]
    async fn create_posts_options() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/cdn/resources")
            .match_body(Matcher::Json(json!({
                "cname": "cdn.example.com",
                "origin": "origin.example.com",
                "originProtocol": "HTTPS",
                "secondaryHostnames": [],
                "active": true,
                "options": {
                    "gzipOn": {"enabled": true, "value": true},
                    "cors": {"enabled": true, "value": ["*"]},
                },
            })))
            .with_status(201)
            .with_body(RESOURCE)
            .create_async()
            .await;

        let response = resource(&server.url())
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "gcore_cdn_resource".to_string(),
                    planned_state: planned(),
                    config: planned(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "101");
        assert_eq!(state.get_i64(&AttributePath::new("origin_group")).unwrap(), 55);
        assert_eq!(state.get_string(&AttributePath::new("status")).unwrap(), "active");
        assert!(state
            .get(&AttributePath::new("secondary_hostnames"))
            .unwrap()
            .is_null());
        create.assert_async().await;
    }

    #[tokio::test]
    async fn update_omits_cname() {
        let mut server = Server::new_async().await;
        let update = server
            .mock("PUT", "/cdn/resources/101")
            .match_body(Matcher::Json(json!({
                "origin": "origin.example.com",
                "originProtocol": "HTTPS",
                "secondaryHostnames": [],
                "active": false,
                "options": {
                    "gzipOn": {"enabled": true, "value": true},
                    "cors": {"enabled": true, "value": ["*"]},
                },
            })))
            .with_body(RESOURCE.replace(r#""active":true"#, r#""active":false"#))
            .create_async()
            .await;

        let mut prior = planned();
        prior.set_string(&AttributePath::new("id"), "101".to_string()).unwrap();
        let mut next = prior.clone();
        next.set_bool(&AttributePath::new("active"), false).unwrap();

        let response = resource(&server.url())
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "gcore_cdn_resource".to_string(),
                    prior_state: prior,
                    planned_state: next.clone(),
                    config: next,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert!(!response.new_state.get_bool(&AttributePath::new("active")).unwrap());
        update.assert_async().await;
    }

    #[tokio::test]
    async fn read_removes_missing_resource() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/cdn/resources/101")
            .with_status(404)
            .with_body(r#"{"message":"not found"}"#)
            .create_async()
            .await;

        let response = resource(&server.url())
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "gcore_cdn_resource".to_string(),
                    current_state: value(&[("id", Dynamic::from("101"))]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        assert!(response.new_state.is_none());
        assert!(response.diagnostics.is_empty());
    }
}
