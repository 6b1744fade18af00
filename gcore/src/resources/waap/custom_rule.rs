use super::rule::{optional, required, Field, Kind, RuleFlavor, RuleResource, Variant};
use crate::api::waap::RuleKind;

const MATCH_TYPE: Field = optional("match_type", Kind::String);

const CONDITIONS: &[Variant] = &[
    Variant {
        name: "ip",
        fields: &[required("ip_address", Kind::String)],
    },
    Variant {
        name: "ip_range",
        fields: &[
            required("lower_bound", Kind::String),
            required("upper_bound", Kind::String),
        ],
    },
    Variant {
        name: "url",
        fields: &[required("url", Kind::String), MATCH_TYPE],
    },
    Variant {
        name: "user_agent",
        fields: &[required("user_agent", Kind::String), MATCH_TYPE],
    },
    Variant {
        name: "header",
        fields: &[
            required("header", Kind::String),
            required("value", Kind::String),
            MATCH_TYPE,
        ],
    },
    Variant {
        name: "header_exists",
        fields: &[required("header", Kind::String)],
    },
    Variant {
        name: "response_header",
        fields: &[
            required("header", Kind::String),
            required("value", Kind::String),
            MATCH_TYPE,
        ],
    },
    Variant {
        name: "http_method",
        fields: &[required("http_method", Kind::String)],
    },
    Variant {
        name: "file_extension",
        fields: &[required("file_extension", Kind::StringList)],
    },
    Variant {
        name: "country",
        fields: &[required("country_code", Kind::StringList)],
    },
    Variant {
        name: "organization",
        fields: &[required("organization", Kind::String)],
    },
    Variant {
        name: "owner_types",
        fields: &[optional("owner_types", Kind::StringList)],
    },
    Variant {
        name: "request_rate",
        fields: &[
            required("path_pattern", Kind::String),
            required("requests", Kind::Number),
            required("time", Kind::Number),
            optional("http_methods", Kind::StringList),
            optional("ips", Kind::StringList),
            optional("user_defined_tag", Kind::String),
        ],
    },
    Variant {
        name: "session_request_count",
        fields: &[required("request_count", Kind::Number)],
    },
    Variant {
        name: "tags",
        fields: &[required("tags", Kind::StringList)],
    },
];

const ACTIONS: &[Variant] = &[
    Variant {
        name: "allow",
        fields: &[],
    },
    Variant {
        name: "block",
        fields: &[
            optional("status_code", Kind::Number),
            optional("action_duration", Kind::String),
        ],
    },
    Variant {
        name: "captcha",
        fields: &[],
    },
    Variant {
        name: "handshake",
        fields: &[],
    },
    Variant {
        name: "monitor",
        fields: &[],
    },
    Variant {
        name: "tag",
        fields: &[required("tags", Kind::StringList)],
    },
];

pub struct CustomRule;

impl RuleFlavor for CustomRule {
    const TYPE_NAME: &'static str = "gcore_waap_custom_rule";
    const KIND: RuleKind = RuleKind::Custom;
    const DESCRIPTION: &'static str = "Manages a custom rule of a WAAP domain";
    const CONDITIONS: &'static [Variant] = CONDITIONS;
    const ACTIONS: &'static [Variant] = ACTIONS;
    const MAX_CONDITIONS: i64 = 5;

    fn action_default(action: &str, field: &str) -> Option<f64> {
        (action == "block" && field == "status_code").then_some(403.0)
    }
}

pub type CustomRuleResource = RuleResource<CustomRule>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::waap::rule::rule_request;
    use crate::resources::test_helpers::{object, provider_data, strings, value};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tfplug::context::Context;
    use tfplug::resource::{
        CreateResourceRequest, ImportResourceStateRequest, ReadResourceRequest, Resource,
        ResourceWithImportState, UpdateResourceRequest, ValidateResourceConfigRequest,
    };
    use tfplug::types::{AttributePath, ClientCapabilities, Dynamic, DynamicValue};

    /// A block element with only `name` set among `variants`
    fn element(variants: &[Variant], name: &str, fields: Dynamic) -> Dynamic {
        object(
            &variants
                .iter()
                .map(|v| {
                    let items = if v.name == name { vec![fields.clone()] } else { vec![] };
                    (v.name, Dynamic::List(items))
                })
                .collect::<Vec<_>>(),
        )
    }

    fn rule(enabled: bool, countries: &[&str]) -> DynamicValue {
        value(&[
            ("id", Dynamic::from("41")),
            ("domain_id", Dynamic::Number(7.0)),
            ("name", Dynamic::from("geo-block")),
            ("description", Dynamic::Null),
            ("enabled", Dynamic::Bool(enabled)),
            (
                "action",
                Dynamic::List(vec![element(
                    ACTIONS,
                    "block",
                    object(&[
                        ("status_code", Dynamic::Number(403.0)),
                        ("action_duration", Dynamic::from("1h")),
                    ]),
                )]),
            ),
            (
                "condition",
                Dynamic::List(vec![element(
                    CONDITIONS,
                    "country",
                    object(&[
                        ("country_code", strings(countries)),
                        ("negation", Dynamic::Bool(false)),
                    ]),
                )]),
            ),
        ])
    }

    const RULE_BODY: &str = r#"{"id":41,"name":"geo-block","description":null,"enabled":true,
        "action":{"block":{"status_code":403,"action_duration":"1h"}},
        "conditions":[{"country":{"country_code":["KP"],"negation":false}},
                      {"unsupported_condition":{"negation":true}}]}"#;

    #[test]
    fn request_uses_single_key_objects() {
        let request = tokio_test::assert_ok!(rule_request::<CustomRule>(&rule(true, &["KP", "IR"])));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "name": "geo-block",
                "enabled": true,
                "action": {"block": {"status_code": 403, "action_duration": "1h"}},
                "conditions": [{"country": {"country_code": ["KP", "IR"], "negation": false}}],
            })
        );
    }

    #[test]
    fn request_requires_one_condition_variant() {
        let mut value = rule(true, &["KP"]);
        let empty = element(CONDITIONS, "none", object(&[]));
        value
            .set_list(&AttributePath::new("condition"), vec![empty])
            .unwrap();
        let diag = tokio_test::assert_err!(rule_request::<CustomRule>(&value));
        assert_eq!(diag.summary, "Invalid condition block");
    }

    #[tokio::test]
    async fn validate_rejects_two_actions() {
        let mut config = rule(true, &["KP"]);
        let action = object(&[
            ("allow", Dynamic::List(vec![object(&[])])),
            ("block", Dynamic::List(vec![object(&[])])),
        ]);
        config
            .set_list(&AttributePath::new("action"), vec![action])
            .unwrap();

        let response = CustomRuleResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "gcore_waap_custom_rule".to_string(),
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Invalid action block");
    }

    #[tokio::test]
    async fn create_posts_rule() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/v1/domains/7/custom-rules")
            .match_body(Matcher::PartialJson(json!({
                "conditions": [{"country": {"country_code": ["KP"], "negation": false}}],
            })))
            .with_status(201)
            .with_body(RULE_BODY)
            .create_async()
            .await;

        let mut planned = rule(true, &["KP"]);
        planned.mark_unknown(&AttributePath::new("id")).unwrap();
        let response = CustomRuleResource::with_provider_data(provider_data(&server.url()))
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "gcore_waap_custom_rule".to_string(),
                    planned_state: planned.clone(),
                    config: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            response.new_state.get_string(&AttributePath::new("id")).unwrap(),
            "41"
        );
        create.assert_async().await;
    }

    #[tokio::test]
    async fn disabling_only_toggles() {
        let mut server = Server::new_async().await;
        let disable = server
            .mock("PATCH", "/v1/domains/7/custom-rules/41/disable")
            .with_status(204)
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/v1/domains/7/custom-rules/41")
            .expect(0)
            .create_async()
            .await;

        let response = CustomRuleResource::with_provider_data(provider_data(&server.url()))
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "gcore_waap_custom_rule".to_string(),
                    prior_state: rule(true, &["KP"]),
                    planned_state: rule(false, &["KP"]),
                    config: rule(false, &["KP"]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        disable.assert_async().await;
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn condition_change_patches_rule() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/v1/domains/7/custom-rules/41")
            .match_body(Matcher::PartialJson(json!({
                "conditions": [{"country": {"country_code": ["KP", "IR"], "negation": false}}],
            })))
            .with_status(204)
            .create_async()
            .await;

        let response = CustomRuleResource::with_provider_data(provider_data(&server.url()))
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "gcore_waap_custom_rule".to_string(),
                    prior_state: rule(true, &["KP"]),
                    planned_state: rule(true, &["KP", "IR"]),
                    config: rule(true, &["KP", "IR"]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn read_skips_unsupported_conditions() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/v1/domains/7/custom-rules/41")
            .with_body(RULE_BODY)
            .create_async()
            .await;

        let response = CustomRuleResource::with_provider_data(provider_data(&server.url()))
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "gcore_waap_custom_rule".to_string(),
                    current_state: rule(true, &["IR"]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        let conditions = state.get_list(&AttributePath::new("condition")).unwrap();
        assert_eq!(conditions.len(), 1);
        let expected = rule(true, &["KP"]).get_list(&AttributePath::new("condition")).unwrap();
        assert_eq!(conditions[0], expected[0]);
    }

    #[tokio::test]
    async fn import_splits_domain_and_rule() {
        let response = CustomRuleResource::new()
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "gcore_waap_custom_rule".to_string(),
                    id: "7:41".to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_i64(&AttributePath::new("domain_id")).unwrap(), 7);
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "41");
    }
}
