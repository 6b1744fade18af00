use super::rule::{optional, required, Kind, RuleFlavor, RuleResource, Variant};
use crate::api::waap::RuleKind;

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
];

/// IP based allow and block lists, evaluated before custom rules
pub struct FirewallRule;

impl RuleFlavor for FirewallRule {
    const TYPE_NAME: &'static str = "gcore_waap_firewall_rule";
    const KIND: RuleKind = RuleKind::Firewall;
    const DESCRIPTION: &'static str = "Manages an IP firewall rule of a WAAP domain";
    const CONDITIONS: &'static [Variant] = CONDITIONS;
    const ACTIONS: &'static [Variant] = ACTIONS;
    const MAX_CONDITIONS: i64 = 5;

    fn action_default(action: &str, field: &str) -> Option<f64> {
        (action == "block" && field == "status_code").then_some(403.0)
    }
}

pub type FirewallRuleResource = RuleResource<FirewallRule>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::{object, provider_data, value};
    use mockito::Server;
    use tfplug::context::Context;
    use tfplug::resource::{
        DeleteResourceRequest, ReadResourceRequest, Resource, ResourceSchemaRequest,
    };
    use tfplug::types::{AttributePath, ClientCapabilities, Dynamic, DynamicValue};

    fn state() -> DynamicValue {
        value(&[
            ("id", Dynamic::from("5")),
            ("domain_id", Dynamic::Number(7.0)),
            ("name", Dynamic::from("office")),
            ("description", Dynamic::Null),
            ("enabled", Dynamic::Bool(true)),
            (
                "action",
                Dynamic::List(vec![object(&[
                    ("allow", Dynamic::List(vec![object(&[])])),
                    ("block", Dynamic::List(vec![])),
                ])]),
            ),
            ("condition", Dynamic::List(vec![])),
        ])
    }

    #[tokio::test]
    async fn schema_offers_only_ip_conditions() {
        let response = FirewallRuleResource::new()
            .schema(Context::new(), ResourceSchemaRequest)
            .await;
        let condition = response
            .schema
            .block
            .block_types
            .iter()
            .find(|b| b.type_name == "condition")
            .unwrap();
        let names: Vec<_> = condition
            .block
            .block_types
            .iter()
            .map(|b| b.type_name.as_str())
            .collect();
        assert_eq!(names, vec!["ip", "ip_range"]);
    }

    #[tokio::test]
    async fn read_flattens_ip_range() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/v1/domains/7/firewall-rules/5")
            .with_body(
                r#"{"id":5,"name":"office","description":"","enabled":false,
                    "action":{"allow":{}},
                    "conditions":[{"ip_range":{"lower_bound":"10.0.0.1","upper_bound":"10.0.0.9","negation":true}}]}"#,
            )
            .create_async()
            .await;

        let response = FirewallRuleResource::with_provider_data(provider_data(&server.url()))
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "gcore_waap_firewall_rule".to_string(),
                    current_state: state(),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        assert!(!state.get_bool(&AttributePath::new("enabled")).unwrap());
        assert!(state.get(&AttributePath::new("description")).unwrap().is_null());
        let range = AttributePath::new("condition")
            .index(0)
            .attribute("ip_range")
            .index(0);
        assert_eq!(
            state
                .get_string(&range.clone().attribute("upper_bound"))
                .unwrap(),
            "10.0.0.9"
        );
        assert!(state.get_bool(&range.attribute("negation")).unwrap());
    }

    #[tokio::test]
    async fn delete_tolerates_missing_rule() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("DELETE", "/v1/domains/7/firewall-rules/5")
            .with_status(404)
            .with_body(r#"{"detail":"not found"}"#)
            .create_async()
            .await;

        let response = FirewallRuleResource::with_provider_data(provider_data(&server.url()))
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "gcore_waap_firewall_rule".to_string(),
                    prior_state: state(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        delete.assert_async().await;
    }
}
