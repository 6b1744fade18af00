//! Custom and firewall rules of a WAAP domain
//!
//! Both rule kinds share one payload: a name, an enabled flag, an action
//! object with exactly one key (`{"block": {...}}`) and a list of condition
//! objects with exactly one key each (`{"ip": {"ip_address": .., "negation": ..}}`).

use crate::api::{client::Client, error::ApiError, Service};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Custom,
    Firewall,
}

impl RuleKind {
    fn collection(self) -> &'static str {
        match self {
            RuleKind::Custom => "custom-rules",
            RuleKind::Firewall => "firewall-rules",
        }
    }
}

pub struct WaapRulesApi<'a> {
    client: &'a Client,
    domain_id: i64,
    kind: RuleKind,
}

impl<'a> WaapRulesApi<'a> {
    pub fn new(client: &'a Client, domain_id: i64, kind: RuleKind) -> Self {
        Self {
            client,
            domain_id,
            kind,
        }
    }

    fn rules_path(&self) -> String {
        format!("/v1/domains/{}/{}", self.domain_id, self.kind.collection())
    }

    fn rule_path(&self, rule_id: i64) -> String {
        format!("{}/{}", self.rules_path(), rule_id)
    }

    pub async fn create(&self, request: &WaapRuleRequest) -> Result<WaapRule, ApiError> {
        self.client
            .post(Service::Waap, &self.rules_path(), request)
            .await
    }

    pub async fn get(&self, rule_id: i64) -> Result<WaapRule, ApiError> {
        self.client
            .get(Service::Waap, &self.rule_path(rule_id))
            .await
    }

    /// The backend answers updates with 204 and no body
    pub async fn update(&self, rule_id: i64, request: &WaapRuleRequest) -> Result<(), ApiError> {
        self.client
            .patch_empty(Service::Waap, &self.rule_path(rule_id), request)
            .await
    }

    pub async fn toggle(&self, rule_id: i64, enabled: bool) -> Result<(), ApiError> {
        let action = if enabled { "enable" } else { "disable" };
        self.client
            .patch_empty(
                Service::Waap,
                &format!("{}/{}", self.rule_path(rule_id), action),
                &serde_json::json!({}),
            )
            .await
    }

    pub async fn delete(&self, rule_id: i64) -> Result<(), ApiError> {
        self.client
            .delete_empty(Service::Waap, &self.rule_path(rule_id))
            .await
    }
}

pub type RuleObject = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WaapRuleRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    pub action: RuleObject,
    pub conditions: Vec<RuleObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaapRule {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    #[serde(default)]
    pub action: RuleObject,
    #[serde(default)]
    pub conditions: Vec<RuleObject>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn object(value: serde_json::Value) -> RuleObject {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[tokio::test]
    async fn create_custom_rule() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/domains/7/custom-rules")
            .match_body(Matcher::Json(json!({
                "name": "block-bad-ips",
                "enabled": true,
                "action": {"block": {"status_code": 403}},
                "conditions": [{"ip": {"ip_address": "198.51.100.4", "negation": false}}],
            })))
            .with_body(
                r#"{"id":41,"name":"block-bad-ips","description":null,"enabled":true,
                    "action":{"block":{"status_code":403,"action_duration":null}},
                    "conditions":[{"ip":{"ip_address":"198.51.100.4","negation":false}}]}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let rule = client
            .waap()
            .custom_rules(7)
            .create(&WaapRuleRequest {
                name: "block-bad-ips".to_string(),
                description: None,
                enabled: true,
                action: object(json!({"block": {"status_code": 403}})),
                conditions: vec![object(
                    json!({"ip": {"ip_address": "198.51.100.4", "negation": false}}),
                )],
            })
            .await
            .unwrap();
        assert_eq!(rule.id, 41);
        assert!(rule.action.contains_key("block"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn toggle_firewall_rule() {
        let mut server = Server::new_async().await;
        let disable = server
            .mock("PATCH", "/v1/domains/7/firewall-rules/5/disable")
            .with_status(204)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        client.waap().firewall_rules(7).toggle(5, false).await.unwrap();
        disable.assert_async().await;
    }
}
