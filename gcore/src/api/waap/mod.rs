//! Gcore WAAP (web application and API protection) API

use crate::api::client::Client;

mod rules;

pub use rules::{RuleKind, RuleObject, WaapRule, WaapRuleRequest, WaapRulesApi};

pub struct WaapApi<'a> {
    client: &'a Client,
}

impl<'a> WaapApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn custom_rules(&self, domain_id: i64) -> WaapRulesApi<'a> {
        WaapRulesApi::new(self.client, domain_id, RuleKind::Custom)
    }

    pub fn firewall_rules(&self, domain_id: i64) -> WaapRulesApi<'a> {
        WaapRulesApi::new(self.client, domain_id, RuleKind::Firewall)
    }
}
