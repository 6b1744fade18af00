//! WAAP domain rules

mod custom_rule;
mod firewall_rule;
mod rule;

pub use custom_rule::CustomRuleResource;
pub use firewall_rule::FirewallRuleResource;
