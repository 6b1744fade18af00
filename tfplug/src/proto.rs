//! Generated protocol types for Terraform Plugin Protocol v6.
//!
//! Message and service code is produced by `tonic-build` from
//! `proto/tfplugin6.proto` at build time. Several generated names collide with
//! framework types (`DynamicValue`, `Diagnostic`, `Schema`), so always refer to
//! these through the `proto::` prefix.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderService, ProviderServer};

/// go-plugin controller service, used by Terraform to stop the plugin process.
pub mod plugin {
    include!(concat!(env!("OUT_DIR"), "/plugin.rs"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_types_are_generated() {
        let _ = diagnostic::Severity::Error;
        let _ = attribute_path::step::Selector::AttributeName("name".to_string());
        let _ = schema::nested_block::NestingMode::List;
        let _ = plugin::Empty {};
    }

    #[test]
    fn stop_provider_response_has_error_field() {
        let resp = stop_provider::Response {
            error: "boom".to_string(),
        };
        assert_eq!(resp.error, "boom");
    }
}
