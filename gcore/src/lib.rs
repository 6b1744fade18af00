pub mod api;
pub mod data_sources;
pub mod resources;

mod provider_data;

pub use provider_data::GcoreProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
    ValidateProviderConfigRequest, ValidateProviderConfigResponse,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::NumberRangeValidator;

use api::{Client, Credentials, Endpoints, RetryConfig, Service};

pub const DEFAULT_API_ENDPOINT: &str = "https://api.gcore.com";
const DEFAULT_TIMEOUT_SECONDS: i64 = 300;

/// Per-API base URL overrides: (attribute, environment variable, service)
const SERVICE_OVERRIDES: [(&str, &str, Service); 5] = [
    ("gcore_cloud_api", "GCORE_CLOUD_API", Service::Cloud),
    ("gcore_cdn_api", "GCORE_CDN_API", Service::Cdn),
    ("gcore_waap_api", "GCORE_WAAP_API", Service::Waap),
    ("gcore_iam_api", "GCORE_IAM_API", Service::Iam),
    ("gcore_fastedge_api", "GCORE_FASTEDGE_API", Service::FastEdge),
];

#[derive(Default)]
pub struct GcoreProvider {
    provider_data: Option<GcoreProviderData>,
}

impl GcoreProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_provider_data(
        config: &DynamicValue,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<GcoreProviderData> {
        let credentials = match (
            config_string(config, "permanent_api_token", "GCORE_PERMANENT_TOKEN"),
            config_string(config, "api_token", "GCORE_API_TOKEN"),
        ) {
            (Some(token), _) => Credentials::ApiKey(token),
            (None, Some(token)) => Credentials::Bearer(token),
            (None, None) => {
                diagnostics.push(
                    Diagnostic::error(
                        "permanent_api_token is required",
                        "Set permanent_api_token in the provider block or the GCORE_PERMANENT_TOKEN environment variable",
                    )
                    .with_attribute(AttributePath::new("permanent_api_token")),
                );
                return None;
            }
        };

        let api_endpoint = config_string(config, "api_endpoint", "GCORE_API_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());
        let mut endpoints = match Endpoints::from_base(&api_endpoint) {
            Ok(endpoints) => endpoints,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::error("Invalid api_endpoint", e.to_string())
                        .with_attribute(AttributePath::new("api_endpoint")),
                );
                return None;
            }
        };
        for (attribute, env_var, service) in SERVICE_OVERRIDES {
            let Some(url) = config_string(config, attribute, env_var) else {
                continue;
            };
            endpoints = match endpoints.with_override(service, &url) {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid {}", attribute), e.to_string())
                            .with_attribute(AttributePath::new(attribute)),
                    );
                    return None;
                }
            };
        }

        let client_id = match config.get_i64(&AttributePath::new("gcore_client_id")) {
            Ok(id) => Some(id),
            Err(_) => match std::env::var("GCORE_CLIENT_ID") {
                Ok(raw) if !raw.is_empty() => match raw.parse::<i64>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        diagnostics.push(Diagnostic::error(
                            "Invalid GCORE_CLIENT_ID",
                            format!("expected a number, got '{}'", raw),
                        ));
                        return None;
                    }
                },
                _ => None,
            },
        };

        let timeout = config
            .get_i64(&AttributePath::new("timeout"))
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        let retry_config = RetryConfig {
            timeout_seconds: timeout.max(1) as u64,
            ..RetryConfig::default()
        };

        match Client::with_config(endpoints, credentials, retry_config) {
            Ok(client) => {
                tracing::info!(endpoint = %api_endpoint, "configured Gcore API client");
                Some(GcoreProviderData::new(client).with_client_id(client_id))
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                ));
                None
            }
        }
    }
}

/// Reads a string attribute, falling back to an environment variable
fn config_string(config: &DynamicValue, attribute: &str, env_var: &str) -> Option<String> {
    config
        .get_string(&AttributePath::new(attribute))
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|s| !s.is_empty()))
}

fn resource_factory<R>() -> ResourceFactory
where
    R: ResourceWithConfigure + Default + 'static,
{
    Box::new(|| Box::new(R::default()) as Box<dyn ResourceWithConfigure>)
}

fn data_source_factory<D>() -> DataSourceFactory
where
    D: DataSourceWithConfigure + Default + 'static,
{
    Box::new(|| Box::new(D::default()) as Box<dyn DataSourceWithConfigure>)
}

#[async_trait]
impl Provider for GcoreProvider {
    fn type_name(&self) -> &str {
        "gcore"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Manages Gcore cloud, CDN, WAAP, IAM and FastEdge resources")
            .attribute(
                AttributeBuilder::new("permanent_api_token", AttributeType::String)
                    .description("Permanent API token. Can also be set with GCORE_PERMANENT_TOKEN")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_token", AttributeType::String)
                    .description("Bearer token used when no permanent token is configured. Can also be set with GCORE_API_TOKEN")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_endpoint", AttributeType::String)
                    .description("Base URL of the Gcore API. Defaults to https://api.gcore.com or GCORE_API_ENDPOINT")
                    .optional()
                    .build(),
            );

        for (attribute, env_var, _) in SERVICE_OVERRIDES {
            builder = builder.attribute(
                AttributeBuilder::new(attribute, AttributeType::String)
                    .description(&format!(
                        "Overrides the base URL for this API. Can also be set with {}",
                        env_var
                    ))
                    .optional()
                    .build(),
            );
        }

        let schema = builder
            .attribute(
                AttributeBuilder::new("gcore_client_id", AttributeType::Number)
                    .description("Account (client) id. Can also be set with GCORE_CLIENT_ID")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("timeout", AttributeType::Number)
                    .description("HTTP request timeout in seconds, default 300")
                    .optional()
                    .validator(NumberRangeValidator::at_least(1.0))
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        let mut diagnostics = vec![];
        let both_set = ["permanent_api_token", "api_token"].iter().all(|name| {
            request
                .config
                .get_string(&AttributePath::new(name))
                .map(|s| !s.is_empty())
                .unwrap_or(false)
        });
        if both_set {
            diagnostics.push(Diagnostic::warning(
                "Both permanent_api_token and api_token are set",
                "permanent_api_token takes precedence",
            ));
        }
        ValidateProviderConfigResponse { diagnostics }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let mut diagnostics = vec![];
        self.provider_data = Self::build_provider_data(&request.config, &mut diagnostics);

        ConfigureProviderResponse {
            diagnostics,
            provider_data: self
                .provider_data
                .clone()
                .map(|data| Arc::new(data) as Arc<dyn std::any::Any + Send + Sync>),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        use resources::{cdn, cloud, fastedge, iam, waap};

        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert(
            "gcore_instance".to_string(),
            resource_factory::<cloud::InstanceResource>(),
        );
        resources.insert(
            "gcore_floatingip".to_string(),
            resource_factory::<cloud::FloatingIpResource>(),
        );
        resources.insert(
            "gcore_loadbalancer".to_string(),
            resource_factory::<cloud::LoadBalancerResource>(),
        );
        resources.insert(
            "gcore_network".to_string(),
            resource_factory::<cloud::NetworkResource>(),
        );
        resources.insert(
            "gcore_keypair".to_string(),
            resource_factory::<cloud::KeypairResource>(),
        );
        resources.insert(
            "gcore_inference_deployment".to_string(),
            resource_factory::<cloud::InferenceDeploymentResource>(),
        );
        resources.insert(
            "gcore_cdn_resource".to_string(),
            resource_factory::<cdn::CdnResourceResource>(),
        );
        resources.insert(
            "gcore_cdn_preset".to_string(),
            resource_factory::<cdn::CdnPresetResource>(),
        );
        resources.insert(
            "gcore_cdn_logs_uploader_target".to_string(),
            resource_factory::<cdn::LogsUploaderTargetResource>(),
        );
        resources.insert(
            "gcore_waap_custom_rule".to_string(),
            resource_factory::<waap::CustomRuleResource>(),
        );
        resources.insert(
            "gcore_waap_firewall_rule".to_string(),
            resource_factory::<waap::FirewallRuleResource>(),
        );
        resources.insert(
            "gcore_iam_user".to_string(),
            resource_factory::<iam::IamUserResource>(),
        );
        resources.insert(
            "gcore_fastedge_binary".to_string(),
            resource_factory::<fastedge::FastEdgeBinaryResource>(),
        );
        resources.insert(
            "gcore_fastedge_app".to_string(),
            resource_factory::<fastedge::FastEdgeAppResource>(),
        );
        resources
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
        data_sources.insert(
            "gcore_project".to_string(),
            data_source_factory::<data_sources::ProjectDataSource>(),
        );
        data_sources.insert(
            "gcore_region".to_string(),
            data_source_factory::<data_sources::RegionDataSource>(),
        );
        data_sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::types::{ClientCapabilities, Dynamic};

    const ENV_VARS: [&str; 9] = [
        "GCORE_PERMANENT_TOKEN",
        "GCORE_API_TOKEN",
        "GCORE_API_ENDPOINT",
        "GCORE_CLOUD_API",
        "GCORE_CDN_API",
        "GCORE_WAAP_API",
        "GCORE_IAM_API",
        "GCORE_FASTEDGE_API",
        "GCORE_CLIENT_ID",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    fn config(fields: &[(&str, Dynamic)]) -> DynamicValue {
        DynamicValue::new(Dynamic::Map(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ))
    }

    async fn configure(provider: &mut GcoreProvider, config: DynamicValue) -> ConfigureProviderResponse {
        provider
            .configure(
                Context::new(),
                ConfigureProviderRequest {
                    terraform_version: "1.9.0".to_string(),
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await
    }

    #[tokio::test]
    #[serial]
    async fn provider_configures_from_env_vars() {
        clear_env();
        std::env::set_var("GCORE_PERMANENT_TOKEN", "1234$abcdef");
        std::env::set_var("GCORE_CLOUD_API", "https://cloud.example.com/");
        std::env::set_var("GCORE_CLIENT_ID", "42");

        let mut provider = GcoreProvider::new();
        let response = configure(&mut provider, config(&[])).await;

        assert!(response.diagnostics.is_empty());
        let data = response.provider_data.unwrap();
        let data = data.downcast_ref::<GcoreProviderData>().unwrap();
        assert_eq!(data.client_id, Some(42));
        assert_eq!(data.client.endpoints().cloud, "https://cloud.example.com");
        assert_eq!(data.client.endpoints().cdn, "https://api.gcore.com");
        assert_eq!(data.client.endpoints().iam, "https://api.gcore.com/iam");

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_config_wins_over_env() {
        clear_env();
        std::env::set_var("GCORE_API_ENDPOINT", "https://env.example.com");

        let mut provider = GcoreProvider::new();
        let response = configure(
            &mut provider,
            config(&[
                ("permanent_api_token", Dynamic::from("token")),
                ("api_endpoint", Dynamic::from("https://api.example.com")),
                ("gcore_client_id", Dynamic::Number(7.0)),
            ]),
        )
        .await;

        assert!(response.diagnostics.is_empty());
        let data = provider.provider_data.as_ref().unwrap();
        assert_eq!(data.client.endpoints().waap, "https://api.example.com/waap");
        assert_eq!(data.client_id, Some(7));

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_token() {
        clear_env();

        let mut provider = GcoreProvider::new();
        let response = configure(&mut provider, config(&[])).await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0]
            .summary
            .contains("permanent_api_token is required"));
        assert!(response.provider_data.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn provider_rejects_bad_endpoint() {
        clear_env();

        let mut provider = GcoreProvider::new();
        let response = configure(
            &mut provider,
            config(&[
                ("permanent_api_token", Dynamic::from("token")),
                ("gcore_cdn_api", Dynamic::from("not a url")),
            ]),
        )
        .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Invalid gcore_cdn_api");
    }

    #[tokio::test]
    #[serial]
    async fn provider_rejects_non_numeric_client_id_env() {
        clear_env();
        std::env::set_var("GCORE_CLIENT_ID", "abc");

        let mut provider = GcoreProvider::new();
        let response = configure(
            &mut provider,
            config(&[("permanent_api_token", Dynamic::from("token"))]),
        )
        .await;

        assert_eq!(response.diagnostics[0].summary, "Invalid GCORE_CLIENT_ID");
        clear_env();
    }

    #[tokio::test]
    async fn validate_warns_when_both_tokens_set() {
        let provider = GcoreProvider::new();
        let response = provider
            .validate(
                Context::new(),
                ValidateProviderConfigRequest {
                    config: config(&[
                        ("permanent_api_token", Dynamic::from("a")),
                        ("api_token", Dynamic::from("b")),
                    ]),
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1);
        assert!(!response.diagnostics[0].is_error());
    }

    #[tokio::test]
    async fn schema_marks_tokens_sensitive() {
        let provider = GcoreProvider::new();
        let response = provider.schema(Context::new(), ProviderSchemaRequest).await;
        let attrs = &response.schema.block.attributes;

        assert!(attrs
            .iter()
            .any(|a| a.name == "permanent_api_token" && a.sensitive && a.optional));
        assert!(attrs.iter().any(|a| a.name == "gcore_fastedge_api"));
        assert!(attrs.iter().all(|a| !a.required));
    }

    #[test]
    fn registers_every_resource_and_data_source() {
        let provider = GcoreProvider::new();
        let resources = provider.resources();
        assert_eq!(resources.len(), 14);
        for (name, factory) in &resources {
            assert_eq!(factory().type_name(), name.as_str());
        }

        let data_sources = provider.data_sources();
        assert_eq!(data_sources.len(), 2);
        for (name, factory) in &data_sources {
            assert_eq!(factory().type_name(), name.as_str());
        }
    }
}
