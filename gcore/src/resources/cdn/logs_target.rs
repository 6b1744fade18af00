//! CDN logs uploader target
//!
//! The `config` block holds exactly one storage block. The API masks
//! secrets on read, so sensitive fields are kept from state.

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ModifyPlanRequest,
    ModifyPlanResponse, ReadResourceRequest, ReadResourceResponse, Resource,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, ResourceWithModifyPlan, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{
    AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, NestingMode, SchemaBuilder,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::cdn::{CreateLogsTargetRequest, LogsTarget, UpdateLogsTargetRequest};
use crate::resources::common::{
    api_error, configure_provider_data, empty_import_response, id_attribute,
    json_to_dynamic, not_configured, numeric_id, object_without_nulls, optional_string,
    required_string, set_optional_string, set_string, single_block,
};

struct Field {
    name: &'static str,
    kind: FieldKind,
    required: bool,
    sensitive: bool,
}

#[derive(Clone, Copy)]
enum FieldKind {
    String,
    Number,
    Bool,
}

const fn field(name: &'static str, kind: FieldKind, required: bool, sensitive: bool) -> Field {
    Field {
        name,
        kind,
        required,
        sensitive,
    }
}

const S3_GCORE: &[Field] = &[
    field("access_key_id", FieldKind::String, true, false),
    field("secret_access_key", FieldKind::String, true, true),
    field("region", FieldKind::String, true, false),
    field("bucket_name", FieldKind::String, true, false),
    field("endpoint", FieldKind::String, true, false),
    field("directory", FieldKind::String, false, false),
    field("use_path_style", FieldKind::Bool, false, false),
];

const S3_AMAZON: &[Field] = &[
    field("access_key_id", FieldKind::String, true, false),
    field("secret_access_key", FieldKind::String, true, true),
    field("region", FieldKind::String, true, false),
    field("bucket_name", FieldKind::String, true, false),
    field("directory", FieldKind::String, false, false),
];

const S3_OTHER: &[Field] = &[
    field("access_key_id", FieldKind::String, true, false),
    field("secret_access_key", FieldKind::String, true, true),
    field("region", FieldKind::String, true, false),
    field("bucket_name", FieldKind::String, true, false),
    field("endpoint", FieldKind::String, true, false),
    field("directory", FieldKind::String, false, false),
    field("use_path_style", FieldKind::Bool, false, false),
];

const FTP: &[Field] = &[
    field("hostname", FieldKind::String, true, false),
    field("user", FieldKind::String, true, false),
    field("password", FieldKind::String, true, true),
    field("directory", FieldKind::String, false, false),
    field("timeout_seconds", FieldKind::Number, false, false),
];

const SFTP: &[Field] = &[
    field("hostname", FieldKind::String, true, false),
    field("user", FieldKind::String, true, false),
    field("password", FieldKind::String, false, true),
    field("private_key", FieldKind::String, false, true),
    field("key_passphrase", FieldKind::String, false, true),
    field("directory", FieldKind::String, false, false),
    field("timeout_seconds", FieldKind::Number, false, false),
];

const HTTP: &[Field] = &[
    field("url", FieldKind::String, true, false),
    field("method", FieldKind::String, false, false),
    field("authorization_header", FieldKind::String, false, true),
];

const STORAGE_TYPES: &[(&str, &[Field])] = &[
    ("s3_gcore", S3_GCORE),
    ("s3_amazon", S3_AMAZON),
    ("s3_other", S3_OTHER),
    ("ftp", FTP),
    ("sftp", SFTP),
    ("http", HTTP),
];

fn storage_block(name: &str, fields: &[Field]) -> NestedBlock {
    fields
        .iter()
        .fold(NestedBlockBuilder::new(name, NestingMode::List), |builder, f| {
            let kind = match f.kind {
                FieldKind::String => AttributeType::String,
                FieldKind::Number => AttributeType::Number,
                FieldKind::Bool => AttributeType::Bool,
            };
            let attribute = AttributeBuilder::new(f.name, kind);
            let attribute = if f.required {
                attribute.required()
            } else {
                attribute.optional()
            };
            let attribute = if f.sensitive {
                attribute.sensitive()
            } else {
                attribute
            };
            builder.attribute(attribute.build())
        })
        .max_items(1)
        .build()
}

/// The configured storage types and their blocks
fn configured_storages(value: &DynamicValue) -> Vec<(&'static str, &Dynamic)> {
    let Some(config) = single_block(value, "config") else {
        return vec![];
    };
    STORAGE_TYPES
        .iter()
        .filter_map(|(name, _)| {
            let block = match config.field(name)? {
                Dynamic::List(items) => items.first()?,
                other if other.is_null() => return None,
                other => other,
            };
            Some((*name, block))
        })
        .collect()
}

fn storage_config(value: &DynamicValue) -> Option<(&'static str, serde_json::Value)> {
    configured_storages(value)
        .into_iter()
        .next()
        .map(|(name, block)| (name, serde_json::Value::Object(object_without_nulls(block))))
}

/// Rebuilds the `config` block from the API, keeping masked secrets from `prior`
fn config_from_api(target: &LogsTarget, prior: &DynamicValue) -> Dynamic {
    let prior_block = configured_storages(prior)
        .into_iter()
        .find(|(name, _)| *name == target.storage_type)
        .map(|(_, block)| block.clone());

    let mut config: HashMap<String, Dynamic> = STORAGE_TYPES
        .iter()
        .map(|(name, _)| (name.to_string(), Dynamic::List(vec![])))
        .collect();

    if let Some((name, fields)) = STORAGE_TYPES
        .iter()
        .find(|(name, _)| *name == target.storage_type)
    {
        let block = fields
            .iter()
            .map(|f| {
                let from_state = prior_block
                    .as_ref()
                    .and_then(|b| b.field(f.name))
                    .cloned()
                    .unwrap_or(Dynamic::Null);
                let value = if f.sensitive {
                    from_state
                } else {
                    match target.config.get(f.name) {
                        Some(v) if !v.is_null() => json_to_dynamic(v),
                        _ => from_state,
                    }
                };
                (f.name.to_string(), value)
            })
            .collect();
        config.insert(name.to_string(), Dynamic::List(vec![Dynamic::Map(block)]));
    }

    Dynamic::List(vec![Dynamic::Map(config)])
}

/// Copies the API view into `state`; `config` is only rebuilt on refresh
fn apply_target(state: &mut DynamicValue, target: &LogsTarget, refresh_config: bool) {
    let config = refresh_config.then(|| config_from_api(target, state));
    set_string(state, "id", target.id.to_string());
    set_string(state, "name", target.name.clone());
    if optional_string(state, "description").is_some()
        || target.description.as_deref().is_some_and(|d| !d.is_empty())
    {
        set_optional_string(state, "description", target.description.clone());
    }
    set_string(state, "storage_type", target.storage_type.clone());
    set_optional_string(state, "status", target.status.clone());
    if let Some(Dynamic::List(items)) = config {
        let _ = state.set_list(&AttributePath::new("config"), items);
    }
}

#[derive(Default)]
pub struct LogsUploaderTargetResource {
    provider_data: Option<crate::GcoreProviderData>,
}

impl LogsUploaderTargetResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_target(
        &self,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let (storage_type, config) = storage_config(planned).ok_or_else(missing_storage)?;
        let request = CreateLogsTargetRequest {
            name: required_string(planned, "name")?,
            description: optional_string(planned, "description"),
            storage_type: storage_type.to_string(),
            config,
        };
        let target = data
            .client
            .cdn()
            .logs_targets()
            .create(&request)
            .await
            .map_err(|e| api_error("Failed to create logs uploader target", &e))?;

        let mut state = planned.clone();
        apply_target(&mut state, &target, false);
        Ok(state)
    }

    async fn update_target(
        &self,
        data: &crate::GcoreProviderData,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let id = numeric_id(prior)?;
        let (storage_type, config) = storage_config(planned).ok_or_else(missing_storage)?;
        let prior_config = storage_config(prior).map(|(_, config)| config);

        let changed = |name: &str| optional_string(prior, name) != optional_string(planned, name);
        let request = UpdateLogsTargetRequest {
            name: changed("name").then(|| optional_string(planned, "name")).flatten(),
            description: changed("description")
                .then(|| optional_string(planned, "description").unwrap_or_default()),
            storage_type: None,
            config: (prior_config.as_ref() != Some(&config)).then(|| {
                tracing::debug!(storage_type, "logs target config changed");
                config
            }),
        };
        let target = data
            .client
            .cdn()
            .logs_targets()
            .update(id, &request)
            .await
            .map_err(|e| api_error("Failed to update logs uploader target", &e))?;

        let mut state = planned.clone();
        apply_target(&mut state, &target, false);
        Ok(state)
    }
}

fn missing_storage() -> Diagnostic {
    Diagnostic::error(
        "Missing storage configuration",
        format!(
            "config must contain exactly one of: {}",
            STORAGE_TYPES.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", ")
        ),
    )
    .with_attribute(AttributePath::new("config"))
}

#[async_trait]
impl Resource for LogsUploaderTargetResource {
    fn type_name(&self) -> &str {
        "gcore_cdn_logs_uploader_target"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let config = STORAGE_TYPES
            .iter()
            .fold(
                NestedBlockBuilder::new("config", NestingMode::List)
                    .description("Storage configuration; exactly one storage block"),
                |builder, (name, fields)| builder.block(storage_block(name, fields)),
            )
            .min_items(1)
            .max_items(1)
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a destination for raw CDN logs")
            .attribute(id_attribute("Target ID"))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("storage_type", AttributeType::String)
                    .description("Derived from the storage block in config")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .block(config)
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
        let config_known = request
            .config
            .get(&AttributePath::new("config"))
            .map(|c| !c.contains_unknown())
            .unwrap_or(false);
        let count = configured_storages(&request.config).len();
        let diagnostics = if config_known && count != 1 {
            vec![missing_storage()]
        } else {
            vec![]
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

        match self.create_target(data, &request.planned_state).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![diag],
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

        match data.client.cdn().logs_targets().get(id).await {
            Ok(target) => {
                let mut new_state = request.current_state.clone();
                apply_target(&mut new_state, &target, true);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(target_id = id, "logs uploader target not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read logs uploader target", &e)],
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
            .update_target(data, &request.prior_state, &request.planned_state)
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![diag],
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
            Ok(id) => match data.client.cdn().logs_targets().delete(id).await {
                Ok(()) => vec![],
                Err(e) if e.is_not_found() => vec![],
                Err(e) => vec![api_error("Failed to delete logs uploader target", &e)],
            },
            Err(diag) => vec![diag],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }

    fn as_modify_plan(&self) -> Option<&dyn ResourceWithModifyPlan> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for LogsUploaderTargetResource {
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
impl ResourceWithModifyPlan for LogsUploaderTargetResource {
    /// Switching to another storage type replaces the target
    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        let mut requires_replace = vec![];
        if !request.prior_state.is_null() && !request.planned_state.is_null() {
            let prior: Vec<_> = configured_storages(&request.prior_state)
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            let planned: Vec<_> = configured_storages(&request.planned_state)
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            let planned_known = request
                .planned_state
                .get(&AttributePath::new("config"))
                .map(|c| !c.contains_unknown())
                .unwrap_or(false);
            if planned_known && prior != planned {
                requires_replace.push(AttributePath::new("config"));
            }
        }

        let mut planned_state = request.planned_state;
        if !planned_state.is_null() {
            match storage_config(&planned_state) {
                Some((name, _)) => set_string(&mut planned_state, "storage_type", name),
                None => {
                    let _ = planned_state.mark_unknown(&AttributePath::new("storage_type"));
                }
            }
        }

        ModifyPlanResponse {
            planned_state,
            requires_replace,
            planned_private: request.prior_private,
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithImportState for LogsUploaderTargetResource {
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
