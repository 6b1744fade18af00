//! gRPC implementation of the tfplugin6 Provider service
//!
//! Schemas are collected once when the server is built. Every resource and
//! data source call creates a fresh instance from its factory and hands it
//! the provider data returned by `ConfigureProvider`.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceWithConfigure, DataSourceSchemaRequest,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::plan_modifier::values_equal;
use crate::proto;
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderMetaSchemaRequest,
    ProviderMetadataRequest, ProviderSchemaRequest, ResourceFactory, StopProviderRequest,
    ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ModifyPlanRequest, ReadResourceRequest, ResourceSchemaRequest,
    ResourceWithConfigure, UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{
    Attribute, Block, DefaultRequest, NestedBlock, NestingMode, PlanModifierRequest, Schema,
    StringKind,
};
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Deferred, DeferredReason,
    Diagnostic, DiagnosticSeverity, Dynamic, DynamicValue, ServerCapabilities,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

type ProviderData = Arc<dyn Any + Send + Sync>;

pub struct GrpcProviderServer<P: Provider> {
    provider: Arc<RwLock<P>>,
    provider_data: Arc<RwLock<Option<ProviderData>>>,
    resources: HashMap<String, ResourceFactory>,
    data_sources: HashMap<String, DataSourceFactory>,
    provider_schema: Schema,
    provider_meta_schema: Option<Schema>,
    resource_schemas: HashMap<String, Schema>,
    data_source_schemas: HashMap<String, Schema>,
    server_capabilities: ServerCapabilities,
    stop: Context,
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    pub async fn new(provider: P) -> Self {
        let ctx = Context::new();
        let resources = provider.resources();
        let data_sources = provider.data_sources();

        let mut resource_schemas = HashMap::new();
        for (name, factory) in &resources {
            let resp = factory()
                .schema(ctx.clone(), ResourceSchemaRequest)
                .await;
            resource_schemas.insert(name.clone(), resp.schema);
        }

        let mut data_source_schemas = HashMap::new();
        for (name, factory) in &data_sources {
            let resp = factory()
                .schema(ctx.clone(), DataSourceSchemaRequest)
                .await;
            data_source_schemas.insert(name.clone(), resp.schema);
        }

        let provider_schema = provider
            .schema(ctx.clone(), ProviderSchemaRequest)
            .await
            .schema;
        let provider_meta_schema = provider
            .meta_schema(ctx.clone(), ProviderMetaSchemaRequest)
            .await
            .schema;
        let server_capabilities = provider
            .metadata(ctx.clone(), ProviderMetadataRequest)
            .await
            .server_capabilities;

        Self {
            provider: Arc::new(RwLock::new(provider)),
            provider_data: Arc::new(RwLock::new(None)),
            resources,
            data_sources,
            provider_schema,
            provider_meta_schema,
            resource_schemas,
            data_source_schemas,
            server_capabilities,
            stop: Context::new(),
        }
    }

    /// Context for a single RPC; cancelled when Terraform stops the provider.
    fn context(&self) -> Context {
        self.stop.clone()
    }

    async fn configured_resource(
        &self,
        type_name: &str,
        ctx: &Context,
    ) -> std::result::Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self
            .resources
            .get(type_name)
            .ok_or_else(|| vec![unknown_type("resource", type_name)])?;
        let mut resource = factory();
        let provider_data = self.provider_data.read().await.clone();
        let resp = resource
            .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;
        if has_errors(&resp.diagnostics) {
            return Err(resp.diagnostics);
        }
        Ok(resource)
    }

    async fn configured_data_source(
        &self,
        type_name: &str,
        ctx: &Context,
    ) -> std::result::Result<Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self
            .data_sources
            .get(type_name)
            .ok_or_else(|| vec![unknown_type("data source", type_name)])?;
        let mut data_source = factory();
        let provider_data = self.provider_data.read().await.clone();
        let resp = data_source
            .configure(ctx.clone(), ConfigureDataSourceRequest { provider_data })
            .await;
        if has_errors(&resp.diagnostics) {
            return Err(resp.diagnostics);
        }
        Ok(data_source)
    }

    fn resource_schema(&self, type_name: &str) -> std::result::Result<&Schema, Vec<Diagnostic>> {
        self.resource_schemas
            .get(type_name)
            .ok_or_else(|| vec![unknown_type("resource", type_name)])
    }
}

fn unknown_type(kind: &str, type_name: &str) -> Diagnostic {
    Diagnostic::error(
        format!("Unknown {} type", kind),
        format!("The provider does not support {} type \"{}\".", kind, type_name),
    )
}

#[tonic::async_trait]
impl<P: Provider + 'static> proto::ProviderService for GrpcProviderServer<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> std::result::Result<Response<proto::get_metadata::Response>, Status> {
        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities_to_proto(&self.server_capabilities)),
            diagnostics: vec![],
            data_sources: self
                .data_sources
                .keys()
                .map(|name| proto::get_metadata::DataSourceMetadata {
                    type_name: name.clone(),
                })
                .collect(),
            resources: self
                .resources
                .keys()
                .map(|name| proto::get_metadata::ResourceMetadata {
                    type_name: name.clone(),
                })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> std::result::Result<Response<proto::get_provider_schema::Response>, Status> {
        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&self.provider_schema)),
            resource_schemas: self
                .resource_schemas
                .iter()
                .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
                .collect(),
            data_source_schemas: self
                .data_source_schemas
                .iter()
                .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
                .collect(),
            diagnostics: vec![],
            provider_meta: self.provider_meta_schema.as_ref().map(schema_to_proto),
            server_capabilities: Some(server_capabilities_to_proto(&self.server_capabilities)),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> std::result::Result<Response<proto::validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;

        let mut diagnostics = self.provider_schema.validate(&config);
        let resp = self
            .provider
            .read()
            .await
            .validate(self.context(), ValidateProviderConfigRequest { config })
            .await;
        diagnostics.extend(resp.diagnostics);

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        let schema = match self.resource_schema(&req.type_name) {
            Ok(schema) => schema,
            Err(diags) => {
                return Ok(Response::new(proto::validate_resource_config::Response {
                    diagnostics: diagnostics_to_proto(diags),
                }))
            }
        };
        let config = decode_dynamic_value(req.config.as_ref())?;

        let mut diagnostics = schema.validate(&config);
        if let Some(factory) = self.resources.get(&req.type_name) {
            let resp = factory()
                .validate(
                    self.context(),
                    ValidateResourceConfigRequest {
                        type_name: req.type_name.clone(),
                        config,
                        client_capabilities: client_capabilities_from_proto(
                            req.client_capabilities.as_ref(),
                        ),
                    },
                )
                .await;
            diagnostics.extend(resp.diagnostics);
        }

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        let (Some(schema), Some(factory)) = (
            self.data_source_schemas.get(&req.type_name),
            self.data_sources.get(&req.type_name),
        ) else {
            return Ok(Response::new(proto::validate_data_resource_config::Response {
                diagnostics: diagnostics_to_proto(vec![unknown_type(
                    "data source",
                    &req.type_name,
                )]),
            }));
        };
        let config = decode_dynamic_value(req.config.as_ref())?;

        let mut diagnostics = schema.validate(&config);
        let resp = factory()
            .validate(
                self.context(),
                ValidateDataSourceConfigRequest {
                    type_name: req.type_name.clone(),
                    config,
                },
            )
            .await;
        diagnostics.extend(resp.diagnostics);

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();
        let schema = match self.resource_schema(&req.type_name) {
            Ok(schema) => schema,
            Err(diags) => {
                return Ok(Response::new(proto::upgrade_resource_state::Response {
                    upgraded_state: None,
                    diagnostics: diagnostics_to_proto(diags),
                }))
            }
        };

        if req.version > schema.version {
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: diagnostics_to_proto(vec![Diagnostic::error(
                    "Unsupported state version",
                    format!(
                        "State for {} has version {}, newer than the provider's schema version {}.",
                        req.type_name, req.version, schema.version
                    ),
                )]),
            }));
        }

        let json = req.raw_state.map(|raw| raw.json).unwrap_or_default();
        let state = DynamicValue::decode_json(&json).map_err(Status::from)?;
        let upgraded = schema.conform(&state);

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_dynamic_value(&upgraded)?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> std::result::Result<Response<proto::configure_provider::Response>, Status> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;
        info!(terraform_version = %req.terraform_version, "configuring provider");

        let resp = self
            .provider
            .write()
            .await
            .configure(
                self.context(),
                ConfigureProviderRequest {
                    terraform_version: req.terraform_version,
                    config,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        if !has_errors(&resp.diagnostics) {
            *self.provider_data.write().await = resp.provider_data;
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(resp.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> std::result::Result<Response<proto::read_resource::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "read_resource");
        let ctx = self.context();

        let current_state = decode_dynamic_value(req.current_state.as_ref())?;
        let failed = |diagnostics: Vec<Diagnostic>,
                      state: &DynamicValue|
         -> std::result::Result<Response<proto::read_resource::Response>, Status> {
            Ok(Response::new(proto::read_resource::Response {
                new_state: Some(encode_dynamic_value(state)?),
                diagnostics: diagnostics_to_proto(diagnostics),
                private: vec![],
                deferred: None,
            }))
        };

        let schema = match self.resource_schema(&req.type_name) {
            Ok(schema) => schema,
            Err(diags) => return failed(diags, &current_state),
        };
        let resource = match self.configured_resource(&req.type_name, &ctx).await {
            Ok(resource) => resource,
            Err(diags) => return failed(diags, &current_state),
        };

        let resp = resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: req.type_name.clone(),
                    current_state,
                    private: req.private,
                    provider_meta: optional_dynamic_value(req.provider_meta.as_ref())?,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        let new_state = match resp.new_state {
            Some(state) => finalize_state(schema, &state),
            None => {
                debug!(type_name = %req.type_name, "resource is gone, removing from state");
                DynamicValue::null()
            }
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            diagnostics: diagnostics_to_proto(resp.diagnostics),
            private: resp.private,
            deferred: resp.deferred.map(|d| deferred_to_proto(&d)),
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> std::result::Result<Response<proto::plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "plan_resource_change");
        let ctx = self.context();

        let prior_state = decode_dynamic_value(req.prior_state.as_ref())?;
        let proposed = decode_dynamic_value(req.proposed_new_state.as_ref())?;
        let config = decode_dynamic_value(req.config.as_ref())?;

        let schema = match self.resource_schema(&req.type_name) {
            Ok(schema) => schema,
            Err(diags) => {
                return Ok(Response::new(proto::plan_resource_change::Response {
                    planned_state: req.proposed_new_state,
                    requires_replace: vec![],
                    planned_private: req.prior_private,
                    diagnostics: diagnostics_to_proto(diags),
                    legacy_type_system: false,
                    deferred: None,
                }))
            }
        };

        // Destroy plans pass through untouched
        if proposed.is_null() {
            return Ok(Response::new(proto::plan_resource_change::Response {
                planned_state: Some(encode_dynamic_value(&proposed)?),
                requires_replace: vec![],
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: false,
                deferred: None,
            }));
        }

        let mut outcome = plan_resource(schema, &config, &prior_state, &proposed);
        let mut planned_private = req.prior_private.clone();

        let provider_configured = self.provider_data.read().await.is_some();
        if let Some(factory) = self.resources.get(&req.type_name) {
            let mut resource = factory();
            if provider_configured {
                let provider_data = self.provider_data.read().await.clone();
                resource
                    .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
                    .await;
            }
            if let Some(modifier) = resource.as_modify_plan() {
                let resp = modifier
                    .modify_plan(
                        ctx,
                        ModifyPlanRequest {
                            type_name: req.type_name.clone(),
                            config,
                            prior_state,
                            proposed_new_state: proposed,
                            planned_state: outcome.planned_state.clone(),
                            prior_private: req.prior_private,
                            provider_meta: optional_dynamic_value(req.provider_meta.as_ref())?,
                        },
                    )
                    .await;
                outcome.planned_state = resp.planned_state;
                outcome.requires_replace.extend(resp.requires_replace);
                outcome.diagnostics.extend(resp.diagnostics);
                planned_private = resp.planned_private;
            }
        }

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_dynamic_value(&schema.conform(&outcome.planned_state))?),
            requires_replace: outcome
                .requires_replace
                .iter()
                .map(attribute_path_to_proto)
                .collect(),
            planned_private,
            diagnostics: diagnostics_to_proto(outcome.diagnostics),
            legacy_type_system: false,
            deferred: None,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> std::result::Result<Response<proto::apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        let ctx = self.context();

        let prior_state = decode_dynamic_value(req.prior_state.as_ref())?;
        let planned_state = decode_dynamic_value(req.planned_state.as_ref())?;
        let config = decode_dynamic_value(req.config.as_ref())?;
        let provider_meta = optional_dynamic_value(req.provider_meta.as_ref())?;

        let respond = |state: &DynamicValue,
                       private: Vec<u8>,
                       diagnostics: Vec<Diagnostic>|
         -> std::result::Result<Response<proto::apply_resource_change::Response>, Status> {
            Ok(Response::new(proto::apply_resource_change::Response {
                new_state: Some(encode_dynamic_value(state)?),
                private,
                diagnostics: diagnostics_to_proto(diagnostics),
                legacy_type_system: false,
            }))
        };

        let schema = match self.resource_schema(&req.type_name) {
            Ok(schema) => schema,
            Err(diags) => return respond(&prior_state, req.planned_private, diags),
        };
        let resource = match self.configured_resource(&req.type_name, &ctx).await {
            Ok(resource) => resource,
            Err(diags) => return respond(&prior_state, req.planned_private, diags),
        };

        if prior_state.is_null() {
            info!(type_name = %req.type_name, "creating resource");
            let resp = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: req.type_name.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            // A failed create only keeps state the resource reported explicitly
            let new_state = if has_errors(&resp.diagnostics)
                && (resp.new_state.is_null() || resp.new_state.value.contains_unknown())
            {
                warn!(type_name = %req.type_name, "create failed");
                DynamicValue::null()
            } else {
                finalize_state(schema, &resp.new_state)
            };
            respond(&new_state, resp.private, resp.diagnostics)
        } else if planned_state.is_null() {
            info!(type_name = %req.type_name, "deleting resource");
            let resp = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            if has_errors(&resp.diagnostics) {
                respond(&prior_state, vec![], resp.diagnostics)
            } else {
                respond(&DynamicValue::null(), vec![], resp.diagnostics)
            }
        } else {
            info!(type_name = %req.type_name, "updating resource");
            let resp = resource
                .update(
                    ctx,
                    UpdateResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            let new_state = if has_errors(&resp.diagnostics)
                && (resp.new_state.is_null() || resp.new_state.value.contains_unknown())
            {
                prior_state
            } else {
                finalize_state(schema, &resp.new_state)
            };
            respond(&new_state, resp.private, resp.diagnostics)
        }
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> std::result::Result<Response<proto::import_resource_state::Response>, Status> {
        let req = request.into_inner();
        let ctx = self.context();
        info!(type_name = %req.type_name, id = %req.id, "importing resource");

        let failed = |diagnostics: Vec<Diagnostic>|
         -> std::result::Result<Response<proto::import_resource_state::Response>, Status> {
            Ok(Response::new(proto::import_resource_state::Response {
                imported_resources: vec![],
                diagnostics: diagnostics_to_proto(diagnostics),
                deferred: None,
            }))
        };

        let schema = match self.resource_schema(&req.type_name) {
            Ok(schema) => schema,
            Err(diags) => return failed(diags),
        };
        let resource = match self.configured_resource(&req.type_name, &ctx).await {
            Ok(resource) => resource,
            Err(diags) => return failed(diags),
        };
        let Some(importer) = resource.as_import_state() else {
            return failed(vec![Diagnostic::error(
                "Resource import not implemented",
                format!("{} does not support import.", req.type_name),
            )]);
        };

        let resp = importer
            .import_state(
                ctx,
                ImportResourceStateRequest {
                    type_name: req.type_name.clone(),
                    id: req.id,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        let mut imported_resources = Vec::with_capacity(resp.imported_resources.len());
        for imported in resp.imported_resources {
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(encode_dynamic_value(&finalize_state(schema, &imported.state))?),
                private: imported.private,
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(resp.diagnostics),
            deferred: resp.deferred.map(|d| deferred_to_proto(&d)),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> std::result::Result<Response<proto::read_data_source::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "read_data_source");
        let ctx = self.context();
        let config = decode_dynamic_value(req.config.as_ref())?;

        let failed = |diagnostics: Vec<Diagnostic>|
         -> std::result::Result<Response<proto::read_data_source::Response>, Status> {
            Ok(Response::new(proto::read_data_source::Response {
                state: None,
                diagnostics: diagnostics_to_proto(diagnostics),
                deferred: None,
            }))
        };

        let Some(schema) = self.data_source_schemas.get(&req.type_name) else {
            return failed(vec![unknown_type("data source", &req.type_name)]);
        };
        let data_source = match self.configured_data_source(&req.type_name, &ctx).await {
            Ok(data_source) => data_source,
            Err(diags) => return failed(diags),
        };

        let resp = data_source
            .read(
                ctx,
                ReadDataSourceRequest {
                    type_name: req.type_name.clone(),
                    config,
                    provider_meta: optional_dynamic_value(req.provider_meta.as_ref())?,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;

        let state = if has_errors(&resp.diagnostics) && resp.state.is_null() {
            None
        } else {
            Some(encode_dynamic_value(&finalize_state(schema, &resp.state))?)
        };

        Ok(Response::new(proto::read_data_source::Response {
            state,
            diagnostics: diagnostics_to_proto(resp.diagnostics),
            deferred: resp.deferred.map(|d| deferred_to_proto(&d)),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> std::result::Result<Response<proto::stop_provider::Response>, Status> {
        info!("stop requested, cancelling in-flight operations");
        self.stop.cancel();
        let resp = self
            .provider
            .read()
            .await
            .stop(Context::new(), StopProviderRequest)
            .await;
        Ok(Response::new(proto::stop_provider::Response {
            error: resp.error.unwrap_or_default(),
        }))
    }
}

/// Result of the framework's attribute-level planning
#[derive(Debug)]
pub(crate) struct PlanOutcome {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Applies defaults, marks computed values unknown and runs plan modifiers.
pub(crate) fn plan_resource(
    schema: &Schema,
    config: &DynamicValue,
    prior_state: &DynamicValue,
    proposed: &DynamicValue,
) -> PlanOutcome {
    let changed = prior_state.is_null() || !values_equal(&proposed.value, &prior_state.value);
    let mut outcome = PlanOutcome {
        planned_state: DynamicValue::null(),
        requires_replace: Vec::new(),
        diagnostics: Vec::new(),
    };
    let planned = plan_block(
        &schema.block,
        &config.value,
        &prior_state.value,
        &proposed.value,
        &AttributePath::root(),
        changed,
        &mut outcome,
    );
    outcome.planned_state = DynamicValue::new(planned);
    outcome
}

fn plan_block(
    block: &Block,
    config: &Dynamic,
    prior: &Dynamic,
    proposed: &Dynamic,
    path: &AttributePath,
    changed: bool,
    outcome: &mut PlanOutcome,
) -> Dynamic {
    let mut planned: HashMap<String, Dynamic> = proposed.as_map().cloned().unwrap_or_default();

    for attr in &block.attributes {
        let attr_path = child_path(path, &attr.name);
        let value = plan_attribute(
            attr,
            config.field(&attr.name).unwrap_or(&Dynamic::Null),
            prior.field(&attr.name).unwrap_or(&Dynamic::Null),
            proposed.field(&attr.name).unwrap_or(&Dynamic::Null),
            &attr_path,
            changed,
            outcome,
        );
        planned.insert(attr.name.clone(), value);
    }

    for nested in &block.block_types {
        let value = plan_nested_block(
            nested,
            config.field(&nested.type_name).unwrap_or(&Dynamic::Null),
            prior.field(&nested.type_name).unwrap_or(&Dynamic::Null),
            proposed.field(&nested.type_name).unwrap_or(&Dynamic::Null),
            &child_path(path, &nested.type_name),
            changed,
            outcome,
        );
        planned.insert(nested.type_name.clone(), value);
    }

    Dynamic::Map(planned)
}

fn plan_attribute(
    attr: &Attribute,
    config: &Dynamic,
    prior: &Dynamic,
    proposed: &Dynamic,
    path: &AttributePath,
    changed: bool,
    outcome: &mut PlanOutcome,
) -> Dynamic {
    let mut value = proposed.clone();

    if attr.computed && config.is_null() {
        if let Some(default) = attr.default.as_ref().filter(|_| attr.optional) {
            value = default
                .default_value(DefaultRequest { path: path.clone() })
                .value
                .value;
        } else if value.is_null() || changed {
            value = Dynamic::Unknown;
        }
    }

    for modifier in &attr.plan_modifiers {
        let resp = modifier.modify(PlanModifierRequest {
            config_value: DynamicValue::new(config.clone()),
            state_value: DynamicValue::new(prior.clone()),
            plan_value: DynamicValue::new(value),
            path: path.clone(),
        });
        value = resp.plan_value.value;
        if resp.requires_replace {
            outcome.requires_replace.push(path.clone());
        }
        outcome.diagnostics.extend(resp.diagnostics);
    }

    value
}

fn plan_nested_block(
    nested: &NestedBlock,
    config: &Dynamic,
    prior: &Dynamic,
    proposed: &Dynamic,
    path: &AttributePath,
    changed: bool,
    outcome: &mut PlanOutcome,
) -> Dynamic {
    match (nested.nesting, proposed) {
        (NestingMode::Single, Dynamic::Map(_)) | (NestingMode::Group, Dynamic::Map(_)) => {
            plan_block(&nested.block, config, prior, proposed, path, changed, outcome)
        }
        (NestingMode::List, Dynamic::List(items)) => {
            let config_items = config.as_list();
            let prior_items = prior.as_list();
            Dynamic::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        plan_block(
                            &nested.block,
                            config_items.and_then(|c| c.get(i)).unwrap_or(&Dynamic::Null),
                            prior_items.and_then(|p| p.get(i)).unwrap_or(&Dynamic::Null),
                            item,
                            &path.clone().index(i as i64),
                            changed,
                            outcome,
                        )
                    })
                    .collect(),
            )
        }
        // Set and map elements have no stable identity to pair with prior state
        _ => proposed.clone(),
    }
}

fn child_path(parent: &AttributePath, name: &str) -> AttributePath {
    if parent.steps.is_empty() {
        AttributePath::new(name)
    } else {
        parent.clone().attribute(name)
    }
}

/// Conforms state to the schema and resolves leftover unknowns to null,
/// since applied state must be wholly known.
fn finalize_state(schema: &Schema, state: &DynamicValue) -> DynamicValue {
    fn resolve(value: Dynamic) -> Dynamic {
        match value {
            Dynamic::Unknown => Dynamic::Null,
            Dynamic::List(items) => Dynamic::List(items.into_iter().map(resolve).collect()),
            Dynamic::Map(m) => Dynamic::Map(m.into_iter().map(|(k, v)| (k, resolve(v))).collect()),
            other => other,
        }
    }
    let conformed = schema.conform(state);
    DynamicValue::new(resolve(conformed.value))
}

pub(crate) fn decode_dynamic_value(
    value: Option<&proto::DynamicValue>,
) -> std::result::Result<DynamicValue, Status> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };
    let decoded = if !value.msgpack.is_empty() {
        DynamicValue::decode_msgpack(&value.msgpack)
    } else {
        DynamicValue::decode_json(&value.json)
    };
    decoded.map_err(Status::from)
}

fn optional_dynamic_value(
    value: Option<&proto::DynamicValue>,
) -> std::result::Result<Option<DynamicValue>, Status> {
    value.map(|v| decode_dynamic_value(Some(v))).transpose()
}

pub(crate) fn encode_dynamic_value(
    value: &DynamicValue,
) -> std::result::Result<proto::DynamicValue, Status> {
    Ok(proto::DynamicValue {
        msgpack: value.encode_msgpack().map_err(Status::from)?,
        json: vec![],
    })
}

pub(crate) fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| proto::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
            } as i32,
            summary: d.summary,
            detail: d.detail,
            attribute: d.attribute.as_ref().map(attribute_path_to_proto),
        })
        .collect()
}

fn attribute_path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;
    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| proto::attribute_path::Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

fn client_capabilities_from_proto(caps: Option<&proto::ClientCapabilities>) -> ClientCapabilities {
    caps.map(|c| ClientCapabilities {
        deferral_allowed: c.deferral_allowed,
        write_only_attributes_allowed: c.write_only_attributes_allowed,
    })
    .unwrap_or_default()
}

fn server_capabilities_to_proto(caps: &ServerCapabilities) -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: caps.plan_destroy,
        get_provider_schema_optional: caps.get_provider_schema_optional,
        move_resource_state: caps.move_resource_state,
    }
}

fn deferred_to_proto(deferred: &Deferred) -> proto::Deferred {
    use proto::deferred::Reason;
    let reason = match deferred.reason {
        DeferredReason::Unknown => Reason::Unknown,
        DeferredReason::ResourceConfigUnknown => Reason::ResourceConfigUnknown,
        DeferredReason::ProviderConfigUnknown => Reason::ProviderConfigUnknown,
        DeferredReason::AbsentPrereq => Reason::AbsentPrereq,
    };
    proto::Deferred {
        reason: reason as i32,
    }
}

fn string_kind_to_proto(kind: StringKind) -> i32 {
    match kind {
        StringKind::Plain => proto::StringKind::Plain as i32,
        StringKind::Markdown => proto::StringKind::Markdown as i32,
    }
}

pub(crate) fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> proto::schema::Block {
    proto::schema::Block {
        version: block.version,
        attributes: block
            .attributes
            .iter()
            .map(|attr| proto::schema::Attribute {
                name: attr.name.clone(),
                r#type: attr.r#type.encode(),
                nested_type: None,
                description: attr.description.clone(),
                required: attr.required,
                optional: attr.optional,
                computed: attr.computed,
                sensitive: attr.sensitive,
                description_kind: string_kind_to_proto(StringKind::Plain),
                deprecated: attr.deprecated,
                write_only: false,
            })
            .collect(),
        block_types: block
            .block_types
            .iter()
            .map(|nested| {
                use proto::schema::nested_block::NestingMode as ProtoNesting;
                proto::schema::NestedBlock {
                    type_name: nested.type_name.clone(),
                    block: Some(block_to_proto(&nested.block)),
                    nesting: match nested.nesting {
                        NestingMode::Single => ProtoNesting::Single,
                        NestingMode::List => ProtoNesting::List,
                        NestingMode::Set => ProtoNesting::Set,
                        NestingMode::Map => ProtoNesting::Map,
                        NestingMode::Group => ProtoNesting::Group,
                    } as i32,
                    min_items: nested.min_items,
                    max_items: nested.max_items,
                }
            })
            .collect(),
        description: block.description.clone(),
        description_kind: string_kind_to_proto(block.description_kind),
        deprecated: block.deprecated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticDefault;
    use crate::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
    use crate::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};

    fn schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("region_id", AttributeType::Number)
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enabled", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("interface", NestingMode::List)
                    .attribute(
                        AttributeBuilder::new("type", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("port_id", AttributeType::String)
                            .computed()
                            .build(),
                    )
                    .build(),
            )
            .build()
    }

    fn object(fields: &[(&str, Dynamic)]) -> DynamicValue {
        DynamicValue::new(Dynamic::Map(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ))
    }

    fn interface(port: Dynamic) -> Dynamic {
        Dynamic::Map(HashMap::from([
            ("type".to_string(), Dynamic::from("external")),
            ("port_id".to_string(), port),
        ]))
    }

    #[test]
    fn create_plan_marks_computed_unknown_and_applies_defaults() {
        let config = object(&[
            ("region_id", Dynamic::Number(76.0)),
            ("name", Dynamic::from("vm")),
            ("interface", Dynamic::List(vec![interface(Dynamic::Null)])),
        ]);
        let outcome = plan_resource(&schema(), &config, &DynamicValue::null(), &config);
        let planned = outcome.planned_state;

        assert!(planned.get(&AttributePath::new("id")).unwrap().is_unknown());
        assert!(planned.get(&AttributePath::new("status")).unwrap().is_unknown());
        assert_eq!(
            planned.get(&AttributePath::new("enabled")),
            Some(&Dynamic::Bool(true))
        );
        assert!(planned
            .get(&AttributePath::new("interface").index(0).attribute("port_id"))
            .unwrap()
            .is_unknown());
        assert!(outcome.requires_replace.is_empty());
    }

    #[test]
    fn unchanged_resource_keeps_computed_values() {
        let prior = object(&[
            ("id", Dynamic::from("abc")),
            ("region_id", Dynamic::Number(76.0)),
            ("name", Dynamic::from("vm")),
            ("status", Dynamic::from("ACTIVE")),
            ("enabled", Dynamic::Bool(true)),
            ("interface", Dynamic::List(vec![interface(Dynamic::from("p1"))])),
        ]);
        let config = object(&[
            ("region_id", Dynamic::Number(76.0)),
            ("name", Dynamic::from("vm")),
            ("interface", Dynamic::List(vec![interface(Dynamic::Null)])),
        ]);
        let outcome = plan_resource(&schema(), &config, &prior, &prior);

        assert_eq!(outcome.planned_state, prior);
    }

    #[test]
    fn update_plan_keeps_id_and_flags_replacement() {
        let prior = object(&[
            ("id", Dynamic::from("abc")),
            ("region_id", Dynamic::Number(76.0)),
            ("name", Dynamic::from("vm")),
            ("status", Dynamic::from("ACTIVE")),
            ("enabled", Dynamic::Bool(true)),
            ("interface", Dynamic::List(vec![])),
        ]);
        let proposed = object(&[
            ("id", Dynamic::from("abc")),
            ("region_id", Dynamic::Number(8.0)),
            ("name", Dynamic::from("vm")),
            ("status", Dynamic::from("ACTIVE")),
            ("enabled", Dynamic::Bool(true)),
            ("interface", Dynamic::List(vec![])),
        ]);
        let config = object(&[
            ("region_id", Dynamic::Number(8.0)),
            ("name", Dynamic::from("vm")),
        ]);
        let outcome = plan_resource(&schema(), &config, &prior, &proposed);

        assert_eq!(
            outcome.planned_state.get(&AttributePath::new("id")),
            Some(&Dynamic::from("abc"))
        );
        assert!(outcome
            .planned_state
            .get(&AttributePath::new("status"))
            .unwrap()
            .is_unknown());
        assert_eq!(outcome.requires_replace, vec![AttributePath::new("region_id")]);
    }

    #[test]
    fn finalize_state_resolves_unknowns() {
        let state = object(&[("id", Dynamic::Unknown), ("name", Dynamic::from("vm"))]);
        let finalized = finalize_state(&schema(), &state);

        assert_eq!(finalized.get(&AttributePath::new("id")), Some(&Dynamic::Null));
        assert_eq!(
            finalized.get(&AttributePath::new("interface")),
            Some(&Dynamic::List(vec![]))
        );
    }

    #[test]
    fn schema_conversion_encodes_types_and_blocks() {
        let proto_schema = schema_to_proto(&schema());
        let block = proto_schema.block.unwrap();

        let region = block
            .attributes
            .iter()
            .find(|a| a.name == "region_id")
            .unwrap();
        assert_eq!(region.r#type, b"\"number\"".to_vec());
        assert!(region.required);
        assert_eq!(block.block_types[0].type_name, "interface");
        assert_eq!(
            block.block_types[0].nesting,
            proto::schema::nested_block::NestingMode::List as i32
        );
    }

    #[test]
    fn decode_prefers_msgpack_and_accepts_missing_values() {
        assert!(decode_dynamic_value(None).unwrap().is_null());

        let value = object(&[("name", Dynamic::from("vm"))]);
        let encoded = encode_dynamic_value(&value).unwrap();
        assert_eq!(decode_dynamic_value(Some(&encoded)).unwrap(), value);

        let json = proto::DynamicValue {
            msgpack: vec![],
            json: br#"{"name":"vm"}"#.to_vec(),
        };
        assert_eq!(decode_dynamic_value(Some(&json)).unwrap(), value);
    }
}
