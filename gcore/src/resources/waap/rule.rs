//! Shared implementation of the WAAP rule resources.
//!
//! A rule has one `action` block and one or more `condition` blocks. Each of
//! them holds exactly one variant sub-block, which maps onto the API's
//! single-key objects: `condition { ip { ip_address = ".." } }` becomes
//! `{"ip": {"ip_address": "..", "negation": false}}`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import_state_composite_id;
use tfplug::plan_modifier::{values_equal, RequiresReplaceIfChanged};
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
use tfplug::validator::StringLengthValidator;

use crate::api::waap::{RuleKind, RuleObject, WaapRule, WaapRuleRequest, WaapRulesApi};
use crate::api::Client;
use crate::resources::common::{
    api_error, configure_provider_data, dynamic_to_json, empty_import_response, id_attribute,
    json_to_dynamic, not_configured, numeric_id, optional_bool, optional_string, required_i64,
    required_string, set_bool, set_optional_string, set_string,
};

#[derive(Clone, Copy)]
pub enum Kind {
    String,
    Number,
    StringList,
}

impl Kind {
    fn attribute_type(self) -> AttributeType {
        match self {
            Kind::String => AttributeType::String,
            Kind::Number => AttributeType::Number,
            Kind::StringList => AttributeType::list(AttributeType::String),
        }
    }
}

pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
    pub required: bool,
}

pub const fn required(name: &'static str, kind: Kind) -> Field {
    Field {
        name,
        kind,
        required: true,
    }
}

pub const fn optional(name: &'static str, kind: Kind) -> Field {
    Field {
        name,
        kind,
        required: false,
    }
}

/// One single-key object the API accepts as an action or condition
pub struct Variant {
    pub name: &'static str,
    pub fields: &'static [Field],
}

const NEGATION: &str = "negation";

/// What distinguishes one rule resource from another
pub trait RuleFlavor: Send + Sync + 'static {
    const TYPE_NAME: &'static str;
    const KIND: RuleKind;
    const DESCRIPTION: &'static str;
    const CONDITIONS: &'static [Variant];
    const ACTIONS: &'static [Variant];
    const MAX_CONDITIONS: i64;

    /// Attributes of an action variant that get a default value
    fn action_default(_action: &str, _field: &str) -> Option<f64> {
        None
    }
}

fn variant_block<F: RuleFlavor>(variant: &Variant, negation: bool) -> NestedBlock {
    let builder = variant.fields.iter().fold(
        NestedBlockBuilder::new(variant.name, NestingMode::List).max_items(1),
        |builder, field| {
            let attribute = AttributeBuilder::new(field.name, field.kind.attribute_type());
            let attribute = if field.required {
                attribute.required()
            } else if let Some(default) = F::action_default(variant.name, field.name) {
                attribute
                    .optional()
                    .computed()
                    .default(StaticDefault::number(default))
            } else {
                attribute.optional()
            };
            builder.attribute(attribute.build())
        },
    );
    if negation {
        builder
            .attribute(
                AttributeBuilder::new(NEGATION, AttributeType::Bool)
                    .description("Inverts the condition")
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .build()
    } else {
        builder.build()
    }
}

/// The variants set in one `action` or `condition` element
fn set_variants<'a>(element: &'a Dynamic, variants: &'static [Variant]) -> Vec<(&'static Variant, &'a Dynamic)> {
    variants
        .iter()
        .filter_map(|variant| {
            let item = element.field(variant.name)?.as_list()?.first()?;
            Some((variant, item))
        })
        .collect()
}

fn variant_names(variants: &[Variant]) -> String {
    variants.iter().map(|v| v.name).collect::<Vec<_>>().join(", ")
}

fn variant_to_api(variant: &Variant, block: &Dynamic, negation: bool) -> RuleObject {
    let mut body = serde_json::Map::new();
    for field in variant.fields {
        match block.field(field.name) {
            Some(value) if !value.is_null() && !value.is_unknown() => {
                body.insert(field.name.to_string(), dynamic_to_json(value));
            }
            _ => {}
        }
    }
    if negation {
        let negated = block.field(NEGATION).and_then(Dynamic::as_bool).unwrap_or(false);
        body.insert(NEGATION.to_string(), serde_json::Value::Bool(negated));
    }
    let mut object = RuleObject::new();
    object.insert(variant.name.to_string(), serde_json::Value::Object(body));
    object
}

/// Builds the API request out of a plan or config
pub fn rule_request<F: RuleFlavor>(value: &DynamicValue) -> Result<WaapRuleRequest, Diagnostic> {
    let action_element = value
        .get(&AttributePath::new("action"))
        .and_then(Dynamic::as_list)
        .and_then(|items| items.first())
        .ok_or_else(|| Diagnostic::error("Missing action", "an action block is required"))?;
    let action = match set_variants(action_element, F::ACTIONS).as_slice() {
        [(variant, block)] => variant_to_api(variant, block, false),
        _ => return Err(one_variant_error("action", F::ACTIONS)),
    };

    let conditions = value
        .get_list(&AttributePath::new("condition"))
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, element)| match set_variants(element, F::CONDITIONS).as_slice() {
            [(variant, block)] => Ok(variant_to_api(variant, block, true)),
            _ => Err(one_variant_error("condition", F::CONDITIONS)
                .with_attribute(AttributePath::new("condition").index(i as i64))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WaapRuleRequest {
        name: required_string(value, "name")?,
        description: optional_string(value, "description"),
        enabled: optional_bool(value, "enabled").unwrap_or(true),
        action,
        conditions,
    })
}

fn one_variant_error(block: &str, variants: &[Variant]) -> Diagnostic {
    Diagnostic::error(
        format!("Invalid {} block", block),
        format!(
            "each {} block must contain exactly one of: {}",
            block,
            variant_names(variants)
        ),
    )
    .with_attribute(AttributePath::new(block))
}

/// Turns an API single-key object back into a block element with every
/// variant present, unset ones as empty lists
fn element_from_api(object: &RuleObject, variants: &'static [Variant], negation: bool) -> Option<Dynamic> {
    let (name, body) = object.iter().next()?;
    let Some(variant) = variants.iter().find(|v| v.name == name) else {
        tracing::warn!(variant = %name, "ignoring unsupported WAAP rule element");
        return None;
    };

    let mut block: HashMap<String, Dynamic> = variant
        .fields
        .iter()
        .map(|field| {
            let value = match body.get(field.name) {
                Some(serde_json::Value::Array(items)) if items.is_empty() && !field.required => {
                    Dynamic::Null
                }
                Some(v) => json_to_dynamic(v),
                None => Dynamic::Null,
            };
            (field.name.to_string(), value)
        })
        .collect();
    if negation {
        let negated = body.get(NEGATION).and_then(|v| v.as_bool()).unwrap_or(false);
        block.insert(NEGATION.to_string(), Dynamic::Bool(negated));
    }

    let element = variants
        .iter()
        .map(|v| {
            let items = if v.name == variant.name {
                vec![Dynamic::Map(block.clone())]
            } else {
                vec![]
            };
            (v.name.to_string(), Dynamic::List(items))
        })
        .collect();
    Some(Dynamic::Map(element))
}

fn apply_rule<F: RuleFlavor>(state: &mut DynamicValue, domain_id: i64, rule: &WaapRule) {
    set_string(state, "id", rule.id.to_string());
    let _ = state.set_number(&AttributePath::new("domain_id"), domain_id as f64);
    set_string(state, "name", rule.name.clone());
    if optional_string(state, "description").is_some()
        || rule.description.as_deref().is_some_and(|d| !d.is_empty())
    {
        set_optional_string(state, "description", rule.description.clone());
    }
    set_bool(state, "enabled", rule.enabled);

    if let Some(action) = element_from_api(&rule.action, F::ACTIONS, false) {
        let _ = state.set_list(&AttributePath::new("action"), vec![action]);
    }
    let conditions = rule
        .conditions
        .iter()
        .filter_map(|c| element_from_api(c, F::CONDITIONS, true))
        .collect();
    let _ = state.set_list(&AttributePath::new("condition"), conditions);
}

fn rules_api<F: RuleFlavor>(client: &Client, domain_id: i64) -> WaapRulesApi<'_> {
    WaapRulesApi::new(client, domain_id, F::KIND)
}

fn same(prior: &DynamicValue, planned: &DynamicValue, name: &str) -> bool {
    let path = AttributePath::new(name);
    match (prior.get(&path), planned.get(&path)) {
        (Some(a), Some(b)) => values_equal(a, b),
        (None, None) => true,
        _ => false,
    }
}

pub struct RuleResource<F> {
    provider_data: Option<crate::GcoreProviderData>,
    flavor: PhantomData<F>,
}

impl<F> Default for RuleResource<F> {
    fn default() -> Self {
        Self {
            provider_data: None,
            flavor: PhantomData,
        }
    }
}

impl<F: RuleFlavor> RuleResource<F> {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn with_provider_data(provider_data: crate::GcoreProviderData) -> Self {
        Self {
            provider_data: Some(provider_data),
            flavor: PhantomData,
        }
    }

    async fn create_rule(
        &self,
        data: &crate::GcoreProviderData,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let domain_id = required_i64(planned, "domain_id")?;
        let request = rule_request::<F>(planned)?;
        let rule = rules_api::<F>(&data.client, domain_id)
            .create(&request)
            .await
            .map_err(|e| api_error("Failed to create WAAP rule", &e))?;
        tracing::info!(domain_id, rule_id = rule.id, kind = ?F::KIND, "WAAP rule created");

        let mut state = planned.clone();
        set_string(&mut state, "id", rule.id.to_string());
        set_bool(&mut state, "enabled", rule.enabled);
        Ok(state)
    }

    async fn update_rule(
        &self,
        data: &crate::GcoreProviderData,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let domain_id = required_i64(prior, "domain_id")?;
        let rule_id = numeric_id(prior)?;
        let api = rules_api::<F>(&data.client, domain_id);

        let only_enabled_changed = ["name", "description", "action", "condition"]
            .iter()
            .all(|name| same(prior, planned, name));
        if only_enabled_changed {
            let enabled = optional_bool(planned, "enabled").unwrap_or(true);
            api.toggle(rule_id, enabled)
                .await
                .map_err(|e| api_error("Failed to toggle WAAP rule", &e))?;
        } else {
            let request = rule_request::<F>(planned)?;
            api.update(rule_id, &request)
                .await
                .map_err(|e| api_error("Failed to update WAAP rule", &e))?;
        }
        Ok(planned.clone())
    }
}

#[async_trait]
impl<F: RuleFlavor> Resource for RuleResource<F> {
    fn type_name(&self) -> &str {
        F::TYPE_NAME
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let action = F::ACTIONS
            .iter()
            .fold(
                NestedBlockBuilder::new("action", NestingMode::List)
                    .description(&format!("Exactly one of: {}", variant_names(F::ACTIONS))),
                |builder, variant| builder.block(variant_block::<F>(variant, false)),
            )
            .min_items(1)
            .max_items(1)
            .build();
        let condition = F::CONDITIONS
            .iter()
            .fold(
                NestedBlockBuilder::new("condition", NestingMode::List)
                    .description(&format!("Exactly one of: {}", variant_names(F::CONDITIONS))),
                |builder, variant| builder.block(variant_block::<F>(variant, true)),
            )
            .min_items(1)
            .max_items(F::MAX_CONDITIONS)
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description(F::DESCRIPTION)
            .attribute(id_attribute("Rule ID"))
            .attribute(
                AttributeBuilder::new("domain_id", AttributeType::Number)
                    .description("WAAP domain the rule belongs to")
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(StringLengthValidator::between(1, 100))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enabled", AttributeType::Bool)
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .block(action)
            .block(condition)
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
        let mut diagnostics = vec![];
        let checks: [(&str, &'static [Variant]); 2] =
            [("action", F::ACTIONS), ("condition", F::CONDITIONS)];
        for (block, variants) in checks {
            let elements = request
                .config
                .get_list(&AttributePath::new(block))
                .unwrap_or_default();
            for (i, element) in elements.iter().enumerate() {
                if element.contains_unknown() {
                    continue;
                }
                if set_variants(element, variants).len() != 1 {
                    diagnostics.push(
                        one_variant_error(block, variants)
                            .with_attribute(AttributePath::new(block).index(i as i64)),
                    );
                }
            }
        }
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

        match self.create_rule(data, &request.planned_state).await {
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

        let ids = required_i64(&request.current_state, "domain_id")
            .and_then(|domain_id| Ok((domain_id, numeric_id(&request.current_state)?)));
        let (domain_id, rule_id) = match ids {
            Ok(ids) => ids,
            Err(diag) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                    private: request.private,
                    deferred: None,
                }
            }
        };

        match rules_api::<F>(&data.client, domain_id).get(rule_id).await {
            Ok(rule) => {
                let mut new_state = request.current_state.clone();
                apply_rule::<F>(&mut new_state, domain_id, &rule);
                ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(domain_id, rule_id, "WAAP rule not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read WAAP rule", &e)],
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
            .update_rule(data, &request.prior_state, &request.planned_state)
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

        let ids = required_i64(&request.prior_state, "domain_id")
            .and_then(|domain_id| Ok((domain_id, numeric_id(&request.prior_state)?)));
        let diagnostics = match ids {
            Ok((domain_id, rule_id)) => {
                match rules_api::<F>(&data.client, domain_id).delete(rule_id).await {
                    Ok(()) => vec![],
                    Err(e) if e.is_not_found() => vec![],
                    Err(e) => vec![api_error("Failed to delete WAAP rule", &e)],
                }
            }
            Err(diag) => vec![diag],
        };
        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl<F: RuleFlavor> ResourceWithConfigure for RuleResource<F> {
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
impl<F: RuleFlavor> ResourceWithImportState for RuleResource<F> {
    /// Imports `<domain_id>:<rule_id>`
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = empty_import_response();
        import_state_composite_id(
            &ctx,
            &[("domain_id", AttributeType::Number), ("id", AttributeType::String)],
            &request,
            &mut response,
        );
        response
    }
}
