//! Schema types and builders for tfplug
//!
//! Resources, data sources and the provider itself describe their
//! configuration with a `Schema`: a root `Block` of attributes and nested
//! blocks. Besides describing the shape to Terraform, the schema drives
//! config validation, defaults, plan modifiers and state conformance.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;
use std::sync::Arc;

/// AttributeType mirrors Terraform's type system
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(HashMap<String, AttributeType>),
}

impl AttributeType {
    pub fn list(element: AttributeType) -> Self {
        AttributeType::List(Box::new(element))
    }

    pub fn set(element: AttributeType) -> Self {
        AttributeType::Set(Box::new(element))
    }

    pub fn map(element: AttributeType) -> Self {
        AttributeType::Map(Box::new(element))
    }

    pub fn object(fields: &[(&str, AttributeType)]) -> Self {
        AttributeType::Object(
            fields
                .iter()
                .map(|(name, ty)| (name.to_string(), ty.clone()))
                .collect(),
        )
    }

    /// Terraform's JSON type constraint syntax, e.g. `["list","string"]`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Value};
        match self {
            AttributeType::String => json!("string"),
            AttributeType::Number => json!("number"),
            AttributeType::Bool => json!("bool"),
            AttributeType::List(e) => json!(["list", e.to_json()]),
            AttributeType::Set(e) => json!(["set", e.to_json()]),
            AttributeType::Map(e) => json!(["map", e.to_json()]),
            AttributeType::Object(fields) => {
                let fields: serde_json::Map<String, Value> = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                json!(["object", fields])
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }

    /// Checks that a known value has the shape of this type.
    pub fn accepts(&self, value: &Dynamic) -> bool {
        match (self, value) {
            (_, Dynamic::Null) | (_, Dynamic::Unknown) => true,
            (AttributeType::String, Dynamic::String(_)) => true,
            (AttributeType::Number, Dynamic::Number(_)) => true,
            (AttributeType::Bool, Dynamic::Bool(_)) => true,
            (AttributeType::List(e), Dynamic::List(items))
            | (AttributeType::Set(e), Dynamic::List(items)) => items.iter().all(|i| e.accepts(i)),
            (AttributeType::Map(e), Dynamic::Map(m)) => m.values().all(|v| e.accepts(v)),
            (AttributeType::Object(fields), Dynamic::Map(m)) => m
                .iter()
                .all(|(k, v)| fields.get(k).is_some_and(|t| t.accepts(v))),
            _ => false,
        }
    }

    /// Fills missing object fields with null and drops undeclared ones.
    pub fn conform(&self, value: &Dynamic) -> Dynamic {
        match (self, value) {
            (AttributeType::Object(fields), Dynamic::Map(m)) => Dynamic::Map(
                fields
                    .iter()
                    .map(|(name, ty)| {
                        let v = m.get(name).map_or(Dynamic::Null, |v| ty.conform(v));
                        (name.clone(), v)
                    })
                    .collect(),
            ),
            (AttributeType::List(e), Dynamic::List(items))
            | (AttributeType::Set(e), Dynamic::List(items)) => {
                Dynamic::List(items.iter().map(|i| e.conform(i)).collect())
            }
            (AttributeType::Map(e), Dynamic::Map(m)) => Dynamic::Map(
                m.iter()
                    .map(|(k, v)| (k.clone(), e.conform(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

impl Schema {
    /// Rewrites `value` so its object keys match the schema exactly.
    pub fn conform(&self, value: &DynamicValue) -> DynamicValue {
        if value.is_null() {
            return value.clone();
        }
        DynamicValue::new(self.block.conform(&value.value))
    }

    pub fn validate(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.block
            .validate(&config.value, &AttributePath::root(), &mut diagnostics);
        diagnostics
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

impl Block {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn nested_block(&self, name: &str) -> Option<&NestedBlock> {
        self.block_types.iter().find(|b| b.type_name == name)
    }

    pub fn conform(&self, value: &Dynamic) -> Dynamic {
        let empty = HashMap::new();
        let fields = value.as_map().unwrap_or(&empty);
        let mut out = HashMap::new();

        for attr in &self.attributes {
            let v = fields
                .get(&attr.name)
                .map_or(Dynamic::Null, |v| attr.r#type.conform(v));
            out.insert(attr.name.clone(), v);
        }

        for nested in &self.block_types {
            let v = fields.get(&nested.type_name).unwrap_or(&Dynamic::Null);
            out.insert(nested.type_name.clone(), nested.conform(v));
        }

        Dynamic::Map(out)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let empty = HashMap::new();
        let fields = value.as_map().unwrap_or(&empty);

        for attr in &self.attributes {
            let attr_path = child_path(path, &attr.name);
            let v = fields.get(&attr.name).unwrap_or(&Dynamic::Null);

            if attr.required && v.is_null() {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!("The argument \"{}\" is required.", attr.name),
                    )
                    .with_attribute(attr_path.clone()),
                );
                continue;
            }

            if attr.computed && !attr.optional && !attr.required && !v.is_null() {
                diagnostics.push(
                    Diagnostic::error(
                        "Value for unconfigurable attribute",
                        format!("Can't configure a value for \"{}\": it is read-only.", attr.name),
                    )
                    .with_attribute(attr_path.clone()),
                );
                continue;
            }

            if !attr.r#type.accepts(v) {
                diagnostics.push(
                    Diagnostic::error(
                        "Incorrect attribute value type",
                        format!(
                            "Inappropriate value for attribute \"{}\": got {}.",
                            attr.name,
                            v.type_name()
                        ),
                    )
                    .with_attribute(attr_path.clone()),
                );
                continue;
            }

            if v.is_null() || v.is_unknown() {
                continue;
            }

            for validator in &attr.validators {
                let resp = validator.validate(ValidatorRequest {
                    config_value: DynamicValue::new(v.clone()),
                    path: attr_path.clone(),
                });
                diagnostics.extend(resp.diagnostics);
            }

            if attr.deprecated {
                diagnostics.push(
                    Diagnostic::warning(
                        "Deprecated attribute",
                        format!("The attribute \"{}\" is deprecated.", attr.name),
                    )
                    .with_attribute(attr_path),
                );
            }
        }

        for nested in &self.block_types {
            let block_path = child_path(path, &nested.type_name);
            let v = fields.get(&nested.type_name).unwrap_or(&Dynamic::Null);
            nested.validate(v, &block_path, diagnostics);
        }
    }
}

fn child_path(parent: &AttributePath, name: &str) -> AttributePath {
    if parent.steps.is_empty() {
        AttributePath::new(name)
    } else {
        parent.clone().attribute(name)
    }
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub deprecated: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub default: Option<Arc<dyn Default>>,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("validators", &self.validators.len())
            .field("plan_modifiers", &self.plan_modifiers.len())
            .field("default", &self.default.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    pub max_items: i64,
}

impl NestedBlock {
    fn conform(&self, value: &Dynamic) -> Dynamic {
        match self.nesting {
            NestingMode::Single => match value {
                Dynamic::Null | Dynamic::Unknown => value.clone(),
                _ => self.block.conform(value),
            },
            NestingMode::Group => match value {
                Dynamic::Unknown => value.clone(),
                _ => self.block.conform(value),
            },
            NestingMode::List | NestingMode::Set => match value {
                Dynamic::List(items) => {
                    Dynamic::List(items.iter().map(|i| self.block.conform(i)).collect())
                }
                Dynamic::Unknown => value.clone(),
                _ => Dynamic::List(Vec::new()),
            },
            NestingMode::Map => match value {
                Dynamic::Map(m) => Dynamic::Map(
                    m.iter()
                        .map(|(k, v)| (k.clone(), self.block.conform(v)))
                        .collect(),
                ),
                Dynamic::Unknown => value.clone(),
                _ => Dynamic::Map(HashMap::new()),
            },
        }
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let items: Vec<(AttributePath, &Dynamic)> = match (self.nesting, value) {
            (_, Dynamic::Unknown) => return,
            (NestingMode::List, Dynamic::List(items)) | (NestingMode::Set, Dynamic::List(items)) => {
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (path.clone().index(i as i64), v))
                    .collect()
            }
            (NestingMode::Map, Dynamic::Map(m)) => {
                m.iter().map(|(k, v)| (path.clone().key(k), v)).collect()
            }
            (NestingMode::Single, Dynamic::Map(_)) | (NestingMode::Group, Dynamic::Map(_)) => {
                vec![(path.clone(), value)]
            }
            _ => Vec::new(),
        };

        let count = items.len() as i64;
        if self.min_items > 0 && count < self.min_items {
            diagnostics.push(
                Diagnostic::error(
                    "Insufficient blocks",
                    format!(
                        "At least {} \"{}\" blocks are required.",
                        self.min_items, self.type_name
                    ),
                )
                .with_attribute(path.clone()),
            );
        }
        if self.max_items > 0 && count > self.max_items {
            diagnostics.push(
                Diagnostic::error(
                    "Too many blocks",
                    format!(
                        "No more than {} \"{}\" blocks are allowed.",
                        self.max_items, self.type_name
                    ),
                )
                .with_attribute(path.clone()),
            );
        }

        for (item_path, item) in items {
            self.block.validate(item, &item_path, diagnostics);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NestingMode {
    Single,
    List,
    Set,
    Map,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StringKind {
    Plain,
    Markdown,
}

/// Validator performs validation on a known, non-null config value
pub trait Validator: Send + Sync {
    fn description(&self) -> String;
    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

pub struct ValidatorRequest {
    pub config_value: DynamicValue,
    pub path: AttributePath,
}

pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// PlanModifier adjusts a planned attribute value; see `plan_modifier`
pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;
    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse;
}

pub struct PlanModifierRequest {
    pub config_value: DynamicValue,
    pub state_value: DynamicValue,
    pub plan_value: DynamicValue,
    pub path: AttributePath,
}

pub struct PlanModifierResponse {
    pub plan_value: DynamicValue,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Default provides the value of an optional+computed attribute left unset
pub trait Default: Send + Sync {
    fn description(&self) -> String;
    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

pub struct DefaultRequest {
    pub path: AttributePath,
}

pub struct DefaultResponse {
    pub value: DynamicValue,
}

/// AttributeBuilder provides a fluent API for building attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                deprecated: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.attribute.validators.push(Arc::from(validator));
        self
    }

    pub fn plan_modifier(mut self, modifier: Box<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(Arc::from(modifier));
        self
    }

    /// Defaults only apply to optional+computed attributes, so this also
    /// marks the attribute computed.
    pub fn default(mut self, default: Box<dyn Default>) -> Self {
        self.attribute.default = Some(Arc::from(default));
        self.attribute.computed = true;
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// NestedBlockBuilder builds a nested configuration block
pub struct NestedBlockBuilder {
    nested: NestedBlock,
}

impl NestedBlockBuilder {
    pub fn new(type_name: &str, nesting: NestingMode) -> Self {
        Self {
            nested: NestedBlock {
                type_name: type_name.to_string(),
                block: empty_block(),
                nesting,
                min_items: 0,
                max_items: 0,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.nested.block.description = desc.to_string();
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.nested.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.nested.block.block_types.push(block);
        self
    }

    pub fn min_items(mut self, min: i64) -> Self {
        self.nested.min_items = min;
        self
    }

    pub fn max_items(mut self, max: i64) -> Self {
        self.nested.max_items = max;
        self
    }

    pub fn build(self) -> NestedBlock {
        self.nested
    }
}

/// SchemaBuilder provides a fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: empty_block(),
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.schema.block.block_types.push(block);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn description_kind(mut self, kind: StringKind) -> Self {
        self.schema.block.description_kind = kind;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_block() -> Block {
    Block {
        version: 0,
        attributes: Vec::new(),
        block_types: Vec::new(),
        description: String::new(),
        description_kind: StringKind::Plain,
        deprecated: false,
    }
}
