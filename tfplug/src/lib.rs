//! tfplug - Terraform Plugin Framework for Rust
//!
//! A framework for building Terraform providers in Rust on top of the
//! Terraform Plugin Protocol v6.

pub mod context;
pub mod error;
pub mod schema;
pub mod types;

pub mod data_source;
pub mod provider;
pub mod resource;

pub mod defaults;
pub mod import;
pub mod plan_modifier;
pub mod timeouts;
pub mod validator;

pub mod grpc;
pub mod proto;
pub mod server;

pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use import::{import_state_composite_id, import_state_passthrough_id};
pub use provider::{Provider, ProviderMetadataRequest, ProviderMetadataResponse};
pub use resource::{Resource, ResourceWithConfigure, ResourceWithImportState, ResourceWithModifyPlan};
pub use schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, Schema, SchemaBuilder};
pub use server::{serve, ServerConfig};
pub use timeouts::{Timeouts, TimeoutOperation};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

