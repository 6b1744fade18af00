//! Clients for the Gcore REST APIs
//!
//! One `Client` talks to every API family (cloud, CDN, WAAP, IAM, FastEdge);
//! each family is reached through a borrowed sub-API, e.g.
//! `client.cloud().instances(project_id, region_id).get(id)`.

pub mod cdn;
pub mod client;
pub mod cloud;
pub mod common;
pub mod error;
pub mod fastedge;
pub mod iam;
pub mod tasks;
pub mod waap;

#[cfg(test)]
pub mod test_helpers;

pub use client::{Client, Credentials, Endpoints, RetryConfig, Service};
pub use common::{ApiErrorDetails, ListResponse, QueryParams};
pub use error::ApiError;
pub use tasks::{Task, TaskResults, TaskState};
