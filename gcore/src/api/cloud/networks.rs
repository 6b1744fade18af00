use super::{deserialize_metadata, Location};
use crate::api::common::deserialize_timestamp_option;
use crate::api::{client::Client, error::ApiError, tasks::TaskResults, Service};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct NetworksApi<'a> {
    client: &'a Client,
    location: Location,
}

impl<'a> NetworksApi<'a> {
    pub fn new(client: &'a Client, location: Location) -> Self {
        Self { client, location }
    }

    fn network_path(&self, id: &str) -> String {
        format!("{}/{}", self.location.path("v1", "networks"), id)
    }

    pub async fn create(&self, request: &CreateNetworkRequest) -> Result<TaskResults, ApiError> {
        self.client
            .post(Service::Cloud, &self.location.path("v1", "networks"), request)
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Network, ApiError> {
        self.client.get(Service::Cloud, &self.network_path(id)).await
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<Network, ApiError> {
        self.client
            .patch(
                Service::Cloud,
                &self.network_path(id),
                &serde_json::json!({ "name": name }),
            )
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<TaskResults, ApiError> {
        self.client
            .delete(Service::Cloud, &self.network_path(id))
            .await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateNetworkRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i64>,
    /// "vxlan" or "vlan"
    #[serde(rename = "type")]
    pub type_: String,
    pub create_router: bool,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub mtu: i64,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: HashMap<String, String>,
    #[serde(default, deserialize_with = "deserialize_timestamp_option")]
    pub created_at: Option<DateTime<Utc>>,
}
