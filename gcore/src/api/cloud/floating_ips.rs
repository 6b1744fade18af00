use super::{deserialize_metadata, Location};
use crate::api::common::deserialize_timestamp_option;
use crate::api::{client::Client, error::ApiError, tasks::TaskResults, Service};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct FloatingIpsApi<'a> {
    client: &'a Client,
    location: Location,
}

impl<'a> FloatingIpsApi<'a> {
    pub fn new(client: &'a Client, location: Location) -> Self {
        Self { client, location }
    }

    fn ip_path(&self, id: &str) -> String {
        format!("{}/{}", self.location.path("v1", "floatingips"), id)
    }

    pub async fn create(&self, request: &CreateFloatingIpRequest) -> Result<TaskResults, ApiError> {
        self.client
            .post(
                Service::Cloud,
                &self.location.path("v1", "floatingips"),
                request,
            )
            .await
    }

    pub async fn get(&self, id: &str) -> Result<FloatingIp, ApiError> {
        self.client.get(Service::Cloud, &self.ip_path(id)).await
    }

    pub async fn assign(
        &self,
        id: &str,
        port_id: &str,
        fixed_ip_address: Option<&str>,
    ) -> Result<FloatingIp, ApiError> {
        self.client
            .post(
                Service::Cloud,
                &format!("{}/assign", self.ip_path(id)),
                &serde_json::json!({
                    "port_id": port_id,
                    "fixed_ip_address": fixed_ip_address,
                }),
            )
            .await
    }

    pub async fn unassign(&self, id: &str) -> Result<FloatingIp, ApiError> {
        self.client
            .post(
                Service::Cloud,
                &format!("{}/unassign", self.ip_path(id)),
                &serde_json::json!({}),
            )
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<TaskResults, ApiError> {
        self.client.delete(Service::Cloud, &self.ip_path(id)).await
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateFloatingIpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_ip_address: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub floating_ip_address: Option<String>,
    pub fixed_ip_address: Option<String>,
    pub port_id: Option<String>,
    pub router_id: Option<String>,
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: HashMap<String, String>,
    #[serde(default, deserialize_with = "deserialize_timestamp_option")]
    pub created_at: Option<DateTime<Utc>>,
}
