use super::{deserialize_metadata, Location};
use crate::api::common::deserialize_timestamp_option;
use crate::api::{client::Client, error::ApiError, tasks::TaskResults, Service};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct LoadBalancersApi<'a> {
    client: &'a Client,
    location: Location,
}

impl<'a> LoadBalancersApi<'a> {
    pub fn new(client: &'a Client, location: Location) -> Self {
        Self { client, location }
    }

    fn lb_path(&self, id: &str) -> String {
        format!("{}/{}", self.location.path("v1", "loadbalancers"), id)
    }

    pub async fn create(
        &self,
        request: &CreateLoadBalancerRequest,
    ) -> Result<TaskResults, ApiError> {
        self.client
            .post(
                Service::Cloud,
                &self.location.path("v1", "loadbalancers"),
                request,
            )
            .await
    }

    pub async fn get(&self, id: &str) -> Result<LoadBalancer, ApiError> {
        self.client.get(Service::Cloud, &self.lb_path(id)).await
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<LoadBalancer, ApiError> {
        self.client
            .patch(
                Service::Cloud,
                &self.lb_path(id),
                &serde_json::json!({ "name": name }),
            )
            .await
    }

    /// Replaces all user metadata (the `tags` attribute)
    pub async fn replace_metadata(
        &self,
        id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), ApiError> {
        self.client
            .put_empty(
                Service::Cloud,
                &format!("{}/metadata", self.lb_path(id)),
                metadata,
            )
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<TaskResults, ApiError> {
        self.client.delete(Service::Cloud, &self.lb_path(id)).await
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateLoadBalancerRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip_network_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip_subnet_id: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    pub vip_address: Option<String>,
    pub vip_port_id: Option<String>,
    pub provisioning_status: String,
    pub operating_status: String,
    pub flavor: Option<LoadBalancerFlavor>,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: HashMap<String, String>,
    #[serde(default, deserialize_with = "deserialize_timestamp_option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancerFlavor {
    pub flavor_id: Option<String>,
    pub flavor_name: String,
}
