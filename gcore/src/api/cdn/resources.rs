use crate::api::{client::Client, error::ApiError, Service};
use serde::{Deserialize, Serialize};

pub struct CdnResourcesApi<'a> {
    client: &'a Client,
}

impl<'a> CdnResourcesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CdnResourceRequest) -> Result<CdnResource, ApiError> {
        self.client
            .post(Service::Cdn, "/cdn/resources", request)
            .await
    }

    pub async fn get(&self, id: i64) -> Result<CdnResource, ApiError> {
        self.client
            .get(Service::Cdn, &format!("/cdn/resources/{}", id))
            .await
    }

    /// Full replacement; `cname` is ignored by the backend on update
    pub async fn update(
        &self,
        id: i64,
        request: &CdnResourceRequest,
    ) -> Result<CdnResource, ApiError> {
        self.client
            .put(Service::Cdn, &format!("/cdn/resources/{}", id), request)
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client
            .delete_empty(Service::Cdn, &format!("/cdn/resources/{}", id))
            .await
    }
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CdnResourceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_group: Option<i64>,
    pub origin_protocol: String,
    pub secondary_hostnames: Vec<String>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Option name to `{"enabled": .., "value": ..}`
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnResource {
    pub id: i64,
    pub cname: String,
    pub origin_group: Option<i64>,
    #[serde(rename = "originGroup_name")]
    pub origin_group_name: Option<String>,
    pub origin_protocol: String,
    #[serde(default)]
    pub secondary_hostnames: Vec<String>,
    pub active: bool,
    pub status: String,
    pub description: Option<String>,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}
