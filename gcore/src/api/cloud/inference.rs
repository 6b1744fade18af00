//! Everywhere Inference deployments (v3 API)
//!
//! Deployments are addressed by name within a project and span one or more
//! regions through their containers.

use crate::api::common::deserialize_timestamp_option;
use crate::api::{client::Client, error::ApiError, tasks::TaskResults, Service};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct InferenceApi<'a> {
    client: &'a Client,
    project_id: i64,
}

impl<'a> InferenceApi<'a> {
    pub fn new(client: &'a Client, project_id: i64) -> Self {
        Self { client, project_id }
    }

    fn deployments_path(&self) -> String {
        format!("/v3/inference/{}/deployments", self.project_id)
    }

    fn deployment_path(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.deployments_path(),
            urlencoding::encode(name)
        )
    }

    pub async fn create(&self, request: &CreateInferenceRequest) -> Result<TaskResults, ApiError> {
        self.client
            .post(Service::Cloud, &self.deployments_path(), request)
            .await
    }

    pub async fn get(&self, name: &str) -> Result<InferenceDeployment, ApiError> {
        self.client
            .get(Service::Cloud, &self.deployment_path(name))
            .await
    }

    pub async fn update(
        &self,
        name: &str,
        request: &UpdateInferenceRequest,
    ) -> Result<TaskResults, ApiError> {
        self.client
            .patch(Service::Cloud, &self.deployment_path(name), request)
            .await
    }

    pub async fn delete(&self, name: &str) -> Result<TaskResults, ApiError> {
        self.client
            .delete(Service::Cloud, &self.deployment_path(name))
            .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InferenceScale {
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceContainer {
    pub region_id: i64,
    pub scale: InferenceScale,
    #[serde(default, skip_serializing)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateInferenceRequest {
    pub name: String,
    pub image: String,
    pub listening_port: i64,
    pub flavor_name: String,
    pub containers: Vec<InferenceContainer>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub envs: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub auth_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

/// Only the fields that are set are sent
#[derive(Debug, Clone, Serialize, Default)]
pub struct UpdateInferenceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listening_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containers: Option<Vec<InferenceContainer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envs: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

impl UpdateInferenceRequest {
    pub fn is_empty(&self) -> bool {
        self.image.is_none()
            && self.listening_port.is_none()
            && self.flavor_name.is_none()
            && self.containers.is_none()
            && self.envs.is_none()
            && self.description.is_none()
            && self.auth_enabled.is_none()
            && self.command.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceDeployment {
    pub name: String,
    pub image: String,
    pub listening_port: i64,
    pub flavor_name: String,
    pub status: String,
    pub address: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub auth_enabled: bool,
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub envs: HashMap<String, String>,
    #[serde(default)]
    pub containers: Vec<InferenceContainer>,
    #[serde(default, deserialize_with = "deserialize_timestamp_option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn update_sends_only_changed_fields() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PATCH", "/v3/inference/1/deployments/llama")
            .match_body(Matcher::Json(serde_json::json!({
                "image": "ghcr.io/acme/llama:2",
                "containers": [{"region_id": 76, "scale": {"min": 1, "max": 3}}],
            })))
            .with_body(r#"{"tasks":["t-inf"]}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let request = UpdateInferenceRequest {
            image: Some("ghcr.io/acme/llama:2".to_string()),
            containers: Some(vec![InferenceContainer {
                region_id: 76,
                scale: InferenceScale { min: 1, max: 3 },
                address: Some("ignored".to_string()),
            }]),
            ..Default::default()
        };
        assert!(!request.is_empty());
        let tasks = client
            .cloud()
            .inference(1)
            .update("llama", &request)
            .await
            .unwrap();
        assert_eq!(tasks.task_id().unwrap(), "t-inf");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_parses_deployment() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/v3/inference/1/deployments/llama")
            .with_body(
                r#"{"name":"llama","image":"ghcr.io/acme/llama:1","listening_port":8080,
                    "flavor_name":"inference-4vcpu-16gib","status":"DEPLOYING","address":null,
                    "auth_enabled":false,"envs":{"MODEL":"7b"},
                    "containers":[{"region_id":76,"scale":{"min":1,"max":2},"address":"https://x"}]}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let deployment = client.cloud().inference(1).get("llama").await.unwrap();
        assert_eq!(deployment.status, "DEPLOYING");
        assert_eq!(deployment.containers[0].scale.max, 2);
        assert_eq!(deployment.envs["MODEL"], "7b");
    }
}
