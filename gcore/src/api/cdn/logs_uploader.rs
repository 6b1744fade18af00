use crate::api::{client::Client, error::ApiError, Service};
use serde::{Deserialize, Serialize};

const TARGETS_PATH: &str = "/cdn/logs_uploader/targets";

/// Storage destinations for raw CDN logs
pub struct LogsTargetsApi<'a> {
    client: &'a Client,
}

impl<'a> LogsTargetsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CreateLogsTargetRequest) -> Result<LogsTarget, ApiError> {
        self.client.post(Service::Cdn, TARGETS_PATH, request).await
    }

    pub async fn get(&self, id: i64) -> Result<LogsTarget, ApiError> {
        self.client
            .get(Service::Cdn, &format!("{}/{}", TARGETS_PATH, id))
            .await
    }

    pub async fn update(
        &self,
        id: i64,
        request: &UpdateLogsTargetRequest,
    ) -> Result<LogsTarget, ApiError> {
        self.client
            .patch(Service::Cdn, &format!("{}/{}", TARGETS_PATH, id), request)
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client
            .delete_empty(Service::Cdn, &format!("{}/{}", TARGETS_PATH, id))
            .await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateLogsTargetRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// "s3_gcore", "s3_amazon", "s3_other", "ftp", "sftp" or "http"
    pub storage_type: String,
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct UpdateLogsTargetRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsTarget {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub storage_type: String,
    /// Secrets (keys, passwords) come back masked or omitted
    #[serde(default)]
    pub config: serde_json::Value,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn update_omits_unchanged_config() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PATCH", "/cdn/logs_uploader/targets/12")
            .match_body(Matcher::Json(serde_json::json!({"name": "archive"})))
            .with_body(
                r#"{"id":12,"name":"archive","description":null,"storage_type":"ftp",
                    "config":{"hostname":"ftp.example.com","user":"logs","directory":"/"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let target = client
            .cdn()
            .logs_targets()
            .update(
                12,
                &UpdateLogsTargetRequest {
                    name: Some("archive".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(target.storage_type, "ftp");
        assert_eq!(target.config["hostname"], "ftp.example.com");
        mock.assert_async().await;
    }
}
