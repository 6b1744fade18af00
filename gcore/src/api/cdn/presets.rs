use crate::api::{client::Client, error::ApiError, Service};
use serde::{Deserialize, Serialize};

/// Presets are predefined option sets applied to CDN resources or origin
/// groups. The backend rejects concurrent applies on the same account, so
/// callers serialize these calls.
pub struct PresetsApi<'a> {
    client: &'a Client,
}

impl<'a> PresetsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn applied_path(preset_id: i64) -> String {
        format!("/cdn/presets/{}/applied_presets", preset_id)
    }

    pub async fn list_applied(&self, preset_id: i64) -> Result<Vec<AppliedPreset>, ApiError> {
        self.client
            .get(Service::Cdn, &Self::applied_path(preset_id))
            .await
    }

    /// Looks up one object the preset is applied to
    pub async fn find_applied(
        &self,
        preset_id: i64,
        object_id: i64,
    ) -> Result<Option<AppliedPreset>, ApiError> {
        Ok(self
            .list_applied(preset_id)
            .await?
            .into_iter()
            .find(|applied| applied.object_id == object_id))
    }

    pub async fn apply(&self, preset_id: i64, object_id: i64) -> Result<AppliedPreset, ApiError> {
        self.client
            .post(
                Service::Cdn,
                &Self::applied_path(preset_id),
                &serde_json::json!({ "object_id": object_id }),
            )
            .await
    }

    pub async fn unapply(&self, preset_id: i64, object_id: i64) -> Result<(), ApiError> {
        self.client
            .delete_empty(
                Service::Cdn,
                &format!("{}/{}", Self::applied_path(preset_id), object_id),
            )
            .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedPreset {
    pub object_id: i64,
    #[serde(default)]
    pub preset_id: Option<i64>,
    #[serde(default)]
    pub object_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn find_applied_scans_list() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/cdn/presets/3/applied_presets")
            .with_body(r#"[{"object_id":101,"object_type":"resource"},{"object_id":102}]"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let presets = client.cdn().presets();
        assert!(presets.find_applied(3, 102).await.unwrap().is_some());
        assert!(presets.find_applied(3, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn apply_and_unapply() {
        let mut server = Server::new_async().await;
        let apply = server
            .mock("POST", "/cdn/presets/3/applied_presets")
            .match_body(Matcher::Json(serde_json::json!({"object_id": 101})))
            .with_status(201)
            .with_body(r#"{"object_id":101,"preset_id":3}"#)
            .create_async()
            .await;
        let unapply = server
            .mock("DELETE", "/cdn/presets/3/applied_presets/101")
            .with_status(204)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let applied = client.cdn().presets().apply(3, 101).await.unwrap();
        assert_eq!(applied.preset_id, Some(3));
        client.cdn().presets().unapply(3, 101).await.unwrap();

        apply.assert_async().await;
        unapply.assert_async().await;
    }
}
