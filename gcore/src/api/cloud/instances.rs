//! Compute instances

use super::{deserialize_metadata, Location};
use crate::api::common::{deserialize_timestamp_option, QueryParams};
use crate::api::{client::Client, error::ApiError, tasks::TaskResults, Service};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct InstancesApi<'a> {
    client: &'a Client,
    location: Location,
}

impl<'a> InstancesApi<'a> {
    pub fn new(client: &'a Client, location: Location) -> Self {
        Self { client, location }
    }

    fn instance_path(&self, id: &str) -> String {
        format!("{}/{}", self.location.path("v1", "instances"), id)
    }

    pub async fn create(&self, request: &CreateInstanceRequest) -> Result<TaskResults, ApiError> {
        self.client
            .post(Service::Cloud, &self.location.path("v2", "instances"), request)
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Instance, ApiError> {
        self.client.get(Service::Cloud, &self.instance_path(id)).await
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<Instance, ApiError> {
        self.client
            .patch(
                Service::Cloud,
                &self.instance_path(id),
                &serde_json::json!({ "name": name }),
            )
            .await
    }

    /// Resizes the instance; the instance reboots as part of the task
    pub async fn change_flavor(&self, id: &str, flavor_id: &str) -> Result<TaskResults, ApiError> {
        self.client
            .post(
                Service::Cloud,
                &format!("{}/changeflavor", self.instance_path(id)),
                &serde_json::json!({ "flavor_id": flavor_id }),
            )
            .await
    }

    /// Sets (creates or overwrites) the given metadata keys
    pub async fn set_metadata(
        &self,
        id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), ApiError> {
        self.client
            .post_empty(
                Service::Cloud,
                &format!("{}/metadata", self.instance_path(id)),
                metadata,
            )
            .await
    }

    pub async fn delete_metadata_item(&self, id: &str, key: &str) -> Result<(), ApiError> {
        let query = QueryParams::new().add("key", key).to_query_string();
        self.client
            .delete_empty(
                Service::Cloud,
                &format!("{}/metadata_item{}", self.instance_path(id), query),
            )
            .await
    }

    /// Sets changed keys in one call and removes the others concurrently
    pub async fn update_metadata(
        &self,
        id: &str,
        set: &HashMap<String, String>,
        remove: &[String],
    ) -> Result<(), ApiError> {
        if !set.is_empty() {
            self.set_metadata(id, set).await?;
        }
        try_join_all(remove.iter().map(|key| self.delete_metadata_item(id, key))).await?;
        Ok(())
    }

    /// Deletes the instance together with its floating IPs
    pub async fn delete(&self, id: &str) -> Result<TaskResults, ApiError> {
        let query = QueryParams::new()
            .add("delete_floatings", true)
            .to_query_string();
        self.client
            .delete(Service::Cloud, &format!("{}{}", self.instance_path(id), query))
            .await
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CreateInstanceRequest {
    pub names: Vec<String>,
    pub flavor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypair_name: Option<String>,
    pub volumes: Vec<InstanceVolume>,
    pub interfaces: Vec<InstanceInterface>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InstanceVolume {
    /// "image", "new-volume", "existing-volume" or "snapshot"
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InstanceInterface {
    /// "external", "subnet", "any_subnet" or "reserved_fixed_ip"
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    #[serde(alias = "instance_id")]
    pub id: String,
    #[serde(alias = "instance_name")]
    pub name: String,
    pub status: String,
    pub vm_state: Option<String>,
    pub flavor: Option<InstanceFlavor>,
    pub keypair_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub addresses: HashMap<String, Vec<InstanceAddress>>,
    #[serde(
        default,
        alias = "instance_created",
        deserialize_with = "deserialize_timestamp_option"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Instance {
    /// All addresses across networks, in network name order
    pub fn ip_addresses(&self) -> Vec<String> {
        let mut networks: Vec<_> = self.addresses.iter().collect();
        networks.sort_by(|a, b| a.0.cmp(b.0));
        networks
            .into_iter()
            .flat_map(|(_, addrs)| addrs.iter().map(|a| a.addr.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceFlavor {
    pub flavor_id: String,
    pub flavor_name: Option<String>,
    pub vcpus: Option<i64>,
    pub ram: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceAddress {
    pub addr: String,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};

    const INSTANCE: &str = r#"{
        "instance_id": "a7f3c1d2",
        "instance_name": "web-1",
        "status": "ACTIVE",
        "vm_state": "active",
        "flavor": {"flavor_id": "g1-standard-2-4", "flavor_name": "g1-standard-2-4", "vcpus": 2, "ram": 4096},
        "keypair_name": "deploy",
        "metadata": {"env": "prod"},
        "addresses": {
            "public": [{"addr": "203.0.113.10", "type": "fixed"}],
            "backend": [{"addr": "10.0.0.5", "type": "fixed"}]
        },
        "instance_created": "2024-03-01T10:00:00"
    }"#;

    #[tokio::test]
    async fn create_posts_v2_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/instances/1/76")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "names": ["web-1"],
                "flavor": "g1-standard-2-4",
                "volumes": [{"source": "image", "image_id": "img-1", "size": 10, "boot_index": 0}],
                "interfaces": [{"type": "external"}],
            })))
            .with_body(r#"{"tasks":["t-9"]}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let request = CreateInstanceRequest {
            names: vec!["web-1".to_string()],
            flavor: "g1-standard-2-4".to_string(),
            volumes: vec![InstanceVolume {
                source: "image".to_string(),
                image_id: Some("img-1".to_string()),
                size: Some(10),
                boot_index: Some(0),
                ..Default::default()
            }],
            interfaces: vec![InstanceInterface {
                type_: "external".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let tasks = client.cloud().instances(1, 76).create(&request).await.unwrap();
        assert_eq!(tasks.task_id().unwrap(), "t-9");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_maps_v1_fields() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/v1/instances/1/76/a7f3c1d2")
            .with_body(INSTANCE)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let instance = client.cloud().instances(1, 76).get("a7f3c1d2").await.unwrap();
        assert_eq!(instance.id, "a7f3c1d2");
        assert_eq!(instance.name, "web-1");
        assert_eq!(instance.flavor.as_ref().unwrap().flavor_id, "g1-standard-2-4");
        assert_eq!(instance.metadata["env"], "prod");
        assert!(instance.created_at.is_some());
        // ordered by network name: backend, then public
        assert_eq!(instance.ip_addresses(), ["10.0.0.5", "203.0.113.10"]);
    }

    #[tokio::test]
    async fn update_metadata_sets_and_removes_keys() {
        let mut server = Server::new_async().await;
        let set = server
            .mock("POST", "/v1/instances/1/76/a7f3c1d2/metadata")
            .match_body(Matcher::Json(serde_json::json!({"env": "staging"})))
            .with_status(204)
            .create_async()
            .await;
        let remove = server
            .mock("DELETE", "/v1/instances/1/76/a7f3c1d2/metadata_item")
            .match_query(Matcher::UrlEncoded("key".into(), "owner".into()))
            .with_status(204)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let changed = HashMap::from([("env".to_string(), "staging".to_string())]);
        client
            .cloud()
            .instances(1, 76)
            .update_metadata("a7f3c1d2", &changed, &["owner".to_string()])
            .await
            .unwrap();

        set.assert_async().await;
        remove.assert_async().await;
    }

    #[tokio::test]
    async fn delete_also_removes_floating_ips() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/v1/instances/1/76/a7f3c1d2")
            .match_query(Matcher::UrlEncoded("delete_floatings".into(), "true".into()))
            .with_body(r#"{"tasks":["t-10"]}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let tasks = client.cloud().instances(1, 76).delete("a7f3c1d2").await.unwrap();
        assert_eq!(tasks.tasks, vec!["t-10"]);
        mock.assert_async().await;
    }
}
