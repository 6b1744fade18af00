//! Gcore cloud API: projects, regions and region-scoped compute objects

use crate::api::{client::Client, common::ListResponse, error::ApiError, Service};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

mod floating_ips;
mod inference;
mod instances;
mod keypairs;
mod load_balancers;
mod networks;

pub use floating_ips::{CreateFloatingIpRequest, FloatingIp, FloatingIpsApi};
pub use inference::{
    CreateInferenceRequest, InferenceApi, InferenceContainer, InferenceDeployment, InferenceScale,
    UpdateInferenceRequest,
};
pub use instances::{
    CreateInstanceRequest, Instance, InstanceAddress, InstanceFlavor, InstanceInterface,
    InstanceVolume, InstancesApi,
};
pub use keypairs::{CreateKeypairRequest, Keypair, KeypairsApi};
pub use load_balancers::{
    CreateLoadBalancerRequest, LoadBalancer, LoadBalancerFlavor, LoadBalancersApi,
};
pub use networks::{CreateNetworkRequest, Network, NetworksApi};

pub struct CloudApi<'a> {
    client: &'a Client,
}

impl<'a> CloudApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn projects(&self) -> Result<Vec<Project>, ApiError> {
        let list: ListResponse<Project> = self.client.get(Service::Cloud, "/v1/projects").await?;
        Ok(list.results)
    }

    pub async fn regions(&self) -> Result<Vec<Region>, ApiError> {
        let list: ListResponse<Region> = self.client.get(Service::Cloud, "/v1/regions").await?;
        Ok(list.results)
    }

    pub fn instances(&self, project_id: i64, region_id: i64) -> InstancesApi<'a> {
        InstancesApi::new(self.client, Location::new(project_id, region_id))
    }

    pub fn floating_ips(&self, project_id: i64, region_id: i64) -> FloatingIpsApi<'a> {
        FloatingIpsApi::new(self.client, Location::new(project_id, region_id))
    }

    pub fn load_balancers(&self, project_id: i64, region_id: i64) -> LoadBalancersApi<'a> {
        LoadBalancersApi::new(self.client, Location::new(project_id, region_id))
    }

    pub fn networks(&self, project_id: i64, region_id: i64) -> NetworksApi<'a> {
        NetworksApi::new(self.client, Location::new(project_id, region_id))
    }

    pub fn keypairs(&self) -> KeypairsApi<'a> {
        KeypairsApi::new(self.client)
    }

    pub fn inference(&self, project_id: i64) -> InferenceApi<'a> {
        InferenceApi::new(self.client, project_id)
    }
}

/// Project and region a cloud object lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub project_id: i64,
    pub region_id: i64,
}

impl Location {
    pub fn new(project_id: i64, region_id: i64) -> Self {
        Self {
            project_id,
            region_id,
        }
    }

    /// `/{version}/{collection}/{project}/{region}`
    pub(crate) fn path(&self, version: &str, collection: &str) -> String {
        format!(
            "/{}/{}/{}/{}",
            version, collection, self.project_id, self.region_id
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub client_id: Option<i64>,
    pub state: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub display_name: String,
    pub keystone_name: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// Cloud objects report metadata either as a plain object or as a list of
/// `{key, value, read_only}` items; both become a string map. Read-only
/// (system) keys are dropped since users cannot manage them.
pub(crate) fn deserialize_metadata<'de, D>(
    deserializer: D,
) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Item {
        key: String,
        value: String,
        #[serde(default)]
        read_only: bool,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Map(HashMap<String, String>),
        List(Vec<Item>),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Map(map)) => map,
        Some(Raw::List(items)) => items
            .into_iter()
            .filter(|item| !item.read_only)
            .map(|item| (item.key, item.value))
            .collect(),
        None => HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::Server;

    #[derive(Deserialize)]
    struct WithMetadata {
        #[serde(default, deserialize_with = "deserialize_metadata")]
        metadata: HashMap<String, String>,
    }

    #[test]
    fn metadata_accepts_map_and_list_forms() {
        let map: WithMetadata = serde_json::from_str(r#"{"metadata":{"env":"prod"}}"#).unwrap();
        assert_eq!(map.metadata.get("env").map(String::as_str), Some("prod"));

        let list: WithMetadata = serde_json::from_str(
            r#"{"metadata":[{"key":"env","value":"prod","read_only":false},
                           {"key":"task_id","value":"x","read_only":true}]}"#,
        )
        .unwrap();
        assert_eq!(list.metadata.len(), 1);
        assert_eq!(list.metadata["env"], "prod");

        let missing: WithMetadata = serde_json::from_str(r#"{"metadata":null}"#).unwrap();
        assert!(missing.metadata.is_empty());
    }

    #[test]
    fn location_builds_paths() {
        assert_eq!(
            Location::new(1, 76).path("v1", "floatingips"),
            "/v1/floatingips/1/76"
        );
    }

    #[tokio::test]
    async fn lists_projects_and_regions() {
        let mut server = Server::new_async().await;
        let _p = server
            .mock("GET", "/v1/projects")
            .with_body(
                r#"{"count":2,"results":[
                    {"id":1,"name":"default","client_id":7,"state":"ACTIVE","is_default":true},
                    {"id":2,"name":"staging","client_id":7,"state":"ACTIVE"}]}"#,
            )
            .create_async()
            .await;
        let _r = server
            .mock("GET", "/v1/regions")
            .with_body(
                r#"{"count":1,"results":[{"id":76,"display_name":"Luxembourg-2","keystone_name":"ED-10","state":"ACTIVE"}]}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let projects = client.cloud().projects().await.unwrap();
        assert_eq!(projects.len(), 2);
        assert!(projects[0].is_default);
        assert!(!projects[1].is_default);

        let regions = client.cloud().regions().await.unwrap();
        assert_eq!(regions[0].display_name, "Luxembourg-2");
    }
}
