use crate::api::{client::Client, error::ApiError, Service};
use serde::{Deserialize, Serialize};

/// SSH keypairs are project scoped and synchronous
pub struct KeypairsApi<'a> {
    client: &'a Client,
}

impl<'a> KeypairsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Without a public key the backend generates the pair and returns the
    /// private key once, in this response only.
    pub async fn create(&self, request: &CreateKeypairRequest) -> Result<Keypair, ApiError> {
        self.client
            .post(Service::Cloud, "/v2/keypairs", request)
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Keypair, ApiError> {
        self.client
            .get(Service::Cloud, &format!("/v2/keypairs/{}", id))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete_empty(Service::Cloud, &format!("/v2/keypairs/{}", id))
            .await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateKeypairRequest {
    pub sshkey_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub project_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Keypair {
    pub sshkey_id: String,
    pub sshkey_name: String,
    pub public_key: String,
    pub private_key: Option<String>,
    pub fingerprint: String,
    pub project_id: Option<i64>,
    pub state: Option<String>,
}
