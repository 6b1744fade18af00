//! Provider data structure passed to resources and data sources

use crate::api::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct GcoreProviderData {
    pub client: Arc<Client>,
    /// Serializes CDN preset apply/unapply across all resource instances
    pub cdn_mutex: Arc<Mutex<()>>,
    /// Account id from `gcore_client_id`, used by IAM when set
    pub client_id: Option<i64>,
}

impl GcoreProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            cdn_mutex: Arc::new(Mutex::new(())),
            client_id: None,
        }
    }

    pub fn with_client_id(mut self, client_id: Option<i64>) -> Self {
        self.client_id = client_id;
        self
    }
}
