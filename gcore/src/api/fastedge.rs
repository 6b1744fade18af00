//! Gcore FastEdge API: wasm binaries and the apps that run them

use crate::api::{client::Client, error::ApiError, Service};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub struct FastEdgeApi<'a> {
    client: &'a Client,
}

impl<'a> FastEdgeApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn upload_binary(&self, wasm: Vec<u8>) -> Result<Binary, ApiError> {
        self.client
            .post_bytes(Service::FastEdge, "/v1/binaries/raw", wasm)
            .await
    }

    pub async fn get_binary(&self, id: i64) -> Result<Binary, ApiError> {
        self.client
            .get(Service::FastEdge, &format!("/v1/binaries/{}", id))
            .await
    }

    pub async fn delete_binary(&self, id: i64) -> Result<(), ApiError> {
        self.client
            .delete_empty(Service::FastEdge, &format!("/v1/binaries/{}", id))
            .await
    }

    pub async fn create_app(&self, request: &AppRequest) -> Result<App, ApiError> {
        self.client
            .post(Service::FastEdge, "/v1/apps", request)
            .await
    }

    pub async fn get_app(&self, id: i64) -> Result<App, ApiError> {
        self.client
            .get(Service::FastEdge, &format!("/v1/apps/{}", id))
            .await
    }

    pub async fn update_app(&self, id: i64, request: &AppRequest) -> Result<App, ApiError> {
        self.client
            .put(Service::FastEdge, &format!("/v1/apps/{}", id), request)
            .await
    }

    pub async fn delete_app(&self, id: i64) -> Result<(), ApiError> {
        self.client
            .delete_empty(Service::FastEdge, &format!("/v1/apps/{}", id))
            .await
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Binary {
    pub id: i64,
    pub api_type: Option<String>,
    pub status: Option<i64>,
    pub checksum: Option<String>,
}

/// App states as the API encodes them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    Enabled,
    Disabled,
    Suspended,
}

impl AppStatus {
    pub const NAMES: [&'static str; 3] = ["enabled", "disabled", "suspended"];

    pub fn code(self) -> i64 {
        match self {
            AppStatus::Enabled => 1,
            AppStatus::Disabled => 2,
            AppStatus::Suspended => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(AppStatus::Enabled),
            2 => Some(AppStatus::Disabled),
            5 => Some(AppStatus::Suspended),
            _ => None,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "enabled" => Some(AppStatus::Enabled),
            "disabled" => Some(AppStatus::Disabled),
            "suspended" => Some(AppStatus::Suspended),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppStatus::Enabled => "enabled",
            AppStatus::Disabled => "disabled",
            AppStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretRef {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppRequest {
    pub name: String,
    pub binary: i64,
    pub status: i64,
    pub env: HashMap<String, String>,
    pub rsp_headers: HashMap<String, String>,
    pub secrets: HashMap<String, SecretRef>,
    pub debug: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct App {
    pub id: i64,
    pub name: String,
    pub binary: i64,
    pub status: i64,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub rsp_headers: HashMap<String, String>,
    #[serde(default)]
    pub secrets: HashMap<String, SecretRef>,
    #[serde(default)]
    pub debug: bool,
    pub comment: Option<String>,
    pub url: Option<String>,
}
