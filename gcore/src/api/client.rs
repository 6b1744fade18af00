use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::common::{ApiErrorDetails, ApiErrorResponse};
use super::error::ApiError;

/// The Gcore API families, each with its own base URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Cloud,
    Cdn,
    Waap,
    Iam,
    FastEdge,
}

/// Base URLs for every API family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub cloud: String,
    pub cdn: String,
    pub waap: String,
    pub iam: String,
    pub fastedge: String,
}

impl Endpoints {
    /// Derives every API base from the shared `api_endpoint`
    pub fn from_base(api_endpoint: &str) -> Result<Self, ApiError> {
        let base = normalize(api_endpoint)?;
        Ok(Self {
            cloud: format!("{}/cloud", base),
            cdn: base.clone(),
            waap: format!("{}/waap", base),
            iam: format!("{}/iam", base),
            fastedge: format!("{}/fastedge", base),
        })
    }

    /// Points every API at the same base, used against mock servers
    pub fn single(base: &str) -> Result<Self, ApiError> {
        let base = normalize(base)?;
        Ok(Self {
            cloud: base.clone(),
            cdn: base.clone(),
            waap: base.clone(),
            iam: base.clone(),
            fastedge: base,
        })
    }

    pub fn with_override(mut self, service: Service, url: &str) -> Result<Self, ApiError> {
        let url = normalize(url)?;
        match service {
            Service::Cloud => self.cloud = url,
            Service::Cdn => self.cdn = url,
            Service::Waap => self.waap = url,
            Service::Iam => self.iam = url,
            Service::FastEdge => self.fastedge = url,
        }
        Ok(self)
    }

    fn base(&self, service: Service) -> &str {
        match service {
            Service::Cloud => &self.cloud,
            Service::Cdn => &self.cdn,
            Service::Waap => &self.waap,
            Service::Iam => &self.iam,
            Service::FastEdge => &self.fastedge,
        }
    }
}

fn normalize(raw: &str) -> Result<String, ApiError> {
    let parsed = url::Url::parse(raw).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::InvalidUrl(format!(
            "{}: scheme must be http or https",
            raw
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// How the client authenticates
#[derive(Clone)]
pub enum Credentials {
    /// Permanent API token, sent as `APIKey <token>`
    ApiKey(String),
    Bearer(String),
}

impl Credentials {
    fn header_value(&self) -> String {
        match self {
            Credentials::ApiKey(token) => format!("APIKey {}", token),
            Credentials::Bearer(token) => format!("Bearer {}", token),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey(***)"),
            Credentials::Bearer(_) => f.write_str("Bearer(***)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 10000,
            timeout_seconds: 300,
        }
    }
}

/// Gcore API client, cheap to clone
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    endpoints: Endpoints,
    auth_header: String,
    retry_config: RetryConfig,
    task_poll_interval: Duration,
}

impl Client {
    pub fn new(endpoints: Endpoints, credentials: Credentials) -> Result<Self, ApiError> {
        Self::with_config(endpoints, credentials, RetryConfig::default())
    }

    pub fn with_config(
        endpoints: Endpoints,
        credentials: Credentials,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("terraform-provider-gcore/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(retry_config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                endpoints,
                auth_header: credentials.header_value(),
                retry_config,
                task_poll_interval: Duration::from_secs(1),
            }),
        })
    }

    /// Overrides how often task and status waiters poll
    pub fn with_task_poll_interval(self, interval: Duration) -> Self {
        let inner = ClientInner {
            http_client: self.inner.http_client.clone(),
            endpoints: self.inner.endpoints.clone(),
            auth_header: self.inner.auth_header.clone(),
            retry_config: self.inner.retry_config.clone(),
            task_poll_interval: interval,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    pub fn task_poll_interval(&self) -> Duration {
        self.inner.task_poll_interval
    }

    pub fn cloud(&self) -> crate::api::cloud::CloudApi<'_> {
        crate::api::cloud::CloudApi::new(self)
    }

    pub fn cdn(&self) -> crate::api::cdn::CdnApi<'_> {
        crate::api::cdn::CdnApi::new(self)
    }

    pub fn waap(&self) -> crate::api::waap::WaapApi<'_> {
        crate::api::waap::WaapApi::new(self)
    }

    pub fn iam(&self) -> crate::api::iam::IamApi<'_> {
        crate::api::iam::IamApi::new(self)
    }

    pub fn fastedge(&self) -> crate::api::fastedge::FastEdgeApi<'_> {
        crate::api::fastedge::FastEdgeApi::new(self)
    }

    pub fn tasks(&self) -> crate::api::tasks::TasksApi<'_> {
        crate::api::tasks::TasksApi::new(self)
    }

    pub async fn get<T: DeserializeOwned>(&self, service: Service, path: &str) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(Method::GET, service, path, None::<&()>, true)
            .await?;
        parse_json(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(Method::POST, service, path, Some(body), false)
            .await?;
        parse_json(response).await
    }

    pub async fn post_empty<B: Serialize>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        self.execute_with_retry(Method::POST, service, path, Some(body), false)
            .await?;
        Ok(())
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(Method::PUT, service, path, Some(body), true)
            .await?;
        parse_json(response).await
    }

    pub async fn put_empty<B: Serialize>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        self.execute_with_retry(Method::PUT, service, path, Some(body), true)
            .await?;
        Ok(())
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(Method::PATCH, service, path, Some(body), true)
            .await?;
        parse_json(response).await
    }

    pub async fn patch_empty<B: Serialize>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        self.execute_with_retry(Method::PATCH, service, path, Some(body), true)
            .await?;
        Ok(())
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .execute_with_retry(Method::DELETE, service, path, None::<&()>, true)
            .await?;
        parse_json(response).await
    }

    pub async fn delete_empty(&self, service: Service, path: &str) -> Result<(), ApiError> {
        self.execute_with_retry(Method::DELETE, service, path, None::<&()>, true)
            .await?;
        Ok(())
    }

    /// Uploads a raw binary body, e.g. a wasm module
    pub async fn post_bytes<T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.endpoints.base(service), path);
        tracing::debug!(%url, size = bytes.len(), "POST binary upload");

        let response = self
            .inner
            .http_client
            .post(&url)
            .header(AUTHORIZATION, &self.inner.auth_header)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        if response.status().is_success() {
            parse_json(response).await
        } else {
            handle_error_response(response).await
        }
    }

    /// Sends a request, retrying rate limits and connection failures with
    /// exponential backoff. Server errors and timeouts are only retried for
    /// idempotent requests so a create is never submitted twice.
    async fn execute_with_retry<B: Serialize>(
        &self,
        method: Method,
        service: Service,
        path: &str,
        body: Option<&B>,
        idempotent: bool,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.inner.endpoints.base(service), path);
        let retry = &self.inner.retry_config;
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= retry.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    retry.initial_backoff_ms * 2_u64.pow(attempt - 1),
                    retry.max_backoff_ms,
                );
                tracing::debug!(%url, backoff_ms = backoff, attempt, "retrying request");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            tracing::debug!(%method, %url, "sending request");
            let mut request = self
                .inner
                .http_client
                .request(method.clone(), &url)
                .header(AUTHORIZATION, &self.inner.auth_header);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    tracing::debug!(%url, %status, "received response");

                    if status.is_success() {
                        return Ok(response);
                    }
                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(ApiError::AuthError);
                    }
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() && idempotent {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return handle_error_response(response).await;
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        // the server may already have acted on a timed-out write
                        if !idempotent {
                            return Err(ApiError::Timeout(retry.timeout_seconds));
                        }
                        last_error = Some(ApiError::Timeout(retry.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let text = response.text().await?;
    tracing::trace!(body = %text, "API response body");

    // Some endpoints answer 204 or an empty body where the caller expects `()`
    let text = if text.trim().is_empty() {
        "null"
    } else {
        text.as_str()
    };
    serde_json::from_str::<T>(text).map_err(|e| {
        tracing::error!(error = %e, "failed to deserialize response");
        tracing::debug!(body = %text, "undecodable response body");
        ApiError::ParseError(e.to_string())
    })
}

async fn handle_error_response<T>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::warn!(status, body = %text, "API error response");

    let details = serde_json::from_str::<ApiErrorResponse>(&text)
        .ok()
        .map(|resp| Box::new(ApiErrorDetails::from(resp)));
    let message = details
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or(text);

    Err(ApiError::ApiError {
        status,
        message,
        details,
    })
}

#[cfg(test)]
#[path = "./client_test.rs"]
mod client_test;
