//! Test helpers for the Gcore API

use super::{Client, Credentials, Endpoints, RetryConfig};
use std::time::Duration;

pub const TEST_TOKEN: &str = "1234$abcdef";

/// A client pointing every API family at `url`, with fast retries and polling
#[allow(dead_code)]
pub fn create_test_client(url: &str) -> Client {
    let retry = RetryConfig {
        max_retries: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        timeout_seconds: 10,
    };
    Client::with_config(
        Endpoints::single(url).unwrap(),
        Credentials::ApiKey(TEST_TOKEN.to_string()),
        retry,
    )
    .unwrap()
    .with_task_poll_interval(Duration::from_millis(10))
}

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 200);
        assert_eq!(config.max_backoff_ms, 10000);
        assert_eq!(config.timeout_seconds, 300);
    }

    #[test]
    fn test_client_defaults_to_one_second_polling() {
        let client = Client::new(
            Endpoints::from_base("https://api.gcore.com").unwrap(),
            Credentials::ApiKey("t".to_string()),
        )
        .unwrap();
        assert_eq!(client.task_poll_interval().as_secs(), 1);
        assert_eq!(client.endpoints().waap, "https://api.gcore.com/waap");
    }
}
