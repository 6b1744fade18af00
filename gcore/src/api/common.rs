//! Common types and utilities shared by the Gcore APIs

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Error body returned by the Gcore APIs. Cloud uses `message` and
/// `exception_class`; CDN, WAAP and IAM put details under `errors`.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub message: Option<String>,
    pub exception_class: Option<String>,
    pub errors: Option<serde_json::Value>,
    pub detail: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
#[error("API error details: message={message:?}, exception={exception_class:?}, errors={errors:?}")]
pub struct ApiErrorDetails {
    pub message: Option<String>,
    pub exception_class: Option<String>,
    pub errors: Option<serde_json::Value>,
}

impl From<ApiErrorResponse> for ApiErrorDetails {
    fn from(resp: ApiErrorResponse) -> Self {
        Self {
            message: resp.message,
            exception_class: resp.exception_class,
            errors: resp.errors.or(resp.detail),
        }
    }
}

/// Paginated list wrapper used by the cloud API
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    pub count: u64,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    params: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            return String::new();
        }
        format!(
            "?{}",
            self.params
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&")
        )
    }
}

/// Accepts RFC 3339 timestamps as well as the naive `2024-03-01T10:00:00`
/// form the cloud API uses, which is UTC.
pub fn deserialize_timestamp_option<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_encodes_values() {
        let query = QueryParams::new()
            .add("key", "team name")
            .add_optional("limit", Some(10))
            .add_optional("offset", None::<u32>)
            .to_query_string();
        assert_eq!(query, "?key=team%20name&limit=10");
        assert_eq!(QueryParams::new().to_query_string(), "");
    }

    #[test]
    fn timestamps_accept_naive_and_rfc3339() {
        let naive = parse_timestamp("2024-03-01T10:00:00").unwrap();
        let zoned = parse_timestamp("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(naive, zoned);
        assert!(parse_timestamp("2024-03-01T10:00:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn error_details_prefer_errors_over_detail() {
        let resp: ApiErrorResponse = serde_json::from_str(
            r#"{"message":"Bad request","exception_class":"ValidationError","detail":"x"}"#,
        )
        .unwrap();
        let details = ApiErrorDetails::from(resp);
        assert_eq!(details.message.as_deref(), Some("Bad request"));
        assert_eq!(details.errors, Some(serde_json::json!("x")));
    }
}
