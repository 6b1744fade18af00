use thiserror::Error;

use super::common::ApiErrorDetails;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
        #[source]
        details: Option<Box<ApiErrorDetails>>,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("task {task_id} is in error state: {error}")]
    TaskFailed { task_id: String, error: String },

    #[error("task {task_id} has invalid state: {state}")]
    TaskInvalidState { task_id: String, state: String },

    #[error("timed out after {timeout_secs}s waiting for task {task_id}")]
    TaskTimeout { task_id: String, timeout_secs: u64 },

    #[error("task {0} finished without reporting the created resource")]
    MissingTaskResult(String),

    #[error("unexpected state '{state}', wanted target '{target}'")]
    UnexpectedState { state: String, target: String },

    #[error("timeout while waiting for state to become '{target}' (last state: '{last_state}')")]
    StateTimeout { target: String, last_state: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            ApiError::AuthError => Some(401),
            ApiError::RateLimited => Some(429),
            _ => None,
        }
    }

    /// The remote object does not exist (any more)
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_detection() {
        let err = ApiError::ApiError {
            status: 404,
            message: "Instance not found".to_string(),
            details: None,
        };
        assert!(err.is_not_found());

        let err = ApiError::ApiError {
            status: 409,
            message: "conflict".to_string(),
            details: None,
        };
        assert!(!err.is_not_found());
        assert!(!ApiError::ServiceUnavailable.is_not_found());
    }

    #[test]
    fn task_errors_render_task_id() {
        let err = ApiError::TaskFailed {
            task_id: "5b2ba3e4".to_string(),
            error: "quota exceeded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "task 5b2ba3e4 is in error state: quota exceeded"
        );
    }
}
