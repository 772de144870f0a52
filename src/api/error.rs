use reqwest::StatusCode;
use thiserror::Error;

/// Errors from the screening backend's REST endpoints.
///
/// The taxonomy mirrors how the controller reacts: authentication failures
/// are fatal for the current operation and bubble to the application shell,
/// validation failures are recovered locally, and only transient failures
/// (network, 5xx, timeouts) are eligible for retry.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("the screening backend rejected the credential; sign in again")]
    Unauthorized,

    #[error("request rejected by the screening backend (HTTP {status}): {message}")]
    Validation { status: u16, message: String },

    #[error("{resource} was not found on the screening backend")]
    NotFound { resource: String },

    #[error("screening backend failure (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("could not reach the screening backend: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout {
        operation: String,
        duration_ms: u64,
    },

    #[error("could not decode the backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no bearer credential is available; sign in before continuing")]
    MissingCredential,
}

impl ApiError {
    /// Map a non-success HTTP status onto the taxonomy.
    pub fn from_status(status: StatusCode, message: String, resource: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::NOT_FOUND => ApiError::NotFound {
                resource: resource.to_string(),
            },
            status if status.is_client_error() => ApiError::Validation {
                status: status.as_u16(),
                message,
            },
            status => ApiError::Server {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether a bounded-backoff retry may help. Auth and validation
    /// failures never become retryable by waiting.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Server { .. } | ApiError::Timeout { .. } => true,
            ApiError::Network(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            ApiError::Unauthorized
            | ApiError::Validation { .. }
            | ApiError::NotFound { .. }
            | ApiError::Decode(_)
            | ApiError::MissingCredential => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, String::new(), "patient"),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, String::new(), "patient"),
            ApiError::NotFound { .. }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, String::new(), "patient"),
            ApiError::Validation { status: 422, .. }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, String::new(), "patient"),
            ApiError::Server { status: 502, .. }
        ));
    }

    #[test]
    fn only_server_side_and_transport_failures_are_transient() {
        assert!(ApiError::Server {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(ApiError::Timeout {
            operation: "save".to_string(),
            duration_ms: 30_000
        }
        .is_transient());
        assert!(!ApiError::Unauthorized.is_transient());
        assert!(!ApiError::Validation {
            status: 400,
            message: String::new()
        }
        .is_transient());
        assert!(!ApiError::MissingCredential.is_transient());
    }
}
