use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::requests::ValidationError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_description: String,
}

/// Failure of an SSH endpoint, carrying the HTTP status it maps to.
#[derive(Debug, Error)]
pub enum SshApiError {
    #[error("error reading request body: {0}")]
    Body(#[source] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("error parsing {field}: {source}")]
    KeyParse {
        field: &'static str,
        #[source]
        source: ssh_key::Error,
    },

    /// The one-time token was rejected.
    #[error(transparent)]
    Unauthorized(anyhow::Error),

    /// The authority refused to issue the certificate.
    #[error(transparent)]
    Forbidden(anyhow::Error),

    #[error("no keys found")]
    NotFound,

    #[error(transparent)]
    Internal(anyhow::Error),
}

impl SshApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            SshApiError::Body(_) | SshApiError::Validation(_) | SshApiError::KeyParse { .. } => {
                StatusCode::BAD_REQUEST
            }
            SshApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            SshApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            SshApiError::NotFound => StatusCode::NOT_FOUND,
            SshApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::FORBIDDEN => "forbidden",
            StatusCode::NOT_FOUND => "not_found",
            _ => "server_error",
        }
    }

    /// Message including the full cause chain of collaborator errors.
    fn description(&self) -> String {
        match self {
            SshApiError::Unauthorized(e) | SshApiError::Forbidden(e) | SshApiError::Internal(e) => {
                format!("{e:#}")
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for SshApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_description = self.description();
        if status.is_server_error() {
            tracing::error!("SSH request failed: {}", error_description);
        } else {
            tracing::warn!("SSH request rejected ({}): {}", status, error_description);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.code().to_string(),
                error_description,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_status_mapping() {
        let body_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(SshApiError::Body(body_err).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            SshApiError::from(ValidationError::MissingOtt).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SshApiError::Unauthorized(anyhow::anyhow!("token expired")).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            SshApiError::Forbidden(anyhow::anyhow!("principal not allowed")).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(SshApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            SshApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_description_keeps_cause_chain() {
        let cause: anyhow::Result<()> = Err(anyhow::anyhow!("token already used"));
        let err = SshApiError::Unauthorized(cause.context("authorizing sign-ssh").unwrap_err());
        assert_eq!(err.description(), "authorizing sign-ssh: token already used");
        assert_eq!(err.code(), "unauthorized");
    }

    #[test]
    fn test_body_error_is_distinct_from_validation() {
        let body_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SshApiError::Body(body_err);
        assert!(err.to_string().starts_with("error reading request body"));

        let err = SshApiError::from(ValidationError::MissingOtt);
        assert_eq!(err.to_string(), "missing or empty ott");
    }
}
