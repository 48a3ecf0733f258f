use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Non-429 upstream failure; the upstream status is passed through.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::Remote { status, message } => ApiError::Upstream { status, message },
            crate::Error::Validation { .. } => ApiError::BadRequest(validation_message(&err)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

fn validation_message(err: &crate::Error) -> String {
    match err {
        crate::Error::Validation { message, context } => match context.details {
            Some(ref details) => format!("{message} ({details})"),
            None => message.clone(),
        },
        other => other.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Upstream { status, message } => {
                warn!(status, %message, "upstream request failed");
                let status = StatusCode::from_u16(status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (status, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(details) => {
                error!(%details, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error", "details": details })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorContext;

    #[test]
    fn test_error_mapping() {
        let remote = ApiError::from(crate::Error::Remote {
            status: 404,
            message: "campaign not found".into(),
        });
        assert_eq!(remote.into_response().status(), StatusCode::NOT_FOUND);

        let invalid = ApiError::from(crate::Error::validation_with_context(
            "date_to must be a YYYY-MM-DD date",
            ErrorContext::new().with_details("got \"tomorrow\""),
        ));
        assert_eq!(
            invalid.to_string(),
            "date_to must be a YYYY-MM-DD date (got \"tomorrow\")"
        );
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let internal = ApiError::from(crate::Error::runtime("queue gone"));
        assert_eq!(internal.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_odd_upstream_status_becomes_bad_gateway() {
        let err = ApiError::Upstream {
            status: 302,
            message: "moved".into(),
        };
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
