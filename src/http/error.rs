use rouille::{Response, input::json::JsonError};
use serde_json::json;

use crate::gateway::{GatewayError, validate::ValidationError};

/// Error as seen by HTTP clients.
///
/// Every variant renders `{"error": <message>, "reason": <code>}`; the
/// reason code is stable so callers can branch on it.
#[derive(Debug)]
pub enum ApiError {
    BadRequest {
        reason: &'static str,
        message: String,
        field: Option<&'static str>,
    },
    UnsupportedMediaType(String),
    NotFound {
        reason: &'static str,
        message: String,
    },
    Conflict(String),
    TooManyRequests(String),
    BadGateway {
        message: String,
        provider_status: String,
    },
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let reason = match err {
            ValidationError::NoData => "no_data",
            ValidationError::Missing(_) => "missing_field",
            ValidationError::WrongType(_) => "wrong_type",
            ValidationError::Empty(_) => "empty_field",
            ValidationError::InvalidEncoding(_) => "invalid_encoding",
        };
        ApiError::BadRequest {
            reason,
            field: err.field().map(|f| f.key()),
            message: err.to_string(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let message = err.to_string();
        match err {
            GatewayError::Validation(e) => ApiError::from(e),

            GatewayError::Conflict(_) => ApiError::Conflict(message),

            GatewayError::TrackNotFound(_) => ApiError::NotFound {
                reason: "track_not_found",
                message,
            },

            GatewayError::NoMatch => ApiError::NotFound {
                reason: "no_match",
                message,
            },

            GatewayError::NotInCatalogue(_) => ApiError::NotFound {
                reason: "track_not_in_catalogue",
                message,
            },

            GatewayError::RateLimited => ApiError::TooManyRequests(message),

            GatewayError::Upstream { status, .. } => ApiError::BadGateway {
                message,
                provider_status: status.to_string(),
            },

            GatewayError::Internal { stage, source } => {
                log::error!("catalogue failure while {stage}: {source}");
                ApiError::Internal(message)
            }
        }
    }
}

impl From<JsonError> for ApiError {
    fn from(err: JsonError) -> Self {
        match err {
            JsonError::WrongContentType => {
                ApiError::UnsupportedMediaType("Request must be JSON".into())
            }
            JsonError::ParseError(e) => ApiError::BadRequest {
                reason: "malformed_json",
                message: format!("Malformed JSON body: {e}"),
                field: None,
            },
            other => ApiError::BadRequest {
                reason: "malformed_json",
                message: format!("Could not read request body: {other}"),
                field: None,
            },
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest { .. } => 400,
            ApiError::NotFound { .. } => 404,
            ApiError::Conflict(_) => 409,
            ApiError::UnsupportedMediaType(_) => 415,
            ApiError::TooManyRequests(_) => 429,
            ApiError::Internal(_) => 500,
            ApiError::BadGateway { .. } => 502,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::BadRequest {
                reason,
                message,
                field,
            } => match field {
                Some(field) => json!({"error": message, "reason": reason, "field": field}),
                None => json!({"error": message, "reason": reason}),
            },

            ApiError::UnsupportedMediaType(message) => {
                json!({"error": message, "reason": "unsupported_media_type"})
            }

            ApiError::NotFound { reason, message } => json!({"error": message, "reason": reason}),

            ApiError::Conflict(message) => json!({"error": message, "reason": "track_exists"}),

            ApiError::TooManyRequests(message) => {
                json!({"error": message, "reason": "rate_limited"})
            }

            ApiError::BadGateway {
                message,
                provider_status,
            } => json!({
                "error": message,
                "reason": "provider_error",
                "provider_status": provider_status,
            }),

            ApiError::Internal(message) => json!({"error": message, "reason": "internal_error"}),
        };

        Response::json(&body).with_status_code(status)
    }
}
