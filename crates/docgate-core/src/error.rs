//! Error types for docgate.
//!
//! [`GatewayError`] is the single error type that crosses the request
//! pipeline. Each variant maps to an [`ErrorCategory`], and the category to
//! an HTTP status. Some categories answer with an empty body; the rest with
//! an [`ErrorBody`].

use crate::command::CommandKind;
use crate::store::StoreError;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Wrong HTTP method for a known route.
    MethodNotAllowed,
    /// Required fields missing.
    Validation,
    /// An identifier could not be converted.
    Coercion,
    /// Credential missing or rejected.
    Authentication,
    /// No such route.
    NotFound,
    /// The request body did not arrive in time.
    RequestTimeout,
    /// Processing did not finish in time.
    Timeout,
    /// The store failed.
    Store,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Validation | Self::Coercion => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Store => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether responses of this category carry a JSON body.
    #[must_use]
    pub const fn has_body(&self) -> bool {
        !matches!(
            self,
            Self::MethodNotAllowed | Self::Authentication | Self::NotFound
        )
    }
}

/// Standard error type for docgate.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The route exists but not for this method.
    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed {
        /// Method used by the caller.
        method: String,
        /// Request path.
        path: String,
        /// The accepted method, for the `Allow` header.
        allowed: String,
    },

    /// Required fields are missing.
    #[error("{message}")]
    Validation {
        /// The per-operation requirement message.
        message: &'static str,
        /// Names of the missing fields.
        missing: Vec<&'static str>,
    },

    /// An identifier string is not a valid ObjectId.
    #[error("Invalid {field}: {value}")]
    Coercion {
        /// The field that failed (`objectId` or `_id`).
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Authentication failed. The reason is logged, never returned.
    #[error("authentication failed: {reason}")]
    Authentication {
        /// Why the credential was rejected.
        reason: String,
    },

    /// No route matches the path.
    #[error("no route for {path}")]
    NotFound {
        /// Request path.
        path: String,
    },

    /// The request body was not received in time.
    #[error("{message}")]
    RequestTimeout {
        /// Human-readable message.
        message: String,
    },

    /// Processing timed out.
    #[error("{message}")]
    Timeout {
        /// Human-readable message.
        message: String,
    },

    /// The store failed while executing an operation.
    #[error("Error {}: {source}", .operation.action())]
    Store {
        /// The operation being executed.
        operation: CommandKind,
        /// The store failure.
        #[source]
        source: StoreError,
    },
}

impl GatewayError {
    /// Creates a method-not-allowed error.
    #[must_use]
    pub fn method_not_allowed(
        method: impl Into<String>,
        path: impl Into<String>,
        allowed: impl Into<String>,
    ) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
            path: path.into(),
            allowed: allowed.into(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: &'static str, missing: Vec<&'static str>) -> Self {
        Self::Validation { message, missing }
    }

    /// Creates a coercion error.
    #[must_use]
    pub fn coercion(field: &'static str, value: impl Into<String>) -> Self {
        Self::Coercion {
            field,
            value: value.into(),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::Authentication {
            reason: reason.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a body read timeout error.
    #[must_use]
    pub fn request_timeout(message: impl Into<String>) -> Self {
        Self::RequestTimeout {
            message: message.into(),
        }
    }

    /// Creates a processing timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Wraps a store failure for `operation`.
    #[must_use]
    pub const fn store(operation: CommandKind, source: StoreError) -> Self {
        Self::Store { operation, source }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MethodNotAllowed { .. } => ErrorCategory::MethodNotAllowed,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Coercion { .. } => ErrorCategory::Coercion,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::RequestTimeout { .. } => ErrorCategory::RequestTimeout,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Store { .. } => ErrorCategory::Store,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Machine-readable code for logs and metrics.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Coercion { .. } => "COERCION_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::RequestTimeout { .. } => "REQUEST_TIMEOUT",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Store { .. } => "STORE_ERROR",
        }
    }

    /// The JSON body for this error, or `None` for empty-body categories.
    #[must_use]
    pub fn to_body(&self) -> Option<ErrorBody> {
        if !self.category().has_body() {
            return None;
        }
        let missing = match self {
            Self::Validation { missing, .. } => missing.iter().map(ToString::to_string).collect(),
            _ => Vec::new(),
        };
        Some(ErrorBody {
            error: self.to_string(),
            missing,
        })
    }
}

/// Serializable error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Missing field names, validation errors only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ObjectId;
    use serde_json::json;

    #[test]
    fn test_validation_error_body() {
        let error = GatewayError::validation(
            "Database and collection are required",
            vec!["database", "collection"],
        );
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        let body = serde_json::to_value(error.to_body().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "error": "Database and collection are required",
                "missing": ["database", "collection"]
            })
        );
    }

    #[test]
    fn test_coercion_error() {
        let error = GatewayError::coercion("objectId", "nope");
        assert_eq!(error.category(), ErrorCategory::Coercion);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.to_string(), "Invalid objectId: nope");
        let body = serde_json::to_value(error.to_body().unwrap()).unwrap();
        assert_eq!(body, json!({ "error": "Invalid objectId: nope" }));
    }

    #[test]
    fn test_empty_body_categories() {
        assert!(GatewayError::authentication("no token").to_body().is_none());
        assert!(GatewayError::not_found("/x").to_body().is_none());
        let error = GatewayError::method_not_allowed("POST", "/v1/get-all", "GET");
        assert_eq!(error.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(error.to_body().is_none());
        assert_eq!(
            GatewayError::authentication("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_timeouts() {
        assert_eq!(
            GatewayError::request_timeout("body").status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
        let error = GatewayError::timeout("Request processing timed out");
        assert_eq!(error.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error.to_body().unwrap().error, "Request processing timed out");
    }

    #[test]
    fn test_store_error_message_names_action() {
        let id = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let error = GatewayError::store(CommandKind::UpdateOne, StoreError::NotFound(id));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            error.to_string(),
            "Error updating document: no document found with _id 507f1f77bcf86cd799439011"
        );
        assert_eq!(
            GatewayError::store(CommandKind::GetAll, StoreError::Backend("boom".into()))
                .to_string(),
            "Error finding documents: boom"
        );
    }
}
