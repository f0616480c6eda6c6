use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Unprocessable Entity")
    pub error: String,
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// Structured context for domain rejections (quantities, serials, states)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(
        "Insufficient stock for product {product_id} in warehouse {warehouse_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: Uuid,
        warehouse_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error(
        "Cannot reverse {requested} units of product {product_id} in warehouse {warehouse_id}: on hand {on_hand}, reserved {reserved}"
    )]
    InsufficientStockToReverse {
        product_id: Uuid,
        warehouse_id: Uuid,
        on_hand: i32,
        reserved: i32,
        requested: i32,
    },

    #[error("Serial number {serial} already exists for product {product_id}")]
    DuplicateSerial { product_id: Uuid, serial: String },

    #[error("Line {line_id} requires {expected} serial numbers, {supplied} supplied")]
    MissingSerials {
        line_id: Uuid,
        expected: i32,
        supplied: i32,
    },

    #[error("Serial number {serial} is not available: {reason}")]
    SerialNotAvailable { serial: String, reason: String },

    #[error("Cannot {action} {document} {id} while it is {state}")]
    DocumentStateConflict {
        document: &'static str,
        id: Uuid,
        state: String,
        action: &'static str,
    },

    #[error("Lock wait timed out: {0}")]
    LockTimeout(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        ServiceError::db_error(err)
    }
}

/// Driver messages and SQLSTATE codes that mean "someone else holds the row".
const LOCK_CONTENTION_MARKERS: &[&str] = &[
    "55P03",
    "40P01",
    "40001",
    "lock timeout",
    "lock_timeout",
    "deadlock detected",
    "could not obtain lock",
    "database is locked",
    "database table is locked",
    "SQLITE_BUSY",
];

impl ServiceError {
    /// Normalizes a database error, classifying lock contention as `LockTimeout`.
    pub fn db_error(err: DbErr) -> Self {
        let text = err.to_string();
        if LOCK_CONTENTION_MARKERS
            .iter()
            .any(|marker| text.contains(marker))
        {
            return ServiceError::LockTimeout(text);
        }
        ServiceError::DatabaseError(err)
    }

    /// Only lock contention is transient; every other failure is final for the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }

    /// Stable code used by API clients to branch on the failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InternalError(_) => "internal_error",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::InsufficientStockToReverse { .. } => "insufficient_stock_to_reverse",
            Self::DuplicateSerial { .. } => "duplicate_serial",
            Self::MissingSerials { .. } => "missing_serials",
            Self::SerialNotAvailable { .. } => "serial_not_available",
            Self::DocumentStateConflict { .. } => "document_state_conflict",
            Self::LockTimeout(_) => "lock_timeout",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientStock { .. }
            | Self::InsufficientStockToReverse { .. }
            | Self::MissingSerials { .. }
            | Self::SerialNotAvailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DuplicateSerial { .. } | Self::DocumentStateConflict { .. } => {
                StatusCode::CONFLICT
            }
            Self::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            Self::LockTimeout(_) => "Stock records are busy, retry the request".to_string(),
            _ => self.to_string(),
        }
    }

    /// Quantities and identifiers a client needs to render an actionable message.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InsufficientStock {
                product_id,
                warehouse_id,
                available,
                requested,
            } => Some(json!({
                "product_id": product_id,
                "warehouse_id": warehouse_id,
                "available": available,
                "requested": requested,
            })),
            Self::InsufficientStockToReverse {
                product_id,
                warehouse_id,
                on_hand,
                reserved,
                requested,
            } => Some(json!({
                "product_id": product_id,
                "warehouse_id": warehouse_id,
                "on_hand": on_hand,
                "reserved": reserved,
                "requested": requested,
            })),
            Self::DuplicateSerial { product_id, serial } => Some(json!({
                "product_id": product_id,
                "serial": serial,
            })),
            Self::MissingSerials {
                line_id,
                expected,
                supplied,
            } => Some(json!({
                "line_id": line_id,
                "expected": expected,
                "supplied": supplied,
            })),
            Self::SerialNotAvailable { serial, reason } => Some(json!({
                "serial": serial,
                "reason": reason,
            })),
            Self::DocumentStateConflict {
                document,
                id,
                state,
                action,
            } => Some(json!({
                "document": document,
                "id": id,
                "state": state,
                "action": action,
            })),
            Self::LockTimeout(_) => Some(json!({ "retryable": true })),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            details: self.details(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn lock_contention_is_classified_as_retryable() {
        let err = ServiceError::db_error(DbErr::Custom(
            "error returned from database: canceling statement due to lock timeout (SQLSTATE 55P03)"
                .to_string(),
        ));
        assert!(matches!(err, ServiceError::LockTimeout(_)));
        assert!(err.is_retryable());

        let busy = ServiceError::from(DbErr::Custom(
            "error returned from database: database is locked".to_string(),
        ));
        assert!(busy.is_retryable());
    }

    #[test]
    fn other_database_errors_stay_fatal() {
        let err = ServiceError::db_error(DbErr::Custom(
            "relation \"products\" does not exist".to_string(),
        ));
        assert!(matches!(err, ServiceError::DatabaseError(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn domain_rejections_map_to_client_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(
            ServiceError::InsufficientStock {
                product_id: id,
                warehouse_id: id,
                available: 6,
                requested: 7
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::DuplicateSerial {
                product_id: id,
                serial: "SN1".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::DocumentStateConflict {
                document: "order",
                id,
                state: "sent_to_sale".into(),
                action: "cancel"
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::LockTimeout("busy".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn database_errors_do_not_leak_details() {
        let err = ServiceError::DatabaseError(DbErr::Custom("password=hunter2".into()));
        assert_eq!(err.response_message(), "Database error");
        assert!(err.details().is_none());
    }

    #[tokio::test]
    async fn insufficient_stock_response_carries_quantities() {
        let id = Uuid::new_v4();
        let response = ServiceError::InsufficientStock {
            product_id: id,
            warehouse_id: id,
            available: 6,
            requested: 7,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.code, "insufficient_stock");
        let details = payload.details.unwrap();
        assert_eq!(details["available"], 6);
        assert_eq!(details["requested"], 7);
    }
}
