//! Error handling for the inventory planner
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::external::sheet_store::SheetError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Snapshot errors
    #[error("Schema error: required column '{column}' is absent")]
    Schema { column: String },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// An engine invariant was violated; the run is aborted
    #[error("Consistency violation: {0}")]
    Consistency(String),

    // Ledger errors
    #[error("Ledger I/O error: {0}")]
    LedgerIo(String),

    #[error("Ledger operation timed out after {0} ms")]
    LedgerTimeout(u128),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<SheetError> for AppError {
    fn from(err: SheetError) -> Self {
        AppError::LedgerIo(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("unknown".to_string(), errors.to_string()));

        AppError::Validation {
            message_es: format!("Valor inválido en {}", field),
            field,
            message,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Schema { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Validation { .. } | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::LedgerIo(_) | AppError::LedgerTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Consistency(_)
            | AppError::Configuration(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            AppError::Schema { column } => ErrorDetail {
                code: "SCHEMA_ERROR".to_string(),
                message_en: format!("Snapshot is missing required column '{}'", column),
                message_es: format!("Falta la columna obligatoria '{}' en el archivo", column),
                field: Some(column.clone()),
            },
            AppError::Validation {
                field,
                message,
                message_es,
            } => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message_en: message.clone(),
                message_es: message_es.clone(),
                field: Some(field.clone()),
            },
            AppError::ValidationError(msg) => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message_en: msg.clone(),
                message_es: format!("Datos inválidos: {}", msg),
                field: None,
            },
            AppError::NotFound(resource) => ErrorDetail {
                code: "NOT_FOUND".to_string(),
                message_en: format!("{} not found", resource),
                message_es: format!("No se encontró {}", resource),
                field: None,
            },
            AppError::InvalidStateTransition(msg) => ErrorDetail {
                code: "INVALID_STATE_TRANSITION".to_string(),
                message_en: msg.clone(),
                message_es: format!("No se puede cambiar el estado: {}", msg),
                field: None,
            },
            AppError::Consistency(_) => ErrorDetail {
                code: "CONSISTENCY_ERROR".to_string(),
                message_en: "The analysis produced inconsistent results and was aborted".to_string(),
                message_es: "El análisis produjo resultados inconsistentes y fue cancelado".to_string(),
                field: None,
            },
            AppError::LedgerIo(msg) => ErrorDetail {
                code: "LEDGER_IO_ERROR".to_string(),
                message_en: format!("Order ledger unavailable, please retry: {}", msg),
                message_es: format!("Registro de órdenes no disponible, reintente: {}", msg),
                field: None,
            },
            AppError::LedgerTimeout(ms) => ErrorDetail {
                code: "LEDGER_TIMEOUT".to_string(),
                message_en: format!("Order ledger did not answer within {} ms, please retry", ms),
                message_es: format!("El registro de órdenes no respondió en {} ms, reintente", ms),
                field: None,
            },
            AppError::Configuration(msg) => ErrorDetail {
                code: "CONFIGURATION_ERROR".to_string(),
                message_en: format!("Configuration error: {}", msg),
                message_es: format!("Error de configuración: {}", msg),
                field: None,
            },
            AppError::Internal(msg) => ErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message_en: msg.clone(),
                message_es: "Error interno del servidor".to_string(),
                field: None,
            },
            AppError::InternalError(_) => ErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message_en: "An internal server error occurred".to_string(),
                message_es: "Error interno del servidor".to_string(),
                field: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_detail = self.detail();

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
