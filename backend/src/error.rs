//! Error handling for the Alufab back office
//!
//! Provides consistent, serialisable error responses for the callers of the
//! ledger and glass services

use serde::Serialize;
use shared::{FormulaError, GlassError, LedgerError};
use thiserror::Error;

use crate::store::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Insufficient stock for {key}: requested {requested}, available {available}")]
    InsufficientStock {
        key: String,
        requested: u32,
        available: u64,
    },

    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    #[error("Glass {dimension} formula error: {source}")]
    GlassFormula {
        dimension: shared::Dimension,
        source: FormulaError,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(StoreError),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Offending formula, so it can be corrected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::Formula(err) | AppError::GlassFormula { source: err, .. } => match err {
                FormulaError::Syntax { .. } => "FORMULA_SYNTAX_ERROR",
                FormulaError::UnknownVariable { .. } => "FORMULA_UNKNOWN_VARIABLE",
                FormulaError::DivisionByZero { .. } => "FORMULA_DIVISION_BY_ZERO",
                FormulaError::Overflow { .. } => "FORMULA_OVERFLOW",
            },
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller can fix the request and retry
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            AppError::Configuration(_)
                | AppError::Storage(_)
                | AppError::Internal(_)
                | AppError::InternalError(_)
        )
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (message, field, expression) = match self {
            AppError::Validation { field, message } => (message.clone(), Some(field.clone()), None),
            AppError::Conflict { resource, message } => (message.clone(), Some(resource.clone()), None),
            AppError::NotFound(resource) => (format!("{} not found", resource), None, None),
            AppError::Formula(err) => (err.to_string(), None, Some(err.expression().to_string())),
            AppError::GlassFormula { dimension, source } => (
                self.to_string(),
                Some(format!("{}_formula", dimension)),
                Some(source.expression().to_string()),
            ),
            // Internal details stay in the logs
            AppError::Storage(_) => ("A storage error occurred".to_string(), None, None),
            AppError::InternalError(_) => ("An internal error occurred".to_string(), None, None),
            other => (other.to_string(), None, None),
        };

        ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                field,
                expression,
            },
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation { field, message } => AppError::Validation { field, message },
            LedgerError::InsufficientStock {
                key,
                requested,
                available,
            } => AppError::InsufficientStock {
                key,
                requested,
                available,
            },
            LedgerError::InvalidRestore { .. } => AppError::Conflict {
                resource: "batch".to_string(),
                message: err.to_string(),
            },
            LedgerError::Arithmetic(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StaleRecord { .. } => AppError::Conflict {
                resource: "batch".to_string(),
                message: err.to_string(),
            },
            other => AppError::Storage(other),
        }
    }
}

impl From<GlassError> for AppError {
    fn from(err: GlassError) -> Self {
        match err {
            GlassError::Validation { field, message } => AppError::Validation { field, message },
            GlassError::Formula { dimension, source } => AppError::GlassFormula { dimension, source },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by_key(|(name, _)| **name);

        match fields.first() {
            Some((field, details)) => {
                let message = details
                    .first()
                    .and_then(|d| d.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                AppError::Validation {
                    field: field.to_string(),
                    message,
                }
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Result type alias for services
pub type AppResult<T> = Result<T, AppError>;
