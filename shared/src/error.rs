//! Error types for the fabrication domain
//!
//! Formula authoring mistakes, glass calculation failures and ledger
//! business-rule failures are kept apart so callers can surface each one
//! with the right context.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised while parsing or evaluating a glass formula
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("Syntax error in '{expression}': {message}")]
    Syntax {
        expression: String,
        /// Character offset, when the error can be pinned to one
        position: Option<usize>,
        message: String,
    },

    #[error("Unknown variable '{name}' in '{expression}'")]
    UnknownVariable { expression: String, name: String },

    #[error("Division by zero in '{expression}'")]
    DivisionByZero { expression: String },

    #[error("Arithmetic overflow in '{expression}'")]
    Overflow { expression: String },
}

impl FormulaError {
    /// The offending expression, for showing back to the person who wrote it
    pub fn expression(&self) -> &str {
        match self {
            FormulaError::Syntax { expression, .. }
            | FormulaError::UnknownVariable { expression, .. }
            | FormulaError::DivisionByZero { expression }
            | FormulaError::Overflow { expression } => expression,
        }
    }
}

/// Glass dimension a formula computes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Width,
    Height,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Width => write!(f, "width"),
            Dimension::Height => write!(f, "height"),
        }
    }
}

/// Failures raised by the glass area calculator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlassError {
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Glass {dimension} formula failed: {source}")]
    Formula {
        dimension: Dimension,
        #[source]
        source: FormulaError,
    },
}

impl GlassError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failures raised by batch stock bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Insufficient stock for {key}: requested {requested}, available {available}")]
    InsufficientStock {
        key: String,
        requested: u32,
        available: u64,
    },

    #[error("Cannot restore {quantity} to batch {batch_id}: {message}")]
    InvalidRestore {
        batch_id: String,
        quantity: u32,
        message: String,
    },

    #[error("Arithmetic failure while {0}")]
    Arithmetic(String),
}

impl LedgerError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
