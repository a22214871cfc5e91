//! Shared types and models for the Alufab back office
//!
//! This crate contains the pure fabrication domain shared between the backend
//! ledger service, the quotation screens (via WASM) and other components:
//! batch-based stock bookkeeping and the glass cutting formula calculator.
//! Nothing in here performs I/O or logging.

pub mod error;
pub mod formula;
pub mod glass;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use formula::{evaluate, validate_formula, Formula};
pub use glass::*;
pub use models::*;
pub use types::*;
pub use validation::*;
