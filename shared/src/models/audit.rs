//! Audit trail models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of a material's append-only audit log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// Position in the store-wide log, assigned on append
    pub sequence: u64,
    pub material_id: String,
    pub recorded_at: DateTime<Utc>,
    pub event: AuditEvent,
}

/// What happened to the stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    StockInward {
        batch_id: String,
        quantity: u32,
        actual_weight: Decimal,
        total_cost: Decimal,
        supplier: String,
        invoice_number: String,
    },
    Consumption {
        transaction_id: Uuid,
        quantity: u32,
        weight: Decimal,
        batch_ids: Vec<String>,
    },
    Reversal {
        transaction_id: Uuid,
        reverses: Uuid,
        quantity: u32,
        weight: Decimal,
    },
}
