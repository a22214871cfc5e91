//! Stock batch models
//!
//! A batch is one stock-inward event: the pieces received together, with the
//! weight they were actually weighed at and what they cost. Those recorded
//! values never change; only the remaining piece count goes down as the
//! batch is consumed.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::types::{apportion, LengthUnit, SortOrder};
use crate::validation::{
    validate_actual_weight, validate_code, validate_length, validate_quantity, validate_total_cost,
};

/// Material, length and gauge that batches are grouped under for consumption
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StockKey {
    pub material_id: String,
    pub length: Decimal,
    pub length_unit: LengthUnit,
    pub gauge: String,
}

impl StockKey {
    pub fn new(
        material_id: impl Into<String>,
        length: Decimal,
        length_unit: LengthUnit,
        gauge: impl Into<String>,
    ) -> Self {
        Self {
            material_id: material_id.into().trim().to_string(),
            length: length.normalize(),
            length_unit,
            gauge: gauge.into().trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        validate_code(&self.material_id).map_err(|m| LedgerError::validation("material_id", m))?;
        validate_code(&self.gauge).map_err(|m| LedgerError::validation("gauge", m))?;
        validate_length(self.length).map_err(|m| LedgerError::validation("length", m))?;
        Ok(())
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{} gauge {}",
            self.material_id, self.length, self.length_unit, self.gauge
        )
    }
}

/// Whether a batch can still be drawn from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    /// Fully consumed; kept for traceability
    Depleted,
}

/// Details of a stock-inward event before it becomes a batch
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub key: StockKey,
    pub quantity: u32,
    pub actual_weight: Decimal,
    pub total_cost: Decimal,
    pub supplier: String,
    pub invoice_number: String,
    pub received_at: DateTime<Utc>,
}

/// One stock-inward event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    /// Sortable identifier, e.g. "BATCH-20260314-0007"
    pub batch_id: String,
    pub material_id: String,
    pub length: Decimal,
    pub length_unit: LengthUnit,
    pub gauge: String,
    pub original_quantity: u32,
    pub current_quantity: u32,
    /// Weight measured at receipt. Never recomputed.
    pub actual_total_weight: Decimal,
    pub total_cost: Decimal,
    pub supplier: String,
    pub invoice_number: String,
    pub received_at: DateTime<Utc>,
    pub status: BatchStatus,
}

/// Quantity, weight and cost moved by one draw or restore on a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMovement {
    pub quantity: u32,
    pub weight: Decimal,
    pub cost: Decimal,
}

impl Batch {
    /// Create an active batch from a validated inward event
    pub fn receive(batch_id: String, new: NewBatch) -> Result<Self, LedgerError> {
        new.key.validate()?;
        validate_quantity(new.quantity).map_err(|m| LedgerError::validation("quantity", m))?;
        validate_actual_weight(new.actual_weight)
            .map_err(|m| LedgerError::validation("actual_weight", m))?;
        validate_total_cost(new.total_cost).map_err(|m| LedgerError::validation("total_cost", m))?;

        Ok(Self {
            batch_id,
            material_id: new.key.material_id,
            length: new.key.length,
            length_unit: new.key.length_unit,
            gauge: new.key.gauge,
            original_quantity: new.quantity,
            current_quantity: new.quantity,
            actual_total_weight: new.actual_weight,
            total_cost: new.total_cost,
            supplier: new.supplier.trim().to_string(),
            invoice_number: new.invoice_number.trim().to_string(),
            received_at: new.received_at,
            status: BatchStatus::Active,
        })
    }

    pub fn key(&self) -> StockKey {
        StockKey {
            material_id: self.material_id.clone(),
            length: self.length,
            length_unit: self.length_unit,
            gauge: self.gauge.clone(),
        }
    }

    pub fn matches(&self, key: &StockKey) -> bool {
        self.material_id == key.material_id
            && self.length == key.length
            && self.length_unit == key.length_unit
            && self.gauge == key.gauge
    }

    pub fn is_active(&self) -> bool {
        self.status == BatchStatus::Active && self.current_quantity > 0
    }

    /// Recorded weight of one piece of this batch
    pub fn unit_weight(&self) -> Result<Decimal, LedgerError> {
        self.weight_for(1)
    }

    pub fn unit_cost(&self) -> Result<Decimal, LedgerError> {
        self.cost_for(1)
    }

    /// Share of the recorded weight still on hand
    pub fn remaining_weight(&self) -> Result<Decimal, LedgerError> {
        self.weight_for(self.current_quantity)
    }

    /// Share of the invoiced cost still on hand
    pub fn remaining_cost(&self) -> Result<Decimal, LedgerError> {
        self.cost_for(self.current_quantity)
    }

    fn weight_for(&self, quantity: u32) -> Result<Decimal, LedgerError> {
        apportion(self.actual_total_weight, quantity, self.original_quantity).ok_or_else(|| {
            LedgerError::Arithmetic(format!("apportioning weight of batch {}", self.batch_id))
        })
    }

    fn cost_for(&self, quantity: u32) -> Result<Decimal, LedgerError> {
        apportion(self.total_cost, quantity, self.original_quantity).ok_or_else(|| {
            LedgerError::Arithmetic(format!("apportioning cost of batch {}", self.batch_id))
        })
    }

    /// Take `quantity` pieces out of the batch.
    ///
    /// Weight and cost are the difference between what was on hand before and
    /// after, so the draws of a fully consumed batch add up to exactly its
    /// recorded weight and cost.
    pub fn draw(&mut self, quantity: u32) -> Result<BatchMovement, LedgerError> {
        if !self.is_active() {
            return Err(LedgerError::validation(
                "batch_id",
                format!("Batch {} is depleted", self.batch_id),
            ));
        }
        if quantity == 0 || quantity > self.current_quantity {
            return Err(LedgerError::validation(
                "quantity",
                format!(
                    "Cannot draw {} from batch {} holding {}",
                    quantity, self.batch_id, self.current_quantity
                ),
            ));
        }

        let after = self.current_quantity - quantity;
        let weight = self.remaining_weight()? - self.weight_for(after)?;
        let cost = self.remaining_cost()? - self.cost_for(after)?;

        self.current_quantity = after;
        if after == 0 {
            self.status = BatchStatus::Depleted;
        }

        Ok(BatchMovement {
            quantity,
            weight,
            cost,
        })
    }

    /// Put `quantity` pieces back, as a corrective reversal does
    pub fn restore(&mut self, quantity: u32) -> Result<BatchMovement, LedgerError> {
        let after = self
            .current_quantity
            .checked_add(quantity)
            .filter(|after| *after <= self.original_quantity)
            .ok_or_else(|| LedgerError::InvalidRestore {
                batch_id: self.batch_id.clone(),
                quantity,
                message: format!(
                    "batch holds {} of {} received",
                    self.current_quantity, self.original_quantity
                ),
            })?;

        let weight = self.weight_for(after)? - self.remaining_weight()?;
        let cost = self.cost_for(after)? - self.remaining_cost()?;

        self.current_quantity = after;
        if after > 0 {
            self.status = BatchStatus::Active;
        }

        Ok(BatchMovement {
            quantity,
            weight,
            cost,
        })
    }
}

/// Generate a batch identifier from the receipt date and a running sequence
pub fn generate_batch_id(received_at: DateTime<Utc>, sequence: u32) -> String {
    format!("BATCH-{}-{:04}", received_at.format("%Y%m%d"), sequence)
}

/// Trailing sequence number of a generated batch id
fn batch_sequence(batch_id: &str) -> Option<u32> {
    batch_id.rsplit_once('-').and_then(|(_, sequence)| sequence.parse().ok())
}

/// Receipt order for `sort_order`; ties always fall back to batch id ascending,
/// comparing the sequence numerically so `-10000` sorts after `-9999`
pub fn compare_receipt(a: &Batch, b: &Batch, sort_order: SortOrder) -> Ordering {
    let by_time = match sort_order {
        SortOrder::Fifo => a.received_at.cmp(&b.received_at),
        SortOrder::Lifo => b.received_at.cmp(&a.received_at),
    };
    by_time
        .then_with(|| match (batch_sequence(&a.batch_id), batch_sequence(&b.batch_id)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        })
        .then_with(|| a.batch_id.cmp(&b.batch_id))
}

/// Legacy estimate of weight from a reference per-piece gauge weight.
///
/// Only for quoting before stock is weighed; recorded totals always come from
/// batch weights.
pub fn estimate_reference_weight(reference_unit_weight: Decimal, quantity: u32) -> Option<Decimal> {
    reference_unit_weight.checked_mul(Decimal::from(quantity))
}
