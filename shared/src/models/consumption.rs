//! Stock consumption models and the FIFO/LIFO batch planner

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::batch::{compare_receipt, Batch, BatchMovement, StockKey};
use crate::error::LedgerError;
use crate::types::{ConsumptionType, SortOrder};
use crate::validation::validate_quantity;

/// What one batch contributed to a consumption (or got back in a reversal)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumptionLine {
    pub batch_id: String,
    pub received_at: DateTime<Utc>,
    pub quantity_taken: u32,
    pub weight_taken: Decimal,
    pub cost_taken: Decimal,
    /// Pieces left in the batch afterwards
    pub residual_quantity: u32,
}

/// Itemised result of drawing stock for one request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumptionPlan {
    pub key: StockKey,
    pub sort_order: SortOrder,
    pub consumption_type: ConsumptionType,
    pub quantity_requested: u32,
    pub lines: Vec<ConsumptionLine>,
    pub total_quantity: u32,
    pub total_weight: Decimal,
    pub total_cost: Decimal,
}

/// Kind of ledger transaction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Consumption,
    /// Corrective entry putting a consumption's pieces back
    Reversal,
}

/// Append-only record of a consumption or a reversal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumptionTransaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub key: StockKey,
    pub consumption_type: ConsumptionType,
    pub sort_order: SortOrder,
    pub lines: Vec<ConsumptionLine>,
    pub total_quantity: u32,
    pub total_weight: Decimal,
    pub total_cost: Decimal,
    /// The consumption this entry reverses
    pub reverses: Option<Uuid>,
    /// Order number, work order or reversal reason
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConsumptionTransaction {
    pub fn from_plan(plan: &ConsumptionPlan, reference: Option<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransactionKind::Consumption,
            key: plan.key.clone(),
            consumption_type: plan.consumption_type,
            sort_order: plan.sort_order,
            lines: plan.lines.clone(),
            total_quantity: plan.total_quantity,
            total_weight: plan.total_weight,
            total_cost: plan.total_cost,
            reverses: None,
            reference,
            created_at,
        }
    }

    pub fn material_id(&self) -> &str {
        &self.key.material_id
    }
}

/// Running totals over plan lines
#[derive(Default)]
struct LineTotals {
    quantity: u32,
    weight: Decimal,
    cost: Decimal,
}

impl LineTotals {
    fn add(&mut self, movement: &BatchMovement) -> Result<(), LedgerError> {
        let overflow = || LedgerError::Arithmetic("totalling consumption lines".to_string());
        self.quantity = self.quantity.checked_add(movement.quantity).ok_or_else(overflow)?;
        self.weight = self.weight.checked_add(movement.weight).ok_or_else(overflow)?;
        self.cost = self.cost.checked_add(movement.cost).ok_or_else(overflow)?;
        Ok(())
    }
}

fn line_for(batch: &Batch, movement: &BatchMovement) -> ConsumptionLine {
    ConsumptionLine {
        batch_id: batch.batch_id.clone(),
        received_at: batch.received_at,
        quantity_taken: movement.quantity,
        weight_taken: movement.weight,
        cost_taken: movement.cost,
        residual_quantity: batch.current_quantity,
    }
}

/// Active batches for `key`, in the order they would be drawn
pub fn consumption_candidates(batches: &[Batch], key: &StockKey, sort_order: SortOrder) -> Vec<Batch> {
    let mut candidates: Vec<Batch> = batches
        .iter()
        .filter(|b| b.is_active() && b.matches(key))
        .cloned()
        .collect();
    candidates.sort_by(|a, b| compare_receipt(a, b, sort_order));
    candidates
}

/// Plan drawing `quantity_needed` pieces of `key` from `batches`.
///
/// Returns the plan together with the updated copies of every batch it
/// touched; the input is left as it was. When the active batches of the key
/// cannot cover the request nothing is planned and the error reports what is
/// available.
pub fn plan_consumption(
    batches: &[Batch],
    key: &StockKey,
    quantity_needed: u32,
    sort_order: SortOrder,
    consumption_type: ConsumptionType,
) -> Result<(ConsumptionPlan, Vec<Batch>), LedgerError> {
    key.validate()?;
    validate_quantity(quantity_needed).map_err(|m| LedgerError::validation("quantity_needed", m))?;

    let candidates = consumption_candidates(batches, key, sort_order);
    let available: u64 = candidates.iter().map(|b| u64::from(b.current_quantity)).sum();
    if available < u64::from(quantity_needed) {
        return Err(LedgerError::InsufficientStock {
            key: key.to_string(),
            requested: quantity_needed,
            available,
        });
    }

    let mut remaining = quantity_needed;
    let mut lines = Vec::new();
    let mut updated = Vec::new();
    let mut totals = LineTotals::default();

    for mut batch in candidates {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.current_quantity);
        let movement = batch.draw(take)?;
        totals.add(&movement)?;
        lines.push(line_for(&batch, &movement));
        updated.push(batch);
        remaining -= take;
    }

    let plan = ConsumptionPlan {
        key: key.clone(),
        sort_order,
        consumption_type,
        quantity_requested: quantity_needed,
        lines,
        total_quantity: totals.quantity,
        total_weight: totals.weight,
        total_cost: totals.cost,
    };
    Ok((plan, updated))
}

/// Build the corrective entry that puts every piece of `original` back.
///
/// `batches` must contain each batch the original drew from. Returns the
/// reversal transaction and the restored batch copies.
pub fn plan_reversal(
    original: &ConsumptionTransaction,
    batches: &[Batch],
    reason: Option<String>,
    created_at: DateTime<Utc>,
) -> Result<(ConsumptionTransaction, Vec<Batch>), LedgerError> {
    if original.kind != TransactionKind::Consumption {
        return Err(LedgerError::validation(
            "transaction_id",
            format!("Transaction {} is not a consumption", original.id),
        ));
    }

    let mut by_id: HashMap<&str, &Batch> = batches.iter().map(|b| (b.batch_id.as_str(), b)).collect();
    let mut lines = Vec::with_capacity(original.lines.len());
    let mut updated = Vec::with_capacity(original.lines.len());
    let mut totals = LineTotals::default();

    for line in &original.lines {
        let mut batch = by_id
            .remove(line.batch_id.as_str())
            .cloned()
            .ok_or_else(|| LedgerError::InvalidRestore {
                batch_id: line.batch_id.clone(),
                quantity: line.quantity_taken,
                message: "batch record is missing".to_string(),
            })?;
        let movement = batch.restore(line.quantity_taken)?;
        totals.add(&movement)?;
        lines.push(line_for(&batch, &movement));
        updated.push(batch);
    }

    let reversal = ConsumptionTransaction {
        id: Uuid::new_v4(),
        kind: TransactionKind::Reversal,
        key: original.key.clone(),
        consumption_type: original.consumption_type,
        sort_order: original.sort_order,
        lines,
        total_quantity: totals.quantity,
        total_weight: totals.weight,
        total_cost: totals.cost,
        reverses: Some(original.id),
        reference: reason,
        created_at,
    };
    Ok((reversal, updated))
}
