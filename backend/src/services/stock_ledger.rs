//! Batch stock ledger service
//!
//! Records stock-inward batches, draws stock down FIFO/LIFO and reverses
//! consumptions. Consumption and reversal of one stock key are serialised
//! through a per-key async mutex; each operation reaches the record store as
//! a single commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    build_stock_view, compare_receipt, estimate_reference_weight, generate_batch_id, plan_consumption,
    plan_reversal, AuditEntry, AuditEvent, Batch, ConsumptionPlan, ConsumptionTransaction,
    ConsumptionType, LengthUnit, MaterialStockView, NewBatch, SortOrder, StockKey, TransactionKind,
};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;
use validator::Validate;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::store::{Commit, RecordStore};

/// Input for recording a stock-inward batch
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StockInwardInput {
    #[validate(length(min = 1, max = 64, message = "Material id must be between 1 and 64 characters"))]
    pub material_id: String,
    pub length: Decimal,
    pub length_unit: LengthUnit,
    #[validate(length(min = 1, max = 64, message = "Gauge must be between 1 and 64 characters"))]
    pub gauge: String,
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: u32,
    pub actual_weight: Decimal,
    pub total_cost: Decimal,
    #[validate(length(max = 255, message = "Supplier cannot exceed 255 characters"))]
    pub supplier: String,
    #[validate(length(max = 100, message = "Invoice number cannot exceed 100 characters"))]
    pub invoice_number: String,
    /// Defaults to the time of recording
    pub received_at: Option<DateTime<Utc>>,
}

fn default_consumption_type() -> ConsumptionType {
    ConsumptionType::Production
}

/// Input for drawing stock of one key
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConsumeStockInput {
    #[validate(length(min = 1, max = 64, message = "Material id must be between 1 and 64 characters"))]
    pub material_id: String,
    pub length: Decimal,
    pub length_unit: LengthUnit,
    #[validate(length(min = 1, max = 64, message = "Gauge must be between 1 and 64 characters"))]
    pub gauge: String,
    #[validate(range(min = 1, message = "Quantity needed must be greater than zero"))]
    pub quantity_needed: u32,
    /// Falls back to the configured default order
    pub sort_order: Option<SortOrder>,
    #[serde(default = "default_consumption_type")]
    pub consumption_type: ConsumptionType,
    #[validate(length(max = 100, message = "Reference cannot exceed 100 characters"))]
    pub reference: Option<String>,
}

/// Input for reversing a consumption
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReverseConsumptionInput {
    pub transaction_id: Uuid,
    #[validate(length(max = 255, message = "Reason cannot exceed 255 characters"))]
    pub reason: Option<String>,
}

/// A committed consumption: the plan plus the transaction it was recorded as
#[derive(Debug, Clone, Serialize)]
pub struct ConsumptionReceipt {
    pub transaction_id: Uuid,
    #[serde(flatten)]
    pub plan: ConsumptionPlan,
}

/// Legacy reference-weight estimate, never part of recorded totals
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceWeightEstimate {
    pub reference_unit_weight: Decimal,
    pub quantity: u32,
    pub estimated_weight: Decimal,
}

/// One async mutex per stock key
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<StockKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    async fn acquire(&self, key: &StockKey) -> AppResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| AppError::Internal("stock key lock table poisoned".to_string()))?;
            locks.entry(key.clone()).or_default().clone()
        };
        Ok(lock.lock_owned().await)
    }
}

/// Stock ledger service
#[derive(Clone)]
pub struct StockLedgerService {
    store: Arc<dyn RecordStore>,
    locks: Arc<KeyLocks>,
    default_sort_order: SortOrder,
    reorder_level: u64,
}

impl StockLedgerService {
    pub fn new(store: Arc<dyn RecordStore>, config: &LedgerConfig) -> AppResult<Self> {
        Ok(Self {
            store,
            locks: Arc::new(KeyLocks::default()),
            default_sort_order: config.default_sort_order,
            reorder_level: config.reorder_level,
        })
    }

    /// Record a stock-inward batch
    pub async fn stock_inward(&self, input: StockInwardInput) -> AppResult<Batch> {
        input.validate()?;

        let received_at = input.received_at.unwrap_or_else(Utc::now);
        let key = StockKey::new(input.material_id, input.length, input.length_unit, input.gauge);
        let sequence = self.store.next_batch_sequence()?;
        let batch = Batch::receive(
            generate_batch_id(received_at, sequence),
            NewBatch {
                key,
                quantity: input.quantity,
                actual_weight: input.actual_weight,
                total_cost: input.total_cost,
                supplier: input.supplier,
                invoice_number: input.invoice_number,
                received_at,
            },
        )?;

        let mut commit = Commit::new(batch.material_id.clone(), Utc::now());
        commit.audit.push(AuditEvent::StockInward {
            batch_id: batch.batch_id.clone(),
            quantity: batch.original_quantity,
            actual_weight: batch.actual_total_weight,
            total_cost: batch.total_cost,
            supplier: batch.supplier.clone(),
            invoice_number: batch.invoice_number.clone(),
        });
        commit.new_batches.push(batch.clone());
        self.store.commit(commit)?;

        tracing::info!(
            batch_id = %batch.batch_id,
            material_id = %batch.material_id,
            quantity = batch.original_quantity,
            weight = %batch.actual_total_weight,
            "Stock inward recorded"
        );
        Ok(batch)
    }

    /// Draw `quantity_needed` pieces of one key, oldest or newest batch first
    pub async fn consume_stock(&self, input: ConsumeStockInput) -> AppResult<ConsumptionReceipt> {
        input.validate()?;

        let key = StockKey::new(input.material_id, input.length, input.length_unit, input.gauge);
        let sort_order = input.sort_order.unwrap_or(self.default_sort_order);
        let _guard = self.locks.acquire(&key).await?;

        let batches = self.store.batches_for_material(&key.material_id)?;
        let (plan, updated) =
            match plan_consumption(&batches, &key, input.quantity_needed, sort_order, input.consumption_type) {
                Ok(planned) => planned,
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "Consumption rejected");
                    return Err(err.into());
                }
            };

        let now = Utc::now();
        let transaction = ConsumptionTransaction::from_plan(&plan, input.reference, now);
        let mut commit = Commit::new(key.material_id.clone(), now);
        commit.audit.push(AuditEvent::Consumption {
            transaction_id: transaction.id,
            quantity: transaction.total_quantity,
            weight: transaction.total_weight,
            batch_ids: plan.lines.iter().map(|l| l.batch_id.clone()).collect(),
        });
        for batch in updated {
            commit.update_from(&batches, batch)?;
        }
        commit.transaction = Some(transaction.clone());
        if let Err(err) = self.store.commit(commit) {
            tracing::warn!(key = %key, error = %err, "Consumption commit rejected");
            return Err(err.into());
        }

        tracing::info!(
            transaction_id = %transaction.id,
            key = %key,
            sort_order = %sort_order,
            consumption_type = plan.consumption_type.as_str(),
            quantity = plan.total_quantity,
            weight = %plan.total_weight,
            batches = plan.lines.len(),
            "Consumption committed"
        );
        Ok(ConsumptionReceipt {
            transaction_id: transaction.id,
            plan,
        })
    }

    /// Put every piece of a consumption back and append the reversal entry
    pub async fn reverse_consumption(&self, input: ReverseConsumptionInput) -> AppResult<ConsumptionTransaction> {
        input.validate()?;

        let original = self
            .store
            .get_transaction(input.transaction_id)?
            .ok_or_else(|| AppError::NotFound(format!("Transaction {}", input.transaction_id)))?;
        if original.kind == TransactionKind::Reversal {
            return Err(AppError::Conflict {
                resource: "transaction".to_string(),
                message: format!("Transaction {} is a reversal and cannot be reversed", original.id),
            });
        }

        let _guard = self.locks.acquire(&original.key).await?;
        if let Some(existing) = self.store.reversal_of(original.id)? {
            return Err(AppError::Conflict {
                resource: "transaction".to_string(),
                message: format!("Transaction {} was already reversed by {}", original.id, existing.id),
            });
        }

        let mut batches = Vec::with_capacity(original.lines.len());
        for line in &original.lines {
            let batch = self
                .store
                .get_batch(&line.batch_id)?
                .ok_or_else(|| AppError::NotFound(format!("Batch {}", line.batch_id)))?;
            batches.push(batch);
        }

        let now = Utc::now();
        let (reversal, restored) = plan_reversal(&original, &batches, input.reason, now)?;
        let mut commit = Commit::new(original.material_id(), now);
        commit.audit.push(AuditEvent::Reversal {
            transaction_id: reversal.id,
            reverses: original.id,
            quantity: reversal.total_quantity,
            weight: reversal.total_weight,
        });
        for batch in restored {
            commit.update_from(&batches, batch)?;
        }
        commit.transaction = Some(reversal.clone());
        self.store.commit(commit)?;

        tracing::info!(
            transaction_id = %reversal.id,
            reverses = %original.id,
            key = %original.key,
            quantity = reversal.total_quantity,
            "Consumption reversed"
        );
        Ok(reversal)
    }

    /// Current stock of a material, derived from its active batches
    pub async fn get_stock_report(&self, material_id: &str) -> AppResult<MaterialStockView> {
        let batches = self.known_batches(material_id)?;
        let view = build_stock_view(material_id.trim(), &batches, self.reorder_level)?;
        if view.below_reorder_level {
            tracing::warn!(
                material_id = %view.material_id,
                stock = view.total_current_stock,
                reorder_level = view.reorder_level,
                "Stock at or below reorder level"
            );
        }
        Ok(view)
    }

    /// Every batch of a material in receipt order, depleted ones included
    pub async fn get_batch_history(&self, material_id: &str) -> AppResult<Vec<Batch>> {
        let mut batches = self.known_batches(material_id)?;
        batches.sort_by(|a, b| compare_receipt(a, b, SortOrder::Fifo));
        Ok(batches)
    }

    /// Consumption and reversal transactions of a material, oldest first
    pub async fn get_transactions(&self, material_id: &str) -> AppResult<Vec<ConsumptionTransaction>> {
        self.known_batches(material_id)?;
        Ok(self.store.transactions_for_material(material_id.trim())?)
    }

    pub async fn get_audit_log(&self, material_id: &str) -> AppResult<Vec<AuditEntry>> {
        self.known_batches(material_id)?;
        Ok(self.store.audit_for_material(material_id.trim())?)
    }

    /// Weight estimate from a reference per-piece weight
    pub fn estimate_reference_weight(
        &self,
        reference_unit_weight: Decimal,
        quantity: u32,
    ) -> AppResult<ReferenceWeightEstimate> {
        if reference_unit_weight <= Decimal::ZERO {
            return Err(AppError::validation(
                "reference_unit_weight",
                "Reference unit weight must be greater than zero",
            ));
        }
        let estimated_weight = estimate_reference_weight(reference_unit_weight, quantity)
            .ok_or_else(|| AppError::Internal("reference weight estimate overflowed".to_string()))?;
        Ok(ReferenceWeightEstimate {
            reference_unit_weight,
            quantity,
            estimated_weight,
        })
    }

    fn known_batches(&self, material_id: &str) -> AppResult<Vec<Batch>> {
        let material_id = material_id.trim();
        if material_id.is_empty() {
            return Err(AppError::validation("material_id", "Material id is required"));
        }
        let batches = self.store.batches_for_material(material_id)?;
        if batches.is_empty() {
            return Err(AppError::NotFound(format!("Material {}", material_id)));
        }
        Ok(batches)
    }
}
