//! Record store abstraction
//!
//! Batches, ledger transactions and audit entries are handed to the store as
//! records keyed by batch id / transaction id. The ledger only relies on
//! append, read and update-by-id, plus one atomic commit per operation.

mod memory;

pub use memory::MemoryRecordStore;

use chrono::{DateTime, Utc};
use shared::{AuditEntry, AuditEvent, Batch, ConsumptionTransaction};
use thiserror::Error;
use uuid::Uuid;

/// Store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record {0} already exists")]
    DuplicateId(String),

    #[error("Record {0} does not exist")]
    MissingRecord(String),

    #[error("Recorded values of {0} cannot change")]
    ImmutableRecord(String),

    #[error("Batch {batch_id} changed since it was read: expected {expected} pieces, found {found}")]
    StaleRecord {
        batch_id: String,
        expected: u32,
        found: u32,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A rewritten batch and the piece count it had when it was read
#[derive(Debug, Clone)]
pub struct BatchUpdate {
    pub batch: Batch,
    pub expected_quantity: u32,
}

/// Everything one ledger operation writes. Applied all or nothing.
#[derive(Debug, Clone)]
pub struct Commit {
    pub material_id: String,
    pub recorded_at: DateTime<Utc>,
    pub new_batches: Vec<Batch>,
    pub updated_batches: Vec<BatchUpdate>,
    pub transaction: Option<ConsumptionTransaction>,
    pub audit: Vec<AuditEvent>,
}

impl Commit {
    pub fn new(material_id: impl Into<String>, recorded_at: DateTime<Utc>) -> Self {
        Self {
            material_id: material_id.into(),
            recorded_at,
            new_batches: Vec::new(),
            updated_batches: Vec::new(),
            transaction: None,
            audit: Vec::new(),
        }
    }

    /// Queue `batch` for rewrite, guarded by the piece count it had in `snapshot`
    pub fn update_from(&mut self, snapshot: &[Batch], batch: Batch) -> StoreResult<()> {
        let expected_quantity = snapshot
            .iter()
            .find(|b| b.batch_id == batch.batch_id)
            .map(|b| b.current_quantity)
            .ok_or_else(|| StoreError::MissingRecord(batch.batch_id.clone()))?;
        self.updated_batches.push(BatchUpdate {
            batch,
            expected_quantity,
        });
        Ok(())
    }
}

/// Persistence used by the stock ledger
pub trait RecordStore: Send + Sync {
    /// Apply a commit atomically. Inserted ids must be new; updated ids must
    /// exist, still hold their expected piece count and keep their recorded
    /// weight.
    fn commit(&self, commit: Commit) -> StoreResult<()>;

    /// Hand out the next batch sequence number. Never returns the same
    /// number twice for one store.
    fn next_batch_sequence(&self) -> StoreResult<u32>;

    fn get_batch(&self, batch_id: &str) -> StoreResult<Option<Batch>>;

    /// Every batch of the material, depleted ones included
    fn batches_for_material(&self, material_id: &str) -> StoreResult<Vec<Batch>>;

    fn get_transaction(&self, id: Uuid) -> StoreResult<Option<ConsumptionTransaction>>;

    /// Transactions of the material in append order
    fn transactions_for_material(&self, material_id: &str) -> StoreResult<Vec<ConsumptionTransaction>>;

    /// The reversal entry for `id`, if one was appended
    fn reversal_of(&self, id: Uuid) -> StoreResult<Option<ConsumptionTransaction>>;

    fn audit_for_material(&self, material_id: &str) -> StoreResult<Vec<AuditEntry>>;
}
