//! In-memory record store
//!
//! Used by the ledger binary and by tests. A single `RwLock` guards all
//! records so a commit is applied as one unit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use shared::{AuditEntry, Batch, ConsumptionTransaction};
use uuid::Uuid;

use super::{Commit, RecordStore, StoreError, StoreResult};

#[derive(Default)]
struct MemoryState {
    batches: BTreeMap<String, Batch>,
    transactions: Vec<ConsumptionTransaction>,
    transaction_index: HashMap<Uuid, usize>,
    reversals: HashMap<Uuid, Uuid>,
    audit: Vec<AuditEntry>,
    last_batch_sequence: u32,
}

/// In-memory implementation of [`RecordStore`]
#[derive(Default)]
pub struct MemoryRecordStore {
    state: RwLock<MemoryState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("record store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("record store lock poisoned".to_string()))
    }
}

/// Reject a commit before anything is applied
fn check_commit(state: &MemoryState, commit: &Commit) -> StoreResult<()> {
    for batch in &commit.new_batches {
        if state.batches.contains_key(&batch.batch_id) {
            return Err(StoreError::DuplicateId(batch.batch_id.clone()));
        }
    }

    for update in &commit.updated_batches {
        let batch = &update.batch;
        let existing = state
            .batches
            .get(&batch.batch_id)
            .ok_or_else(|| StoreError::MissingRecord(batch.batch_id.clone()))?;
        if existing.current_quantity != update.expected_quantity {
            return Err(StoreError::StaleRecord {
                batch_id: batch.batch_id.clone(),
                expected: update.expected_quantity,
                found: existing.current_quantity,
            });
        }
        if existing.actual_total_weight != batch.actual_total_weight
            || existing.original_quantity != batch.original_quantity
            || existing.total_cost != batch.total_cost
        {
            return Err(StoreError::ImmutableRecord(batch.batch_id.clone()));
        }
    }

    if let Some(tx) = &commit.transaction {
        if state.transaction_index.contains_key(&tx.id) {
            return Err(StoreError::DuplicateId(tx.id.to_string()));
        }
        if let Some(original) = tx.reverses {
            if !state.transaction_index.contains_key(&original) {
                return Err(StoreError::MissingRecord(original.to_string()));
            }
            if state.reversals.contains_key(&original) {
                return Err(StoreError::DuplicateId(format!("reversal of {}", original)));
            }
        }
    }

    Ok(())
}

impl RecordStore for MemoryRecordStore {
    fn commit(&self, commit: Commit) -> StoreResult<()> {
        let mut state = self.write()?;
        check_commit(&state, &commit)?;

        let updated = commit.updated_batches.into_iter().map(|update| update.batch);
        for batch in commit.new_batches.into_iter().chain(updated) {
            state.batches.insert(batch.batch_id.clone(), batch);
        }

        if let Some(tx) = commit.transaction {
            if let Some(original) = tx.reverses {
                state.reversals.insert(original, tx.id);
            }
            let index = state.transactions.len();
            state.transaction_index.insert(tx.id, index);
            state.transactions.push(tx);
        }

        for event in commit.audit {
            let sequence = state.audit.len() as u64 + 1;
            state.audit.push(AuditEntry {
                sequence,
                material_id: commit.material_id.clone(),
                recorded_at: commit.recorded_at,
                event,
            });
        }

        Ok(())
    }

    fn get_batch(&self, batch_id: &str) -> StoreResult<Option<Batch>> {
        Ok(self.read()?.batches.get(batch_id).cloned())
    }

    fn batches_for_material(&self, material_id: &str) -> StoreResult<Vec<Batch>> {
        Ok(self
            .read()?
            .batches
            .values()
            .filter(|b| b.material_id == material_id)
            .cloned()
            .collect())
    }

    fn next_batch_sequence(&self) -> StoreResult<u32> {
        let mut state = self.write()?;
        let sequence = state
            .last_batch_sequence
            .checked_add(1)
            .ok_or_else(|| StoreError::Unavailable("batch sequence exhausted".to_string()))?;
        state.last_batch_sequence = sequence;
        Ok(sequence)
    }

    fn get_transaction(&self, id: Uuid) -> StoreResult<Option<ConsumptionTransaction>> {
        let state = self.read()?;
        Ok(state
            .transaction_index
            .get(&id)
            .and_then(|index| state.transactions.get(*index))
            .cloned())
    }

    fn transactions_for_material(&self, material_id: &str) -> StoreResult<Vec<ConsumptionTransaction>> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .filter(|tx| tx.material_id() == material_id)
            .cloned()
            .collect())
    }

    fn reversal_of(&self, id: Uuid) -> StoreResult<Option<ConsumptionTransaction>> {
        let state = self.read()?;
        Ok(state
            .reversals
            .get(&id)
            .and_then(|reversal| state.transaction_index.get(reversal))
            .and_then(|index| state.transactions.get(*index))
            .cloned())
    }

    fn audit_for_material(&self, material_id: &str) -> StoreResult<Vec<AuditEntry>> {
        Ok(self
            .read()?
            .audit
            .iter()
            .filter(|entry| entry.material_id == material_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BatchUpdate;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use shared::{generate_batch_id, AuditEvent, LengthUnit, NewBatch, StockKey};

    fn batch(seq: u32) -> Batch {
        let received_at = Utc::now();
        Batch::receive(
            generate_batch_id(received_at, seq),
            NewBatch {
                key: StockKey::new("ALU-6063", Decimal::from(12), LengthUnit::Foot, "1.2mm"),
                quantity: 10,
                actual_weight: Decimal::new(75, 1),
                total_cost: Decimal::from(1000),
                supplier: "Gulf Extrusions".to_string(),
                invoice_number: "INV-1".to_string(),
                received_at,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_commit_inserts_and_audits() {
        let store = MemoryRecordStore::new();
        let b = batch(1);
        let mut commit = Commit::new("ALU-6063", Utc::now());
        commit.audit.push(AuditEvent::StockInward {
            batch_id: b.batch_id.clone(),
            quantity: 10,
            actual_weight: b.actual_total_weight,
            total_cost: b.total_cost,
            supplier: b.supplier.clone(),
            invoice_number: b.invoice_number.clone(),
        });
        commit.new_batches.push(b.clone());
        store.commit(commit).unwrap();

        assert_eq!(store.get_batch(&b.batch_id).unwrap(), Some(b));
        assert_eq!(store.batches_for_material("ALU-6063").unwrap().len(), 1);
        let audit = store.audit_for_material("ALU-6063").unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].sequence, 1);
    }

    #[test]
    fn test_failed_commit_applies_nothing() {
        let store = MemoryRecordStore::new();
        let mut commit = Commit::new("ALU-6063", Utc::now());
        commit.new_batches.push(batch(1));
        store.commit(commit).unwrap();

        let mut bad = Commit::new("ALU-6063", Utc::now());
        bad.new_batches.push(batch(2));
        bad.updated_batches.push(BatchUpdate {
            batch: batch(9),
            expected_quantity: 10,
        });
        assert!(matches!(store.commit(bad), Err(StoreError::MissingRecord(_))));
        assert_eq!(store.batches_for_material("ALU-6063").unwrap().len(), 1);
    }

    #[test]
    fn test_recorded_weight_cannot_be_rewritten() {
        let store = MemoryRecordStore::new();
        let b = batch(1);
        let mut commit = Commit::new("ALU-6063", Utc::now());
        commit.new_batches.push(b.clone());
        store.commit(commit).unwrap();

        let mut tampered = b.clone();
        tampered.actual_total_weight = Decimal::new(92, 1);
        let mut update = Commit::new("ALU-6063", Utc::now());
        update.update_from(&[b], tampered).unwrap();
        assert!(matches!(store.commit(update), Err(StoreError::ImmutableRecord(_))));
    }

    #[test]
    fn test_update_planned_from_stale_read_rejected() {
        let store = MemoryRecordStore::new();
        let b = batch(1);
        let mut commit = Commit::new("ALU-6063", Utc::now());
        commit.new_batches.push(b.clone());
        store.commit(commit).unwrap();

        // Two writers plan against the same read of a 10-piece batch
        let snapshot = store.batches_for_material("ALU-6063").unwrap();
        let mut drawn = snapshot[0].clone();
        drawn.current_quantity = 0;

        let mut first = Commit::new("ALU-6063", Utc::now());
        first.update_from(&snapshot, drawn.clone()).unwrap();
        store.commit(first).unwrap();

        let mut second = Commit::new("ALU-6063", Utc::now());
        second.update_from(&snapshot, drawn).unwrap();
        assert_eq!(
            store.commit(second),
            Err(StoreError::StaleRecord {
                batch_id: b.batch_id.clone(),
                expected: 10,
                found: 0,
            })
        );
        assert_eq!(store.get_batch(&b.batch_id).unwrap().unwrap().current_quantity, 0);
    }

    #[test]
    fn test_batch_sequence_never_repeats() {
        let store = std::sync::Arc::new(MemoryRecordStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| store.next_batch_sequence().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut issued: Vec<u32> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        issued.sort_unstable();
        assert_eq!(issued, (1..=400).collect::<Vec<_>>());
    }
}
