//! Derived stock views
//!
//! Nothing here is stored. Totals are recomputed from the active batches on
//! every read, with weight apportioned from each batch's own recorded weight.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::batch::{compare_receipt, Batch, StockKey};
use crate::error::LedgerError;
use crate::types::SortOrder;

/// A batch together with its derived per-piece and remaining figures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: Batch,
    pub unit_weight: Decimal,
    pub remaining_weight: Decimal,
    pub remaining_cost: Decimal,
}

impl BatchView {
    pub fn from_batch(batch: &Batch) -> Result<Self, LedgerError> {
        Ok(Self {
            unit_weight: batch.unit_weight()?,
            remaining_weight: batch.remaining_weight()?,
            remaining_cost: batch.remaining_cost()?,
            batch: batch.clone(),
        })
    }
}

/// Stock of one material/length/gauge key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyStockSummary {
    pub key: StockKey,
    pub active_batch_count: usize,
    pub total_current_stock: u64,
    pub total_current_weight: Decimal,
    pub total_remaining_cost: Decimal,
    pub average_rate_per_piece: Option<Decimal>,
}

/// Aggregated stock of a material across its active batches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialStockView {
    pub material_id: String,
    pub active_batch_count: usize,
    pub total_current_stock: u64,
    pub total_current_weight: Decimal,
    pub total_remaining_cost: Decimal,
    /// Remaining cost over remaining pieces; absent when nothing is in stock
    pub average_rate_per_piece: Option<Decimal>,
    pub average_rate_per_kg: Option<Decimal>,
    pub reorder_level: u64,
    pub below_reorder_level: bool,
    pub by_key: Vec<KeyStockSummary>,
    pub active_batches: Vec<BatchView>,
}

#[derive(Default)]
struct Accumulator {
    batches: usize,
    stock: u64,
    weight: Decimal,
    cost: Decimal,
}

impl Accumulator {
    fn add(&mut self, view: &BatchView) -> Result<(), LedgerError> {
        let overflow = || LedgerError::Arithmetic("aggregating stock".to_string());
        self.batches += 1;
        self.stock += u64::from(view.batch.current_quantity);
        self.weight = self.weight.checked_add(view.remaining_weight).ok_or_else(overflow)?;
        self.cost = self.cost.checked_add(view.remaining_cost).ok_or_else(overflow)?;
        Ok(())
    }

    fn rate_per_piece(&self) -> Option<Decimal> {
        if self.stock == 0 {
            return None;
        }
        self.cost.checked_div(Decimal::from(self.stock))
    }

    fn rate_per_kg(&self) -> Option<Decimal> {
        if self.weight.is_zero() {
            return None;
        }
        self.cost.checked_div(self.weight)
    }
}

/// Aggregate the active batches of `material_id` out of `batches`
pub fn build_stock_view(
    material_id: &str,
    batches: &[Batch],
    reorder_level: u64,
) -> Result<MaterialStockView, LedgerError> {
    let mut active: Vec<&Batch> = batches
        .iter()
        .filter(|b| b.material_id == material_id && b.is_active())
        .collect();
    active.sort_by(|a, b| compare_receipt(a, b, SortOrder::Fifo));

    let mut overall = Accumulator::default();
    let mut per_key: BTreeMap<StockKey, Accumulator> = BTreeMap::new();
    let mut active_batches = Vec::with_capacity(active.len());

    for batch in active {
        let view = BatchView::from_batch(batch)?;
        overall.add(&view)?;
        per_key.entry(batch.key()).or_default().add(&view)?;
        active_batches.push(view);
    }

    let by_key = per_key
        .into_iter()
        .map(|(key, acc)| KeyStockSummary {
            average_rate_per_piece: acc.rate_per_piece(),
            key,
            active_batch_count: acc.batches,
            total_current_stock: acc.stock,
            total_current_weight: acc.weight,
            total_remaining_cost: acc.cost,
        })
        .collect();

    Ok(MaterialStockView {
        material_id: material_id.to_string(),
        active_batch_count: overall.batches,
        total_current_stock: overall.stock,
        total_current_weight: overall.weight,
        total_remaining_cost: overall.cost,
        average_rate_per_piece: overall.rate_per_piece(),
        average_rate_per_kg: overall.rate_per_kg(),
        reorder_level,
        below_reorder_level: reorder_level > 0 && overall.stock <= reorder_level,
        by_key,
        active_batches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::batch::{generate_batch_id, NewBatch};
    use crate::types::LengthUnit;
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn inward(seq: u32, gauge: &str, quantity: u32, weight: &str, cost: &str) -> Batch {
        let received_at = Utc.with_ymd_and_hms(2026, 3, seq, 9, 0, 0).unwrap();
        Batch::receive(
            generate_batch_id(received_at, seq),
            NewBatch {
                key: StockKey::new("ALU-6063", dec("12"), LengthUnit::Foot, gauge),
                quantity,
                actual_weight: dec(weight),
                total_cost: dec(cost),
                supplier: "Gulf Extrusions".to_string(),
                invoice_number: format!("INV-{}", seq),
                received_at,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_weight_comes_from_batches() {
        let batches = vec![
            inward(1, "1.2mm", 10, "7.5", "1000"),
            inward(2, "1.2mm", 20, "14.0", "2200"),
        ];
        let view = build_stock_view("ALU-6063", &batches, 0).unwrap();
        assert_eq!(view.total_current_stock, 30);
        assert_eq!(view.total_current_weight, dec("21.5"));
        assert_eq!(view.total_remaining_cost, dec("3200"));
        assert_eq!(view.average_rate_per_piece.unwrap().round_dp(4), dec("106.6667"));
        assert!(!view.below_reorder_level);
    }

    #[test]
    fn test_partial_batch_apportioned() {
        let mut batches = vec![
            inward(1, "1.2mm", 10, "7.5", "1000"),
            inward(2, "1.2mm", 20, "14.0", "2200"),
        ];
        batches[0].draw(10).unwrap();
        batches[1].draw(15).unwrap();
        let view = build_stock_view("ALU-6063", &batches, 5).unwrap();
        assert_eq!(view.total_current_stock, 5);
        assert_eq!(view.total_current_weight, dec("3.5"));
        assert_eq!(view.active_batch_count, 1);
        assert_eq!(view.average_rate_per_piece, Some(dec("110")));
        assert!(view.below_reorder_level);
    }

    #[test]
    fn test_grouped_by_key() {
        let batches = vec![
            inward(1, "1.2mm", 10, "7.5", "1000"),
            inward(2, "1.4mm", 8, "7.2", "960"),
            inward(3, "1.2mm", 5, "3.8", "500"),
        ];
        let view = build_stock_view("ALU-6063", &batches, 0).unwrap();
        assert_eq!(view.by_key.len(), 2);
        let thin = &view.by_key[0];
        assert_eq!(thin.key.gauge, "1.2mm");
        assert_eq!(thin.total_current_stock, 15);
        assert_eq!(thin.total_current_weight, dec("11.3"));
        let sum: u64 = view.by_key.iter().map(|k| k.total_current_stock).sum();
        assert_eq!(sum, view.total_current_stock);
    }

    #[test]
    fn test_empty_stock_has_no_rate() {
        let mut batches = vec![inward(1, "1.2mm", 10, "7.5", "1000")];
        batches[0].draw(10).unwrap();
        let view = build_stock_view("ALU-6063", &batches, 0).unwrap();
        assert_eq!(view.total_current_stock, 0);
        assert_eq!(view.total_current_weight, Decimal::ZERO);
        assert_eq!(view.average_rate_per_piece, None);
        assert!(view.active_batches.is_empty());
    }
}
