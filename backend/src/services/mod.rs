//! Business logic services for the Alufab back office

pub mod glass;
pub mod stock_ledger;

pub use glass::{FormulaCheck, GlassAreaInput, GlassService};
pub use stock_ledger::{
    ConsumeStockInput, ConsumptionReceipt, ReferenceWeightEstimate, ReverseConsumptionInput,
    StockInwardInput, StockLedgerService,
};
