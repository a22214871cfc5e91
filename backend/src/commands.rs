//! Command dispatch for the ledger binary
//!
//! Each input line is one JSON command tagged by `command`; each produces one
//! JSON response line of the form `{"ok": true, "data": ...}` or
//! `{"ok": false, "error": {...}}`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::Dimension;

use crate::error::{AppError, AppResult, ErrorDetail};
use crate::services::{
    ConsumeStockInput, GlassAreaInput, GlassService, ReverseConsumptionInput, StockInwardInput,
    StockLedgerService,
};

/// Requests accepted by the ledger binary
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    StockInward(StockInwardInput),
    ConsumeStock(ConsumeStockInput),
    ReverseConsumption(ReverseConsumptionInput),
    StockReport { material_id: String },
    BatchHistory { material_id: String },
    Transactions { material_id: String },
    AuditLog { material_id: String },
    GlassArea(GlassAreaInput),
    CheckFormula { dimension: Dimension, expression: String },
    EstimateReferenceWeight { reference_unit_weight: Decimal, quantity: u32 },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::StockInward(_) => "stock_inward",
            Command::ConsumeStock(_) => "consume_stock",
            Command::ReverseConsumption(_) => "reverse_consumption",
            Command::StockReport { .. } => "stock_report",
            Command::BatchHistory { .. } => "batch_history",
            Command::Transactions { .. } => "transactions",
            Command::AuditLog { .. } => "audit_log",
            Command::GlassArea(_) => "glass_area",
            Command::CheckFormula { .. } => "check_formula",
            Command::EstimateReferenceWeight { .. } => "estimate_reference_weight",
        }
    }
}

/// One response line
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl CommandResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn failure(err: &AppError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(err.to_response().error),
        }
    }
}

/// Services shared by every command
#[derive(Clone)]
pub struct CommandHandler {
    ledger: StockLedgerService,
    glass: GlassService,
}

fn to_data<T: Serialize>(value: T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(format!("serialising response: {}", e)))
}

impl CommandHandler {
    pub fn new(ledger: StockLedgerService, glass: GlassService) -> Self {
        Self { ledger, glass }
    }

    pub async fn handle(&self, command: Command) -> AppResult<serde_json::Value> {
        match command {
            Command::StockInward(input) => to_data(self.ledger.stock_inward(input).await?),
            Command::ConsumeStock(input) => to_data(self.ledger.consume_stock(input).await?),
            Command::ReverseConsumption(input) => to_data(self.ledger.reverse_consumption(input).await?),
            Command::StockReport { material_id } => to_data(self.ledger.get_stock_report(&material_id).await?),
            Command::BatchHistory { material_id } => to_data(self.ledger.get_batch_history(&material_id).await?),
            Command::Transactions { material_id } => to_data(self.ledger.get_transactions(&material_id).await?),
            Command::AuditLog { material_id } => to_data(self.ledger.get_audit_log(&material_id).await?),
            Command::GlassArea(input) => to_data(self.glass.calculate(input)?),
            Command::CheckFormula { dimension, expression } => {
                to_data(self.glass.check_formula(dimension, &expression)?)
            }
            Command::EstimateReferenceWeight {
                reference_unit_weight,
                quantity,
            } => to_data(self.ledger.estimate_reference_weight(reference_unit_weight, quantity)?),
        }
    }

    /// Parse and run one input line
    pub async fn handle_line(&self, line: &str) -> CommandResponse {
        let command: Command = match serde_json::from_str(line) {
            Ok(command) => command,
            Err(e) => {
                let err = AppError::ValidationError(format!("Invalid command: {}", e));
                tracing::debug!(error = %err, "Rejected input line");
                return CommandResponse::failure(&err);
            }
        };

        let name = command.name();
        match self.handle(command).await {
            Ok(data) => CommandResponse::success(data),
            Err(err) => {
                if err.is_client_error() {
                    tracing::debug!(command = name, code = err.code(), error = %err, "Command rejected");
                } else {
                    tracing::error!(command = name, error = ?err, "Command failed");
                }
                CommandResponse::failure(&err)
            }
        }
    }
}
