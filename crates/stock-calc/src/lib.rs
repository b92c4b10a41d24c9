//! # Stock Calculation Engine
//!
//! 帳本記帳、批號分配、BOM 成本計算與出庫協調

pub mod audit;
pub mod costing;
pub mod explosion;
pub mod ledger;
pub mod lots;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export 主要類型
pub use audit::{AuditFinding, BalanceAuditor, FindingSeverity};
pub use costing::BomCostCalculator;
pub use explosion::BomExploder;
pub use ledger::Ledger;
pub use lots::{LotAllocator, LotReceipt};
pub use orchestrator::WithdrawalOrchestrator;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 出庫籃中的一行（物料 + 數量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketLine {
    pub product_id: String,
    pub quantity: Decimal,
}

impl BasketLine {
    pub fn new(product_id: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}
