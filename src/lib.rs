//! # Stock
//!
//! 庫存帳本與 BOM 成本引擎
//!
//! - [`model`]：資料模型、配置與錯誤類型
//! - [`store`]：資料儲存、資料列鎖與交易單元
//! - [`calc`]：帳本、批號分配、成本計算與出庫協調

pub mod telemetry;

pub use stock_calc as calc;
pub use stock_core as model;
pub use stock_store as store;

pub use stock_calc::{
    AuditFinding, BalanceAuditor, BasketLine, BomCostCalculator, BomExploder, FindingSeverity,
    Ledger, LotAllocator, LotReceipt, WithdrawalOrchestrator,
};
pub use stock_core::{
    Balance, BalanceKey, BomEdge, EngineConfig, ExpiryThresholds, Location, Lot, LotStatus,
    Movement, MovementRequest, MovementType, Product, ProductKind, Result, ShortageDetail,
    StockError,
};
pub use stock_store::InventoryStore;
