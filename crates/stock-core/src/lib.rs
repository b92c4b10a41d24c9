//! # Stock Core
//!
//! 庫存帳本與 BOM 成本引擎的核心資料模型與類型定義

pub mod balance;
pub mod catalog;
pub mod config;
pub mod location;
pub mod lot;
pub mod movement;
pub mod product;

// Re-export 主要類型
pub use balance::{Balance, BalanceKey};
pub use catalog::CatalogGraph;
pub use config::{EngineConfig, ExpiryThresholds};
pub use location::Location;
pub use lot::{Lot, LotKey, LotStatus};
pub use movement::{Movement, MovementRequest, MovementType};
pub use product::{BomEdge, Product, ProductKind};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 缺料明細（整籃驗證時逐一回報）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortageDetail {
    /// 物料ID（展開後的葉節點）
    pub product_id: String,

    /// 需求數量
    pub needed: Decimal,

    /// 可用數量
    pub available: Decimal,
}

impl ShortageDetail {
    /// 創建新的缺料明細
    pub fn new(product_id: String, needed: Decimal, available: Decimal) -> Self {
        Self {
            product_id,
            needed,
            available,
        }
    }

    /// 缺少的數量
    pub fn missing(&self) -> Decimal {
        (self.needed - self.available).max(Decimal::ZERO)
    }
}

/// 庫存引擎錯誤類型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StockError {
    #[error("找不到物料: {0}")]
    ProductNotFound(String),

    #[error("找不到庫位: {0}")]
    LocationNotFound(String),

    #[error("找不到異動記錄: {0}")]
    MovementNotFound(Uuid),

    #[error("找不到批號: {0}")]
    LotNotFound(Uuid),

    #[error("數量必須大於零: {0}")]
    InvalidQuantity(Decimal),

    #[error("成本不可為負: {0}")]
    InvalidCost(Decimal),

    #[error("批號日期無效：到期日 {expiry} 早於製造日 {manufacture}")]
    InvalidLotDates {
        expiry: NaiveDate,
        manufacture: NaiveDate,
    },

    #[error("BOM 關係無效: {0}")]
    InvalidBomEdge(String),

    #[error("庫存不足：物料 {product_id} 需要 {requested}, 可用 {available}")]
    InsufficientStock {
        product_id: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("缺料 {} 項", .0.len())]
    Shortage(Vec<ShortageDetail>),

    #[error("庫存將為負：物料 {product_id} 於 {location_id} 短少 {deficit}")]
    NegativeBalance {
        product_id: String,
        location_id: String,
        deficit: Decimal,
    },

    #[error("BOM 循環：{component_id} 已直接或間接包含 {parent_id}")]
    CycleDetected {
        parent_id: String,
        component_id: String,
    },

    #[error("BOM 層級超過上限 {max_depth}（於 {product_id}）")]
    MaxDepthExceeded { product_id: String, max_depth: usize },

    #[error("異動記錄不可修改或刪除: {0}")]
    ImmutableRecord(Uuid),

    #[error("批號 {lot_code} 到期日不符：已記錄 {stored}, 傳入 {supplied}")]
    LotMismatch {
        lot_code: String,
        stored: NaiveDate,
        supplied: NaiveDate,
    },

    #[error("物料不是組合品，無法計算 BOM 成本: {0}")]
    NotComposite(String),

    #[error("調撥必須成對建立（來源出庫 + 目的入庫）")]
    UnpairedTransfer,

    #[error("調撥來源與目的庫位相同: {0}")]
    SameLocationTransfer(String),

    #[error("異動已被沖銷: {0}")]
    AlreadyReversed(Uuid),

    #[error("批號異動只能由批號分配器建立")]
    LotManagedMovement,

    #[error("等待資料列鎖逾時: {0}")]
    LockTimeout(String),

    #[error("未持有資料列鎖: {0}")]
    LockNotHeld(String),

    #[error("配置錯誤: {0}")]
    Config(String),
}

impl StockError {
    /// 取得缺料明細（非缺料錯誤時為空）
    pub fn shortages(&self) -> &[ShortageDetail] {
        match self {
            StockError::Shortage(details) => details,
            _ => &[],
        }
    }

    /// 呼叫端可重試的錯誤（鎖競爭）
    pub fn is_retryable(&self) -> bool {
        matches!(self, StockError::LockTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, StockError>;
