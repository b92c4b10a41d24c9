//! 庫存餘額模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 餘額鍵（租戶 + 物料 + 庫位）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    pub tenant_id: String,
    pub product_id: String,
    pub location_id: String,
}

impl BalanceKey {
    pub fn new(tenant_id: String, product_id: String, location_id: String) -> Self {
        Self {
            tenant_id,
            product_id,
            location_id,
        }
    }
}

impl std::fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.tenant_id, self.product_id, self.location_id)
    }
}

/// 庫存餘額（由帳本維護的物化數量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// 餘額鍵
    pub key: BalanceKey,

    /// 現有數量（恆 ≥ 0）
    pub quantity: Decimal,

    /// 最後一筆異動
    pub last_movement_id: Option<Uuid>,

    /// 最後更新時間
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// 創建空餘額（首次異動時建立）
    pub fn empty(key: BalanceKey) -> Self {
        Self {
            key,
            quantity: Decimal::ZERO,
            last_movement_id: None,
            updated_at: Utc::now(),
        }
    }

    /// 套用變動後的數量（不修改自身）
    pub fn projected(&self, delta: Decimal) -> Decimal {
        self.quantity + delta
    }

    /// 套用變動
    pub fn apply(&mut self, delta: Decimal, movement_id: Uuid) {
        self.quantity += delta;
        self.last_movement_id = Some(movement_id);
        self.updated_at = Utc::now();
    }
}
