//! 庫存異動模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::balance::BalanceKey;

/// 異動類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    /// 入庫
    Entry,
    /// 出庫
    Exit,
    /// 盤點
    Count,
    /// 調撥（以來源出庫 + 目的入庫成對記錄）
    Transfer,
    /// 調整（減少）
    Adjustment,
}

impl MovementType {
    /// 帶符號的數量變動
    ///
    /// 調撥本身沒有符號，必須拆成出庫與入庫兩筆。
    pub fn signed(&self, quantity: Decimal) -> Option<Decimal> {
        match self {
            MovementType::Entry | MovementType::Count => Some(quantity),
            MovementType::Exit | MovementType::Adjustment => Some(-quantity),
            MovementType::Transfer => None,
        }
    }

    /// 沖銷用的反向類型
    pub fn compensating(&self) -> Option<MovementType> {
        match self {
            MovementType::Entry | MovementType::Count => Some(MovementType::Exit),
            MovementType::Exit | MovementType::Adjustment => Some(MovementType::Entry),
            MovementType::Transfer => None,
        }
    }

    /// 檢查是否為增加庫存的異動
    pub fn is_inbound(&self) -> bool {
        matches!(self, MovementType::Entry | MovementType::Count)
    }
}

/// 庫存異動（寫入後不可修改）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// 異動ID
    pub id: Uuid,

    /// 租戶
    pub tenant_id: String,

    /// 物料ID
    pub product_id: String,

    /// 庫位ID
    pub location_id: String,

    /// 異動類型
    pub movement_type: MovementType,

    /// 數量（恆為正）
    pub quantity: Decimal,

    /// 異動當下的單位成本快照
    pub unit_value: Decimal,

    /// 批號
    pub lot_id: Option<Uuid>,

    /// 來源單據
    pub document_ref: String,

    /// 沖銷的原始異動
    pub reverses: Option<Uuid>,

    /// 帳本序號（追加順序）
    pub sequence: u64,

    /// 建立時間
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// 帶符號的數量
    pub fn signed_quantity(&self) -> Decimal {
        self.movement_type
            .signed(self.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// 異動金額
    pub fn total_value(&self) -> Decimal {
        self.quantity * self.unit_value
    }

    /// 所屬餘額鍵
    pub fn balance_key(&self) -> BalanceKey {
        BalanceKey::new(
            self.tenant_id.clone(),
            self.product_id.clone(),
            self.location_id.clone(),
        )
    }
}

/// 異動請求（尚未寫入帳本）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub product_id: String,
    pub location_id: String,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    pub lot_id: Option<Uuid>,
    pub document_ref: String,
    pub reverses: Option<Uuid>,
}

impl MovementRequest {
    /// 創建新的異動請求
    pub fn new(
        product_id: String,
        location_id: String,
        movement_type: MovementType,
        quantity: Decimal,
        document_ref: String,
    ) -> Self {
        Self {
            product_id,
            location_id,
            movement_type,
            quantity,
            unit_value: Decimal::ZERO,
            lot_id: None,
            document_ref,
            reverses: None,
        }
    }

    /// 建構器模式：設置單位成本
    pub fn with_unit_value(mut self, unit_value: Decimal) -> Self {
        self.unit_value = unit_value;
        self
    }

    /// 建構器模式：設置批號
    pub fn with_lot(mut self, lot_id: Uuid) -> Self {
        self.lot_id = Some(lot_id);
        self
    }

    /// 建構器模式：設置沖銷來源
    pub fn with_reverses(mut self, original: Uuid) -> Self {
        self.reverses = Some(original);
        self
    }

    /// 依請求建立異動記錄
    pub fn into_movement(self, tenant_id: String, sequence: u64) -> Movement {
        Movement {
            id: Uuid::new_v4(),
            tenant_id,
            product_id: self.product_id,
            location_id: self.location_id,
            movement_type: self.movement_type,
            quantity: self.quantity,
            unit_value: self.unit_value,
            lot_id: self.lot_id,
            document_ref: self.document_ref,
            reverses: self.reverses,
            sequence,
            created_at: Utc::now(),
        }
    }
}
