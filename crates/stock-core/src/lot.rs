//! 批號模型

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::balance::BalanceKey;
use crate::config::ExpiryThresholds;

/// 批號效期狀態（由到期日推導，不儲存）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LotStatus {
    /// 已過期
    Expired,
    /// 即將過期
    Critical,
    /// 需注意
    Attention,
    /// 正常
    Ok,
}

impl LotStatus {
    /// 依剩餘天數分類
    pub fn classify(expiry_date: NaiveDate, today: NaiveDate, thresholds: &ExpiryThresholds) -> Self {
        let days_left = (expiry_date - today).num_days();
        if days_left < 0 {
            LotStatus::Expired
        } else if days_left <= thresholds.critical_days {
            LotStatus::Critical
        } else if days_left <= thresholds.attention_days {
            LotStatus::Attention
        } else {
            LotStatus::Ok
        }
    }

    /// 是否需要發出效期警示
    pub fn needs_alert(&self) -> bool {
        !matches!(self, LotStatus::Ok)
    }
}

/// 批號鍵（租戶 + 物料 + 庫位 + 批號代碼）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LotKey {
    pub balance_key: BalanceKey,
    pub lot_code: String,
}

impl LotKey {
    pub fn new(balance_key: BalanceKey, lot_code: String) -> Self {
        Self {
            balance_key,
            lot_code,
        }
    }
}

/// 批號
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// 批號ID
    pub id: Uuid,

    /// 租戶
    pub tenant_id: String,

    /// 物料ID
    pub product_id: String,

    /// 庫位ID
    pub location_id: String,

    /// 批號代碼
    pub lot_code: String,

    /// 到期日
    pub expiry_date: NaiveDate,

    /// 製造日
    pub manufacture_date: Option<NaiveDate>,

    /// 目前數量
    pub current_quantity: Decimal,

    /// 建立時間
    pub created_at: DateTime<Utc>,
}

impl Lot {
    /// 創建新的批號（數量為零，由入庫累加）
    pub fn new(key: LotKey, expiry_date: NaiveDate, manufacture_date: Option<NaiveDate>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: key.balance_key.tenant_id,
            product_id: key.balance_key.product_id,
            location_id: key.balance_key.location_id,
            lot_code: key.lot_code,
            expiry_date,
            manufacture_date,
            current_quantity: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    /// 批號鍵
    pub fn key(&self) -> LotKey {
        LotKey::new(self.balance_key(), self.lot_code.clone())
    }

    /// 所屬餘額鍵
    pub fn balance_key(&self) -> BalanceKey {
        BalanceKey::new(
            self.tenant_id.clone(),
            self.product_id.clone(),
            self.location_id.clone(),
        )
    }

    /// 是否仍有數量
    pub fn has_stock(&self) -> bool {
        self.current_quantity > Decimal::ZERO
    }

    /// 效期狀態
    pub fn status(&self, today: NaiveDate, thresholds: &ExpiryThresholds) -> LotStatus {
        LotStatus::classify(self.expiry_date, today, thresholds)
    }

    /// FEFO 排序：到期日優先，再依製造日（未填者排後）
    pub fn fefo_cmp(&self, other: &Lot) -> Ordering {
        self.expiry_date
            .cmp(&other.expiry_date)
            .then_with(|| match (self.manufacture_date, other.manufacture_date) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.created_at.cmp(&other.created_at))
    }
}
