//! 批號分配
//!
//! 入庫時建立或累加批號；出庫依 FEFO（先到期先出）逐批扣減，
//! 不足時整筆復原，不留下部分扣減。

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stock_core::{
    BalanceKey, Lot, LotKey, LotStatus, Movement, MovementRequest, MovementType, StockError,
};
use stock_store::{InventoryStore, RowKey, UnitOfWork};
use uuid::Uuid;

use crate::ledger::Ledger;

/// 批號入庫請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotReceipt {
    /// 物料ID
    pub product_id: String,

    /// 庫位ID
    pub location_id: String,

    /// 批號代碼
    pub lot_code: String,

    /// 入庫數量
    pub quantity: Decimal,

    /// 到期日
    pub expiry_date: NaiveDate,

    /// 製造日
    pub manufacture_date: Option<NaiveDate>,

    /// 單位成本
    pub unit_value: Decimal,

    /// 來源單據
    pub document_ref: String,
}

impl LotReceipt {
    /// 創建新的入庫請求
    pub fn new(
        product_id: impl Into<String>,
        location_id: impl Into<String>,
        lot_code: impl Into<String>,
        quantity: Decimal,
        expiry_date: NaiveDate,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            location_id: location_id.into(),
            lot_code: lot_code.into(),
            quantity,
            expiry_date,
            manufacture_date: None,
            unit_value: Decimal::ZERO,
            document_ref: String::new(),
        }
    }

    /// 建構器模式：設置製造日
    pub fn with_manufacture_date(mut self, date: NaiveDate) -> Self {
        self.manufacture_date = Some(date);
        self
    }

    /// 建構器模式：設置單位成本
    pub fn with_unit_value(mut self, unit_value: Decimal) -> Self {
        self.unit_value = unit_value;
        self
    }

    /// 建構器模式：設置來源單據
    pub fn with_document_ref(mut self, document_ref: impl Into<String>) -> Self {
        self.document_ref = document_ref.into();
        self
    }

    fn balance_key(&self, tenant_id: &str) -> BalanceKey {
        BalanceKey::new(
            tenant_id.to_string(),
            self.product_id.clone(),
            self.location_id.clone(),
        )
    }
}

/// 批號分配器
pub struct LotAllocator<'a> {
    store: &'a InventoryStore,
}

impl<'a> LotAllocator<'a> {
    /// 創建新的批號分配器
    pub fn new(store: &'a InventoryStore) -> Self {
        Self { store }
    }

    /// 批號入庫
    ///
    /// 批號已存在時累加數量；到期日必須與已記錄的一致。
    pub fn receive_lot(&self, tenant_id: &str, receipt: LotReceipt) -> stock_core::Result<(Lot, Movement)> {
        if receipt.quantity <= Decimal::ZERO {
            return Err(StockError::InvalidQuantity(receipt.quantity));
        }
        if let Some(manufacture) = receipt.manufacture_date {
            if receipt.expiry_date < manufacture {
                return Err(StockError::InvalidLotDates {
                    expiry: receipt.expiry_date,
                    manufacture,
                });
            }
        }

        let key = receipt.balance_key(tenant_id);
        let lot_key = LotKey::new(key.clone(), receipt.lot_code.clone());

        let mut uow = self.store.begin();
        uow.lock_all([RowKey::Lots(key.clone()), RowKey::Balance(key)])?;

        let mut lot = match uow.lot_by_key(&lot_key) {
            Some(existing) if existing.expiry_date != receipt.expiry_date => {
                return Err(StockError::LotMismatch {
                    lot_code: receipt.lot_code,
                    stored: existing.expiry_date,
                    supplied: receipt.expiry_date,
                });
            }
            Some(existing) => existing,
            None => Lot::new(lot_key, receipt.expiry_date, receipt.manufacture_date),
        };

        let movement = Ledger::post(
            &mut uow,
            tenant_id,
            MovementRequest::new(
                receipt.product_id.clone(),
                receipt.location_id.clone(),
                MovementType::Entry,
                receipt.quantity,
                receipt.document_ref.clone(),
            )
            .with_unit_value(receipt.unit_value)
            .with_lot(lot.id),
        )?;

        lot.current_quantity += receipt.quantity;
        uow.put_lot(lot.clone())?;
        uow.commit();

        tracing::info!(
            "批號入庫 {} {} x {}（到期 {}），批號數量 {}",
            receipt.product_id,
            lot.lot_code,
            receipt.quantity,
            lot.expiry_date,
            lot.current_quantity
        );
        Ok((lot, movement))
    }

    /// 依 FEFO 扣減批號
    pub fn consume_fifo(
        &self,
        tenant_id: &str,
        product_id: &str,
        location_id: &str,
        quantity: Decimal,
        document_ref: &str,
    ) -> stock_core::Result<Vec<Movement>> {
        let mut uow = self.store.begin();
        let movements =
            Self::consume_fifo_in(&mut uow, tenant_id, product_id, location_id, quantity, document_ref)?;
        uow.commit();
        Ok(movements)
    }

    /// 在既有交易單元中依 FEFO 扣減
    ///
    /// 失敗時只復原本次呼叫的變更，交易單元其餘部分保留。
    pub fn consume_fifo_in(
        uow: &mut UnitOfWork<'_>,
        tenant_id: &str,
        product_id: &str,
        location_id: &str,
        quantity: Decimal,
        document_ref: &str,
    ) -> stock_core::Result<Vec<Movement>> {
        if quantity <= Decimal::ZERO {
            return Err(StockError::InvalidQuantity(quantity));
        }

        let key = BalanceKey::new(
            tenant_id.to_string(),
            product_id.to_string(),
            location_id.to_string(),
        );
        uow.lock_all([RowKey::Lots(key.clone()), RowKey::Balance(key.clone())])?;

        let savepoint = uow.savepoint();
        match Self::draw(uow, tenant_id, &key, quantity, document_ref) {
            Ok(movements) => Ok(movements),
            Err(err) => {
                uow.rollback_to(savepoint);
                Err(err)
            }
        }
    }

    fn draw(
        uow: &mut UnitOfWork<'_>,
        tenant_id: &str,
        key: &BalanceKey,
        quantity: Decimal,
        document_ref: &str,
    ) -> stock_core::Result<Vec<Movement>> {
        let product = uow.product(tenant_id, &key.product_id)?;
        let lots: Vec<Lot> = uow.lots_for(key).into_iter().filter(Lot::has_stock).collect();

        let mut remaining = quantity;
        let mut movements = Vec::new();
        for mut lot in lots {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = remaining.min(lot.current_quantity);

            let movement = Ledger::post(
                uow,
                tenant_id,
                MovementRequest::new(
                    key.product_id.clone(),
                    key.location_id.clone(),
                    MovementType::Exit,
                    take,
                    document_ref.to_string(),
                )
                .with_unit_value(product.unit_cost)
                .with_lot(lot.id),
            )?;

            lot.current_quantity -= take;
            remaining -= take;
            tracing::debug!(
                "批號 {} 扣減 {}，剩餘 {}",
                lot.lot_code,
                take,
                lot.current_quantity
            );
            uow.put_lot(lot)?;
            movements.push(movement);
        }

        if remaining > Decimal::ZERO {
            let available = quantity - remaining;
            tracing::warn!(
                "批號庫存不足 {}：需要 {}，可用 {}",
                key,
                quantity,
                available
            );
            return Err(StockError::InsufficientStock {
                product_id: key.product_id.clone(),
                requested: quantity,
                available,
            });
        }

        Ok(movements)
    }

    /// 調整批號數量（沖銷用）
    pub(crate) fn adjust_lot_in(
        uow: &mut UnitOfWork<'_>,
        tenant_id: &str,
        lot_id: Uuid,
        delta: Decimal,
    ) -> stock_core::Result<Lot> {
        let mut lot = uow
            .lot(tenant_id, lot_id)
            .ok_or(StockError::LotNotFound(lot_id))?;
        uow.lock(RowKey::Lots(lot.balance_key()))?;

        if lot.current_quantity + delta < Decimal::ZERO {
            return Err(StockError::InsufficientStock {
                product_id: lot.product_id,
                requested: -delta,
                available: lot.current_quantity,
            });
        }
        lot.current_quantity += delta;
        uow.put_lot(lot.clone())?;
        Ok(lot)
    }

    /// 某物料於某庫位的批號（FEFO 排序，含已用完的批號）
    pub fn lots(&self, tenant_id: &str, product_id: &str, location_id: &str) -> Vec<Lot> {
        self.store.lots_for(&BalanceKey::new(
            tenant_id.to_string(),
            product_id.to_string(),
            location_id.to_string(),
        ))
    }

    /// 批號可用總量
    pub fn available_in_lots(&self, tenant_id: &str, product_id: &str, location_id: &str) -> Decimal {
        self.lots(tenant_id, product_id, location_id)
            .iter()
            .filter(|lot| lot.has_stock())
            .map(|lot| lot.current_quantity)
            .sum()
    }

    /// 效期警示：尚有數量且在 `within_days` 天內到期（含已過期）的批號
    pub fn expiring_lots(
        &self,
        tenant_id: &str,
        today: NaiveDate,
        within_days: i64,
    ) -> Vec<(Lot, LotStatus)> {
        let thresholds = &self.store.config().expiry;
        self.store
            .lots_of_tenant(tenant_id)
            .into_iter()
            .filter(|lot| lot.has_stock() && (lot.expiry_date - today).num_days() <= within_days)
            .map(|lot| {
                let status = lot.status(today, thresholds);
                (lot, status)
            })
            .collect()
    }
}
