//! 庫存帳本
//!
//! 只能追加的異動記錄，並同步維護每個（物料, 庫位）的餘額。
//! 餘額在任何時刻都不可為負，且等於該鍵所有異動的帶符號加總。

use rust_decimal::Decimal;
use stock_core::{Balance, BalanceKey, Movement, MovementRequest, MovementType, StockError};
use stock_store::{InventoryStore, RowKey, UnitOfWork};
use uuid::Uuid;

use crate::lots::LotAllocator;

/// 庫存帳本
pub struct Ledger<'a> {
    store: &'a InventoryStore,
}

impl<'a> Ledger<'a> {
    /// 創建新的帳本
    pub fn new(store: &'a InventoryStore) -> Self {
        Self { store }
    }

    /// 追加異動
    ///
    /// 引用批號的異動只能由 [`LotAllocator`] 建立。
    pub fn append_movement(
        &self,
        tenant_id: &str,
        request: MovementRequest,
    ) -> stock_core::Result<Movement> {
        if request.lot_id.is_some() {
            return Err(StockError::LotManagedMovement);
        }

        let mut uow = self.store.begin();
        let movement = Self::post(&mut uow, tenant_id, request)?;
        uow.commit();
        Ok(movement)
    }

    /// 在交易單元中記帳：鎖定餘額列、檢查負庫存、寫入異動與餘額
    pub(crate) fn post(
        uow: &mut UnitOfWork<'_>,
        tenant_id: &str,
        request: MovementRequest,
    ) -> stock_core::Result<Movement> {
        if request.quantity <= Decimal::ZERO {
            return Err(StockError::InvalidQuantity(request.quantity));
        }
        let delta = request
            .movement_type
            .signed(request.quantity)
            .ok_or(StockError::UnpairedTransfer)?;

        uow.product(tenant_id, &request.product_id)?;
        uow.store().location(tenant_id, &request.location_id)?;

        let key = BalanceKey::new(
            tenant_id.to_string(),
            request.product_id.clone(),
            request.location_id.clone(),
        );
        uow.lock(RowKey::Balance(key.clone()))?;

        let mut balance = uow
            .balance(&key)
            .unwrap_or_else(|| Balance::empty(key.clone()));
        let projected = balance.projected(delta);
        if projected < Decimal::ZERO {
            tracing::warn!("拒絕異動 {}：餘額 {} 變動 {}", key, balance.quantity, delta);
            return Err(StockError::NegativeBalance {
                product_id: key.product_id,
                location_id: key.location_id,
                deficit: -projected,
            });
        }

        let movement = request.into_movement(tenant_id.to_string(), uow.next_sequence());
        balance.apply(delta, movement.id);
        tracing::debug!(
            "記帳 {:?} {} x {}，餘額 {}",
            movement.movement_type,
            key,
            movement.quantity,
            balance.quantity
        );
        uow.record_movement(movement.clone(), balance)?;
        Ok(movement)
    }

    /// 查詢餘額（尚無餘額列時為零）
    pub fn get_balance(&self, tenant_id: &str, product_id: &str, location_id: &str) -> Decimal {
        let key = BalanceKey::new(
            tenant_id.to_string(),
            product_id.to_string(),
            location_id.to_string(),
        );
        self.store
            .balance(&key)
            .map(|b| b.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// 修改異動（一律拒絕）
    pub fn update_movement(
        &self,
        tenant_id: &str,
        movement_id: Uuid,
        _changes: MovementRequest,
    ) -> stock_core::Result<Movement> {
        self.require_movement(tenant_id, movement_id)?;
        Err(StockError::ImmutableRecord(movement_id))
    }

    /// 刪除異動（一律拒絕）
    pub fn delete_movement(&self, tenant_id: &str, movement_id: Uuid) -> stock_core::Result<()> {
        self.require_movement(tenant_id, movement_id)?;
        Err(StockError::ImmutableRecord(movement_id))
    }

    fn require_movement(&self, tenant_id: &str, movement_id: Uuid) -> stock_core::Result<Movement> {
        self.store
            .movement(tenant_id, movement_id)
            .ok_or(StockError::MovementNotFound(movement_id))
    }

    /// 庫位間調撥：來源出庫 + 目的入庫，同一交易單元
    #[allow(clippy::too_many_arguments)]
    pub fn transfer(
        &self,
        tenant_id: &str,
        product_id: &str,
        from_location: &str,
        to_location: &str,
        quantity: Decimal,
        unit_value: Decimal,
        document_ref: &str,
    ) -> stock_core::Result<(Movement, Movement)> {
        if from_location == to_location {
            return Err(StockError::SameLocationTransfer(from_location.to_string()));
        }

        let mut uow = self.store.begin();
        uow.lock_all([from_location, to_location].into_iter().map(|location_id| {
            RowKey::Balance(BalanceKey::new(
                tenant_id.to_string(),
                product_id.to_string(),
                location_id.to_string(),
            ))
        }))?;

        let exit = Self::post(
            &mut uow,
            tenant_id,
            MovementRequest::new(
                product_id.to_string(),
                from_location.to_string(),
                MovementType::Exit,
                quantity,
                document_ref.to_string(),
            )
            .with_unit_value(unit_value),
        )?;
        let entry = Self::post(
            &mut uow,
            tenant_id,
            MovementRequest::new(
                product_id.to_string(),
                to_location.to_string(),
                MovementType::Entry,
                quantity,
                document_ref.to_string(),
            )
            .with_unit_value(unit_value),
        )?;
        uow.commit();

        tracing::info!(
            "調撥 {} x {}：{} -> {}",
            product_id,
            quantity,
            from_location,
            to_location
        );
        Ok((exit, entry))
    }

    /// 沖銷異動：追加反向異動，原記錄不變
    pub fn reverse_movement(
        &self,
        tenant_id: &str,
        movement_id: Uuid,
        document_ref: &str,
    ) -> stock_core::Result<Movement> {
        let original = self.require_movement(tenant_id, movement_id)?;
        let compensating = original
            .movement_type
            .compensating()
            .ok_or(StockError::UnpairedTransfer)?;

        let key = original.balance_key();
        let mut uow = self.store.begin();
        let mut rows = vec![RowKey::Balance(key.clone())];
        if original.lot_id.is_some() {
            rows.push(RowKey::Lots(key.clone()));
        }
        uow.lock_all(rows)?;

        // 鎖定後再檢查，避免兩筆同時沖銷
        let already = self
            .store
            .movements_for(&key)
            .iter()
            .any(|m| m.reverses == Some(movement_id));
        if already {
            return Err(StockError::AlreadyReversed(movement_id));
        }

        let mut request = MovementRequest::new(
            original.product_id.clone(),
            original.location_id.clone(),
            compensating,
            original.quantity,
            document_ref.to_string(),
        )
        .with_unit_value(original.unit_value)
        .with_reverses(movement_id);
        if let Some(lot_id) = original.lot_id {
            request = request.with_lot(lot_id);
        }

        let reversal = Self::post(&mut uow, tenant_id, request)?;
        if let Some(lot_id) = original.lot_id {
            LotAllocator::adjust_lot_in(&mut uow, tenant_id, lot_id, reversal.signed_quantity())?;
        }
        uow.commit();

        tracing::info!("沖銷異動 {} -> {}", movement_id, reversal.id);
        Ok(reversal)
    }

    /// 某物料於某庫位的異動歷史（依追加順序）
    pub fn movements(&self, tenant_id: &str, product_id: &str, location_id: &str) -> Vec<Movement> {
        self.store.movements_for(&BalanceKey::new(
            tenant_id.to_string(),
            product_id.to_string(),
            location_id.to_string(),
        ))
    }

    /// 引用某批號的異動歷史
    pub fn movements_for_lot(&self, tenant_id: &str, lot_id: Uuid) -> Vec<Movement> {
        self.store.movements_for_lot(tenant_id, lot_id)
    }
}
