//! 出庫協調
//!
//! 銷售或耗用的唯一入口：展開組合品、整籃驗證可用量、
//! 在單一交易單元中完成所有出庫，任一項失敗即全部復原。

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use stock_core::{
    BalanceKey, CatalogGraph, Movement, MovementRequest, MovementType, ShortageDetail, StockError,
};
use stock_store::{InventoryStore, RowKey};

use crate::explosion::BomExploder;
use crate::ledger::Ledger;
use crate::lots::LotAllocator;
use crate::BasketLine;

/// 出庫協調器
pub struct WithdrawalOrchestrator<'a> {
    store: &'a InventoryStore,
}

impl<'a> WithdrawalOrchestrator<'a> {
    /// 創建新的出庫協調器
    pub fn new(store: &'a InventoryStore) -> Self {
        Self { store }
    }

    fn explode(&self, tenant_id: &str, basket: &[BasketLine]) -> stock_core::Result<BTreeMap<String, Decimal>> {
        BomExploder::new(self.store, self.store.config().max_bom_depth).explode(tenant_id, basket)
    }

    /// 某葉節點於庫位的可用量
    fn available(&self, tenant_id: &str, product_id: &str, location_id: &str, use_lots: bool) -> Decimal {
        if use_lots {
            LotAllocator::new(self.store).available_in_lots(tenant_id, product_id, location_id)
        } else {
            Ledger::new(self.store).get_balance(tenant_id, product_id, location_id)
        }
    }

    fn shortages(
        &self,
        tenant_id: &str,
        leaves: &BTreeMap<String, Decimal>,
        location_id: &str,
        use_lots: bool,
    ) -> Vec<ShortageDetail> {
        leaves
            .iter()
            .filter_map(|(product_id, needed)| {
                let available = self.available(tenant_id, product_id, location_id, use_lots);
                (*needed > available)
                    .then(|| ShortageDetail::new(product_id.clone(), *needed, available))
            })
            .collect()
    }

    /// 驗證整籃可用量
    ///
    /// 回報所有缺料項目，不只第一項。
    pub fn validate_availability(
        &self,
        tenant_id: &str,
        basket: &[BasketLine],
        location_id: &str,
        use_lots: bool,
    ) -> stock_core::Result<()> {
        let leaves = self.explode(tenant_id, basket)?;
        let shortages = self.shortages(tenant_id, &leaves, location_id, use_lots);
        if shortages.is_empty() {
            Ok(())
        } else {
            Err(StockError::Shortage(shortages))
        }
    }

    /// 出庫
    ///
    /// 成功時返回本次建立的所有異動（使用批號時可追溯每個批號扣了多少）。
    pub fn withdraw(
        &self,
        tenant_id: &str,
        basket: &[BasketLine],
        location_id: &str,
        use_lots: bool,
        document_ref: &str,
    ) -> stock_core::Result<Vec<Movement>> {
        tracing::info!(
            "開始出庫 {}：{} 行，庫位 {}，批號 {}",
            document_ref,
            basket.len(),
            location_id,
            use_lots
        );

        self.store.location(tenant_id, location_id)?;
        let leaves = self.explode(tenant_id, basket)?;

        // Step 1: 未上鎖的預先檢查
        let shortages = self.shortages(tenant_id, &leaves, location_id, use_lots);
        if !shortages.is_empty() {
            tracing::warn!("出庫 {} 缺料 {} 項", document_ref, shortages.len());
            return Err(StockError::Shortage(shortages));
        }

        // Step 2: 依鍵值順序鎖定所有相關資料列
        let mut uow = self.store.begin();
        let keys: Vec<BalanceKey> = leaves
            .keys()
            .map(|product_id| {
                BalanceKey::new(
                    tenant_id.to_string(),
                    product_id.clone(),
                    location_id.to_string(),
                )
            })
            .collect();
        let mut rows: Vec<RowKey> = keys.iter().cloned().map(RowKey::Balance).collect();
        if use_lots {
            rows.extend(keys.iter().cloned().map(RowKey::Lots));
        }
        uow.lock_all(rows)?;

        // Step 3: 持鎖後再檢查一次，與其他交易的競爭以相同的缺料錯誤回報
        let shortages = self.shortages(tenant_id, &leaves, location_id, use_lots);
        if !shortages.is_empty() {
            tracing::warn!("出庫 {} 持鎖後缺料 {} 項", document_ref, shortages.len());
            return Err(StockError::Shortage(shortages));
        }

        // Step 4: 逐葉節點扣減
        let mut movements = Vec::new();
        for (product_id, quantity) in &leaves {
            if use_lots {
                movements.extend(LotAllocator::consume_fifo_in(
                    &mut uow,
                    tenant_id,
                    product_id,
                    location_id,
                    *quantity,
                    document_ref,
                )?);
            } else {
                let product = self.store.get_product(tenant_id, product_id)?;
                movements.push(Ledger::post(
                    &mut uow,
                    tenant_id,
                    MovementRequest::new(
                        product_id.clone(),
                        location_id.to_string(),
                        MovementType::Exit,
                        *quantity,
                        document_ref.to_string(),
                    )
                    .with_unit_value(product.unit_cost),
                )?);
            }
        }
        uow.commit();

        tracing::info!("出庫 {} 完成，{} 筆異動", document_ref, movements.len());
        Ok(movements)
    }
}
