//! 交易單元
//!
//! 持有資料列鎖直到提交或捨棄。寫入先留在交易單元內的待提交資料表，
//! 提交時在同一把資料表鎖下合併；其他呼叫者只看得到已提交的資料。

use rust_decimal::Decimal;
use stock_core::{
    Balance, BalanceKey, BomEdge, CatalogGraph, EngineConfig, Lot, LotKey, Movement, Product,
    StockError,
};
use uuid::Uuid;

use crate::journal::{UndoEntry, UndoJournal};
use crate::locks::RowKey;
use crate::store::InventoryStore;
use crate::tables::Tables;

/// 儲存點（日誌位置）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint(usize);

/// 交易單元
pub struct UnitOfWork<'s> {
    store: &'s InventoryStore,
    owner: u64,
    held: Vec<RowKey>,
    pending: Tables,
    journal: UndoJournal,
    finished: bool,
}

impl<'s> UnitOfWork<'s> {
    pub(crate) fn new(store: &'s InventoryStore, owner: u64) -> Self {
        Self {
            store,
            owner,
            held: Vec::new(),
            pending: Tables::default(),
            journal: UndoJournal::new(),
            finished: false,
        }
    }

    /// 交易編號
    pub fn id(&self) -> u64 {
        self.owner
    }

    pub fn store(&self) -> &'s InventoryStore {
        self.store
    }

    pub fn config(&self) -> &'s EngineConfig {
        self.store.config()
    }

    // ---- 鎖 ----

    /// 取得資料列排他鎖（重複取得不阻塞）
    pub fn lock(&mut self, key: RowKey) -> stock_core::Result<()> {
        if self.holds(&key) {
            return Ok(());
        }
        self.store
            .locks()
            .acquire(&key, self.owner, self.config().lock_timeout())?;
        tracing::debug!("交易 {} 取得 {}", self.owner, key);
        self.held.push(key);
        Ok(())
    }

    /// 依鍵值排序後逐一上鎖，避免交易間互相等待
    pub fn lock_all(&mut self, keys: impl IntoIterator<Item = RowKey>) -> stock_core::Result<()> {
        let mut keys: Vec<RowKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();
        for key in keys {
            self.lock(key)?;
        }
        Ok(())
    }

    pub fn holds(&self, key: &RowKey) -> bool {
        self.held.contains(key)
    }

    fn require(&self, key: &RowKey) -> stock_core::Result<()> {
        if self.holds(key) {
            Ok(())
        } else {
            Err(StockError::LockNotHeld(key.to_string()))
        }
    }

    // ---- 讀取（待提交的變更優先） ----

    pub fn product(&self, tenant_id: &str, product_id: &str) -> stock_core::Result<Product> {
        match self.pending.product(tenant_id, product_id) {
            Some(product) => Ok(product.clone()),
            None => self.store.get_product(tenant_id, product_id),
        }
    }

    pub fn balance(&self, key: &BalanceKey) -> Option<Balance> {
        self.pending
            .balances
            .get(key)
            .cloned()
            .or_else(|| self.store.balance(key))
    }

    /// 某物料於某庫位的批號（FEFO 排序）
    pub fn lots_for(&self, key: &BalanceKey) -> Vec<Lot> {
        let mut lots: Vec<Lot> = self
            .store
            .lots_for(key)
            .into_iter()
            .filter(|lot| !self.pending.lots.contains_key(&lot.id))
            .collect();
        lots.extend(self.pending.lots_for(key));
        lots.sort_by(|a, b| a.fefo_cmp(b));
        lots
    }

    pub fn lot_by_key(&self, key: &LotKey) -> Option<Lot> {
        if let Some(lot) = self
            .pending
            .lot_index
            .get(key)
            .and_then(|id| self.pending.lots.get(id))
        {
            return Some(lot.clone());
        }
        let tables = self.store.tables();
        tables
            .lot_index
            .get(key)
            .and_then(|id| tables.lots.get(id))
            .cloned()
    }

    pub fn lot(&self, tenant_id: &str, lot_id: Uuid) -> Option<Lot> {
        self.pending
            .lots
            .get(&lot_id)
            .filter(|l| l.tenant_id == tenant_id)
            .cloned()
            .or_else(|| self.store.lot(tenant_id, lot_id))
    }

    pub fn movement(&self, tenant_id: &str, movement_id: Uuid) -> Option<Movement> {
        self.pending
            .movements
            .iter()
            .find(|m| m.id == movement_id && m.tenant_id == tenant_id)
            .cloned()
            .or_else(|| self.store.movement(tenant_id, movement_id))
    }

    /// 下一個帳本序號
    pub fn next_sequence(&self) -> u64 {
        self.store.next_sequence()
    }

    // ---- 寫入 ----

    /// 追加異動並同時寫入新的餘額（需持有餘額鎖）
    pub fn record_movement(&mut self, movement: Movement, balance: Balance) -> stock_core::Result<()> {
        let row = RowKey::Balance(balance.key.clone());
        self.require(&row)?;

        let previous = self.pending.balances.get(&balance.key).cloned();
        self.journal.record(
            UndoEntry::Balance {
                key: balance.key.clone(),
                previous,
            },
            row.clone(),
        );
        self.journal
            .record(UndoEntry::MovementAppended(movement.id), row);

        self.pending.balances.insert(balance.key.clone(), balance);
        self.pending.movements.push(movement);
        Ok(())
    }

    /// 寫入批號（需持有批號鎖）
    pub fn put_lot(&mut self, lot: Lot) -> stock_core::Result<()> {
        let row = RowKey::Lots(lot.balance_key());
        self.require(&row)?;

        let previous = self.pending.lots.get(&lot.id).cloned();
        self.journal.record(
            UndoEntry::Lot {
                lot_id: lot.id,
                previous,
            },
            row,
        );
        self.pending.put_lot(lot);
        Ok(())
    }

    /// 寫入單位成本（需持有物料鎖）
    pub fn set_unit_cost(
        &mut self,
        tenant_id: &str,
        product_id: &str,
        unit_cost: Decimal,
    ) -> stock_core::Result<()> {
        let row = RowKey::product(tenant_id, product_id);
        self.require(&row)?;

        let mut product = self.product(tenant_id, product_id)?;
        let key = (tenant_id.to_string(), product_id.to_string());
        let previous = self.pending.products.get(&key).cloned();
        self.journal
            .record(UndoEntry::UnitCost { key: key.clone(), previous }, row);

        product.unit_cost = unit_cost;
        self.pending.products.insert(key, product);
        Ok(())
    }

    /// 寫入 BOM 關係（需持有父件物料鎖）
    pub fn put_edge(&mut self, edge: BomEdge) -> stock_core::Result<()> {
        let row = RowKey::product(&edge.tenant_id, &edge.parent_id);
        self.require(&row)?;

        let key = (
            edge.tenant_id.clone(),
            edge.parent_id.clone(),
            edge.component_id.clone(),
        );
        let previous = self.pending.edges.insert(key.clone(), edge);
        self.journal.record(UndoEntry::Edge { key, previous }, row);
        Ok(())
    }

    // ---- 交易控制 ----

    /// 此交易修改過的資料列
    pub fn touched_rows(&self) -> Vec<RowKey> {
        self.journal.touched_rows()
    }

    pub fn savepoint(&self) -> Savepoint {
        Savepoint(self.journal.len())
    }

    /// 復原到儲存點（保留鎖）
    pub fn rollback_to(&mut self, savepoint: Savepoint) {
        let undone = self.journal.take_since(savepoint.0);
        if undone.is_empty() {
            return;
        }
        tracing::debug!("交易 {} 復原 {} 筆變更", self.owner, undone.len());
        for entry in undone {
            self.pending.undo(entry);
        }
    }

    /// 提交：在同一把資料表鎖下合併所有待提交的變更
    pub fn commit(mut self) {
        tracing::debug!(
            "交易 {} 提交，{} 筆變更，{} 個資料列",
            self.owner,
            self.journal.len(),
            self.journal.touched_rows().len()
        );
        let pending = std::mem::take(&mut self.pending);
        self.store.tables().merge(pending);
        self.journal.clear();
        self.finished = true;
    }

    /// 捨棄所有變更
    pub fn rollback(self) {
        // Drop 負責捨棄與釋放鎖
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.pending.is_empty() {
            tracing::warn!(
                "交易 {} 未提交，捨棄 {} 筆變更",
                self.owner,
                self.journal.len()
            );
        }
        self.store.locks().release(&self.held, self.owner);
        self.held.clear();
    }
}
