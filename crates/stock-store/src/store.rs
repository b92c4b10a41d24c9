//! 庫存資料儲存

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use stock_core::{
    Balance, BalanceKey, BomEdge, CatalogGraph, EngineConfig, Location, Lot, Movement, Product,
    StockError,
};
use uuid::Uuid;

use crate::locks::LockManager;
use crate::tables::Tables;
use crate::unit_of_work::UnitOfWork;

/// 租戶帳本快照（同一時點的異動、餘額與批號）
#[derive(Debug, Clone, Default)]
pub struct TenantSnapshot {
    pub movements: Vec<Movement>,
    pub balances: Vec<Balance>,
    pub lots: Vec<Lot>,
}

/// 庫存資料儲存
///
/// 三張帳本資料表（異動、餘額、批號）加上唯讀的物料目錄。
/// 所有寫入都必須透過 [`UnitOfWork`] 並持有對應的資料列鎖；
/// 查詢只看得到已提交的資料。
#[derive(Debug)]
pub struct InventoryStore {
    config: EngineConfig,
    tables: Mutex<Tables>,
    locks: LockManager,
    next_owner: AtomicU64,
    next_sequence: AtomicU64,
}

impl InventoryStore {
    /// 創建新的儲存
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            tables: Mutex::new(Tables::default()),
            locks: LockManager::new(),
            next_owner: AtomicU64::new(1),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// 引擎配置
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 開始新的交易單元
    pub fn begin(&self) -> UnitOfWork<'_> {
        let owner = self.next_owner.fetch_add(1, Ordering::Relaxed);
        UnitOfWork::new(self, owner)
    }

    pub(crate) fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    // ---- 目錄維護（外部協作者使用） ----

    /// 新增或更新物料
    ///
    /// 已存在的物料保留原本的單位成本；成本只由成本計算器寫入。
    pub fn upsert_product(&self, mut product: Product) {
        let mut tables = self.tables();
        let key = (product.tenant_id.clone(), product.id.clone());
        if let Some(existing) = tables.products.get(&key) {
            product.unit_cost = existing.unit_cost;
        }
        tables.products.insert(key, product);
    }

    /// 新增或更新庫位
    pub fn upsert_location(&self, location: Location) {
        let key = (location.tenant_id.clone(), location.id.clone());
        self.tables().locations.insert(key, location);
    }

    /// 匯入 BOM 關係（不做任何驗證）
    ///
    /// 模擬引擎以外寫入的資料；正常流程應使用成本計算器的 `add_bom_edge`。
    pub fn import_bom_edge(&self, edge: BomEdge) {
        let key = (
            edge.tenant_id.clone(),
            edge.parent_id.clone(),
            edge.component_id.clone(),
        );
        self.tables().edges.insert(key, edge);
    }

    // ---- 查詢 ----

    /// 取得庫位
    pub fn location(&self, tenant_id: &str, location_id: &str) -> stock_core::Result<Location> {
        self.tables()
            .locations
            .get(&(tenant_id.to_string(), location_id.to_string()))
            .cloned()
            .ok_or_else(|| StockError::LocationNotFound(location_id.to_string()))
    }

    /// 租戶的預設庫位
    pub fn default_location(&self, tenant_id: &str) -> Option<Location> {
        let tables = self.tables();
        let mut defaults: Vec<&Location> = tables
            .locations
            .values()
            .filter(|l| l.tenant_id == tenant_id && l.is_default)
            .collect();
        defaults.sort_by(|a, b| a.id.cmp(&b.id));
        defaults.first().map(|l| (*l).clone())
    }

    /// 取得單一 BOM 關係
    pub fn bom_edge(&self, tenant_id: &str, parent_id: &str, component_id: &str) -> Option<BomEdge> {
        self.tables()
            .edges
            .get(&(
                tenant_id.to_string(),
                parent_id.to_string(),
                component_id.to_string(),
            ))
            .cloned()
    }

    /// 租戶的 BOM 關係數量
    pub fn bom_edge_count(&self, tenant_id: &str) -> usize {
        self.tables()
            .edges
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .count()
    }

    /// 取得餘額
    pub fn balance(&self, key: &BalanceKey) -> Option<Balance> {
        self.tables().balances.get(key).cloned()
    }

    /// 租戶的所有餘額
    pub fn balances(&self, tenant_id: &str) -> Vec<Balance> {
        self.tables().balances_of(tenant_id)
    }

    /// 取得異動
    pub fn movement(&self, tenant_id: &str, movement_id: Uuid) -> Option<Movement> {
        self.tables()
            .movements
            .iter()
            .find(|m| m.id == movement_id && m.tenant_id == tenant_id)
            .cloned()
    }

    /// 某物料於某庫位的異動（依追加順序）
    pub fn movements_for(&self, key: &BalanceKey) -> Vec<Movement> {
        self.tables()
            .movements
            .iter()
            .filter(|m| {
                m.tenant_id == key.tenant_id
                    && m.product_id == key.product_id
                    && m.location_id == key.location_id
            })
            .cloned()
            .collect()
    }

    /// 引用某批號的異動
    pub fn movements_for_lot(&self, tenant_id: &str, lot_id: Uuid) -> Vec<Movement> {
        self.tables()
            .movements
            .iter()
            .filter(|m| m.tenant_id == tenant_id && m.lot_id == Some(lot_id))
            .cloned()
            .collect()
    }

    /// 租戶的所有異動
    pub fn movements_of_tenant(&self, tenant_id: &str) -> Vec<Movement> {
        self.tables().movements_of(tenant_id)
    }

    /// 取得批號
    pub fn lot(&self, tenant_id: &str, lot_id: Uuid) -> Option<Lot> {
        self.tables()
            .lots
            .get(&lot_id)
            .filter(|l| l.tenant_id == tenant_id)
            .cloned()
    }

    /// 某物料於某庫位的批號（FEFO 排序）
    pub fn lots_for(&self, key: &BalanceKey) -> Vec<Lot> {
        self.tables().lots_for(key)
    }

    /// 租戶的所有批號（依到期日排序）
    pub fn lots_of_tenant(&self, tenant_id: &str) -> Vec<Lot> {
        self.tables().lots_of(tenant_id)
    }

    /// 在同一把資料表鎖下取出租戶的異動、餘額與批號
    pub fn snapshot(&self, tenant_id: &str) -> TenantSnapshot {
        let tables = self.tables();
        TenantSnapshot {
            movements: tables.movements_of(tenant_id),
            balances: tables.balances_of(tenant_id),
            lots: tables.lots_of(tenant_id),
        }
    }
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl CatalogGraph for InventoryStore {
    fn get_product(&self, tenant_id: &str, product_id: &str) -> stock_core::Result<Product> {
        self.tables()
            .product(tenant_id, product_id)
            .cloned()
            .ok_or_else(|| StockError::ProductNotFound(product_id.to_string()))
    }

    fn list_components(&self, tenant_id: &str, parent_id: &str) -> Vec<BomEdge> {
        self.tables().edges_of(tenant_id, parent_id)
    }

    fn list_parents_using(&self, tenant_id: &str, component_id: &str) -> Vec<Product> {
        self.tables().parents_of(tenant_id, component_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use stock_core::ProductKind;

    fn seeded() -> InventoryStore {
        let store = InventoryStore::default();
        store.upsert_product(
            Product::new("T1".to_string(), "BURGER".to_string(), ProductKind::Composite),
        );
        store.upsert_product(
            Product::new("T1".to_string(), "BUN".to_string(), ProductKind::Leaf)
                .with_unit_cost(Decimal::new(250, 2)),
        );
        store.import_bom_edge(BomEdge::new(
            "T1".to_string(),
            "BURGER".to_string(),
            "BUN".to_string(),
            Decimal::ONE,
        ));
        store
    }

    #[test]
    fn test_catalog_graph_queries() {
        let store = seeded();

        let components = store.list_components("T1", "BURGER");
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].component_id, "BUN");

        let parents = store.list_parents_using("T1", "BUN");
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].id, "BURGER");
    }

    #[test]
    fn test_tenant_isolation() {
        let store = seeded();
        assert!(matches!(
            store.get_product("T2", "BUN"),
            Err(StockError::ProductNotFound(_))
        ));
        assert!(store.list_components("T2", "BURGER").is_empty());
        assert_eq!(store.bom_edge_count("T2"), 0);
    }

    #[test]
    fn test_upsert_keeps_unit_cost() {
        let store = seeded();
        store.upsert_product(
            Product::new("T1".to_string(), "BUN".to_string(), ProductKind::Leaf)
                .with_name("Brioche bun".to_string())
                .with_unit_cost(Decimal::from(99)),
        );

        let bun = store.get_product("T1", "BUN").unwrap();
        assert_eq!(bun.name, "Brioche bun");
        assert_eq!(bun.unit_cost, Decimal::new(250, 2));
    }

    #[test]
    fn test_default_location() {
        let store = InventoryStore::default();
        store.upsert_location(Location::new("T1".to_string(), "BAR".to_string()));
        store.upsert_location(Location::new("T1".to_string(), "KITCHEN".to_string()).as_default());
        store.upsert_location(
            Location::new("T1".to_string(), "SUPPLIER".to_string()).as_virtual(),
        );

        assert_eq!(store.default_location("T1").unwrap().id, "KITCHEN");
        assert!(store.default_location("T2").is_none());
        assert!(store.location("T1", "SUPPLIER").unwrap().is_virtual);
        assert!(matches!(
            store.location("T1", "NOWHERE"),
            Err(StockError::LocationNotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_is_tenant_scoped() {
        let store = seeded();
        let key = BalanceKey::new("T1".to_string(), "BUN".to_string(), "WH-01".to_string());
        let mut uow = store.begin();
        uow.lock(crate::RowKey::Balance(key.clone())).unwrap();
        let movement = stock_core::MovementRequest::new(
            "BUN".to_string(),
            "WH-01".to_string(),
            stock_core::MovementType::Entry,
            Decimal::from(4),
            "PO-1".to_string(),
        )
        .into_movement("T1".to_string(), uow.next_sequence());
        let mut balance = Balance::empty(key);
        balance.apply(movement.signed_quantity(), movement.id);
        uow.record_movement(movement, balance).unwrap();

        // 未提交前快照為空
        assert!(store.snapshot("T1").movements.is_empty());
        uow.commit();

        let snapshot = store.snapshot("T1");
        assert_eq!(snapshot.movements.len(), 1);
        assert_eq!(snapshot.balances.len(), 1);
        assert_eq!(snapshot.balances[0].quantity, Decimal::from(4));
        assert!(snapshot.lots.is_empty());
        assert!(store.snapshot("T2").balances.is_empty());
    }
}
