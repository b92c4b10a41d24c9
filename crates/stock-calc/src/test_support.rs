//! 測試用資料

use rust_decimal::Decimal;
use stock_core::{BomEdge, Location, Product, ProductKind};
use stock_store::InventoryStore;

pub const TENANT: &str = "T1";
pub const KITCHEN: &str = "KITCHEN";
pub const BAR: &str = "BAR";

pub fn leaf(id: &str, cost: Decimal) -> Product {
    Product::new(TENANT.to_string(), id.to_string(), ProductKind::Leaf).with_unit_cost(cost)
}

pub fn composite(id: &str) -> Product {
    Product::new(TENANT.to_string(), id.to_string(), ProductKind::Composite)
}

pub fn edge(parent: &str, component: &str, quantity: i64) -> BomEdge {
    BomEdge::new(
        TENANT.to_string(),
        parent.to_string(),
        component.to_string(),
        Decimal::from(quantity),
    )
}

/// 兩個庫位，無物料
pub fn empty_store() -> InventoryStore {
    let store = InventoryStore::default();
    store.upsert_location(Location::new(TENANT.to_string(), KITCHEN.to_string()).as_default());
    store.upsert_location(Location::new(TENANT.to_string(), BAR.to_string()));
    store
}

/// 漢堡 = 1 麵包(2.50) + 1 肉排(8.00) + 2 起司(1.50)
pub fn burger_store() -> InventoryStore {
    let store = empty_store();
    store.upsert_product(leaf("BUN", Decimal::new(250, 2)));
    store.upsert_product(leaf("PATTY", Decimal::new(800, 2)));
    store.upsert_product(leaf("CHEESE", Decimal::new(150, 2)));
    store.upsert_product(composite("BURGER"));
    store.import_bom_edge(edge("BURGER", "BUN", 1));
    store.import_bom_edge(edge("BURGER", "PATTY", 1));
    store.import_bom_edge(edge("BURGER", "CHEESE", 2));
    store
}
