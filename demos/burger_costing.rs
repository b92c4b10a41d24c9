//! 漢堡成本與出庫示例

use chrono::{Duration, Local};
use rust_decimal::Decimal;
use stock::model::CatalogGraph;
use stock::{
    BasketLine, BomCostCalculator, BomEdge, EngineConfig, InventoryStore, Ledger, Location,
    LotAllocator, LotReceipt, Product, ProductKind, WithdrawalOrchestrator,
};

const TENANT: &str = "DEMO";

fn main() -> anyhow::Result<()> {
    stock::telemetry::init();
    println!("=== 漢堡成本與出庫示例 ===\n");

    let config = EngineConfig::from_json_str(r#"{ "max_bom_depth": 8, "expiry": { "critical_days": 3 } }"#)?;
    config.validate()?;
    let store = InventoryStore::new(config);

    store.upsert_location(Location::new(TENANT.to_string(), "KITCHEN".to_string()).as_default());
    for (id, cost) in [("BUN", 250), ("PATTY", 800), ("CHEESE", 150)] {
        store.upsert_product(
            Product::new(TENANT.to_string(), id.to_string(), ProductKind::Leaf)
                .with_unit_cost(Decimal::new(cost, 2)),
        );
    }
    store.upsert_product(
        Product::new(TENANT.to_string(), "BURGER".to_string(), ProductKind::Composite)
            .with_name("Cheeseburger".to_string())
            .with_unit_sale_price(Decimal::from(25)),
    );

    // 建立 BOM 並計算成本
    let calculator = BomCostCalculator::new(&store);
    for (component, quantity) in [("BUN", 1), ("PATTY", 1), ("CHEESE", 2)] {
        calculator.add_bom_edge(BomEdge::new(
            TENANT.to_string(),
            "BURGER".to_string(),
            component.to_string(),
            Decimal::from(quantity),
        ))?;
    }
    let cost = calculator.recompute_cost(TENANT, "BURGER")?;
    println!("漢堡成本: {}", cost);

    let changed = calculator.set_unit_cost(TENANT, "BUN", Decimal::new(500, 2))?;
    for product in &changed {
        println!("  麵包漲價後 {} 成本: {}", product.id, product.unit_cost);
    }

    // 批號入庫
    let location = store
        .default_location(TENANT)
        .ok_or_else(|| anyhow::anyhow!("沒有預設庫位"))?;
    let today = Local::now().date_naive();
    let allocator = LotAllocator::new(&store);
    for (id, days, quantity) in [("BUN", 2, 4), ("BUN", 10, 10), ("PATTY", 5, 10), ("CHEESE", 20, 20)] {
        let cost = store.get_product(TENANT, id)?.unit_cost;
        allocator.receive_lot(
            TENANT,
            LotReceipt::new(
                id,
                location.id.as_str(),
                format!("{}-{}", id, days),
                Decimal::from(quantity),
                today + Duration::days(days),
            )
            .with_unit_value(cost)
            .with_document_ref("PO-1"),
        )?;
    }

    // 銷售 3 個漢堡
    let orchestrator = WithdrawalOrchestrator::new(&store);
    let basket = [BasketLine::new("BURGER", Decimal::from(3))];
    let movements = orchestrator.withdraw(TENANT, &basket, &location.id, true, "SALE-1")?;
    println!("\n出庫異動:");
    for movement in &movements {
        println!(
            "  - {} x {} 批號 {:?}",
            movement.product_id, movement.quantity, movement.lot_id
        );
    }

    // 超量銷售會回報所有缺料
    let basket = [BasketLine::new("BURGER", Decimal::from(20))];
    if let Err(err) = orchestrator.withdraw(TENANT, &basket, &location.id, true, "SALE-2") {
        println!("\n{}", err);
        for shortage in err.shortages() {
            println!(
                "  - {} 需要 {}, 可用 {}",
                shortage.product_id, shortage.needed, shortage.available
            );
        }
    }

    println!("\n效期警示:");
    for (lot, status) in allocator.expiring_lots(TENANT, today, 7) {
        println!("  - {} {} {:?}", lot.product_id, lot.lot_code, status);
    }

    let ledger = Ledger::new(&store);
    println!(
        "\n麵包餘額: {}",
        ledger.get_balance(TENANT, "BUN", &location.id)
    );
    Ok(())
}
