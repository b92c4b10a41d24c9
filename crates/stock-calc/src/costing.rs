//! BOM 成本計算
//!
//! 組合品成本 = Σ（固定成本覆寫 或 元件單位成本 × 單位用量），
//! 中間加總保持完整精度，只在寫回 `unit_cost` 時四捨五入。

use rust_decimal::Decimal;
use stock_core::{BomEdge, CatalogGraph, Product, StockError};
use stock_store::{InventoryStore, RowKey, UnitOfWork};

/// BOM 成本計算器
pub struct BomCostCalculator<'a> {
    store: &'a InventoryStore,
}

impl<'a> BomCostCalculator<'a> {
    /// 創建新的成本計算器
    pub fn new(store: &'a InventoryStore) -> Self {
        Self { store }
    }

    /// 重新計算組合品成本並寫回
    ///
    /// 不遞迴：假設每個元件的單位成本已是最新。
    pub fn recompute_cost(&self, tenant_id: &str, product_id: &str) -> stock_core::Result<Decimal> {
        let mut uow = self.store.begin();
        let cost = Self::recompute_cost_in(&mut uow, tenant_id, product_id)?;
        uow.commit();
        Ok(cost)
    }

    /// 在既有交易單元中重新計算成本
    pub fn recompute_cost_in(
        uow: &mut UnitOfWork<'_>,
        tenant_id: &str,
        product_id: &str,
    ) -> stock_core::Result<Decimal> {
        uow.lock(RowKey::product(tenant_id, product_id))?;

        let product = uow.product(tenant_id, product_id)?;
        if !product.is_composite() {
            return Err(StockError::NotComposite(product_id.to_string()));
        }

        let mut total = Decimal::ZERO;
        for edge in uow.store().list_components(tenant_id, product_id) {
            let component = uow.product(tenant_id, &edge.component_id)?;
            total += edge.line_cost(component.unit_cost);
        }

        let cost = uow.config().round_cost(total);
        uow.set_unit_cost(tenant_id, product_id, cost)?;
        tracing::debug!("重算成本 {}: {} -> {}", product_id, product.unit_cost, cost);
        Ok(cost)
    }

    /// 檢查新增 parent -> component 關係是否形成循環（使用配置的最大層級）
    pub fn validate_no_cycle(
        &self,
        tenant_id: &str,
        parent_id: &str,
        component_id: &str,
    ) -> stock_core::Result<()> {
        self.validate_no_cycle_with_depth(
            tenant_id,
            parent_id,
            component_id,
            self.store.config().max_bom_depth,
        )
    }

    /// 檢查循環（指定最大層級）
    ///
    /// 從候選元件往下走訪，若能走回候選父件即為循環。
    pub fn validate_no_cycle_with_depth(
        &self,
        tenant_id: &str,
        parent_id: &str,
        component_id: &str,
        max_depth: usize,
    ) -> stock_core::Result<()> {
        if parent_id == component_id {
            return Err(StockError::CycleDetected {
                parent_id: parent_id.to_string(),
                component_id: component_id.to_string(),
            });
        }

        let mut stack: Vec<(String, usize)> = vec![(component_id.to_string(), 0)];
        while let Some((node, depth)) = stack.pop() {
            if depth > max_depth {
                return Err(StockError::MaxDepthExceeded {
                    product_id: node,
                    max_depth,
                });
            }

            let product = self.store.get_product(tenant_id, &node)?;
            if !product.is_composite() {
                continue;
            }

            for edge in self.store.list_components(tenant_id, &node) {
                if edge.component_id == parent_id {
                    tracing::warn!(
                        "拒絕 BOM 關係 {} -> {}：{} 已包含 {}",
                        parent_id,
                        component_id,
                        node,
                        parent_id
                    );
                    return Err(StockError::CycleDetected {
                        parent_id: parent_id.to_string(),
                        component_id: component_id.to_string(),
                    });
                }
                stack.push((edge.component_id, depth + 1));
            }
        }

        Ok(())
    }

    /// 成本變動後向上傳遞
    ///
    /// 返回所有重新計算過的組合品（依首次計算順序）。
    pub fn propagate_cost_change(
        &self,
        tenant_id: &str,
        product_id: &str,
    ) -> stock_core::Result<Vec<Product>> {
        self.store.get_product(tenant_id, product_id)?;
        tracing::info!("開始成本傳遞: {}", product_id);

        let mut uow = self.store.begin();
        let changed = Self::propagate_in(&mut uow, tenant_id, product_id)?;
        uow.commit();

        tracing::info!("成本傳遞完成: {} 個組合品", changed.len());
        self.collect(tenant_id, &changed)
    }

    /// 在既有交易單元中傳遞成本，返回重算過的物料ID
    pub fn propagate_in(
        uow: &mut UnitOfWork<'_>,
        tenant_id: &str,
        product_id: &str,
    ) -> stock_core::Result<Vec<String>> {
        // 先依鍵值順序鎖定所有上層組合品，再逐層重算
        let ancestors = Self::ancestors(uow.store(), tenant_id, product_id, uow.config().max_bom_depth)?;
        uow.lock_all(ancestors.iter().map(|id| RowKey::product(tenant_id, id)))?;

        let mut changed = Vec::new();
        Self::propagate_from(uow, tenant_id, product_id, 0, &mut changed)?;
        Ok(changed)
    }

    /// 往上收集所有直接或間接使用此物料的組合品
    fn ancestors(
        store: &InventoryStore,
        tenant_id: &str,
        product_id: &str,
        max_depth: usize,
    ) -> stock_core::Result<Vec<String>> {
        let mut found: Vec<String> = Vec::new();
        let mut stack: Vec<(String, usize)> = vec![(product_id.to_string(), 0)];
        while let Some((node, depth)) = stack.pop() {
            if depth > max_depth {
                tracing::warn!("成本傳遞超過層級上限 {}（於 {}）", max_depth, node);
                return Err(StockError::MaxDepthExceeded {
                    product_id: node,
                    max_depth,
                });
            }
            for parent in store
                .list_parents_using(tenant_id, &node)
                .into_iter()
                .filter(Product::is_composite)
            {
                if !found.contains(&parent.id) {
                    found.push(parent.id.clone());
                }
                stack.push((parent.id, depth + 1));
            }
        }
        Ok(found)
    }

    fn propagate_from(
        uow: &mut UnitOfWork<'_>,
        tenant_id: &str,
        product_id: &str,
        depth: usize,
        changed: &mut Vec<String>,
    ) -> stock_core::Result<()> {
        let max_depth = uow.config().max_bom_depth;
        if depth > max_depth {
            tracing::warn!("成本傳遞超過層級上限 {}（於 {}）", max_depth, product_id);
            return Err(StockError::MaxDepthExceeded {
                product_id: product_id.to_string(),
                max_depth,
            });
        }

        let parents = uow.store().list_parents_using(tenant_id, product_id);
        for parent in parents.into_iter().filter(Product::is_composite) {
            Self::recompute_cost_in(uow, tenant_id, &parent.id)?;
            if !changed.contains(&parent.id) {
                changed.push(parent.id.clone());
            }
            Self::propagate_from(uow, tenant_id, &parent.id, depth + 1, changed)?;
        }
        Ok(())
    }

    /// 設定物料單位成本並向上傳遞（同一交易單元）
    pub fn set_unit_cost(
        &self,
        tenant_id: &str,
        product_id: &str,
        unit_cost: Decimal,
    ) -> stock_core::Result<Vec<Product>> {
        if unit_cost < Decimal::ZERO {
            return Err(StockError::InvalidCost(unit_cost));
        }

        let ancestors = Self::ancestors(
            self.store,
            tenant_id,
            product_id,
            self.store.config().max_bom_depth,
        )?;
        let mut uow = self.store.begin();
        uow.lock_all(
            std::iter::once(product_id)
                .chain(ancestors.iter().map(String::as_str))
                .map(|id| RowKey::product(tenant_id, id)),
        )?;
        uow.product(tenant_id, product_id)?;

        let cost = uow.config().round_cost(unit_cost);
        uow.set_unit_cost(tenant_id, product_id, cost)?;
        tracing::info!("設定成本 {}: {}", product_id, cost);

        let changed = Self::propagate_in(&mut uow, tenant_id, product_id)?;
        uow.commit();

        self.collect(tenant_id, &changed)
    }

    /// 新增或取代 BOM 關係
    ///
    /// 所有檢查（含循環檢查）通過後才寫入。
    pub fn add_bom_edge(&self, edge: BomEdge) -> stock_core::Result<()> {
        if edge.quantity_per_unit <= Decimal::ZERO {
            return Err(StockError::InvalidBomEdge(format!(
                "{} -> {} 單位用量必須大於零",
                edge.parent_id, edge.component_id
            )));
        }
        if let Some(cost) = edge.fixed_cost_override {
            if cost < Decimal::ZERO {
                return Err(StockError::InvalidCost(cost));
            }
        }

        let tenant_id = edge.tenant_id.clone();
        let parent = self.store.get_product(&tenant_id, &edge.parent_id)?;
        if !parent.is_composite() {
            return Err(StockError::InvalidBomEdge(format!(
                "父件 {} 不是組合品",
                edge.parent_id
            )));
        }
        self.store.get_product(&tenant_id, &edge.component_id)?;

        // 同租戶的新增關係互斥，避免兩筆各自合法的關係合起來成環
        let mut uow = self.store.begin();
        uow.lock_all([
            RowKey::Catalog(tenant_id.clone()),
            RowKey::product(&tenant_id, &edge.parent_id),
        ])?;

        self.validate_no_cycle(&tenant_id, &edge.parent_id, &edge.component_id)?;

        tracing::info!(
            "新增 BOM 關係 {} -> {} x {}",
            edge.parent_id,
            edge.component_id,
            edge.quantity_per_unit
        );
        uow.put_edge(edge)?;
        uow.commit();
        Ok(())
    }

    fn collect(&self, tenant_id: &str, ids: &[String]) -> stock_core::Result<Vec<Product>> {
        ids.iter()
            .map(|id| self.store.get_product(tenant_id, id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn cost_of(store: &InventoryStore, id: &str) -> Decimal {
        store.get_product(TENANT, id).unwrap().unit_cost
    }

    #[test]
    fn test_recompute_burger_cost() {
        let store = burger_store();
        let calculator = BomCostCalculator::new(&store);

        let cost = calculator.recompute_cost(TENANT, "BURGER").unwrap();

        assert_eq!(cost, Decimal::new(1350, 2));
        assert_eq!(cost_of(&store, "BURGER"), Decimal::new(1350, 2));
    }

    #[test]
    fn test_fixed_cost_override_wins() {
        let store = burger_store();
        store.import_bom_edge(
            edge("BURGER", "CHEESE", 2).with_fixed_cost_override(Decimal::new(100, 2)),
        );
        let calculator = BomCostCalculator::new(&store);

        // 2.50 + 8.00 + 1.00
        let cost = calculator.recompute_cost(TENANT, "BURGER").unwrap();
        assert_eq!(cost, Decimal::new(1150, 2));
    }

    #[test]
    fn test_recompute_leaf_fails() {
        let store = burger_store();
        let calculator = BomCostCalculator::new(&store);

        let err = calculator.recompute_cost(TENANT, "BUN").unwrap_err();
        assert_eq!(err, StockError::NotComposite("BUN".to_string()));
        assert_eq!(cost_of(&store, "BUN"), Decimal::new(250, 2));
    }

    #[test]
    fn test_rounding_only_on_persist() {
        let store = empty_store();
        store.upsert_product(leaf("SALT", Decimal::new(3333, 4)));
        store.upsert_product(composite("MIX"));
        store.import_bom_edge(edge("MIX", "SALT", 3));
        let calculator = BomCostCalculator::new(&store);

        // 0.3333 x 3 = 0.9999 -> 1.00
        let cost = calculator.recompute_cost(TENANT, "MIX").unwrap();
        assert_eq!(cost, Decimal::new(100, 2));
    }

    #[test]
    fn test_cycle_rejected() {
        let store = empty_store();
        store.upsert_product(composite("A"));
        store.upsert_product(composite("B"));
        store.import_bom_edge(edge("A", "B", 1));
        let calculator = BomCostCalculator::new(&store);

        let err = calculator.validate_no_cycle(TENANT, "B", "A").unwrap_err();
        assert!(matches!(err, StockError::CycleDetected { .. }));

        let err = calculator.add_bom_edge(edge("B", "A", 1)).unwrap_err();
        assert!(matches!(err, StockError::CycleDetected { .. }));
        assert!(store.bom_edge(TENANT, "B", "A").is_none());
        assert_eq!(store.bom_edge_count(TENANT), 1);
    }

    #[test]
    fn test_indirect_cycle_rejected() {
        let store = empty_store();
        for id in ["A", "B", "C"] {
            store.upsert_product(composite(id));
        }
        store.import_bom_edge(edge("A", "B", 1));
        store.import_bom_edge(edge("B", "C", 1));
        let calculator = BomCostCalculator::new(&store);

        assert!(matches!(
            calculator.validate_no_cycle(TENANT, "C", "A"),
            Err(StockError::CycleDetected { .. })
        ));
        assert!(calculator.validate_no_cycle(TENANT, "A", "C").is_ok());
    }

    #[test]
    fn test_self_edge_rejected() {
        let store = burger_store();
        let calculator = BomCostCalculator::new(&store);

        assert!(matches!(
            calculator.add_bom_edge(edge("BURGER", "BURGER", 1)),
            Err(StockError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_leaf_component_passes_trivially() {
        let store = burger_store();
        let calculator = BomCostCalculator::new(&store);
        assert!(calculator.validate_no_cycle(TENANT, "BURGER", "BUN").is_ok());
    }

    #[test]
    fn test_max_depth_exceeded() {
        let store = empty_store();
        for i in 0..6 {
            store.upsert_product(composite(&format!("L{}", i)));
        }
        store.upsert_product(composite("TOP"));
        for i in 0..5 {
            store.import_bom_edge(edge(&format!("L{}", i), &format!("L{}", i + 1), 1));
        }
        let calculator = BomCostCalculator::new(&store);

        let err = calculator
            .validate_no_cycle_with_depth(TENANT, "TOP", "L0", 3)
            .unwrap_err();
        assert_eq!(
            err,
            StockError::MaxDepthExceeded {
                product_id: "L4".to_string(),
                max_depth: 3,
            }
        );
        assert!(calculator
            .validate_no_cycle_with_depth(TENANT, "TOP", "L0", 10)
            .is_ok());
    }

    #[test]
    fn test_propagate_bun_cost_change() {
        let store = burger_store();
        let calculator = BomCostCalculator::new(&store);
        calculator.recompute_cost(TENANT, "BURGER").unwrap();

        let changed = calculator
            .set_unit_cost(TENANT, "BUN", Decimal::new(500, 2))
            .unwrap();

        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, "BURGER");
        assert_eq!(changed[0].unit_cost, Decimal::new(1600, 2));
        assert_eq!(cost_of(&store, "BURGER"), Decimal::new(1600, 2));
    }

    #[test]
    fn test_propagate_multi_level() {
        let store = burger_store();
        store.upsert_product(leaf("FRIES", Decimal::new(200, 2)));
        store.upsert_product(composite("COMBO"));
        store.import_bom_edge(edge("COMBO", "BURGER", 1));
        store.import_bom_edge(edge("COMBO", "FRIES", 1));
        let calculator = BomCostCalculator::new(&store);
        calculator.propagate_cost_change(TENANT, "BUN").unwrap();
        assert_eq!(cost_of(&store, "COMBO"), Decimal::new(1550, 2));

        let changed = calculator
            .set_unit_cost(TENANT, "CHEESE", Decimal::new(200, 2))
            .unwrap();

        let ids: Vec<&str> = changed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["BURGER", "COMBO"]);
        assert_eq!(cost_of(&store, "BURGER"), Decimal::new(1450, 2));
        assert_eq!(cost_of(&store, "COMBO"), Decimal::new(1650, 2));
    }

    #[test]
    fn test_propagate_corrupted_cycle_rolls_back() {
        let store = empty_store();
        store.upsert_product(leaf("X", Decimal::ONE));
        store.upsert_product(composite("A"));
        store.upsert_product(composite("B"));
        store.import_bom_edge(edge("A", "X", 1));
        store.import_bom_edge(edge("A", "B", 1));
        store.import_bom_edge(edge("B", "A", 1));
        let calculator = BomCostCalculator::new(&store);

        let err = calculator
            .set_unit_cost(TENANT, "X", Decimal::from(7))
            .unwrap_err();

        assert!(matches!(err, StockError::MaxDepthExceeded { .. }));
        assert_eq!(cost_of(&store, "X"), Decimal::ONE);
        assert_eq!(cost_of(&store, "A"), Decimal::ZERO);
        assert_eq!(cost_of(&store, "B"), Decimal::ZERO);
    }

    #[test]
    fn test_recompute_ignores_uncommitted_component_cost() {
        let store = burger_store();
        let calculator = BomCostCalculator::new(&store);

        let mut pending = store.begin();
        pending.lock(RowKey::product(TENANT, "BUN")).unwrap();
        pending.set_unit_cost(TENANT, "BUN", Decimal::from(100)).unwrap();

        // 另一個交易單元只看得到已提交的 2.50
        assert_eq!(
            calculator.recompute_cost(TENANT, "BURGER").unwrap(),
            Decimal::new(1350, 2)
        );
        drop(pending);

        assert_eq!(cost_of(&store, "BUN"), Decimal::new(250, 2));
        assert_eq!(cost_of(&store, "BURGER"), Decimal::new(1350, 2));
    }

    #[test]
    fn test_crossing_propagations_do_not_block() {
        // A -> A1 -> PB 與 A -> PA；B -> B1 -> PA 與 B -> PB
        let store = empty_store();
        store.upsert_product(leaf("A", Decimal::ONE));
        store.upsert_product(leaf("B", Decimal::ONE));
        for id in ["A1", "B1", "PA", "PB"] {
            store.upsert_product(composite(id));
        }
        store.import_bom_edge(edge("A1", "A", 1));
        store.import_bom_edge(edge("PB", "A1", 1));
        store.import_bom_edge(edge("PA", "A", 1));
        store.import_bom_edge(edge("B1", "B", 1));
        store.import_bom_edge(edge("PA", "B1", 1));
        store.import_bom_edge(edge("PB", "B", 1));
        let calculator = BomCostCalculator::new(&store);

        std::thread::scope(|scope| {
            let handles: Vec<_> = ["A", "B"]
                .into_iter()
                .map(|id| {
                    let calculator = &calculator;
                    scope.spawn(move || {
                        for i in 1..=20 {
                            calculator
                                .set_unit_cost(TENANT, id, Decimal::from(i))
                                .unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });

        // PA = A + B1 = 20 + 20；PB = A1 + B = 20 + 20
        assert_eq!(cost_of(&store, "PA"), Decimal::new(4000, 2));
        assert_eq!(cost_of(&store, "PB"), Decimal::new(4000, 2));
    }

    #[test]
    fn test_set_unit_cost_rejects_negative() {
        let store = burger_store();
        let calculator = BomCostCalculator::new(&store);
        assert_eq!(
            calculator.set_unit_cost(TENANT, "BUN", Decimal::NEGATIVE_ONE),
            Err(StockError::InvalidCost(Decimal::NEGATIVE_ONE))
        );
    }

    #[test]
    fn test_add_bom_edge_validation() {
        let store = burger_store();
        let calculator = BomCostCalculator::new(&store);

        assert!(matches!(
            calculator.add_bom_edge(edge("BURGER", "BUN", 0)),
            Err(StockError::InvalidBomEdge(_))
        ));
        assert!(matches!(
            calculator.add_bom_edge(edge("BUN", "CHEESE", 1)),
            Err(StockError::InvalidBomEdge(_))
        ));
        assert!(matches!(
            calculator.add_bom_edge(edge("BURGER", "PICKLE", 1)),
            Err(StockError::ProductNotFound(_))
        ));

        store.upsert_product(leaf("PICKLE", Decimal::new(20, 2)));
        calculator.add_bom_edge(edge("BURGER", "PICKLE", 3)).unwrap();
        assert_eq!(store.bom_edge_count(TENANT), 4);

        // 重複新增同一組關係會取代
        calculator.add_bom_edge(edge("BURGER", "PICKLE", 2)).unwrap();
        assert_eq!(store.bom_edge_count(TENANT), 4);
        assert_eq!(
            store.bom_edge(TENANT, "BURGER", "PICKLE").unwrap().quantity_per_unit,
            Decimal::from(2)
        );
    }
}
