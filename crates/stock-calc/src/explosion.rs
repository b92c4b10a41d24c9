//! BOM 展開
//!
//! 將出庫籃展開成葉節點需求，不同路徑的相同葉節點數量合併。

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use stock_core::{CatalogGraph, StockError};

use crate::BasketLine;

/// BOM 展開器
pub struct BomExploder<'a, C: CatalogGraph> {
    catalog: &'a C,
    max_depth: usize,
}

impl<'a, C: CatalogGraph> BomExploder<'a, C> {
    pub fn new(catalog: &'a C, max_depth: usize) -> Self {
        Self { catalog, max_depth }
    }

    /// 展開出庫籃
    ///
    /// 沒有任何 BOM 關係的組合品視為有庫存的物料，直接以自身出庫。
    pub fn explode(
        &self,
        tenant_id: &str,
        basket: &[BasketLine],
    ) -> stock_core::Result<BTreeMap<String, Decimal>> {
        let mut leaves: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut stack: Vec<(String, Decimal, usize)> = Vec::with_capacity(basket.len());

        for line in basket.iter().rev() {
            if line.quantity <= Decimal::ZERO {
                return Err(StockError::InvalidQuantity(line.quantity));
            }
            stack.push((line.product_id.clone(), line.quantity, 0));
        }

        while let Some((product_id, quantity, depth)) = stack.pop() {
            if depth > self.max_depth {
                return Err(StockError::MaxDepthExceeded {
                    product_id,
                    max_depth: self.max_depth,
                });
            }

            let product = self.catalog.get_product(tenant_id, &product_id)?;
            let components = if product.is_composite() {
                self.catalog.list_components(tenant_id, &product_id)
            } else {
                Vec::new()
            };

            if components.is_empty() {
                *leaves.entry(product_id).or_insert(Decimal::ZERO) += quantity;
                continue;
            }

            for edge in components {
                stack.push((edge.component_id.clone(), edge.explode(quantity), depth + 1));
            }
        }

        tracing::debug!("展開 {} 行，得到 {} 個葉節點", basket.len(), leaves.len());
        Ok(leaves)
    }
}
