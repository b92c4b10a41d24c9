//! 記憶體資料表

use std::collections::{BTreeMap, HashMap};

use stock_core::{Balance, BalanceKey, BomEdge, Location, Lot, LotKey, Movement, Product};
use uuid::Uuid;

use crate::journal::{EdgeKey, ProductKey, UndoEntry};

/// 所有資料表（鍵皆含租戶）
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub products: HashMap<ProductKey, Product>,
    pub edges: BTreeMap<EdgeKey, BomEdge>,
    pub locations: HashMap<(String, String), Location>,
    pub balances: HashMap<BalanceKey, Balance>,
    pub lots: HashMap<Uuid, Lot>,
    pub lot_index: HashMap<LotKey, Uuid>,
    pub movements: Vec<Movement>,
}

impl Tables {
    pub fn product(&self, tenant_id: &str, product_id: &str) -> Option<&Product> {
        self.products
            .get(&(tenant_id.to_string(), product_id.to_string()))
    }

    pub fn edges_of(&self, tenant_id: &str, parent_id: &str) -> Vec<BomEdge> {
        self.edges
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.parent_id == parent_id)
            .cloned()
            .collect()
    }

    pub fn parents_of(&self, tenant_id: &str, component_id: &str) -> Vec<Product> {
        let mut parents: Vec<Product> = self
            .edges
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.component_id == component_id)
            .filter_map(|e| self.product(tenant_id, &e.parent_id).cloned())
            .collect();
        parents.sort_by(|a, b| a.id.cmp(&b.id));
        parents.dedup_by(|a, b| a.id == b.id);
        parents
    }

    pub fn lots_for(&self, key: &BalanceKey) -> Vec<Lot> {
        let mut lots: Vec<Lot> = self
            .lots
            .values()
            .filter(|l| {
                l.tenant_id == key.tenant_id
                    && l.product_id == key.product_id
                    && l.location_id == key.location_id
            })
            .cloned()
            .collect();
        lots.sort_by(|a, b| a.fefo_cmp(b));
        lots
    }

    pub fn balances_of(&self, tenant_id: &str) -> Vec<Balance> {
        let mut balances: Vec<Balance> = self
            .balances
            .values()
            .filter(|b| b.key.tenant_id == tenant_id)
            .cloned()
            .collect();
        balances.sort_by(|a, b| a.key.cmp(&b.key));
        balances
    }

    pub fn lots_of(&self, tenant_id: &str) -> Vec<Lot> {
        let mut lots: Vec<Lot> = self
            .lots
            .values()
            .filter(|l| l.tenant_id == tenant_id)
            .cloned()
            .collect();
        lots.sort_by(|a, b| a.fefo_cmp(b));
        lots
    }

    pub fn movements_of(&self, tenant_id: &str) -> Vec<Movement> {
        self.movements
            .iter()
            .filter(|m| m.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    pub fn put_lot(&mut self, lot: Lot) {
        self.lot_index.insert(lot.key(), lot.id);
        self.lots.insert(lot.id, lot);
    }

    /// 合併交易單元待提交的變更（提交時呼叫）
    ///
    /// 物料只帶回單位成本，其餘欄位以已提交的目錄為準。
    pub fn merge(&mut self, pending: Tables) {
        for (key, product) in pending.products {
            if let Some(existing) = self.products.get_mut(&key) {
                existing.unit_cost = product.unit_cost;
            }
        }
        self.edges.extend(pending.edges);
        self.balances.extend(pending.balances);
        for lot in pending.lots.into_values() {
            self.put_lot(lot);
        }
        self.movements.extend(pending.movements);
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
            && self.edges.is_empty()
            && self.balances.is_empty()
            && self.lots.is_empty()
            && self.movements.is_empty()
    }

    /// 套用一筆復原記錄
    pub fn undo(&mut self, entry: UndoEntry) {
        match entry {
            UndoEntry::MovementAppended(id) => {
                self.movements.retain(|m| m.id != id);
            }
            UndoEntry::Balance { key, previous } => match previous {
                Some(balance) => {
                    self.balances.insert(key, balance);
                }
                None => {
                    self.balances.remove(&key);
                }
            },
            UndoEntry::Lot { lot_id, previous } => match previous {
                Some(lot) => self.put_lot(lot),
                None => {
                    if let Some(removed) = self.lots.remove(&lot_id) {
                        self.lot_index.remove(&removed.key());
                    }
                }
            },
            UndoEntry::UnitCost { key, previous } => match previous {
                Some(product) => {
                    self.products.insert(key, product);
                }
                None => {
                    self.products.remove(&key);
                }
            },
            UndoEntry::Edge { key, previous } => match previous {
                Some(edge) => {
                    self.edges.insert(key, edge);
                }
                None => {
                    self.edges.remove(&key);
                }
            },
        }
    }
}
