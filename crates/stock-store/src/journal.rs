//! 復原日誌（交易單元內的變更追蹤）

use std::collections::HashSet;

use stock_core::{Balance, BomEdge, Lot, Product};
use uuid::Uuid;

use crate::locks::RowKey;

/// BOM 關係鍵（租戶, 父件, 子件）
pub type EdgeKey = (String, String, String);

/// 物料鍵（租戶, 物料）
pub type ProductKey = (String, String);

/// 一筆可復原的變更
///
/// `previous` 記錄的是交易單元內待提交的狀態；None 表示此前沒有待提交的變更。
#[derive(Debug, Clone, PartialEq)]
pub enum UndoEntry {
    /// 追加的異動（復原時移除）
    MovementAppended(Uuid),

    /// 餘額變更前的狀態（None 表示原本不存在）
    Balance {
        key: stock_core::BalanceKey,
        previous: Option<Balance>,
    },

    /// 批號變更前的狀態
    Lot { lot_id: Uuid, previous: Option<Lot> },

    /// 單位成本變更前的物料
    UnitCost {
        key: ProductKey,
        previous: Option<Product>,
    },

    /// BOM 關係變更前的狀態
    Edge {
        key: EdgeKey,
        previous: Option<BomEdge>,
    },
}

/// 復原日誌
#[derive(Debug, Default)]
pub struct UndoJournal {
    entries: Vec<UndoEntry>,
    touched: HashSet<RowKey>,
}

impl UndoJournal {
    /// 創建新的日誌
    pub fn new() -> Self {
        Self::default()
    }

    /// 記錄變更並標記受影響的資料列
    pub fn record(&mut self, entry: UndoEntry, row: RowKey) {
        self.entries.push(entry);
        self.touched.insert(row);
    }

    /// 檢查資料列是否在此交易中被修改
    pub fn is_touched(&self, row: &RowKey) -> bool {
        self.touched.contains(row)
    }

    /// 獲取所有被修改的資料列
    pub fn touched_rows(&self) -> Vec<RowKey> {
        let mut rows: Vec<RowKey> = self.touched.iter().cloned().collect();
        rows.sort();
        rows
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 取出 `mark` 之後的變更，依相反順序返回
    pub fn take_since(&mut self, mark: usize) -> Vec<UndoEntry> {
        let mark = mark.min(self.entries.len());
        let mut undone: Vec<UndoEntry> = self.entries.drain(mark..).collect();
        undone.reverse();
        undone
    }

    /// 清除所有記錄（提交後）
    pub fn clear(&mut self) {
        self.entries.clear();
        self.touched.clear();
    }
}
