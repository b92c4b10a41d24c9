//! # Stock Store
//!
//! 帳本資料表、資料列鎖與交易單元（含復原日誌）

pub mod journal;
pub mod locks;
pub mod store;
mod tables;
pub mod unit_of_work;

// Re-export 主要類型
pub use journal::{ProductKey, UndoEntry, UndoJournal};
pub use locks::{LockManager, RowKey};
pub use store::{InventoryStore, TenantSnapshot};
pub use unit_of_work::{Savepoint, UnitOfWork};
