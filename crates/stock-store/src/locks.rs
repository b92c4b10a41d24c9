//! 資料列鎖
//!
//! 以鍵值（租戶, 物料, 庫位）為單位的排他鎖，持有到交易單元結束。
//! 同一交易單元重複取得同一把鎖不會阻塞。

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use stock_core::{BalanceKey, StockError};

/// 可上鎖的資料列
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    /// 租戶的 BOM 結構（新增關係時序列化循環檢查）
    Catalog(String),
    /// 物料列（單位成本、BOM 關係）
    Product {
        tenant_id: String,
        product_id: String,
    },
    /// 某物料於某庫位的所有批號
    Lots(BalanceKey),
    /// 餘額列
    Balance(BalanceKey),
}

impl RowKey {
    pub fn product(tenant_id: &str, product_id: &str) -> Self {
        RowKey::Product {
            tenant_id: tenant_id.to_string(),
            product_id: product_id.to_string(),
        }
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowKey::Catalog(tenant_id) => write!(f, "catalog {}", tenant_id),
            RowKey::Product {
                tenant_id,
                product_id,
            } => write!(f, "product {}/{}", tenant_id, product_id),
            RowKey::Lots(key) => write!(f, "lots {}", key),
            RowKey::Balance(key) => write!(f, "balance {}", key),
        }
    }
}

/// 鎖管理器
#[derive(Debug, Default)]
pub struct LockManager {
    owners: Mutex<HashMap<RowKey, u64>>,
    released: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得排他鎖，逾時返回 `LockTimeout`
    pub fn acquire(&self, key: &RowKey, owner: u64, timeout: Duration) -> stock_core::Result<()> {
        let deadline = Instant::now() + timeout;
        let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            match owners.get(key) {
                None => {
                    owners.insert(key.clone(), owner);
                    return Ok(());
                }
                Some(&holder) if holder == owner => return Ok(()),
                Some(&holder) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::warn!("等待 {} 逾時（持有者 {}）", key, holder);
                        return Err(StockError::LockTimeout(key.to_string()));
                    }
                    tracing::debug!("交易 {} 等待 {}（持有者 {}）", owner, key, holder);
                    let (guard, _) = self
                        .released
                        .wait_timeout(owners, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    owners = guard;
                }
            }
        }
    }

    /// 釋放指定擁有者的鎖
    pub fn release(&self, keys: &[RowKey], owner: u64) {
        if keys.is_empty() {
            return;
        }
        let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            if owners.get(key) == Some(&owner) {
                owners.remove(key);
            }
        }
        drop(owners);
        self.released.notify_all();
    }

    /// 目前持有者
    pub fn holder(&self, key: &RowKey) -> Option<u64> {
        self.owners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn balance_key() -> RowKey {
        RowKey::Balance(BalanceKey::new(
            "T1".to_string(),
            "BUN".to_string(),
            "WH-01".to_string(),
        ))
    }

    #[test]
    fn test_reentrant_acquire() {
        let locks = LockManager::new();
        let key = balance_key();
        locks.acquire(&key, 1, Duration::from_millis(10)).unwrap();
        locks.acquire(&key, 1, Duration::from_millis(10)).unwrap();
        assert_eq!(locks.holder(&key), Some(1));

        locks.release(&[key.clone()], 1);
        assert_eq!(locks.holder(&key), None);
    }

    #[test]
    fn test_contention_times_out() {
        let locks = LockManager::new();
        let key = balance_key();
        locks.acquire(&key, 1, Duration::from_millis(10)).unwrap();

        let err = locks.acquire(&key, 2, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, StockError::LockTimeout(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_release_wakes_waiter() {
        let locks = Arc::new(LockManager::new());
        let key = balance_key();
        locks.acquire(&key, 1, Duration::from_millis(10)).unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            let key = key.clone();
            std::thread::spawn(move || locks.acquire(&key, 2, Duration::from_secs(5)))
        };

        std::thread::sleep(Duration::from_millis(20));
        locks.release(&[key.clone()], 1);

        assert!(waiter.join().unwrap().is_ok());
        assert_eq!(locks.holder(&key), Some(2));
    }

    #[test]
    fn test_release_ignores_foreign_owner() {
        let locks = LockManager::new();
        let key = balance_key();
        locks.acquire(&key, 1, Duration::from_millis(10)).unwrap();
        locks.release(&[key.clone()], 2);
        assert_eq!(locks.holder(&key), Some(1));
    }
}
