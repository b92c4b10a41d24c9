//! 餘額稽核
//!
//! 以異動記錄重新加總，核對餘額與批號數量。

use std::collections::HashMap;

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stock_core::BalanceKey;
use stock_store::{InventoryStore, TenantSnapshot};
use uuid::Uuid;

/// 稽核結果嚴重度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FindingSeverity {
    Warning,
    Error,
}

/// 稽核發現
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuditFinding {
    /// 對象（餘額鍵或批號代碼）
    pub subject: String,
    pub message: String,
    pub severity: FindingSeverity,
}

impl AuditFinding {
    pub fn new(subject: String, message: String, severity: FindingSeverity) -> Self {
        Self {
            subject,
            message,
            severity,
        }
    }

    pub fn warning(subject: String, message: String) -> Self {
        Self::new(subject, message, FindingSeverity::Warning)
    }

    pub fn error(subject: String, message: String) -> Self {
        Self::new(subject, message, FindingSeverity::Error)
    }
}

/// 餘額稽核器
pub struct BalanceAuditor<'a> {
    store: &'a InventoryStore,
}

impl<'a> BalanceAuditor<'a> {
    pub fn new(store: &'a InventoryStore) -> Self {
        Self { store }
    }

    /// 稽核租戶的所有餘額與批號
    pub fn audit(&self, tenant_id: &str) -> Vec<AuditFinding> {
        let TenantSnapshot {
            movements,
            balances,
            lots,
        } = self.store.snapshot(tenant_id);

        let mut by_key: HashMap<BalanceKey, Decimal> = HashMap::new();
        let mut by_lot: HashMap<Uuid, Decimal> = HashMap::new();
        for movement in &movements {
            *by_key.entry(movement.balance_key()).or_default() += movement.signed_quantity();
            if let Some(lot_id) = movement.lot_id {
                *by_lot.entry(lot_id).or_default() += movement.signed_quantity();
            }
        }

        let mut findings: Vec<AuditFinding> = balances
            .par_iter()
            .flat_map_iter(|balance| {
                let expected = by_key.get(&balance.key).copied().unwrap_or_default();
                let mut found = Vec::new();
                if balance.quantity != expected {
                    found.push(AuditFinding::error(
                        balance.key.to_string(),
                        format!("餘額 {} 與異動加總 {} 不符", balance.quantity, expected),
                    ));
                }
                if balance.quantity < Decimal::ZERO {
                    found.push(AuditFinding::error(
                        balance.key.to_string(),
                        format!("餘額為負: {}", balance.quantity),
                    ));
                }
                found
            })
            .collect();

        // 有異動卻沒有餘額列
        findings.extend(
            by_key
                .par_iter()
                .filter(|(key, _)| !balances.iter().any(|b| &b.key == *key))
                .map(|(key, sum)| {
                    AuditFinding::error(key.to_string(), format!("缺少餘額列，異動加總 {}", sum))
                })
                .collect::<Vec<_>>(),
        );

        findings.extend(
            lots.par_iter()
                .filter_map(|lot| {
                    let expected = by_lot.get(&lot.id).copied().unwrap_or_default();
                    (lot.current_quantity != expected).then(|| {
                        AuditFinding::warning(
                            format!("{} {}", lot.balance_key(), lot.lot_code),
                            format!("批號數量 {} 與異動加總 {} 不符", lot.current_quantity, expected),
                        )
                    })
                })
                .collect::<Vec<_>>(),
        );

        findings.sort();
        tracing::info!(
            "稽核 {}：{} 個餘額，{} 個批號，{} 項發現",
            tenant_id,
            balances.len(),
            lots.len(),
            findings.len()
        );
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use crate::{BasketLine, Ledger, LotAllocator, LotReceipt, WithdrawalOrchestrator};
    use chrono::NaiveDate;
    use stock_core::{MovementRequest, MovementType};
    use stock_store::RowKey;

    #[test]
    fn test_clean_ledger_has_no_findings() {
        let store = burger_store();
        let ledger = Ledger::new(&store);
        let allocator = LotAllocator::new(&store);

        ledger
            .append_movement(
                TENANT,
                MovementRequest::new(
                    "BUN".to_string(),
                    KITCHEN.to_string(),
                    MovementType::Entry,
                    Decimal::from(10),
                    "PO-1".to_string(),
                ),
            )
            .unwrap();
        ledger
            .transfer(TENANT, "BUN", KITCHEN, BAR, Decimal::from(3), Decimal::ONE, "TR-1")
            .unwrap();
        allocator
            .receive_lot(
                TENANT,
                LotReceipt::new(
                    "PATTY",
                    KITCHEN,
                    "L1",
                    Decimal::from(4),
                    NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
                ),
            )
            .unwrap();
        WithdrawalOrchestrator::new(&store)
            .withdraw(TENANT, &[BasketLine::new("PATTY", Decimal::from(3))], KITCHEN, true, "SALE-1")
            .unwrap();

        let findings = BalanceAuditor::new(&store).audit(TENANT);
        assert!(findings.is_empty(), "{:?}", findings);
    }

    #[test]
    fn test_detects_lot_drift() {
        let store = burger_store();
        let (lot, _) = LotAllocator::new(&store)
            .receive_lot(
                TENANT,
                LotReceipt::new(
                    "PATTY",
                    KITCHEN,
                    "L1",
                    Decimal::from(4),
                    NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
                ),
            )
            .unwrap();

        // 繞過分配器直接改寫批號數量
        let mut uow = store.begin();
        uow.lock(RowKey::Lots(lot.balance_key())).unwrap();
        let mut drifted = lot.clone();
        drifted.current_quantity = Decimal::from(9);
        uow.put_lot(drifted).unwrap();
        uow.commit();

        let findings = BalanceAuditor::new(&store).audit(TENANT);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, FindingSeverity::Warning);
        assert!(findings[0].subject.ends_with("L1"));
    }

    #[test]
    fn test_audit_during_concurrent_commits() {
        let store = burger_store();
        let ledger = Ledger::new(&store);

        std::thread::scope(|scope| {
            let writer = scope.spawn(|| {
                for i in 0..200 {
                    let movement_type = if i % 3 == 2 {
                        MovementType::Exit
                    } else {
                        MovementType::Entry
                    };
                    ledger
                        .append_movement(
                            TENANT,
                            MovementRequest::new(
                                "BUN".to_string(),
                                KITCHEN.to_string(),
                                movement_type,
                                Decimal::ONE,
                                format!("DOC-{}", i),
                            ),
                        )
                        .unwrap();
                }
            });

            let auditor = BalanceAuditor::new(&store);
            while !writer.is_finished() {
                let findings = auditor.audit(TENANT);
                assert!(findings.is_empty(), "{:?}", findings);
            }
            writer.join().unwrap();
        });

        assert!(BalanceAuditor::new(&store).audit(TENANT).is_empty());
    }

    #[test]
    fn test_empty_tenant() {
        let store = burger_store();
        assert!(BalanceAuditor::new(&store).audit("T2").is_empty());
    }

    #[test]
    fn test_severity_ordering() {
        let mut findings = vec![
            AuditFinding::error("b".to_string(), "x".to_string()),
            AuditFinding::warning("a".to_string(), "y".to_string()),
        ];
        findings.sort();
        assert_eq!(findings[0].subject, "a");
        assert!(FindingSeverity::Error > FindingSeverity::Warning);
    }
}
