//! 物料與 BOM 關係模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 物料類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductKind {
    /// 葉節點（採購品或不需組裝的物料）
    Leaf,
    /// 組合品（由其他物料組成）
    Composite,
}

/// 物料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// 租戶
    pub tenant_id: String,

    /// 物料ID
    pub id: String,

    /// 名稱
    pub name: String,

    /// 物料類型
    pub kind: ProductKind,

    /// 單位成本（只由成本計算器寫入）
    pub unit_cost: Decimal,

    /// 單位售價
    pub unit_sale_price: Decimal,

    /// 是否啟用
    pub active: bool,
}

impl Product {
    /// 創建新的物料
    pub fn new(tenant_id: String, id: String, kind: ProductKind) -> Self {
        Self {
            tenant_id,
            name: id.clone(),
            id,
            kind,
            unit_cost: Decimal::ZERO,
            unit_sale_price: Decimal::ZERO,
            active: true,
        }
    }

    /// 建構器模式：設置名稱
    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    /// 建構器模式：設置單位成本
    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = unit_cost.max(Decimal::ZERO);
        self
    }

    /// 建構器模式：設置單位售價
    pub fn with_unit_sale_price(mut self, price: Decimal) -> Self {
        self.unit_sale_price = price.max(Decimal::ZERO);
        self
    }

    /// 建構器模式：設置啟用狀態
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// 檢查是否為組合品
    pub fn is_composite(&self) -> bool {
        self.kind == ProductKind::Composite
    }

    /// 單位毛利（售價 - 成本）
    pub fn unit_margin(&self) -> Decimal {
        self.unit_sale_price - self.unit_cost
    }
}

/// BOM 關係（父件 → 子件）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomEdge {
    /// 租戶
    pub tenant_id: String,

    /// 父件ID
    pub parent_id: String,

    /// 子件ID
    pub component_id: String,

    /// 單位用量（每個父件所需子件數量）
    pub quantity_per_unit: Decimal,

    /// 固定成本覆寫（存在時取代計算出的子件成本）
    pub fixed_cost_override: Option<Decimal>,
}

impl BomEdge {
    /// 創建新的 BOM 關係
    pub fn new(
        tenant_id: String,
        parent_id: String,
        component_id: String,
        quantity_per_unit: Decimal,
    ) -> Self {
        Self {
            tenant_id,
            parent_id,
            component_id,
            quantity_per_unit,
            fixed_cost_override: None,
        }
    }

    /// 建構器模式：設置固定成本覆寫
    pub fn with_fixed_cost_override(mut self, cost: Decimal) -> Self {
        self.fixed_cost_override = Some(cost);
        self
    }

    /// 此關係對父件成本的貢獻
    pub fn line_cost(&self, component_unit_cost: Decimal) -> Decimal {
        self.fixed_cost_override
            .unwrap_or(component_unit_cost * self.quantity_per_unit)
    }

    /// 展開數量（父件數量 × 單位用量）
    pub fn explode(&self, parent_quantity: Decimal) -> Decimal {
        parent_quantity * self.quantity_per_unit
    }
}
