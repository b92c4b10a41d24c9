//! 引擎配置模型

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::StockError;

/// 效期警示門檻（天）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryThresholds {
    /// 剩餘天數小於等於此值為 CRITICAL
    pub critical_days: i64,

    /// 剩餘天數小於等於此值為 ATTENTION
    pub attention_days: i64,
}

impl Default for ExpiryThresholds {
    fn default() -> Self {
        Self {
            critical_days: 7,
            attention_days: 30,
        }
    }
}

/// 庫存引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// BOM 最大層級（循環檢查、成本傳遞、BOM 展開共用）
    pub max_bom_depth: usize,

    /// 單位成本寫入時保留的小數位數
    pub cost_decimal_places: u32,

    /// 等待資料列鎖的上限（毫秒）
    pub lock_timeout_ms: u64,

    /// 效期警示門檻
    pub expiry: ExpiryThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_bom_depth: 10,
            cost_decimal_places: 2,
            lock_timeout_ms: 5_000,
            expiry: ExpiryThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// 從 JSON 載入配置（缺少的欄位使用預設值）
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| StockError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 建構器模式：設置 BOM 最大層級
    pub fn with_max_bom_depth(mut self, depth: usize) -> Self {
        self.max_bom_depth = depth;
        self
    }

    /// 建構器模式：設置成本小數位數
    pub fn with_cost_decimal_places(mut self, places: u32) -> Self {
        self.cost_decimal_places = places;
        self
    }

    /// 建構器模式：設置鎖等待上限
    pub fn with_lock_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// 建構器模式：設置效期警示門檻
    pub fn with_expiry(mut self, expiry: ExpiryThresholds) -> Self {
        self.expiry = expiry;
        self
    }

    /// 檢查配置是否合理
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_bom_depth == 0 {
            return Err(StockError::Config("max_bom_depth 必須大於零".to_string()));
        }
        if self.expiry.critical_days > self.expiry.attention_days {
            return Err(StockError::Config(format!(
                "critical_days ({}) 不可大於 attention_days ({})",
                self.expiry.critical_days, self.expiry.attention_days
            )));
        }
        Ok(())
    }

    /// 將成本四捨五入到寫入精度
    pub fn round_cost(&self, cost: Decimal) -> Decimal {
        cost.round_dp_with_strategy(
            self.cost_decimal_places,
            RoundingStrategy::MidpointAwayFromZero,
        )
    }

    /// 鎖等待上限
    pub fn lock_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lock_timeout_ms)
    }
}
