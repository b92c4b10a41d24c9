//! 庫位模型

use serde::{Deserialize, Serialize};

/// 庫位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// 租戶
    pub tenant_id: String,

    /// 庫位ID
    pub id: String,

    /// 名稱
    pub name: String,

    /// 是否為預設庫位
    pub is_default: bool,

    /// 是否為虛擬庫位
    pub is_virtual: bool,
}

impl Location {
    /// 創建新的庫位
    pub fn new(tenant_id: String, id: String) -> Self {
        Self {
            tenant_id,
            name: id.clone(),
            id,
            is_default: false,
            is_virtual: false,
        }
    }

    /// 建構器模式：設置名稱
    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }

    /// 建構器模式：設為預設庫位
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// 建構器模式：設為虛擬庫位
    pub fn as_virtual(mut self) -> Self {
        self.is_virtual = true;
        self
    }
}
