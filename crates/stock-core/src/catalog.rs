//! 物料目錄圖（唯讀視角）

use crate::product::{BomEdge, Product};

/// 物料目錄圖
///
/// 引擎只讀取物料與 BOM 關係；目錄維護屬於外部協作者。
pub trait CatalogGraph {
    /// 取得物料
    fn get_product(&self, tenant_id: &str, product_id: &str) -> crate::Result<Product>;

    /// 列出父件的直接子件關係
    fn list_components(&self, tenant_id: &str, parent_id: &str) -> Vec<BomEdge>;

    /// 反向索引：列出直接使用此子件的父件
    fn list_parents_using(&self, tenant_id: &str, component_id: &str) -> Vec<Product>;
}
