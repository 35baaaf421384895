// ==========================================
// 表格数据导入系统 - Schema 元数据 Trait
// ==========================================
// 职责: 定义宿主系统 schema 元数据的读取接口（不包含实现）
// 红线: 导入核心不假设任何固定字段，只依赖本接口
// ==========================================

use crate::domain::{RootLevel, SchemaColumn};
use crate::repository::error::RepositoryResult;

// ==========================================
// SchemaRegistry Trait
// ==========================================
// 用途: 列字段、查根级约束、解析本地化标签
// 实现者: StaticSchemaRegistry（内存/JSON 定义）
pub trait SchemaRegistry: Send + Sync {
    /// 已注册的 schema 名称（保持注册顺序）
    fn schema_names(&self) -> Vec<String>;

    /// schema 是否已注册
    fn is_registered(&self, schema: &str) -> bool {
        self.schema_names().iter().any(|name| name == schema)
    }

    /// schema 的标签（可能是本地化 key）
    ///
    /// # 返回
    /// - Err(SchemaNotFound): schema 未注册
    fn schema_label(&self, schema: &str) -> RepositoryResult<String>;

    /// schema 声明的列（保持声明顺序）
    ///
    /// # 返回
    /// - Err(SchemaNotFound): schema 未注册
    fn list_fields(&self, schema: &str) -> RepositoryResult<Vec<SchemaColumn>>;

    /// schema 的根级放置约束
    ///
    /// # 返回
    /// - Err(SchemaNotFound): schema 未注册
    fn root_level_constraint(&self, schema: &str) -> RepositoryResult<RootLevel>;

    /// 解析本地化标签
    ///
    /// # 返回
    /// - 解析结果；无法解析时返回空字符串
    fn localize(&self, label_key: &str) -> String;
}
