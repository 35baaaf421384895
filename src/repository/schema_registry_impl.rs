// ==========================================
// 表格数据导入系统 - 静态 Schema 元数据实现
// ==========================================
// 职责: 以代码或 JSON 文件声明 schema，供字段目录构建使用
// 本地化: 以 "i18n:" 开头的标签通过 rust-i18n 翻译，其余标签不做解析
// ==========================================

use crate::domain::{RootLevel, SchemaColumn};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::schema_registry::SchemaRegistry;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 本地化标签前缀
pub const I18N_LABEL_PREFIX: &str = "i18n:";

// ==========================================
// SchemaDefinition - 单个 schema 声明
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub root_level: RootLevel,
    #[serde(default)]
    pub columns: Vec<SchemaColumn>,
}

impl SchemaDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            root_level: RootLevel::default(),
            columns: Vec::new(),
        }
    }

    pub fn root_level(mut self, root_level: RootLevel) -> Self {
        self.root_level = root_level;
        self
    }

    pub fn column(mut self, column: SchemaColumn) -> Self {
        self.columns.push(column);
        self
    }
}

// ==========================================
// StaticSchemaRegistry
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaRegistry {
    schemas: Vec<SchemaDefinition>,
}

impl StaticSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 schema（同名覆盖）
    pub fn register(mut self, definition: SchemaDefinition) -> Self {
        match self.schemas.iter().position(|s| s.name == definition.name) {
            Some(pos) => self.schemas[pos] = definition,
            None => self.schemas.push(definition),
        }
        self
    }

    /// 从 JSON 字符串加载（数组形式）
    pub fn from_json_str(json: &str) -> RepositoryResult<Self> {
        let definitions: Vec<SchemaDefinition> = serde_json::from_str(json)
            .map_err(|e| RepositoryError::InternalError(format!("Schema 定义解析失败: {}", e)))?;
        Ok(definitions
            .into_iter()
            .fold(Self::new(), |registry, def| registry.register(def)))
    }

    /// 从 JSON 文件加载
    pub fn from_path<P: AsRef<Path>>(path: P) -> RepositoryResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    fn definition(&self, schema: &str) -> RepositoryResult<&SchemaDefinition> {
        self.schemas
            .iter()
            .find(|s| s.name == schema)
            .ok_or_else(|| RepositoryError::SchemaNotFound(schema.to_string()))
    }
}

impl SchemaRegistry for StaticSchemaRegistry {
    fn schema_names(&self) -> Vec<String> {
        self.schemas.iter().map(|s| s.name.clone()).collect()
    }

    fn is_registered(&self, schema: &str) -> bool {
        self.schemas.iter().any(|s| s.name == schema)
    }

    fn schema_label(&self, schema: &str) -> RepositoryResult<String> {
        Ok(self.definition(schema)?.label.clone())
    }

    fn list_fields(&self, schema: &str) -> RepositoryResult<Vec<SchemaColumn>> {
        Ok(self.definition(schema)?.columns.clone())
    }

    fn root_level_constraint(&self, schema: &str) -> RepositoryResult<RootLevel> {
        Ok(self.definition(schema)?.root_level)
    }

    fn localize(&self, label_key: &str) -> String {
        match label_key.strip_prefix(I18N_LABEL_PREFIX) {
            Some(key) => crate::i18n::try_t(key).unwrap_or_default(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMAS_JSON: &str = r#"[
        {
            "name": "fe_users",
            "label": "Website users",
            "root_level": "non_root_only",
            "columns": [
                {"name": "username", "label": "Username", "eval": ["trim", "required"]},
                {"name": "password", "label": "Password", "eval": ["password"]}
            ]
        },
        {"name": "sys_category", "label": "Category", "root_level": "any"}
    ]"#;

    #[test]
    fn test_from_json_str() {
        let registry = StaticSchemaRegistry::from_json_str(SCHEMAS_JSON).unwrap();
        assert_eq!(registry.schema_names(), vec!["fe_users", "sys_category"]);
        assert!(registry.is_registered("fe_users"));
        assert!(!registry.is_registered("be_users"));

        let fields = registry.list_fields("fe_users").unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields[1].is_sensitive());
        assert_eq!(
            registry.root_level_constraint("sys_category").unwrap(),
            RootLevel::Any
        );
    }

    #[test]
    fn test_unknown_schema() {
        let registry = StaticSchemaRegistry::new();
        assert!(matches!(
            registry.list_fields("nope"),
            Err(RepositoryError::SchemaNotFound(_))
        ));
    }

    #[test]
    fn test_localize_plain_label_is_empty() {
        let registry = StaticSchemaRegistry::new();
        assert_eq!(registry.localize("Plain label"), "");
        assert_eq!(registry.localize("i18n:no.such.key.anywhere"), "");
    }

    #[test]
    fn test_register_replaces_same_name() {
        let registry = StaticSchemaRegistry::new()
            .register(SchemaDefinition::new("t", "first"))
            .register(SchemaDefinition::new("t", "second"));
        assert_eq!(registry.schema_names().len(), 1);
        assert_eq!(registry.schema_label("t").unwrap(), "second");
    }
}
