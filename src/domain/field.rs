// ==========================================
// 表格数据导入系统 - 字段目录
// ==========================================
// 职责: 描述 schema 声明的列，以及可供映射的字段目录
// ==========================================

use serde::{Deserialize, Serialize};

/// 主键字段名（合成）
pub const UID_FIELD: &str = "uid";

/// 父容器字段名（合成）
pub const PID_FIELD: &str = "pid";

// ==========================================
// SchemaColumn - schema 声明的原始列
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// 字段标识
    pub name: String,
    /// 标签（可能是本地化 key，也可能是原文）
    #[serde(default)]
    pub label: String,
    /// 校验规则（如 "trim", "required", "password"）
    #[serde(default, alias = "eval")]
    pub validation_rules: Vec<String>,
}

impl SchemaColumn {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            validation_rules: Vec::new(),
        }
    }

    /// 追加校验规则
    pub fn with_rules(mut self, rules: &[&str]) -> Self {
        self.validation_rules
            .extend(rules.iter().map(|r| r.trim().to_string()));
        self
    }

    /// 是否声明了密码/密钥类校验（敏感字段）
    pub fn is_sensitive(&self) -> bool {
        self.validation_rules.iter().any(|rule| {
            let rule = rule.trim();
            rule.eq_ignore_ascii_case("password") || rule.eq_ignore_ascii_case("secret")
        })
    }
}

// ==========================================
// FieldDescriptor - 可映射字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub is_sensitive: bool,
}

// ==========================================
// FieldCatalog - 字段目录
// ==========================================
// 每次导入会话按 schema 构建一次，之后只读
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCatalog {
    pub schema: String,
    pub fields: Vec<FieldDescriptor>,
}

impl FieldCatalog {
    /// 空目录（schema 已注册但被策略屏蔽）
    pub fn empty(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            fields: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 字段名列表（保持顺序）
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// 是否包含敏感字段
    pub fn has_sensitive_field(&self) -> bool {
        self.fields.iter().any(|f| f.is_sensitive)
    }

    /// 敏感字段名列表（保持顺序）
    pub fn sensitive_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.is_sensitive)
            .map(|f| f.name.clone())
            .collect()
    }
}
