// ==========================================
// 表格数据导入系统 - 字段目录构建
// ==========================================
// 职责: 按 schema 构建可供映射的字段目录
// 规则:
// - schema 未注册 → UnknownSchema；已注册但被策略屏蔽 → 空目录
// - 始终在最前面放置合成的 uid / pid 字段
// - 剔除审计/流程字段（配置的禁止字段列表）
// - 标签: 本地化结果 → 原始标签 → [字段名]
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::{FieldCatalog, FieldDescriptor, PID_FIELD, UID_FIELD};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::SchemaRegistry;
use std::sync::Arc;
use tracing::{debug, instrument};

/// 合成 uid 字段的标签 key
const UID_LABEL_KEY: &str = "i18n:field.uid";
/// 合成 pid 字段的标签 key
const PID_LABEL_KEY: &str = "i18n:field.pid";

pub struct FieldCatalogBuilder {
    registry: Arc<dyn SchemaRegistry>,
    config: Arc<dyn ImportConfigReader>,
}

impl FieldCatalogBuilder {
    pub fn new(registry: Arc<dyn SchemaRegistry>, config: Arc<dyn ImportConfigReader>) -> Self {
        Self { registry, config }
    }

    /// 判断 schema 是否可在目标容器下导入
    ///
    /// # 返回
    /// - Err(UnknownSchema): schema 未注册
    pub fn is_eligible(&self, schema: &str, container_is_root: bool) -> ImportResult<bool> {
        if !self.registry.is_registered(schema) {
            return Err(ImportError::UnknownSchema(schema.to_string()));
        }

        let allowed = self.config.allowed_schemas()?;
        if !allowed.is_empty() && !allowed.iter().any(|s| s == schema) {
            return Ok(false);
        }
        if self.config.disallowed_schemas()?.iter().any(|s| s == schema) {
            return Ok(false);
        }

        let root_level = self.registry.root_level_constraint(schema)?;
        Ok(root_level.permits(container_is_root))
    }

    /// 构建字段目录
    ///
    /// # 参数
    /// - schema: 目标表名
    /// - container_is_root: 目标容器是否为根容器
    ///
    /// # 返回
    /// - Ok(FieldCatalog): 字段目录（被策略屏蔽时为空目录）
    /// - Err(UnknownSchema): schema 未注册
    #[instrument(skip(self))]
    pub fn build(&self, schema: &str, container_is_root: bool) -> ImportResult<FieldCatalog> {
        if !self.is_eligible(schema, container_is_root)? {
            debug!("schema 被策略屏蔽，返回空字段目录");
            return Ok(FieldCatalog::empty(schema));
        }

        let disallowed = self.config.disallowed_fields()?;
        let mut fields = vec![
            FieldDescriptor {
                name: UID_FIELD.to_string(),
                label: self.resolve_label(UID_FIELD, UID_LABEL_KEY),
                is_sensitive: false,
            },
            FieldDescriptor {
                name: PID_FIELD.to_string(),
                label: self.resolve_label(PID_FIELD, PID_LABEL_KEY),
                is_sensitive: false,
            },
        ];

        for column in self.registry.list_fields(schema)? {
            if column.name.is_empty()
                || column.name == UID_FIELD
                || column.name == PID_FIELD
                || disallowed.iter().any(|f| *f == column.name)
                || fields.iter().any(|f| f.name == column.name)
            {
                continue;
            }
            fields.push(FieldDescriptor {
                label: self.resolve_label(&column.name, &column.label),
                is_sensitive: column.is_sensitive(),
                name: column.name,
            });
        }

        debug!(fields = fields.len(), "字段目录构建完成");
        Ok(FieldCatalog {
            schema: schema.to_string(),
            fields,
        })
    }

    /// 列出可导入的 schema（名称, 标签）
    ///
    /// 候选为配置的允许列表（为空时取全部已注册 schema），保持候选顺序
    pub fn eligible_schemas(&self, container_is_root: bool) -> ImportResult<Vec<(String, String)>> {
        let allowed = self.config.allowed_schemas()?;
        let candidates = if allowed.is_empty() {
            self.registry.schema_names()
        } else {
            allowed
        };

        let mut result = Vec::new();
        for schema in candidates {
            if !self.registry.is_registered(&schema) {
                continue;
            }
            if self.is_eligible(&schema, container_is_root)? {
                let raw_label = self.registry.schema_label(&schema)?;
                let localized = self.registry.localize(&raw_label);
                let label = if !localized.is_empty() {
                    localized
                } else if !raw_label.is_empty() {
                    raw_label
                } else {
                    schema.clone()
                };
                result.push((schema, label));
            }
        }
        Ok(result)
    }

    fn resolve_label(&self, name: &str, raw_label: &str) -> String {
        let localized = self.registry.localize(raw_label);
        if !localized.is_empty() {
            localized
        } else if !raw_label.is_empty() {
            raw_label.to_string()
        } else {
            format!("[{}]", name)
        }
    }
}
