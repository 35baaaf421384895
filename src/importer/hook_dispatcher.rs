// ==========================================
// 表格数据导入系统 - 导入钩子
// ==========================================
// 职责: 在提交持久化前，按注册顺序调用扩展钩子改写操作批次
// 约定: 钩子失败即整次导入失败，不重试，批次不提交
// ==========================================

use crate::domain::{FieldCatalog, Operation, OperationBatch, StoredFile, PID_FIELD};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::mapping_reconciler::synthetic_key;
use anyhow::{bail, Context};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

/// 钩子调用上下文
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    /// 目标容器
    pub container_id: i64,
    /// 本次导入的字段目录
    pub catalog: FieldCatalog,
    /// 上传文件
    pub stored_file: Option<StoredFile>,
}

// ==========================================
// ImportHook Trait
// ==========================================
pub trait ImportHook: Send + Sync {
    /// 钩子名称（用于日志与错误信息）
    fn name(&self) -> &str;

    /// 改写批次（可新增、删除、修改操作）
    fn apply(
        &self,
        batch: &mut OperationBatch,
        schema: &str,
        context: &HookContext,
    ) -> anyhow::Result<()>;
}

// ==========================================
// HookDispatcher
// ==========================================
#[derive(Default, Clone)]
pub struct HookDispatcher {
    hooks: Vec<Arc<dyn ImportHook>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册钩子（按注册顺序调用）
    pub fn register(&mut self, hook: Arc<dyn ImportHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// 依次调用全部钩子
    ///
    /// # 返回
    /// - Ok(OperationBatch): 改写后的批次
    /// - Err(HookFailure): 任一钩子失败
    pub fn dispatch(
        &self,
        mut batch: OperationBatch,
        schema: &str,
        context: &HookContext,
    ) -> ImportResult<OperationBatch> {
        for hook in &self.hooks {
            debug!(hook = hook.name(), schema, "调用导入钩子");
            if let Err(e) = hook.apply(&mut batch, schema, context) {
                error!(hook = hook.name(), schema, error = %format!("{:#}", e), "导入钩子执行失败");
                return Err(ImportError::HookFailure {
                    hook: hook.name().to_string(),
                    message: format!("{:#}", e),
                });
            }
        }
        Ok(batch)
    }
}

// ==========================================
// RelationInjectionHook - 关联记录注入
// ==========================================
// 把主记录中逗号分隔的关联 id 拆成中间表记录:
//   uid_local = 主记录 key, uid_foreign = 关联 id, sorting = 位置（从 1 开始）
// 主记录中的源字段会被移除
pub struct RelationInjectionHook {
    schema: String,
    source_field: String,
    junction_table: String,
}

impl RelationInjectionHook {
    pub fn new(
        schema: impl Into<String>,
        source_field: impl Into<String>,
        junction_table: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            source_field: source_field.into(),
            junction_table: junction_table.into(),
        }
    }
}

impl ImportHook for RelationInjectionHook {
    fn name(&self) -> &str {
        "relation_injection"
    }

    fn apply(
        &self,
        batch: &mut OperationBatch,
        schema: &str,
        context: &HookContext,
    ) -> anyhow::Result<()> {
        if schema != self.schema {
            return Ok(());
        }

        let pending: Vec<(String, String, Option<String>)> = match batch.table(schema) {
            Some(table) => table
                .operations()
                .iter()
                .filter_map(|op| {
                    op.field(&self.source_field).map(|value| {
                        (
                            op.key.clone(),
                            value.to_string(),
                            op.field(PID_FIELD).map(str::to_string),
                        )
                    })
                })
                .collect(),
            None => return Ok(()),
        };

        let mut relations = Vec::new();
        for (key, raw, pid) in pending {
            if let Some(fields) = batch.table_mut(schema).get_mut(&key) {
                fields.remove(&self.source_field);
            }

            let ids = raw.split(',').map(str::trim).filter(|s| !s.is_empty());
            for (position, id) in ids.enumerate() {
                let foreign: i64 = id
                    .parse()
                    .with_context(|| format!("记录 {} 的关联 id 不是整数: {}", key, id))?;
                if foreign <= 0 {
                    bail!("记录 {} 的关联 id 必须为正数: {}", key, foreign);
                }

                let mut fields = BTreeMap::new();
                fields.insert("uid_local".to_string(), key.clone());
                fields.insert("uid_foreign".to_string(), foreign.to_string());
                fields.insert("sorting".to_string(), (position + 1).to_string());
                fields.insert(
                    PID_FIELD.to_string(),
                    pid.clone().unwrap_or_else(|| context.container_id.to_string()),
                );
                relations.push(Operation::insert(synthetic_key(), fields));
            }
        }

        debug!(
            junction_table = %self.junction_table,
            relations = relations.len(),
            "关联记录注入完成"
        );
        if !relations.is_empty() {
            let junction = batch.table_mut(&self.junction_table);
            for relation in relations {
                junction.upsert(relation);
            }
        }
        Ok(())
    }
}
