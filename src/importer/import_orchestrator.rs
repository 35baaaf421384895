// ==========================================
// 表格数据导入系统 - 导入编排
// ==========================================
// 流程:
// - prepare: 校验目标 → (可选) 删除已有记录 → 保存文件 → 提取网格 → 构建字段目录
// - submit:  解码数据集 → 映射整理 → 钩子 → 持久化 → 通知
// - run:     prepare + submit
// 约定:
// - 导入前删除与导入本身不在同一事务内，删除失败只记录告警
// - 批次整体成功或整体失败，不报告行级部分成功
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::{
    FieldCatalog, Grid, ImportOutcome, ImportRequest, MappingSubmission, Severity, StoredFile,
    UploadOptions, UploadedFile,
};
use crate::i18n;
use crate::importer::dataset_decoder::import_rows;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_catalog::FieldCatalogBuilder;
use crate::importer::grid_extractor::GridExtractor;
use crate::importer::hook_dispatcher::{HookContext, HookDispatcher, ImportHook};
use crate::importer::mapping_reconciler::MappingReconciler;
use crate::repository::{FileStorage, NotificationSink, RecordRepository, SchemaRegistry};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 根容器 id
pub const ROOT_CONTAINER_ID: i64 = 0;

// ==========================================
// ImportSession - 一次导入会话（上传后、提交前）
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportSession {
    pub table: String,
    pub container_id: i64,
    pub stored_file: StoredFile,
    pub grid: Grid,
    pub catalog: FieldCatalog,
    /// 导入前删除的记录数
    pub deleted: usize,
}

// ==========================================
// ImportOrchestrator
// ==========================================
pub struct ImportOrchestrator {
    // 外部协作方
    registry: Arc<dyn SchemaRegistry>,
    storage: Arc<dyn FileStorage>,
    records: Arc<dyn RecordRepository>,
    notifications: Arc<dyn NotificationSink>,

    // 配置读取器
    config: Arc<dyn ImportConfigReader>,

    // 导入组件
    catalog_builder: FieldCatalogBuilder,
    hooks: HookDispatcher,
}

impl ImportOrchestrator {
    /// 创建新的 ImportOrchestrator 实例
    ///
    /// # 参数
    /// - registry: schema 元数据
    /// - storage: 上传文件存储
    /// - records: 持久化引擎
    /// - notifications: 用户通知
    /// - config: 配置读取器
    pub fn new(
        registry: Arc<dyn SchemaRegistry>,
        storage: Arc<dyn FileStorage>,
        records: Arc<dyn RecordRepository>,
        notifications: Arc<dyn NotificationSink>,
        config: Arc<dyn ImportConfigReader>,
    ) -> Self {
        Self {
            catalog_builder: FieldCatalogBuilder::new(registry.clone(), config.clone()),
            registry,
            storage,
            records,
            notifications,
            config,
            hooks: HookDispatcher::new(),
        }
    }

    /// 注册导入钩子（按注册顺序调用）
    pub fn with_hook(mut self, hook: Arc<dyn ImportHook>) -> Self {
        self.hooks.register(hook);
        self
    }

    pub fn catalog_builder(&self) -> &FieldCatalogBuilder {
        &self.catalog_builder
    }

    /// 上传阶段
    ///
    /// # 返回
    /// - Ok(ImportSession): 网格与字段目录，供操作员配置映射
    /// - Err: 目标无效 / 文件无法读取 / 存储失败（同时投递失败通知）
    pub fn prepare(
        &self,
        table: &str,
        container_id: i64,
        upload: &UploadedFile,
        options: &UploadOptions,
    ) -> ImportResult<ImportSession> {
        let result = self.prepare_inner(table, container_id, upload, options);
        self.report_failure(result)
    }

    /// 提交阶段
    pub fn submit(
        &self,
        session: &ImportSession,
        submission: &MappingSubmission,
    ) -> ImportResult<ImportOutcome> {
        let result = self.submit_inner(session, submission);
        self.report_failure(result)
    }

    /// 一次性导入
    ///
    /// # 参数
    /// - table: 目标表
    /// - container_id: 目标容器（根容器为 0）
    /// - upload: 上传文件
    /// - request: 上传参数 + 映射参数
    pub fn run(
        &self,
        table: &str,
        container_id: i64,
        upload: &UploadedFile,
        request: &ImportRequest,
    ) -> ImportResult<ImportOutcome> {
        let result = self
            .prepare_inner(table, container_id, upload, &request.upload)
            .and_then(|session| self.submit_inner(&session, &request.mapping));
        self.report_failure(result)
    }

    fn report_failure<T>(&self, result: ImportResult<T>) -> ImportResult<T> {
        if let Err(e) = &result {
            warn!(error = %e, "导入未完成");
            let reason = e.to_string();
            self.notifications.enqueue(
                Severity::Error,
                &i18n::t("import.not_completed_title"),
                &i18n::t_with_args("import.not_completed_message", &[("reason", reason.as_str())]),
            );
        }
        result
    }

    /// 校验导入目标
    fn validate_target(&self, table: &str, container_id: i64) -> ImportResult<()> {
        if table.trim().is_empty() {
            return Err(ImportError::InvalidTarget("目标表为空".to_string()));
        }
        if !self.registry.is_registered(table) {
            return Err(ImportError::InvalidTarget(format!("未注册的表: {}", table)));
        }
        let container_is_root = container_id == ROOT_CONTAINER_ID;
        if !self.catalog_builder.is_eligible(table, container_is_root)? {
            return Err(ImportError::InvalidTarget(format!(
                "表 {} 不允许在容器 {} 下导入",
                table, container_id
            )));
        }
        Ok(())
    }

    /// 删除目标容器下的已有记录（失败只告警）
    fn purge_existing(&self, table: &str, container_id: i64) -> usize {
        let result = self
            .records
            .query_identifiers(table, container_id)
            .and_then(|ids| self.records.delete(table, &ids));
        match result {
            Ok(deleted) => {
                info!(table, container_id, deleted, "导入前已删除已有记录");
                deleted
            }
            Err(e) => {
                warn!(table, container_id, error = %e, "导入前删除已有记录失败，继续导入");
                0
            }
        }
    }

    #[instrument(skip(self, upload, options), fields(file = %upload.name))]
    fn prepare_inner(
        &self,
        table: &str,
        container_id: i64,
        upload: &UploadedFile,
        options: &UploadOptions,
    ) -> ImportResult<ImportSession> {
        // === 步骤 1: 校验目标 ===
        self.validate_target(table, container_id)?;

        // === 步骤 2: 导入前删除 ===
        let deleted = if options.delete_existing {
            self.purge_existing(table, container_id)
        } else {
            0
        };

        // === 步骤 3: 保存文件 ===
        let policy = match options.duplication_behavior {
            Some(policy) => policy,
            None => self.config.duplication_behavior()?,
        };
        let stored_file = self.storage.store(&upload.bytes, &upload.name, policy)?;
        debug!(stored = %stored_file.identifier, "上传文件已保存");

        // === 步骤 4: 提取网格 ===
        let local_path = self.storage.local_path(&stored_file)?;
        let bytes = std::fs::read(&local_path)?;
        let extractor = GridExtractor::new()
            .with_column_extent_mode(self.config.column_extent_mode()?)
            .with_legacy_encoding_label(&self.config.legacy_encoding_label()?)?;
        let grid = extractor.extract_bytes(
            &bytes,
            &stored_file.identifier,
            upload.content_type.as_deref(),
            options.legacy_encoding,
        )?;

        // === 步骤 5: 构建字段目录 ===
        let catalog = self
            .catalog_builder
            .build(table, container_id == ROOT_CONTAINER_ID)?;

        info!(
            rows = grid.data_row_count(),
            cols = grid.cols,
            fields = catalog.fields.len(),
            deleted,
            "上传阶段完成"
        );

        Ok(ImportSession {
            table: table.to_string(),
            container_id,
            stored_file,
            grid,
            catalog,
            deleted,
        })
    }

    #[instrument(skip(self, session, submission), fields(table = %session.table))]
    fn submit_inner(
        &self,
        session: &ImportSession,
        submission: &MappingSubmission,
    ) -> ImportResult<ImportOutcome> {
        let table = session.table.as_str();

        // === 步骤 1: 解码数据集 ===
        let rows = import_rows(&session.grid, &submission.dataset);

        // === 步骤 2: 映射整理 ===
        // 敏感字段只取字段目录中声明的敏感字段；提交了字段名时取两者交集
        let declared = session.catalog.sensitive_fields();
        let password_fields: Vec<String> = if submission.password_fields.is_empty() {
            declared
        } else {
            let requested: Vec<&str> = submission.password_fields.iter().map(|f| f.trim()).collect();
            declared
                .into_iter()
                .filter(|f| requested.contains(&f.as_str()))
                .collect()
        };
        if password_fields.len() < submission.password_fields.len() {
            warn!(
                requested = ?submission.password_fields,
                accepted = ?password_fields,
                "忽略未声明为敏感字段的字段名"
            );
        }
        let submission = MappingSubmission {
            password_fields,
            ..submission.clone()
        };
        let submission = &submission;
        let reconciler = MappingReconciler::new(self.config.disallowed_fields()?);
        let batch = reconciler.reconcile(table, &rows, submission, session.container_id);
        let duplicate_keys = batch
            .table(table)
            .map(|t| t.duplicate_keys().to_vec())
            .unwrap_or_default();

        // === 步骤 3: 钩子 ===
        let context = HookContext {
            container_id: session.container_id,
            catalog: session.catalog.clone(),
            stored_file: Some(session.stored_file.clone()),
        };
        let batch = self.hooks.dispatch(batch, table, &context)?;

        // === 步骤 4: 持久化 ===
        let commit = self.records.commit(&batch)?;

        // === 步骤 5: 通知 ===
        self.notifications.enqueue(
            Severity::Ok,
            &i18n::t("import.completed_title"),
            &i18n::t_with_args(
                "import.completed_message",
                &[
                    ("table", table),
                    ("inserted", commit.inserted.to_string().as_str()),
                    ("updated", commit.updated.to_string().as_str()),
                ],
            ),
        );
        info!(
            operations = batch.len(),
            inserted = commit.inserted,
            updated = commit.updated,
            duplicates = duplicate_keys.len(),
            "导入完成"
        );

        Ok(ImportOutcome {
            table: table.to_string(),
            container_id: session.container_id,
            deleted: session.deleted,
            inserted: commit.inserted,
            updated: commit.updated,
            assigned_ids: commit.assigned_ids,
            duplicate_keys,
            stored_file: Some(session.stored_file.clone()),
        })
    }
}
