// ==========================================
// 表格数据导入API
// ==========================================
// 职责: 面向操作界面的两步导入接口
// - upload: 保存文件并返回网格预览与字段目录（会话保存在内存中）
// - submit: 按会话提交列映射，写入目标表
// - import_file: 一次性导入
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{
    FieldDescriptor, ImportOutcome, ImportRequest, MappingSubmission, UploadOptions, UploadedFile,
};
use crate::importer::{ImportOrchestrator, ImportSession};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

/// 预览最多返回的数据行数
pub const PREVIEW_ROW_LIMIT: usize = 20;

/// 可导入的表
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableOption {
    pub name: String,
    pub label: String,
}

/// 上传阶段响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    /// 会话ID（提交时回传）
    pub session_id: String,
    pub table: String,
    pub container_id: i64,
    /// 存储后的文件名
    pub stored_file: String,
    /// 网格行数（含表头行）
    pub rows: usize,
    /// 网格列数
    pub cols: usize,
    pub header: Vec<String>,
    /// 前若干数据行
    pub preview: Vec<Vec<String>>,
    pub fields: Vec<FieldDescriptor>,
    pub has_sensitive_field: bool,
    pub sensitive_fields: Vec<String>,
    /// 导入前删除的记录数
    pub deleted: usize,
}

/// 提交阶段响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    #[serde(flatten)]
    pub outcome: ImportOutcome,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
}

// ==========================================
// ImportApi
// ==========================================
pub struct ImportApi {
    orchestrator: Arc<ImportOrchestrator>,
    sessions: Mutex<HashMap<String, ImportSession>>,
}

impl ImportApi {
    pub fn new(orchestrator: Arc<ImportOrchestrator>) -> Self {
        Self {
            orchestrator,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 列出指定容器下可导入的表
    pub fn list_tables(&self, container_id: i64) -> ApiResult<Vec<TableOption>> {
        let container_is_root = container_id == crate::importer::ROOT_CONTAINER_ID;
        let tables = self
            .orchestrator
            .catalog_builder()
            .eligible_schemas(container_is_root)?
            .into_iter()
            .map(|(name, label)| TableOption { name, label })
            .collect();
        Ok(tables)
    }

    /// 查询目标表的字段目录
    pub fn field_catalog(&self, table: &str, container_id: i64) -> ApiResult<Vec<FieldDescriptor>> {
        let container_is_root = container_id == crate::importer::ROOT_CONTAINER_ID;
        let catalog = self
            .orchestrator
            .catalog_builder()
            .build(table, container_is_root)?;
        Ok(catalog.fields)
    }

    /// 上传文件
    ///
    /// # 参数
    /// - table: 目标表
    /// - container_id: 目标容器
    /// - file_name: 上传文件名
    /// - content_type: 类型提示（可选）
    /// - bytes: 文件内容
    /// - options: 上传参数
    ///
    /// # 返回
    /// - Ok(SessionView): 网格预览与字段目录
    /// - Err(ApiError::ImportNotCompleted): 目标无效 / 文件无法读取
    #[instrument(skip(self, bytes, options), fields(size = bytes.len()))]
    pub fn upload(
        &self,
        table: &str,
        container_id: i64,
        file_name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> ApiResult<SessionView> {
        let mut upload = UploadedFile::new(file_name, bytes);
        if let Some(content_type) = content_type {
            upload = upload.with_content_type(content_type);
        }

        let session = self
            .orchestrator
            .prepare(table, container_id, &upload, options)?;

        let session_id = Uuid::new_v4().to_string();
        let view = session_view(&session_id, &session);

        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| ApiError::InternalError(format!("会话锁获取失败: {}", e)))?;
        sessions.insert(session_id.clone(), session);
        info!(session_id = %session_id, "导入会话已创建");

        Ok(view)
    }

    /// 提交映射
    ///
    /// # 参数
    /// - session_id: upload 返回的会话ID
    /// - submission_json: MappingSubmission 的 JSON 形式
    ///
    /// 会话在提交后即被移除，无论成功与否
    #[instrument(skip(self, submission_json))]
    pub fn submit(&self, session_id: &str, submission_json: &str) -> ApiResult<ImportApiResponse> {
        let submission: MappingSubmission = serde_json::from_str(submission_json)?;

        let session = {
            let mut sessions = self
                .sessions
                .lock()
                .map_err(|e| ApiError::InternalError(format!("会话锁获取失败: {}", e)))?;
            sessions
                .remove(session_id)
                .ok_or_else(|| ApiError::NotFound(format!("导入会话 {}", session_id)))?
        };

        let start = Instant::now();
        let outcome = self.orchestrator.submit(&session, &submission)?;
        Ok(ImportApiResponse {
            outcome,
            elapsed_ms: start.elapsed().as_millis() as i64,
        })
    }

    /// 一次性导入
    ///
    /// # 参数
    /// - request_json: ImportRequest 的 JSON 形式
    #[instrument(skip(self, bytes, request_json), fields(size = bytes.len()))]
    pub fn import_file(
        &self,
        table: &str,
        container_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        request_json: &str,
    ) -> ApiResult<ImportApiResponse> {
        let request: ImportRequest = serde_json::from_str(request_json)?;
        let upload = UploadedFile::new(file_name, bytes);

        let start = Instant::now();
        let outcome = self
            .orchestrator
            .run(table, container_id, &upload, &request)?;
        Ok(ImportApiResponse {
            outcome,
            elapsed_ms: start.elapsed().as_millis() as i64,
        })
    }

    /// 放弃会话
    pub fn discard(&self, session_id: &str) -> ApiResult<bool> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| ApiError::InternalError(format!("会话锁获取失败: {}", e)))?;
        Ok(sessions.remove(session_id).is_some())
    }

    pub fn pending_sessions(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }
}

fn session_view(session_id: &str, session: &ImportSession) -> SessionView {
    let preview = session
        .grid
        .data_rows()
        .take(PREVIEW_ROW_LIMIT)
        .map(|row| session.grid.row_values(row))
        .collect();

    SessionView {
        session_id: session_id.to_string(),
        table: session.table.clone(),
        container_id: session.container_id,
        stored_file: session.stored_file.identifier.clone(),
        rows: session.grid.rows,
        cols: session.grid.cols,
        header: session.grid.header.clone(),
        preview,
        fields: session.catalog.fields.clone(),
        has_sensitive_field: session.catalog.has_sensitive_field(),
        sensitive_fields: session.catalog.sensitive_fields(),
        deleted: session.deleted,
    }
}
