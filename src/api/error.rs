// ==========================================
// 表格数据导入系统 - API层错误类型
// ==========================================
// 职责: 把导入/仓储错误转换为面向操作员的错误消息
// 约定: 导入流程的所有失败统一表现为"导入未完成"，附带可读原因
// ==========================================

use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 导入错误
    // ==========================================
    /// 导入未完成（消息已本地化）
    #[error("{message}")]
    ImportNotCompleted { message: String },

    // ==========================================
    // 请求错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 构造"导入未完成"错误
    pub fn import_not_completed(reason: &str) -> Self {
        ApiError::ImportNotCompleted {
            message: crate::i18n::t_with_args("import.not_completed_message", &[("reason", reason)]),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        let reason = match &err {
            ImportError::UnreadableFile(_) => crate::i18n::t("import.unreadable_file"),
            ImportError::InvalidTarget(_) | ImportError::UnknownSchema(_) => {
                let target = target_name(&err);
                crate::i18n::t_with_args("import.invalid_target", &[("table", target.as_str())])
            }
            _ => err.to_string(),
        };
        ApiError::import_not_completed(&reason)
    }
}

fn target_name(err: &ImportError) -> String {
    match err {
        ImportError::UnknownSchema(name) => name.clone(),
        ImportError::InvalidTarget(detail) => detail.clone(),
        _ => String::new(),
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::SchemaNotFound(name) => ApiError::NotFound(format!("schema {}", name)),
            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg)
            | RepositoryError::UniqueConstraintViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg) => ApiError::DatabaseError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

// 从 serde_json::Error 转换（请求体解析失败）
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidInput(format!("请求体解析失败: {}", err))
    }
}

/// API Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
