// ==========================================
// 表格数据导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 任一错误都使整次导入失败，不存在行级部分成功
// ==========================================

use crate::repository::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件无法读取: {0}")]
    UnreadableFile(String),

    #[error("文件读写失败: {0}")]
    Io(String),

    #[error("目标文件已存在: {0}")]
    StorageConflict(String),

    // ===== 目标表错误 =====
    #[error("Schema 未注册: {0}")]
    UnknownSchema(String),

    #[error("导入目标无效: {0}")]
    InvalidTarget(String),

    // ===== 扩展钩子错误 =====
    #[error("导入钩子执行失败 ({hook}): {message}")]
    HookFailure { hook: String, message: String },

    // ===== 仓储/配置错误 =====
    #[error("持久化失败: {0}")]
    Repository(RepositoryError),

    #[error("配置错误: {0}")]
    Config(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<RepositoryError>（区分 schema 未注册、文件冲突、存储失败）
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::SchemaNotFound(name) => ImportError::UnknownSchema(name),
            RepositoryError::FileExists(name) => ImportError::StorageConflict(name),
            RepositoryError::StorageError(msg) => ImportError::Io(msg),
            other => ImportError::Repository(other),
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Io(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            ImportError::Io(err.to_string())
        } else {
            ImportError::UnreadableFile(err.to_string())
        }
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        match err {
            calamine::Error::Io(e) => ImportError::Io(e.to_string()),
            other => ImportError::UnreadableFile(other.to_string()),
        }
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Repository(RepositoryError::from(err))
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Config(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
