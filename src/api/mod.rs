// ==========================================
// 表格数据导入系统 - API 层
// ==========================================
// 职责: 为操作界面提供导入接口，统一错误表现
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse, SessionView, TableOption, PREVIEW_ROW_LIMIT};
