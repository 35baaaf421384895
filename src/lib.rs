// ==========================================
// 表格数据导入系统 - 核心库
// ==========================================
// 功能: 把 CSV / Excel 表格导入到已注册的记录表
// 技术栈: Rust + SQLite + calamine/csv
// 流程: 上传 → 网格预览 → 操作员配置列映射 → 批量写入
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 网格/字段/操作批次
pub mod domain;

// 数据仓储层 - schema 元数据、记录持久化、文件存储、通知
pub mod repository;

// 导入层 - 网格提取与导入编排
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 操作界面接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    ColumnExtentMode, DuplicationBehavior, FieldCatalog, FieldDescriptor, Grid, ImportOutcome,
    ImportRequest, MappingSubmission, Operation, OperationBatch, OperationKind, RootLevel,
    Severity, UploadOptions, UploadedFile,
};

// 导入
pub use importer::{
    FieldCatalogBuilder, GridExtractor, ImportError, ImportHook, ImportOrchestrator,
    ImportResult, MappingReconciler, RelationInjectionHook,
};

// API
pub use api::{ApiError, ApiResult, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "表格数据导入系统";
