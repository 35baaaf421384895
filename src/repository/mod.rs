// ==========================================
// 表格数据导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含导入规则
// ==========================================
// 职责: 导入流程依赖的外部协作方接口（schema 元数据、文件存储、持久化、通知）
//       以及本地目录 / SQLite / 内存参考实现
// 约束: 所有值使用参数化绑定，表名/列名先校验再拼接
// ==========================================

pub mod error;
pub mod notification;
pub mod record_repo;
pub mod record_repo_impl;
pub mod schema_registry;
pub mod schema_registry_impl;
pub mod storage;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use notification::{
    MemoryNotificationQueue, Notification, NotificationSink, TracingNotificationSink,
};
pub use record_repo::{CommitResult, RecordRepository};
pub use record_repo_impl::SqliteRecordRepository;
pub use schema_registry::SchemaRegistry;
pub use schema_registry_impl::{SchemaDefinition, StaticSchemaRegistry, I18N_LABEL_PREFIX};
pub use storage::{FileStorage, LocalFolderStorage};
