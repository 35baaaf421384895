// ==========================================
// 表格数据导入系统 - 导入层
// ==========================================
// 职责: 上传文件 → 网格 → 字段目录 → 操作批次 → 钩子 → 持久化
// 支持: 分隔符文本 (CSV/TSV)、Excel/ODS 工作簿
// ==========================================

// 模块声明
pub mod dataset_decoder;
pub mod error;
pub mod field_catalog;
pub mod grid_extractor;
pub mod hook_dispatcher;
pub mod import_orchestrator;
pub mod mapping_reconciler;

// 重导出核心类型
pub use dataset_decoder::{decode_dataset, import_rows, DecodedRow};
pub use error::{ImportError, ImportResult};
pub use field_catalog::FieldCatalogBuilder;
pub use grid_extractor::{identify_format, sniff_delimiter, FileFormat, GridExtractor};
pub use hook_dispatcher::{HookContext, HookDispatcher, ImportHook, RelationInjectionHook};
pub use import_orchestrator::{ImportOrchestrator, ImportSession, ROOT_CONTAINER_ID};
pub use mapping_reconciler::{placeholder_secret, synthetic_key, MappingReconciler};
