// ==========================================
// 表格数据导入系统 - 领域模型层
// ==========================================
// 职责: 定义网格、字段目录、操作批次、导入请求等纯数据类型
// 红线: 不含数据访问逻辑，不含导入流程逻辑
// ==========================================

pub mod field;
pub mod grid;
pub mod import;
pub mod operation;
pub mod types;

// 重导出核心类型
pub use field::{FieldCatalog, FieldDescriptor, SchemaColumn, PID_FIELD, UID_FIELD};
pub use grid::Grid;
pub use import::{
    ColumnMapping, FormPair, ImportOutcome, ImportRequest, ImportRow, MappingSubmission,
    OverrideSet, RowFragment, StoredFile, SubmittedDataset, UploadOptions, UploadedFile,
};
pub use operation::{Operation, OperationBatch, OperationKind, TableOperations, NEW_KEY_PREFIX};
pub use types::{ColumnExtentMode, DuplicationBehavior, RootLevel, Severity};
