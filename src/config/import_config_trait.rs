// ==========================================
// 表格数据导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含导入逻辑
// ==========================================

use crate::domain::{ColumnExtentMode, DuplicationBehavior};
use crate::importer::error::ImportResult;
use std::path::PathBuf;

/// 不允许导入的审计/流程字段（默认值）
///
/// 直接写入这些字段会破坏宿主系统的版本、时间戳、软删除与多语言差异状态
pub const DEFAULT_DISALLOWED_FIELDS: &[&str] = &[
    "t3ver_oid",
    "t3ver_id",
    "t3ver_wsid",
    "t3ver_label",
    "t3ver_state",
    "t3ver_stage",
    "t3ver_count",
    "t3ver_tstamp",
    "t3_origuid",
    "t3ver_move_id",
    "tstamp",
    "crdate",
    "cruser_id",
    "hidden",
    "deleted",
    "l18n_diffsource",
    "l10n_diffsource",
    "l18n_parent",
    "l10n_parent",
    "l10n_source",
];

/// 不允许导入的 schema（默认值）
pub const DEFAULT_DISALLOWED_SCHEMAS: &[&str] = &["be_users", "be_groups", "sys_log"];

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入流程所需的配置读取接口
// 实现者: ImportSettings（JSON 文件）、ConfigManager（config_kv 表）
pub trait ImportConfigReader: Send + Sync {
    // ===== 目标表策略 =====

    /// 允许导入的 schema 列表
    ///
    /// # 默认值
    /// - 空列表（表示全部已注册 schema）
    fn allowed_schemas(&self) -> ImportResult<Vec<String>>;

    /// 禁止导入的 schema 列表
    ///
    /// # 默认值
    /// - DEFAULT_DISALLOWED_SCHEMAS
    fn disallowed_schemas(&self) -> ImportResult<Vec<String>>;

    /// 禁止映射的字段列表
    ///
    /// # 默认值
    /// - DEFAULT_DISALLOWED_FIELDS
    fn disallowed_fields(&self) -> ImportResult<Vec<String>>;

    // ===== 文件处理 =====

    /// 上传文件保存目录
    fn upload_folder(&self) -> ImportResult<PathBuf>;

    /// 重名文件处理策略
    ///
    /// # 默认值
    /// - rename
    fn duplication_behavior(&self) -> ImportResult<DuplicationBehavior>;

    /// 分隔符文本的旧版编码标签
    ///
    /// # 默认值
    /// - windows-1252
    fn legacy_encoding_label(&self) -> ImportResult<String>;

    /// 列数统计口径
    ///
    /// # 默认值
    /// - existing_cell_count
    fn column_extent_mode(&self) -> ImportResult<ColumnExtentMode>;
}
