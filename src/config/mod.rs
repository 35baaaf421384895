// ==========================================
// 表格数据导入系统 - 配置层
// ==========================================
// 职责: 导入策略与文件处理配置的读取
// 来源: JSON 配置文件 (ImportSettings) 或 config_kv 表 (ConfigManager)
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod import_settings;

// 重导出核心配置
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{
    ImportConfigReader, DEFAULT_DISALLOWED_FIELDS, DEFAULT_DISALLOWED_SCHEMAS,
};
pub use import_settings::{default_settings_path, default_upload_folder, ImportSettings};
