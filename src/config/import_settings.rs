// ==========================================
// 表格数据导入系统 - 文件配置
// ==========================================
// 职责: 从 JSON 文件加载导入配置，缺省字段取默认值
// 默认路径: <系统配置目录>/record-import/settings.json
// ==========================================

use crate::config::import_config_trait::{
    ImportConfigReader, DEFAULT_DISALLOWED_FIELDS, DEFAULT_DISALLOWED_SCHEMAS,
};
use crate::domain::{ColumnExtentMode, DuplicationBehavior};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::grid_extractor::DEFAULT_LEGACY_ENCODING;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "record-import";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// 默认配置文件路径
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join(SETTINGS_FILE_NAME)
}

/// 默认上传目录
pub fn default_upload_folder() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join("uploads")
}

// ==========================================
// ImportSettings
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub allowed_schemas: Vec<String>,
    pub disallowed_schemas: Vec<String>,
    pub disallowed_fields: Vec<String>,
    pub upload_folder: PathBuf,
    pub duplication_behavior: DuplicationBehavior,
    pub legacy_encoding: String,
    pub column_extent_mode: ColumnExtentMode,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            allowed_schemas: Vec::new(),
            disallowed_schemas: DEFAULT_DISALLOWED_SCHEMAS.iter().map(|s| s.to_string()).collect(),
            disallowed_fields: DEFAULT_DISALLOWED_FIELDS.iter().map(|s| s.to_string()).collect(),
            upload_folder: default_upload_folder(),
            duplication_behavior: DuplicationBehavior::default(),
            legacy_encoding: DEFAULT_LEGACY_ENCODING.to_string(),
            column_extent_mode: ColumnExtentMode::default(),
        }
    }
}

impl ImportSettings {
    /// 从 JSON 字符串加载
    pub fn from_json_str(json: &str) -> ImportResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ImportError::Config(format!("配置文件解析失败: {}", e)))
    }

    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// 从默认路径加载；文件不存在时返回默认配置
    pub fn load_or_default() -> ImportResult<Self> {
        let path = default_settings_path();
        if path.exists() {
            tracing::info!(path = %path.display(), "加载导入配置文件");
            Self::load(&path)
        } else {
            tracing::debug!(path = %path.display(), "配置文件不存在，使用默认配置");
            Ok(Self::default())
        }
    }

    /// 保存到文件（自动创建上级目录）
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ImportResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl ImportConfigReader for ImportSettings {
    fn allowed_schemas(&self) -> ImportResult<Vec<String>> {
        Ok(self.allowed_schemas.clone())
    }

    fn disallowed_schemas(&self) -> ImportResult<Vec<String>> {
        Ok(self.disallowed_schemas.clone())
    }

    fn disallowed_fields(&self) -> ImportResult<Vec<String>> {
        Ok(self.disallowed_fields.clone())
    }

    fn upload_folder(&self) -> ImportResult<PathBuf> {
        Ok(self.upload_folder.clone())
    }

    fn duplication_behavior(&self) -> ImportResult<DuplicationBehavior> {
        Ok(self.duplication_behavior)
    }

    fn legacy_encoding_label(&self) -> ImportResult<String> {
        Ok(self.legacy_encoding.clone())
    }

    fn column_extent_mode(&self) -> ImportResult<ColumnExtentMode> {
        Ok(self.column_extent_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = ImportSettings::from_json_str(
            r#"{"allowed_schemas": ["fe_users"], "duplication_behavior": "fail"}"#,
        )
        .unwrap();
        assert_eq!(settings.allowed_schemas, vec!["fe_users"]);
        assert_eq!(settings.duplication_behavior, DuplicationBehavior::Fail);
        assert_eq!(settings.legacy_encoding, "windows-1252");
        assert!(settings.disallowed_fields.contains(&"crdate".to_string()));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        assert!(matches!(
            ImportSettings::from_json_str("{not json"),
            Err(ImportError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = ImportSettings::default();
        settings.column_extent_mode = ColumnExtentMode::MaxColumnIndex;
        settings.upload_folder = dir.path().join("uploads");
        settings.save(&path).unwrap();

        let loaded = ImportSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(
            loaded.column_extent_mode().unwrap(),
            ColumnExtentMode::MaxColumnIndex
        );
    }

    #[test]
    fn test_default_paths_are_namespaced() {
        assert!(default_settings_path().ends_with("record-import/settings.json"));
        assert!(default_upload_folder().ends_with("record-import/uploads"));
    }
}
