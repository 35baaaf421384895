// ==========================================
// 表格数据导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、快照导出/恢复
// 存储: config_kv 表 (scope_id + key → value)，导入配置只读 global scope
// ==========================================

use crate::config::import_config_trait::{
    ImportConfigReader, DEFAULT_DISALLOWED_FIELDS, DEFAULT_DISALLOWED_SCHEMAS,
};
use crate::config::import_settings::default_upload_folder;
use crate::db::open_sqlite_connection;
use crate::domain::{ColumnExtentMode, DuplicationBehavior};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::grid_extractor::DEFAULT_LEGACY_ENCODING;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ImportResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| ImportError::Config(format!("锁获取失败: {}", e)))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 创建 config_kv 表（已存在时跳过）
    pub fn ensure_schema(&self) -> ImportResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS config_kv (
                scope_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (scope_id, key)
            );",
        )?;
        Ok(())
    }

    fn lock(&self) -> ImportResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ImportError::Config(format!("锁获取失败: {}", e)))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self.lock()?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ImportResult<String> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取逗号分隔的列表配置（未配置时使用默认值）
    fn get_list_or_default(&self, key: &str, default: &[&str]) -> ImportResult<Vec<String>> {
        match self.get_config_value(key)? {
            Some(value) => Ok(split_list(&value)),
            None => Ok(default.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 导入排障时记录当时生效的配置
    pub fn get_config_snapshot(&self) -> ImportResult<String> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖现有的 global 配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ImportResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

/// 拆分逗号分隔的列表，去除空白与空项
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    // ===== 目标表策略 =====

    fn allowed_schemas(&self) -> ImportResult<Vec<String>> {
        self.get_list_or_default(config_keys::ALLOWED_SCHEMAS, &[])
    }

    fn disallowed_schemas(&self) -> ImportResult<Vec<String>> {
        self.get_list_or_default(config_keys::DISALLOWED_SCHEMAS, DEFAULT_DISALLOWED_SCHEMAS)
    }

    fn disallowed_fields(&self) -> ImportResult<Vec<String>> {
        self.get_list_or_default(config_keys::DISALLOWED_FIELDS, DEFAULT_DISALLOWED_FIELDS)
    }

    // ===== 文件处理 =====

    fn upload_folder(&self) -> ImportResult<PathBuf> {
        match self.get_config_value(config_keys::UPLOAD_FOLDER)? {
            Some(path) if !path.trim().is_empty() => Ok(PathBuf::from(path.trim())),
            _ => Ok(default_upload_folder()),
        }
    }

    fn duplication_behavior(&self) -> ImportResult<DuplicationBehavior> {
        let value = self.get_config_or_default(config_keys::DUPLICATION_BEHAVIOR, "rename")?;
        Ok(value.parse().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::DUPLICATION_BEHAVIOR,
                raw_value = %value,
                "重名处理策略配置无效，使用 rename"
            );
            DuplicationBehavior::Rename
        }))
    }

    fn legacy_encoding_label(&self) -> ImportResult<String> {
        self.get_config_or_default(config_keys::LEGACY_ENCODING, DEFAULT_LEGACY_ENCODING)
    }

    fn column_extent_mode(&self) -> ImportResult<ColumnExtentMode> {
        let value = self.get_config_or_default(config_keys::COLUMN_EXTENT_MODE, "existing_cell_count")?;
        Ok(value.parse().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::COLUMN_EXTENT_MODE,
                raw_value = %value,
                "列数统计口径配置无效，使用 existing_cell_count"
            );
            ColumnExtentMode::ExistingCellCount
        }))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 目标表策略
    pub const ALLOWED_SCHEMAS: &str = "import.allowed_schemas";
    pub const DISALLOWED_SCHEMAS: &str = "import.disallowed_schemas";
    pub const DISALLOWED_FIELDS: &str = "import.disallowed_fields";

    // 文件处理
    pub const UPLOAD_FOLDER: &str = "import.upload_folder";
    pub const DUPLICATION_BEHAVIOR: &str = "import.duplication_behavior";
    pub const LEGACY_ENCODING: &str = "import.legacy_encoding";
    pub const COLUMN_EXTENT_MODE: &str = "import.column_extent_mode";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        let manager = ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap();
        manager.ensure_schema().unwrap();
        manager
    }

    #[test]
    fn test_defaults_when_unset() {
        let manager = manager();
        assert!(manager.allowed_schemas().unwrap().is_empty());
        assert!(manager
            .disallowed_fields()
            .unwrap()
            .contains(&"tstamp".to_string()));
        assert_eq!(manager.duplication_behavior().unwrap(), DuplicationBehavior::Rename);
        assert_eq!(manager.legacy_encoding_label().unwrap(), "windows-1252");
        assert_eq!(
            manager.column_extent_mode().unwrap(),
            ColumnExtentMode::ExistingCellCount
        );
    }

    #[test]
    fn test_configured_values() {
        let manager = manager();
        manager
            .set_global_config_value(config_keys::ALLOWED_SCHEMAS, "fe_users, tt_address,")
            .unwrap();
        manager
            .set_global_config_value(config_keys::DUPLICATION_BEHAVIOR, "replace")
            .unwrap();
        manager
            .set_global_config_value(config_keys::COLUMN_EXTENT_MODE, "max_column_index")
            .unwrap();
        manager
            .set_global_config_value(config_keys::UPLOAD_FOLDER, "/srv/uploads")
            .unwrap();

        assert_eq!(manager.allowed_schemas().unwrap(), vec!["fe_users", "tt_address"]);
        assert_eq!(manager.duplication_behavior().unwrap(), DuplicationBehavior::Replace);
        assert_eq!(
            manager.column_extent_mode().unwrap(),
            ColumnExtentMode::MaxColumnIndex
        );
        assert_eq!(manager.upload_folder().unwrap(), PathBuf::from("/srv/uploads"));
    }

    #[test]
    fn test_invalid_policy_falls_back() {
        let manager = manager();
        manager
            .set_global_config_value(config_keys::DUPLICATION_BEHAVIOR, "explode")
            .unwrap();
        assert_eq!(manager.duplication_behavior().unwrap(), DuplicationBehavior::Rename);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let source = manager();
        source
            .set_global_config_value(config_keys::DISALLOWED_FIELDS, "a,b")
            .unwrap();
        let snapshot = source.get_config_snapshot().unwrap();

        let target = manager();
        assert_eq!(target.restore_config_from_snapshot(&snapshot).unwrap(), 1);
        assert_eq!(target.disallowed_fields().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a , ,b,"), vec!["a", "b"]);
        assert!(split_list("").is_empty());
    }
}
