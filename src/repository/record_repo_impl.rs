// ==========================================
// 表格数据导入系统 - SQLite 记录持久化实现
// ==========================================
// 约定:
// - 目标表以 uid INTEGER PRIMARY KEY 为主键，pid 为父容器
// - 存在 deleted 列的表使用软删除，否则物理删除
// - 字段值按文本绑定，由 SQLite 类型亲和性自行转换
// - 插入时字段值恰好等于本批次已分配的合成 key 时，替换为真实 uid（关联记录）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::{OperationBatch, OperationKind, UID_FIELD};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_repo::{CommitResult, RecordRepository};
use rusqlite::{params_from_iter, Connection, Transaction};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// 软删除标记列
const DELETED_COLUMN: &str = "deleted";

/// 校验表名/列名，只允许 ASCII 字母、数字、下划线，且不以数字开头
pub fn validate_identifier(name: &str) -> RepositoryResult<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(RepositoryError::InvalidIdentifier(name.to_string()))
    }
}

// ==========================================
// SqliteRecordRepository
// ==========================================
pub struct SqliteRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordRepository {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 Repository
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 读取表的列名列表（表不存在时返回空列表）
    fn table_columns(conn: &Connection, table: &str) -> RepositoryResult<Vec<String>> {
        let table = validate_identifier(table)?;
        let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn has_soft_delete(conn: &Connection, table: &str) -> RepositoryResult<bool> {
        Ok(Self::table_columns(conn, table)?
            .iter()
            .any(|c| c == DELETED_COLUMN))
    }

    /// 在事务中插入一条记录，返回分配的 uid
    fn insert_tx(
        tx: &Transaction,
        table: &str,
        fields: &BTreeMap<String, String>,
        assigned: &BTreeMap<String, i64>,
    ) -> RepositoryResult<i64> {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (field, value) in fields {
            if field == UID_FIELD {
                continue;
            }
            columns.push(format!("\"{}\"", validate_identifier(field)?));
            values.push(match assigned.get(value) {
                Some(uid) => uid.to_string(),
                None => value.clone(),
            });
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO \"{}\" DEFAULT VALUES", table)
        } else {
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO \"{}\" ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        tx.execute(&sql, params_from_iter(values.iter()))?;
        Ok(tx.last_insert_rowid())
    }

    /// 在事务中按 uid 更新一条记录，返回受影响行数
    fn update_tx(
        tx: &Transaction,
        table: &str,
        uid: &str,
        fields: &BTreeMap<String, String>,
        assigned: &BTreeMap<String, i64>,
    ) -> RepositoryResult<usize> {
        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for (field, value) in fields {
            if field == UID_FIELD {
                continue;
            }
            values.push(match assigned.get(value) {
                Some(id) => id.to_string(),
                None => value.clone(),
            });
            assignments.push(format!("\"{}\" = ?{}", validate_identifier(field)?, values.len()));
        }
        if assignments.is_empty() {
            return Ok(0);
        }

        values.push(uid.to_string());
        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE uid = ?{}",
            table,
            assignments.join(", "),
            values.len()
        );
        Ok(tx.execute(&sql, params_from_iter(values.iter()))?)
    }
}

impl RecordRepository for SqliteRecordRepository {
    fn commit(&self, batch: &OperationBatch) -> RepositoryResult<CommitResult> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut result = CommitResult::default();
        for table_ops in batch.tables() {
            let table = validate_identifier(&table_ops.table)?;
            for op in table_ops.operations() {
                match op.kind {
                    OperationKind::Insert => {
                        let uid = Self::insert_tx(&tx, table, &op.fields, &result.assigned_ids)?;
                        result.assigned_ids.insert(op.key.clone(), uid);
                        result.inserted += 1;
                    }
                    OperationKind::Update => {
                        let affected =
                            Self::update_tx(&tx, table, &op.key, &op.fields, &result.assigned_ids)?;
                        result.updated += affected;
                    }
                }
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(result)
    }

    fn query_identifiers(&self, schema: &str, container_id: i64) -> RepositoryResult<Vec<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let table = validate_identifier(schema)?;

        let sql = if Self::has_soft_delete(&conn, table)? {
            format!(
                "SELECT uid FROM \"{}\" WHERE pid = ?1 AND {} = 0 ORDER BY uid",
                table, DELETED_COLUMN
            )
        } else {
            format!("SELECT uid FROM \"{}\" WHERE pid = ?1 ORDER BY uid", table)
        };

        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map([container_id], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(|uid| uid.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn delete(&self, schema: &str, ids: &[String]) -> RepositoryResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let table = validate_identifier(schema)?;
        let soft_delete = Self::has_soft_delete(&conn, table)?;

        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let sql = if soft_delete {
            format!("UPDATE \"{}\" SET {} = 1 WHERE uid = ?1", table, DELETED_COLUMN)
        } else {
            format!("DELETE FROM \"{}\" WHERE uid = ?1", table)
        };

        let mut count = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for id in ids {
                count += stmt.execute([id])?;
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }
}
