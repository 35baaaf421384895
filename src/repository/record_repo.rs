// ==========================================
// 表格数据导入系统 - 记录持久化 Repository Trait
// ==========================================
// 职责: 定义批次提交、按容器查询、删除等数据访问接口（不包含业务逻辑）
// 红线: Repository 不含导入规则，只做数据 CRUD
// ==========================================

use crate::domain::OperationBatch;
use crate::repository::error::RepositoryResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// CommitResult - 批次提交结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    /// 新增记录数
    pub inserted: usize,
    /// 更新记录数（实际命中的记录）
    pub updated: usize,
    /// 合成 key → 分配的 uid
    pub assigned_ids: BTreeMap<String, i64>,
}

// ==========================================
// RecordRepository Trait
// ==========================================
// 用途: 导入批次落库、导入前清理
// 实现者: SqliteRecordRepository（使用 rusqlite）
pub trait RecordRepository: Send + Sync {
    /// 提交操作批次（整体成功或整体失败）
    ///
    /// # 参数
    /// - batch: 操作批次（按表顺序、表内按插入顺序执行）
    ///
    /// # 返回
    /// - Ok(CommitResult): 提交结果，包含新增记录分配的 uid
    /// - Err: 数据库错误（整个事务回滚）
    fn commit(&self, batch: &OperationBatch) -> RepositoryResult<CommitResult>;

    /// 查询容器下某表的全部记录 uid
    ///
    /// # 参数
    /// - schema: 表名
    /// - container_id: 父容器 id（pid）
    fn query_identifiers(&self, schema: &str, container_id: i64) -> RepositoryResult<Vec<String>>;

    /// 删除指定记录
    ///
    /// # 返回
    /// - Ok(usize): 实际删除的记录数
    fn delete(&self, schema: &str, ids: &[String]) -> RepositoryResult<usize>;
}
