// ==========================================
// 表格数据导入系统 - 写入操作批次
// ==========================================
// 职责: 描述交给持久化引擎的新增/更新操作
// 规则:
// - Insert 使用合成 key（NEW_ 前缀），Update 使用已有记录 uid
// - 同表内 key 唯一；重复 key 后写覆盖先写，但保留首次出现的位置
// - 表按首次出现顺序排列，表内操作按插入顺序排列
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 合成 key 前缀
pub const NEW_KEY_PREFIX: &str = "NEW_";

// ==========================================
// OperationKind - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Insert,
    Update,
}

// ==========================================
// Operation - 单条记录写入
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    /// Insert: 合成 key；Update: 目标记录 uid
    pub key: String,
    /// 字段 → 值
    pub fields: BTreeMap<String, String>,
}

impl Operation {
    pub fn insert(key: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            kind: OperationKind::Insert,
            key: key.into(),
            fields,
        }
    }

    pub fn update(key: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            kind: OperationKind::Update,
            key: key.into(),
            fields,
        }
    }

    pub fn is_insert(&self) -> bool {
        self.kind == OperationKind::Insert
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

// ==========================================
// TableOperations - 单表操作集合
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableOperations {
    pub table: String,
    operations: Vec<Operation>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    /// 批次内出现过重复的 key
    duplicate_keys: Vec<String>,
}

impl TableOperations {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// 写入操作；key 已存在时覆盖并返回被替换的操作
    pub fn upsert(&mut self, operation: Operation) -> Option<Operation> {
        match self.index.get(&operation.key) {
            Some(&pos) => {
                if !self.duplicate_keys.contains(&operation.key) {
                    self.duplicate_keys.push(operation.key.clone());
                }
                Some(std::mem::replace(&mut self.operations[pos], operation))
            }
            None => {
                self.index
                    .insert(operation.key.clone(), self.operations.len());
                self.operations.push(operation);
                None
            }
        }
    }

    /// 移除指定 key 的操作
    pub fn remove(&mut self, key: &str) -> Option<Operation> {
        let pos = self.index.remove(key)?;
        let removed = self.operations.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn get(&self, key: &str) -> Option<&Operation> {
        self.index.get(key).map(|&pos| &self.operations[pos])
    }

    /// 指定 key 的可变字段（key 与类型不可改，保持索引有效）
    pub fn get_mut(&mut self, key: &str) -> Option<&mut BTreeMap<String, String>> {
        match self.index.get(key) {
            Some(&pos) => Some(&mut self.operations[pos].fields),
            None => None,
        }
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// 可变遍历（允许改写字段，不允许改 key）
    pub fn for_each_mut<F: FnMut(&mut BTreeMap<String, String>, &str, OperationKind)>(
        &mut self,
        mut f: F,
    ) {
        for op in &mut self.operations {
            f(&mut op.fields, &op.key, op.kind);
        }
    }

    pub fn duplicate_keys(&self) -> &[String] {
        &self.duplicate_keys
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.operations.iter().filter(|op| op.kind == kind).count()
    }
}

// ==========================================
// OperationBatch - 操作批次（表 → 操作集合）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationBatch {
    tables: Vec<TableOperations>,
}

impl OperationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取（不存在则创建）某表的操作集合
    pub fn table_mut(&mut self, table: &str) -> &mut TableOperations {
        let pos = match self.tables.iter().position(|t| t.table == table) {
            Some(pos) => pos,
            None => {
                self.tables.push(TableOperations::new(table));
                self.tables.len() - 1
            }
        };
        &mut self.tables[pos]
    }

    pub fn table(&self, table: &str) -> Option<&TableOperations> {
        self.tables.iter().find(|t| t.table == table)
    }

    pub fn tables(&self) -> &[TableOperations] {
        &self.tables
    }

    /// 移除整张表的操作集合
    pub fn remove_table(&mut self, table: &str) -> Option<TableOperations> {
        let pos = self.tables.iter().position(|t| t.table == table)?;
        Some(self.tables.remove(pos))
    }

    /// 操作总数
    pub fn len(&self) -> usize {
        self.tables.iter().map(TableOperations::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.tables.iter().map(|t| t.count(kind)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_upsert_keeps_first_position() {
        let mut table = TableOperations::new("fe_users");
        table.upsert(Operation::update("5", fields(&[("name", "a")])));
        table.upsert(Operation::insert("NEW_1", fields(&[("name", "b")])));
        let replaced = table.upsert(Operation::update("5", fields(&[("name", "c")])));

        assert_eq!(replaced.unwrap().field("name"), Some("a"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.operations()[0].field("name"), Some("c"));
        assert_eq!(table.duplicate_keys(), &["5".to_string()]);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut table = TableOperations::new("t");
        table.upsert(Operation::insert("NEW_a", fields(&[])));
        table.upsert(Operation::insert("NEW_b", fields(&[])));
        table.upsert(Operation::insert("NEW_c", fields(&[])));

        assert!(table.remove("NEW_a").is_some());
        assert_eq!(table.get("NEW_c").unwrap().key, "NEW_c");
        assert!(table.remove("NEW_a").is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_get_mut_edits_fields_and_keeps_index() {
        let mut table = TableOperations::new("t");
        table.upsert(Operation::insert("NEW_a", fields(&[("name", "a")])));
        table.upsert(Operation::insert("NEW_b", fields(&[("name", "b")])));

        let edited = table.get_mut("NEW_a").unwrap();
        edited.insert("name".to_string(), "changed".to_string());
        edited.remove("missing");
        assert!(table.get_mut("NEW_x").is_none());

        assert_eq!(table.get("NEW_a").unwrap().field("name"), Some("changed"));
        assert_eq!(table.get("NEW_b").unwrap().key, "NEW_b");
        table.upsert(Operation::insert("NEW_a", fields(&[("name", "again")])));
        assert_eq!(table.len(), 2);
        assert_eq!(table.operations()[0].field("name"), Some("again"));
    }

    #[test]
    fn test_batch_table_order_and_counts() {
        let mut batch = OperationBatch::new();
        batch
            .table_mut("fe_users")
            .upsert(Operation::insert("NEW_1", fields(&[])));
        batch
            .table_mut("sys_category_record_mm")
            .upsert(Operation::insert("NEW_2", fields(&[])));
        batch
            .table_mut("fe_users")
            .upsert(Operation::update("7", fields(&[])));

        let names: Vec<&str> = batch.tables().iter().map(|t| t.table.as_str()).collect();
        assert_eq!(names, vec!["fe_users", "sys_category_record_mm"]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.count(OperationKind::Insert), 2);
        assert_eq!(batch.count(OperationKind::Update), 1);
    }
}
