// ==========================================
// 表格数据导入系统 - 映射整理
// ==========================================
// 职责: 网格行 + 列映射 + 覆盖值 + 敏感字段策略 → 操作批次
// 步骤:
// 1. 整理列映射（去掉空映射和禁止字段）
// 2. 整理覆盖值（去掉空名/空值、已被列映射的字段、禁止字段）
// 3. 确定需要生成占位值的敏感字段
// 4. 逐行构造字段值，uid 列决定 新增/更新
// 5. 新增用合成 key，更新用 uid 值；重复 key 后到者覆盖并记录
// ==========================================

use crate::domain::{
    ImportRow, MappingSubmission, Operation, OperationBatch, OverrideSet, NEW_KEY_PREFIX,
    PID_FIELD, UID_FIELD,
};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// 生成新增记录的合成 key
pub fn synthetic_key() -> String {
    format!("{}{}", NEW_KEY_PREFIX, Uuid::new_v4().simple())
}

/// 生成敏感字段的占位值（不是真实密码，需后续替换）
pub fn placeholder_secret() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    hex::encode(hasher.finalize())
}

pub struct MappingReconciler {
    disallowed_fields: Vec<String>,
}

impl MappingReconciler {
    pub fn new(disallowed_fields: Vec<String>) -> Self {
        Self { disallowed_fields }
    }

    fn is_disallowed(&self, field: &str) -> bool {
        self.disallowed_fields.iter().any(|f| f == field)
    }

    /// 整理列映射 → [(网格列号, 字段名)]
    pub fn sanitize_mapping(&self, submission: &MappingSubmission) -> Vec<(usize, String)> {
        submission
            .column_mapping
            .columns()
            .map(|(col, field)| (col, field.trim()))
            .filter(|(_, field)| !field.is_empty() && !self.is_disallowed(field))
            .map(|(col, field)| (col, field.to_string()))
            .collect()
    }

    /// 整理覆盖值（列映射优先，覆盖值只补空缺）
    pub fn sanitize_overrides(
        &self,
        overrides: &OverrideSet,
        mapped: &[(usize, String)],
    ) -> OverrideSet {
        overrides
            .iter()
            .filter(|(field, value)| {
                let field = field.trim();
                !field.is_empty()
                    && !value.is_empty()
                    && field != UID_FIELD
                    && !self.is_disallowed(field)
                    && !mapped.iter().any(|(_, m)| m == field)
            })
            .map(|(field, value)| (field.trim().to_string(), value.clone()))
            .collect()
    }

    /// 确定需要生成占位值的敏感字段
    ///
    /// uid/pid、禁止字段、已被列映射的字段不生成占位值
    pub fn resolve_password_fields(
        &self,
        submission: &MappingSubmission,
        mapped: &[(usize, String)],
    ) -> Vec<String> {
        if !submission.password_override {
            return Vec::new();
        }
        let mut fields: Vec<String> = Vec::new();
        for field in &submission.password_fields {
            let field = field.trim();
            if field.is_empty()
                || field == UID_FIELD
                || field == PID_FIELD
                || self.is_disallowed(field)
                || mapped.iter().any(|(_, m)| m == field)
                || fields.iter().any(|f| f == field)
            {
                continue;
            }
            fields.push(field.to_string());
        }
        fields
    }

    /// 生成操作批次
    ///
    /// # 参数
    /// - table: 目标表
    /// - rows: 待导入行（import=false 的行跳过）
    /// - submission: 列映射、覆盖值、敏感字段策略
    /// - default_container_id: 未给出 pid 时使用的父容器
    ///
    /// # 返回
    /// - OperationBatch: 只含目标表，按行顺序排列
    #[instrument(skip(self, rows, submission), fields(rows = rows.len()))]
    pub fn reconcile(
        &self,
        table: &str,
        rows: &[ImportRow],
        submission: &MappingSubmission,
        default_container_id: i64,
    ) -> OperationBatch {
        // === 步骤 1-3: 整理输入 ===
        let mapped = self.sanitize_mapping(submission);
        let overrides = self.sanitize_overrides(&submission.overrides, &mapped);
        let password_fields = self.resolve_password_fields(submission, &mapped);
        debug!(
            mapped = mapped.len(),
            overrides = overrides.len(),
            password_fields = password_fields.len(),
            "映射整理完成"
        );

        // === 步骤 4-5: 逐行生成操作 ===
        let mut batch = OperationBatch::new();
        let target = batch.table_mut(table);
        let mut skipped = 0usize;

        for row in rows {
            if !row.import {
                skipped += 1;
                continue;
            }

            let mut fields = BTreeMap::new();
            let mut update_key: Option<String> = None;
            for (col, field) in &mapped {
                let value = row.cell(*col);
                if field == UID_FIELD {
                    if !value.is_empty() {
                        update_key = Some(value.to_string());
                    }
                } else {
                    fields.insert(field.clone(), value.to_string());
                }
            }

            if fields.get(PID_FIELD).map_or(true, |pid| pid.is_empty()) {
                fields.insert(PID_FIELD.to_string(), default_container_id.to_string());
            }
            for (field, value) in &overrides {
                fields.insert(field.clone(), value.clone());
            }
            for field in &password_fields {
                fields.insert(field.clone(), placeholder_secret());
            }

            let operation = match update_key {
                Some(uid) => Operation::update(uid, fields),
                None => Operation::insert(synthetic_key(), fields),
            };
            if let Some(replaced) = target.upsert(operation) {
                warn!(row = row.row, key = %replaced.key, "批次内出现重复 key，后到者覆盖");
            }
        }

        debug!(
            operations = target.len(),
            skipped,
            duplicates = target.duplicate_keys().len(),
            "操作批次生成完成"
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnMapping, OperationKind};
    use std::collections::HashSet;

    fn row(row: usize, values: &[&str]) -> ImportRow {
        ImportRow {
            row,
            cells: values
                .iter()
                .enumerate()
                .map(|(i, v)| (i + 1, v.to_string()))
                .collect(),
            import: true,
        }
    }

    fn submission(mapping: &[&str]) -> MappingSubmission {
        MappingSubmission {
            column_mapping: ColumnMapping::new(mapping.iter().copied()),
            ..MappingSubmission::default()
        }
    }

    fn reconciler() -> MappingReconciler {
        MappingReconciler::new(vec!["tstamp".to_string(), "deleted".to_string()])
    }

    #[test]
    fn test_inserts_with_default_pid() {
        let rows = vec![row(1, &["Alice", "30"]), row(2, &["Bob", "40"])];
        let batch = reconciler().reconcile("person", &rows, &submission(&["name", "age"]), 7);

        let ops = batch.table("person").unwrap().operations();
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| op.kind == OperationKind::Insert));
        assert!(ops.iter().all(|op| op.key.starts_with(NEW_KEY_PREFIX)));
        assert_eq!(ops[0].field("name"), Some("Alice"));
        assert_eq!(ops[0].field("age"), Some("30"));
        assert_eq!(ops[0].field("pid"), Some("7"));
        assert_eq!(ops[1].field("name"), Some("Bob"));
        assert_ne!(ops[0].key, ops[1].key);
    }

    #[test]
    fn test_uid_column_makes_update() {
        let rows = vec![row(1, &["5", "30"]), row(2, &["", "40"])];
        let batch = reconciler().reconcile("person", &rows, &submission(&["uid", "age"]), 7);

        let ops = batch.table("person").unwrap().operations();
        assert_eq!(ops[0].kind, OperationKind::Update);
        assert_eq!(ops[0].key, "5");
        assert_eq!(ops[0].field("uid"), None);
        assert_eq!(ops[0].field("name"), None);
        assert_eq!(ops[0].field("age"), Some("30"));
        assert_eq!(ops[0].field("pid"), Some("7"));
        assert_eq!(ops[1].kind, OperationKind::Insert);
    }

    #[test]
    fn test_mapping_wins_over_override() {
        let rows = vec![row(1, &["Alice", "30"])];
        let mut sub = submission(&["name", "age"]);
        sub.overrides.insert("name".to_string(), "Override".to_string());
        sub.overrides.insert("city".to_string(), "Berlin".to_string());
        sub.overrides.insert("".to_string(), "x".to_string());
        sub.overrides.insert("country".to_string(), "".to_string());

        let batch = reconciler().reconcile("person", &rows, &sub, 1);
        let op = &batch.table("person").unwrap().operations()[0];
        assert_eq!(op.field("name"), Some("Alice"));
        assert_eq!(op.field("city"), Some("Berlin"));
        assert_eq!(op.field("country"), None);
    }

    #[test]
    fn test_disallowed_and_empty_mappings_dropped() {
        let rows = vec![row(1, &["Alice", "123", "x"])];
        let batch = reconciler().reconcile("person", &rows, &submission(&["name", "tstamp", ""]), 1);
        let op = &batch.table("person").unwrap().operations()[0];
        assert_eq!(op.fields.len(), 2);
        assert_eq!(op.field("tstamp"), None);
    }

    #[test]
    fn test_pid_override_and_mapped_pid() {
        let mut sub = submission(&["name"]);
        sub.overrides.insert("pid".to_string(), "42".to_string());
        let batch = reconciler().reconcile("person", &[row(1, &["A"])], &sub, 1);
        assert_eq!(batch.table("person").unwrap().operations()[0].field("pid"), Some("42"));

        let mut sub = submission(&["name", "pid"]);
        sub.overrides.insert("pid".to_string(), "42".to_string());
        let batch = reconciler().reconcile("person", &[row(1, &["A", "9"]), row(2, &["B", ""])], &sub, 1);
        let ops = batch.table("person").unwrap().operations();
        assert_eq!(ops[0].field("pid"), Some("9"));
        assert_eq!(ops[1].field("pid"), Some("1"));
    }

    #[test]
    fn test_password_override_disabled() {
        let mut sub = submission(&["name"]);
        sub.password_fields = vec!["secret".to_string()];
        sub.password_override = false;
        let batch = reconciler().reconcile("person", &[row(1, &["A"])], &sub, 1);
        assert_eq!(batch.table("person").unwrap().operations()[0].field("secret"), None);
    }

    #[test]
    fn test_password_override_generates_fresh_values() {
        let mut sub = submission(&["name"]);
        sub.password_fields = vec!["secret".to_string()];
        sub.password_override = true;
        let rows = vec![row(1, &["A"]), row(2, &["B"])];

        let first = reconciler().reconcile("person", &rows, &sub, 1);
        let second = reconciler().reconcile("person", &rows, &sub, 1);
        let a = first.table("person").unwrap().operations()[0].field("secret").unwrap().to_string();
        let b = second.table("person").unwrap().operations()[0].field("secret").unwrap().to_string();
        let c = first.table("person").unwrap().operations()[1].field("secret").unwrap().to_string();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_mapped_password_field_not_overwritten() {
        let mut sub = submission(&["name", "secret"]);
        sub.password_fields = vec!["secret".to_string()];
        sub.password_override = true;
        let batch = reconciler().reconcile("person", &[row(1, &["A", "hunter2"])], &sub, 1);
        assert_eq!(
            batch.table("person").unwrap().operations()[0].field("secret"),
            Some("hunter2")
        );
    }

    #[test]
    fn test_password_fields_never_touch_audit_or_key_fields() {
        let mut sub = submission(&["name"]);
        sub.password_fields = ["deleted", "tstamp", "uid", "pid", "secret"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        sub.password_override = true;

        let batch = reconciler().reconcile("person", &[row(1, &["A"])], &sub, 1);
        let op = &batch.table("person").unwrap().operations()[0];
        assert_eq!(op.field("deleted"), None);
        assert_eq!(op.field("tstamp"), None);
        assert_eq!(op.field("uid"), None);
        assert_eq!(op.field("pid"), Some("1"));
        assert_eq!(op.field("secret").map(str::len), Some(64));
        assert_eq!(op.kind, OperationKind::Insert);
    }

    #[test]
    fn test_skipped_rows_and_duplicate_keys() {
        let mut skipped = row(2, &["9", "x"]);
        skipped.import = false;
        let rows = vec![row(1, &["5", "30"]), skipped, row(3, &["5", "31"])];
        let batch = reconciler().reconcile("person", &rows, &submission(&["uid", "age"]), 1);

        let table = batch.table("person").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.operations()[0].field("age"), Some("31"));
        assert_eq!(table.duplicate_keys(), &["5".to_string()]);
    }

    #[test]
    fn test_synthetic_keys_unique() {
        let keys: HashSet<String> = (0..1000).map(|_| synthetic_key()).collect();
        assert_eq!(keys.len(), 1000);
    }
}
