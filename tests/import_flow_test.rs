// ==========================================
// 导入编排集成测试
// ==========================================
// 测试目标: 上传 → 网格 → 映射 → 钩子 → SQLite 持久化 全流程
// ==========================================


use anyhow::bail;
use record_import::domain::{
    ColumnMapping, DuplicationBehavior, FormPair, ImportRequest,
    MappingSubmission, OperationBatch, Severity, SubmittedDataset, UploadOptions, UploadedFile,
};
use record_import::importer::{HookContext, ImportError, ImportHook, RelationInjectionHook};
use record_import::logging;
use record_import::repository::{
    CommitResult, RecordRepository, RepositoryError, RepositoryResult,
};
use std::sync::Arc;
use test_helpers::{
    create_test_env, create_test_env_with_hooks, create_test_env_with_records,
    insert_existing_user, TEST_CONTAINER_ID,
};

const USERS_CSV: &[u8] = b"name,age\nAlice,30\nBob,40\n";

fn request(mapping: &[&str]) -> ImportRequest {
    ImportRequest {
        upload: UploadOptions::default(),
        mapping: MappingSubmission {
            column_mapping: ColumnMapping::new(mapping.iter().copied()),
            ..MappingSubmission::default()
        },
    }
}

fn users_upload() -> UploadedFile {
    UploadedFile::new("users.csv", USERS_CSV.to_vec())
}

// ==========================================
// 基本场景
// ==========================================

#[test]
fn test_inserts_rows_with_default_container() {
    logging::init_test();
    let env = create_test_env().unwrap();

    let outcome = env
        .orchestrator
        .run("fe_users", TEST_CONTAINER_ID, &users_upload(), &request(&["name", "age"]))
        .unwrap();

    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.updated, 0);
    assert_eq!(outcome.assigned_ids.len(), 2);
    assert!(outcome.duplicate_keys.is_empty());

    let users = env.fe_users();
    assert_eq!(users.len(), 2);
    assert_eq!((users[0].1, users[0].2.as_str(), users[0].3.as_str()), (5, "Alice", "30"));
    assert_eq!((users[1].1, users[1].2.as_str(), users[1].3.as_str()), (5, "Bob", "40"));

    // 未开启占位密码时不生成密码
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM fe_users WHERE password IS NOT NULL"), 0);

    let notifications = env.notifications.snapshot();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].severity, Severity::Ok);
}

#[test]
fn test_uid_column_updates_existing_record() {
    logging::init_test();
    let env = create_test_env().unwrap();
    let uid = insert_existing_user(&env, TEST_CONTAINER_ID, "Alice", "20");

    let csv = format!("uid,age\n{},30\n", uid);
    let upload = UploadedFile::new("update.csv", csv.into_bytes());
    let outcome = env
        .orchestrator
        .run("fe_users", TEST_CONTAINER_ID, &upload, &request(&["uid", "age"]))
        .unwrap();

    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.updated, 1);

    let users = env.fe_users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0], (uid, 5, "Alice".to_string(), "30".to_string()));
}

#[test]
fn test_update_of_missing_uid_changes_nothing() {
    let env = create_test_env().unwrap();
    let upload = UploadedFile::new("update.csv", b"uid,age\n999,30\n".to_vec());
    let outcome = env
        .orchestrator
        .run("fe_users", TEST_CONTAINER_ID, &upload, &request(&["uid", "age"]))
        .unwrap();

    assert_eq!(outcome.updated, 0);
    assert!(env.fe_users().is_empty());
}

#[test]
fn test_password_override_fills_sensitive_field() {
    let env = create_test_env().unwrap();
    let mut req = request(&["name", "age"]);
    req.mapping.password_override = true;

    env.orchestrator
        .run("fe_users", TEST_CONTAINER_ID, &users_upload(), &req)
        .unwrap();

    let conn = env.conn();
    let mut stmt = conn.prepare("SELECT password FROM fe_users ORDER BY uid").unwrap();
    let secrets: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(secrets.len(), 2);
    assert!(secrets.iter().all(|s| s.len() == 64));
    assert_ne!(secrets[0], secrets[1]);
}

#[test]
fn test_password_fields_limited_to_declared_sensitive_fields() {
    let env = create_test_env().unwrap();
    let mut req = request(&["name", "age"]);
    req.mapping.password_override = true;
    req.mapping.password_fields = vec![
        "deleted".to_string(),
        "tstamp".to_string(),
        "name".to_string(),
        "password".to_string(),
    ];

    env.orchestrator
        .run("fe_users", TEST_CONTAINER_ID, &users_upload(), &req)
        .unwrap();

    // 审计字段保持默认值，记录仍可见
    let users = env.fe_users();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].2, "Alice");
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM fe_users WHERE tstamp = 0"), 2);
    assert_eq!(
        env.query_i64("SELECT COUNT(*) FROM fe_users WHERE length(password) = 64"),
        2
    );
}

#[test]
fn test_undeclared_password_fields_generate_nothing() {
    let env = create_test_env().unwrap();
    let mut req = request(&["name", "age"]);
    req.mapping.password_override = true;
    req.mapping.password_fields = vec!["deleted".to_string(), "email".to_string()];

    env.orchestrator
        .run("fe_users", TEST_CONTAINER_ID, &users_upload(), &req)
        .unwrap();

    assert_eq!(env.fe_users().len(), 2);
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM fe_users WHERE email IS NOT NULL"), 0);
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM fe_users WHERE password IS NOT NULL"), 0);
}

#[test]
fn test_override_fills_unmapped_field_only() {
    let env = create_test_env().unwrap();
    let mut req = request(&["name", "age"]);
    req.mapping.overrides.insert("age".to_string(), "99".to_string());
    req.mapping.overrides.insert("email".to_string(), "team@example.org".to_string());
    req.mapping.overrides.insert("tstamp".to_string(), "123".to_string());

    env.orchestrator
        .run("fe_users", TEST_CONTAINER_ID, &users_upload(), &req)
        .unwrap();

    let users = env.fe_users();
    assert_eq!(users[0].3, "30");
    assert_eq!(
        env.query_i64("SELECT COUNT(*) FROM fe_users WHERE email = 'team@example.org'"),
        2
    );
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM fe_users WHERE tstamp = 123"), 0);
}

#[test]
fn test_semicolon_file_and_root_container() {
    let env = create_test_env().unwrap();
    let upload = UploadedFile::new("addresses.csv", b"name;city\nAda;London\n".to_vec());

    let outcome = env
        .orchestrator
        .run("tt_address", 0, &upload, &request(&["name", "city"]))
        .unwrap();

    assert_eq!(outcome.inserted, 1);
    assert_eq!(
        env.query_i64("SELECT COUNT(*) FROM tt_address WHERE pid = 0 AND city = 'London'"),
        1
    );
}

// ==========================================
// 两步导入与提交数据集
// ==========================================

#[test]
fn test_prepare_then_submit_with_form_pairs() {
    let env = create_test_env().unwrap();
    let session = env
        .orchestrator
        .prepare("fe_users", TEST_CONTAINER_ID, &users_upload(), &UploadOptions::default())
        .unwrap();

    assert_eq!(session.grid.rows, 3);
    assert_eq!(session.grid.cols, 2);
    assert_eq!(session.grid.header, vec!["name".to_string(), "age".to_string()]);
    assert!(session.catalog.contains("uid"));
    assert!(session.catalog.contains("pid"));
    assert!(!session.catalog.contains("tstamp"));
    assert!(session.catalog.has_sensitive_field());

    // 只勾选第 1 行，并修改其年龄；后到的值覆盖先到的值
    let pairs = vec![
        FormPair { name: "tx_import[dataset][1][2]".to_string(), value: "31".to_string() },
        FormPair { name: "tx_import[dataset][1][2]".to_string(), value: "32".to_string() },
        FormPair { name: "tx_import[dataset][1][import]".to_string(), value: "1".to_string() },
        FormPair { name: "tx_import[dataset][2][1]".to_string(), value: "Bobby".to_string() },
    ];
    let submission = MappingSubmission {
        column_mapping: ColumnMapping::new(["name", "age"]),
        dataset: SubmittedDataset::FormPairs(pairs),
        ..MappingSubmission::default()
    };

    let outcome = env.orchestrator.submit(&session, &submission).unwrap();
    assert_eq!(outcome.inserted, 1);
    assert_eq!(env.fe_users()[0].2, "Alice");
    assert_eq!(env.fe_users()[0].3, "32");
}

#[test]
fn test_delete_existing_before_import() {
    let env = create_test_env().unwrap();
    insert_existing_user(&env, TEST_CONTAINER_ID, "Old", "1");
    insert_existing_user(&env, 6, "Elsewhere", "1");

    let mut req = request(&["name", "age"]);
    req.upload.delete_existing = true;
    let outcome = env
        .orchestrator
        .run("fe_users", TEST_CONTAINER_ID, &users_upload(), &req)
        .unwrap();

    assert_eq!(outcome.deleted, 1);
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM fe_users WHERE deleted = 1"), 1);
    assert_eq!(
        env.query_i64("SELECT COUNT(*) FROM fe_users WHERE deleted = 0 AND pid = 5"),
        2
    );
    assert_eq!(env.query_i64("SELECT COUNT(*) FROM fe_users WHERE pid = 6 AND deleted = 0"), 1);
}

/// 查询/删除已有记录总是失败，提交转给真实引擎
struct PurgeFailingRecords {
    inner: Arc<dyn RecordRepository>,
    fail_query: bool,
}

impl RecordRepository for PurgeFailingRecords {
    fn commit(&self, batch: &OperationBatch) -> RepositoryResult<CommitResult> {
        self.inner.commit(batch)
    }

    fn query_identifiers(&self, schema: &str, container_id: i64) -> RepositoryResult<Vec<String>> {
        if self.fail_query {
            return Err(RepositoryError::DatabaseQueryError("table locked".to_string()));
        }
        self.inner.query_identifiers(schema, container_id)
    }

    fn delete(&self, _schema: &str, _ids: &[String]) -> RepositoryResult<usize> {
        Err(RepositoryError::DatabaseTransactionError("delete rejected".to_string()))
    }
}

#[test]
fn test_failed_delete_existing_does_not_abort_import() {
    for fail_query in [true, false] {
        let env = create_test_env_with_records(|inner| {
            Arc::new(PurgeFailingRecords { inner, fail_query })
        })
        .unwrap();
        insert_existing_user(&env, TEST_CONTAINER_ID, "Old", "1");

        let mut req = request(&["name", "age"]);
        req.upload.delete_existing = true;
        let outcome = env
            .orchestrator
            .run("fe_users", TEST_CONTAINER_ID, &users_upload(), &req)
            .unwrap();

        assert_eq!(outcome.deleted, 0);
        assert_eq!(outcome.inserted, 2);
        let names: Vec<String> = env.fe_users().into_iter().map(|u| u.2).collect();
        assert_eq!(names, vec!["Old", "Alice", "Bob"]);
        let notifications = env.notifications.snapshot();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].severity, Severity::Ok);
    }
}

// ==========================================
// 文件存储策略
// ==========================================

#[test]
fn test_duplicate_file_names_are_renamed() {
    let env = create_test_env().unwrap();
    let options = UploadOptions::default();

    let first = env
        .orchestrator
        .prepare("fe_users", TEST_CONTAINER_ID, &users_upload(), &options)
        .unwrap();
    let second = env
        .orchestrator
        .prepare("fe_users", TEST_CONTAINER_ID, &users_upload(), &options)
        .unwrap();

    assert_eq!(first.stored_file.identifier, "users.csv");
    assert_eq!(second.stored_file.identifier, "users_01.csv");
    assert!(env.upload_dir.path().join("users_01.csv").exists());
}

#[test]
fn test_fail_policy_rejects_existing_file() {
    let env = create_test_env().unwrap();
    env.orchestrator
        .prepare("fe_users", TEST_CONTAINER_ID, &users_upload(), &UploadOptions::default())
        .unwrap();

    let options = UploadOptions {
        duplication_behavior: Some(DuplicationBehavior::Fail),
        ..UploadOptions::default()
    };
    let result = env
        .orchestrator
        .prepare("fe_users", TEST_CONTAINER_ID, &users_upload(), &options);
    assert!(matches!(result, Err(ImportError::StorageConflict(_))));
}

// ==========================================
// 失败场景
// ==========================================

#[test]
fn test_ineligible_targets_write_nothing() {
    let env = create_test_env().unwrap();
    let req = request(&["name", "age"]);

    // fe_users 不允许在根容器下导入
    let result = env.orchestrator.run("fe_users", 0, &users_upload(), &req);
    assert!(matches!(result, Err(ImportError::InvalidTarget(_))));

    // be_users 默认禁止导入
    let result = env.orchestrator.run("be_users", 0, &users_upload(), &req);
    assert!(matches!(result, Err(ImportError::InvalidTarget(_))));

    // 未注册
    let result = env.orchestrator.run("pages", TEST_CONTAINER_ID, &users_upload(), &req);
    assert!(matches!(result, Err(ImportError::InvalidTarget(_))));

    assert!(env.fe_users().is_empty());
    let notifications = env.notifications.snapshot();
    assert_eq!(notifications.len(), 3);
    assert!(notifications.iter().all(|n| n.severity == Severity::Error));
    assert_eq!(std::fs::read_dir(env.upload_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_unreadable_file() {
    let env = create_test_env().unwrap();
    let upload = UploadedFile::new("data.bin", vec![0x00, 0x01, 0x02]);
    let result = env
        .orchestrator
        .run("fe_users", TEST_CONTAINER_ID, &upload, &request(&["name"]));
    assert!(matches!(result, Err(ImportError::UnreadableFile(_))));
    assert!(env.fe_users().is_empty());
}

struct RejectingHook;

impl ImportHook for RejectingHook {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn apply(&self, _: &mut OperationBatch, _: &str, _: &HookContext) -> anyhow::Result<()> {
        bail!("external directory offline")
    }
}

#[test]
fn test_hook_failure_commits_nothing() {
    let env = create_test_env_with_hooks(vec![Arc::new(RejectingHook)]).unwrap();
    let result = env.orchestrator.run(
        "fe_users",
        TEST_CONTAINER_ID,
        &users_upload(),
        &request(&["name", "age"]),
    );

    match result {
        Err(ImportError::HookFailure { hook, message }) => {
            assert_eq!(hook, "rejecting");
            assert!(message.contains("external directory offline"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(env.fe_users().is_empty());
    assert_eq!(env.notifications.snapshot()[0].severity, Severity::Error);
}

#[test]
fn test_relation_hook_writes_junction_rows() {
    let hook = RelationInjectionHook::new("fe_users", "usergroup", "fe_users_group_mm");
    let env = create_test_env_with_hooks(vec![Arc::new(hook)]).unwrap();
    let upload = UploadedFile::new("groups.csv", b"name,groups\nAlice,\"3,4\"\n".to_vec());

    let outcome = env
        .orchestrator
        .run("fe_users", TEST_CONTAINER_ID, &upload, &request(&["name", "usergroup"]))
        .unwrap();

    assert_eq!(outcome.inserted, 3);
    let uid = env.fe_users()[0].0;
    assert_eq!(
        env.query_i64(&format!(
            "SELECT COUNT(*) FROM fe_users_group_mm WHERE uid_local = {} AND pid = 5",
            uid
        )),
        2
    );
    assert_eq!(
        env.query_i64("SELECT uid_foreign FROM fe_users_group_mm WHERE sorting = 2"),
        4
    );
}
