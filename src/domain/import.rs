// ==========================================
// 表格数据导入系统 - 导入请求与结果
// ==========================================
// 职责: 上传文件、操作员提交的映射请求、逐行导入数据、导入结果
// ==========================================

use crate::domain::types::DuplicationBehavior;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 覆盖值集合（字段名 → 字面值）
pub type OverrideSet = BTreeMap<String, String>;

// ==========================================
// UploadedFile - 上传文件
// ==========================================
// 上传时创建，被网格提取消费一次后即可丢弃
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// 声明的文件名
    pub name: String,
    /// 声明/探测到的类型提示（如 "text/csv"）
    pub content_type: Option<String>,
    /// 文件内容
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

// ==========================================
// StoredFile - 存储后的文件引用
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// 存储标识（相对上传目录的文件名）
    pub identifier: String,
    /// 本地路径
    pub path: PathBuf,
}

// ==========================================
// ColumnMapping - 列映射
// ==========================================
// 位置 i 对应网格第 i+1 列；值为字段名，空串表示未映射
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping(pub Vec<String>);

impl ColumnMapping {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }

    /// (网格列号, 字段名) 迭代器，列号从 1 开始
    pub fn columns(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0
            .iter()
            .enumerate()
            .map(|(idx, field)| (idx + 1, field.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ==========================================
// ImportRow - 单行待导入数据
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    /// 网格行号
    pub row: usize,
    /// 网格列号 → 值
    pub cells: BTreeMap<usize, String>,
    /// 是否导入该行
    pub import: bool,
}

impl ImportRow {
    pub fn cell(&self, col: usize) -> &str {
        self.cells.get(&col).map(String::as_str).unwrap_or("")
    }
}

// ==========================================
// RowFragment - 提交的数据片段（结构化）
// ==========================================
// 同一行可出现多个片段，按出现顺序合并，后到者覆盖
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFragment {
    pub row: usize,
    /// 列号（字符串形式）→ 值
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub import: Option<bool>,
}

// ==========================================
// FormPair - 提交的数据片段（表单序列化形式）
// ==========================================
// name 形如 "tx_import[dataset][3][2]" 或 "tx_import[dataset][3][import]"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPair {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

// ==========================================
// SubmittedDataset - 提交的数据集
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedDataset {
    Fragments(Vec<RowFragment>),
    FormPairs(Vec<FormPair>),
}

impl Default for SubmittedDataset {
    fn default() -> Self {
        SubmittedDataset::Fragments(Vec::new())
    }
}

// ==========================================
// UploadOptions - 上传阶段参数
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    /// 导入前删除目标容器下该表的已有记录
    #[serde(default)]
    pub delete_existing: bool,
    /// 分隔符文本按旧版单字节编码转码
    #[serde(default)]
    pub legacy_encoding: bool,
    /// 重名文件处理策略（None 取配置值）
    #[serde(default)]
    pub duplication_behavior: Option<DuplicationBehavior>,
}

// ==========================================
// MappingSubmission - 提交阶段参数
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSubmission {
    pub column_mapping: ColumnMapping,
    #[serde(default)]
    pub overrides: OverrideSet,
    /// 是否为敏感字段自动生成占位值
    #[serde(default)]
    pub password_override: bool,
    /// 敏感字段名（通常来自字段目录）
    #[serde(default)]
    pub password_fields: Vec<String>,
    /// 操作员提交的逐行数据（为空时按网格原样全部导入）
    #[serde(default)]
    pub dataset: SubmittedDataset,
}

// ==========================================
// ImportRequest - 一次性导入请求
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub upload: UploadOptions,
    pub mapping: MappingSubmission,
}

// ==========================================
// ImportOutcome - 导入结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub table: String,
    pub container_id: i64,
    /// 导入前删除的记录数
    pub deleted: usize,
    pub inserted: usize,
    pub updated: usize,
    /// 合成 key → 持久化引擎分配的 uid
    pub assigned_ids: BTreeMap<String, i64>,
    /// 批次内重复的 key
    pub duplicate_keys: Vec<String>,
    /// 存储后的文件
    pub stored_file: Option<StoredFile>,
}
