// ==========================================
// 表格数据导入系统 - 领域类型定义
// ==========================================
// 职责: 导入流程中跨层共享的枚举类型
// 序列化格式: snake_case (与请求参数/配置文件一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 根级放置约束 (Root Level Constraint)
// ==========================================
// 决定某个 schema 能否在根容器/普通容器下导入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RootLevel {
    /// 根容器与普通容器均可
    Any,
    /// 仅根容器
    RootOnly,
    /// 仅非根容器（未声明约束时的默认值）
    #[default]
    NonRootOnly,
}

impl RootLevel {
    /// 判断该约束是否允许在目标容器下导入
    ///
    /// # 参数
    /// - container_is_root: 目标容器是否为根容器
    pub fn permits(&self, container_is_root: bool) -> bool {
        match self {
            RootLevel::Any => true,
            RootLevel::RootOnly => container_is_root,
            RootLevel::NonRootOnly => !container_is_root,
        }
    }
}

// ==========================================
// 重名文件处理策略 (Duplicate Filename Policy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicationBehavior {
    /// 重名时自动改名（默认）
    #[default]
    Rename,
    /// 覆盖已有文件
    Replace,
    /// 直接失败
    Fail,
}

impl fmt::Display for DuplicationBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicationBehavior::Rename => write!(f, "rename"),
            DuplicationBehavior::Replace => write!(f, "replace"),
            DuplicationBehavior::Fail => write!(f, "fail"),
        }
    }
}

impl FromStr for DuplicationBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rename" => Ok(DuplicationBehavior::Rename),
            "replace" => Ok(DuplicationBehavior::Replace),
            "fail" | "cancel" => Ok(DuplicationBehavior::Fail),
            other => Err(format!("未知的重名处理策略: {}", other)),
        }
    }
}

// ==========================================
// 列数统计口径 (Column Extent Mode)
// ==========================================
// ExistingCellCount: 每行非空单元格个数的最大值（历史行为，默认）
// MaxColumnIndex: 非空单元格最大列号（修正口径，行内有空洞时列不会错位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColumnExtentMode {
    #[default]
    ExistingCellCount,
    MaxColumnIndex,
}

impl FromStr for ColumnExtentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "existing_cell_count" => Ok(ColumnExtentMode::ExistingCellCount),
            "max_column_index" => Ok(ColumnExtentMode::MaxColumnIndex),
            other => Err(format!("未知的列数统计口径: {}", other)),
        }
    }
}

// ==========================================
// 通知级别 (Notification Severity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Notice,
    Info,
    Ok,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Notice => write!(f, "NOTICE"),
            Severity::Info => write!(f, "INFO"),
            Severity::Ok => write!(f, "OK"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}
