// ==========================================
// 表格数据导入系统 - 用户通知
// ==========================================
// 职责: 接收导入结果通知（成功/失败），供界面层展示
// 实现: 内存队列（可取出展示）与 tracing 日志输出
// ==========================================

use crate::domain::Severity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// 单条通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// NotificationSink Trait
// ==========================================
pub trait NotificationSink: Send + Sync {
    /// 投递一条通知（不得失败）
    fn enqueue(&self, severity: Severity, title: &str, message: &str);
}

// ==========================================
// MemoryNotificationQueue - 内存通知队列
// ==========================================
#[derive(Debug, Default)]
pub struct MemoryNotificationQueue {
    items: Mutex<Vec<Notification>>,
}

impl MemoryNotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // 锁中毒时仍然读取数据，通知队列只追加，不存在半写状态
    fn guard(&self) -> MutexGuard<'_, Vec<Notification>> {
        match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 当前队列内容（不清空）
    pub fn snapshot(&self) -> Vec<Notification> {
        self.guard().clone()
    }

    /// 取出全部通知并清空队列
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.guard())
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl NotificationSink for MemoryNotificationQueue {
    fn enqueue(&self, severity: Severity, title: &str, message: &str) {
        self.guard().push(Notification {
            severity,
            title: title.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        });
    }
}

// ==========================================
// TracingNotificationSink - 输出到日志
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn enqueue(&self, severity: Severity, title: &str, message: &str) {
        match severity {
            Severity::Error => tracing::error!(%severity, title, message, "导入通知"),
            Severity::Warning => tracing::warn!(%severity, title, message, "导入通知"),
            _ => tracing::info!(%severity, title, message, "导入通知"),
        }
    }
}
