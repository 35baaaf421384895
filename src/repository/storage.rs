// ==========================================
// 表格数据导入系统 - 上传文件存储
// ==========================================
// 职责: 保存上传的二进制文件并返回本地路径
// 重名策略: rename 追加 _NN 序号 / replace 覆盖 / fail 报错
// ==========================================

use crate::domain::{DuplicationBehavior, StoredFile};
use crate::repository::error::{RepositoryError, RepositoryResult};
use std::fs;
use std::path::{Path, PathBuf};

/// 改名策略下最多尝试的序号
const MAX_RENAME_ATTEMPTS: u32 = 99;

/// 文件名为空时使用的默认名
const FALLBACK_FILENAME: &str = "upload";

// ==========================================
// FileStorage Trait
// ==========================================
// 实现者: LocalFolderStorage（本地目录）
pub trait FileStorage: Send + Sync {
    /// 保存文件
    ///
    /// # 参数
    /// - bytes: 文件内容
    /// - filename: 上传时声明的文件名
    /// - policy: 重名处理策略
    ///
    /// # 返回
    /// - Ok(StoredFile): 存储后的文件引用
    /// - Err(FileExists): policy 为 fail 且目标文件已存在
    fn store(
        &self,
        bytes: &[u8],
        filename: &str,
        policy: DuplicationBehavior,
    ) -> RepositoryResult<StoredFile>;

    /// 解析文件引用对应的本地路径
    fn local_path(&self, file: &StoredFile) -> RepositoryResult<PathBuf>;
}

// ==========================================
// LocalFolderStorage
// ==========================================
#[derive(Debug, Clone)]
pub struct LocalFolderStorage {
    root: PathBuf,
}

impl LocalFolderStorage {
    /// 创建存储（目录不存在时自动创建）
    pub fn new<P: Into<PathBuf>>(root: P) -> RepositoryResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 清洗文件名：去掉目录部分，非安全字符替换为下划线
    pub fn sanitize_filename(filename: &str) -> String {
        let base = filename
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or("");
        let cleaned: String = base
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let cleaned = cleaned.trim_start_matches('.').to_string();
        if cleaned.is_empty() {
            FALLBACK_FILENAME.to_string()
        } else {
            cleaned
        }
    }

    /// 生成第 n 个候选文件名，如 "data_01.csv"
    fn numbered_name(filename: &str, n: u32) -> String {
        match filename.rfind('.') {
            Some(pos) if pos > 0 => {
                format!("{}_{:02}{}", &filename[..pos], n, &filename[pos..])
            }
            _ => format!("{}_{:02}", filename, n),
        }
    }

    fn resolve_target(&self, filename: &str, policy: DuplicationBehavior) -> RepositoryResult<String> {
        if !self.root.join(filename).exists() {
            return Ok(filename.to_string());
        }
        match policy {
            DuplicationBehavior::Replace => Ok(filename.to_string()),
            DuplicationBehavior::Fail => Err(RepositoryError::FileExists(filename.to_string())),
            DuplicationBehavior::Rename => (1..=MAX_RENAME_ATTEMPTS)
                .map(|n| Self::numbered_name(filename, n))
                .find(|candidate| !self.root.join(candidate).exists())
                .ok_or_else(|| {
                    RepositoryError::StorageError(format!("无可用的文件名: {}", filename))
                }),
        }
    }
}

impl FileStorage for LocalFolderStorage {
    fn store(
        &self,
        bytes: &[u8],
        filename: &str,
        policy: DuplicationBehavior,
    ) -> RepositoryResult<StoredFile> {
        let sanitized = Self::sanitize_filename(filename);
        let identifier = self.resolve_target(&sanitized, policy)?;
        let path = self.root.join(&identifier);
        fs::write(&path, bytes)?;

        tracing::debug!(
            file = %identifier,
            size = bytes.len(),
            policy = %policy,
            "上传文件已保存"
        );

        Ok(StoredFile { identifier, path })
    }

    fn local_path(&self, file: &StoredFile) -> RepositoryResult<PathBuf> {
        let path = self.root.join(&file.identifier);
        if path.is_file() {
            Ok(path)
        } else {
            Err(RepositoryError::NotFound {
                entity: "StoredFile".to_string(),
                id: file.identifier.clone(),
            })
        }
    }
}
