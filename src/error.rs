//! 错误类型

use crate::core::conflict::RemoteCandidate;
use std::path::PathBuf;
use thiserror::Error;

/// 书库操作结果
pub type Result<T> = std::result::Result<T, LibraryError>;

/// 书库操作错误
#[derive(Error, Debug)]
pub enum LibraryError {
    /// 未配置本地根目录或云端根目录，整个命令中止
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// 云端存在多个同名文件，必须由用户明确选择
    #[error("ambiguous match for '{name}': {} remote candidates", candidates.len())]
    AmbiguousMatch {
        name: String,
        candidates: Vec<RemoteCandidate>,
    },

    #[error("transfer failed for '{name}': {message}")]
    TransferFailure { name: String, message: String },

    /// 本地文件移动/删除失败，不回滚已完成的云端操作
    #[error("local I/O failed at {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 冲突决定与请求类型不匹配（例如候选序号越界）
    #[error("invalid decision for '{name}': {message}")]
    InvalidDecision { name: String, message: String },

    #[error("mapping store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("cancelled")]
    Cancelled,
}

impl LibraryError {
    pub fn transfer(name: &str, message: impl std::fmt::Display) -> Self {
        LibraryError::TransferFailure {
            name: name.to_string(),
            message: message.to_string(),
        }
    }

    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LibraryError::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// 配置级错误会中止整个命令，其余错误只影响单个条目
    pub fn is_fatal(&self) -> bool {
        matches!(self, LibraryError::NotConfigured(_) | LibraryError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(LibraryError::NotConfigured("local_path".into()).is_fatal());
        assert!(LibraryError::Store(anyhow::anyhow!("locked")).is_fatal());
        assert!(!LibraryError::NotFound("a.pdf".into()).is_fatal());
        assert!(!LibraryError::transfer("a.pdf", "timeout").is_fatal());
    }
}
