use crate::core::catalog::CatalogEntry;
use crate::core::status::BookStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 书名映射记录（缓存，不作为权威来源）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub name: String,
    pub remote_id: Option<String>,
    pub local_path: Option<PathBuf>,
    pub category: Option<String>,
    pub status: BookStatus,
    pub updated_at: i64,
}

impl BookRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote_id: None,
            local_path: None,
            category: None,
            status: BookStatus::New,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn with_status(mut self, status: BookStatus) -> Self {
        self.status = status;
        self
    }

    /// 离线视图使用的目录条目；大小未知记为 0
    pub fn to_entry(&self) -> CatalogEntry {
        CatalogEntry {
            name: self.name.clone(),
            size: 0,
            category: self.category.clone(),
            local_path: self.local_path.clone(),
            remote_id: self.remote_id.clone(),
            status: self.status,
        }
    }
}

// 数据库表模型
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookRow {
    pub name: String,
    pub remote_id: Option<String>,
    pub local_path: Option<String>,
    pub category: Option<String>,
    pub status: String,
    pub updated_at: i64,
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        Self {
            name: row.name,
            remote_id: row.remote_id,
            local_path: row.local_path.map(PathBuf::from),
            category: row.category,
            status: BookStatus::from(row.status.as_str()),
            updated_at: row.updated_at,
        }
    }
}
