use anyhow::Context;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod logging;
pub mod reader;
pub mod storage;

pub use config::{LibraryConfig, Settings};
pub use crate::core::{Catalog, CatalogEntry, LibraryEngine, Outcome, SyncReport};
pub use error::LibraryError;

/// 应用状态，每个命令开始时创建
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// `data_dir` 由调用方解析（见 [`config::resolve_data_dir`]）
    pub async fn new(data_dir: PathBuf) -> anyhow::Result<Self> {
        let db = db::connect(&data_dir.join("bookshell.db"))
            .await
            .context("无法打开数据库")?;

        Ok(Self {
            db: Arc::new(db),
            data_dir,
        })
    }

    pub async fn settings(&self) -> anyhow::Result<Settings> {
        Settings::load(&self.db).await
    }

    /// Drive 客户端；未提供令牌视为未配置
    pub fn drive(&self, settings: &Settings) -> anyhow::Result<storage::DriveStorage> {
        let token = settings.drive_token().ok_or_else(|| {
            LibraryError::NotConfigured(format!(
                "no Drive access token, set {} or `bookshell config --set {}=...`",
                config::TOKEN_ENV,
                config::KEY_ACCESS_TOKEN
            ))
        })?;
        storage::DriveStorage::new(&token)
    }

    /// 按当前设置构建引擎
    pub async fn engine(&self) -> anyhow::Result<LibraryEngine> {
        let settings = self.settings().await?;
        let library = settings.library_config()?;
        let drive = self.drive(&settings)?;
        Ok(LibraryEngine::new(
            library,
            Arc::new(drive),
            db::MappingStore::new(self.db.clone()),
        ))
    }

    /// 关闭数据库连接池
    pub async fn cleanup(&self) {
        tracing::debug!("关闭数据库连接池...");
        self.db.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_uses_given_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(dir.path().to_path_buf()).await.unwrap();

        assert_eq!(state.data_dir, dir.path());
        assert!(dir.path().join("bookshell.db").exists());
        state.cleanup().await;
    }
}
