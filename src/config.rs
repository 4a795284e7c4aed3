//! 应用配置模块
//!
//! 数据目录与日志配置保存在 `config.json`；书库设置保存在数据库 `config` 表中，
//! 每个命令开始时读取一次。

use crate::db::{self, SqlitePool};
use crate::error::LibraryError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const KEY_LOCAL_PATH: &str = "local_path";
pub const KEY_ROOT_FOLDER_ID: &str = "root_folder_id";
pub const KEY_PREFERRED_READER: &str = "preferred_reader";
pub const KEY_MAX_CONCURRENT: &str = "max_concurrent_transfers";
pub const KEY_ACCESS_TOKEN: &str = "access_token";

/// 允许通过 `bookshell config --set` 修改的键
pub const SETTING_KEYS: [&str; 5] = [
    KEY_LOCAL_PATH,
    KEY_ROOT_FOLDER_ID,
    KEY_PREFERRED_READER,
    KEY_MAX_CONCURRENT,
    KEY_ACCESS_TOKEN,
];

/// 优先于数据库中 access_token 的环境变量
pub const TOKEN_ENV: &str = "BOOKSHELL_DRIVE_TOKEN";

pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// 默认数据目录
pub fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("bookshell"))
        .unwrap_or_else(|| PathBuf::from(".bookshell"))
}

/// 实际数据目录：`config.json` 中的 data_path 存在且是目录时使用它
pub fn resolve_data_dir() -> io::Result<PathBuf> {
    let default_dir = default_data_dir();
    fs::create_dir_all(&default_dir)?;

    let data_dir = read_section::<String>(&default_dir, "data_path")
        .map(PathBuf::from)
        .filter(|p| p.is_dir())
        .inspect(|p| debug!("使用自定义数据路径: {:?}", p))
        .unwrap_or(default_dir);

    fs::create_dir_all(&data_dir)?;
    Ok(data_dir)
}

fn read_config_file(config_dir: &Path) -> serde_json::Value {
    fs::read_to_string(config_dir.join("config.json"))
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_else(|| serde_json::json!({}))
}

/// 读取 `config.json` 中的一个键
pub fn read_section<T: DeserializeOwned>(config_dir: &Path, key: &str) -> Option<T> {
    read_config_file(config_dir)
        .get(key)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

/// 写入 `config.json` 中的一个键，保留其它内容
pub fn write_section<T: Serialize>(config_dir: &Path, key: &str, value: &T) -> io::Result<()> {
    let mut config = read_config_file(config_dir);
    if !config.is_object() {
        config = serde_json::json!({});
    }
    config[key] = serde_json::to_value(value).map_err(io::Error::other)?;

    let content = serde_json::to_string_pretty(&config).map_err(io::Error::other)?;
    fs::write(config_dir.join("config.json"), content)
}

/// 引擎所需的显式配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    pub local_root: PathBuf,
    pub remote_root: String,
    pub max_concurrent_transfers: usize,
}

/// 持久化的书库设置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub local_path: Option<PathBuf>,
    pub root_folder_id: Option<String>,
    pub preferred_reader: Option<String>,
    pub max_concurrent_transfers: Option<usize>,
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl Settings {
    pub async fn load(pool: &SqlitePool) -> anyhow::Result<Self> {
        Ok(Self {
            local_path: db::get_config(pool, KEY_LOCAL_PATH).await?.map(PathBuf::from),
            root_folder_id: db::get_config(pool, KEY_ROOT_FOLDER_ID).await?,
            preferred_reader: db::get_config(pool, KEY_PREFERRED_READER).await?,
            max_concurrent_transfers: db::get_config(pool, KEY_MAX_CONCURRENT)
                .await?
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0),
            access_token: db::get_config(pool, KEY_ACCESS_TOKEN).await?,
        })
    }

    /// 校验后写入单个设置
    pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> anyhow::Result<()> {
        if !SETTING_KEYS.contains(&key) {
            anyhow::bail!("unknown setting '{}', expected one of: {}", key, SETTING_KEYS.join(", "));
        }
        // 空值表示清除
        if value.trim().is_empty() {
            return db::delete_config(pool, key).await;
        }
        if key == KEY_MAX_CONCURRENT {
            match value.parse::<usize>() {
                Ok(n) if n > 0 => {}
                _ => anyhow::bail!("{} must be a positive integer", KEY_MAX_CONCURRENT),
            }
        }
        db::save_config(pool, key, value).await
    }

    /// 环境变量优先
    pub fn drive_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.access_token.clone())
    }

    pub fn library_config(&self) -> Result<LibraryConfig, LibraryError> {
        let local_root = self.local_path.clone().ok_or_else(|| {
            LibraryError::NotConfigured("local library path is not set, run `bookshell setup`".into())
        })?;
        let remote_root = self.root_folder_id.clone().ok_or_else(|| {
            LibraryError::NotConfigured("Drive root folder is not set, run `bookshell setup`".into())
        })?;

        Ok(LibraryConfig {
            local_root,
            remote_root,
            max_concurrent_transfers: self
                .max_concurrent_transfers
                .unwrap_or(DEFAULT_MAX_CONCURRENT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_config_requires_both_roots() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.library_config(),
            Err(LibraryError::NotConfigured(_))
        ));

        settings.local_path = Some(PathBuf::from("/books"));
        assert!(matches!(
            settings.library_config(),
            Err(LibraryError::NotConfigured(_))
        ));

        settings.root_folder_id = Some("root".into());
        let config = settings.library_config().unwrap();
        assert_eq!(config.local_root, PathBuf::from("/books"));
        assert_eq!(config.max_concurrent_transfers, DEFAULT_MAX_CONCURRENT);
    }

    #[tokio::test]
    async fn test_load_and_set() {
        let pool = db::connect_memory().await.unwrap();
        Settings::set(&pool, KEY_LOCAL_PATH, "/books").await.unwrap();
        Settings::set(&pool, KEY_MAX_CONCURRENT, "8").await.unwrap();
        assert!(Settings::set(&pool, KEY_MAX_CONCURRENT, "0").await.is_err());
        assert!(Settings::set(&pool, "colour", "red").await.is_err());
        Settings::set(&pool, KEY_ROOT_FOLDER_ID, "abc").await.unwrap();
        Settings::set(&pool, KEY_ROOT_FOLDER_ID, "").await.unwrap();

        let settings = Settings::load(&pool).await.unwrap();
        assert_eq!(settings.local_path, Some(PathBuf::from("/books")));
        assert_eq!(settings.max_concurrent_transfers, Some(8));
        assert_eq!(settings.root_folder_id, None);
    }

    #[test]
    fn test_sections_preserve_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        write_section(dir.path(), "data_path", &"/tmp/x").unwrap();
        write_section(dir.path(), "log", &serde_json::json!({ "enabled": false })).unwrap();

        assert_eq!(
            read_section::<String>(dir.path(), "data_path").as_deref(),
            Some("/tmp/x")
        );
        assert!(read_section::<serde_json::Value>(dir.path(), "log").is_some());
        assert_eq!(read_section::<String>(dir.path(), "missing"), None);
    }
}
