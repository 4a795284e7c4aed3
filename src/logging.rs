//! 日志模块 - 提供文件日志和大小管理功能

use crate::config::{read_section, write_section};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

const LOG_FILE_NAME: &str = "bookshell.log";
const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志记录
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大日志文件大小（MB）
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    /// 从 `config.json` 的 "log" 键加载
    pub fn load(config_dir: &Path) -> Self {
        read_section(config_dir, "log").unwrap_or_default()
    }

    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        write_section(config_dir, "log", self)
    }

    /// 合并修改；大小限制在 1-100 MB
    pub fn apply(
        &mut self,
        enabled: Option<bool>,
        max_size_mb: Option<u32>,
        level: Option<&str>,
    ) -> anyhow::Result<()> {
        if let Some(level) = level {
            let level = level.to_lowercase();
            if !VALID_LEVELS.contains(&level.as_str()) {
                anyhow::bail!("无效的日志级别: {}", level);
            }
            self.level = level;
        }
        if let Some(e) = enabled {
            self.enabled = e;
        }
        if let Some(size) = max_size_mb {
            self.max_size_mb = size.clamp(1, 100);
        }
        Ok(())
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// 日志目录
pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// 超过大小上限时轮转为 `bookshell.log.old` 的写入器
#[derive(Clone)]
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    writer: Arc<Mutex<Option<BufWriter<File>>>>,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let file_path = log_dir.join(LOG_FILE_NAME);
        let max_size = (max_size_mb as u64) * 1024 * 1024;
        let writer = Self::open_file(&file_path, max_size)?;

        Ok(Self {
            file_path,
            max_size,
            writer: Arc::new(Mutex::new(Some(writer))),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn open_file(file_path: &Path, max_size: u64) -> io::Result<BufWriter<File>> {
        if fs::metadata(file_path).map(|m| m.len() > max_size).unwrap_or(false) {
            Self::rotate_log(file_path)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(file_path)?;
        Ok(BufWriter::new(file))
    }

    fn rotate_log(file_path: &Path) -> io::Result<()> {
        let backup_path = file_path.with_extension("log.old");
        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }
        fs::rename(file_path, &backup_path)
    }

    /// 锁中毒时继续使用内部数据，日志不应让程序崩溃
    fn lock(&self) -> MutexGuard<'_, Option<BufWriter<File>>> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn rotate_if_needed(&self, guard: &mut MutexGuard<'_, Option<BufWriter<File>>>) {
        let too_big = fs::metadata(&self.file_path)
            .map(|m| m.len() > self.max_size)
            .unwrap_or(false);
        if !too_big {
            return;
        }

        if let Some(mut w) = guard.take() {
            let _ = w.flush();
        }
        let _ = Self::rotate_log(&self.file_path);
        **guard = Self::open_file(&self.file_path, self.max_size).ok();
    }
}

impl Write for SizeRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.lock();
        let written = match guard.as_mut() {
            Some(writer) => {
                let n = writer.write(buf)?;
                writer.flush()?;
                n
            }
            None => return Err(io::Error::other("Writer not available")),
        };
        self.rotate_if_needed(&mut guard);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock().as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = SizeRotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_validates_and_clamps() {
        let mut config = LogConfig::default();
        config.apply(Some(false), Some(500), Some("DEBUG")).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.max_size_mb, 100);
        assert_eq!(config.level, "debug");
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);

        assert!(config.apply(None, None, Some("loud")).is_err());
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(LogConfig::load(dir.path()), LogConfig::default());

        let mut config = LogConfig::default();
        config.apply(None, Some(0), Some("warn")).unwrap();
        config.save(dir.path()).unwrap();

        let loaded = LogConfig::load(dir.path());
        assert_eq!(loaded.max_size_mb, 1);
        assert_eq!(loaded.level, "warn");
    }

    #[test]
    fn test_writer_rotates_past_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SizeRotatingWriter::new(dir.path(), 1).unwrap();
        let chunk = vec![b'x'; 600 * 1024];

        writer.write_all(&chunk).unwrap();
        assert!(!dir.path().join("bookshell.log.old").exists());

        writer.write_all(&chunk).unwrap();
        assert!(dir.path().join("bookshell.log.old").exists());
        assert_eq!(fs::metadata(writer.file_path()).unwrap().len(), 0);
    }
}
