//! 电子书阅读器
//!
//! Foliate 之外的情况统一交给系统默认程序打开。

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

const FOLIATE_FLATPAK_ID: &str = "com.github.johnfactotum.Foliate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reader {
    Foliate,
    /// 平台默认打开方式，始终可用
    SystemDefault,
}

impl Reader {
    pub const ALL: [Reader; 2] = [Reader::Foliate, Reader::SystemDefault];

    pub fn name(&self) -> &'static str {
        match self {
            Reader::Foliate => "Foliate",
            Reader::SystemDefault => "System default",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn install_command(&self) -> Option<&'static str> {
        match self {
            Reader::Foliate => Some(
                "flatpak install flathub com.github.johnfactotum.Foliate -y || sudo apt install foliate -y",
            ),
            Reader::SystemDefault => None,
        }
    }

    pub fn is_installed(&self) -> bool {
        match self {
            Reader::Foliate => which::which("foliate").is_ok() || foliate_flatpak_installed(),
            Reader::SystemDefault => true,
        }
    }

    pub fn open(&self, path: &Path) -> Result<()> {
        info!("使用 {} 打开: {:?}", self.name(), path);
        match self {
            Reader::Foliate => {
                let mut command = if which::which("foliate").is_ok() {
                    Command::new("foliate")
                } else {
                    let mut c = Command::new("flatpak");
                    c.args(["run", FOLIATE_FLATPAK_ID]);
                    c
                };
                command
                    .arg(path)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .context("无法启动 Foliate")?;
                Ok(())
            }
            Reader::SystemDefault => {
                open::that(path).with_context(|| format!("无法打开 {}", path.display()))
            }
        }
    }
}

impl std::fmt::Display for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn foliate_flatpak_installed() -> bool {
    Command::new("flatpak")
        .args(["info", FOLIATE_FLATPAK_ID])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// 阅读器选择
#[derive(Debug, Clone, Default)]
pub struct ReaderManager {
    preferred: Option<String>,
}

impl ReaderManager {
    pub fn new(preferred: Option<String>) -> Self {
        Self { preferred }
    }

    /// 当前平台可用的阅读器；Foliate 仅限 Linux
    pub fn available(&self) -> Vec<Reader> {
        Reader::ALL
            .into_iter()
            .filter(|r| *r != Reader::Foliate || cfg!(target_os = "linux"))
            .collect()
    }

    pub fn installed(&self) -> Vec<Reader> {
        self.available()
            .into_iter()
            .filter(Reader::is_installed)
            .collect()
    }

    /// 已配置且可识别的优先，其次第一个已安装的专用阅读器，最后回退到系统默认
    pub fn preferred(&self) -> Reader {
        if let Some(reader) = self.preferred.as_deref().and_then(Reader::from_name) {
            return reader;
        }
        if let Some(name) = &self.preferred {
            warn!("未知的阅读器配置: {}", name);
        }
        self.installed()
            .into_iter()
            .find(|r| *r != Reader::SystemDefault)
            .unwrap_or(Reader::SystemDefault)
    }

    /// 校验名称，返回规范化后的阅读器
    pub fn set_preferred(&mut self, name: &str) -> Result<Reader> {
        let reader = Reader::from_name(name).with_context(|| {
            format!(
                "unknown reader '{}', expected one of: {}",
                name,
                Reader::ALL.map(|r| r.name()).join(", ")
            )
        })?;
        self.preferred = Some(reader.name().to_string());
        debug!("优先阅读器: {}", reader);
        Ok(reader)
    }

    /// 首选阅读器打开失败时回退到系统默认
    pub fn open(&self, path: &Path) -> Result<Reader> {
        let reader = self.preferred();
        match reader.open(path) {
            Ok(()) => Ok(reader),
            Err(e) if reader != Reader::SystemDefault => {
                warn!("{} 打开失败，改用系统默认: {}", reader, e);
                Reader::SystemDefault.open(path)?;
                Ok(Reader::SystemDefault)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(Reader::from_name("foliate"), Some(Reader::Foliate));
        assert_eq!(Reader::from_name(" System Default "), Some(Reader::SystemDefault));
        assert_eq!(Reader::from_name("calibre"), None);
    }

    #[test]
    fn test_system_default_always_available() {
        let manager = ReaderManager::default();
        assert!(manager.available().contains(&Reader::SystemDefault));
        assert!(manager.installed().contains(&Reader::SystemDefault));
        assert!(Reader::SystemDefault.install_command().is_none());
        assert!(Reader::Foliate.install_command().is_some());
    }

    #[test]
    fn test_configured_reader_wins() {
        let manager = ReaderManager::new(Some("foliate".into()));
        assert_eq!(manager.preferred(), Reader::Foliate);

        let manager = ReaderManager::new(Some("System default".into()));
        assert_eq!(manager.preferred(), Reader::SystemDefault);
    }

    #[test]
    fn test_set_preferred_validates() {
        let mut manager = ReaderManager::default();
        assert!(manager.set_preferred("okular").is_err());
        assert_eq!(manager.set_preferred("FOLIATE").unwrap(), Reader::Foliate);
        assert_eq!(manager.preferred(), Reader::Foliate);
    }
}
