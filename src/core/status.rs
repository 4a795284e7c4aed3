//! 阅读状态与云端描述字段之间的编解码
//!
//! 状态以 `[reading]` / `[finished]` 标记写在云端文件的描述字段中。
//! 写入时整段描述被替换为固定模板，原有描述内容会丢失。

use serde::{Deserialize, Serialize};

/// 写入描述字段时使用的固定后缀
pub const DESCRIPTION_SUFFIX: &str = "Updated via Bookshell";

/// 阅读状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    New,
    Reading,
    Finished,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::New => "new",
            BookStatus::Reading => "reading",
            BookStatus::Finished => "finished",
        }
    }

    /// 从描述字段解码，缺失或无法识别时为 New
    pub fn from_description(description: Option<&str>) -> Self {
        match description {
            Some(desc) if desc.contains("[reading]") => BookStatus::Reading,
            Some(desc) if desc.contains("[finished]") => BookStatus::Finished,
            _ => BookStatus::New,
        }
    }

    /// 生成写回云端的完整描述
    pub fn to_description(&self) -> String {
        format!("[{}] {}", self.as_str(), DESCRIPTION_SUFFIX)
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for BookStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "reading" => BookStatus::Reading,
            "finished" => BookStatus::Finished,
            _ => BookStatus::New,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_markers() {
        assert_eq!(BookStatus::from_description(None), BookStatus::New);
        assert_eq!(BookStatus::from_description(Some("")), BookStatus::New);
        assert_eq!(
            BookStatus::from_description(Some("my notes [reading] chapter 3")),
            BookStatus::Reading
        );
        assert_eq!(
            BookStatus::from_description(Some("[finished] Updated via Bookshell")),
            BookStatus::Finished
        );
        assert_eq!(
            BookStatus::from_description(Some("[Reading] wrong case")),
            BookStatus::New
        );
    }

    #[test]
    fn test_encode_overwrites_whole_description() {
        assert_eq!(
            BookStatus::Reading.to_description(),
            "[reading] Updated via Bookshell"
        );
        let written = BookStatus::Finished.to_description();
        assert_eq!(
            BookStatus::from_description(Some(&written)),
            BookStatus::Finished
        );
        assert_eq!(
            BookStatus::from_description(Some(&BookStatus::New.to_description())),
            BookStatus::New
        );
    }

    #[test]
    fn test_lenient_parse() {
        assert_eq!(BookStatus::from("READING"), BookStatus::Reading);
        assert_eq!(BookStatus::from("finished"), BookStatus::Finished);
        assert_eq!(BookStatus::from("garbage"), BookStatus::New);
    }
}
