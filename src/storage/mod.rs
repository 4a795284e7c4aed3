pub mod drive;
pub mod local;
#[cfg(test)]
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use drive::DriveStorage;
pub use local::{LocalFile, LocalLibrary};

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- 列表、元数据更新等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- 上传、下载
pub const IO_TIMEOUT_SECS: u64 = 300;
/// 云端根目录的默认名称
pub const DEFAULT_ROOT_FOLDER: &str = "Bookshell_Files";

/// 云端文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub description: Option<String>,
}

/// 云端目录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    pub id: String,
    pub name: String,
}

/// 云端存储抽象接口
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// 列出直接子目录（内部处理分页）
    async fn list_folders(&self, parent: &str) -> Result<Vec<RemoteFolder>>;

    /// 列出目录中的非目录对象（内部处理分页）
    async fn list_files(&self, parent: &str) -> Result<Vec<RemoteFile>>;

    /// 上传本地文件到指定目录，返回新对象 ID
    async fn upload(&self, local_path: &Path, parent: &str) -> Result<Option<String>>;

    /// 下载到目标路径；目标已存在时报错，不覆盖
    async fn download(&self, remote_id: &str, dest: &Path) -> Result<bool>;

    /// 移动到新的父目录
    async fn move_to(&self, remote_id: &str, new_parent: &str) -> Result<()>;

    /// 整体覆盖描述字段
    async fn set_description(&self, remote_id: &str, text: &str) -> Result<()>;

    /// 删除（移入回收站）
    async fn delete(&self, remote_id: &str) -> Result<bool>;

    /// 创建子目录；已存在时返回已有目录 ID
    async fn create_folder(&self, name: &str, parent: &str) -> Result<String>;

    /// 公开时返回分享链接，私有时返回 None
    async fn set_visibility(&self, remote_id: &str, public: bool) -> Result<Option<String>>;

    /// 查找或创建顶层根目录
    async fn ensure_root_folder(&self, name: &str) -> Result<String>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}
