use crate::core::catalog::DEFAULT_CATEGORY;
use anyhow::Result;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// 本地扫描得到的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    /// 相对根目录的路径（统一使用 /）
    pub relative: String,
    pub size: u64,
}

/// 本地书库目录
#[derive(Debug, Clone)]
pub struct LocalLibrary {
    base_path: PathBuf,
    name: String,
}

impl LocalLibrary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let base_path = path.into();
        let name = format!("local:{}", base_path.display());
        Self { base_path, name }
    }

    pub fn root(&self) -> &Path {
        &self.base_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 规范化路径分隔符（统一使用 /）
    fn normalize_path(path: &str) -> String {
        path.replace('\\', "/")
    }

    /// 递归列出根目录下所有文件
    pub async fn list_files(&self) -> Result<Vec<LocalFile>> {
        let base = self.base_path.clone();
        if !base.exists() {
            return Ok(Vec::new());
        }

        // 使用 spawn_blocking 避免阻塞 async runtime
        let files = tokio::task::spawn_blocking(move || {
            WalkDir::new(&base)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|entry| {
                    let metadata = entry.metadata().ok()?;
                    let relative = entry.path().strip_prefix(&base).ok()?.to_str()?.to_string();
                    Some(LocalFile {
                        path: entry.path().to_path_buf(),
                        relative: Self::normalize_path(&relative),
                        size: metadata.len(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .await?;

        Ok(files)
    }

    /// 根目录下第一级子目录即分类；直接位于根目录的文件没有分类
    pub fn category_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let mut components = relative.components().filter(|c| matches!(c, Component::Normal(_)));
        let first = components.next()?;
        components.next()?;
        first.as_os_str().to_str().map(String::from)
    }

    /// 下载目标路径：`<root>/<分类或 General>/<书名>`
    pub fn destination(&self, category: Option<&str>, name: &str) -> PathBuf {
        self.base_path
            .join(category.unwrap_or(DEFAULT_CATEGORY))
            .join(name)
    }

    pub async fn create_category_dir(&self, category: Option<&str>) -> io::Result<PathBuf> {
        let dir = self.base_path.join(category.unwrap_or(DEFAULT_CATEGORY));
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// 把文件移到新分类目录，返回新路径
    pub async fn move_to_category(&self, path: &Path, category: &str) -> io::Result<PathBuf> {
        let file_name = path.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
        })?;
        let target_dir = self.create_category_dir(Some(category)).await?;
        let destination = target_dir.join(file_name);
        if destination == path {
            return Ok(destination);
        }
        // rename 会静默覆盖同名文件
        if fs::try_exists(&destination).await? {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", destination.display()),
            ));
        }

        if fs::rename(path, &destination).await.is_err() {
            // 跨文件系统时 rename 会失败，退化为复制后删除
            fs::copy(path, &destination).await?;
            fs::remove_file(path).await?;
        }
        Ok(destination)
    }

    pub async fn delete(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }
}
