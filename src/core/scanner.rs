use crate::core::catalog::CatalogEntry;
use crate::core::status::BookStatus;
use crate::storage::{LocalLibrary, RemoteStorage};
use anyhow::Result;
use tracing::{debug, info};

/// 书库扫描配置
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// 排除规则（glob patterns）
    pub exclude_patterns: Vec<String>,
    /// 仅包含的扩展名
    pub include_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                ".DS_Store".to_string(),
                "*.tmp".to_string(),
                "*.part".to_string(),
                "~*".to_string(),
            ],
            include_extensions: vec!["pdf".to_string(), "epub".to_string()],
        }
    }
}

/// 书库扫描器
#[derive(Debug, Default, Clone)]
pub struct FileScanner {
    config: ScanConfig,
}

impl FileScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// 检查路径是否应该被排除
    fn should_exclude(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        if self
            .config
            .exclude_patterns
            .iter()
            .any(|pattern| Self::matches_pattern(file_name, pattern))
        {
            return true;
        }

        let ext = std::path::Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        !self
            .config
            .include_extensions
            .iter()
            .any(|e| e.to_lowercase() == ext)
    }

    /// 简单的 glob 模式匹配（忽略大小写，只支持 *）
    fn matches_pattern(name: &str, pattern: &str) -> bool {
        let name = name.to_lowercase();
        let pattern = pattern.to_lowercase();

        if pattern.contains('*') {
            let regex_pattern = regex::escape(&pattern).replace("\\*", ".*");
            if let Ok(re) = regex::Regex::new(&format!("^{}$", regex_pattern)) {
                return re.is_match(&name);
            }
        }

        name == pattern
    }

    /// 扫描本地书库，按书名排序
    pub async fn scan_local(&self, library: &LocalLibrary) -> Result<Vec<CatalogEntry>> {
        info!("开始扫描本地书库: {}", library.name());

        let files = library.list_files().await?;
        let total = files.len();
        let mut entries: Vec<CatalogEntry> = files
            .into_iter()
            .filter(|file| {
                let excluded = self.should_exclude(&file.relative);
                if excluded {
                    debug!("排除文件: {}", file.relative);
                }
                !excluded
            })
            .filter_map(|file| {
                let name = file.path.file_name()?.to_str()?.to_string();
                let category = library.category_of(&file.path);
                Some(CatalogEntry::local(name, file.size, category, file.path))
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.local_path.cmp(&b.local_path)));

        info!(
            "本地扫描完成: {} 本书, {} 个被排除",
            entries.len(),
            total - entries.len()
        );
        Ok(entries)
    }

    /// 扫描云端根目录：根目录文件无分类，一级子目录名即分类
    pub async fn scan_remote(
        &self,
        storage: &dyn RemoteStorage,
        root_id: &str,
    ) -> Result<Vec<CatalogEntry>> {
        info!("开始扫描云端书库: {}, root: {}", storage.name(), root_id);

        let mut entries = Vec::new();
        for file in storage.list_files(root_id).await? {
            entries.push(CatalogEntry::remote(
                file.name,
                file.size,
                None,
                file.id,
                BookStatus::from_description(file.description.as_deref()),
            ));
        }

        let folders = storage.list_folders(root_id).await?;
        for folder in &folders {
            let files = storage.list_files(&folder.id).await?;
            debug!("分类 {}: {} 个文件", folder.name, files.len());
            for file in files {
                entries.push(CatalogEntry::remote(
                    file.name,
                    file.size,
                    Some(folder.name.clone()),
                    file.id,
                    BookStatus::from_description(file.description.as_deref()),
                ));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        info!(
            "云端扫描完成: {} 个文件, {} 个分类",
            entries.len(),
            folders.len()
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use std::fs;

    #[test]
    fn test_matches_pattern() {
        assert!(FileScanner::matches_pattern("notes.TMP", "*.tmp"));
        assert!(FileScanner::matches_pattern("~lock.pdf", "~*"));
        assert!(FileScanner::matches_pattern(".DS_Store", ".ds_store"));
        assert!(!FileScanner::matches_pattern("book.pdf", "*.tmp"));
        assert!(!FileScanner::matches_pattern("xpdf", "*.pdf.part"));
    }

    #[test]
    fn test_should_exclude_by_extension() {
        let scanner = FileScanner::new();
        assert!(!scanner.should_exclude("physics/b.PDF"));
        assert!(!scanner.should_exclude("c.epub"));
        assert!(scanner.should_exclude("notes.txt"));
        assert!(scanner.should_exclude("physics/b.pdf.part"));
        assert!(scanner.should_exclude("~b.pdf"));
    }

    #[tokio::test]
    async fn test_scan_local_derives_categories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("physics")).unwrap();
        fs::write(dir.path().join("a.pdf"), b"aaaa").unwrap();
        fs::write(dir.path().join("physics").join("b.pdf"), b"bb").unwrap();
        fs::write(dir.path().join("readme.txt"), b"x").unwrap();
        fs::write(dir.path().join("physics").join("c.epub.part"), b"x").unwrap();

        let library = LocalLibrary::new(dir.path());
        let entries = FileScanner::new().scan_local(&library).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.pdf");
        assert_eq!(entries[0].category, None);
        assert_eq!(entries[0].size, 4);
        assert_eq!(entries[1].name, "b.pdf");
        assert_eq!(entries[1].category.as_deref(), Some("physics"));
        assert!(entries.iter().all(|e| e.is_local_only()));
    }

    #[tokio::test]
    async fn test_scan_remote_maps_folders_and_status() {
        let storage = MemoryStorage::new("root");
        let id = storage.seed_file(Some("math"), "c.epub", b"123");
        storage.seed_file(None, "a.pdf", b"1");
        storage
            .set_description(&id, &BookStatus::Finished.to_description())
            .await
            .unwrap();

        let entries = FileScanner::new()
            .scan_remote(&storage, storage.root())
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.pdf");
        assert_eq!(entries[0].category, None);
        assert_eq!(entries[0].status, BookStatus::New);
        assert_eq!(entries[1].category.as_deref(), Some("math"));
        assert_eq!(entries[1].status, BookStatus::Finished);
        assert_eq!(entries[1].remote_id.as_deref(), Some(id.as_str()));
    }
}
