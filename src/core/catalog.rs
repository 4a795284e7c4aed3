//! 书库目录：合并本地与云端列表、计算差异

use crate::core::status::BookStatus;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 未分类书籍在比较和下载目录中使用的分类名
pub const DEFAULT_CATEGORY: &str = "General";

/// 目录条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,
    pub size: u64,
    pub category: Option<String>,
    pub local_path: Option<PathBuf>,
    pub remote_id: Option<String>,
    pub status: BookStatus,
}

/// 同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Synced,
    LocalOnly,
    RemoteOnly,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Synced => write!(f, "synced"),
            SyncState::LocalOnly => write!(f, "local only"),
            SyncState::RemoteOnly => write!(f, "remote only"),
        }
    }
}

impl CatalogEntry {
    pub fn local(
        name: impl Into<String>,
        size: u64,
        category: Option<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            category,
            local_path: Some(path.into()),
            remote_id: None,
            status: BookStatus::New,
        }
    }

    pub fn remote(
        name: impl Into<String>,
        size: u64,
        category: Option<String>,
        remote_id: impl Into<String>,
        status: BookStatus,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            category,
            local_path: None,
            remote_id: Some(remote_id.into()),
            status,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.local_path.is_some() && self.remote_id.is_some()
    }

    pub fn is_local_only(&self) -> bool {
        self.local_path.is_some() && self.remote_id.is_none()
    }

    pub fn is_remote_only(&self) -> bool {
        self.remote_id.is_some() && self.local_path.is_none()
    }

    /// 合并目录中的条目至少有一侧存在，因此总能得到状态
    pub fn sync_state(&self) -> Option<SyncState> {
        match (self.local_path.is_some(), self.remote_id.is_some()) {
            (true, true) => Some(SyncState::Synced),
            (true, false) => Some(SyncState::LocalOnly),
            (false, true) => Some(SyncState::RemoteOnly),
            (false, false) => None,
        }
    }

    /// 展示用的分类名
    pub fn display_category(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }
}

/// 仅用于比较的分类归一化：忽略大小写，缺失视为 General
pub fn normalize_category(category: Option<&str>) -> String {
    category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .trim()
        .to_lowercase()
}

pub fn same_category(a: Option<&str>, b: Option<&str>) -> bool {
    normalize_category(a) == normalize_category(b)
}

/// 合并后的书库视图，按书名排序
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
    /// 云端同名对象全部保留，供冲突处理使用
    remote: BTreeMap<String, Vec<CatalogEntry>>,
}

impl Catalog {
    /// 左偏合并：先放入本地条目，再用云端条目补充 ID 与状态。
    /// 本地分类优先，云端仅在本地没有分类时填补。
    /// 同名条目只取第一份，其余云端副本只记为候选。
    pub fn merge(local: &[CatalogEntry], remote: &[CatalogEntry]) -> Self {
        let mut entries: BTreeMap<String, CatalogEntry> = BTreeMap::new();
        let mut candidates: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();

        for entry in local {
            entries
                .entry(entry.name.clone())
                .or_insert_with(|| entry.clone());
        }

        for entry in remote {
            candidates
                .entry(entry.name.clone())
                .or_default()
                .push(entry.clone());

            match entries.get_mut(&entry.name) {
                Some(existing) if existing.remote_id.is_some() => {}
                Some(existing) => {
                    existing.remote_id = entry.remote_id.clone();
                    existing.status = entry.status;
                    if existing.category.is_none() {
                        existing.category = entry.category.clone();
                    }
                }
                None => {
                    entries.insert(entry.name.clone(), entry.clone());
                }
            }
        }

        Self {
            entries,
            remote: candidates,
        }
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn into_entries(self) -> Vec<CatalogEntry> {
        self.entries.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 云端与该书名对应的全部对象
    pub fn remote_candidates(&self, name: &str) -> &[CatalogEntry] {
        self.remote.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_remote_duplicates(&self, name: &str) -> bool {
        self.remote_candidates(name).len() > 1
    }

    /// 只看存在性：本地独有的待上传，云端独有的待下载
    pub fn diff(&self) -> Diff {
        let mut diff = Diff::default();
        for entry in self.entries.values() {
            if entry.is_local_only() {
                diff.to_upload.push(entry.clone());
            } else if entry.is_remote_only() {
                diff.to_download.push(entry.clone());
            }
        }
        diff
    }
}

/// 差异结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    pub to_upload: Vec<CatalogEntry>,
    pub to_download: Vec<CatalogEntry>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty() && self.to_download.is_empty()
    }

    pub fn upload_bytes(&self) -> u64 {
        self.to_upload.iter().map(|e| e.size).sum()
    }

    pub fn download_bytes(&self) -> u64 {
        self.to_download.iter().map(|e| e.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str, category: Option<&str>) -> CatalogEntry {
        CatalogEntry::local(
            name,
            10,
            category.map(String::from),
            format!("/books/{}/{}", category.unwrap_or(""), name),
        )
    }

    fn remote(name: &str, category: Option<&str>, id: &str) -> CatalogEntry {
        CatalogEntry::remote(name, 10, category.map(String::from), id, BookStatus::New)
    }

    #[test]
    fn test_local_category_wins_remote_fills_gaps() {
        let locals = vec![local("a.pdf", Some("math")), local("b.pdf", None)];
        let remotes = vec![
            CatalogEntry::remote("a.pdf", 10, Some("physics".into()), "r1", BookStatus::Reading),
            remote("b.pdf", Some("history"), "r2"),
        ];

        let catalog = Catalog::merge(&locals, &remotes);

        let a = catalog.get("a.pdf").unwrap();
        assert_eq!(a.category.as_deref(), Some("math"));
        assert_eq!(a.remote_id.as_deref(), Some("r1"));
        assert_eq!(a.status, BookStatus::Reading);

        let b = catalog.get("b.pdf").unwrap();
        assert_eq!(b.category.as_deref(), Some("history"));
        assert!(b.is_synced());
    }

    #[test]
    fn test_sync_states_are_exclusive_and_exhaustive() {
        let locals = vec![local("a.pdf", None), local("both.epub", Some("x"))];
        let remotes = vec![remote("both.epub", Some("x"), "r1"), remote("z.pdf", None, "r2")];

        let catalog = Catalog::merge(&locals, &remotes);
        assert_eq!(catalog.len(), 3);

        for entry in catalog.entries() {
            let flags = [entry.is_synced(), entry.is_local_only(), entry.is_remote_only()];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{}", entry.name);
            assert!(entry.sync_state().is_some());
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let locals = vec![local("a.pdf", None), local("c.pdf", Some("math"))];
        let remotes = vec![remote("c.pdf", None, "r1"), remote("d.pdf", Some("art"), "r2")];

        let first = Catalog::merge(&locals, &remotes).into_entries();
        let second = Catalog::merge(&locals, &remotes).into_entries();
        assert_eq!(first, second);
    }

    #[test]
    fn test_entries_sorted_by_name() {
        let locals = vec![local("zeta.pdf", None), local("alpha.pdf", None)];
        let remotes = vec![remote("mid.epub", None, "r1")];
        let names: Vec<_> = Catalog::merge(&locals, &remotes)
            .entries()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(names, vec!["alpha.pdf", "mid.epub", "zeta.pdf"]);
    }

    #[test]
    fn test_diff_excludes_entries_present_on_both_sides() {
        let locals = vec![local("shared.pdf", None), local("mine.pdf", None)];
        let remotes = vec![remote("shared.pdf", Some("other"), "r1"), remote("theirs.pdf", None, "r2")];

        let diff = Catalog::merge(&locals, &remotes).diff();
        let up: Vec<_> = diff.to_upload.iter().map(|e| e.name.as_str()).collect();
        let down: Vec<_> = diff.to_download.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(up, vec!["mine.pdf"]);
        assert_eq!(down, vec!["theirs.pdf"]);
    }

    #[test]
    fn test_diff_with_empty_remote() {
        let locals = vec![local("a.pdf", None), local("b.pdf", Some("physics"))];
        let diff = Catalog::merge(&locals, &[]).diff();

        assert!(diff.to_download.is_empty());
        assert_eq!(diff.to_upload.len(), 2);
        assert_eq!(diff.to_upload[0].name, "a.pdf");
        assert_eq!(diff.to_upload[0].category, None);
        assert_eq!(diff.to_upload[1].name, "b.pdf");
        assert_eq!(diff.to_upload[1].category.as_deref(), Some("physics"));
    }

    #[test]
    fn test_remote_duplicates_are_kept_as_candidates() {
        let remotes = vec![remote("c.epub", Some("math"), "r1"), remote("c.epub", None, "r2")];
        let catalog = Catalog::merge(&[], &remotes);

        assert_eq!(catalog.len(), 1);
        assert!(catalog.has_remote_duplicates("c.epub"));
        let ids: Vec<_> = catalog
            .remote_candidates("c.epub")
            .iter()
            .filter_map(|e| e.remote_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["r1", "r2"]);

        // 合并后的条目来自同一份副本，分类与 ID 不会错配
        let merged = catalog.get("c.epub").unwrap();
        assert_eq!(merged.remote_id.as_deref(), Some("r1"));
        assert_eq!(merged.category.as_deref(), Some("math"));
    }

    #[test]
    fn test_duplicate_local_names_keep_first_copy() {
        let locals = vec![local("x.pdf", Some("math")), local("x.pdf", Some("physics"))];
        let catalog = Catalog::merge(&locals, &[]);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("x.pdf").unwrap().category.as_deref(), Some("math"));
    }

    #[test]
    fn test_category_comparison() {
        assert!(same_category(None, Some("general")));
        assert!(same_category(Some("Physics"), Some("physics")));
        assert!(same_category(Some(""), None));
        assert!(!same_category(Some("history"), None));
        assert!(!same_category(Some("math"), Some("physics")));
    }
}
