use crate::config::LibraryConfig;
use crate::core::catalog::{Catalog, CatalogEntry, Diff};
use crate::core::conflict::{ConflictResolver, DecisionHandler, PushAction, RemoteCandidate, Resolution};
use crate::core::scanner::FileScanner;
use crate::core::status::BookStatus;
use crate::db::{BookRecord, MappingStore};
use crate::error::{LibraryError, Result};
use crate::storage::{LocalLibrary, RemoteStorage};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, warn};

/// 删除目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteTarget {
    Local,
    Remote,
    Both,
}

impl DeleteTarget {
    fn includes_local(self) -> bool {
        matches!(self, DeleteTarget::Local | DeleteTarget::Both)
    }

    fn includes_remote(self) -> bool {
        matches!(self, DeleteTarget::Remote | DeleteTarget::Both)
    }
}

impl FromStr for DeleteTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(DeleteTarget::Local),
            "remote" => Ok(DeleteTarget::Remote),
            "both" => Ok(DeleteTarget::Both),
            other => Err(format!("invalid delete target '{}', expected local|remote|both", other)),
        }
    }
}

impl fmt::Display for DeleteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteTarget::Local => write!(f, "local"),
            DeleteTarget::Remote => write!(f, "remote"),
            DeleteTarget::Both => write!(f, "both"),
        }
    }
}

/// 分享状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Visibility {
    Public(String),
    Private,
}

/// 单个条目的执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Outcome {
    Uploaded {
        remote_id: String,
        category: Option<String>,
    },
    AlreadySynced { remote_id: String },
    MovedRemote {
        remote_id: String,
        category: Option<String>,
    },
    KeptRemote {
        remote_id: String,
        category: Option<String>,
    },
    Downloaded { path: PathBuf },
    /// 目标路径已有文件，未下载
    AlreadyPresent { path: PathBuf },
    StatusUpdated { status: BookStatus },
    Moved { category: String },
    Deleted { target: DeleteTarget },
    Skipped { reason: String },
}

impl Outcome {
    pub fn is_skip(&self) -> bool {
        matches!(self, Outcome::Skipped { .. } | Outcome::AlreadyPresent { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = |c: &Option<String>| c.clone().unwrap_or_else(|| "root".to_string());
        match self {
            Outcome::Uploaded { category: c, .. } => write!(f, "uploaded to {}", category(c)),
            Outcome::AlreadySynced { .. } => write!(f, "already synced"),
            Outcome::MovedRemote { category: c, .. } => write!(f, "moved on Drive to {}", category(c)),
            Outcome::KeptRemote { category: c, .. } => write!(f, "kept on Drive in {}", category(c)),
            Outcome::Downloaded { path } => write!(f, "downloaded to {}", path.display()),
            Outcome::AlreadyPresent { path } => write!(f, "already present at {}", path.display()),
            Outcome::StatusUpdated { status } => write!(f, "status set to {}", status),
            Outcome::Moved { category } => write!(f, "moved to {}", category),
            Outcome::Deleted { target } => write!(f, "deleted ({})", target),
            Outcome::Skipped { reason } => write!(f, "skipped: {}", reason),
        }
    }
}

/// 批量操作中的一项
#[derive(Debug)]
pub struct ItemOutcome {
    pub name: String,
    pub result: Result<Outcome>,
}

/// 批量操作报告
#[derive(Debug, Default)]
pub struct SyncReport {
    pub items: Vec<ItemOutcome>,
}

impl SyncReport {
    pub fn succeeded(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(&i.result, Ok(o) if !o.is_skip()))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(&i.result, Ok(o) if o.is_skip()))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.items.iter().filter(|i| i.result.is_err()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: SyncReport) {
        self.items.extend(other.items);
    }

    pub fn get(&self, name: &str) -> Option<&ItemOutcome> {
        self.items.iter().find(|i| i.name == name)
    }
}

/// 已规划好的推送
struct PlannedPush {
    name: String,
    path: PathBuf,
    action: PushAction,
}

/// 书库同步引擎
pub struct LibraryEngine {
    config: LibraryConfig,
    local: LocalLibrary,
    remote: Arc<dyn RemoteStorage>,
    store: MappingStore,
    scanner: FileScanner,
    semaphore: Arc<Semaphore>,
    /// 分类名 -> 云端目录 ID；持锁创建，避免并发时重复建目录
    folders: Mutex<HashMap<String, String>>,
}

impl LibraryEngine {
    pub fn new(config: LibraryConfig, remote: Arc<dyn RemoteStorage>, store: MappingStore) -> Self {
        let permits = config.max_concurrent_transfers.max(1);
        Self {
            local: LocalLibrary::new(&config.local_root),
            config,
            remote,
            store,
            scanner: FileScanner::new(),
            semaphore: Arc::new(Semaphore::new(permits)),
            folders: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn local(&self) -> &LocalLibrary {
        &self.local
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    // ============ 列表与差异 ============

    pub async fn list_local(&self) -> Result<Vec<CatalogEntry>> {
        self.scanner.scan_local(&self.local).await.map_err(|e| {
            LibraryError::local_io(self.local.root(), std::io::Error::other(e.to_string()))
        })
    }

    pub async fn list_remote(&self) -> Result<Vec<CatalogEntry>> {
        self.scanner
            .scan_remote(self.remote.as_ref(), &self.config.remote_root)
            .await
            .map_err(|e| LibraryError::transfer(&self.config.remote_root, e))
    }

    async fn listings(&self) -> Result<(Vec<CatalogEntry>, Vec<CatalogEntry>)> {
        let (local, remote) = tokio::join!(self.list_local(), self.list_remote());
        Ok((local?, remote?))
    }

    pub async fn get_library(&self) -> Result<Catalog> {
        let (local, remote) = self.listings().await?;
        Ok(Catalog::merge(&local, &remote))
    }

    pub async fn get_diff(&self) -> Result<Diff> {
        Ok(self.get_library().await?.diff())
    }

    /// 离线视图：只读映射缓存
    pub async fn cached_library(&self) -> Result<Vec<CatalogEntry>> {
        self.store.cached_entries().await.map_err(LibraryError::Store)
    }

    /// 按书名取条目；云端有多个同名对象时不做猜测
    async fn resolve_entry(&self, name: &str) -> Result<CatalogEntry> {
        let catalog = self.get_library().await?;
        if catalog.has_remote_duplicates(name) {
            return Err(Self::ambiguity(&catalog, name));
        }
        catalog
            .get(name)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(name.to_string()))
    }

    // ============ 推送 ============

    /// 推送单个文件；未指定分类时按其所在目录推断
    pub async fn push_one(
        &self,
        path: &Path,
        category: Option<String>,
        handler: &dyn DecisionHandler,
    ) -> Result<Outcome> {
        if !path.is_file() {
            return Err(LibraryError::NotFound(path.display().to_string()));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LibraryError::NotFound(path.display().to_string()))?
            .to_string();
        let category = category.or_else(|| self.local.category_of(path));

        let remote = self.list_remote().await?;
        let candidates: Vec<CatalogEntry> = remote.into_iter().filter(|e| e.name == name).collect();

        let action = ConflictResolver::settle(&name, category.as_deref(), &candidates, handler)?;
        self.execute_push(PlannedPush {
            name,
            path: path.to_path_buf(),
            action,
        })
        .await
    }

    /// 推送全部本地书籍：本地独有的上传，已同步但分类不一致的重新归档
    pub async fn push_all(&self, handler: &dyn DecisionHandler) -> Result<SyncReport> {
        let (local, remote) = self.listings().await?;
        let catalog = Catalog::merge(&local, &remote);

        // 规划阶段：逐个解析冲突，任何传输开始前完成
        let mut report = SyncReport::default();
        let mut planned = Vec::new();
        let mut seen: HashMap<&str, &Path> = HashMap::new();
        for entry in &local {
            let Some(path) = entry.local_path.as_deref() else {
                continue;
            };
            // 书名即身份，同名的本地副本只推送第一份
            if let Some(first) = seen.get(entry.name.as_str()) {
                warn!("本地存在同名文件，跳过: {:?} (已推送 {:?})", path, first);
                report.items.push(ItemOutcome {
                    name: entry.name.clone(),
                    result: Ok(Outcome::Skipped {
                        reason: format!("duplicate local copy, {} is pushed instead", first.display()),
                    }),
                });
                continue;
            }
            seen.insert(entry.name.as_str(), path);

            let candidates = catalog.remote_candidates(&entry.name);
            if let Resolution::Act(PushAction::AlreadySynced { .. }) =
                ConflictResolver::plan(&entry.name, entry.category.as_deref(), candidates)
            {
                continue;
            }

            match ConflictResolver::settle(&entry.name, entry.category.as_deref(), candidates, handler) {
                Ok(action) => planned.push(PlannedPush {
                    name: entry.name.clone(),
                    path: path.to_path_buf(),
                    action,
                }),
                Err(LibraryError::Cancelled) => {
                    info!("推送已取消，未开始任何传输");
                    return Err(LibraryError::Cancelled);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("推送规划失败: {} - {}", entry.name, e);
                    report.items.push(ItemOutcome {
                        name: entry.name.clone(),
                        result: Err(e),
                    });
                }
            }
        }

        info!("开始推送: {} 个文件", planned.len());
        let results = join_all(planned.into_iter().map(|plan| async move {
            let name = plan.name.clone();
            let result = self.bounded(self.execute_push(plan)).await;
            ItemOutcome { name, result }
        }))
        .await;
        report.items.extend(results);

        info!(
            "推送完成: 成功 {}, 跳过 {}, 失败 {}",
            report.succeeded(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    async fn execute_push(&self, plan: PlannedPush) -> Result<Outcome> {
        let PlannedPush { name, path, action } = plan;
        let record = BookRecord::new(&name).with_local_path(&path);

        match action {
            PushAction::Upload { category } => {
                let parent = self.folder_for(category.as_deref()).await?;
                debug!("上传: {} -> {:?}", name, category);
                let remote_id = self
                    .remote
                    .upload(&path, &parent)
                    .await
                    .map_err(|e| LibraryError::transfer(&name, e))?
                    .ok_or_else(|| LibraryError::transfer(&name, "upload returned no identifier"))?;

                info!("上传成功: {} ({})", name, remote_id);
                self.remember(record.with_remote_id(&remote_id).with_category(category.clone()))
                    .await;
                Ok(Outcome::Uploaded { remote_id, category })
            }
            PushAction::AlreadySynced {
                remote_id,
                category,
                status,
            } => {
                self.remember(
                    record
                        .with_remote_id(&remote_id)
                        .with_category(category)
                        .with_status(status),
                )
                .await;
                Ok(Outcome::AlreadySynced { remote_id })
            }
            PushAction::MoveRemote {
                remote_id,
                category,
                status,
            } => {
                let parent = self.folder_for(category.as_deref()).await?;
                self.remote
                    .move_to(&remote_id, &parent)
                    .await
                    .map_err(|e| LibraryError::transfer(&name, e))?;

                info!("云端已重新归档: {} -> {:?}", name, category);
                self.remember(
                    record
                        .with_remote_id(&remote_id)
                        .with_category(category.clone())
                        .with_status(status),
                )
                .await;
                Ok(Outcome::MovedRemote { remote_id, category })
            }
            PushAction::KeepRemote {
                remote_id,
                category,
                status,
            } => {
                self.remember(
                    record
                        .with_remote_id(&remote_id)
                        .with_category(category.clone())
                        .with_status(status),
                )
                .await;
                Ok(Outcome::KeptRemote { remote_id, category })
            }
            PushAction::Skip { reason } => {
                debug!("跳过: {} ({})", name, reason);
                Ok(Outcome::Skipped { reason })
            }
        }
    }

    // ============ 拉取 ============

    pub async fn pull_one(&self, name: &str) -> Result<Outcome> {
        let entry = self.resolve_entry(name).await?;
        if entry.remote_id.is_none() {
            return Err(LibraryError::NotFound(format!("{} has no copy on Drive", name)));
        }
        if let Some(path) = entry.local_path {
            return Ok(Outcome::AlreadyPresent { path });
        }
        self.execute_pull(&entry).await
    }

    /// 下载所有云端独有的书籍；云端同名的不下载，留给用户明确选择
    pub async fn pull_all(&self) -> Result<SyncReport> {
        let catalog = self.get_library().await?;
        let (ambiguous, to_download): (Vec<_>, Vec<_>) = catalog
            .diff()
            .to_download
            .into_iter()
            .partition(|entry| catalog.has_remote_duplicates(&entry.name));
        info!("开始拉取: {} 个文件", to_download.len());

        let mut report = SyncReport::default();
        for entry in &ambiguous {
            warn!("云端存在同名文件，跳过下载: {}", entry.name);
            report.items.push(ItemOutcome {
                name: entry.name.clone(),
                result: Err(Self::ambiguity(&catalog, &entry.name)),
            });
        }

        let items = join_all(to_download.iter().map(|entry| async move {
            ItemOutcome {
                name: entry.name.clone(),
                result: self.bounded(self.execute_pull(entry)).await,
            }
        }))
        .await;
        report.items.extend(items);

        info!(
            "拉取完成: 成功 {}, 跳过 {}, 失败 {}",
            report.succeeded(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    async fn execute_pull(&self, entry: &CatalogEntry) -> Result<Outcome> {
        let name = entry.name.as_str();
        let remote_id = entry
            .remote_id
            .as_deref()
            .ok_or_else(|| LibraryError::NotFound(name.to_string()))?;

        // 传输开始前检查，已有文件不覆盖
        let dest = self.local.destination(entry.category.as_deref(), name);
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            debug!("目标已存在，跳过下载: {:?}", dest);
            return Ok(Outcome::AlreadyPresent { path: dest });
        }

        let dir = self
            .local
            .create_category_dir(entry.category.as_deref())
            .await
            .map_err(|e| LibraryError::local_io(dest.parent().unwrap_or(self.local.root()), e))?;
        debug!("下载: {} -> {:?}", name, dir);

        let ok = self
            .remote
            .download(remote_id, &dest)
            .await
            .map_err(|e| LibraryError::transfer(name, e))?;
        if !ok {
            return Err(LibraryError::transfer(name, "download did not complete"));
        }

        info!("下载成功: {}", name);
        self.remember(
            BookRecord::new(name)
                .with_remote_id(remote_id)
                .with_local_path(&dest)
                .with_category(entry.category.clone())
                .with_status(entry.status),
        )
        .await;
        Ok(Outcome::Downloaded { path: dest })
    }

    /// 先推后拉，本地的分类移动先反映到云端
    pub async fn sync_all(&self, handler: &dyn DecisionHandler) -> Result<SyncReport> {
        let mut report = self.push_all(handler).await?;
        report.extend(self.pull_all().await?);
        Ok(report)
    }

    // ============ 单本书管理 ============

    pub async fn set_status(&self, name: &str, status: BookStatus) -> Result<Outcome> {
        let entry = self.resolve_entry(name).await?;
        let remote_id = entry
            .remote_id
            .clone()
            .ok_or_else(|| LibraryError::NotFound(format!("{} has no copy on Drive", name)))?;

        self.remote
            .set_description(&remote_id, &status.to_description())
            .await
            .map_err(|e| LibraryError::transfer(name, e))?;

        info!("阅读状态已更新: {} -> {}", name, status);
        self.remember(Self::record_of(&entry).with_status(status)).await;
        Ok(Outcome::StatusUpdated { status })
    }

    /// 云端先移动，再移动本地文件；本地失败不回滚云端
    pub async fn move_category(&self, name: &str, category: &str) -> Result<Outcome> {
        let category = category.trim();
        if category.is_empty() {
            return Err(LibraryError::InvalidDecision {
                name: name.to_string(),
                message: "category must not be empty".to_string(),
            });
        }
        let entry = self.resolve_entry(name).await?;
        let mut record = Self::record_of(&entry).with_category(Some(category.to_string()));

        if let Some(remote_id) = &entry.remote_id {
            let parent = self.folder_for(Some(category)).await?;
            self.remote
                .move_to(remote_id, &parent)
                .await
                .map_err(|e| LibraryError::transfer(name, e))?;
        }

        if let Some(path) = &entry.local_path {
            let moved = self
                .local
                .move_to_category(path, category)
                .await
                .map_err(|e| {
                    error!("本地移动失败: {:?} - {}", path, e);
                    LibraryError::local_io(path, e)
                })?;
            record = record.with_local_path(moved);
        }

        info!("分类已更改: {} -> {}", name, category);
        self.remember(record).await;
        Ok(Outcome::Moved {
            category: category.to_string(),
        })
    }

    pub async fn delete(&self, name: &str, target: DeleteTarget) -> Result<Outcome> {
        let entry = self.resolve_entry(name).await?;
        let remote_id = if target.includes_remote() {
            Some(entry.remote_id.clone().ok_or_else(|| {
                LibraryError::NotFound(format!("{} has no copy on Drive", name))
            })?)
        } else {
            None
        };
        let local_path = if target.includes_local() {
            Some(entry.local_path.clone().ok_or_else(|| {
                LibraryError::NotFound(format!("{} has no local copy", name))
            })?)
        } else {
            None
        };

        let mut record = Self::record_of(&entry);
        if let Some(remote_id) = remote_id {
            let trashed = self
                .remote
                .delete(&remote_id)
                .await
                .map_err(|e| LibraryError::transfer(name, e))?;
            if !trashed {
                return Err(LibraryError::transfer(name, "remote delete was refused"));
            }
            record.remote_id = None;
        }
        if let Some(path) = local_path {
            self.local
                .delete(&path)
                .await
                .map_err(|e| LibraryError::local_io(&path, e))?;
            record.local_path = None;
        }

        info!("已删除: {} ({})", name, target);
        if record.remote_id.is_none() && record.local_path.is_none() {
            if let Err(e) = self.store.delete(name).await {
                warn!("删除映射失败: {} - {}", name, e);
            }
        } else {
            self.remember(record).await;
        }
        Ok(Outcome::Deleted { target })
    }

    pub async fn set_visibility(&self, remote_id: &str, public: bool) -> Result<Visibility> {
        let link = self
            .remote
            .set_visibility(remote_id, public)
            .await
            .map_err(|e| LibraryError::transfer(remote_id, e))?;

        match (public, link) {
            (true, Some(link)) => Ok(Visibility::Public(link)),
            (true, None) => Err(LibraryError::transfer(remote_id, "no share link returned")),
            (false, _) => Ok(Visibility::Private),
        }
    }

    /// 按书名分享
    pub async fn share(&self, name: &str, public: bool) -> Result<Visibility> {
        let entry = self.resolve_entry(name).await?;
        let remote_id = entry
            .remote_id
            .ok_or_else(|| LibraryError::NotFound(format!("{} has no copy on Drive", name)))?;
        self.set_visibility(&remote_id, public).await
    }

    // ============ 内部工具 ============

    async fn bounded<F: std::future::Future<Output = Result<Outcome>>>(&self, fut: F) -> Result<Outcome> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| LibraryError::Cancelled)?;
        fut.await
    }

    /// 分类对应的云端目录；None 即根目录
    async fn folder_for(&self, category: Option<&str>) -> Result<String> {
        let Some(category) = category else {
            return Ok(self.config.remote_root.clone());
        };

        let mut folders = self.folders.lock().await;
        if let Some(id) = folders.get(category) {
            return Ok(id.clone());
        }
        let id = self
            .remote
            .create_folder(category, &self.config.remote_root)
            .await
            .map_err(|e| LibraryError::transfer(category, e))?;
        folders.insert(category.to_string(), id.clone());
        Ok(id)
    }

    fn ambiguity(catalog: &Catalog, name: &str) -> LibraryError {
        LibraryError::AmbiguousMatch {
            name: name.to_string(),
            candidates: catalog
                .remote_candidates(name)
                .iter()
                .filter_map(RemoteCandidate::from_entry)
                .collect(),
        }
    }

    fn record_of(entry: &CatalogEntry) -> BookRecord {
        let mut record = BookRecord::new(&entry.name)
            .with_category(entry.category.clone())
            .with_status(entry.status);
        record.remote_id = entry.remote_id.clone();
        record.local_path = entry.local_path.clone();
        record
    }

    /// 传输已成功，映射写入失败只记录警告
    async fn remember(&self, record: BookRecord) {
        if let Err(e) = self.store.upsert(&record).await {
            warn!("写入映射失败: {} - {}", record.name, e);
        }
    }
}
