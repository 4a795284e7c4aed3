//! 内存中的云端存储，供测试使用

use super::{RemoteFile, RemoteFolder, RemoteStorage};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub id: String,
    pub name: String,
    pub parent: String,
    pub is_folder: bool,
    pub data: Vec<u8>,
    pub description: Option<String>,
    pub public: bool,
    pub trashed: bool,
}

#[derive(Debug, Default)]
struct State {
    objects: Vec<StoredObject>,
    next_id: u64,
    uploads: usize,
    downloads: usize,
    failing_uploads: HashSet<String>,
    refused_shares: HashSet<String>,
}

pub struct MemoryStorage {
    root: String,
    state: Mutex<State>,
}

impl MemoryStorage {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn insert(&self, name: &str, parent: &str, is_folder: bool, data: Vec<u8>) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("{}-{:04}", if is_folder { "fld" } else { "obj" }, state.next_id);
        state.objects.push(StoredObject {
            id: id.clone(),
            name: name.to_string(),
            parent: parent.to_string(),
            is_folder,
            data,
            description: None,
            public: false,
            trashed: false,
        });
        id
    }

    /// 直接放入一个文件；category 为 None 时放在根目录
    pub fn seed_file(&self, category: Option<&str>, name: &str, data: &[u8]) -> String {
        let parent = match category {
            Some(c) => self.seed_folder(c),
            None => self.root.clone(),
        };
        self.insert(name, &parent, false, data.to_vec())
    }

    pub fn seed_folder(&self, name: &str) -> String {
        let existing = self
            .state
            .lock()
            .unwrap()
            .objects
            .iter()
            .find(|o| o.is_folder && !o.trashed && o.parent == self.root && o.name == name)
            .map(|o| o.id.clone());
        existing.unwrap_or_else(|| self.insert(name, &self.root, true, Vec::new()))
    }

    /// 让指定文件名的上传失败
    pub fn fail_uploads_of(&self, name: &str) {
        self.state.lock().unwrap().failing_uploads.insert(name.to_string());
    }

    /// 让指定对象的公开请求被拒绝
    pub fn refuse_sharing_of(&self, id: &str) {
        self.state.lock().unwrap().refused_shares.insert(id.to_string());
    }

    pub fn object(&self, id: &str) -> Option<StoredObject> {
        self.state.lock().unwrap().objects.iter().find(|o| o.id == id).cloned()
    }

    pub fn folder_named(&self, name: &str) -> Option<StoredObject> {
        self.state
            .lock()
            .unwrap()
            .objects
            .iter()
            .find(|o| o.is_folder && !o.trashed && o.name == name)
            .cloned()
    }

    pub fn files_named(&self, name: &str) -> Vec<StoredObject> {
        self.state
            .lock()
            .unwrap()
            .objects
            .iter()
            .filter(|o| !o.is_folder && !o.trashed && o.name == name)
            .cloned()
            .collect()
    }

    pub fn upload_count(&self) -> usize {
        self.state.lock().unwrap().uploads
    }

    pub fn download_count(&self) -> usize {
        self.state.lock().unwrap().downloads
    }
}

#[async_trait]
impl RemoteStorage for MemoryStorage {
    async fn list_folders(&self, parent: &str) -> Result<Vec<RemoteFolder>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .objects
            .iter()
            .filter(|o| o.is_folder && !o.trashed && o.parent == parent)
            .map(|o| RemoteFolder {
                id: o.id.clone(),
                name: o.name.clone(),
            })
            .collect())
    }

    async fn list_files(&self, parent: &str) -> Result<Vec<RemoteFile>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .objects
            .iter()
            .filter(|o| !o.is_folder && !o.trashed && o.parent == parent)
            .map(|o| RemoteFile {
                id: o.id.clone(),
                name: o.name.clone(),
                size: o.data.len() as u64,
                description: o.description.clone(),
            })
            .collect())
    }

    async fn upload(&self, local_path: &Path, parent: &str) -> Result<Option<String>> {
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("invalid path"))?
            .to_string();
        if self.state.lock().unwrap().failing_uploads.contains(&name) {
            return Ok(None);
        }
        let data = tokio::fs::read(local_path).await?;
        let id = self.insert(&name, parent, false, data);
        self.state.lock().unwrap().uploads += 1;
        Ok(Some(id))
    }

    async fn download(&self, remote_id: &str, dest: &Path) -> Result<bool> {
        let Some(object) = self.object(remote_id) else {
            return Ok(false);
        };
        // 与 Drive 客户端一致，不覆盖已有文件
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &object.data).await?;
        self.state.lock().unwrap().downloads += 1;
        Ok(true)
    }

    async fn move_to(&self, remote_id: &str, new_parent: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let object = state
            .objects
            .iter_mut()
            .find(|o| o.id == remote_id)
            .ok_or_else(|| anyhow!("no such object: {}", remote_id))?;
        object.parent = new_parent.to_string();
        Ok(())
    }

    async fn set_description(&self, remote_id: &str, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let object = state
            .objects
            .iter_mut()
            .find(|o| o.id == remote_id)
            .ok_or_else(|| anyhow!("no such object: {}", remote_id))?;
        object.description = Some(text.to_string());
        Ok(())
    }

    async fn delete(&self, remote_id: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.objects.iter_mut().find(|o| o.id == remote_id) {
            Some(object) => {
                object.trashed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_folder(&self, name: &str, parent: &str) -> Result<String> {
        let existing = self
            .state
            .lock()
            .unwrap()
            .objects
            .iter()
            .find(|o| o.is_folder && !o.trashed && o.parent == parent && o.name == name)
            .map(|o| o.id.clone());
        Ok(existing.unwrap_or_else(|| self.insert(name, parent, true, Vec::new())))
    }

    async fn set_visibility(&self, remote_id: &str, public: bool) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        if public && state.refused_shares.contains(remote_id) {
            return Err(anyhow!("Drive API error 403 Forbidden: sharing disabled by policy"));
        }
        let object = state
            .objects
            .iter_mut()
            .find(|o| o.id == remote_id)
            .ok_or_else(|| anyhow!("no such object: {}", remote_id))?;
        object.public = public;
        Ok(public.then(|| format!("https://drive.example/{}/view", remote_id)))
    }

    async fn ensure_root_folder(&self, _name: &str) -> Result<String> {
        Ok(self.root.clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
