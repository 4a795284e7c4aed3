//! Google Drive v3 REST 客户端

use super::{RemoteFile, RemoteFolder, RemoteStorage, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const ROOT_FOLDER_COLOR: &str = "#ff5252";

/// 最大重试次数
const MAX_RETRIES: u32 = 3;
/// 重试基础延迟（毫秒）
const RETRY_BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    /// Drive 以字符串形式返回大小
    size: Option<String>,
    description: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PermissionList {
    #[serde(default)]
    permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
struct Permission {
    id: String,
    #[serde(rename = "type")]
    typ: String,
}

impl Permission {
    fn is_public(&self) -> bool {
        self.typ == "anyone"
    }
}

pub struct DriveStorage {
    client: Client,
    token: String,
    name: String,
}

impl DriveStorage {
    pub fn new(token: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
            .timeout(Duration::from_secs(IO_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            token: token.to_string(),
            name: "gdrive".to_string(),
        })
    }

    /// 转义查询字符串中的单引号和反斜杠
    fn quote(value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "\\'")
    }

    fn is_transient(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    /// 发送请求；429/5xx 和连接错误按指数退避重试
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let mut last_error = String::new();

        for attempt in 0..=MAX_RETRIES {
            let builder = request
                .try_clone()
                .ok_or_else(|| anyhow!("request body cannot be retried"))?
                .bearer_auth(&self.token);

            match builder.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if Self::is_transient(resp.status()) => {
                    last_error = format!("HTTP {}", resp.status());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(anyhow!("Drive API error {}: {}", status, body));
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = e.to_string();
                }
                Err(e) => return Err(e.into()),
            }

            if attempt < MAX_RETRIES {
                let delay = RETRY_BASE_DELAY_MS * 2_u64.pow(attempt);
                warn!(
                    "Drive 请求失败，{}ms 后重试 ({}/{}): {}",
                    delay,
                    attempt + 1,
                    MAX_RETRIES,
                    last_error
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(anyhow!("Drive request failed after {} retries: {}", MAX_RETRIES, last_error))
    }

    /// 分页列出查询结果
    async fn list_all(&self, query: &str, fields: &str) -> Result<Vec<DriveFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        let fields = format!("nextPageToken, files({})", fields);

        loop {
            let mut params = vec![("q", query.to_string()), ("fields", fields.clone())];
            if let Some(token) = page_token.take() {
                params.push(("pageToken", token));
            }

            let page: FileList = self
                .send(self.client.get(format!("{}/files", API_BASE)).query(&params))
                .await?
                .json()
                .await?;

            files.extend(page.files);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(files)
    }

    /// 文件的公开（anyone）权限
    async fn public_permissions(&self, remote_id: &str) -> Result<Vec<Permission>> {
        let perms: PermissionList = self
            .send(
                self.client
                    .get(format!("{}/files/{}/permissions", API_BASE, remote_id))
                    .query(&[("fields", "permissions(id, type)")]),
            )
            .await?
            .json()
            .await?;
        Ok(perms.permissions.into_iter().filter(Permission::is_public).collect())
    }

    /// 下载用的临时文件：在完整文件名后追加 `.part`
    fn temp_path(dest: &Path) -> PathBuf {
        let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
        name.push(".part");
        dest.with_file_name(name)
    }

    async fn write_stream(resp: Response, temp_path: &Path) -> Result<u64> {
        let mut file = tokio::fs::File::create(temp_path).await?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    fn mime_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("pdf") => "application/pdf",
            Some("epub") => "application/epub+zip",
            _ => "application/octet-stream",
        }
    }
}

#[async_trait]
impl RemoteStorage for DriveStorage {
    async fn list_folders(&self, parent: &str) -> Result<Vec<RemoteFolder>> {
        let query = format!(
            "'{}' in parents and mimeType = '{}' and trashed = false",
            Self::quote(parent),
            FOLDER_MIME
        );
        let folders = self.list_all(&query, "id, name").await?;
        Ok(folders
            .into_iter()
            .map(|f| RemoteFolder { id: f.id, name: f.name })
            .collect())
    }

    async fn list_files(&self, parent: &str) -> Result<Vec<RemoteFile>> {
        let query = format!(
            "'{}' in parents and mimeType != '{}' and trashed = false",
            Self::quote(parent),
            FOLDER_MIME
        );
        let files = self.list_all(&query, "id, name, size, description").await?;
        Ok(files
            .into_iter()
            .map(|f| RemoteFile {
                size: f.size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0),
                id: f.id,
                name: f.name,
                description: f.description,
            })
            .collect())
    }

    async fn upload(&self, local_path: &Path, parent: &str) -> Result<Option<String>> {
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("invalid file name: {}", local_path.display()))?;
        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("读取本地文件失败: {}", local_path.display()))?;
        let mime = Self::mime_type(local_path);

        // 可续传上传：先创建会话，再一次性发送内容
        let session = self
            .send(
                self.client
                    .post(format!("{}/files", UPLOAD_BASE))
                    .query(&[("uploadType", "resumable")])
                    .header("X-Upload-Content-Type", mime)
                    .json(&json!({ "name": name, "parents": [parent] })),
            )
            .await?;
        let location = session
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow!("upload session has no location"))?
            .to_string();

        debug!("上传: {} ({} 字节)", name, data.len());
        let created: DriveFile = self
            .send(
                self.client
                    .put(&location)
                    .query(&[("fields", "id")])
                    .header(reqwest::header::CONTENT_TYPE, mime)
                    .body(data),
            )
            .await?
            .json()
            .await?;

        Ok(Some(created.id).filter(|id| !id.is_empty()))
    }

    async fn download(&self, remote_id: &str, dest: &Path) -> Result<bool> {
        let resp = self
            .send(
                self.client
                    .get(format!("{}/files/{}", API_BASE, remote_id))
                    .query(&[("alt", "media")]),
            )
            .await?;

        // 写入临时文件，完成后重命名；任何一步失败都清理临时文件
        let temp_path = Self::temp_path(dest);
        let result = async {
            let written = Self::write_stream(resp, &temp_path).await?;
            if tokio::fs::try_exists(dest).await? {
                return Err(anyhow!("{} already exists", dest.display()));
            }
            tokio::fs::rename(&temp_path, dest).await?;
            Ok::<u64, anyhow::Error>(written)
        }
        .await;

        match result {
            Ok(written) => {
                debug!("下载完成: {} -> {:?} ({} 字节)", remote_id, dest, written);
                Ok(true)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                Err(e)
            }
        }
    }

    async fn move_to(&self, remote_id: &str, new_parent: &str) -> Result<()> {
        let current: DriveFile = self
            .send(
                self.client
                    .get(format!("{}/files/{}", API_BASE, remote_id))
                    .query(&[("fields", "id, parents")]),
            )
            .await?
            .json()
            .await?;
        let previous = current.parents.join(",");

        self.send(
            self.client
                .patch(format!("{}/files/{}", API_BASE, remote_id))
                .query(&[
                    ("addParents", new_parent),
                    ("removeParents", previous.as_str()),
                    ("fields", "id, parents"),
                ])
                .json(&json!({})),
        )
        .await?;
        Ok(())
    }

    async fn set_description(&self, remote_id: &str, text: &str) -> Result<()> {
        self.send(
            self.client
                .patch(format!("{}/files/{}", API_BASE, remote_id))
                .json(&json!({ "description": text })),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, remote_id: &str) -> Result<bool> {
        let result = self
            .send(
                self.client
                    .patch(format!("{}/files/{}", API_BASE, remote_id))
                    .json(&json!({ "trashed": true })),
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("移入回收站失败: {} - {}", remote_id, e);
                Ok(false)
            }
        }
    }

    async fn create_folder(&self, name: &str, parent: &str) -> Result<String> {
        let query = format!(
            "name = '{}' and '{}' in parents and mimeType = '{}' and trashed = false",
            Self::quote(name),
            Self::quote(parent),
            FOLDER_MIME
        );
        if let Some(existing) = self.list_all(&query, "id").await?.into_iter().next() {
            return Ok(existing.id);
        }

        info!("创建云端分类目录: {}", name);
        let created: DriveFile = self
            .send(
                self.client
                    .post(format!("{}/files", API_BASE))
                    .query(&[("fields", "id")])
                    .json(&json!({ "name": name, "mimeType": FOLDER_MIME, "parents": [parent] })),
            )
            .await?
            .json()
            .await?;
        Ok(created.id)
    }

    async fn set_visibility(&self, remote_id: &str, public: bool) -> Result<Option<String>> {
        if public {
            if self.public_permissions(remote_id).await?.is_empty() {
                self.send(
                    self.client
                        .post(format!("{}/files/{}/permissions", API_BASE, remote_id))
                        .json(&json!({ "type": "anyone", "role": "reader" })),
                )
                .await
                .context("Failed to make the file public")?;
            } else {
                debug!("已是公开状态: {}", remote_id);
            }

            let file: DriveFile = self
                .send(
                    self.client
                        .get(format!("{}/files/{}", API_BASE, remote_id))
                        .query(&[("fields", "id, webViewLink")]),
                )
                .await?
                .json()
                .await?;
            return Ok(file.web_view_link);
        }

        for perm in self.public_permissions(remote_id).await? {
            self.send(self.client.delete(format!(
                "{}/files/{}/permissions/{}",
                API_BASE, remote_id, perm.id
            )))
            .await?;
        }
        Ok(None)
    }

    async fn ensure_root_folder(&self, name: &str) -> Result<String> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false and 'root' in parents",
            Self::quote(name),
            FOLDER_MIME
        );
        if let Some(existing) = self.list_all(&query, "id").await?.into_iter().next() {
            info!("使用已有云端根目录: {}", existing.id);
            return Ok(existing.id);
        }

        let created: DriveFile = self
            .send(
                self.client
                    .post(format!("{}/files", API_BASE))
                    .query(&[("fields", "id")])
                    .json(&json!({
                        "name": name,
                        "mimeType": FOLDER_MIME,
                        "folderColorRgb": ROOT_FOLDER_COLOR,
                    })),
            )
            .await?
            .json()
            .await?;
        info!("已创建云端根目录: {} ({})", name, created.id);
        Ok(created.id)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(DriveStorage::quote("O'Reilly"), "O\\'Reilly");
        assert_eq!(DriveStorage::quote("plain"), "plain");
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(DriveStorage::mime_type(Path::new("a.PDF")), "application/pdf");
        assert_eq!(DriveStorage::mime_type(Path::new("b.epub")), "application/epub+zip");
        assert_eq!(DriveStorage::mime_type(Path::new("c")), "application/octet-stream");
    }

    #[test]
    fn test_temp_path_keeps_extension() {
        let pdf = DriveStorage::temp_path(Path::new("/lib/General/x.pdf"));
        let epub = DriveStorage::temp_path(Path::new("/lib/General/x.epub"));
        assert_eq!(pdf, PathBuf::from("/lib/General/x.pdf.part"));
        assert_eq!(epub, PathBuf::from("/lib/General/x.epub.part"));
        assert_ne!(pdf, epub);
    }

    #[test]
    fn test_public_permissions() {
        let list: PermissionList = serde_json::from_str(
            r#"{"permissions":[{"id":"p1","type":"user"},{"id":"p2","type":"anyone"}]}"#,
        )
        .unwrap();
        let public: Vec<_> = list
            .permissions
            .iter()
            .filter(|p| p.is_public())
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(public, vec!["p2"]);
    }

    #[test]
    fn test_file_list_parses_string_sizes() {
        let page: FileList = serde_json::from_str(
            r#"{"files":[{"id":"1","name":"a.pdf","size":"2048","description":"[reading] x"}],"nextPageToken":"t"}"#,
        )
        .unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("t"));
        assert_eq!(page.files[0].size.as_deref(), Some("2048"));
    }
}
