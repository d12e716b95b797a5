//! Adapter for the solution's static file hosting

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use solsync::{Item, ResourceAdapter, Result, SyncError, SyncKey};
use tokio::fs;

use crate::api::SolutionClient;

/// Remote collection holding static files
pub const FILE_COLLECTION: &str = "file";

pub struct StaticFileAdapter {
    client: Arc<SolutionClient>,
    location: PathBuf,
    ignoring: Vec<String>,
}

impl StaticFileAdapter {
    pub fn new(client: Arc<SolutionClient>, location: impl Into<PathBuf>) -> Self {
        Self {
            client,
            location: location.into(),
            ignoring: vec!["**/.DS_Store".to_string(), "**/*.swp".to_string(), "**/*~".to_string()],
        }
    }

    pub fn with_ignoring(mut self, ignoring: Vec<String>) -> Self {
        self.ignoring = ignoring;
        self
    }
}

#[async_trait]
impl ResourceAdapter for StaticFileAdapter {
    fn name(&self) -> &str {
        "files"
    }

    fn key_field(&self) -> &str {
        "path"
    }

    fn location(&self) -> PathBuf {
        self.location.clone()
    }

    fn search_for(&self) -> Vec<String> {
        vec!["**/*".to_string()]
    }

    fn ignoring(&self) -> Vec<String> {
        self.ignoring.clone()
    }

    async fn list(&self) -> Result<Vec<Item>> {
        let entries = self.client.crud.list(FILE_COLLECTION).await?;
        Ok(entries.into_iter().map(Item::from_wire).collect())
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        Ok(self.client.crud.get_content(FILE_COLLECTION, key).await?)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.client.crud.delete(FILE_COLLECTION, key).await?;
        Ok(())
    }

    async fn upload(&self, local_path: &Path, item: &Item, _modify: bool) -> Result<Option<DateTime<Utc>>> {
        let path = remote_path(item)?;
        let content = fs::read(local_path)
            .await
            .map_err(|e| SyncError::local_io(local_path, e))?;

        let stored = self
            .client
            .crud
            .put_content(FILE_COLLECTION, &path, &content, content_type(&path))
            .await?;
        Ok(Item::from_wire(stored).updated_at())
    }

    async fn to_remote_item(&self, root: &Path, path: &Path) -> Result<Vec<Item>> {
        let relative = path
            .strip_prefix(root)
            .map_err(|_| SyncError::not_recognized(path, "outside of the files location"))?;

        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        let mut item = Item::default();
        item.set("path", json!(parts.join("/")));
        Ok(vec![item])
    }

    fn to_local_name(&self, item: &Item, key: &str) -> String {
        remote_path(item).unwrap_or_else(|_| key.trim_start_matches('/').to_string())
    }

    /// Remote paths may carry a leading `/`; local ones never do
    fn synckey(&self, item: &Item) -> Result<SyncKey> {
        remote_path(item).map(SyncKey::new)
    }
}

fn remote_path(item: &Item) -> Result<String> {
    item.get_str("path")
        .map(|p| p.trim_start_matches('/').to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            SyncError::format_error(
                item.local_path.clone().unwrap_or_default(),
                format!("file {} has no path", item.label()),
            )
        })
}

/// Content type sent with an upload, by file extension
pub fn content_type(path: &str) -> &'static str {
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
