//! Contract every syncable resource kind implements
//!
//! The engine only ever talks to a resource through [`ResourceAdapter`]. One
//! concrete type per kind maps between local files and remote records; the
//! provided methods cover the common cases so an adapter only has to supply
//! the remote calls, the file conversion and its glob patterns.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;

use crate::cache::ContentCache;
use crate::compare;
use crate::error::{Result, SyncError};
use crate::item::{Item, SyncKey};

#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Kind name, used for cache files and log lines
    fn name(&self) -> &str;

    /// Field holding the remote's primary identity
    fn key_field(&self) -> &str;

    /// Directory of this kind, relative to a project or bundle root
    fn location(&self) -> PathBuf;

    /// Include globs, relative to the location directory
    fn search_for(&self) -> Vec<String>;

    /// Exclude globs, relative to the location directory
    fn ignoring(&self) -> Vec<String> {
        Vec::new()
    }

    /// List every remote item of this kind
    async fn list(&self) -> Result<Vec<Item>>;

    /// Fetch the remote content of one item
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete one remote item
    async fn remove(&self, key: &str) -> Result<()>;

    /// Create (`modify == false`) or update a remote item from a local file.
    ///
    /// Returns the remote's new modification instant when it reports one.
    async fn upload(&self, local_path: &Path, item: &Item, modify: bool) -> Result<Option<DateTime<Utc>>>;

    /// Write the remote content of `item` to `local_path`
    async fn download(&self, local_path: &Path, item: &Item) -> Result<()> {
        let key = item_key(self, item)?;
        let content = self.fetch(&key).await?;
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::local_io(parent, e))?;
        }
        fs::write(local_path, content)
            .await
            .map_err(|e| SyncError::local_io(local_path, e))
    }

    /// Remove the local file backing `item`
    async fn remove_local(&self, local_path: &Path, _item: &Item) -> Result<()> {
        fs::remove_file(local_path)
            .await
            .map_err(|e| SyncError::local_io(local_path, e))
    }

    /// Convert one local file into zero or more items.
    ///
    /// `root` is the location directory the file was found under.
    async fn to_remote_item(&self, root: &Path, path: &Path) -> Result<Vec<Item>>;

    /// File name, relative to the location directory, for a remote item
    fn to_local_name(&self, item: &Item, key: &str) -> String;

    /// Absolute path a remote item is downloaded to under `root`
    fn to_local_path(&self, root: &Path, item: &Item) -> Result<PathBuf> {
        let key = item_key(self, item)?;
        Ok(root.join(self.location()).join(self.to_local_name(item, &key)))
    }

    /// Identity used to pair local and remote items
    fn synckey(&self, item: &Item) -> Result<SyncKey> {
        item.get_str(self.key_field())
            .map(SyncKey::new)
            .ok_or_else(|| missing_field(item, self.key_field()))
    }

    /// True when the pair differs and needs an update
    async fn docmp(&self, local: &Item, remote: &Item, cache: &ContentCache) -> Result<bool> {
        Ok(compare::timestamps_differ(local, remote, cache).await)
    }

    /// Raw local content, as handed to the external diff
    async fn local_content(&self, item: &Item) -> Result<Vec<u8>> {
        let path = item
            .local_path
            .as_deref()
            .ok_or_else(|| SyncError::Conflict(format!("{} has no local file", item.label())))?;
        fs::read(path).await.map_err(|e| SyncError::local_io(path, e))
    }

    /// Fields a local item may override when merged over its remote twin;
    /// `None` lets every field through
    fn merge_fields(&self) -> Option<Vec<String>> {
        None
    }

    /// Reason to leave an item out of classification entirely
    fn should_skip(&self, _item: &Item) -> Option<String> {
        None
    }
}

/// The adapter's primary key value for an item
pub fn item_key<A: ResourceAdapter + ?Sized>(adapter: &A, item: &Item) -> Result<String> {
    item.get_str(adapter.key_field())
        .ok_or_else(|| missing_field(item, adapter.key_field()))
}

fn missing_field(item: &Item, field: &str) -> SyncError {
    SyncError::format_error(
        item.local_path.clone().unwrap_or_default(),
        format!("item {} has no '{}' field", item.label(), field),
    )
}
