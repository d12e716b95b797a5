//! In-memory remote used by the engine tests

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;
use tokio::fs;
use tracing::subscriber::DefaultGuard;

use crate::adapter::ResourceAdapter;
use crate::error::{Result, SyncError};
use crate::item::{Item, SyncKey};
use crate::context::SyncContext;

/// Formatted log lines written while a [`capture_logs`] guard is alive
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route this thread's logs into a buffer until the guard drops
pub fn capture_logs() -> (LogCapture, DefaultGuard) {
    let logs = LogCapture::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || sink.clone())
        .with_ansi(false)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

/// Instant the fake remote stamps on every write
pub fn remote_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub path: String,
    pub content: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

/// Static-file-like resource: identity is `id`, pairing is by `path`
pub struct MemoryAdapter {
    pub remote: Mutex<BTreeMap<String, RemoteFile>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_on: Mutex<Vec<String>>,
    next_id: Mutex<u32>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            remote: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_on: Mutex::new(Vec::new()),
            next_id: Mutex::new(100),
        }
    }

    pub fn with_remote(self, id: &str, path: &str, content: &[u8], updated_at: DateTime<Utc>) -> Self {
        self.remote.lock().unwrap().insert(
            id.to_string(),
            RemoteFile {
                path: path.to_string(),
                content: content.to_vec(),
                updated_at,
            },
        );
        self
    }

    /// Make every mutating call on `path` fail with `status`
    pub fn failing(self, path: &str) -> Self {
        self.fail_on.lock().unwrap().push(path.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("list") && !c.starts_with("fetch"))
            .collect()
    }

    pub fn remote_paths(&self) -> Vec<String> {
        self.remote.lock().unwrap().values().map(|f| f.path.clone()).collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failure(&self, path: &str, status: u16) -> Result<()> {
        if self.fail_on.lock().unwrap().iter().any(|p| p == path) {
            return Err(SyncError::remote_error(status, format!("rejected {}", path)));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceAdapter for MemoryAdapter {
    fn name(&self) -> &str {
        "files"
    }

    fn key_field(&self) -> &str {
        "id"
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("files")
    }

    fn search_for(&self) -> Vec<String> {
        vec!["**/*".to_string()]
    }

    fn ignoring(&self) -> Vec<String> {
        vec!["**/*.swp".to_string()]
    }

    async fn list(&self) -> Result<Vec<Item>> {
        self.record("list".to_string());
        let remote = self.remote.lock().unwrap();
        Ok(remote
            .iter()
            .map(|(id, file)| {
                Item::from_value(json!({
                    "id": id,
                    "path": file.path,
                    "updated_at": file.updated_at.to_rfc3339(),
                }))
                .unwrap()
            })
            .collect())
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        self.record(format!("fetch {}", key));
        self.remote
            .lock()
            .unwrap()
            .get(key)
            .map(|f| f.content.clone())
            .ok_or_else(|| SyncError::remote_error(404, key.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.record(format!("remove {}", key));
        let path = self.remote.lock().unwrap().get(key).map(|f| f.path.clone()).unwrap_or_default();
        self.check_failure(&path, 500)?;
        self.remote.lock().unwrap().remove(key);
        Ok(())
    }

    async fn upload(&self, local_path: &Path, item: &Item, modify: bool) -> Result<Option<DateTime<Utc>>> {
        let path = item.get_str("path").unwrap_or_default();
        self.record(format!("upload {} modify={}", path, modify));
        self.check_failure(&path, 409)?;

        let content = fs::read(local_path).await?;
        let id = if modify {
            item.get_str("id").ok_or_else(|| SyncError::remote_error(400, "missing id"))?
        } else {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            next.to_string()
        };

        self.remote.lock().unwrap().insert(
            id,
            RemoteFile {
                path,
                content,
                updated_at: remote_clock(),
            },
        );
        Ok(Some(remote_clock()))
    }

    async fn to_remote_item(&self, root: &Path, path: &Path) -> Result<Vec<Item>> {
        let relative = path
            .strip_prefix(root)
            .map_err(|_| SyncError::not_recognized(path, "outside of root"))?;
        let name = relative.to_string_lossy().replace('\\', "/");
        if name.ends_with(".skip") {
            return Err(SyncError::not_recognized(path, "marked to skip"));
        }
        if name.ends_with(".dup") {
            // Every .dup file claims the same identity
            return Ok(vec![Item::from_value(json!({ "path": "dup", "source": name })).unwrap()]);
        }
        Ok(vec![Item::from_value(json!({ "path": name })).unwrap()])
    }

    fn to_local_name(&self, item: &Item, key: &str) -> String {
        item.get_str("path").unwrap_or_else(|| key.to_string())
    }

    fn synckey(&self, item: &Item) -> Result<SyncKey> {
        item.get_str("path")
            .map(SyncKey::new)
            .ok_or_else(|| SyncError::format_error("", "no path"))
    }

    fn should_skip(&self, item: &Item) -> Option<String> {
        let path = item.get_str("path")?;
        path.starts_with("_private/").then(|| "private area".to_string())
    }
}

/// Temporary project with helpers for laying out files
pub struct TestProject {
    pub dir: TempDir,
    pub ctx: SyncContext,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let ctx = SyncContext::new(dir.path());
        Self { dir, ctx }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub async fn write(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(&path, content).await.unwrap();
        path
    }
}
