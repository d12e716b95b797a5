//! Default modification check for resources without a natural content hash

use std::path::Path;
use chrono::{DateTime, SubsecRound, Utc};
use tokio::fs;
use tracing::debug;

use crate::cache::ContentCache;
use crate::item::Item;

/// Normalized local instant for a file.
///
/// The cached sync instant wins while the content still matches the cached
/// digest; otherwise the file's own mtime is used.
pub async fn local_instant(cache: &ContentCache, path: &Path) -> Option<DateTime<Utc>> {
    if let Some(synced_at) = cache.lookup(path).await {
        return Some(synced_at);
    }

    let metadata = fs::metadata(path).await.ok()?;
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

/// Two instants are equal when they agree at whole-second precision
pub fn same_instant(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.round_subsecs(0) == b.round_subsecs(0)
}

/// True when the local item should be considered different from the remote one
pub async fn timestamps_differ(local: &Item, remote: &Item, cache: &ContentCache) -> bool {
    let local_time = match &local.local_path {
        Some(path) => local_instant(cache, path).await,
        None => None,
    };

    match (local_time, remote.updated_at()) {
        (Some(here), Some(there)) => {
            let differ = !same_instant(here, there);
            debug!("Compared {}: local {} vs remote {} -> modified={}", local.label(), here, there, differ);
            differ
        }
        _ => true,
    }
}
