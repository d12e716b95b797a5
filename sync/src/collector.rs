//! Local item collection across the project root and its bundle overlays

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::adapter::ResourceAdapter;
use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::filter::GlobFilter;
use crate::item::{Item, SyncKey};

/// Items found locally for one resource kind
#[derive(Debug, Default)]
pub struct LocalListing {
    /// One item per synckey, in synckey order
    pub items: Vec<Item>,
    /// Every item whose synckey is defined differently more than once in one root
    pub conflicts: Vec<Item>,
    /// Synckeys left out of `items` because of those collisions
    pub conflict_keys: BTreeSet<SyncKey>,
}

/// Collect local items for `adapter`, with project items taking precedence
/// over bundle items that share a synckey.
///
/// A synckey with conflicting definitions in any root is dropped from the
/// listing altogether; none of its items stand in for the others.
pub async fn local_list(adapter: &dyn ResourceAdapter, ctx: &SyncContext) -> Result<LocalListing> {
    let location = adapter.location();
    let mut merged: BTreeMap<SyncKey, Item> = BTreeMap::new();
    let mut conflicts = Vec::new();
    let mut conflict_keys = BTreeSet::new();

    for bundle in bundle_roots(ctx).await {
        let root = bundle.join(&location);
        if !is_dir(&root).await {
            continue;
        }

        debug!("Collecting {} from bundle {}", adapter.name(), bundle.display());
        let listing = collect_root(adapter, &root).await?;
        conflicts.extend(listing.conflicts);
        conflict_keys.extend(listing.conflict_keys);
        for (key, mut item) in listing.items {
            item.bundled = true;
            merged.insert(key, item);
        }
    }

    let project_root = ctx.location_root(&location);
    if is_dir(&project_root).await {
        let listing = collect_root(adapter, &project_root).await?;
        conflicts.extend(listing.conflicts);
        conflict_keys.extend(listing.conflict_keys);
        for (key, item) in listing.items {
            if let Some(previous) = merged.insert(key, item) {
                debug!("Project item overrides bundled {}", previous.label());
            }
        }
    } else {
        debug!("No local {} directory at {}", adapter.name(), project_root.display());
    }

    for key in &conflict_keys {
        if let Some(item) = merged.remove(key) {
            conflicts.push(item);
        }
    }

    Ok(LocalListing {
        items: merged.into_values().collect(),
        conflicts,
        conflict_keys,
    })
}

/// Items under one location directory, with `local_path` attached.
///
/// Unrecognized or unreadable files are skipped with a warning.
pub async fn local_items(adapter: &dyn ResourceAdapter, root: &Path) -> Result<Vec<Item>> {
    let filter = GlobFilter::new(&adapter.search_for(), &adapter.ignoring())?;
    let mut paths = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };

        if filter.matches(relative) {
            paths.push(entry.path().to_path_buf());
        }
    }

    let mut items = Vec::new();
    for path in paths {
        match adapter.to_remote_item(root, &path).await {
            Ok(found) => {
                items.extend(found.into_iter().map(|item| item.with_local_path(&path)));
            }
            Err(e) if e.is_skippable_file_error() => {
                warn!("Skipping {}: {}", path.display(), e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(items)
}

struct RootListing {
    items: Vec<(SyncKey, Item)>,
    conflicts: Vec<Item>,
    conflict_keys: BTreeSet<SyncKey>,
}

async fn collect_root(adapter: &dyn ResourceAdapter, root: &Path) -> Result<RootListing> {
    let mut keyed: BTreeMap<SyncKey, Item> = BTreeMap::new();
    let mut conflicts = Vec::new();
    let mut conflict_keys = BTreeSet::new();

    for mut item in local_items(adapter, root).await? {
        let key = adapter.synckey(&item)?;
        item.synckey = Some(key.clone());

        if conflict_keys.contains(&key) {
            warn!("{} is also defined by {}", key, display_path(&item.local_path));
            conflicts.push(item);
            continue;
        }

        match keyed.get(&key) {
            Some(existing) if existing.fields == item.fields => {
                debug!("Duplicate definition of {} ignored", key);
            }
            Some(existing) => {
                warn!(
                    "{} is defined by both {} and {}; leaving it out of the sync",
                    key,
                    display_path(&existing.local_path),
                    display_path(&item.local_path)
                );
                if let Some(existing) = keyed.remove(&key) {
                    conflicts.push(existing);
                }
                conflicts.push(item);
                conflict_keys.insert(key);
            }
            None => {
                keyed.insert(key, item);
            }
        }
    }

    Ok(RootListing {
        items: keyed.into_iter().collect(),
        conflicts,
        conflict_keys,
    })
}

/// Bundle directories in insertion order: lowest precedence first
async fn bundle_roots(ctx: &SyncContext) -> Vec<PathBuf> {
    let bundles_root = ctx.bundles_root();
    let mut entries = match fs::read_dir(&bundles_root).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("{}", SyncError::local_io(&bundles_root, e));
            }
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                if is_dir {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("{}", SyncError::local_io(&bundles_root, e));
                break;
            }
        }
    }

    order_bundles(names, &ctx.bundle_priority)
        .into_iter()
        .map(|name| bundles_root.join(name))
        .collect()
}

/// Unlisted bundles first in lexical order, then listed ones from lowest to
/// highest priority. `priority` is highest first.
pub fn order_bundles(mut names: Vec<String>, priority: &[String]) -> Vec<String> {
    names.sort();

    let mut ordered: Vec<String> = names
        .iter()
        .filter(|name| !priority.contains(name))
        .cloned()
        .collect();

    for name in priority.iter().rev() {
        if names.contains(name) {
            ordered.push(name.clone());
        }
    }

    ordered
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unknown>".to_string())
}
