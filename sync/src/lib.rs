//! Solution Sync Engine
//!
//! Reconciles a local project directory with a remote solution:
//! - Registry of syncable resource kinds
//! - Local item collection with bundle overlays
//! - Status classification of local vs remote items
//! - Sync up / sync down with per-action toggles and dry-run
//! - Content-change cache for reliable modification detection
//! - External diff of modified items

pub mod adapter;
pub mod cache;
pub mod collector;
pub mod compare;
pub mod context;
pub mod error;
pub mod executor;
pub mod external_diff;
pub mod filter;
pub mod item;
pub mod registry;
pub mod report;
pub mod status;

// Re-export main types and functions
pub use adapter::{item_key, ResourceAdapter};
pub use cache::{CacheEntry, ContentCache};
pub use collector::{local_items, local_list, LocalListing};
pub use context::{Direction, SyncContext, SyncOptions};
pub use error::{Result, SyncError};
pub use executor::SyncExecutor;
pub use external_diff::ExternalDiff;
pub use filter::GlobFilter;
pub use item::{Item, SyncKey, WireItem};
pub use registry::{AdapterFactory, Registry, Selection, SyncableDescriptor};
pub use report::{ItemFailure, KindReport, SyncAction, SyncReport};
pub use status::{status, ClassificationResult};

// Test modules
#[cfg(test)]
mod test_support;
#[cfg(test)]
mod executor_tests;
