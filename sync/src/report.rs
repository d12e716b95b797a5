//! Outcome counters for a sync run

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::context::Direction;
use crate::status::ClassificationResult;

/// Kind of action applied to one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Delete,
    Create,
    Update,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncAction::Delete => write!(f, "delete"),
            SyncAction::Create => write!(f, "create"),
            SyncAction::Update => write!(f, "update"),
        }
    }
}

/// One item action that did not go through
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub action: SyncAction,
    pub item: String,
    pub error: String,
}

/// What happened to one resource kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct KindReport {
    pub kind: String,
    pub status: ClassificationResult,
    pub deleted: usize,
    pub created: usize,
    pub updated: usize,
    /// Planned or bundled actions that were deliberately not performed
    pub skipped: usize,
    pub failures: Vec<ItemFailure>,
    /// Items the remote rejected because they changed since listing
    pub conflicts: Vec<String>,
    /// Set when the kind could not be processed at all
    pub error: Option<String>,
}

impl KindReport {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn failed(kind: impl Into<String>, error: impl ToString) -> Self {
        Self {
            kind: kind.into(),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn record(&mut self, action: SyncAction) {
        match action {
            SyncAction::Delete => self.deleted += 1,
            SyncAction::Create => self.created += 1,
            SyncAction::Update => self.updated += 1,
        }
    }

    pub fn record_failure(&mut self, action: SyncAction, item: impl Into<String>, error: impl ToString) {
        self.failures.push(ItemFailure {
            action,
            item: item.into(),
            error: error.to_string(),
        });
    }

    pub fn summary(&self) -> String {
        if let Some(error) = &self.error {
            return format!("{}: failed ({})", self.kind, error);
        }
        format!(
            "{}: {} created, {} updated, {} deleted, {} skipped, {} failed, {} conflicts",
            self.kind,
            self.created,
            self.updated,
            self.deleted,
            self.skipped,
            self.failures.len(),
            self.conflicts.len() + self.status.conflicting.len()
        )
    }
}

/// Report for one invocation across all selected kinds
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub session_id: Uuid,
    pub direction: Direction,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub kinds: Vec<KindReport>,
}

impl SyncReport {
    pub fn new(direction: Direction, dry_run: bool) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            direction,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            kinds: Vec::new(),
        }
    }

    pub fn complete(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn kind(&self, name: &str) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == name)
    }

    /// Total per-item failures across kinds, plus kinds that failed outright
    pub fn failure_count(&self) -> usize {
        self.kinds
            .iter()
            .map(|k| k.failures.len() + usize::from(k.error.is_some()))
            .sum()
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Sync {}{} ({} kinds)",
            self.direction,
            if self.dry_run { " [dry run]" } else { "" },
            self.kinds.len()
        )];
        lines.extend(self.kinds.iter().map(|k| format!("  {}", k.summary())));
        lines.join("\n")
    }
}
