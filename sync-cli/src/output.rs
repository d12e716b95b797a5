//! Plain-text rendering of reports for the terminal

use std::fmt::Write;

use solsync::{Item, Registry, SyncReport};

/// One line per registered kind: switches, aliases and description
pub fn render_kinds(registry: &Registry) -> String {
    let mut out = String::new();
    for descriptor in registry.iter() {
        let aliases = if descriptor.aliases.is_empty() {
            String::new()
        } else {
            format!(" ({})", descriptor.aliases.join(", "))
        };
        let default = if descriptor.included_by_default { "" } else { " [not default]" };
        let _ = writeln!(
            out,
            "-{}  --{:<16}{}{}{}",
            descriptor.flag, descriptor.name, descriptor.description, aliases, default
        );
    }
    out
}

fn push_bucket(out: &mut String, marker: char, items: &[Item], with_diff: bool) {
    for item in items {
        let _ = writeln!(out, "  {} {}", marker, item.label());
        if !with_diff {
            continue;
        }
        if let Some(diff) = &item.diff {
            for line in diff.lines() {
                let _ = writeln!(out, "      {}", line);
            }
        }
    }
}

/// Pending changes per kind; unchanged items are only counted
pub fn render_status(report: &SyncReport) -> String {
    let mut out = String::new();
    for kind in &report.kinds {
        if let Some(error) = &kind.error {
            let _ = writeln!(out, "{}: failed ({})", kind.kind, error);
            continue;
        }

        let status = &kind.status;
        let _ = writeln!(out, "{}: {}", kind.kind, status.summary());
        push_bucket(&mut out, '+', &status.to_add, false);
        push_bucket(&mut out, '-', &status.to_delete, false);
        push_bucket(&mut out, 'M', &status.to_modify, true);
        push_bucket(&mut out, '!', &status.conflicting, false);
    }
    out
}
