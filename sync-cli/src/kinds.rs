//! Resource kinds the binary knows about

use std::sync::Arc;

use solsync::{Registry, ResourceAdapter, Result, SyncContext, SyncError, SyncableDescriptor};
use solsync_api::{RecordAdapter, RecordKind, SolutionClient, StaticFileAdapter};

use crate::config::ProjectConfig;

/// One built-in record kind and how it shows up on the command line
struct BuiltinRecord {
    kind: RecordKind,
    flag: char,
    description: &'static str,
    aliases: &'static [&'static str],
    included_by_default: bool,
}

fn builtin_records() -> Vec<BuiltinRecord> {
    vec![
        BuiltinRecord {
            kind: RecordKind::new("endpoints", "endpoint", ["method", "path"]),
            flag: 'a',
            description: "HTTP endpoints",
            aliases: &["routes", "api"],
            included_by_default: true,
        },
        BuiltinRecord {
            kind: RecordKind::new("modules", "module", ["name"]),
            flag: 'm',
            description: "Script modules",
            aliases: &["libraries"],
            included_by_default: true,
        },
        BuiltinRecord {
            kind: RecordKind::new("eventhandlers", "eventhandler", ["service", "event"]),
            flag: 'e',
            description: "Event handlers",
            aliases: &["events"],
            included_by_default: true,
        },
        BuiltinRecord {
            kind: RecordKind::new("resources", "resource", ["alias"]),
            flag: 'd',
            description: "Device resources",
            aliases: &["specs"],
            included_by_default: true,
        },
        BuiltinRecord {
            kind: RecordKind::new("users", "user", ["email"]),
            flag: 'u',
            description: "Solution users",
            aliases: &[],
            included_by_default: false,
        },
        BuiltinRecord {
            kind: RecordKind::new("roles", "role", ["role_id"]),
            flag: 'r',
            description: "User roles",
            aliases: &[],
            included_by_default: false,
        },
    ]
}

fn not_connected() -> SyncError {
    SyncError::config_error(format!(
        "no solution id configured; set remote.solution_id or {}",
        crate::config::SOLUTION_ID_ENV
    ))
}

fn record_descriptor(
    record: RecordKind,
    flag: char,
    description: &str,
    client: Option<Arc<SolutionClient>>,
) -> SyncableDescriptor {
    let name = record.name.clone();
    SyncableDescriptor::new(name, flag, description, move |_ctx: &SyncContext| {
        let client = client.clone().ok_or_else(not_connected)?;
        Ok(Box::new(RecordAdapter::new(record.clone(), client)) as Box<dyn ResourceAdapter>)
    })
}

/// Register static files, the built-in record kinds and the config's own kinds
pub fn register_builtins(
    registry: &mut Registry,
    config: &ProjectConfig,
    client: Option<Arc<SolutionClient>>,
) -> Result<()> {
    let files_location = config
        .locations
        .get("files")
        .cloned()
        .unwrap_or_else(|| "files".into());
    let files_ignoring = config.project.files_ignoring.clone();
    let files_client = client.clone();
    registry.register(
        SyncableDescriptor::new("files", 's', "Static files", move |_ctx: &SyncContext| {
            let client = files_client.clone().ok_or_else(not_connected)?;
            let mut adapter = StaticFileAdapter::new(client, files_location.clone());
            if let Some(ignoring) = &files_ignoring {
                adapter = adapter.with_ignoring(ignoring.clone());
            }
            Ok(Box::new(adapter) as Box<dyn ResourceAdapter>)
        })
        .with_aliases(["assets"]),
    )?;

    for builtin in builtin_records() {
        let mut kind = builtin.kind;
        if let Some(location) = config.locations.get(&kind.name) {
            kind = kind.with_location(location.clone());
        }

        let mut descriptor = record_descriptor(kind, builtin.flag, builtin.description, client.clone())
            .with_aliases(builtin.aliases.iter().copied());
        if !builtin.included_by_default {
            descriptor = descriptor.not_default();
        }
        registry.register(descriptor)?;
    }

    for custom in &config.kinds {
        let description = if custom.description.is_empty() {
            custom.record.name.clone()
        } else {
            custom.description.clone()
        };
        let mut descriptor = record_descriptor(custom.record.clone(), custom.flag, &description, client.clone())
            .with_aliases(custom.aliases.clone());
        if !custom.included_by_default {
            descriptor = descriptor.not_default();
        }
        registry.register(descriptor)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use solsync::Selection;
    use std::path::PathBuf;

    fn client() -> Arc<SolutionClient> {
        Arc::new(SolutionClient::new("http://localhost:9", "s1").unwrap())
    }

    #[test]
    fn test_builtins_register_with_unique_flags() {
        let mut registry = Registry::new();
        register_builtins(&mut registry, &ProjectConfig::default(), Some(client())).unwrap();

        assert_eq!(registry.len(), 7);
        assert_eq!(registry.by_flag('s').unwrap().name, "files");
        assert_eq!(registry.get("routes").unwrap().name, "endpoints");

        let defaults: Vec<&str> = registry
            .filtered(&Selection::default(), None)
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(defaults, vec!["files", "endpoints", "modules", "eventhandlers", "resources"]);
    }

    #[test]
    fn test_location_override_reaches_adapter() {
        let mut config = ProjectConfig::default();
        config.locations.insert("endpoints".to_string(), PathBuf::from("routes"));
        config.locations.insert("files".to_string(), PathBuf::from("public"));

        let mut registry = Registry::new();
        register_builtins(&mut registry, &config, Some(client())).unwrap();
        let ctx = SyncContext::new("/work/app");

        let endpoints = registry.get("endpoints").unwrap().build(&ctx).unwrap();
        assert_eq!(endpoints.location(), PathBuf::from("routes"));
        let files = registry.get("files").unwrap().build(&ctx).unwrap();
        assert_eq!(files.location(), PathBuf::from("public"));
        assert_eq!(files.key_field(), "path");
    }

    #[test]
    fn test_custom_kind_flag_collision_is_rejected() {
        let mut config = ProjectConfig::default();
        config.kinds.push(crate::config::CustomKind {
            flag: 'm',
            description: String::new(),
            aliases: Vec::new(),
            included_by_default: true,
            record: RecordKind::new("dashboards", "dashboard", ["title"]),
        });

        let mut registry = Registry::new();
        let err = register_builtins(&mut registry, &config, None).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateFlag { flag: 'm', .. }));
    }

    #[test]
    fn test_building_without_solution_is_configuration_error() {
        let mut registry = Registry::new();
        register_builtins(&mut registry, &ProjectConfig::default(), None).unwrap();

        let err = registry.get("files").unwrap().build(&SyncContext::new(".")).err().unwrap();
        assert!(matches!(err, SyncError::Configuration(_)));
    }
}
