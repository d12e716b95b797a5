//! Command line definition
//!
//! The static part is derived. Kind switches depend on the registry, which
//! depends on the config file, so they are attached to the sync subcommands at
//! runtime by [`build_command`].

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Args, Command, CommandFactory, Parser, Subcommand};
use solsync::{Direction, Registry, Selection, SyncOptions};
use tracing::warn;

use crate::config::CONFIG_FILE_NAME;

/// Subcommands that take kind switches
const SYNC_SUBCOMMANDS: [&str; 4] = ["syncup", "syncdown", "status", "diff"];

/// Short letters already claimed by global options or clap itself
const RESERVED_SHORTS: [char; 5] = ['p', 'c', 'l', 'h', 'V'];

const RESERVED_LONGS: [&str; 17] = [
    "all", "delete", "no-delete", "create", "no-create", "update", "no-update", "diff", "no-diff",
    "dry-run", "asdown", "asup", "json", "project", "config", "log-level", "help",
];

#[derive(Debug, Parser)]
#[command(name = "solsync")]
#[command(about = "Keep a local project directory in sync with a remote solution")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project directory
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Configuration file path (defaults to <project>/.solsync.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Push local changes to the remote solution
    Syncup(SyncArgs),
    /// Pull remote changes into the project
    #[command(alias = "pull")]
    Syncdown(SyncArgs),
    /// Show what a sync would do
    Status(SyncArgs),
    /// Show what a sync would do, with diffs of modified items
    Diff(SyncArgs),
    /// List the resource kinds that can be synced
    Kinds,
}

#[derive(Debug, Clone, Default, Args)]
pub struct SyncArgs {
    /// Select every resource kind
    #[arg(long)]
    pub all: bool,

    /// Remove items missing on the authoritative side
    #[arg(long, overrides_with = "no_delete")]
    pub delete: bool,
    #[arg(long, overrides_with = "delete", hide = true)]
    pub no_delete: bool,

    /// Create items missing on the target side
    #[arg(long, overrides_with = "no_create")]
    pub create: bool,
    #[arg(long, overrides_with = "create", hide = true)]
    pub no_create: bool,

    /// Update items that differ
    #[arg(long, overrides_with = "no_update")]
    pub update: bool,
    #[arg(long, overrides_with = "update", hide = true)]
    pub no_update: bool,

    /// Run the external diff on modified items
    #[arg(long, overrides_with = "no_diff")]
    pub diff: bool,
    #[arg(long, overrides_with = "diff", hide = true)]
    pub no_diff: bool,

    /// Log planned actions without performing them
    #[arg(long)]
    pub dry_run: bool,

    /// Treat the remote as authoritative
    #[arg(long, conflicts_with = "asup")]
    pub asdown: bool,

    /// Treat the project as authoritative
    #[arg(long)]
    pub asup: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

fn switch(on: bool, off: bool, default: bool) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => default,
    }
}

impl SyncArgs {
    /// Engine options, with `direction` as the command's own default
    pub fn options(&self, direction: Direction) -> SyncOptions {
        let defaults = SyncOptions::default();
        let direction = if self.asdown {
            Direction::Down
        } else if self.asup {
            Direction::Up
        } else {
            direction
        };

        SyncOptions {
            delete: switch(self.delete, self.no_delete, defaults.delete),
            create: switch(self.create, self.no_create, defaults.create),
            update: switch(self.update, self.no_update, defaults.update),
            diff: switch(self.diff, self.no_diff, defaults.diff),
            dry_run: self.dry_run,
            direction,
        }
    }
}

impl Commands {
    pub fn sync_args(&self) -> Option<&SyncArgs> {
        match self {
            Commands::Syncup(args) | Commands::Syncdown(args) | Commands::Status(args) | Commands::Diff(args) => {
                Some(args)
            }
            Commands::Kinds => None,
        }
    }

    /// Options this invocation runs with
    pub fn options(&self) -> Option<SyncOptions> {
        match self {
            Commands::Syncup(args) | Commands::Status(args) => Some(args.options(Direction::Up)),
            Commands::Syncdown(args) => Some(args.options(Direction::Down)),
            Commands::Diff(args) => {
                let mut options = args.options(Direction::Up);
                options.diff = true;
                Some(options)
            }
            Commands::Kinds => None,
        }
    }
}

fn kind_arg_id(name: &str) -> String {
    format!("kind:{}", name)
}

fn kind_arg(descriptor: &solsync::SyncableDescriptor) -> Arg {
    let mut arg = Arg::new(kind_arg_id(&descriptor.name))
        .action(ArgAction::SetTrue)
        .help(descriptor.description.clone());

    if RESERVED_LONGS.contains(&descriptor.name.as_str()) {
        warn!("Kind '{}' clashes with an option name; use its flag letter", descriptor.name);
    } else {
        arg = arg.long(descriptor.name.clone());
        let aliases: Vec<String> = descriptor
            .aliases
            .iter()
            .filter(|a| !RESERVED_LONGS.contains(&a.as_str()) && **a != descriptor.name)
            .cloned()
            .collect();
        arg = arg.visible_aliases(aliases);
    }

    if RESERVED_SHORTS.contains(&descriptor.flag) {
        warn!("Flag '-{}' of kind '{}' is reserved", descriptor.flag, descriptor.name);
    } else {
        arg = arg.short(descriptor.flag);
    }

    arg
}

/// The full command, with one switch per registered kind on every sync subcommand
pub fn build_command(registry: &Registry) -> Command {
    let mut command = Cli::command();
    for name in SYNC_SUBCOMMANDS {
        command = command.mut_subcommand(name, |sub| {
            registry.iter().fold(sub, |sub, descriptor| sub.arg(kind_arg(descriptor)))
        });
    }
    command
}

/// Kinds switched on in the matched subcommand
pub fn selection(registry: &Registry, matches: &ArgMatches, args: &SyncArgs) -> Selection {
    if args.all {
        return Selection::all();
    }

    let Some((_, sub)) = matches.subcommand() else {
        return Selection::default();
    };

    let kinds: Vec<String> = registry
        .iter()
        .filter(|d| matches!(sub.try_get_one::<bool>(&kind_arg_id(&d.name)), Ok(Some(true))))
        .map(|d| d.name.clone())
        .collect();
    Selection::of(kinds)
}

/// Global options read ahead of full parsing
#[derive(Debug, Clone, PartialEq)]
pub struct Bootstrap {
    pub project: PathBuf,
    pub config: Option<PathBuf>,
    pub log_level: String,
}

/// Read the global options before the command is built.
///
/// The registry, and with it the set of valid kind switches, comes from the
/// config file, so its location must be known first.
pub fn bootstrap<I, T>(args: I) -> Bootstrap
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<String> = args
        .into_iter()
        .skip(1)
        .map(|a| a.into().to_string_lossy().into_owned())
        .collect();

    enum Slot {
        Project,
        Config,
        LogLevel,
    }

    let mut found = Bootstrap {
        project: PathBuf::from("."),
        config: None,
        log_level: "info".to_string(),
    };
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }
        let (name, inline) = match arg.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name, Some(value.to_string())),
            _ => (arg.as_str(), None),
        };

        let slot = match name {
            "-p" | "--project" => Slot::Project,
            "-c" | "--config" => Slot::Config,
            "-l" | "--log-level" => Slot::LogLevel,
            _ => continue,
        };
        let Some(value) = inline.or_else(|| iter.next().cloned()) else {
            break;
        };
        match slot {
            Slot::Project => found.project = PathBuf::from(value),
            Slot::Config => found.config = Some(PathBuf::from(value)),
            Slot::LogLevel => found.log_level = value,
        }
    }

    found
}

/// Config path used when `--config` is absent
pub fn default_config_path(project: &std::path::Path) -> PathBuf {
    project.join(CONFIG_FILE_NAME)
}
