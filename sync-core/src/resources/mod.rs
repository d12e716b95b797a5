//! Generic resource adapters backed by [`SolutionClient`](crate::api::SolutionClient)

pub mod record;
pub mod static_files;

pub use record::{RecordAdapter, RecordKind};
pub use static_files::StaticFileAdapter;
