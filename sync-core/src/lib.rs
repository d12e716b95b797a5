//! REST transport for a remote solution
//!
//! This crate connects the reconciliation engine to the platform API:
//! - [`api`]: the solution client with JSON CRUD, raw file content and retries
//! - [`resources`]: adapters for record kinds and static files

pub mod api;
pub mod resources;

pub use api::{ApiError, SolutionClient, SolutionClientBuilder};
pub use resources::{RecordAdapter, RecordKind, StaticFileAdapter};
