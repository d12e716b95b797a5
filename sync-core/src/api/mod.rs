//! Solution API client module
//!
//! Thin wrapper around the platform's per-solution REST API: JSON CRUD on
//! record collections, raw content for stored files, bearer token auth and
//! automatic retries of transient failures.

pub mod client;
pub mod crud;
pub mod error;
pub mod types;

// Re-export main types for convenience
pub use client::{solution_root, SolutionClient, SolutionClientBuilder};
pub use crud::CrudOperations;
pub use error::{ApiError, Result};
pub use types::*;
