//! # confsync core
//!
//! Object model and local side of the confsync reconciler.
//!
//! This crate provides:
//! - Typed keys and objects (branch → config → config row)
//! - The manifest and the locked project directory
//! - Naming templates, path generation and inverse path matching
//! - The in-memory object graph (`State`)
//! - The diff engine
//! - The local unit of work: bounded worker pool, save transaction with
//!   `.old` backups, load/save mappers, rename batches, empty dir cleanup
//!
//! ## Key Invariants
//!
//! - A graph node always holds a local or a remote object
//! - No two objects share a path
//! - A failed save leaves the previous files in place
//! - The manifest is written only by the coordinating task

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod diff;
mod error;
pub mod local;
pub mod manifest;
pub mod model;
pub mod naming;
pub mod project;
pub mod state;

pub use diff::{ChangedFields, DiffResult, DiffResults, Differ, ResultState};
pub use error::{CoreError, CoreResult, MultiError};
pub use manifest::{AllowedBranches, Manifest, ProjectInfo};
pub use model::{
    Branch, BranchKey, Component, ComponentsMap, Config, ConfigKey, ConfigRow, ConfigRowKey,
    Content, Key, Object, PathInProject, Record, Relation, Relations,
};
pub use project::ProjectDir;
pub use state::{ObjectState, State};
