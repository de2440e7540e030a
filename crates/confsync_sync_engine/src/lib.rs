//! # confsync sync engine
//!
//! Reconciles a project directory with the remote storage API.
//!
//! This crate provides:
//! - The `StorageApi` seam with an HTTP implementation and an in-memory mock
//! - Loading of the remote state and API ↔ object mapping
//! - Plans for pull, push, persist, rename and encrypt
//! - The executor running plans through the local and remote units of work
//! - `SyncEngine`, the facade used by the command line
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐      ┌───────────┐      ┌──────────────┐
//! │ project dir  │◄────►│   State   │◄────►│  StorageApi  │
//! │ (local UoW)  │      │ + Differ  │      │ (remote UoW) │
//! └──────────────┘      └─────┬─────┘      └──────────────┘
//!                             │
//!                      Plan → Executor
//! ```
//!
//! ## Key Invariants
//!
//! - Plans are computed completely before anything is executed
//! - Remote objects are created parents first and deleted children first
//! - The default branch is never deleted
//! - Remote deletes during push require an explicit force flag
//! - The manifest is saved after execution, even after a partial failure

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod config;
mod engine;
mod error;
mod executor;
mod http;
mod mock;
pub mod plan;
pub mod remote;

pub use api::{
    ApiBranch, ApiComponent, ApiComponentConfigs, ApiConfig, ApiConfigRow, StorageApi,
    TicketResponse,
};
pub use config::{
    EngineConfig, DEFAULT_MAX_LOCAL_WORKERS, DEFAULT_MAX_REMOTE_REQUESTS,
    DEFAULT_MAX_TICKET_REQUESTS,
};
pub use engine::{OperationReport, PullOptions, PushOptions, SyncEngine};
pub use error::{push_error, SyncError, SyncResult};
pub use executor::Executor;
pub use http::{HttpClient, HttpRequest, HttpResponse, HttpStorageApi, Method, TOKEN_HEADER};
pub use mock::{MockStorageApi, FIRST_TICKET};
