//! # confsync testkit
//!
//! Test utilities for confsync.
//!
//! This crate provides:
//! - `TestProject`, a temporary project directory with a manifest and a
//!   mock storage API
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use confsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn pulls_a_branch() {
//!     let project = TestProject::new();
//!     project.api.add_branch("111", "Main", true);
//!     let mut engine = project.engine();
//!     engine.pull(PullOptions::default()).await.unwrap();
//!     assert!(project.exists("main/meta.json"));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
