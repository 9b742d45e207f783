// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for edit-session crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`backend`] - In-memory entity backend with call counters and failure toggles
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`confirm`] - Scripted leave/delete confirmation port
//! - [`fixtures`] - Catalog schemas, raw records and actors

pub mod backend;
pub mod config;
pub mod confirm;
pub mod fixtures;

// Re-export commonly used items at crate root for convenience
pub use backend::FakeEntityPort;
pub use config::InMemoryConfigStore;
pub use confirm::ScriptedConfirm;
pub use fixtures::{
    admin, blog_record, blog_schema, owner, project_record, project_schema, stranger, viewer,
    BLOG_ID, OWNER_ID, PROJECT_ID,
};
