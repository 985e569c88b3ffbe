//! punchlist - plain-text task records
//!
//! Each task is a markdown file with a YAML header, kept in a scope's
//! `tasks/` directory and named `<zero-padded id>-<slug>.md`.
//!
//! # Module Organization
//!
//! - `record`: Record codec (header/body split, canonical serialization)
//! - `section`: Structured edits of `## Log` / `## Notes` body sections
//! - `selector`: Task id expressions (`3`, `5-7`, `[1, 2, 4-5]`)
//! - `store`: Record repository with filesystem and in-memory adapters
//! - `compact`: Two-phase renumbering of ids into `1..=N`
//! - `ops`: Task operations (create, state, log, note, due, delete)
//! - `scope`: Scope layout, discovery and trash
//! - `config`: `.punchlist/config.toml`
//! - `clock`: Timestamps and due date parsing
//! - `cli`: Command-line interface using clap
//! - `error`: Error types and result aliases

pub mod cli;
pub mod clock;
pub mod compact;
pub mod config;
pub mod error;
pub mod ops;
pub mod output;
pub mod record;
pub mod scope;
pub mod section;
pub mod selector;
pub mod store;

pub use error::{Error, Result};
