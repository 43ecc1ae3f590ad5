//! Comic Layout Designer library - workspace state, live sync, and snapshots
//! for a local comic page layout editor.
//!
//! This library exposes the core of the `cld` binary for use in tests and
//! other frontends.
//!
//! # Modules
//!
//! - `store`: SQLite key-value store with a change watermark
//! - `workspace`: Typed images/pages facade and uploaded asset files
//! - `layout`: Page layout templates and styles
//! - `stream`: Change notification stream
//! - `archive`: Snapshot zip export/import
//! - `web`: HTTP adapter for the editor frontend
//! - `config`: Data directory layout and settings file
//! - `error`: Error types with hints
#![forbid(unsafe_code)]

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod store;
pub mod stream;
pub mod web;
pub mod workspace;
