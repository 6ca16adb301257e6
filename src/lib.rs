//! beacon — a command-line client for a hosted error-tracking service.
//!
//! This crate implements the core engineering of the CLI: target
//! resolution, region-aware HTTP dispatch, budgeted concurrent fetch,
//! compound cursor pagination, and project-alias assignment, plus the
//! persistent store and ambient stack (errors, config, CLI surface,
//! output rendering) that tie them into a runnable binary.
//!
//! # Architecture
//!
//! - [`store`] — C1: persistent local key-value store, schema versioning and repair
//! - [`region`] — C2: org → regional API root directory
//! - [`http`] — C3: authenticated, region-aware HTTP transport
//! - [`target`] — C4: positional-argument parsing and target resolution
//! - [`fetch`] — C5: two-phase budgeted concurrent fetch coordinator
//! - [`cursor`] — C6: context-key fingerprinting and compound cursor codec
//! - [`alias`] — C7: shortest-unique-prefix alias assignment
//! - [`pipeline`] — C8: composes C4→C5→C7 into one `issues list` invocation
//! - [`model`] — shared data types
//! - [`config`] — directory/environment resolution
//! - [`error`] — error kinds, exit codes, structured JSON output
//! - [`cli`] — clap surface and command handlers
//! - [`output`] — plain-table and `--json` rendering

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alias;
pub mod cli;
pub mod config;
pub mod cursor;
pub mod error;
pub mod fetch;
pub mod http;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod region;
pub mod store;
pub mod target;

pub use error::{Error, Result};
