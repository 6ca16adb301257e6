//! Command implementations.

pub mod auth;
pub mod completions;
pub mod issues;
