//! Local key-value store backing auth, region routing, aliases, and
//! resolution caches.
//!
//! This module provides persistence using SQLite with:
//! - WAL mode for concurrent reads
//! - `IMMEDIATE` transactions for atomic multi-row writes
//! - Declarative, non-destructive schema repair on an existing database
//!
//! # Submodules
//!
//! - [`schema`] - declarative table/column definitions
//! - [`migrations`] - diff + repair against the declared schema
//! - [`sqlite`] - the `Store` type and its accessor methods
//!
//! The handle is process-wide: lazily opened on first [`acquire`], and
//! guaranteed to close on every exit path — including an unwinding panic —
//! because the [`StoreGuard`] returned by `acquire` closes it on `Drop`.

pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use migrations::{RepairReport, SchemaIssue};
pub use sqlite::Store;

use crate::error::Result;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

static HANDLE: OnceLock<Mutex<Option<Store>>> = OnceLock::new();

fn handle() -> &'static Mutex<Option<Store>> {
    HANDLE.get_or_init(|| Mutex::new(None))
}

/// RAII handle for the process-wide store. Hold this for the lifetime of
/// the command; the underlying connection closes when it drops.
pub struct StoreGuard {
    _private: (),
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        close();
    }
}

/// Open the store at `path` if it isn't already open, and return a guard
/// that closes it on drop. Safe to call more than once per process (e.g.
/// from tests) — later calls reuse the existing connection and each
/// returned guard closes it independently.
pub fn acquire(path: &Path) -> Result<StoreGuard> {
    let mut guard = handle().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if guard.is_none() {
        *guard = Some(Store::open(path)?);
    }
    Ok(StoreGuard { _private: () })
}

/// Run `f` against the process-wide store. Panics if [`acquire`] has not
/// been called first — that would be a programming error, not a runtime
/// condition a caller should need to handle.
pub fn with_store<F, R>(f: F) -> R
where
    F: FnOnce(&mut Store) -> R,
{
    let mut guard = handle().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let store = guard.as_mut().expect("store::acquire must run before store::with_store");
    f(store)
}

/// Close the process-wide connection immediately, if one is open.
/// Normally invoked by [`StoreGuard::drop`]; exposed so `logout` and tests
/// can force a reopen without waiting for the guard to go out of scope.
pub fn close() {
    let mut guard = handle().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    *guard = None;
}
