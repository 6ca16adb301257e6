//! Directory/environment resolution: store path, control-plane base URL,
//! and target-context environment variables.

use std::path::{Path, PathBuf};

const DEFAULT_BASE_URL: &str = "https://beacon.sh/api/0";

/// Resolve the store's database path.
///
/// Priority:
/// 1. `explicit` (the `--config-dir` CLI flag, joined with `beacon.db`)
/// 2. `BEACON_CONFIG_DIR` environment variable
/// 3. `BEACON_TEST_DB` — isolates tests into a throwaway location
/// 4. Platform default via `directories::BaseDirs`: `~/.beacon/beacon.db`
#[must_use]
pub fn resolve_store_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.join("beacon.db");
    }

    if let Ok(dir) = std::env::var("BEACON_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir).join("beacon.db");
        }
    }

    if is_test_mode() {
        return test_store_path();
    }

    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".beacon").join("beacon.db"))
        .unwrap_or_else(|| PathBuf::from(".beacon").join("beacon.db"))
}

/// Test mode is enabled by setting `BEACON_TEST_DB` to any non-empty,
/// non-`0`/`false` value — mirrors the store's test isolation pattern so
/// integration tests never touch a developer's real store.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("BEACON_TEST_DB")
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

#[must_use]
pub fn test_store_path() -> PathBuf {
    std::env::temp_dir().join("beacon-test").join("beacon.db")
}

/// Resolve the control-plane base URL: `--url` flag > `BEACON_BASE_URL`
/// env > the compiled-in default. Captured once at startup per the
/// "environment captured once" global-state contract.
#[must_use]
pub fn resolve_base_url(explicit: Option<&str>) -> String {
    if let Some(url) = explicit.filter(|u| !u.is_empty()) {
        return url.trim_end_matches('/').to_string();
    }
    if let Ok(url) = std::env::var("BEACON_BASE_URL") {
        if !url.trim().is_empty() {
            return url.trim_end_matches('/').to_string();
        }
    }
    DEFAULT_BASE_URL.to_string()
}

/// `BEACON_ORG` / `BEACON_PROJECT` (the latter supporting the
/// `org/project` combo form, handled by [`crate::target::resolve_from_context`]).
#[must_use]
pub fn env_org() -> Option<String> {
    std::env::var("BEACON_ORG").ok().filter(|s| !s.is_empty())
}

#[must_use]
pub fn env_project() -> Option<String> {
    std::env::var("BEACON_PROJECT").ok().filter(|s| !s.is_empty())
}

/// A manual, non-OAuth access token bypassing the refresh flow entirely
/// (no refresh token means a 401 can never be recovered).
#[must_use]
pub fn env_auth_token() -> Option<String> {
    std::env::var("BEACON_AUTH_TOKEN").ok().filter(|s| !s.is_empty())
}

/// Unix timestamp in seconds, used for cache TTLs and `updated_at`
/// columns. The only place in the crate allowed to read the wall clock,
/// so every other function stays pure and testable.
#[must_use]
pub fn unix_time() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_base_url_strips_trailing_slash() {
        assert_eq!(resolve_base_url(Some("https://example.test/")), "https://example.test");
    }

    #[test]
    fn resolve_base_url_falls_back_to_default() {
        std::env::remove_var("BEACON_BASE_URL");
        assert_eq!(resolve_base_url(None), DEFAULT_BASE_URL);
    }

    #[test]
    fn resolve_store_path_uses_explicit_dir() {
        let explicit = PathBuf::from("/tmp/custom-beacon-dir");
        assert_eq!(resolve_store_path(Some(&explicit)), explicit.join("beacon.db"));
    }
}
