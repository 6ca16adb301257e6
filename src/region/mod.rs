//! Maps an organization slug to its regional API root.
//!
//! The control silo (a non-regional API root, overridable via
//! `BEACON_URL`/config) serves endpoints that are not org-scoped: OAuth
//! token exchange and `/users/me/regions/`. Org-scoped endpoints
//! (`/organizations/{org}/...`, `/projects/{org}/...`) are routed through
//! whatever region that org was last discovered in.
//!
//! Self-hosted, single-region deployments don't expose region discovery
//! at all; a 404 from the control silo's regions endpoint is not an
//! error, it just means every org routes to the control silo itself.

use crate::error::Result;
use crate::model::OrgRegion;
use crate::store::Store;

/// Resolve `org`'s API root, consulting the persisted directory first and
/// falling back to `discover` (a control-plane + per-region org-list
/// fan-out) on a cache miss.
///
/// `discover` is injected so this function stays testable without a live
/// HTTP client: it returns `Ok(None)` for the "no region discovery
/// available" case (self-hosted), `Ok(Some(org_regions))` otherwise. The
/// `/users/me/regions/` response only names regions, not the orgs that
/// live in them, so `discover` is expected to have already fanned out to
/// each region's own org list and resolved the actual org slug → region
/// URL pairs — the directory is keyed by org slug, never by region name.
pub fn resolve_org_region<F>(
    store: &mut Store,
    control_url: &str,
    org: &str,
    discover: F,
) -> Result<String>
where
    F: FnOnce() -> Result<Option<Vec<OrgRegion>>>,
{
    if let Some(url) = store.get_org_region(org)? {
        return Ok(url);
    }

    match discover()? {
        None => Ok(control_url.to_string()),
        Some(org_regions) => {
            let pairs: Vec<(String, String)> =
                org_regions.iter().map(|r| (r.org_slug.clone(), r.url.clone())).collect();
            store.set_org_regions(&pairs, now())?;
            Ok(store.get_org_region(org)?.unwrap_or_else(|| control_url.to_string()))
        }
    }
}

/// Bulk upsert of the org → region directory, as discovered from a
/// `/users/me/regions/` fan-out.
pub fn set_org_regions(store: &mut Store, pairs: &[(String, String)]) -> Result<()> {
    store.set_org_regions(pairs, now())
}

/// Invoked transitively by logout, which clears every cached region
/// alongside the stored credentials.
pub fn clear_org_regions(store: &mut Store) -> Result<()> {
    store.clear_org_regions()
}

/// True when `path` names an org-scoped route that must be dispatched
/// through a resolved region instead of the control silo directly:
/// `/organizations/{slug}/...` or `/projects/{slug}/...`.
#[must_use]
pub fn org_scoped_slug(path: &str) -> Option<&str> {
    let rest = path
        .strip_prefix("/organizations/")
        .or_else(|| path.strip_prefix("/projects/"))?;
    rest.split('/').next().filter(|s| !s.is_empty())
}

fn now() -> i64 {
    crate::config::unix_time()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_scoped_slug_matches_organizations_and_projects() {
        assert_eq!(org_scoped_slug("/organizations/acme/issues/"), Some("acme"));
        assert_eq!(org_scoped_slug("/projects/acme/frontend/"), Some("acme"));
        assert_eq!(org_scoped_slug("/users/me/regions/"), None);
        assert_eq!(org_scoped_slug("/oauth/token/"), None);
    }

    #[test]
    fn resolve_uses_cache_when_present() {
        let mut store = Store::open_memory().unwrap();
        store.set_org_regions(&[("acme".into(), "https://eu.example.test".into())], 0).unwrap();

        let url = resolve_org_region(&mut store, "https://ctrl.example.test", "acme", || {
            panic!("discover should not be called on a cache hit")
        })
        .unwrap();
        assert_eq!(url, "https://eu.example.test");
    }

    #[test]
    fn resolve_falls_back_to_control_url_on_404() {
        let mut store = Store::open_memory().unwrap();
        let url = resolve_org_region(&mut store, "https://ctrl.example.test", "acme", || Ok(None)).unwrap();
        assert_eq!(url, "https://ctrl.example.test");
    }

    #[test]
    fn resolve_persists_discovered_regions() {
        let mut store = Store::open_memory().unwrap();
        let url = resolve_org_region(&mut store, "https://ctrl.example.test", "acme", || {
            Ok(Some(vec![OrgRegion { org_slug: "acme".into(), url: "https://us.example.test".into() }]))
        })
        .unwrap();
        assert_eq!(url, "https://us.example.test");
        assert_eq!(store.get_org_region("acme").unwrap(), Some("https://us.example.test".into()));
    }

    #[test]
    fn resolve_keys_directory_by_org_slug_not_region_name() {
        let mut store = Store::open_memory().unwrap();
        let url = resolve_org_region(&mut store, "https://ctrl.example.test", "acme", || {
            Ok(Some(vec![
                OrgRegion { org_slug: "acme".into(), url: "https://us.example.test".into() },
                OrgRegion { org_slug: "other-org".into(), url: "https://eu.example.test".into() },
            ]))
        })
        .unwrap();
        assert_eq!(url, "https://us.example.test");
        // A region's own name ("us") must never work as a lookup key.
        assert_eq!(store.get_org_region("us").unwrap(), None);
    }
}
