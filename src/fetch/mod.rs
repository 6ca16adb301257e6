//! Two-phase budgeted concurrent fetch across a target list, merged
//! ordering, and trim-with-fairness.
//!
//! Phase 1 gives every target an equal quota and fetches them all
//! concurrently. Phase 2 redistributes whatever's left of the global
//! limit to targets that proved they have more to give (they returned a
//! full quota and still have a `next_cursor`). One task per target, no
//! shared mutable state between them — matches the "spawn N, await all,
//! reduce" shape the rest of this crate uses for concurrency.

use crate::error::{Error, Result};
use crate::model::{FetchResult, Issue, IssuesPage, SortKey, Target};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type FetchPageFuture = Pin<Box<dyn Future<Output = Result<IssuesPage>> + Send>>;

/// Fetches one page for `target`, resuming from `cursor` if present,
/// capped at `limit` issues. Injected so the coordinator has no direct
/// dependency on the HTTP transport.
pub type FetchPageFn = Arc<dyn Fn(Target, Option<String>, u32) -> FetchPageFuture + Send + Sync>;

/// `ceil(limit / n)`, never less than 1.
#[must_use]
pub fn quota(limit: u32, n: usize) -> u32 {
    if n == 0 {
        return limit.max(1);
    }
    (limit + n as u32 - 1) / n as u32
}

async fn fetch_one(fetch_page: FetchPageFn, target: Target, cursor: Option<String>, quota: u32) -> FetchResult {
    match fetch_page(target.clone(), cursor, quota).await {
        Ok(page) => FetchResult::Ok { target, issues: page.issues, next_cursor: page.next_cursor },
        Err(error) => FetchResult::Failure { target, error },
    }
}

/// Run the two-phase fetch. `start_cursors` is keyed by `target.key()`.
/// `skip_targets` names targets (by `target.key()`) that a resumed
/// invocation's stored compound cursor marked exhausted: they are left
/// out of the Phase-1 fan-out entirely rather than restarted from
/// scratch, and contribute a synthetic empty `Ok` result so they still
/// occupy their slot in the merged/compound output. `progress` is
/// invoked with the running fetched count after each phase.
///
/// Returns `Err(AuthError)` immediately if any target hits one — auth
/// failures always propagate, never downgrade to a per-target `Failure`.
/// Returns a composite `Api` error if every fetched target failed (a
/// skipped target is neither success nor failure for this purpose).
pub async fn fetch(
    targets: &[Target],
    limit: u32,
    start_cursors: &HashMap<String, String>,
    skip_targets: &HashSet<String>,
    fetch_page: FetchPageFn,
    mut progress: impl FnMut(usize),
) -> Result<Vec<FetchResult>> {
    let phase1_quota = quota(limit, targets.len());

    let mut set = tokio::task::JoinSet::new();
    let mut results: Vec<FetchResult> = Vec::with_capacity(targets.len());
    for target in targets {
        if skip_targets.contains(&target.key()) {
            results.push(FetchResult::Ok { target: target.clone(), issues: Vec::new(), next_cursor: None });
            continue;
        }
        let cursor = start_cursors.get(&target.key()).cloned();
        set.spawn(fetch_one(fetch_page.clone(), target.clone(), cursor, phase1_quota));
    }

    while let Some(joined) = set.join_next().await {
        let result = joined.map_err(|e| Error::Internal(format!("fetch task panicked: {e}")))?;
        if let FetchResult::Failure { error, .. } = &result {
            if matches!(error, Error::Auth { .. }) {
                return Err(Error::Auth { reason: auth_reason(error) });
            }
        }
        results.push(result);
    }
    // Restore target order: JoinSet completion order is non-deterministic.
    results.sort_by_key(|r| targets.iter().position(|t| t == r.target()).unwrap_or(usize::MAX));

    let fetched: usize = results
        .iter()
        .map(|r| match r {
            FetchResult::Ok { issues, .. } => issues.len(),
            FetchResult::Failure { .. } => 0,
        })
        .sum();
    progress(fetched);

    if results.iter().all(|r| matches!(r, FetchResult::Failure { .. })) {
        return Err(composite_error(&results));
    }

    if fetched < limit as usize {
        run_phase2(targets, limit, fetched, &mut results, fetch_page).await?;
    }

    let total: usize = results
        .iter()
        .map(|r| match r {
            FetchResult::Ok { issues, .. } => issues.len(),
            FetchResult::Failure { .. } => 0,
        })
        .sum();
    progress(total);

    Ok(results)
}

async fn run_phase2(
    targets: &[Target],
    limit: u32,
    fetched: usize,
    results: &mut [FetchResult],
    fetch_page: FetchPageFn,
) -> Result<()> {
    let expandable_idx: Vec<usize> = results
        .iter()
        .enumerate()
        .filter_map(|(i, r)| match r {
            FetchResult::Ok { issues, next_cursor: Some(_), .. } => {
                let phase1_quota = quota(limit, targets.len());
                (issues.len() as u32 == phase1_quota).then_some(i)
            }
            _ => None,
        })
        .collect();

    if expandable_idx.is_empty() {
        return Ok(());
    }

    let extra_quota = quota((limit as usize - fetched) as u32, expandable_idx.len());

    let mut set = tokio::task::JoinSet::new();
    for &i in &expandable_idx {
        let (target, cursor) = match &results[i] {
            FetchResult::Ok { target, next_cursor, .. } => (target.clone(), next_cursor.clone()),
            FetchResult::Failure { .. } => unreachable!("filtered to Ok above"),
        };
        set.spawn(fetch_page_indexed(i, fetch_page.clone(), target, cursor, extra_quota));
    }

    while let Some(joined) = set.join_next().await {
        let (i, outcome) = joined.map_err(|e| Error::Internal(format!("fetch task panicked: {e}")))?;
        match outcome {
            Ok(page) => {
                if let FetchResult::Ok { issues, next_cursor, .. } = &mut results[i] {
                    issues.extend(page.issues);
                    *next_cursor = page.next_cursor;
                }
            }
            Err(error) => {
                if matches!(error, Error::Auth { .. }) {
                    return Err(error);
                }
                // A phase-2 failure doesn't discard phase-1 results for
                // this target; it just stops expanding it further.
            }
        }
    }
    Ok(())
}

async fn fetch_page_indexed(
    i: usize,
    fetch_page: FetchPageFn,
    target: Target,
    cursor: Option<String>,
    limit: u32,
) -> (usize, Result<IssuesPage>) {
    (i, fetch_page(target, cursor, limit).await)
}

fn auth_reason(error: &Error) -> String {
    match error {
        Error::Auth { reason } => reason.clone(),
        _ => "authentication failed".to_string(),
    }
}

fn composite_error(results: &[FetchResult]) -> Error {
    let status = results.iter().find_map(|r| match r {
        FetchResult::Failure { error, .. } => error.status(),
        FetchResult::Ok { .. } => None,
    });
    let detail = results
        .iter()
        .find_map(|r| match r {
            FetchResult::Failure { error, .. } => Some(error.to_string()),
            FetchResult::Ok { .. } => None,
        })
        .unwrap_or_else(|| "unknown error".to_string());
    Error::CompositeApi { count: results.len(), status, detail }
}

/// Flatten, sort, and tag each issue with the target it came from. Sort
/// is always descending; ties break by discovery order (target index,
/// then per-target response order). Missing dates sort as the epoch,
/// missing counts as zero. The same issue `id` surfacing under more than
/// one target (the same project matching under different detection
/// sources) is emitted once, keeping its first occurrence in discovery
/// order.
#[must_use]
pub fn merge_sorted(targets: &[Target], results: &[FetchResult], sort: SortKey) -> Vec<(Target, Issue)> {
    let mut rows: Vec<(usize, usize, Target, Issue)> = Vec::new();
    let mut seen_ids = std::collections::HashSet::new();
    for result in results {
        if let FetchResult::Ok { target, issues, .. } = result {
            let target_idx = targets.iter().position(|t| t == target).unwrap_or(usize::MAX);
            for (response_idx, issue) in issues.iter().enumerate() {
                if !seen_ids.insert(issue.id.clone()) {
                    continue;
                }
                rows.push((target_idx, response_idx, target.clone(), issue.clone()));
            }
        }
    }

    rows.sort_by(|a, b| {
        let key_a = sort_key(&a.3, sort);
        let key_b = sort_key(&b.3, sort);
        key_b.cmp(&key_a).then_with(|| a.0.cmp(&b.0)).then_with(|| a.1.cmp(&b.1))
    });

    rows.into_iter().map(|(_, _, target, issue)| (target, issue)).collect()
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Date(i64),
    Count(u64),
}

fn sort_key(issue: &Issue, sort: SortKey) -> SortValue {
    match sort {
        SortKey::Date => SortValue::Date(issue.last_seen_or_epoch().timestamp()),
        SortKey::New => SortValue::Date(issue.first_seen_or_epoch().timestamp()),
        SortKey::Freq => SortValue::Count(issue.count_value()),
        SortKey::User => SortValue::Count(issue.user_count),
    }
}

/// Trim `sorted` to `limit`, guaranteeing every distinct project at least
/// one slot (as long as `limit >= number of non-empty projects`).
#[must_use]
pub fn trim_with_fairness(sorted: Vec<(Target, Issue)>, limit: usize) -> Vec<(Target, Issue)> {
    if sorted.len() <= limit {
        return sorted;
    }

    let mut represented = std::collections::HashSet::new();
    let mut guaranteed_idx = Vec::new();
    for (i, (target, _)) in sorted.iter().enumerate() {
        if guaranteed_idx.len() >= limit {
            break;
        }
        if represented.insert(target.key()) {
            guaranteed_idx.push(i);
        }
    }

    let mut selected: Vec<usize> = guaranteed_idx.clone();
    let guaranteed_set: std::collections::HashSet<usize> = guaranteed_idx.into_iter().collect();
    for i in 0..sorted.len() {
        if selected.len() >= limit {
            break;
        }
        if !guaranteed_set.contains(&i) {
            selected.push(i);
        }
    }
    selected.sort_unstable();

    selected.into_iter().map(|i| sorted[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn issue(id: &str, project: &str, last_seen_secs: i64) -> Issue {
        Issue {
            id: id.into(),
            short_id: format!("{project}-{id}"),
            title: "t".into(),
            level: "error".into(),
            count: "1".into(),
            user_count: 1,
            first_seen: Some(Utc.timestamp_opt(last_seen_secs, 0).unwrap()),
            last_seen: Some(Utc.timestamp_opt(last_seen_secs, 0).unwrap()),
            project_slug: project.into(),
            permalink: "https://example.test/issues/1".into(),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn quota_is_ceiling_division_min_one() {
        assert_eq!(quota(4, 2), 2);
        assert_eq!(quota(5, 2), 3);
        assert_eq!(quota(1, 3), 1);
    }

    #[test]
    fn trim_with_fairness_guarantees_each_project_a_slot() {
        let t1 = Target::new("acme", "a");
        let t2 = Target::new("acme", "b");
        let t3 = Target::new("acme", "c");
        let sorted = vec![
            (t1.clone(), issue("1", "a", 5)),
            (t1.clone(), issue("2", "a", 4)),
            (t2.clone(), issue("3", "b", 3)),
            (t3.clone(), issue("4", "c", 2)),
        ];
        let trimmed = trim_with_fairness(sorted, 3);
        let projects: std::collections::HashSet<String> = trimmed.iter().map(|(t, _)| t.key()).collect();
        assert_eq!(projects.len(), 3);
        assert_eq!(trimmed.len(), 3);
    }

    #[test]
    fn trim_keeps_original_sorted_order() {
        let t1 = Target::new("acme", "a");
        let sorted = vec![
            (t1.clone(), issue("1", "a", 10)),
            (t1.clone(), issue("2", "a", 9)),
            (t1.clone(), issue("3", "a", 8)),
        ];
        let trimmed = trim_with_fairness(sorted, 2);
        assert_eq!(trimmed[0].1.id, "1");
        assert_eq!(trimmed[1].1.id, "2");
    }

    #[test]
    fn merge_sorted_orders_descending_by_last_seen() {
        let t1 = Target::new("acme", "a");
        let results = vec![FetchResult::Ok {
            target: t1.clone(),
            issues: vec![issue("1", "a", 1), issue("2", "a", 9)],
            next_cursor: None,
        }];
        let merged = merge_sorted(&[t1], &results, SortKey::Date);
        assert_eq!(merged[0].1.id, "2");
        assert_eq!(merged[1].1.id, "1");
    }

    #[test]
    fn merge_sorted_dedups_same_issue_id_across_targets() {
        let t1 = Target::new("acme", "a");
        let t2 = Target::new("acme", "b");
        let results = vec![
            FetchResult::Ok { target: t1.clone(), issues: vec![issue("1", "a", 5)], next_cursor: None },
            FetchResult::Ok { target: t2.clone(), issues: vec![issue("1", "a", 5)], next_cursor: None },
        ];
        let merged = merge_sorted(&[t1, t2], &results, SortKey::Date);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn composite_error_preserves_first_status() {
        let t1 = Target::new("acme", "a");
        let t2 = Target::new("acme", "b");
        let results = vec![
            FetchResult::Failure {
                target: t1,
                error: Error::Api { status: 502, detail: "bad gateway".into(), endpoint: "/e".into() },
            },
            FetchResult::Failure {
                target: t2,
                error: Error::Api { status: 503, detail: "unavailable".into(), endpoint: "/e".into() },
            },
        ];
        let err = composite_error(&results);
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn fetch_skips_exhausted_targets_without_calling_fetch_page() {
        let t1 = Target::new("acme", "frontend");
        let t2 = Target::new("acme", "backend");
        let calls: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let calls_for_closure = Arc::clone(&calls);
        let fetch_page: FetchPageFn = Arc::new(move |target: Target, _cursor, _limit| {
            calls_for_closure.lock().unwrap().push(target.key());
            Box::pin(async move { Ok(IssuesPage { issues: vec![], next_cursor: None }) })
        });

        let mut skip = std::collections::HashSet::new();
        skip.insert(t2.key());

        let results =
            fetch(&[t1.clone(), t2.clone()], 10, &HashMap::new(), &skip, fetch_page, |_| {}).await.unwrap();

        assert_eq!(calls.lock().unwrap().as_slice(), [t1.key()]);
        let skipped = results.iter().find(|r| r.target() == &t2).unwrap();
        assert!(matches!(skipped, FetchResult::Ok { issues, next_cursor: None, .. } if issues.is_empty()));
    }
}
