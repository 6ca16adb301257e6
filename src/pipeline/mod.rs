//! Orchestrates one `issues list` invocation end to end: parse the
//! positional target, resolve it to one or more `(org, project)` pairs,
//! dispatch the budgeted concurrent fetch, merge and trim the results,
//! assign aliases, persist the compound cursor, and hand back rows ready
//! for rendering.
//!
//! Target resolution steps that need the working tree or a live lookup
//! (embedded-identifier detection, directory-name inference, numeric-id
//! and URL lookups, project search) are expressed as injected async
//! closures on [`Resolver`], the same dependency-injection shape used by
//! [`crate::fetch`] and [`crate::region`] — this module has no direct
//! dependency on the HTTP transport.

use crate::alias;
use crate::cursor;
use crate::error::{Error, Result};
use crate::fetch::{self, FetchPageFn};
use crate::model::{CompoundCursor, FetchResult, Issue, SortKey, Target};
use crate::store::Store;
use crate::target::{self, detect, directory, AutoDetectInputs, AutoDetectOutcome, ParsedTarget};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

const MIN_LIMIT: u32 = 1;
const MAX_LIMIT: u32 = 1000;
const COMMAND_KEY: &str = "issues:list";

type LookupFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Target-resolution lookups the pipeline can't perform on its own
/// because they need a live HTTP call. Each field mirrors one step of
/// the auto-detect chain or one positional-argument shape.
pub struct Resolver {
    /// Resolve a detected embedded identifier (DSN or bare public key) to
    /// a target. `None` means the identifier is stale or unresolvable
    /// (e.g. a self-hosted install no longer reachable) — not an error,
    /// just a skip.
    pub lookup_identifier: Arc<dyn Fn(detect::Identifier) -> LookupFuture<Option<Target>> + Send + Sync>,
    /// Search accessible projects whose slug matches `needle` at a word
    /// boundary, for directory-name inference.
    pub search_by_directory_name: Arc<dyn Fn(String) -> LookupFuture<Vec<Target>> + Send + Sync>,
    /// Search accessible projects by exact slug, for a bare
    /// project-search positional argument; may span more than one org.
    pub search_by_project_slug: Arc<dyn Fn(String) -> LookupFuture<Vec<Target>> + Send + Sync>,
    /// Resolve an opaque numeric id (issue or project id) to its owning
    /// target.
    pub lookup_numeric_id: Arc<dyn Fn(String) -> LookupFuture<Target> + Send + Sync>,
    /// Parse a service web UI URL down to its target.
    pub parse_service_url: Arc<dyn Fn(String) -> LookupFuture<Target> + Send + Sync>,
}

/// Everything one `issues list` run needs, independent of how the CLI
/// layer gathered it.
pub struct ListRequest {
    pub parsed: ParsedTarget,
    pub context_inputs: AutoDetectInputs,
    pub project_root: PathBuf,
    pub query: Option<String>,
    pub limit: u32,
    pub sort: SortKey,
    pub period: String,
    pub cursor_flag: Option<String>,
    pub base_url: String,
}

/// Resolved rows plus enough bookkeeping to render either the table or
/// `--json` forms and to explain to the user whether there's more.
pub struct ListOutcome {
    pub targets: Vec<Target>,
    pub rows: Vec<(Option<String>, Target, Issue)>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub failures: Vec<FetchResult>,
    pub continuation_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorMode {
    Fresh,
    Last,
}

fn parse_cursor_flag(raw: Option<&str>) -> Result<CursorMode> {
    match raw {
        None => Ok(CursorMode::Fresh),
        Some("last") => Ok(CursorMode::Last),
        Some(s) if target::is_all_digits(s) => Err(Error::Validation(format!(
            "--cursor does not accept a raw numeric value ({s:?}); pass `last` to continue the previous page"
        ))),
        Some(other) => Err(Error::Validation(format!(
            "--cursor accepts only `last` ({other:?} is not a recognized cursor token)"
        ))),
    }
}

fn validate_limit(limit: u32) -> Result<()> {
    if limit < MIN_LIMIT || limit > MAX_LIMIT {
        return Err(Error::Validation(format!(
            "--limit must be between {MIN_LIMIT} and {MAX_LIMIT}, got {limit}"
        )));
    }
    Ok(())
}

fn sort_key_str(sort: SortKey) -> &'static str {
    match sort {
        SortKey::Date => "date",
        SortKey::New => "new",
        SortKey::Freq => "freq",
        SortKey::User => "user",
    }
}

/// Run the full `issues list` pipeline.
pub async fn run(
    store: &mut Store,
    request: ListRequest,
    resolver: &Resolver,
    fetch_page: FetchPageFn,
    progress: impl FnMut(usize),
) -> Result<ListOutcome> {
    validate_limit(request.limit)?;
    let cursor_mode = parse_cursor_flag(request.cursor_flag.as_deref())?;

    let (targets, is_org_all) =
        resolve_targets(request.parsed, &request.context_inputs, &request.project_root, resolver).await?;
    if targets.is_empty() {
        return Err(Error::Context("could not resolve a target to list issues from".into()));
    }

    let context_key = if is_org_all {
        cursor::context_key_org(
            &request.base_url,
            &targets[0].org,
            sort_key_str(request.sort),
            &request.period,
            request.query.as_deref(),
        )
    } else {
        cursor::context_key_multi(
            &request.base_url,
            &targets,
            sort_key_str(request.sort),
            &request.period,
            request.query.as_deref(),
        )
    };

    let sorted_targets = cursor::sort_targets(&targets);
    let mut start_cursors: HashMap<String, String> = HashMap::new();
    let mut skip_targets: HashSet<String> = HashSet::new();
    if cursor_mode == CursorMode::Last {
        if let Some(stored) = cursor::load(store, COMMAND_KEY, &context_key)? {
            for (target, segment) in sorted_targets.iter().zip(stored.0.iter()) {
                match segment {
                    Some(c) => {
                        start_cursors.insert(target.key(), c.clone());
                    }
                    None => {
                        skip_targets.insert(target.key());
                    }
                }
            }
        }
    }

    let results = fetch::fetch(&targets, request.limit, &start_cursors, &skip_targets, fetch_page, progress).await?;

    let compound = build_compound_cursor(&sorted_targets, &results, &start_cursors);
    cursor::persist(store, COMMAND_KEY, &context_key, &compound)?;

    let merged = fetch::merge_sorted(&targets, &results, request.sort);
    let merged_len = merged.len();
    let trimmed = fetch::trim_with_fairness(merged, request.limit as usize);
    let was_trimmed = trimmed.len() < merged_len;

    let aliases = alias::assign(&targets);
    let rows: Vec<(Option<String>, Target, Issue)> = trimmed
        .into_iter()
        .map(|(target, issue)| {
            let alias = aliases.get(&target.key()).cloned();
            (alias, target, issue)
        })
        .collect();

    let failures: Vec<FetchResult> =
        results.into_iter().filter(|r| matches!(r, FetchResult::Failure { .. })).collect();

    let has_more = was_trimmed || compound.has_next_page();
    let next_cursor = has_more.then(|| cursor::encode_compound(&compound));

    Ok(ListOutcome {
        targets,
        rows,
        has_more,
        next_cursor,
        continuation_hint: continuation_hint(request.limit, has_more),
        failures,
    })
}

/// Aligns Phase-1/2 results to `sorted_targets` for persistence. A failed
/// target retains its start cursor (if this invocation resumed it from
/// one) rather than storing `null`, so the next `-c last` retries from
/// the same position; a target that failed on a first-page fetch (no
/// start cursor) stores `null`, which is indistinguishable from
/// "exhausted" and so is skipped — not re-attempted — on the next
/// resume, exactly as an exhausted target would be.
fn build_compound_cursor(
    sorted_targets: &[Target],
    results: &[FetchResult],
    start_cursors: &HashMap<String, String>,
) -> CompoundCursor {
    let next_cursor_by_key: HashMap<String, Option<String>> = results
        .iter()
        .map(|r| match r {
            FetchResult::Ok { target, next_cursor, .. } => (target.key(), next_cursor.clone()),
            FetchResult::Failure { target, .. } => (target.key(), start_cursors.get(&target.key()).cloned()),
        })
        .collect();
    CompoundCursor(
        sorted_targets
            .iter()
            .map(|t| next_cursor_by_key.get(&t.key()).cloned().flatten())
            .collect(),
    )
}

fn continuation_hint(limit: u32, has_more: bool) -> Option<String> {
    if !has_more {
        return None;
    }
    let doubled = limit.saturating_mul(2).min(MAX_LIMIT);
    if doubled > limit {
        Some(format!("More issues available — rerun with `-c last` to continue, or `-n {doubled}` to raise the limit."))
    } else {
        Some("More issues available — rerun with `-c last` to continue.".to_string())
    }
}

/// Resolve `parsed` to one or more targets, plus whether this is the
/// org-all pseudo-target (a single target with an empty project slug,
/// routed to the org-wide issues endpoint instead of a project-scoped
/// one).
async fn resolve_targets(
    parsed: ParsedTarget,
    inputs: &AutoDetectInputs,
    project_root: &Path,
    resolver: &Resolver,
) -> Result<(Vec<Target>, bool)> {
    match parsed {
        ParsedTarget::Explicit { org, project } => Ok((vec![Target::new(org, project)], false)),
        ParsedTarget::OrgAll { org } => Ok((vec![Target::new(org, String::new())], true)),
        ParsedTarget::NumericId(id) => Ok((vec![(resolver.lookup_numeric_id)(id).await?], false)),
        ParsedTarget::Url(url) => Ok((vec![(resolver.parse_service_url)(url).await?], false)),
        ParsedTarget::ProjectSearch { project, .. } => {
            let matches = (resolver.search_by_project_slug)(project.clone()).await?;
            if matches.is_empty() {
                return Err(Error::Resolution { kind: "project".into(), id: project });
            }
            Ok((matches, false))
        }
        ParsedTarget::AutoDetect => resolve_auto_detect(inputs, project_root, resolver).await,
    }
}

/// Steps 4-5 of the auto-detect chain: embedded-identifier detection,
/// then directory-name inference. Steps 1-3 (CLI flags, environment,
/// cached default) are pure data, handled by
/// [`target::resolve_from_context`] before this is ever reached.
async fn resolve_auto_detect(
    inputs: &AutoDetectInputs,
    project_root: &Path,
    resolver: &Resolver,
) -> Result<(Vec<Target>, bool)> {
    if let AutoDetectOutcome::Found(target) = target::resolve_from_context(inputs)? {
        return Ok((vec![target], false));
    }

    let identifiers = detect::scan_working_tree(project_root);
    if !identifiers.is_empty() {
        let mut targets = Vec::new();
        let mut seen = HashSet::new();
        for identifier in identifiers {
            if let Some(t) = (resolver.lookup_identifier)(identifier).await? {
                if seen.insert(t.key()) {
                    targets.push(t);
                }
            }
        }
        if !targets.is_empty() {
            return Ok((targets, false));
        }
    }

    let basename = project_root.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if !directory::eligible_basename(basename) {
        return Err(Error::Context(format!(
            "no target could be determined: no embedded identifier was found, and the directory name {basename:?} is too short or hidden to infer a project from"
        )));
    }

    let candidates = (resolver.search_by_directory_name)(basename.to_string()).await?;
    let matched: Vec<Target> =
        candidates.into_iter().filter(|t| directory::matches_boundary(&t.project, basename)).collect();
    if matched.is_empty() {
        return Err(Error::Context(format!(
            "no accessible project matches the current directory name ({basename:?})"
        )));
    }
    Ok((matched, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IssuesPage;

    fn target(org: &str, project: &str) -> Target {
        Target::new(org, project)
    }

    #[test]
    fn validate_limit_rejects_out_of_range() {
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(1001).is_err());
        assert!(validate_limit(25).is_ok());
    }

    #[test]
    fn cursor_flag_rejects_digits_and_unknown_tokens() {
        assert!(parse_cursor_flag(Some("12345")).is_err());
        assert!(parse_cursor_flag(Some("banana")).is_err());
        assert!(parse_cursor_flag(None).is_ok());
        assert_eq!(parse_cursor_flag(Some("last")).unwrap(), CursorMode::Last);
    }

    #[test]
    fn continuation_hint_doubles_limit_capped_at_max() {
        let hint = continuation_hint(800, true).unwrap();
        assert!(hint.contains("-n 1000"));
        assert!(continuation_hint(25, false).is_none());
    }

    #[test]
    fn build_compound_cursor_aligns_to_sorted_order() {
        let t1 = target("acme", "frontend");
        let t2 = target("acme", "backend");
        let sorted = cursor::sort_targets(&[t1.clone(), t2.clone()]);
        let results = vec![
            FetchResult::Ok { target: t1.clone(), issues: vec![], next_cursor: Some("cF".into()) },
            FetchResult::Ok { target: t2.clone(), issues: vec![], next_cursor: None },
        ];
        let compound = build_compound_cursor(&sorted, &results, &HashMap::new());
        // sorted order is backend, frontend (lexicographic).
        assert_eq!(compound.0, vec![None, Some("cF".into())]);
    }

    #[test]
    fn build_compound_cursor_failed_target_retains_start_cursor() {
        let t1 = target("acme", "frontend");
        let sorted = cursor::sort_targets(std::slice::from_ref(&t1));
        let results = vec![FetchResult::Failure {
            target: t1.clone(),
            error: Error::Api { status: 503, detail: "unavailable".into(), endpoint: "/e".into() },
        }];
        let mut start_cursors = HashMap::new();
        start_cursors.insert(t1.key(), "cF".to_string());
        let compound = build_compound_cursor(&sorted, &results, &start_cursors);
        assert_eq!(compound.0, vec![Some("cF".into())]);
    }

    #[test]
    fn build_compound_cursor_failed_target_with_no_start_cursor_stores_null() {
        let t1 = target("acme", "frontend");
        let sorted = cursor::sort_targets(std::slice::from_ref(&t1));
        let results = vec![FetchResult::Failure {
            target: t1.clone(),
            error: Error::Api { status: 503, detail: "unavailable".into(), endpoint: "/e".into() },
        }];
        let compound = build_compound_cursor(&sorted, &results, &HashMap::new());
        assert_eq!(compound.0, vec![None]);
    }

    #[tokio::test]
    async fn resolve_targets_explicit_is_single_target_not_org_all() {
        let resolver = no_op_resolver();
        let (targets, is_org_all) = resolve_targets(
            ParsedTarget::Explicit { org: "acme".into(), project: "frontend".into() },
            &AutoDetectInputs::default(),
            Path::new("/tmp"),
            &resolver,
        )
        .await
        .unwrap();
        assert_eq!(targets, vec![target("acme", "frontend")]);
        assert!(!is_org_all);
    }

    #[tokio::test]
    async fn resolve_targets_org_all_marks_flag() {
        let resolver = no_op_resolver();
        let (targets, is_org_all) =
            resolve_targets(ParsedTarget::OrgAll { org: "acme".into() }, &AutoDetectInputs::default(), Path::new("/tmp"), &resolver)
                .await
                .unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].org, "acme");
        assert!(is_org_all);
    }

    #[tokio::test]
    async fn resolve_targets_project_search_errors_on_no_match() {
        let resolver = no_op_resolver();
        let err = resolve_targets(
            ParsedTarget::ProjectSearch { project: "nope".into(), leading_slash: false },
            &AutoDetectInputs::default(),
            Path::new("/tmp"),
            &resolver,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
    }

    #[tokio::test]
    async fn full_run_single_target_persists_cursor_and_flags_more() {
        let mut store = Store::open_memory().unwrap();
        let resolver = no_op_resolver();
        let fetch_page: FetchPageFn = Arc::new(|_target, _cursor, _limit| {
            Box::pin(async move {
                Ok(IssuesPage {
                    issues: vec![crate::model::Issue {
                        id: "1".into(),
                        short_id: "FRONTEND-1".into(),
                        title: "boom".into(),
                        level: "error".into(),
                        count: "1".into(),
                        user_count: 1,
                        first_seen: None,
                        last_seen: None,
                        project_slug: "frontend".into(),
                        permalink: "https://example.test/issues/1".into(),
                        raw: serde_json::Value::Null,
                    }],
                    next_cursor: Some("cF2".into()),
                })
            })
        });

        let request = ListRequest {
            parsed: ParsedTarget::Explicit { org: "acme".into(), project: "frontend".into() },
            context_inputs: AutoDetectInputs::default(),
            project_root: PathBuf::from("/tmp"),
            query: None,
            limit: 25,
            sort: SortKey::Date,
            period: "90d".into(),
            cursor_flag: None,
            base_url: "https://example.test/api/0".into(),
        };

        let outcome = run(&mut store, request, &resolver, fetch_page, |_| {}).await.unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert!(outcome.has_more);
        assert!(outcome.next_cursor.is_some());
        assert!(outcome.continuation_hint.is_some());
    }

    fn no_op_resolver() -> Resolver {
        Resolver {
            lookup_identifier: Arc::new(|_| Box::pin(async { Ok(None) })),
            search_by_directory_name: Arc::new(|_| Box::pin(async { Ok(Vec::new()) })),
            search_by_project_slug: Arc::new(|_| Box::pin(async { Ok(Vec::new()) })),
            lookup_numeric_id: Arc::new(|_| Box::pin(async { Err(Error::Internal("not used".into())) })),
            parse_service_url: Arc::new(|_| Box::pin(async { Err(Error::Internal("not used".into())) })),
        }
    }
}
