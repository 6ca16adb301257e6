//! `beacon issues list` — wires the HTTP transport (C3) and region
//! directory (C2) into the target resolver (C4), fetch coordinator (C5),
//! and list pipeline (C8), then renders the result.
//!
//! Everything in [`crate::pipeline`], [`crate::fetch`], [`crate::cursor`],
//! and [`crate::alias`] is transport-agnostic; this module is the one
//! place that knows the service's actual JSON shapes and endpoint paths.

use crate::alias;
use crate::cli::{Cli, ListArgs};
use crate::config;
use crate::error::{Error, Result};
use crate::http::{ApiResponse, Credentials, Param, RefreshFn, Transport};
use crate::model::{Issue, IssuesPage, ProjectAliasEntry, Region, Target};
use crate::output::{self, Row};
use crate::pipeline::{self, ListRequest, Resolver};
use crate::region;
use crate::store::Store;
use crate::target::{self, detect::Identifier, ParsedTarget};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const DSN_CACHE_TTL_SECS: i64 = 24 * 60 * 60;

pub async fn execute(cli: &Cli, args: &ListArgs) -> Result<()> {
    let parsed = target::parse_target_arg(args.target.as_deref().unwrap_or(""))?;
    if matches!(parsed, ParsedTarget::NumericId(_)) {
        return Err(Error::Validation(
            "a bare numeric id names an issue, not a listable target".into(),
        ));
    }

    let store_path = config::resolve_store_path(cli.config_dir.as_deref());
    let base_url = config::resolve_base_url(cli.url.as_deref());
    let cwd = std::env::current_dir()?;
    let project_root = target::directory::discover_project_root(&cwd);

    let credentials = load_credentials(&store_path)?;
    let transport = Arc::new(Transport::new());
    let refresh = build_refresh_fn(Arc::clone(&transport), base_url.clone(), store_path.clone());

    let service = Arc::new(Service {
        transport,
        refresh,
        control_url: base_url.clone(),
        store_path: store_path.clone(),
        credentials: Mutex::new(credentials),
    });

    let detected_identifiers: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let context_inputs = {
        let store = Store::open(&store_path)?;
        target::AutoDetectInputs {
            cli_org: None,
            cli_project: None,
            env_org: config::env_org(),
            env_project: config::env_project(),
            default_org: store.get_default("org")?,
            default_project: store.get_default("project")?,
        }
    };

    let resolver = build_resolver(Arc::clone(&service), Arc::clone(&detected_identifiers));
    let fetch_page = build_fetch_page(Arc::clone(&service), args.query.clone(), args.period.clone());

    let request = ListRequest {
        parsed,
        context_inputs,
        project_root,
        query: args.query.clone(),
        limit: args.limit,
        sort: args.sort,
        period: args.period.clone(),
        cursor_flag: args.cursor.clone(),
        base_url,
    };

    let mut store = Store::open(&store_path)?;
    let outcome = pipeline::run(&mut store, request, &resolver, fetch_page, |_fetched| {}).await?;

    if outcome.targets.len() >= 2 {
        let identifiers = detected_identifiers.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        let fingerprint = (!identifiers.is_empty()).then(|| alias::fingerprint(&identifiers));
        persist_aliases(&mut store, &outcome.targets, fingerprint.as_deref())?;
    } else {
        store.clear_project_aliases()?;
    }

    for failure in &outcome.failures {
        if let crate::model::FetchResult::Failure { target, error } = failure {
            eprintln!("warning: failed to fetch issues from {target}: {error}");
        }
    }

    if cli.json {
        let issues: Vec<Issue> = outcome.rows.iter().map(|(_, _, issue)| issue.clone()).collect();
        let failures: Vec<&crate::model::FetchResult> = outcome.failures.iter().collect();
        let json = output::render_json(&issues, outcome.has_more, outcome.next_cursor.as_deref(), &failures);
        println!("{json}");
    } else {
        let rows: Vec<Row<'_>> = outcome
            .rows
            .iter()
            .map(|(alias, target, issue)| Row { alias: alias.as_deref(), target, issue })
            .collect();
        print!("{}", output::render_table(&rows));
        if let Some(hint) = outcome.continuation_hint {
            eprintln!("{hint}");
        }
    }

    Ok(())
}

fn persist_aliases(store: &mut Store, targets: &[Target], fingerprint: Option<&str>) -> Result<()> {
    let aliases = alias::assign(targets);
    let entries: Vec<ProjectAliasEntry> = targets
        .iter()
        .filter_map(|t| {
            aliases
                .get(&t.key())
                .map(|alias| ProjectAliasEntry { alias: alias.clone(), org_slug: t.org.clone(), project_slug: t.project.clone() })
        })
        .collect();
    store.set_project_aliases(&entries, fingerprint)
}

fn load_credentials(store_path: &Path) -> Result<Credentials> {
    if let Some(token) = config::env_auth_token() {
        return Ok(Credentials { access_token: token, refresh_token: None });
    }
    let store = Store::open(store_path)?;
    let access_token = store
        .get_auth("access_token")?
        .ok_or_else(|| Error::Auth { reason: "not logged in; run `beacon login --token <token>`".into() })?;
    let refresh_token = store.get_auth("refresh_token")?;
    Ok(Credentials { access_token, refresh_token })
}

fn build_refresh_fn(transport: Arc<Transport>, base_url: String, store_path: PathBuf) -> RefreshFn {
    Box::new(move |credentials: &Credentials| {
        let transport = Arc::clone(&transport);
        let base_url = base_url.clone();
        let store_path = store_path.clone();
        let refresh_token = credentials.refresh_token.clone();
        Box::pin(async move {
            let Some(refresh_token) = refresh_token else {
                return Err(Error::Auth { reason: "no refresh token available".into() });
            };
            let mut dummy = Credentials { access_token: String::new(), refresh_token: None };
            let noop_refresh: RefreshFn =
                Box::new(|_: &Credentials| Box::pin(async { Err(Error::Auth { reason: "refresh loop".into() }) }));
            let params = [
                Param::scalar("grant_type", "refresh_token"),
                Param::scalar("refresh_token", refresh_token),
            ];
            let resp = transport
                .request(Method::POST, &base_url, "/oauth/token/", &params, &mut dummy, &noop_refresh)
                .await?;
            let access_token = resp.body["access_token"]
                .as_str()
                .ok_or_else(|| Error::Auth { reason: "token refresh response missing access_token".into() })?
                .to_string();
            let new_refresh = resp.body["refresh_token"].as_str().map(str::to_string);

            let mut store = Store::open(&store_path)?;
            let mut pairs = vec![("access_token", access_token.as_str())];
            if let Some(rt) = &new_refresh {
                pairs.push(("refresh_token", rt.as_str()));
            }
            store.set_auth(&pairs)?;

            Ok(Credentials { access_token, refresh_token: new_refresh })
        })
    })
}

/// Bundles everything the resolver/fetch closures need so they can be
/// captured behind one `Arc` instead of five.
struct Service {
    transport: Arc<Transport>,
    refresh: RefreshFn,
    control_url: String,
    store_path: PathBuf,
    credentials: Mutex<Credentials>,
}

impl Service {
    async fn request(&self, method: Method, path: &str, params: &[Param]) -> Result<ApiResponse> {
        let base = self.base_for_path(path).await?;
        let mut credentials = self.credentials.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        let result = self.transport.request(method, &base, path, params, &mut credentials, &self.refresh).await;
        *self.credentials.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = credentials;
        result
    }

    /// Routes org-scoped paths through the region resolved for that org,
    /// discovering the directory via `/users/me/regions/` on a cache miss,
    /// then fanning out to each named region's own org list to learn which
    /// orgs actually live there — `/users/me/regions/` names regions, not
    /// the orgs within them, so the directory can only be keyed by org
    /// slug once that second fan-out has run. A 404 from the regions
    /// endpoint means a self-hosted, single-region install: every org
    /// routes straight to the control silo.
    async fn base_for_path(&self, path: &str) -> Result<String> {
        let Some(org) = region::org_scoped_slug(path) else {
            return Ok(self.control_url.clone());
        };

        {
            let store = Store::open(&self.store_path)?;
            if let Some(url) = store.get_org_region(org)? {
                return Ok(url);
            }
        }

        let mut discover_creds = self.credentials.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        let result = self
            .transport
            .request(Method::GET, &self.control_url, "/users/me/regions/", &[], &mut discover_creds, &self.refresh)
            .await;
        *self.credentials.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = discover_creds;

        let regions = match result {
            Ok(resp) => parse_regions(&resp.body),
            Err(Error::Api { status: 404, .. }) => return Ok(self.control_url.clone()),
            Err(e) => return Err(e),
        };

        let pairs = self.fan_out_org_regions(&regions).await?;
        let mut store = Store::open(&self.store_path)?;
        region::set_org_regions(&mut store, &pairs)?;
        Ok(store.get_org_region(org)?.unwrap_or_else(|| self.control_url.clone()))
    }

    /// For each named region, lists the orgs hosted there and pairs each
    /// org slug with that region's URL. A region whose org list 404s is
    /// skipped rather than failing the whole fan-out — the directory just
    /// ends up incomplete for that region until a later invocation.
    async fn fan_out_org_regions(&self, regions: &[Region]) -> Result<Vec<(String, String)>> {
        let mut pairs = Vec::new();
        for region in regions {
            let mut creds = self.credentials.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
            let result =
                self.transport.request(Method::GET, &region.url, "/organizations/", &[], &mut creds, &self.refresh).await;
            *self.credentials.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = creds;

            match result {
                Ok(resp) => {
                    for slug in parse_org_slugs(&resp.body) {
                        pairs.push((slug, region.url.clone()));
                    }
                }
                Err(Error::Api { status: 404, .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(pairs)
    }
}

fn parse_regions(body: &Value) -> Vec<Region> {
    body.get("regions")
        .or(Some(body))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|r| {
                    let name = r.get("name").and_then(Value::as_str)?;
                    let url = r.get("url").and_then(Value::as_str)?;
                    Some(Region { name: name.to_string(), url: url.to_string() })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Reads the org slugs out of a `/organizations/` list response.
fn parse_org_slugs(body: &Value) -> Vec<String> {
    body.as_array()
        .map(|arr| arr.iter().filter_map(|o| o.get("slug").and_then(Value::as_str)).map(str::to_string).collect())
        .unwrap_or_default()
}

fn parse_issue(v: &Value) -> Issue {
    Issue {
        id: v.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
        short_id: v.get("shortId").and_then(Value::as_str).unwrap_or_default().to_string(),
        title: v.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
        level: v.get("level").and_then(Value::as_str).unwrap_or("error").to_string(),
        count: v.get("count").and_then(Value::as_str).unwrap_or("0").to_string(),
        user_count: v.get("userCount").and_then(Value::as_u64).unwrap_or(0),
        first_seen: parse_timestamp(v.get("firstSeen")),
        last_seen: parse_timestamp(v.get("lastSeen")),
        project_slug: v
            .get("project")
            .and_then(|p| p.get("slug"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        permalink: v.get("permalink").and_then(Value::as_str).unwrap_or_default().to_string(),
        raw: v.clone(),
    }
}

fn parse_timestamp(v: Option<&Value>) -> Option<DateTime<Utc>> {
    v.and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn issues_path(target: &Target) -> String {
    if target.project.is_empty() {
        format!("/organizations/{}/issues/", target.org)
    } else {
        format!("/projects/{}/{}/issues/", target.org, target.project)
    }
}

fn build_fetch_page(service: Arc<Service>, query: Option<String>, period: String) -> crate::fetch::FetchPageFn {
    Arc::new(move |target: Target, start_cursor: Option<String>, quota: u32| {
        let service = Arc::clone(&service);
        let query = query.clone();
        let period = period.clone();
        Box::pin(async move { fetch_issues_page(&service, &target, start_cursor, quota, query.as_deref(), &period).await })
    })
}

async fn fetch_issues_page(
    service: &Service,
    target: &Target,
    start_cursor: Option<String>,
    quota: u32,
    query: Option<&str>,
    period: &str,
) -> Result<IssuesPage> {
    let path = issues_path(target);
    let mut issues = Vec::new();
    let mut cursor = start_cursor;
    let mut next_cursor = None;

    loop {
        let mut params = vec![Param::scalar("statsPeriod", period)];
        if let Some(q) = query {
            params.push(Param::scalar("query", q));
        }
        if let Some(c) = &cursor {
            params.push(Param::scalar("cursor", c.clone()));
        }

        let resp = service.request(Method::GET, &path, &params).await?;
        let page: Vec<Issue> = resp.body.as_array().map(|arr| arr.iter().map(parse_issue).collect()).unwrap_or_default();
        let got = page.len();
        issues.extend(page);
        next_cursor = resp.next_cursor;

        if issues.len() as u32 >= quota || next_cursor.is_none() || got == 0 {
            break;
        }
        cursor = next_cursor.clone();
    }

    issues.truncate(quota as usize);
    Ok(IssuesPage { issues, next_cursor })
}

fn build_resolver(service: Arc<Service>, detected_identifiers: Arc<Mutex<Vec<String>>>) -> Resolver {
    Resolver {
        lookup_identifier: {
            let service = Arc::clone(&service);
            Arc::new(move |identifier: Identifier| {
                let service = Arc::clone(&service);
                let detected_identifiers = Arc::clone(&detected_identifiers);
                Box::pin(async move {
                    detected_identifiers
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .push(identifier.public_key().to_string());
                    lookup_identifier(&service, identifier).await
                })
            })
        },
        search_by_directory_name: {
            let service = Arc::clone(&service);
            Arc::new(move |needle: String| {
                let service = Arc::clone(&service);
                Box::pin(async move { search_projects(&service, Some(needle)).await })
            })
        },
        search_by_project_slug: {
            let service = Arc::clone(&service);
            Arc::new(move |slug: String| {
                let service = Arc::clone(&service);
                Box::pin(async move {
                    let all = search_projects(&service, Some(slug.clone())).await?;
                    Ok(all.into_iter().filter(|t| t.project == slug).collect())
                })
            })
        },
        lookup_numeric_id: Arc::new(|id: String| {
            Box::pin(async move { Err(Error::Validation(format!("{id:?} names an issue id, not a listable target"))) })
        }),
        parse_service_url: {
            let service = Arc::clone(&service);
            Arc::new(move |url: String| {
                let service = Arc::clone(&service);
                Box::pin(async move { parse_service_url(&service, &url).await })
            })
        },
    }
}

async fn lookup_identifier(service: &Service, identifier: Identifier) -> Result<Option<Target>> {
    let now = config::unix_time();
    {
        let store = Store::open(&service.store_path)?;
        if let Some((org, project)) = store.get_cached_dsn(identifier.public_key(), DSN_CACHE_TTL_SECS, now)? {
            return Ok(Some(Target::new(org, project).with_source("cached identifier")));
        }
    }

    let params = [Param::scalar("query", identifier.public_key())];
    let resp = service.request(Method::GET, "/projects/", &params).await;
    let projects = match resp {
        Ok(r) => r.body.as_array().cloned().unwrap_or_default(),
        Err(Error::Api { status: 404, .. }) => return Ok(None),
        Err(e) => return Err(e),
    };

    let Some(project) = projects.first() else { return Ok(None) };
    let org = project.get("organization").and_then(|o| o.get("slug")).and_then(Value::as_str);
    let proj_slug = project.get("slug").and_then(Value::as_str);
    let (Some(org), Some(proj_slug)) = (org, proj_slug) else { return Ok(None) };

    let mut store = Store::open(&service.store_path)?;
    store.set_cached_dsn(identifier.public_key(), org, proj_slug, now)?;
    Ok(Some(Target::new(org, proj_slug).with_source("detected identifier")))
}

async fn search_projects(service: &Service, query: Option<String>) -> Result<Vec<Target>> {
    let params: Vec<Param> = query.map(|q| vec![Param::scalar("query", q)]).unwrap_or_default();
    let resp = service.request(Method::GET, "/projects/", &params).await?;
    Ok(resp
        .body
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|p| {
                    let org = p.get("organization").and_then(|o| o.get("slug")).and_then(Value::as_str)?;
                    let slug = p.get("slug").and_then(Value::as_str)?;
                    Some(Target::new(org, slug))
                })
                .collect()
        })
        .unwrap_or_default())
}

/// Parses a service web-UI URL down to its target, without pulling in a
/// full URL-parsing dependency: strip the scheme and host, then match the
/// remaining path segments. Accepts
/// `/organizations/{org}/projects/{project}/...` and
/// `/organizations/{org}/issues/` (org-all); anything else doesn't name a
/// listable target.
async fn parse_service_url(_service: &Service, url: &str) -> Result<Target> {
    let after_scheme = url.split("://").nth(1).ok_or_else(|| Error::Validation(format!("{url:?} is not a valid URL")))?;
    let path = after_scheme.splitn(2, '/').nth(1).unwrap_or("");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        ["organizations", org, "projects", project, ..] => Ok(Target::new(*org, *project)),
        ["organizations", org, "issues", ..] => Ok(Target::new(*org, String::new())),
        _ => Err(Error::Context(format!("{url:?} does not name an organization or project listable as a target"))),
    }
}
