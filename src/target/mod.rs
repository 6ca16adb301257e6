//! Positional-argument parsing and target resolution (C4).
//!
//! [`parse_target_arg`] classifies the `<target>` positional argument into
//! one of the shapes from the grammar table (spec §4.4): empty,
//! `org/project`, `org/`, `/project`, a bare project name, an all-digit
//! numeric id, or a service URL. [`resolve_from_context`] then runs the
//! first three (pure, I/O-free) steps of the auto-detect chain — CLI
//! flags, environment, stored default — leaving the two steps that need
//! the working tree or a live lookup ([`detect`], [`directory`], and the
//! rest of auto-detect) to [`crate::pipeline`], which has access to the
//! injected [`crate::pipeline::Resolver`].
//!
//! This module is deliberately store-agnostic and HTTP-agnostic: it takes
//! plain strings in and hands back tagged data, so it stays unit-testable
//! without a database or network.

pub mod detect;
pub mod directory;

use crate::error::{Error, Result};
use crate::model::Target;

/// One classified shape of the `<target>` positional argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTarget {
    /// No positional argument: run the full auto-detect chain.
    AutoDetect,
    /// `org/project` — a single explicit target.
    Explicit { org: String, project: String },
    /// `org/` — every project in the org.
    OrgAll { org: String },
    /// `/project` or a bare `project` (no slash, not all-digits) — search
    /// accessible projects by slug. `leading_slash` only affects how the
    /// argument round-trips through [`format_target_arg`].
    ProjectSearch { project: String, leading_slash: bool },
    /// All-digits: names an issue id, not a listable target. The `list`
    /// caller rejects this; other callers (a future `issues show`) may
    /// accept it.
    NumericId(String),
    /// A service web-UI URL to be parsed down to its target.
    Url(String),
}

/// `true` for a non-empty string of ASCII digits only. Empty is
/// deliberately `false` — an absent argument means auto-detect, not a
/// numeric id.
#[must_use]
pub fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse the `<target>` positional argument per the grammar table in
/// spec §4.4, matching the first pattern that fits.
///
/// # Errors
///
/// Returns [`Error::Validation`] for a string with more than one `/`
/// separator, which matches none of the defined shapes.
pub fn parse_target_arg(raw: &str) -> Result<ParsedTarget> {
    if raw.is_empty() {
        return Ok(ParsedTarget::AutoDetect);
    }
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(ParsedTarget::Url(raw.to_string()));
    }
    if let Some(rest) = raw.strip_prefix('/') {
        if rest.is_empty() || rest.contains('/') {
            return Err(Error::Validation(format!(
                "{raw:?} is not a valid target: expected `/project` with no further path segments"
            )));
        }
        return Ok(ParsedTarget::ProjectSearch { project: rest.to_string(), leading_slash: true });
    }
    if let Some(idx) = raw.find('/') {
        let org = &raw[..idx];
        let project = &raw[idx + 1..];
        if project.contains('/') {
            return Err(Error::Validation(format!(
                "{raw:?} is not a valid target: expected `org/project` or `org/` with no further path segments"
            )));
        }
        if project.is_empty() {
            return Ok(ParsedTarget::OrgAll { org: org.to_string() });
        }
        return Ok(ParsedTarget::Explicit { org: org.to_string(), project: project.to_string() });
    }
    if is_all_digits(raw) {
        return Ok(ParsedTarget::NumericId(raw.to_string()));
    }
    Ok(ParsedTarget::ProjectSearch { project: raw.to_string(), leading_slash: false })
}

/// The inverse of [`parse_target_arg`] for the shapes that carry enough
/// information to round-trip: `explicit`, `org-all`, and
/// `project-search`. `AutoDetect` formats as the empty string (its own
/// parse input); `NumericId`/`Url` format back to the literal they were
/// parsed from.
#[must_use]
pub fn format_target_arg(parsed: &ParsedTarget) -> String {
    match parsed {
        ParsedTarget::AutoDetect => String::new(),
        ParsedTarget::Explicit { org, project } => format!("{org}/{project}"),
        ParsedTarget::OrgAll { org } => format!("{org}/"),
        ParsedTarget::ProjectSearch { project, leading_slash: true } => format!("/{project}"),
        ParsedTarget::ProjectSearch { project, leading_slash: false } => project.clone(),
        ParsedTarget::NumericId(id) => id.clone(),
        ParsedTarget::Url(url) => url.clone(),
    }
}

/// Inputs to the pure (I/O-free) prefix of the auto-detect chain: CLI
/// flags, environment, and the stored default, in that priority order.
#[derive(Debug, Clone, Default)]
pub struct AutoDetectInputs {
    pub cli_org: Option<String>,
    pub cli_project: Option<String>,
    pub env_org: Option<String>,
    pub env_project: Option<String>,
    pub default_org: Option<String>,
    pub default_project: Option<String>,
}

/// Result of the pure auto-detect prefix: either a target was determined
/// from flags/environment/stored default, or the caller must fall
/// through to working-tree detection and directory-name inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoDetectOutcome {
    Found(Target),
    NotFound,
}

/// Steps 1-3 of the auto-detect chain (spec §4.4): explicit CLI flags,
/// then environment (with `PROJECT=org/project` combo precedence over a
/// bare `ORG`), then the stored default. Returns on the first match.
///
/// # Errors
///
/// Returns [`Error::Validation`] if only one of `cli_org`/`cli_project` is
/// supplied — the pair must arrive together or not at all.
pub fn resolve_from_context(inputs: &AutoDetectInputs) -> Result<AutoDetectOutcome> {
    match (&inputs.cli_org, &inputs.cli_project) {
        (Some(org), Some(project)) => {
            return Ok(AutoDetectOutcome::Found(Target::new(org.clone(), project.clone()).with_source("--org/--project")));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(Error::Validation("--org and --project must both be supplied, or neither".into()));
        }
        (None, None) => {}
    }

    if let Some(project) = &inputs.env_project {
        if let Some((org, proj)) = project.split_once('/') {
            return Ok(AutoDetectOutcome::Found(
                Target::new(org, proj).with_source("environment (PROJECT=org/project)"),
            ));
        }
        if let Some(org) = &inputs.env_org {
            return Ok(AutoDetectOutcome::Found(Target::new(org.clone(), project.clone()).with_source("environment")));
        }
        // A bare PROJECT with no ORG and no combo form doesn't determine
        // a target by itself; fall through to the stored default rather
        // than erroring, since env vars are ambient and may be set for
        // an unrelated purpose.
    }

    if let (Some(org), Some(project)) = (&inputs.default_org, &inputs.default_project) {
        return Ok(AutoDetectOutcome::Found(Target::new(org.clone(), project.clone()).with_source("stored default")));
    }

    Ok(AutoDetectOutcome::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_all_digits_rejects_empty() {
        assert!(!is_all_digits(""));
    }

    #[test]
    fn is_all_digits_basic() {
        assert!(is_all_digits("12345"));
        assert!(!is_all_digits("123a5"));
        assert!(!is_all_digits("-123"));
    }

    #[test]
    fn parse_empty_is_auto_detect() {
        assert_eq!(parse_target_arg("").unwrap(), ParsedTarget::AutoDetect);
    }

    #[test]
    fn parse_explicit_org_project() {
        assert_eq!(
            parse_target_arg("acme/frontend").unwrap(),
            ParsedTarget::Explicit { org: "acme".into(), project: "frontend".into() }
        );
    }

    #[test]
    fn parse_org_all() {
        assert_eq!(parse_target_arg("acme/").unwrap(), ParsedTarget::OrgAll { org: "acme".into() });
    }

    #[test]
    fn parse_leading_slash_project_search() {
        assert_eq!(
            parse_target_arg("/frontend").unwrap(),
            ParsedTarget::ProjectSearch { project: "frontend".into(), leading_slash: true }
        );
    }

    #[test]
    fn parse_bare_project_search() {
        assert_eq!(
            parse_target_arg("frontend").unwrap(),
            ParsedTarget::ProjectSearch { project: "frontend".into(), leading_slash: false }
        );
    }

    #[test]
    fn parse_all_digits_is_numeric_id() {
        assert_eq!(parse_target_arg("482910").unwrap(), ParsedTarget::NumericId("482910".into()));
    }

    #[test]
    fn parse_url_scheme() {
        assert_eq!(
            parse_target_arg("https://beacon.sh/organizations/acme/issues/482910/").unwrap(),
            ParsedTarget::Url("https://beacon.sh/organizations/acme/issues/482910/".into())
        );
    }

    #[test]
    fn parse_rejects_too_many_segments() {
        assert!(parse_target_arg("acme/frontend/extra").is_err());
        assert!(parse_target_arg("/frontend/extra").is_err());
    }

    #[test]
    fn round_trip_explicit_org_all_and_project_search() {
        for raw in ["acme/frontend", "acme/", "/frontend", "frontend"] {
            let parsed = parse_target_arg(raw).unwrap();
            assert_eq!(format_target_arg(&parsed), raw);
        }
    }

    #[test]
    fn resolve_from_context_requires_both_cli_flags() {
        let inputs = AutoDetectInputs { cli_org: Some("acme".into()), ..Default::default() };
        assert!(resolve_from_context(&inputs).is_err());
    }

    #[test]
    fn resolve_from_context_cli_flags_win() {
        let inputs = AutoDetectInputs {
            cli_org: Some("acme".into()),
            cli_project: Some("frontend".into()),
            env_org: Some("other".into()),
            ..Default::default()
        };
        let outcome = resolve_from_context(&inputs).unwrap();
        assert_eq!(outcome, AutoDetectOutcome::Found(Target::new("acme", "frontend")));
    }

    #[test]
    fn resolve_from_context_env_project_combo_ignores_env_org() {
        let inputs = AutoDetectInputs {
            env_org: Some("ignored".into()),
            env_project: Some("acme/frontend".into()),
            ..Default::default()
        };
        let outcome = resolve_from_context(&inputs).unwrap();
        assert_eq!(outcome, AutoDetectOutcome::Found(Target::new("acme", "frontend")));
    }

    #[test]
    fn resolve_from_context_env_org_and_project_pair() {
        let inputs =
            AutoDetectInputs { env_org: Some("acme".into()), env_project: Some("frontend".into()), ..Default::default() };
        let outcome = resolve_from_context(&inputs).unwrap();
        assert_eq!(outcome, AutoDetectOutcome::Found(Target::new("acme", "frontend")));
    }

    #[test]
    fn resolve_from_context_falls_through_to_stored_default() {
        let inputs = AutoDetectInputs {
            default_org: Some("acme".into()),
            default_project: Some("frontend".into()),
            ..Default::default()
        };
        let outcome = resolve_from_context(&inputs).unwrap();
        assert_eq!(outcome, AutoDetectOutcome::Found(Target::new("acme", "frontend")));
    }

    #[test]
    fn resolve_from_context_not_found_when_nothing_set() {
        assert_eq!(resolve_from_context(&AutoDetectInputs::default()).unwrap(), AutoDetectOutcome::NotFound);
    }
}
