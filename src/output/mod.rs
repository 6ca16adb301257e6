//! Plain-table and `--json` rendering for `issues list`. No color, no
//! hyperlinks — those are explicitly out of scope.

use crate::model::{FetchResult, Issue, Target};
use serde_json::{json, Value};

/// One row of table output: the issue, its owning target, and its alias
/// (if this is a multi-target run with two or more targets).
pub struct Row<'a> {
    pub alias: Option<&'a str>,
    pub target: &'a Target,
    pub issue: &'a Issue,
}

/// Render a plain, aligned column table: alias (if present), short id,
/// level, title, count, last seen.
#[must_use]
pub fn render_table(rows: &[Row<'_>]) -> String {
    let has_alias = rows.iter().any(|r| r.alias.is_some());
    let mut out = String::new();
    for row in rows {
        if has_alias {
            out.push_str(&format!("{:<8}", row.alias.unwrap_or("-")));
        }
        out.push_str(&format!(
            "{:<14}{:<8}{:<50}{:<8}{}\n",
            row.issue.short_id,
            row.issue.level,
            truncate(&row.issue.title, 50),
            row.issue.count,
            row.issue
                .last_seen
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        ));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
        t.push('…');
        t
    }
}

/// Build the `--json` contract: `data`, `hasMore`, `nextCursor`, and
/// `errors` (only present when at least one target failed).
#[must_use]
pub fn render_json(issues: &[Issue], has_more: bool, next_cursor: Option<&str>, failures: &[&FetchResult]) -> Value {
    let data: Vec<Value> = issues.iter().map(|issue| issue.raw.clone()).collect();

    let mut out = json!({
        "data": data,
        "hasMore": has_more,
    });

    if let Some(cursor) = next_cursor {
        out["nextCursor"] = Value::String(cursor.to_string());
    }

    if !failures.is_empty() {
        let errors: Vec<Value> = failures
            .iter()
            .filter_map(|f| match f {
                FetchResult::Failure { error, .. } => {
                    Some(json!({ "status": error.status(), "message": error.to_string() }))
                }
                FetchResult::Ok { .. } => None,
            })
            .collect();
        out["errors"] = Value::Array(errors);
    }

    out
}
