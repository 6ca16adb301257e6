//! Context-key fingerprinting and compound cursor encode/decode/persist.
//!
//! A context key captures exactly the parameters that must match for a
//! saved cursor to be safe to resume: the API host, the target set (or
//! org, for org-all), sort, period, and query. A compound cursor is the
//! pipe-joined per-target cursor, aligned to a stable sort of the target
//! list so two invocations with the same targets (in any discovery order)
//! produce the same alignment.

use crate::error::Result;
use crate::model::{CompoundCursor, ContextKey, Target};
use crate::store::Store;

/// Escapes `\` and `|` so they can't be mistaken for field/segment
/// separators. Reversible in principle; only encoding is required.
#[must_use]
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            _ => out.push(ch),
        }
    }
    out
}

/// Stable order used for both the context-key fingerprint and compound
/// cursor alignment: lexicographic on `org/project`, independent of
/// discovery order.
#[must_use]
pub fn sort_targets(targets: &[Target]) -> Vec<Target> {
    let mut sorted: Vec<Target> = targets.to_vec();
    sorted.sort_by(|a, b| a.key().cmp(&b.key()));
    sorted
}

/// Context key for a multi-target list invocation.
#[must_use]
pub fn context_key_multi(
    base_url: &str,
    targets: &[Target],
    sort: &str,
    period: &str,
    query: Option<&str>,
) -> ContextKey {
    let sorted = sort_targets(targets);
    let fingerprint = sorted.iter().map(Target::key).collect::<Vec<_>>().join(",");
    build_key(base_url, &format!("multi:{fingerprint}"), sort, period, query)
}

/// Context key for the org-all path.
#[must_use]
pub fn context_key_org(
    base_url: &str,
    org: &str,
    sort: &str,
    period: &str,
    query: Option<&str>,
) -> ContextKey {
    build_key(base_url, &format!("org:{org}"), sort, period, query)
}

fn build_key(base_url: &str, type_segment: &str, sort: &str, period: &str, query: Option<&str>) -> ContextKey {
    let mut key = format!(
        "host:{} | type:{} | sort:{} | period:{}",
        escape(base_url),
        type_segment,
        escape(sort),
        escape(period)
    );
    if let Some(q) = query {
        key.push_str(&format!(" | q:{}", escape(q)));
    }
    ContextKey(key)
}

/// Encode a compound cursor: `c1|c2|...|cN`, empty segment for exhausted.
#[must_use]
pub fn encode_compound(cursor: &CompoundCursor) -> String {
    cursor.0.iter().map(|c| c.clone().unwrap_or_default()).collect::<Vec<_>>().join("|")
}

/// Decode a persisted compound cursor string. A legacy value starting
/// with `[` (the old JSON array format) is discarded and decodes to "no
/// cursor" — an empty sequence, not an error.
#[must_use]
pub fn decode_compound(raw: &str) -> CompoundCursor {
    if raw.starts_with('[') {
        return CompoundCursor(Vec::new());
    }
    if raw.is_empty() {
        return CompoundCursor(Vec::new());
    }
    CompoundCursor(
        raw.split('|')
            .map(|segment| if segment.is_empty() { None } else { Some(segment.to_string()) })
            .collect(),
    )
}

/// Load the stored compound cursor for `(command_key, context_key)`, if
/// any, and if it isn't the legacy format.
pub fn load(store: &Store, command_key: &str, context_key: &ContextKey) -> Result<Option<CompoundCursor>> {
    let metadata_key = format!("cursor:{command_key}:{}", context_key.0);
    let Some(raw) = store.get_metadata(&metadata_key)? else {
        return Ok(None);
    };
    let decoded = decode_compound(&raw);
    Ok(if decoded.0.is_empty() { None } else { Some(decoded) })
}

/// Persist (or clear) the compound cursor for `(command_key, context_key)`.
/// A cursor with no non-empty segment is deleted rather than stored, per
/// the "next_page exists iff any segment is non-empty" invariant.
pub fn persist(
    store: &mut Store,
    command_key: &str,
    context_key: &ContextKey,
    cursor: &CompoundCursor,
) -> Result<()> {
    let metadata_key = format!("cursor:{command_key}:{}", context_key.0);
    if cursor.has_next_page() {
        store.set_metadata(&metadata_key, &encode_compound(cursor))?;
    } else {
        store.delete_metadata(&metadata_key)?;
    }
    Ok(())
}
