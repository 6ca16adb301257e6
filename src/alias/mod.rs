//! Shortest-unique-prefix alias assignment for a multi-target result set.
//!
//! Aliases are lowercase, unique, and derived from the project slug by
//! finding the shortest prefix that distinguishes it from its siblings in
//! the same org. A shared word-prefix (hyphen-aligned) is stripped first
//! so the alias carries the informative part of the name, and cross-org
//! collisions are broken by prepending an org-slug prefix.

use crate::model::Target;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// `org/project` → alias.
pub type AliasMap = HashMap<String, String>;

/// Assign aliases for `targets`. Returns an empty map for fewer than two
/// targets — single-target resolutions don't need one.
#[must_use]
pub fn assign(targets: &[Target]) -> AliasMap {
    if targets.len() < 2 {
        return AliasMap::new();
    }

    let mut by_org: HashMap<&str, Vec<&Target>> = HashMap::new();
    for target in targets {
        by_org.entry(target.org.as_str()).or_default().push(target);
    }

    let mut project_alias: HashMap<String, String> = HashMap::new();
    for members in by_org.values() {
        let slugs: Vec<&str> = members.iter().map(|t| t.project.as_str()).collect();
        let stripped = strip_common_word_prefix(&slugs);
        let prefixes = shortest_unique_prefixes(&stripped);
        for (target, alias) in members.iter().zip(prefixes) {
            project_alias.insert(target.key(), alias.to_lowercase());
        }
    }

    // Detect cross-org alias collisions and disambiguate with an org prefix.
    let mut alias_owners: HashMap<String, Vec<&Target>> = HashMap::new();
    for target in targets {
        let alias = project_alias.get(&target.key()).expect("computed above").clone();
        alias_owners.entry(alias).or_default().push(target);
    }

    let mut result = AliasMap::new();
    for (alias, owners) in alias_owners {
        if owners.len() == 1 {
            result.insert(owners[0].key(), alias);
            continue;
        }
        let org_slugs: Vec<&str> = owners.iter().map(|t| t.org.as_str()).collect();
        let org_prefixes = shortest_unique_prefixes(&org_slugs);
        for (target, org_prefix) in owners.iter().zip(org_prefixes) {
            result.insert(target.key(), format!("{}/{}", org_prefix.to_lowercase(), alias));
        }
    }
    result
}

/// Strip a word prefix (hyphen-aligned tokens) shared by every slug, so
/// `spotlight-electron`, `spotlight-website`, `spotlight` prefix-compute
/// over `electron`, `website`, `` rather than the uninformative common
/// `spotlight`. A slug that equals the shared prefix exactly keeps a
/// single placeholder token so it never goes empty.
fn strip_common_word_prefix<'a>(slugs: &[&'a str]) -> Vec<String> {
    if slugs.len() < 2 {
        return slugs.iter().map(|s| (*s).to_string()).collect();
    }

    let tokenized: Vec<Vec<&str>> = slugs.iter().map(|s| s.split('-').collect()).collect();
    let max_len = tokenized.iter().map(Vec::len).max().unwrap_or(0);

    // Shared tokens stop at the first slug that runs out of tokens — that
    // slug IS the shared prefix, and its own remainder falls back to its
    // last token below rather than going empty.
    let mut shared = 0;
    'outer: for i in 0..max_len {
        if tokenized.iter().any(|toks| toks.len() <= i) {
            break;
        }
        let token = tokenized[0][i];
        for toks in &tokenized {
            if toks[i] != token {
                break 'outer;
            }
        }
        shared += 1;
    }

    tokenized
        .iter()
        .map(|toks| {
            let remainder = toks[shared..].join("-");
            if remainder.is_empty() {
                toks[toks.len().saturating_sub(1)].to_string()
            } else {
                remainder
            }
        })
        .collect()
}

/// Shortest unique prefix per input string, preserving input order.
/// Ties (identical strings) get the full string.
fn shortest_unique_prefixes(values: &[&str]) -> Vec<String> {
    shortest_unique_prefixes_owned(&values.iter().map(|s| (*s).to_string()).collect::<Vec<_>>())
}

fn shortest_unique_prefixes_owned(values: &[String]) -> Vec<String> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let others: Vec<&String> = values
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, v)| v)
                .collect();

            for len in 1..=value.chars().count() {
                let candidate: String = value.chars().take(len).collect();
                if !others.iter().any(|other| other.starts_with(&candidate)) {
                    return candidate;
                }
            }
            value.clone()
        })
        .collect()
}

/// Fingerprint over a set of detected embedded identifiers, gating the
/// validity of a persisted alias table against a changed identifier set.
#[must_use]
pub fn fingerprint(identifiers: &[String]) -> String {
    let mut sorted: Vec<&String> = identifiers.iter().collect();
    sorted.sort();
    let mut hasher = Sha256::new();
    for id in &sorted {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(org: &str, project: &str) -> Target {
        Target::new(org, project)
    }

    #[test]
    fn single_target_gets_no_aliases() {
        assert!(assign(&[target("acme", "frontend")]).is_empty());
    }

    #[test]
    fn strips_common_word_prefix_before_computing_prefixes() {
        let targets = vec![
            target("acme", "spotlight-electron"),
            target("acme", "spotlight-website"),
            target("acme", "spotlight"),
        ];
        let aliases = assign(&targets);
        assert_eq!(aliases.get("acme/spotlight-electron").unwrap(), "e");
        assert_eq!(aliases.get("acme/spotlight-website").unwrap(), "w");
        assert_eq!(aliases.get("acme/spotlight").unwrap(), "s");
    }

    #[test]
    fn aliases_are_pairwise_distinct() {
        let targets = vec![
            target("acme", "frontend"),
            target("acme", "backend"),
            target("acme", "fulfillment"),
        ];
        let aliases = assign(&targets);
        let values: HashSet<&String> = aliases.values().collect();
        assert_eq!(values.len(), aliases.len());
    }

    #[test]
    fn cross_org_collision_gets_org_qualified() {
        let targets = vec![target("acme", "frontend"), target("globex", "frontend")];
        let aliases = assign(&targets);
        let values: Vec<&String> = aliases.values().collect();
        assert!(values.iter().any(|v| v.contains('/')));
        let unique: HashSet<&&String> = values.iter().collect();
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a = fingerprint(&["id1".into(), "id2".into()]);
        let b = fingerprint(&["id2".into(), "id1".into()]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_when_identifier_set_changes() {
        let a = fingerprint(&["id1".into()]);
        let b = fingerprint(&["id1".into(), "id2".into()]);
        assert_ne!(a, b);
    }
}
