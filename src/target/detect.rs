//! Embedded-identifier detection: step 4 of the auto-detect chain.
//!
//! Scans the working tree — source files, dotfiles beginning with
//! `.env`, and the process environment — for two shapes of embedded
//! identifier: a DSN-style URL (`https://<public_key>@<host>/<project_id>`,
//! optionally with an org id embedded in the host as `o<digits>.`) and a
//! bare public-key-only token. The scan is bounded in depth and file
//! size, and stops descending into nested project roots so a vendored or
//! submoduled project doesn't get scanned as if it were part of this one.

use crate::target::directory;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

const MAX_SCAN_DEPTH: usize = 8;
const MAX_FILE_BYTES: u64 = 512 * 1024;

const PRUNED_DIR_NAMES: [&str; 6] = [".git", "node_modules", "target", "vendor", "dist", "build"];

const SCANNABLE_EXTENSIONS: [&str; 17] = [
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "rb", "java", "kt", "swift", "php", "env", "yml", "yaml", "toml",
    "json",
];

static DSN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://([a-f0-9]{32})@([A-Za-z0-9.\-]+)/([0-9]+)").expect("valid regex"));

static KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-f0-9]{32}\b").expect("valid regex"));

/// One embedded identifier found by the scan. Equality and hashing are on
/// `public_key`, matching the dedup key the spec assigns it.
#[derive(Debug, Clone)]
pub enum Identifier {
    /// A full DSN: a public key plus the host (and, for org-scoped
    /// regional hosts, the org id) and project id it was issued for.
    Dsn { public_key: String, host: String, project_id: Option<String>, org_id: Option<String> },
    /// A bare public key with no surrounding URL — e.g. copied into a
    /// config value by itself.
    Key { public_key: String },
}

impl Identifier {
    #[must_use]
    pub fn public_key(&self) -> &str {
        match self {
            Self::Dsn { public_key, .. } | Self::Key { public_key } => public_key,
        }
    }

    #[must_use]
    pub fn org_id(&self) -> Option<&str> {
        match self {
            Self::Dsn { org_id, .. } => org_id.as_deref(),
            Self::Key { .. } => None,
        }
    }

    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Dsn { project_id, .. } => project_id.as_deref(),
            Self::Key { .. } => None,
        }
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}
impl Eq for Identifier {}

/// Scan `root` for embedded identifiers, deduplicated by public key in
/// first-discovery order: source files and `.env*` dotfiles under `root`
/// (bounded depth, skipping nested project roots and common
/// dependency/build directories), then the process environment.
#[must_use]
pub fn scan_working_tree(root: &Path) -> Vec<Identifier> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for entry in walkdir::WalkDir::new(root)
        .max_depth(MAX_SCAN_DEPTH)
        .into_iter()
        .filter_entry(|e| keep_entry(e, root))
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_file() || !is_scannable_file(entry.path()) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        if metadata.len() > MAX_FILE_BYTES {
            continue;
        }
        let Ok(contents) = std::fs::read_to_string(entry.path()) else { continue };
        collect_identifiers(&contents, &mut seen, &mut found);
    }

    for (_, value) in std::env::vars() {
        collect_identifiers(&value, &mut seen, &mut found);
    }

    found
}

fn keep_entry(entry: &walkdir::DirEntry, root: &Path) -> bool {
    let name = entry.file_name().to_string_lossy();
    if PRUNED_DIR_NAMES.contains(&name.as_ref()) {
        return false;
    }
    if entry.file_type().is_dir() && entry.path() != root && directory::is_project_root(entry.path()) {
        return false;
    }
    true
}

fn is_scannable_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.starts_with(".env") {
        return true;
    }
    path.extension().and_then(|e| e.to_str()).is_some_and(|ext| SCANNABLE_EXTENSIONS.contains(&ext))
}

fn collect_identifiers(text: &str, seen: &mut HashSet<String>, found: &mut Vec<Identifier>) {
    for caps in DSN_RE.captures_iter(text) {
        let public_key = caps[1].to_string();
        let host = caps[2].to_string();
        let project_id = caps.get(3).map(|m| m.as_str().to_string());
        let org_id = org_id_from_host(&host);
        if seen.insert(public_key.clone()) {
            found.push(Identifier::Dsn { public_key, host, project_id, org_id });
        }
    }
    for m in KEY_RE.find_iter(text) {
        let key = m.as_str().to_string();
        if seen.insert(key.clone()) {
            found.push(Identifier::Key { public_key: key });
        }
    }
}

/// A regional ingest host embeds the org id as a `o<digits>.` label,
/// e.g. `o447812.ingest.us.beacon.sh`.
fn org_id_from_host(host: &str) -> Option<String> {
    let rest = host.strip_prefix('o')?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() || !rest[digits.len()..].starts_with('.') {
        return None;
    }
    Some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn public_key_accessor_covers_both_variants() {
        let dsn = Identifier::Dsn {
            public_key: "a".repeat(32),
            host: "o1.ingest.beacon.sh".into(),
            project_id: Some("9".into()),
            org_id: Some("1".into()),
        };
        assert_eq!(dsn.public_key(), "a".repeat(32));
        let key = Identifier::Key { public_key: "b".repeat(32) };
        assert_eq!(key.public_key(), "b".repeat(32));
    }

    #[test]
    fn org_id_from_host_parses_digit_label() {
        assert_eq!(org_id_from_host("o447812.ingest.us.beacon.sh"), Some("447812".into()));
        assert_eq!(org_id_from_host("ingest.us.beacon.sh"), None);
        assert_eq!(org_id_from_host("old.beacon.sh"), None);
    }

    #[test]
    fn collect_identifiers_finds_dsn_and_dedupes() {
        let key = "f".repeat(32);
        let text = format!("BEACON_DSN=https://{key}@o123.ingest.beacon.sh/42\nBEACON_DSN=https://{key}@o123.ingest.beacon.sh/42\n");
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        collect_identifiers(&text, &mut seen, &mut found);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].public_key(), key);
        assert_eq!(found[0].org_id(), Some("123"));
        assert_eq!(found[0].project_id(), Some("42"));
    }

    #[test]
    fn collect_identifiers_finds_bare_key_once_not_double_counted_with_dsn() {
        let key = "c".repeat(32);
        let text = format!("https://{key}@o1.ingest.beacon.sh/1\nfallback_key = \"{key}\"\n");
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        collect_identifiers(&text, &mut seen, &mut found);
        // The DSN's public key is already seen, so the bare occurrence
        // later in the same text isn't counted a second time.
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn scan_working_tree_reads_env_dotfiles_and_source_and_skips_nested_roots() {
        let dir = tempfile::tempdir().unwrap();
        let key = "d".repeat(32);
        fs::write(dir.path().join(".env.local"), format!("BEACON_DSN=https://{key}@o5.ingest.beacon.sh/7\n")).unwrap();

        let nested = dir.path().join("vendored-dep");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("Cargo.toml"), "[package]\nname = \"vendored\"\n").unwrap();
        let other_key = "e".repeat(32);
        fs::write(nested.join("lib.rs"), format!("const KEY: &str = \"{other_key}\";\n")).unwrap();

        let found = scan_working_tree(dir.path());
        let keys: Vec<&str> = found.iter().map(Identifier::public_key).collect();
        assert!(keys.contains(&key.as_str()));
        assert!(!keys.contains(&other_key.as_str()), "scan must not descend into a nested project root");
    }

    #[test]
    fn scan_working_tree_skips_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let key = "9".repeat(32);
        let huge = format!("https://{key}@o1.ingest.beacon.sh/1\n") + &"x".repeat(MAX_FILE_BYTES as usize + 1);
        fs::write(dir.path().join("huge.rs"), huge).unwrap();

        let found = scan_working_tree(dir.path());
        assert!(found.is_empty());
    }
}
