//! File digests and integrity snapshots.
//!
//! A [`FileSnapshot`] maps repository-relative paths to SHA-256 digests of the
//! exact file bytes. It is captured once at verify time and later re-derived
//! at ship time for comparison.

use crate::errors::HashError;
use anyhow::{Context, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Number of hex characters shown when a digest is quoted in diagnostics.
pub const DIGEST_PREFIX_LEN: usize = 12;

/// Paths never included in a snapshot unless the configuration replaces this list.
pub const DEFAULT_EXCLUDES: &[&str] = &[".git/**", ".shipgate/**", "target/**", "node_modules/**"];

/// A lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for human-facing output.
    pub fn prefix(&self) -> &str {
        let end = self.0.len().min(DIGEST_PREFIX_LEN);
        &self.0[..end]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Digest {
    fn from(s: &str) -> Self {
        Self(s.to_ascii_lowercase())
    }
}

/// Compute the digest of a file's bytes.
///
/// Streams the file so large artifacts are not loaded into memory.
pub fn digest_file(path: &Path) -> Result<Digest, HashError> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => HashError::NotFound {
            path: path.to_path_buf(),
        },
        _ => HashError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| HashError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Digest(format!("{:x}", hasher.finalize())))
}

/// Recorded digest mapping for every tracked file at verification time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    hashes: BTreeMap<String, Digest>,
}

impl FileSnapshot {
    pub fn from_hashes(hashes: BTreeMap<String, Digest>) -> Self {
        Self { hashes }
    }

    /// Hash every path in `paths` relative to `root`.
    ///
    /// Paths listed by the version-control collaborator may already be deleted
    /// from the working tree; those are logged and left out of the snapshot.
    pub fn capture(root: &Path, paths: &[String]) -> Result<Self> {
        let mut hashes = BTreeMap::new();
        for rel in paths {
            match digest_file(&root.join(rel)) {
                Ok(digest) => {
                    hashes.insert(rel.clone(), digest);
                }
                Err(HashError::NotFound { .. }) => {
                    warn!(path = %rel, "tracked file is missing from the working tree, not snapshotted");
                }
                Err(e) => return Err(e).with_context(|| format!("Failed to hash {}", rel)),
            }
        }
        Ok(Self { hashes })
    }

    pub fn hashes(&self) -> &BTreeMap<String, Digest> {
        &self.hashes
    }

    pub fn get(&self, path: &str) -> Option<&Digest> {
        self.hashes.get(path)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.hashes.keys().map(String::as_str)
    }
}

/// Compiled exclude globs for snapshot enumeration.
#[derive(Debug, Clone)]
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
    /// `dir/**` patterns also prune the directory itself during a walk.
    dir_prefixes: Vec<Pattern>,
    /// Exact project-relative paths, matched without glob interpretation.
    literal: Vec<String>,
}

impl ExcludeSet {
    pub fn new<S: AsRef<str>>(globs: &[S]) -> Result<Self> {
        let mut patterns = Vec::new();
        let mut dir_prefixes = Vec::new();
        for g in globs {
            let g = g.as_ref();
            patterns.push(Pattern::new(g).with_context(|| format!("Invalid glob '{}'", g))?);
            if let Some(dir) = g.strip_suffix("/**") {
                dir_prefixes.push(Pattern::new(dir).with_context(|| format!("Invalid glob '{}'", g))?);
            }
        }
        Ok(Self {
            patterns,
            dir_prefixes,
            literal: Vec::new(),
        })
    }

    /// Also exclude one exact project-relative path.
    pub fn with_path(mut self, rel: impl Into<String>) -> Self {
        self.literal.push(rel.into());
        self
    }

    pub fn defaults() -> Self {
        // Static patterns are valid globs.
        Self::new(DEFAULT_EXCLUDES).unwrap_or_else(|_| Self {
            patterns: Vec::new(),
            dir_prefixes: Vec::new(),
            literal: Vec::new(),
        })
    }

    pub fn is_excluded(&self, rel: &str) -> bool {
        self.literal.iter().any(|l| l == rel)
            || self.patterns.iter().any(|p| p.matches(rel))
            || self.dir_prefixes.iter().any(|p| {
                rel.split('/')
                    .scan(String::new(), |acc, part| {
                        if !acc.is_empty() {
                            acc.push('/');
                        }
                        acc.push_str(part);
                        Some(acc.clone())
                    })
                    .any(|ancestor| p.matches(&ancestor))
            })
    }

    fn prunes_dir(&self, rel: &str) -> bool {
        self.dir_prefixes.iter().any(|p| p.matches(rel))
    }
}

/// Apply the exclude set to a listing from the version-control collaborator.
pub fn filter_paths(paths: Vec<String>, excludes: &ExcludeSet) -> Vec<String> {
    let mut kept: Vec<String> = paths
        .into_iter()
        .filter(|p| !excludes.is_excluded(p))
        .collect();
    kept.sort();
    kept.dedup();
    kept
}

/// Enumerate files under `root` when no version-control listing is available.
pub fn walk_files(root: &Path, excludes: &ExcludeSet) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| {
        if e.depth() == 0 || !e.file_type().is_dir() {
            return true;
        }
        relative_path(root, e.path()).is_none_or(|rel| !excludes.prunes_dir(&rel))
    }) {
        let entry = entry.context("Failed to walk project directory")?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(rel) = relative_path(root, entry.path())
            && !excludes.is_excluded(&rel)
        {
            files.push(rel);
        }
    }
    files.sort();
    Ok(files)
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_digest_is_deterministic() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        let first = digest_file(&a).unwrap();
        assert_eq!(first, digest_file(&a).unwrap());
        assert_eq!(first, digest_file(&b).unwrap());
        assert_eq!(first, Digest::of_bytes(b"same bytes"));
    }

    #[test]
    fn test_digest_known_value() {
        // sha256("abc")
        assert_eq!(
            Digest::of_bytes(b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_single_byte_change_changes_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"hello world").unwrap();
        let before = digest_file(&path).unwrap();
        fs::write(&path, b"hello worle").unwrap();
        assert_ne!(before, digest_file(&path).unwrap());
    }

    #[test]
    fn test_digest_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = digest_file(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, HashError::NotFound { .. }));
    }

    #[test]
    fn test_digest_prefix() {
        let d = Digest::of_bytes(b"abc");
        assert_eq!(d.prefix(), "ba7816bf8f01");
        assert_eq!(d.prefix().len(), DIGEST_PREFIX_LEN);
    }

    #[test]
    fn test_capture_skips_missing_paths() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let snapshot =
            FileSnapshot::capture(dir.path(), &["a.txt".to_string(), "gone.txt".to_string()])
                .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("a.txt").is_some());
        assert!(snapshot.get("gone.txt").is_none());
    }

    #[test]
    fn test_walk_files_respects_excludes() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("target/debug")).unwrap();
        fs::create_dir_all(root.join(".shipgate")).unwrap();
        fs::write(root.join("src/lib.rs"), "lib").unwrap();
        fs::write(root.join("src/nested/mod.rs"), "mod").unwrap();
        fs::write(root.join("target/debug/out"), "bin").unwrap();
        fs::write(root.join(".shipgate/verification.json"), "{}").unwrap();
        fs::write(root.join("README.md"), "readme").unwrap();

        let files = walk_files(root, &ExcludeSet::defaults()).unwrap();
        assert_eq!(files, vec!["README.md", "src/lib.rs", "src/nested/mod.rs"]);
    }

    #[test]
    fn test_exclude_set_matches_nested_dirs() {
        let excludes = ExcludeSet::new(&["node_modules/**", "*.log"]).unwrap();
        assert!(excludes.is_excluded("node_modules/pkg/index.js"));
        assert!(excludes.is_excluded("debug.log"));
        assert!(!excludes.is_excluded("src/main.rs"));
    }

    #[test]
    fn test_literal_path_is_excluded_verbatim() {
        let excludes = ExcludeSet::defaults().with_path("out/[record].json");
        assert!(excludes.is_excluded("out/[record].json"));
        assert!(!excludes.is_excluded("out/r.json"));
        assert!(!excludes.is_excluded("out"));
    }

    #[test]
    fn test_filter_paths_sorts_and_dedups() {
        let excludes = ExcludeSet::defaults();
        let kept = filter_paths(
            vec![
                "b.rs".to_string(),
                "target/x".to_string(),
                "a.rs".to_string(),
                "a.rs".to_string(),
            ],
            &excludes,
        );
        assert_eq!(kept, vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn test_snapshot_serializes_in_path_order() {
        let mut hashes = BTreeMap::new();
        hashes.insert("z.txt".to_string(), Digest::of_bytes(b"z"));
        hashes.insert("a.txt".to_string(), Digest::of_bytes(b"a"));
        let snapshot = FileSnapshot::from_hashes(hashes);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.find("a.txt").unwrap() < json.find("z.txt").unwrap());
    }
}
