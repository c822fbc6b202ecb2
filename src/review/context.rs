//! Code context sent to the reviewer.
//!
//! Diff mode sends the branch diff against the default branch plus
//! uncommitted changes. Full mode sends reviewable files from the snapshot.
//! Either way each file is capped at `max_file_bytes`; truncation is always
//! marked and files over `max_files` are listed, never silently dropped.

use crate::vcs::Git;
use anyhow::Result;
use glob::Pattern;
use std::path::Path;
use tracing::{debug, info};

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_BYTES: usize = 8192;

#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub max_file_bytes: usize,
    pub max_files: usize,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Try diff mode before falling back to the full tree.
    pub prefer_diff: bool,
    /// Diff base; the detected default branch when `None`.
    pub base_branch: Option<String>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: 60_000,
            max_files: 40,
            include: Vec::new(),
            exclude: Vec::new(),
            prefer_diff: true,
            base_branch: None,
        }
    }
}

/// Assembled reviewer input.
#[derive(Debug, Clone, Default)]
pub struct ReviewContext {
    pub text: String,
    pub used_diff: bool,
    /// Files whose content (or diff) is included.
    pub files: Vec<String>,
    pub truncated: Vec<String>,
    /// Reviewable files left out because of `max_files`.
    pub omitted: Vec<String>,
}

impl ReviewContext {
    pub fn files_reviewed(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Build the review context, preferring a diff when asked and available.
pub async fn build_context(
    project_dir: &Path,
    tracked: &[String],
    options: &ContextOptions,
) -> Result<ReviewContext> {
    if options.prefer_diff
        && let Some(context) = diff_context(project_dir, options).await
    {
        info!(files = context.files.len(), "reviewing branch diff");
        return Ok(context);
    }
    let context = full_context(project_dir, tracked, options)?;
    info!(
        files = context.files.len(),
        omitted = context.omitted.len(),
        "reviewing full tree"
    );
    Ok(context)
}

/// Diff-mode context, or `None` when git is unavailable or nothing changed.
async fn diff_context(project_dir: &Path, options: &ContextOptions) -> Option<ReviewContext> {
    let git = Git::new(project_dir);
    if !git.is_work_tree().await {
        debug!("not a git work tree, diff review unavailable");
        return None;
    }
    let base = match &options.base_branch {
        Some(base) => base.clone(),
        None => git.default_branch().await,
    };
    let diff = match git.diff_against(&base).await {
        Ok(diff) if !diff.trim().is_empty() => diff,
        Ok(_) => {
            debug!(%base, "empty diff, falling back to full tree");
            return None;
        }
        Err(e) => {
            debug!(error = %e, "diff unavailable, falling back to full tree");
            return None;
        }
    };
    let files = git.changed_files(&base).await.unwrap_or_default();
    Some(assemble_diff(&base, &diff, files, options.max_file_bytes))
}

/// Wrap a unified diff, capping each file's hunk at `max_file_bytes`.
pub fn assemble_diff(base: &str, diff: &str, files: Vec<String>, max_file_bytes: usize) -> ReviewContext {
    let mut text = format!("# Changes against {}\n\n```diff\n", base);
    let mut truncated = Vec::new();
    for chunk in split_diff(diff) {
        let (body, cut) = truncate_text(chunk, max_file_bytes);
        if cut.is_some() {
            truncated.push(diff_chunk_path(chunk).unwrap_or_else(|| "(unknown)".to_string()));
        }
        text.push_str(&body);
        if !body.ends_with('\n') {
            text.push('\n');
        }
    }
    text.push_str("```\n");
    ReviewContext {
        text,
        used_diff: true,
        files,
        truncated,
        omitted: Vec::new(),
    }
}

/// Full-tree context from snapshot paths.
pub fn full_context(project_dir: &Path, tracked: &[String], options: &ContextOptions) -> Result<ReviewContext> {
    let include = compile(&options.include)?;
    let exclude = compile(&options.exclude)?;

    let reviewable: Vec<&String> = tracked
        .iter()
        .filter(|p| include.is_empty() || include.iter().any(|g| g.matches(p)))
        .filter(|p| !exclude.iter().any(|g| g.matches(p)))
        .collect();

    let mut context = ReviewContext::default();
    for rel in reviewable {
        if context.files.len() >= options.max_files {
            context.omitted.push(rel.clone());
            continue;
        }
        let bytes = match std::fs::read(project_dir.join(rel)) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %rel, error = %e, "unreadable file left out of review");
                continue;
            }
        };
        if is_binary(&bytes) {
            continue;
        }
        let content = String::from_utf8_lossy(&bytes);
        let (body, cut) = truncate_text(&content, options.max_file_bytes);
        if cut.is_some() {
            context.truncated.push(rel.clone());
        }
        context.text.push_str(&format!("=== FILE: {} ===\n", rel));
        context.text.push_str(&body);
        if !body.ends_with('\n') {
            context.text.push('\n');
        }
        context.text.push('\n');
        context.files.push(rel.clone());
    }

    if !context.omitted.is_empty() {
        context.text.push_str(&format!(
            "=== OMITTED: {} more files not included (limit {}) ===\n",
            context.omitted.len(),
            options.max_files
        ));
        for rel in &context.omitted {
            context.text.push_str(&format!("- {}\n", rel));
        }
    }
    Ok(context)
}

/// Keep at most `max_bytes` of `text`, appending an explicit marker when cut.
///
/// Returns the kept text and the number of bytes removed.
pub fn truncate_text(text: &str, max_bytes: usize) -> (String, Option<usize>) {
    if text.len() <= max_bytes {
        return (text.to_string(), None);
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let removed = text.len() - end;
    (
        format!("{}\n[... truncated {} bytes ...]\n", &text[..end], removed),
        Some(removed),
    )
}

fn split_diff(diff: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = diff
        .match_indices("diff --git ")
        .map(|(i, _)| i)
        .filter(|&i| i == 0 || diff.as_bytes()[i - 1] == b'\n')
        .collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    let mut chunks = Vec::new();
    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(diff.len());
        if start < end {
            chunks.push(&diff[start..end]);
        }
    }
    chunks
}

fn diff_chunk_path(chunk: &str) -> Option<String> {
    let header = chunk.lines().next()?;
    let rest = header.strip_prefix("diff --git a/")?;
    let (_, b) = rest.split_once(" b/")?;
    Some(b.to_string())
}

fn is_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_BYTES)].contains(&0)
}

fn compile(globs: &[String]) -> Result<Vec<Pattern>> {
    globs
        .iter()
        .map(|g| Pattern::new(g).map_err(|e| anyhow::anyhow!("Invalid glob '{}': {}", g, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn options(max_file_bytes: usize, max_files: usize) -> ContextOptions {
        ContextOptions {
            max_file_bytes,
            max_files,
            prefer_diff: false,
            ..ContextOptions::default()
        }
    }

    #[test]
    fn test_truncate_marks_removed_bytes() {
        let (kept, removed) = truncate_text("abcdefghij", 4);
        assert_eq!(removed, Some(6));
        assert!(kept.starts_with("abcd\n"));
        assert!(kept.contains("[... truncated 6 bytes ...]"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let (kept, removed) = truncate_text("ééé", 3);
        assert!(kept.starts_with("é\n"));
        assert_eq!(removed, Some(4));
    }

    #[test]
    fn test_full_context_includes_and_truncates() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("small.rs"), "fn a() {}\n").unwrap();
        fs::write(dir.path().join("big.rs"), "x".repeat(100)).unwrap();
        let tracked = vec!["big.rs".to_string(), "small.rs".to_string()];

        let ctx = full_context(dir.path(), &tracked, &options(50, 10)).unwrap();
        assert!(!ctx.used_diff);
        assert_eq!(ctx.files, tracked);
        assert_eq!(ctx.truncated, vec!["big.rs"]);
        assert!(ctx.text.contains("=== FILE: small.rs ==="));
        assert!(ctx.text.contains("[... truncated 50 bytes ...]"));
    }

    #[test]
    fn test_full_context_lists_omitted_files() {
        let dir = tempdir().unwrap();
        let mut tracked = Vec::new();
        for i in 0..3 {
            let name = format!("f{}.rs", i);
            fs::write(dir.path().join(&name), "content\n").unwrap();
            tracked.push(name);
        }
        let ctx = full_context(dir.path(), &tracked, &options(1000, 2)).unwrap();
        assert_eq!(ctx.files_reviewed(), 2);
        assert_eq!(ctx.omitted, vec!["f2.rs"]);
        assert!(ctx.text.contains("OMITTED: 1 more files"));
        assert!(ctx.text.contains("- f2.rs"));
    }

    #[test]
    fn test_full_context_filters_globs_and_binaries() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn x() {}\n").unwrap();
        fs::write(dir.path().join("src/logo.png"), [0x89, b'P', 0, 0]).unwrap();
        fs::write(dir.path().join("README.md"), "docs\n").unwrap();
        let tracked = vec![
            "README.md".to_string(),
            "src/lib.rs".to_string(),
            "src/logo.png".to_string(),
        ];
        let opts = ContextOptions {
            include: vec!["src/**".to_string()],
            ..options(1000, 10)
        };
        let ctx = full_context(dir.path(), &tracked, &opts).unwrap();
        assert_eq!(ctx.files, vec!["src/lib.rs"]);
    }

    #[test]
    fn test_assemble_diff_caps_each_file() {
        let diff = format!(
            "diff --git a/a.rs b/a.rs\n+small\ndiff --git a/b.rs b/b.rs\n{}\n",
            "+".repeat(200)
        );
        let ctx = assemble_diff("main", &diff, vec!["a.rs".into(), "b.rs".into()], 80);
        assert!(ctx.used_diff);
        assert_eq!(ctx.truncated, vec!["b.rs"]);
        assert!(ctx.text.contains("+small"));
        assert!(ctx.text.contains("[... truncated"));
        assert!(ctx.text.starts_with("# Changes against main"));
    }

    #[tokio::test]
    async fn test_build_context_falls_back_outside_git() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();
        let opts = ContextOptions {
            prefer_diff: true,
            ..ContextOptions::default()
        };
        let ctx = build_context(dir.path(), &["main.rs".to_string()], &opts)
            .await
            .unwrap();
        assert!(!ctx.used_diff);
        assert_eq!(ctx.files, vec!["main.rs"]);
    }
}
