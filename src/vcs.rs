//! Line-level history oracles backed by `git`.
//!
//! Two independent per-file views: who last touched each line (blame) and which lines differ
//! from `HEAD` (zero-context diff). Both are memoized per run in [`OracleCache`]. A failed query
//! never turns into "pass": an unavailable author map owns no lines and an unavailable diff
//! marks no lines as uncommitted.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use dashmap::DashMap;
use regex::Regex;
use tracing::{debug, warn};

/// Author git reports for working-tree lines that are not committed yet.
pub const NOT_COMMITTED_AUTHOR: &str = "not.committed.yet";

/// Raw access to version-control queries. Implementations return the tool's text output.
pub trait VcsQuery: Send + Sync {
    fn blame(&self, file: &Path) -> Result<String>;
    fn diff(&self, file: &Path) -> Result<String>;
    fn is_tracked(&self, file: &Path) -> Result<bool>;
    fn is_work_tree(&self, dir: &Path) -> bool;
    fn user_email(&self, dir: &Path) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    fn run(&self, dir: &Path, args: &[&str]) -> Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .with_context(|| format!("failed to run git {}", args.join(" ")))
    }

    fn run_ok(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let output = self.run(dir, args)?;
        if !output.status.success() {
            anyhow::bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Directory repository-wide queries run from; a file path uses its parent.
pub fn query_dir(path: &Path) -> &Path {
    if path.is_file() {
        path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."))
    } else {
        path
    }
}

fn split_file(file: &Path) -> Result<(&Path, &str)> {
    let dir = file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("unsupported file name {}", file.display()))?;
    Ok((dir, name))
}

impl VcsQuery for GitCli {
    fn blame(&self, file: &Path) -> Result<String> {
        let (dir, name) = split_file(file)?;
        self.run_ok(dir, &["blame", "--line-porcelain", "--", name])
    }

    fn diff(&self, file: &Path) -> Result<String> {
        let (dir, name) = split_file(file)?;
        self.run_ok(dir, &["diff", "--no-color", "--no-ext-diff", "-U0", "HEAD", "--", name])
    }

    fn is_tracked(&self, file: &Path) -> Result<bool> {
        let (dir, name) = split_file(file)?;
        let output = self.run(dir, &["ls-files", "--error-unmatch", "--", name])?;
        // Exit code 1 is "not tracked"; anything else (128 outside a repository) is a failure.
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => anyhow::bail!(
                "git ls-files failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }

    fn is_work_tree(&self, dir: &Path) -> bool {
        self.run_ok(query_dir(dir), &["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.trim() == "true")
            .unwrap_or(false)
    }

    fn user_email(&self, dir: &Path) -> Option<String> {
        self.run_ok(query_dir(dir), &["config", "user.email"])
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// line -> author for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAuthors {
    /// The file was never committed; every line belongs to whoever is running the sweep.
    Untracked,
    Known(HashMap<usize, String>),
    Unavailable,
}

impl LineAuthors {
    pub fn is_authored_by(&self, line: usize, user: &str) -> bool {
        match self {
            Self::Untracked => true,
            Self::Unavailable => false,
            Self::Known(map) => match map.get(&line) {
                Some(author) => author == NOT_COMMITTED_AUTHOR || *author == normalize_email(user),
                None => false,
            },
        }
    }
}

/// Lines that differ from `HEAD` for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UncommittedLines {
    All,
    None,
    Lines(BTreeSet<usize>),
    Unavailable,
}

impl UncommittedLines {
    pub fn contains(&self, line: usize) -> bool {
        match self {
            Self::All => true,
            Self::None | Self::Unavailable => false,
            Self::Lines(lines) => lines.contains(&line),
        }
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_ascii_lowercase()
}

/// Parses `git blame --porcelain` / `--line-porcelain` output into line -> author e-mail.
///
/// Each group starts with `<sha> <orig-line> <final-line> [<count>]`; the author appears in a
/// later `author-mail` line, but only the first time a commit shows up in plain porcelain mode.
pub fn parse_blame_porcelain(text: &str) -> HashMap<usize, String> {
    let mut authors = HashMap::new();
    let mut by_commit: HashMap<&str, String> = HashMap::new();
    let mut current: Option<(&str, usize)> = None;

    for line in text.lines() {
        if line.starts_with('\t') {
            continue;
        }
        if let Some(mail) = line.strip_prefix("author-mail ") {
            if let Some((sha, final_line)) = current {
                let email = normalize_email(mail);
                by_commit.insert(sha, email.clone());
                authors.insert(final_line, email);
            }
            continue;
        }
        if let Some((sha, final_line)) = parse_blame_header(line) {
            current = Some((sha, final_line));
            if let Some(email) = by_commit.get(sha) {
                authors.insert(final_line, email.clone());
            }
        }
    }

    authors
}

fn parse_blame_header(line: &str) -> Option<(&str, usize)> {
    let mut parts = line.split(' ');
    let sha = parts.next()?;
    if sha.len() < 40 || !sha.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    parts.next()?.parse::<usize>().ok()?;
    let final_line = parts.next()?.parse::<usize>().ok()?;
    Some((sha, final_line))
}

fn hunk_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").expect("regex"))
}

/// Collects new-side line numbers covered by the hunks of a zero-context unified diff.
pub fn parse_diff_hunks(text: &str) -> BTreeSet<usize> {
    let mut lines = BTreeSet::new();
    for cap in text.lines().filter_map(|l| hunk_header_re().captures(l)) {
        let Ok(start) = cap[1].parse::<usize>() else {
            continue;
        };
        let count = cap
            .get(2)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(1);
        lines.extend(start..start + count);
    }
    lines
}

pub fn load_authors(vcs: &dyn VcsQuery, file: &Path) -> LineAuthors {
    match vcs.is_tracked(file) {
        Ok(false) => LineAuthors::Untracked,
        Ok(true) => match vcs.blame(file) {
            Ok(text) => LineAuthors::Known(parse_blame_porcelain(&text)),
            Err(err) => {
                warn!(file = %file.display(), error = %err, "blame unavailable");
                LineAuthors::Unavailable
            }
        },
        Err(err) => {
            warn!(file = %file.display(), error = %err, "tracked-file check failed");
            LineAuthors::Unavailable
        }
    }
}

pub fn load_uncommitted(vcs: &dyn VcsQuery, file: &Path) -> UncommittedLines {
    match vcs.diff(file) {
        Ok(text) if !text.trim().is_empty() => UncommittedLines::Lines(parse_diff_hunks(&text)),
        Ok(_) => match vcs.is_tracked(file) {
            Ok(true) => UncommittedLines::None,
            Ok(false) => UncommittedLines::All,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "tracked-file check failed");
                UncommittedLines::Unavailable
            }
        },
        Err(err) => {
            warn!(file = %file.display(), error = %err, "diff unavailable");
            UncommittedLines::Unavailable
        }
    }
}

/// Run-scoped memo of both oracles, keyed by absolute path.
#[derive(Debug, Default)]
pub struct OracleCache {
    authors: DashMap<PathBuf, Arc<LineAuthors>>,
    uncommitted: DashMap<PathBuf, Arc<UncommittedLines>>,
}

impl OracleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authors(&self, vcs: &dyn VcsQuery, file: &Path) -> Arc<LineAuthors> {
        let key = cache_key(file);
        if let Some(hit) = self.authors.get(&key) {
            return Arc::clone(hit.value());
        }
        debug!(file = %key.display(), "loading blame");
        let loaded = Arc::new(load_authors(vcs, &key));
        Arc::clone(self.authors.entry(key).or_insert(loaded).value())
    }

    pub fn uncommitted(&self, vcs: &dyn VcsQuery, file: &Path) -> Arc<UncommittedLines> {
        let key = cache_key(file);
        if let Some(hit) = self.uncommitted.get(&key) {
            return Arc::clone(hit.value());
        }
        debug!(file = %key.display(), "loading diff");
        let loaded = Arc::new(load_uncommitted(vcs, &key));
        Arc::clone(self.uncommitted.entry(key).or_insert(loaded).value())
    }
}

fn cache_key(file: &Path) -> PathBuf {
    std::fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf())
}
