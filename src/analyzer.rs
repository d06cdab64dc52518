use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::classify::collect_call_sites;
use crate::config::EffectiveConfig;
use crate::error::SweepError;
use crate::model::{CallSite, RemovalOutcome, RemovalSelection, RemoveSummary};
use crate::planner::{sweep_source, History};
use crate::vcs::{OracleCache, VcsQuery};

#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub extensions: Vec<String>,
    pub max_workers: Option<usize>,
}

impl AnalyzerOptions {
    pub fn from_config(cfg: EffectiveConfig) -> Self {
        Self {
            include: cfg.include,
            exclude: cfg.exclude,
            extensions: cfg.extensions,
            max_workers: cfg.max_workers,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileScan {
    pub path: PathBuf,
    pub sites: Vec<CallSite>,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: Vec<FileScan>,
    pub parse_failures: Vec<(PathBuf, String)>,
}

impl ScanResult {
    pub fn total_sites(&self) -> usize {
        self.files.iter().map(|f| f.sites.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct Analyzer {
    opts: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(opts: AnalyzerOptions) -> Self {
        Self { opts }
    }

    pub fn collect_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        collect_source_files(root, &self.opts)
    }

    /// Parses and classifies every candidate file. Unparsable files are listed, not fatal.
    pub fn scan(&self, root: &Path) -> Result<ScanResult> {
        let files = self.collect_files(root)?;
        let pool = self.worker_pool()?;

        let results: Vec<(PathBuf, Result<Vec<CallSite>, String>)> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let sites = fs::read_to_string(file)
                        .map_err(|source| SweepError::Io { path: file.clone(), source })
                        .and_then(|content| collect_call_sites(file, &content))
                        .map_err(|e| failure_message(&e));
                    (file.clone(), sites)
                })
                .collect()
        });

        let mut out = ScanResult::default();
        for (path, sites) in results {
            match sites {
                Ok(sites) => out.files.push(FileScan { path, sites }),
                Err(message) => {
                    warn!(file = %path.display(), %message, "skipping file");
                    out.parse_failures.push((path, message));
                }
            }
        }
        info!(files = out.files.len(), sites = out.total_sites(), "scan finished");
        Ok(out)
    }

    /// Plans (and with `fix && yes`, writes) removals for every candidate file under `root`.
    pub fn remove(
        &self,
        root: &Path,
        selection: &RemovalSelection,
        vcs: &dyn VcsQuery,
        fix: bool,
        yes: bool,
    ) -> Result<RemoveSummary> {
        if selection.needs_history() && !vcs.is_work_tree(root) {
            return Err(SweepError::NotARepository(root.to_path_buf()).into());
        }

        let files = self.collect_files(root)?;
        let pool = self.worker_pool()?;
        let cache = OracleCache::new();
        let history = History { vcs, cache: &cache };

        let outcomes: Vec<(PathBuf, Result<RemovalOutcome, SweepError>)> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let outcome = fs::read_to_string(file)
                        .map_err(|source| SweepError::Io { path: file.clone(), source })
                        .and_then(|content| sweep_source(file, &content, selection, Some(history)));
                    (file.clone(), outcome)
                })
                .collect()
        });

        let apply = fix && yes;
        if fix && !yes {
            eprintln!("Refusing to mutate without --yes in non-interactive mode");
        }

        let mut summary = RemoveSummary {
            files_scanned: files.len(),
            dry_run: !apply,
            ..RemoveSummary::default()
        };

        for (path, outcome) in outcomes {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    let message = failure_message(&err);
                    warn!(file = %path.display(), %message, "skipping file");
                    summary.parse_failures.push((path, message));
                    continue;
                }
            };

            summary.found += outcome.found;
            summary.removed += outcome.removed;
            summary.skipped.merge(&outcome.skipped);

            let Some(text) = outcome.changed_text else {
                continue;
            };
            summary.files_changed += 1;
            if !apply {
                continue;
            }
            if let Err(source) = fs::write(&path, text) {
                let err = SweepError::Write { path: path.clone(), source };
                let message = failure_message(&err);
                warn!(file = %path.display(), %message, "write failed");
                summary.write_failures.push((path, message));
            } else {
                debug!(file = %path.display(), removed = outcome.removed, "rewrote file");
            }
        }

        info!(
            files = summary.files_scanned,
            changed = summary.files_changed,
            removed = summary.removed,
            dry_run = summary.dry_run,
            "remove finished"
        );
        Ok(summary)
    }

    fn worker_pool(&self) -> Result<rayon::ThreadPool> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = self.opts.max_workers {
            builder = builder.num_threads(n.max(1));
        }
        builder.build().context("failed to build worker pool")
    }
}

fn failure_message(err: &SweepError) -> String {
    match err {
        SweepError::Parse { message, .. } => message.clone(),
        other => match std::error::Error::source(other) {
            Some(source) => format!("{other}: {source}"),
            None => other.to_string(),
        },
    }
}

fn collect_source_files(root: &Path, opts: &AnalyzerOptions) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&opts.include)?;
    let exclude_set = build_globset(&opts.exclude)?;

    let mut out = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for ent in walker.filter_map(Result::ok) {
        if !ent.file_type().is_file() {
            continue;
        }
        let path = ent.path().to_path_buf();
        // A file root matches globs by its own name.
        let rel = path
            .strip_prefix(root)
            .ok()
            .filter(|r| !r.as_os_str().is_empty())
            .or_else(|| path.file_name().map(Path::new))
            .unwrap_or(&path);

        let rel_s = rel.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(rel_s.as_str()) {
            continue;
        }

        if !has_allowed_ext(&path, &opts.extensions) {
            continue;
        }

        if opts.include.is_empty() || include_set.is_match(rel_s.as_str()) {
            out.push(path);
        }
    }

    out.sort();
    Ok(out)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        b.add(Glob::new(p).with_context(|| format!("invalid glob: {p}"))?);
    }
    b.build().context("failed to build glob set")
}

fn has_allowed_ext(path: &Path, allowed: &[String]) -> bool {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
    allowed.iter().any(|e| e == ext)
}
