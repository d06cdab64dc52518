pub mod analyzer;
pub mod classify;
pub mod color;
pub mod config;
pub mod error;
pub mod help_ai;
pub mod model;
pub mod output;
pub mod parser;
pub mod planner;
pub mod regenerate;
pub mod report;
pub mod side_effects;
pub mod vcs;

use std::env;
use std::path::{Path, PathBuf};

use analyzer::{Analyzer, AnalyzerOptions, ScanResult};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use color::ColorPolicy;
use config::EffectiveConfig;
use error::SweepError;
use model::{OutputFormat, RemovalSelection, SideEffectPolicy};
use report::Report;
use vcs::{GitCli, VcsQuery};

#[derive(Debug, clap::Parser)]
#[command(
    name = "console-sweep",
    version,
    about = "Find and safely remove console calls from JS/TS sources",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    #[arg(long, value_enum, global = true)]
    pub color: Option<ColorPolicy>,

    #[arg(long, global = true)]
    pub include: Vec<String>,

    #[arg(long, global = true)]
    pub exclude: Vec<String>,

    #[arg(long, global = true)]
    pub max_workers: Option<usize>,

    #[arg(long, global = true, default_value_t = false)]
    pub fail_on_findings: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Scan sources and report console calls.
    Scan {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Write the JSON report to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List console calls (human mode by default).
    List {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Remove eligible console calls.
    Remove {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Console methods to remove.
        #[arg(long, value_delimiter = ',')]
        methods: Vec<String>,
        /// What to do with calls whose arguments look effectful.
        #[arg(long, value_enum)]
        side_effects: Option<SideEffectPolicy>,
        /// Only remove calls on lines you authored.
        #[arg(long, default_value_t = false)]
        mine: bool,
        /// Author e-mail used by --mine instead of git user.email.
        #[arg(long)]
        author: Option<String>,
        /// Only remove calls on lines changed since HEAD.
        #[arg(long, default_value_t = false)]
        uncommitted: bool,
        #[arg(long, default_value_t = false)]
        fix: bool,
        #[arg(long, default_value_t = false)]
        yes: bool,
        /// Write the JSON report of found calls to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Show command help.
    Help {
        command: Option<String>,
    },
}

pub mod logging {
    use tracing_subscriber::EnvFilter;

    pub const LOG_ENV: &str = "CONSOLE_SWEEP_LOG";

    /// Logs go to stderr so stdout stays parseable in `--format ai`.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

pub fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if let Some(json) = maybe_emit_ai_help(&args)? {
        println!("{json}");
        return Ok(());
    }

    let cli = Cli::parse();

    if let Some(Command::Help { command }) = &cli.command {
        if let Some(name) = command {
            let mut cmd = Cli::command();
            if let Some(sc) = cmd.find_subcommand_mut(name) {
                sc.print_help().context("failed to print help")?;
                println!();
                return Ok(());
            }
        }
        Cli::command().print_help().context("failed to print help")?;
        println!();
        return Ok(());
    }

    let cfg = EffectiveConfig::load(&cli)?;
    let command = cli.command.unwrap_or(Command::Scan {
        path: PathBuf::from("."),
        report: None,
    });
    let analyzer = Analyzer::new(AnalyzerOptions::from_config(cfg.clone()));

    match command {
        Command::Scan { path, report } => run_scan(&analyzer, &path, &cfg, report.as_deref(), cli.fail_on_findings),
        Command::List { path } => run_scan(&analyzer, &path, &cfg, None, cli.fail_on_findings),
        Command::Remove {
            path,
            methods,
            side_effects,
            mine,
            author,
            uncommitted,
            fix,
            yes,
            report,
        } => {
            let vcs = GitCli;
            let request = SelectionRequest {
                methods,
                side_effects,
                mine,
                author,
                uncommitted,
            };
            let selection = request.resolve(&cfg, &path, &vcs)?;
            run_remove(&analyzer, &path, &cfg, &selection, &vcs, fix, yes, report.as_deref(), cli.fail_on_findings)
        }
        Command::Help { .. } => unreachable!(),
    }
}

/// Removal options as given on the command line, before config defaults and identity lookup.
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    pub methods: Vec<String>,
    pub side_effects: Option<SideEffectPolicy>,
    pub mine: bool,
    pub author: Option<String>,
    pub uncommitted: bool,
}

impl SelectionRequest {
    pub fn resolve(self, cfg: &EffectiveConfig, root: &Path, vcs: &dyn VcsQuery) -> Result<RemovalSelection> {
        let methods = if self.methods.is_empty() {
            cfg.methods.clone()
        } else {
            self.methods
        };
        let mut selection = RemovalSelection::new(methods.iter().map(|m| m.trim().to_string()))?
            .with_side_effects(self.side_effects.unwrap_or(cfg.side_effects))
            .with_uncommitted_only(self.uncommitted);

        if self.mine || self.author.is_some() {
            let identity = match self.author {
                Some(author) => author,
                None => vcs.user_email(root).ok_or(SweepError::MissingIdentity)?,
            };
            selection = selection.with_author(identity);
        }
        Ok(selection)
    }
}

fn run_scan(
    analyzer: &Analyzer,
    path: &Path,
    cfg: &EffectiveConfig,
    report: Option<&Path>,
    fail_on_findings: bool,
) -> Result<()> {
    let result = analyzer.scan(path)?;
    output::print_scan(&result, cfg)?;
    if let Some(report) = report {
        Report::from_scan(&result).write_json(report)?;
    }
    maybe_fail(&result, fail_on_findings)
}

#[allow(clippy::too_many_arguments)]
fn run_remove(
    analyzer: &Analyzer,
    path: &Path,
    cfg: &EffectiveConfig,
    selection: &RemovalSelection,
    vcs: &dyn VcsQuery,
    fix: bool,
    yes: bool,
    report: Option<&Path>,
    fail_on_findings: bool,
) -> Result<()> {
    if let Some(report) = report {
        let result = analyzer.scan(path)?;
        Report::from_scan(&result).write_json(report)?;
    }
    let summary = analyzer.remove(path, selection, vcs, fix, yes)?;
    output::print_remove_summary(&summary, cfg)?;
    if fail_on_findings && summary.found > summary.removed {
        anyhow::bail!("console calls remain and --fail-on-findings set");
    }
    Ok(())
}

fn maybe_fail(result: &ScanResult, fail_on_findings: bool) -> Result<()> {
    if fail_on_findings && result.total_sites() > 0 {
        anyhow::bail!("console calls present and --fail-on-findings set");
    }
    Ok(())
}

fn maybe_emit_ai_help(args: &[String]) -> Result<Option<String>> {
    let has_help = args.iter().any(|a| a == "--help" || a == "help");
    let format_ai = args
        .windows(2)
        .any(|w| w[0] == "--format" && w[1] == "ai")
        || args.iter().any(|a| a == "--format=ai");

    if !has_help || !format_ai {
        return Ok(None);
    }

    let sub = args
        .iter()
        .skip(1)
        .find(|a| matches!(a.as_str(), "scan" | "list" | "remove"))
        .map(String::as_str);
    let schema = help_ai::schema_for(sub);
    Ok(Some(serde_json::to_string(&schema)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::tests::FakeVcs;

    fn cfg() -> EffectiveConfig {
        EffectiveConfig {
            include: vec![],
            exclude: vec![],
            extensions: vec!["js".into()],
            methods: vec!["log".into()],
            side_effects: SideEffectPolicy::Skip,
            max_workers: None,
            format: OutputFormat::Human,
            color: ColorPolicy::Never,
        }
    }

    #[test]
    fn help_ai_detects_root() {
        let args = vec![
            "console-sweep".to_string(),
            "--help".to_string(),
            "--format".to_string(),
            "ai".to_string(),
        ];
        let out = maybe_emit_ai_help(&args).expect("ok").expect("some");
        assert!(out.contains("\"n\":\"console-sweep\""));
    }

    #[test]
    fn selection_falls_back_to_config_methods() {
        let vcs = FakeVcs::default();
        let selection = SelectionRequest::default()
            .resolve(&cfg(), Path::new("."), &vcs)
            .expect("selection");
        assert!(selection.methods.contains("log"));
        assert!(selection.author.is_none());
    }

    #[test]
    fn mine_uses_git_identity() {
        let vcs = FakeVcs {
            email: Some("me@example.com".into()),
            ..FakeVcs::default()
        };
        let request = SelectionRequest {
            mine: true,
            ..SelectionRequest::default()
        };
        let selection = request.resolve(&cfg(), Path::new("."), &vcs).expect("selection");
        assert_eq!(selection.author.as_deref(), Some("me@example.com"));
    }

    #[test]
    fn mine_without_identity_is_an_error() {
        let vcs = FakeVcs::default();
        let request = SelectionRequest {
            mine: true,
            ..SelectionRequest::default()
        };
        let err = request.resolve(&cfg(), Path::new("."), &vcs).expect_err("no identity");
        assert!(matches!(err.downcast_ref::<SweepError>(), Some(SweepError::MissingIdentity)));
    }

    #[test]
    fn unknown_method_is_rejected() {
        let vcs = FakeVcs::default();
        let request = SelectionRequest {
            methods: vec!["log".into(), "shout".into()],
            ..SelectionRequest::default()
        };
        assert!(request.resolve(&cfg(), Path::new("."), &vcs).is_err());
    }
}
