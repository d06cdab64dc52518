use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::analyzer::ScanResult;
use crate::config::EffectiveConfig;
use crate::model::{OutputFormat, RemoveSummary, SkipReason};

const SKIP_REASONS: [SkipReason; 5] = [
    SkipReason::Shadowed,
    SkipReason::MethodNotSelected,
    SkipReason::SideEffect,
    SkipReason::NotMine,
    SkipReason::Committed,
];

pub fn print_scan(result: &ScanResult, cfg: &EffectiveConfig) -> Result<()> {
    match cfg.format {
        OutputFormat::Ai => print_ai_scan(result),
        OutputFormat::Human => print_human_scan(result, cfg.color.enabled()),
    }
}

pub fn print_remove_summary(summary: &RemoveSummary, cfg: &EffectiveConfig) -> Result<()> {
    if matches!(cfg.format, OutputFormat::Ai) {
        let mut skipped = serde_json::Map::new();
        for reason in SKIP_REASONS {
            skipped.insert(reason.as_str().to_string(), summary.skipped.get(reason).into());
        }
        let line = serde_json::json!({
            "files": summary.files_scanned,
            "changed": summary.files_changed,
            "found": summary.found,
            "removed": summary.removed,
            "skipped": skipped,
            "parse_failures": summary.parse_failures.len(),
            "write_failures": summary.write_failures.len(),
            "dry_run": summary.dry_run,
        });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    let color = cfg.color.enabled();
    print_failures("parse", &summary.parse_failures, color);
    print_failures("write", &summary.write_failures, color);

    let skipped = SKIP_REASONS
        .iter()
        .filter(|r| summary.skipped.get(**r) > 0)
        .map(|r| format!("{}={}", r.as_str(), summary.skipped.get(*r)))
        .collect::<Vec<_>>()
        .join(" ");
    let head = if color {
        "Remove summary".bold().cyan().to_string()
    } else {
        "Remove summary".to_string()
    };
    println!(
        "{} files={} changed={} found={} removed={} dry_run={}{}{}",
        head,
        summary.files_scanned,
        summary.files_changed,
        summary.found,
        summary.removed,
        summary.dry_run,
        if skipped.is_empty() { "" } else { " " },
        skipped
    );

    Ok(())
}

fn print_failures(kind: &str, failures: &[(PathBuf, String)], color: bool) {
    for (path, message) in failures {
        if color {
            eprintln!("{} {} {}", format!("[{kind} error]").red(), path.display(), message);
        } else {
            eprintln!("[{kind} error] {} {}", path.display(), message);
        }
    }
}

fn print_ai_scan(result: &ScanResult) -> Result<()> {
    for file in &result.files {
        for site in &file.sites {
            let obj = serde_json::json!({
                "f": file.path,
                "m": site.method,
                "l": site.start_line,
                "c": site.start_column,
                "el": site.end_line,
                "ec": site.end_column,
                "s": site.snippet,
                "fx": if site.has_side_effects {1} else {0},
                "g": if site.is_global_receiver {1} else {0},
            });
            println!("{}", serde_json::to_string(&obj)?);
        }
    }
    for (path, message) in &result.parse_failures {
        let obj = serde_json::json!({ "f": path, "err": message });
        println!("{}", serde_json::to_string(&obj)?);
    }
    Ok(())
}

fn print_human_scan(result: &ScanResult, color: bool) -> Result<()> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for file in &result.files {
        for site in &file.sites {
            *counts.entry(site.method.as_str()).or_default() += 1;

            let mut flags = Vec::new();
            if site.has_side_effects {
                flags.push("side-effects");
            }
            if !site.is_global_receiver {
                flags.push("shadowed");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            };

            if color {
                let location = format!("{}:{}:{}", file.path.display(), site.start_line, site.start_column);
                println!(
                    "{} {} {}{}",
                    format!("[{}]", site.method).yellow(),
                    location.blue(),
                    site.snippet.bright_white(),
                    flags.magenta()
                );
            } else {
                println!(
                    "[{}] {}:{}:{} {}{}",
                    site.method,
                    file.path.display(),
                    site.start_line,
                    site.start_column,
                    site.snippet,
                    flags
                );
            }
        }
    }
    print_failures("parse", &result.parse_failures, color);

    let total = result.total_sites();
    if total == 0 {
        if color {
            println!("{}", "No console calls found".green());
        } else {
            println!("No console calls found");
        }
        return Ok(());
    }

    let breakdown = counts
        .iter()
        .map(|(m, n)| format!("{m}={n}"))
        .collect::<Vec<_>>()
        .join(" ");
    let files = result.files.iter().filter(|f| !f.sites.is_empty()).count();
    if color {
        println!("{} {} files={} total={}", "Summary".bold().cyan(), breakdown, files, total);
    } else {
        println!("Summary {} files={} total={}", breakdown, files, total);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::FileScan;
    use crate::classify::collect_call_sites;
    use std::path::Path;

    fn cfg(format: OutputFormat) -> EffectiveConfig {
        EffectiveConfig {
            include: vec![],
            exclude: vec![],
            extensions: vec!["js".into()],
            methods: vec!["log".into()],
            side_effects: Default::default(),
            max_workers: None,
            format,
            color: crate::color::ColorPolicy::Never,
        }
    }

    #[test]
    fn human_and_ai_scan_print() {
        let result = ScanResult {
            files: vec![FileScan {
                path: "src/a.js".into(),
                sites: collect_call_sites(Path::new("a.js"), "console.log(i++);").expect("parse"),
            }],
            parse_failures: vec![("src/bad.js".into(), "unexpected token".into())],
        };
        print_scan(&result, &cfg(OutputFormat::Human)).expect("human");
        print_scan(&result, &cfg(OutputFormat::Ai)).expect("ai");
    }

    #[test]
    fn summary_prints_in_both_formats() {
        let mut summary = RemoveSummary {
            files_scanned: 2,
            removed: 1,
            dry_run: true,
            ..RemoveSummary::default()
        };
        summary.skipped.record(SkipReason::SideEffect);
        print_remove_summary(&summary, &cfg(OutputFormat::Human)).expect("human");
        print_remove_summary(&summary, &cfg(OutputFormat::Ai)).expect("ai");
    }
}
