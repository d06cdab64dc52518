use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{SideEffectPolicy, DEFAULT_METHODS};
use crate::{color::ColorPolicy, model::OutputFormat, Cli};

pub const CONFIG_FILE: &str = "console-sweep.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    extensions: Option<Vec<String>>,
    methods: Option<Vec<String>>,
    side_effects: Option<SideEffectPolicy>,
    max_workers: Option<usize>,
    format: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub extensions: Vec<String>,
    pub methods: Vec<String>,
    pub side_effects: SideEffectPolicy,
    pub max_workers: Option<usize>,
    pub format: OutputFormat,
    pub color: ColorPolicy,
}

impl EffectiveConfig {
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = cli.config.clone().or_else(|| {
            let p = PathBuf::from(CONFIG_FILE);
            if p.exists() { Some(p) } else { None }
        });

        let fcfg = if let Some(path) = path {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed reading config {}", path.display()))?;
            toml::from_str::<FileConfig>(&raw)
                .with_context(|| format!("failed parsing config {}", path.display()))?
        } else {
            FileConfig::default()
        };

        Ok(Self::merge(cli, fcfg))
    }

    fn merge(cli: &Cli, fcfg: FileConfig) -> Self {
        let mut include = fcfg.include.unwrap_or_else(|| vec!["**/*".to_string()]);
        if !cli.include.is_empty() {
            include = cli.include.clone();
        }

        let mut exclude = fcfg.exclude.unwrap_or_else(default_excludes);
        if !cli.exclude.is_empty() {
            exclude = cli.exclude.clone();
        }

        let mut extensions = fcfg.extensions.unwrap_or_else(default_extensions);
        extensions.sort();
        extensions.dedup();

        let methods = fcfg
            .methods
            .unwrap_or_else(|| DEFAULT_METHODS.iter().map(|m| m.to_string()).collect());

        let format = cli
            .format
            .or_else(|| parse_format(fcfg.format.as_deref()))
            .unwrap_or(OutputFormat::Human);

        let color = cli
            .color
            .or_else(|| parse_color(fcfg.color.as_deref()))
            .unwrap_or(ColorPolicy::Auto);

        Self {
            include,
            exclude,
            extensions,
            methods,
            side_effects: fcfg.side_effects.unwrap_or_default(),
            max_workers: cli.max_workers.or(fcfg.max_workers),
            format,
            color,
        }
    }
}

fn parse_format(v: Option<&str>) -> Option<OutputFormat> {
    match v {
        Some("ai") => Some(OutputFormat::Ai),
        Some("human") => Some(OutputFormat::Human),
        _ => None,
    }
}

fn parse_color(v: Option<&str>) -> Option<ColorPolicy> {
    match v {
        Some("always") => Some(ColorPolicy::Always),
        Some("never") => Some(ColorPolicy::Never),
        Some("auto") => Some(ColorPolicy::Auto),
        _ => None,
    }
}

fn default_extensions() -> Vec<String> {
    ["js", "jsx", "ts", "tsx", "mjs", "cjs", "mts", "cts"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_excludes() -> Vec<String> {
    vec![
        "node_modules/**".to_string(),
        "dist/**".to_string(),
        "build/**".to_string(),
        "coverage/**".to_string(),
        ".next/**".to_string(),
        "out/**".to_string(),
        "**/*.d.ts".to_string(),
        "**/*.min.js".to_string(),
    ]
}
