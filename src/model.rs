use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{SweepError, SweepResult};

/// The identifier whose method calls are swept.
pub const RECEIVER: &str = "console";

/// Methods recognized on the receiver. Anything else (including dynamic keys) is ignored.
pub const CONSOLE_METHODS: &[&str] = &[
    "assert",
    "clear",
    "count",
    "countReset",
    "debug",
    "dir",
    "dirxml",
    "error",
    "group",
    "groupCollapsed",
    "groupEnd",
    "info",
    "log",
    "profile",
    "profileEnd",
    "table",
    "time",
    "timeEnd",
    "timeLog",
    "timeStamp",
    "trace",
    "warn",
];

pub const DEFAULT_METHODS: &[&str] = &["log", "debug", "info", "trace"];

pub fn is_console_method(name: &str) -> bool {
    CONSOLE_METHODS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Ai,
}

/// Byte offsets into the original source, half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextSpan {
    pub start: u32,
    pub end: u32,
}

impl TextSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, other: TextSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// The call is the whole expression statement `statement`. `in_list` is false when the
    /// statement is the sole body of a control-flow construct (`if (x) console.log(1);`).
    Statement { statement: TextSpan, in_list: bool },
    Expression,
}

/// One recognized `console.<method>(..)` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub method: String,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub is_global_receiver: bool,
    pub has_side_effects: bool,
    pub position: Position,
    pub span: TextSpan,
    pub snippet: String,
}

impl CallSite {
    pub fn is_statement_position(&self) -> bool {
        matches!(self.position, Position::Statement { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SideEffectPolicy {
    #[default]
    Skip,
    RemoveAnyway,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalSelection {
    pub methods: BTreeSet<String>,
    pub side_effects: SideEffectPolicy,
    /// When set, only lines authored by this identity are eligible.
    pub author: Option<String>,
    pub uncommitted_only: bool,
}

impl RemovalSelection {
    pub fn new<I, S>(methods: I) -> SweepResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for m in methods {
            let m = m.into();
            if !is_console_method(&m) {
                return Err(SweepError::UnknownMethod(m));
            }
            set.insert(m);
        }
        Ok(Self {
            methods: set,
            side_effects: SideEffectPolicy::Skip,
            author: None,
            uncommitted_only: false,
        })
    }

    pub fn with_side_effects(mut self, policy: SideEffectPolicy) -> Self {
        self.side_effects = policy;
        self
    }

    pub fn with_author(mut self, email: impl Into<String>) -> Self {
        self.author = Some(email.into());
        self
    }

    pub fn with_uncommitted_only(mut self, on: bool) -> Self {
        self.uncommitted_only = on;
        self
    }

    pub fn skips_side_effects(&self) -> bool {
        self.side_effects == SideEffectPolicy::Skip
    }

    pub fn needs_history(&self) -> bool {
        self.author.is_some() || self.uncommitted_only
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Shadowed,
    MethodNotSelected,
    SideEffect,
    NotMine,
    Committed,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shadowed => "shadowed",
            Self::MethodNotSelected => "method_not_selected",
            Self::SideEffect => "side_effect",
            Self::NotMine => "filtered_by_author",
            Self::Committed => "filtered_by_commit_status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Eligible,
    /// Not eligible on its own, but inside the text of an eligible call and removed with it.
    Subsumed,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub method_not_selected: usize,
    pub shadowed: usize,
    pub side_effect: usize,
    pub filtered_by_author: usize,
    pub filtered_by_commit_status: usize,
}

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::MethodNotSelected => self.method_not_selected += 1,
            SkipReason::Shadowed => self.shadowed += 1,
            SkipReason::SideEffect => self.side_effect += 1,
            SkipReason::NotMine => self.filtered_by_author += 1,
            SkipReason::Committed => self.filtered_by_commit_status += 1,
        }
    }

    pub fn get(&self, reason: SkipReason) -> usize {
        match reason {
            SkipReason::MethodNotSelected => self.method_not_selected,
            SkipReason::Shadowed => self.shadowed,
            SkipReason::SideEffect => self.side_effect,
            SkipReason::NotMine => self.filtered_by_author,
            SkipReason::Committed => self.filtered_by_commit_status,
        }
    }

    pub fn merge(&mut self, other: &SkipCounts) {
        self.method_not_selected += other.method_not_selected;
        self.shadowed += other.shadowed;
        self.side_effect += other.side_effect;
        self.filtered_by_author += other.filtered_by_author;
        self.filtered_by_commit_status += other.filtered_by_commit_status;
    }

    pub fn total(&self) -> usize {
        self.method_not_selected
            + self.shadowed
            + self.side_effect
            + self.filtered_by_author
            + self.filtered_by_commit_status
    }
}

/// Result of sweeping one file. `changed_text` is `None` when nothing was removed.
#[derive(Debug, Clone)]
pub struct RemovalOutcome {
    pub path: PathBuf,
    pub changed_text: Option<String>,
    pub found: usize,
    pub removed: usize,
    pub skipped: SkipCounts,
}

#[derive(Debug, Clone, Default)]
pub struct RemoveSummary {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub found: usize,
    pub removed: usize,
    pub skipped: SkipCounts,
    pub parse_failures: Vec<(PathBuf, String)>,
    pub write_failures: Vec<(PathBuf, String)>,
    pub dry_run: bool,
}
