use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::classify::collect_call_sites;
use crate::error::SweepResult;
use crate::model::{CallSite, Decision, RemovalOutcome, RemovalSelection, SkipCounts, SkipReason};
use crate::regenerate::{apply_edits, Edit};
use crate::vcs::{LineAuthors, OracleCache, UncommittedLines, VcsQuery};

/// History signals for one file. A `None` oracle means the signal is missing, which fails
/// the corresponding filter.
#[derive(Debug, Clone, Default)]
pub struct FileOracles {
    pub authors: Option<Arc<LineAuthors>>,
    pub uncommitted: Option<Arc<UncommittedLines>>,
}

/// Where history comes from during a run.
#[derive(Clone, Copy)]
pub struct History<'r> {
    pub vcs: &'r dyn VcsQuery,
    pub cache: &'r OracleCache,
}

impl History<'_> {
    pub fn oracles_for(&self, file: &Path, selection: &RemovalSelection) -> FileOracles {
        FileOracles {
            authors: selection
                .author
                .as_ref()
                .map(|_| self.cache.authors(self.vcs, file)),
            uncommitted: selection
                .uncommitted_only
                .then(|| self.cache.uncommitted(self.vcs, file)),
        }
    }
}

/// Assigns `Eligible` or the first failing skip reason. Shadowing is checked first and can
/// never be overridden.
pub fn decide(site: &CallSite, selection: &RemovalSelection, oracles: &FileOracles) -> Decision {
    if !site.is_global_receiver {
        return Decision::Skipped(SkipReason::Shadowed);
    }
    if !selection.methods.contains(&site.method) {
        return Decision::Skipped(SkipReason::MethodNotSelected);
    }
    if selection.skips_side_effects() && site.has_side_effects {
        return Decision::Skipped(SkipReason::SideEffect);
    }
    if let Some(user) = &selection.author {
        let mine = oracles
            .authors
            .as_deref()
            .is_some_and(|authors| authors.is_authored_by(site.start_line, user));
        if !mine {
            return Decision::Skipped(SkipReason::NotMine);
        }
    }
    if selection.uncommitted_only {
        let changed = oracles
            .uncommitted
            .as_deref()
            .is_some_and(|lines| lines.contains(site.start_line));
        if !changed {
            return Decision::Skipped(SkipReason::Committed);
        }
    }
    Decision::Eligible
}

/// Decisions for every site plus the edits for the eligible ones. Pure; nothing is applied.
#[derive(Debug, Clone)]
pub struct RemovalPlan {
    pub decisions: Vec<Decision>,
    pub edits: Vec<Edit>,
}

impl RemovalPlan {
    /// Sites that disappear from the text, including ones nested in a removed call.
    pub fn removed(&self) -> usize {
        self.decisions
            .iter()
            .filter(|d| !matches!(d, Decision::Skipped(_)))
            .count()
    }

    pub fn skip_counts(&self) -> SkipCounts {
        let mut counts = SkipCounts::default();
        for decision in &self.decisions {
            if let Decision::Skipped(reason) = decision {
                counts.record(*reason);
            }
        }
        counts
    }
}

pub fn plan(sites: &[CallSite], selection: &RemovalSelection, oracles: &FileOracles) -> RemovalPlan {
    let mut decisions: Vec<Decision> = sites
        .iter()
        .map(|site| decide(site, selection, oracles))
        .collect();
    let edits: Vec<Edit> = sites
        .iter()
        .zip(&decisions)
        .filter(|(_, d)| **d == Decision::Eligible)
        .map(|(site, _)| Edit::for_site(site))
        .collect();

    for (site, decision) in sites.iter().zip(decisions.iter_mut()) {
        if matches!(decision, Decision::Skipped(_)) && edits.iter().any(|e| e.span.contains(site.span)) {
            *decision = Decision::Subsumed;
        }
    }
    RemovalPlan { decisions, edits }
}

/// Sweeps one file's text: parse, classify, plan, regenerate.
///
/// History is only queried when a filter needs it and the file has a candidate that got past
/// the cheaper predicates.
pub fn sweep_source(
    path: &Path,
    source: &str,
    selection: &RemovalSelection,
    history: Option<History<'_>>,
) -> SweepResult<RemovalOutcome> {
    let sites = collect_call_sites(path, source)?;

    let has_candidates = sites
        .iter()
        .any(|s| s.is_global_receiver && selection.methods.contains(&s.method));
    let oracles = match history {
        Some(history) if selection.needs_history() && has_candidates => history.oracles_for(path, selection),
        _ => FileOracles::default(),
    };

    let plan = plan(&sites, selection, &oracles);
    let removed = plan.removed();
    debug!(file = %path.display(), found = sites.len(), removed, "planned");

    let changed_text = (removed > 0).then(|| apply_edits(source, &plan.edits));
    Ok(RemovalOutcome {
        path: path.to_path_buf(),
        changed_text,
        found: sites.len(),
        removed,
        skipped: plan.skip_counts(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};

    use crate::model::SideEffectPolicy;
    use crate::vcs::tests::{blame_fixture, FakeVcs};

    const ME: &str = "me@example.com";

    fn select(methods: &[&str]) -> RemovalSelection {
        RemovalSelection::new(methods.iter().copied()).expect("selection")
    }

    fn sweep(src: &str, selection: &RemovalSelection) -> RemovalOutcome {
        sweep_source(Path::new("a.js"), src, selection, None).expect("sweep")
    }

    #[test]
    fn statement_call_is_deleted() {
        let out = sweep(r#"foo(); console.log("hi"); bar();"#, &select(&["log"]));
        assert_eq!(out.changed_text.as_deref(), Some("foo(); bar();"));
        assert_eq!(out.removed, 1);
    }

    #[test]
    fn value_call_becomes_placeholder() {
        let out = sweep("const x = console.log(y);", &select(&["log"]));
        assert_eq!(out.changed_text.as_deref(), Some("const x = void 0;"));
        assert_eq!(out.removed, 1);
    }

    #[test]
    fn shadowed_receiver_is_kept() {
        let out = sweep("function f(){ const console = mock; console.log(1); }", &select(&["log"]));
        assert!(out.changed_text.is_none());
        assert_eq!(out.removed, 0);
        assert_eq!(out.skipped.shadowed, 1);
    }

    #[test]
    fn side_effect_skip_is_recorded() {
        let out = sweep("console.log(i++);", &select(&["log"]));
        assert!(out.changed_text.is_none());
        assert_eq!(out.skipped.get(SkipReason::SideEffect), 1);
    }

    #[test]
    fn remove_anyway_policy_removes_effectful_calls() {
        let selection = select(&["log"]).with_side_effects(SideEffectPolicy::RemoveAnyway);
        let out = sweep("console.log(i++);\nnext();", &selection);
        assert_eq!(out.changed_text.as_deref(), Some("next();"));
    }

    #[test]
    fn unselected_methods_are_kept() {
        let out = sweep("console.log(1);\nconsole.error(2);\n", &select(&["log"]));
        assert_eq!(out.changed_text.as_deref(), Some("console.error(2);\n"));
        assert_eq!(out.skipped.method_not_selected, 1);
    }

    #[test]
    fn shadowing_beats_every_other_predicate() {
        let src = "function f(console) { console.log(i++); }";
        let out = sweep(src, &select(&["log"]).with_side_effects(SideEffectPolicy::RemoveAnyway));
        assert_eq!(out.skipped.shadowed, 1);
        assert!(out.changed_text.is_none());
    }

    #[test]
    fn sweeping_twice_finds_nothing_more() {
        let src = "a();\nconsole.log(1);\nconst v = console.debug(2).x;\nif (c) console.log(3);\nconsole.log(console.debug(4));\n";
        let selection = select(&["log", "debug"]);
        let first = sweep(src, &selection);
        let text = first.changed_text.expect("changed");
        let second = sweep(&text, &selection);
        assert_eq!(second.removed, 0);
        assert!(second.changed_text.is_none());
        assert_eq!(text, "a();\nconst v = (void 0).x;\nif (c) ;\n");
    }

    #[test]
    fn nested_removed_call_counts_once_each() {
        let out = sweep("console.log(console.log(1));", &select(&["log"]));
        assert_eq!(out.removed, 2);
        assert_eq!(out.changed_text.as_deref(), Some(""));
    }

    #[test]
    fn calls_inside_a_removed_call_count_as_removed() {
        let out = sweep("console.log(console.error(x));\nnext();\n", &select(&["log"]));
        assert_eq!(out.changed_text.as_deref(), Some("next();\n"));
        assert_eq!(out.removed, 2);
        assert_eq!(out.skipped.total(), 0);

        let src = "console.log(() => { const console = m; console.log(1); });\n";
        let out = sweep(src, &select(&["log"]));
        assert_eq!(out.removed, 2);
        assert_eq!(out.skipped.shadowed, 0);
    }

    #[test]
    fn removal_does_not_join_neighbouring_statements() {
        let out = sweep("const a = b\nconsole.log(1);\n[1, 2].forEach(f)\n", &select(&["log"]));
        assert_eq!(out.changed_text.as_deref(), Some("const a = b\n;\n[1, 2].forEach(f)\n"));
        let again = sweep(out.changed_text.as_deref().expect("changed"), &select(&["log"]));
        assert_eq!(again.found, 0);
    }

    #[test]
    fn uncommitted_filter_uses_hunks() {
        let mut src = String::new();
        for i in 1..=14 {
            src.push_str(&format!("console.log({i});\n"));
        }
        let vcs = FakeVcs {
            diff: HashMap::from([("a.js".to_string(), "@@ -10,0 +12,3 @@\n".to_string())]),
            tracked: vec!["a.js".to_string()],
            ..FakeVcs::default()
        };
        let cache = OracleCache::new();
        let history = History { vcs: &vcs, cache: &cache };
        let selection = select(&["log"]).with_uncommitted_only(true);
        let out = sweep_source(Path::new("a.js"), &src, &selection, Some(history)).expect("sweep");
        assert_eq!(out.removed, 3);
        assert_eq!(out.skipped.filtered_by_commit_status, 11);
        let text = out.changed_text.expect("changed");
        assert!(text.contains("console.log(9);"));
        assert!(!text.contains("console.log(13);"));
    }

    #[test]
    fn author_filter_keeps_other_peoples_lines() {
        let blame = blame_fixture(&[
            ("1111111111111111111111111111111111111111", ME),
            ("2222222222222222222222222222222222222222", "other@example.com"),
        ]);
        let vcs = FakeVcs {
            blame: HashMap::from([("a.js".to_string(), blame)]),
            tracked: vec!["a.js".to_string()],
            ..FakeVcs::default()
        };
        let cache = OracleCache::new();
        let history = History { vcs: &vcs, cache: &cache };
        let selection = select(&["log"]).with_author(ME);
        let src = "console.log('mine');\nconsole.log('theirs');\n";
        let out = sweep_source(Path::new("a.js"), src, &selection, Some(history)).expect("sweep");
        assert_eq!(out.changed_text.as_deref(), Some("console.log('theirs');\n"));
        assert_eq!(out.skipped.filtered_by_author, 1);
    }

    #[test]
    fn missing_history_never_widens() {
        let selection = select(&["log"]).with_author(ME).with_uncommitted_only(true);
        let out = sweep("console.log(1);", &selection);
        assert_eq!(out.removed, 0);
        assert_eq!(out.skipped.filtered_by_author, 1);
    }

    #[test]
    fn untracked_file_passes_both_history_filters() {
        let vcs = FakeVcs {
            diff: HashMap::from([("a.js".to_string(), String::new())]),
            ..FakeVcs::default()
        };
        let cache = OracleCache::new();
        let history = History { vcs: &vcs, cache: &cache };
        let selection = select(&["log"]).with_author(ME).with_uncommitted_only(true);
        let out = sweep_source(Path::new("a.js"), "console.log(1);\n", &selection, Some(history)).expect("sweep");
        assert_eq!(out.removed, 1);
    }

    #[test]
    fn extra_filters_only_shrink_the_eligible_set() {
        let src = "console.log(1);\nconsole.log(i++);\nconsole.debug(2);\nfunction f(console) { console.log(3); }\n";
        let sites = collect_call_sites(Path::new("a.js"), src).expect("parse");
        let oracles = FileOracles {
            authors: Some(Arc::new(LineAuthors::Known(HashMap::from([(1, ME.to_string())])))),
            uncommitted: Some(Arc::new(UncommittedLines::Lines(BTreeSet::from([1, 2])))),
        };
        let base = select(&["log", "debug"]).with_side_effects(SideEffectPolicy::RemoveAnyway);
        let variants = [
            base.clone(),
            base.clone().with_side_effects(SideEffectPolicy::Skip),
            base.clone().with_author(ME),
            base.clone().with_uncommitted_only(true),
            base.clone().with_side_effects(SideEffectPolicy::Skip).with_author(ME).with_uncommitted_only(true),
        ];
        let eligible = |sel: &RemovalSelection| -> BTreeSet<usize> {
            plan(&sites, sel, &oracles)
                .decisions
                .iter()
                .enumerate()
                .filter(|(_, d)| **d == Decision::Eligible)
                .map(|(i, _)| i)
                .collect()
        };
        let all = eligible(&variants[0]);
        assert_eq!(all.len(), 3);
        for narrowed in &variants[1..] {
            assert!(eligible(narrowed).is_subset(&all));
        }
        assert_eq!(eligible(&variants[4]), BTreeSet::from([0]));
    }

    #[test]
    fn parse_failure_is_an_error() {
        let res = sweep_source(Path::new("a.js"), "console.log(", &select(&["log"]), None);
        assert!(res.is_err());
    }
}
