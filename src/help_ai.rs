use serde::Serialize;

/// Compact help for machine consumers; single-letter keys keep it short.
#[derive(Debug, Serialize)]
pub struct HelpSchema {
    pub n: String,
    pub d: String,
    pub u: String,
    pub s: Vec<Sub>,
    pub f: Vec<Flag>,
    pub e: Vec<String>,
    pub x: Vec<ExitCode>,
}

#[derive(Debug, Serialize)]
pub struct Sub {
    pub name: String,
    pub desc: String,
}

#[derive(Debug, Serialize)]
pub struct Flag {
    pub name: String,
    pub short: Option<String>,
    pub r#type: String,
    pub default: Option<String>,
    pub required: bool,
    pub r#enum: Option<Vec<String>>,
    pub desc: String,
}

#[derive(Debug, Serialize)]
pub struct ExitCode {
    pub code: i32,
    pub meaning: String,
}

impl Flag {
    fn new(name: &str, r#type: &str, desc: &str) -> Self {
        Self {
            name: name.into(),
            short: None,
            r#type: r#type.into(),
            default: None,
            required: false,
            r#enum: None,
            desc: desc.into(),
        }
    }

    fn default_value(mut self, v: &str) -> Self {
        self.default = Some(v.into());
        self
    }

    fn one_of(mut self, values: &[&str]) -> Self {
        self.r#enum = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

pub fn schema_for(subcommand: Option<&str>) -> HelpSchema {
    match subcommand {
        Some("scan") => scan_schema(),
        Some("list") => list_schema(),
        Some("remove") => remove_schema(),
        _ => root_schema(),
    }
}

fn root_schema() -> HelpSchema {
    HelpSchema {
        n: "console-sweep".to_string(),
        d: "Find and safely remove console calls from JS/TS sources".to_string(),
        u: "console-sweep [GLOBAL OPTIONS] <COMMAND> [ARGS]".to_string(),
        s: vec![
            Sub { name: "scan".into(), desc: "Scan sources and report console calls.".into() },
            Sub { name: "list".into(), desc: "List console calls (human mode by default).".into() },
            Sub { name: "remove".into(), desc: "Remove eligible console calls.".into() },
            Sub { name: "help".into(), desc: "Show command help.".into() },
        ],
        f: global_flags(),
        e: vec![
            "console-sweep scan".into(),
            "console-sweep scan . --report console-report.json".into(),
            "console-sweep remove . --methods log,debug --fix --yes".into(),
        ],
        x: exit_codes(),
    }
}

fn scan_schema() -> HelpSchema {
    let mut flags = global_flags();
    flags.push(Flag::new("report", "path", "Write the JSON report to this file."));
    HelpSchema {
        n: "scan".to_string(),
        d: "Scan sources and report console calls.".to_string(),
        u: "console-sweep scan [path] [--report <file>] [GLOBAL OPTIONS]".to_string(),
        s: vec![],
        f: flags,
        e: vec!["console-sweep scan .".into(), "console-sweep scan . --fail-on-findings".into()],
        x: exit_codes(),
    }
}

fn list_schema() -> HelpSchema {
    HelpSchema {
        n: "list".to_string(),
        d: "List console calls (human mode by default).".to_string(),
        u: "console-sweep list [path] [GLOBAL OPTIONS]".to_string(),
        s: vec![],
        f: global_flags(),
        e: vec!["console-sweep list src".into()],
        x: exit_codes(),
    }
}

fn remove_schema() -> HelpSchema {
    let mut flags = global_flags();
    flags.extend([
        Flag::new("methods", "string[]", "Console methods to remove (comma separated).")
            .default_value("log,debug,info,trace"),
        Flag::new("side-effects", "string", "What to do with calls whose arguments look effectful.")
            .default_value("skip")
            .one_of(&["skip", "remove-anyway"]),
        Flag::new("mine", "bool", "Only remove calls on lines you authored (git blame).").default_value("false"),
        Flag::new("author", "string", "Author e-mail for --mine instead of git user.email."),
        Flag::new("uncommitted", "bool", "Only remove calls on lines changed since HEAD.").default_value("false"),
        Flag::new("fix", "bool", "Apply removal changes to disk.").default_value("false"),
        Flag::new("yes", "bool", "Skip interactive confirmation.").default_value("false"),
        Flag::new("report", "path", "Write the JSON report of found calls to this file."),
    ]);

    HelpSchema {
        n: "remove".to_string(),
        d: "Remove eligible console calls.".to_string(),
        u: "console-sweep remove [path] [GLOBAL OPTIONS] [--methods <m,..>] [--mine] [--uncommitted] [--fix] [--yes]"
            .to_string(),
        s: vec![],
        f: flags,
        e: vec![
            "console-sweep remove .".into(),
            "console-sweep remove . --mine --uncommitted --fix --yes".into(),
        ],
        x: exit_codes(),
    }
}

fn global_flags() -> Vec<Flag> {
    vec![
        Flag::new("config", "path", "Path to config file."),
        Flag::new("format", "string", "Output format.")
            .default_value("human")
            .one_of(&["human", "ai"]),
        Flag::new("color", "string", "Color policy.")
            .default_value("auto")
            .one_of(&["auto", "always", "never"]),
        Flag::new("include", "glob[]", "Include glob(s).").default_value("**/*"),
        Flag::new("exclude", "glob[]", "Exclude glob(s)."),
        Flag::new("max-workers", "int", "Maximum worker threads."),
        Flag::new("fail-on-findings", "bool", "Exit non-zero when console calls remain.").default_value("false"),
    ]
}

fn exit_codes() -> Vec<ExitCode> {
    vec![
        ExitCode { code: 0, meaning: "Success".into() },
        ExitCode { code: 1, meaning: "Console calls remain with --fail-on-findings, or runtime error".into() },
        ExitCode { code: 2, meaning: "Invalid CLI usage".into() },
    ]
}

#[cfg(test)]
mod tests {
    use super::schema_for;

    #[test]
    fn help_ai_deterministic_order() {
        let json = serde_json::to_string(&schema_for(None)).expect("serialize");
        let idx_n = json.find("\"n\"").expect("n");
        let idx_d = json.find("\"d\"").expect("d");
        let idx_u = json.find("\"u\"").expect("u");
        assert!(idx_n < idx_d && idx_d < idx_u);
    }

    #[test]
    fn remove_schema_lists_history_flags() {
        let json = serde_json::to_string(&schema_for(Some("remove"))).expect("serialize");
        assert!(json.contains("\"n\":\"remove\""));
        assert!(json.contains("\"name\":\"uncommitted\""));
        assert!(json.contains("remove-anyway"));
        assert!(!json.contains("\u{001b}"));
    }
}
