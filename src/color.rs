use clap::ValueEnum;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorPolicy {
    Auto,
    Always,
    Never,
}

impl ColorPolicy {
    pub fn enabled(self) -> bool {
        self.resolve(std::io::stdout().is_terminal(), |key| std::env::var(key).ok())
    }

    /// Decides whether to emit ANSI colors given TTY state and an environment lookup.
    /// Explicit `always`/`never` win; `auto` follows NO_COLOR, CLICOLOR, TERM, then the force
    /// variables, then the TTY.
    pub fn resolve(self, stdout_is_tty: bool, env: impl Fn(&str) -> Option<String>) -> bool {
        match self {
            Self::Always => return true,
            Self::Never => return false,
            Self::Auto => {}
        }

        let is = |key: &str, value: &str| env(key).as_deref() == Some(value);

        if env("NO_COLOR").is_some() || is("CLICOLOR", "0") || is("TERM", "dumb") {
            return false;
        }
        if is("CLICOLOR_FORCE", "1") || is("FORCE_COLOR", "1") {
            return true;
        }
        stdout_is_tty
    }
}

#[cfg(test)]
mod tests {
    use super::ColorPolicy;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn auto_follows_tty() {
        assert!(ColorPolicy::Auto.resolve(true, env(&[])));
        assert!(!ColorPolicy::Auto.resolve(false, env(&[])));
    }

    #[test]
    fn explicit_policies_ignore_environment() {
        assert!(!ColorPolicy::Never.resolve(true, env(&[("FORCE_COLOR", "1")])));
        assert!(ColorPolicy::Always.resolve(false, env(&[("NO_COLOR", "1")])));
    }

    #[test]
    fn disabling_variables_beat_tty() {
        assert!(!ColorPolicy::Auto.resolve(true, env(&[("NO_COLOR", "")])));
        assert!(!ColorPolicy::Auto.resolve(true, env(&[("CLICOLOR", "0")])));
        assert!(!ColorPolicy::Auto.resolve(true, env(&[("TERM", "dumb")])));
    }

    #[test]
    fn force_variables_beat_missing_tty() {
        assert!(ColorPolicy::Auto.resolve(false, env(&[("FORCE_COLOR", "1")])));
        assert!(ColorPolicy::Auto.resolve(false, env(&[("CLICOLOR_FORCE", "1")])));
    }
}
