use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::warn;

/// Prompt shown when `PROMPT` is not set.
pub const DEFAULT_PROMPT: &str = "-> ";

/// State shared by every line the shell executes.
///
/// The shell never mutates its own process environment or working directory.
/// Builtins change this struct instead, and spawned programs receive exactly
/// `vars` as their environment and `current_dir` as their working directory.
#[derive(Debug, Clone)]
pub struct ShellState {
    /// Environment table handed to every spawned program, including `PROMPT`.
    pub vars: HashMap<String, String>,
    /// Working directory for spawned programs and relative `cd` targets.
    pub current_dir: PathBuf,
}

impl ShellState {
    /// Capture the current process environment and working directory.
    pub fn new() -> Self {
        let vars = unicode_vars(stdenv::vars_os());
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_vars(vars, current_dir)
    }

    /// Build a state from an explicit table, independent of the process
    /// environment.
    pub fn with_vars(vars: HashMap<String, String>, current_dir: PathBuf) -> Self {
        Self { vars, current_dir }
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The prompt string, read from `PROMPT` on every call.
    pub fn prompt(&self) -> &str {
        self.get_var("PROMPT").unwrap_or(DEFAULT_PROMPT)
    }
}

/// Keeps the variables whose name and value are both valid UTF-8.
fn unicode_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> HashMap<String, String> {
    vars.into_iter()
        .filter_map(|(key, val)| match (key.into_string(), val.into_string()) {
            (Ok(key), Ok(val)) => Some((key, val)),
            _ => {
                warn!("skipping non-UTF-8 environment variable");
                None
            }
        })
        .collect()
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_set_and_get_var() {
        let mut state = ShellState::with_vars(HashMap::new(), PathBuf::from("/"));

        assert_eq!(state.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        state.set_var("KEY", "VALUE");
        assert_eq!(state.get_var("KEY"), Some("VALUE"));
    }

    #[test]
    fn test_state_reads_from_process_env() {
        let state = ShellState::new();
        assert!(state.get_var("PATH").is_some());
        assert!(state.current_dir.is_absolute());
    }

    #[test]
    #[cfg(unix)]
    fn test_non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = unicode_vars([
            (OsString::from("GOOD"), OsString::from("yes")),
            (OsString::from("BAD_VALUE"), OsString::from_vec(b"a\xffb".to_vec())),
            (OsString::from_vec(b"BAD\xfeNAME".to_vec()), OsString::from("x")),
        ]);

        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("GOOD").map(String::as_str), Some("yes"));
    }

    #[test]
    fn test_prompt_defaults_and_follows_variable() {
        let mut state = ShellState::with_vars(HashMap::new(), PathBuf::from("/"));
        assert_eq!(state.prompt(), "-> ");

        state.set_var("PROMPT", "$ ");
        assert_eq!(state.prompt(), "$ ");
    }
}
