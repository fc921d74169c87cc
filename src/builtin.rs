use crate::command::ExitCode;
use crate::env::ShellState;
use crate::error::BuiltinError;
use argh::{EarlyExit, FromArgs};
use regex::Regex;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::LazyLock;

/// What the shell should do after a builtin returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop dispatching and terminate the shell with this status.
    Exit(ExitCode),
}

/// Commands executed inside the shell process.
///
/// The set is fixed at compile time. Names are reserved: a builtin always
/// wins over an external program of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Exit,
    Export,
}

const BUILTINS: &[(&str, Builtin)] = &[
    ("cd", Builtin::Cd),
    ("exit", Builtin::Exit),
    ("export", Builtin::Export),
];

impl Builtin {
    /// Exact-match lookup of a program name.
    pub fn lookup(name: &str) -> Option<Builtin> {
        BUILTINS
            .iter()
            .find(|(builtin_name, _)| *builtin_name == name)
            .map(|(_, builtin)| *builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Cd => Cd::name(),
            Builtin::Exit => Exit::name(),
            Builtin::Export => Export::name(),
        }
    }

    /// Runs the builtin synchronously against `state`.
    ///
    /// On error `state` is left as it was.
    pub fn invoke(
        self,
        arguments: &[String],
        state: &mut ShellState,
    ) -> Result<Flow, BuiltinError> {
        match self {
            Builtin::Cd => run::<Cd>(arguments, state),
            Builtin::Exit => run::<Exit>(arguments, state),
            Builtin::Export => run::<Export>(arguments, state),
        }
    }
}

pub fn is_builtin(name: &str) -> bool {
    Builtin::lookup(name).is_some()
}

/// Builtin arguments are parsed with [`argh`] before execution.
trait BuiltinCommand: Sized + FromArgs {
    fn name() -> &'static str;

    fn execute(self, state: &mut ShellState) -> Result<Flow, BuiltinError>;
}

/// A lone `--help` asks for usage. Anything else is an operand, even when it
/// looks like a flag or reads `help`.
fn run<T: BuiltinCommand>(
    arguments: &[String],
    state: &mut ShellState,
) -> Result<Flow, BuiltinError> {
    let args: Vec<&str> = match arguments {
        [only] if only == "--help" => vec!["--help"],
        _ => std::iter::once("--")
            .chain(arguments.iter().map(String::as_str))
            .collect(),
    };
    match T::from_args(&[T::name()], &args) {
        Ok(cmd) => cmd.execute(state),
        // `--help`
        Err(EarlyExit {
            output,
            status: Ok(()),
        }) => {
            let mut stdout = io::stdout().lock();
            // A closed stdout only loses the help text.
            let _ = writeln!(stdout, "{}", output.trim_end());
            Ok(Flow::Continue)
        }
        Err(EarlyExit {
            output,
            status: Err(()),
        }) => Err(BuiltinError::Usage {
            name: T::name(),
            message: output.trim_end().to_string(),
        }),
    }
}

#[derive(FromArgs)]
/// Change the working directory of the shell and of every program it starts.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: String,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, state: &mut ShellState) -> Result<Flow, BuiltinError> {
        let target = PathBuf::from(&self.target);
        let new_dir = if target.is_absolute() {
            target.clone()
        } else {
            state.current_dir.join(&target)
        };

        let metadata = match fs::metadata(&new_dir) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BuiltinError::NoSuchDirectory(target));
            }
            Err(source) => return Err(BuiltinError::ChangeDirectory { path: target, source }),
        };
        if !metadata.is_dir() {
            return Err(BuiltinError::NotADirectory(target));
        }

        let canonical = fs::canonicalize(&new_dir)
            .map_err(|source| BuiltinError::ChangeDirectory { path: target, source })?;
        state.set_var("PWD", canonical.to_string_lossy());
        state.current_dir = canonical;
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional)]
    /// exit status, 0 when omitted.
    pub code: Option<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _state: &mut ShellState) -> Result<Flow, BuiltinError> {
        let code = match self.code {
            None => 0,
            Some(code) => code
                .trim()
                .parse::<ExitCode>()
                .map_err(|_| BuiltinError::InvalidExitCode(code))?,
        };
        Ok(Flow::Exit(code))
    }
}

static VARIABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("variable name pattern"));

#[derive(FromArgs)]
/// Set an environment variable for programs started afterwards.
/// Without `=`, the variable is set to the empty string.
pub struct Export {
    #[argh(positional)]
    /// assignment in the form KEY=VALUE.
    pub assignment: String,
}

impl BuiltinCommand for Export {
    fn name() -> &'static str {
        "export"
    }

    fn execute(self, state: &mut ShellState) -> Result<Flow, BuiltinError> {
        let (key, value) = self
            .assignment
            .split_once('=')
            .unwrap_or((self.assignment.as_str(), ""));
        if !VARIABLE_NAME.is_match(key) {
            return Err(BuiltinError::InvalidName(key.to_string()));
        }
        state.set_var(key, value);
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    fn state_in(dir: &Path) -> ShellState {
        ShellState::with_vars(HashMap::new(), dir.to_path_buf())
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(Builtin::lookup("cd"), Some(Builtin::Cd));
        assert_eq!(Builtin::lookup("exit"), Some(Builtin::Exit));
        assert_eq!(Builtin::lookup("export"), Some(Builtin::Export));
        assert_eq!(Builtin::lookup("CD"), None);
        assert_eq!(Builtin::lookup("cd "), None);
        assert!(!is_builtin("ls"));
        assert_eq!(Builtin::Export.name(), "export");
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let temp = tempfile::tempdir().unwrap();
        let canonical = fs::canonicalize(temp.path()).unwrap();
        let mut state = state_in(Path::new("/"));

        let flow = Builtin::Cd
            .invoke(&args(&[temp.path().to_str().unwrap()]), &mut state)
            .unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(state.current_dir, canonical);
        assert_eq!(state.get_var("PWD"), Some(canonical.to_str().unwrap()));
    }

    #[test]
    fn test_cd_relative_to_state_dir() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        let mut state = state_in(temp.path());

        Builtin::Cd.invoke(&args(&["sub"]), &mut state).unwrap();
        assert_eq!(
            state.current_dir,
            fs::canonicalize(temp.path().join("sub")).unwrap()
        );

        Builtin::Cd.invoke(&args(&[".."]), &mut state).unwrap();
        assert_eq!(state.current_dir, fs::canonicalize(temp.path()).unwrap());
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let temp = tempfile::tempdir().unwrap();
        let mut state = state_in(temp.path());

        let err = Builtin::Cd
            .invoke(&args(&["/nonexistent_dir_for_psh_test"]), &mut state)
            .unwrap_err();

        assert!(matches!(err, BuiltinError::NoSuchDirectory(_)));
        assert_eq!(state.current_dir, temp.path());
        assert_eq!(state.get_var("PWD"), None);
    }

    #[test]
    fn test_cd_to_file_errors() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("file"), "x").unwrap();
        let mut state = state_in(temp.path());

        let err = Builtin::Cd.invoke(&args(&["file"]), &mut state).unwrap_err();

        assert!(matches!(err, BuiltinError::NotADirectory(_)));
        assert_eq!(state.current_dir, temp.path());
    }

    #[test]
    fn test_cd_requires_exactly_one_argument() {
        let mut state = state_in(Path::new("/"));
        assert!(matches!(
            Builtin::Cd.invoke(&[], &mut state),
            Err(BuiltinError::Usage { name: "cd", .. })
        ));
        assert!(matches!(
            Builtin::Cd.invoke(&args(&["/", "/tmp"]), &mut state),
            Err(BuiltinError::Usage { name: "cd", .. })
        ));
        assert_eq!(state.current_dir, Path::new("/"));
    }

    #[test]
    fn test_exit_codes() {
        let mut state = state_in(Path::new("/"));
        assert_eq!(Builtin::Exit.invoke(&[], &mut state).unwrap(), Flow::Exit(0));
        assert_eq!(
            Builtin::Exit.invoke(&args(&["3"]), &mut state).unwrap(),
            Flow::Exit(3)
        );
    }

    #[test]
    fn test_exit_non_numeric_code_errors() {
        let mut state = state_in(Path::new("/"));
        let err = Builtin::Exit.invoke(&args(&["abc"]), &mut state).unwrap_err();
        assert!(matches!(err, BuiltinError::InvalidExitCode(ref code) if code == "abc"));
        assert_eq!(err.to_string(), "exit: abc: numeric argument required");

        assert!(Builtin::Exit.invoke(&args(&["1", "2"]), &mut state).is_err());
    }

    #[test]
    fn test_export_sets_variable() {
        let mut state = state_in(Path::new("/"));
        Builtin::Export.invoke(&args(&["FOO=bar"]), &mut state).unwrap();
        assert_eq!(state.get_var("FOO"), Some("bar"));
    }

    #[test]
    fn test_export_value_keeps_later_equals() {
        let mut state = state_in(Path::new("/"));
        Builtin::Export.invoke(&args(&["OPTS=a=b=c"]), &mut state).unwrap();
        assert_eq!(state.get_var("OPTS"), Some("a=b=c"));

        Builtin::Export.invoke(&args(&["EMPTY="]), &mut state).unwrap();
        assert_eq!(state.get_var("EMPTY"), Some(""));
    }

    #[test]
    fn test_export_without_equals_sets_empty() {
        let mut state = state_in(Path::new("/"));
        state.set_var("FOO", "old");
        Builtin::Export.invoke(&args(&["FOO"]), &mut state).unwrap();
        assert_eq!(state.get_var("FOO"), Some(""));
    }

    #[test]
    fn test_export_rejects_invalid_names() {
        let mut state = state_in(Path::new("/"));
        for bad in ["=x", "1ABC=x", "A-B=x", "A B=x"] {
            let err = Builtin::Export.invoke(&args(&[bad]), &mut state).unwrap_err();
            assert!(matches!(err, BuiltinError::InvalidName(_)), "{bad}");
        }
        assert!(state.vars.is_empty());
    }

    #[test]
    fn test_cd_to_directories_named_like_flags() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["help", "-x", "--"] {
            fs::create_dir(temp.path().join(name)).unwrap();
            let mut state = state_in(temp.path());

            let flow = Builtin::Cd.invoke(&args(&[name]), &mut state);

            assert!(matches!(flow, Ok(Flow::Continue)), "{name}: {flow:?}");
            assert_eq!(
                state.current_dir,
                fs::canonicalize(temp.path().join(name)).unwrap()
            );
        }
    }

    #[test]
    fn test_cd_help_alone_keeps_directory() {
        let mut state = state_in(Path::new("/"));
        assert_eq!(
            Builtin::Cd.invoke(&args(&["--help"]), &mut state).unwrap(),
            Flow::Continue
        );
        assert_eq!(state.current_dir, Path::new("/"));
    }

    #[test]
    fn test_export_help_is_a_name() {
        let mut state = state_in(Path::new("/"));
        Builtin::Export.invoke(&args(&["help"]), &mut state).unwrap();
        assert_eq!(state.get_var("help"), Some(""));

        Builtin::Export.invoke(&args(&["help=me"]), &mut state).unwrap();
        assert_eq!(state.get_var("help"), Some("me"));

        let err = Builtin::Export.invoke(&args(&["-n"]), &mut state).unwrap_err();
        assert!(matches!(err, BuiltinError::InvalidName(ref name) if name == "-n"));
    }

    #[test]
    fn test_exit_negative_code() {
        let mut state = state_in(Path::new("/"));
        assert_eq!(
            Builtin::Exit.invoke(&args(&["-1"]), &mut state).unwrap(),
            Flow::Exit(-1)
        );
        let err = Builtin::Exit.invoke(&args(&["-x"]), &mut state).unwrap_err();
        assert!(matches!(err, BuiltinError::InvalidExitCode(ref code) if code == "-x"));
    }
}
