use crate::command::{ChildProcessHandle, ExitCode, ProcessSpawner, StreamCoordinator};
use crate::env::ShellState;
use crate::error::SpawnError;
use crate::parser::Stage;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use tracing::debug;

/// Starts external stages with [`std::process::Command`].
///
/// The child gets exactly the state's variables as its environment and the
/// state's directory as its working directory; stderr is inherited.
#[derive(Debug, Default)]
pub struct CommandSpawner;

impl ProcessSpawner for CommandSpawner {
    type Handle = Child;

    fn spawn(
        &mut self,
        stage: &Stage,
        streams: &mut dyn StreamCoordinator,
        state: &ShellState,
    ) -> Result<Child, SpawnError> {
        let search_paths = state.get_var("PATH").unwrap_or_default();
        let executable = find_command_path(
            OsStr::new(search_paths),
            &state.current_dir,
            Path::new(&stage.program),
        )
        .ok_or_else(|| SpawnError::NotFound(stage.program.clone()))?;

        let mut cmd = Command::new(&executable);
        // Output before input, for every stage.
        cmd.stdout(streams.stage_stdout())
            .stdin(streams.stage_stdin())
            .stderr(Stdio::inherit())
            .args(&stage.arguments)
            .env_clear()
            .envs(&state.vars)
            .current_dir(&state.current_dir);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.arg0(&stage.program);
        }

        let child = cmd.spawn().map_err(|source| SpawnError::Exec {
            program: stage.program.clone(),
            source,
        })?;
        debug!(pid = child.id(), executable = %executable.display(), "spawned stage");
        Ok(child)
    }
}

impl ChildProcessHandle for Child {
    fn id(&self) -> u32 {
        Child::id(self)
    }

    fn wait(&mut self) -> io::Result<ExitCode> {
        let exit_status = Child::wait(self)?;
        Ok(match exit_status.code() {
            Some(x) => x,
            None => terminated_by_signal(exit_status),
        })
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a program name the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returned if it is an executable file.
/// - Relative path with a separator (`bin/tool`, `./tool`): resolved against
///   `cwd`.
/// - Single component: each directory of `search_paths` (PATH) is tried in
///   order; relative PATH entries, including the empty one, are taken relative
///   to `cwd`.
/// - Empty path: `None`.
pub fn find_command_path(search_paths: &OsStr, cwd: &Path, path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return find_by_path(path);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, _) => None,
        (Some(std::path::Component::Normal(name)), None) => find_in_path(search_paths, cwd, name),
        _ => find_by_path(&cwd.join(path)),
    }
}

fn find_in_path(search_paths: &OsStr, cwd: &Path, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| cwd.join(dir).join(cmd))
        .find_map(|candidate| find_by_path(&candidate))
}

fn find_by_path(path: &Path) -> Option<PathBuf> {
    if is_executable(path) {
        Some(path.to_path_buf())
    } else {
        None
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
