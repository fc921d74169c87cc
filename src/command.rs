use crate::env::ShellState;
use crate::error::SpawnError;
use crate::parser::Stage;
use std::io;
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Owner of the pipe endpoints connecting the external stages of one pipeline.
///
/// The executor calls [`advance`](Self::advance) before each external stage,
/// hands the endpoints to a [`ProcessSpawner`], then calls
/// [`release`](Self::release). Builtins never touch the coordinator.
pub trait StreamCoordinator {
    /// Prepares endpoints for the upcoming stage. The read end left by the
    /// previous stage becomes this stage's input; when `has_more_stages` is
    /// set a new pipe is allocated for its output, otherwise it writes to the
    /// pipeline's terminal output.
    fn advance(&mut self, has_more_stages: bool) -> io::Result<()>;

    /// Output endpoint for the current stage.
    fn stage_stdout(&mut self) -> Stdio;

    /// Input endpoint for the current stage.
    fn stage_stdin(&mut self) -> Stdio;

    /// Closes every endpoint still held for the current stage.
    fn release(&mut self);

    /// Closes everything, including a read end no stage consumed.
    fn close(&mut self);
}

/// A spawned child that the executor waits on at the end of a pipeline.
pub trait ChildProcessHandle {
    fn id(&self) -> u32;

    /// Blocks until the child exits.
    fn wait(&mut self) -> io::Result<ExitCode>;
}

/// Launches external programs with their streams bound by a coordinator.
pub trait ProcessSpawner {
    type Handle: ChildProcessHandle;

    fn spawn(
        &mut self,
        stage: &Stage,
        streams: &mut dyn StreamCoordinator,
        state: &ShellState,
    ) -> Result<Self::Handle, SpawnError>;
}
