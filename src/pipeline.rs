//! Execution of one parsed pipeline.
//!
//! Stages are dispatched strictly in order. For each stage:
//!
//! - a builtin runs in place and the stream coordinator is left alone, so
//!   builtins never read from or write to the pipe, wherever they sit;
//! - any other program goes through `advance` → `spawn` → `release`, so its
//!   endpoints are settled before the next stage asks for its own.
//!
//! Once every stage has been dispatched the coordinator is closed and the
//! executor blocks until every child spawned for this pipeline has exited.

use crate::builtin::{Builtin, Flow};
use crate::command::{ChildProcessHandle, ExitCode, ProcessSpawner, StreamCoordinator};
use crate::env::ShellState;
use crate::error::SpawnError;
use crate::parser::{Pipeline, Stage};
use std::fmt::Display;
use std::io::Write;
use tracing::{debug, warn};

/// Summary of one pipeline run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Number of child processes started.
    pub spawned: usize,
    /// Stages that reported an error (builtin or spawn).
    pub failures: usize,
    /// Exit codes of the children, in spawn order.
    pub statuses: Vec<ExitCode>,
    /// Set when `exit` ran; the remaining stages were not dispatched.
    pub exit: Option<ExitCode>,
}

impl Outcome {
    /// Status of the pipeline as a whole: the last child's exit code, 1 if
    /// the last stage failed to start, 0 otherwise.
    pub fn status(&self) -> ExitCode {
        match self.statuses.last() {
            Some(code) => *code,
            None if self.failures > 0 => 1,
            None => 0,
        }
    }
}

pub struct PipelineExecutor<'a, P: ProcessSpawner> {
    state: &'a mut ShellState,
    spawner: &'a mut P,
    errors: &'a mut dyn Write,
}

impl<'a, P: ProcessSpawner> PipelineExecutor<'a, P> {
    /// `errors` receives one `psh: <message>` line per failed stage.
    pub fn new(
        state: &'a mut ShellState,
        spawner: &'a mut P,
        errors: &'a mut dyn Write,
    ) -> Self {
        Self {
            state,
            spawner,
            errors,
        }
    }

    /// Dispatches every stage of `pipeline` and waits for the spawned
    /// children.
    ///
    /// `streams` must be fresh; it is consumed and dropped before waiting so
    /// the shell holds no pipe endpoint while the children run. Stage errors
    /// are reported and do not stop the remaining stages. `exit` does: the
    /// outcome is returned at once without waiting.
    pub fn execute<C: StreamCoordinator>(
        &mut self,
        pipeline: &Pipeline,
        mut streams: C,
    ) -> Outcome {
        let mut outcome = Outcome::default();
        let mut children = Vec::with_capacity(pipeline.len());
        let mut streams_used = false;

        let count = pipeline.len();
        for (index, stage) in pipeline.stages().iter().enumerate() {
            if let Some(builtin) = Builtin::lookup(&stage.program) {
                debug!(index, builtin = builtin.name(), "running builtin");
                match builtin.invoke(&stage.arguments, self.state) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Exit(code)) => {
                        outcome.exit = Some(code);
                        break;
                    }
                    Err(err) => {
                        outcome.failures += 1;
                        self.report(err);
                    }
                }
                continue;
            }

            debug!(index, program = %stage.program, args = ?stage.arguments, "spawning stage");
            streams_used = true;
            match self.spawn_stage(stage, index + 1 < count, &mut streams) {
                Ok(child) => {
                    outcome.spawned += 1;
                    children.push(child);
                }
                Err(err) => {
                    warn!(index, program = %stage.program, "stage failed to start");
                    outcome.failures += 1;
                    self.report(err);
                }
            }
        }

        if streams_used {
            streams.close();
        }
        drop(streams);

        if outcome.exit.is_some() {
            return outcome;
        }

        for mut child in children {
            match child.wait() {
                Ok(code) => {
                    debug!(pid = child.id(), code, "child exited");
                    outcome.statuses.push(code);
                }
                Err(err) => self.report(format_args!("wait for process {}: {}", child.id(), err)),
            }
        }
        outcome
    }

    fn spawn_stage<C: StreamCoordinator>(
        &mut self,
        stage: &Stage,
        has_more_stages: bool,
        streams: &mut C,
    ) -> Result<P::Handle, SpawnError> {
        if let Err(source) = streams.advance(has_more_stages) {
            streams.release();
            return Err(SpawnError::Streams {
                program: stage.program.clone(),
                source,
            });
        }
        let spawned = self.spawner.spawn(stage, streams, self.state);
        streams.release();
        spawned
    }

    fn report(&mut self, err: impl Display) {
        // Nothing else can be done if stderr itself is gone.
        let _ = writeln!(self.errors, "psh: {err}");
    }
}
