use crate::command::ExitCode;
use crate::env::ShellState;
use crate::external::CommandSpawner;
use crate::parser::parse_pipeline;
use crate::pipeline::{Outcome, PipelineExecutor};
use crate::streams::PipeStreams;
use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{BufRead, Write};
use tracing::debug;

/// Where command lines come from.
pub trait LineSource {
    /// Shows `prompt` and reads one line. `Ok(None)` means end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Line source for terminals, backed by rustyline.
///
/// Nothing is added to the editor's history.
pub struct Editor {
    editor: DefaultEditor,
}

impl Editor {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().context("cannot initialize line editor")?;
        Ok(Self { editor })
    }
}

impl LineSource for Editor {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            // Ctrl-C drops the line being typed.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err).context("cannot read command line"),
        }
    }
}

/// Line source over any buffered reader, writing the prompt to `output`.
///
/// Used when stdin is not a terminal. Invalid UTF-8 is replaced rather than
/// rejected.
pub struct Plain<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Plain<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> LineSource for Plain<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}").context("cannot write prompt")?;
        self.output.flush().context("cannot write prompt")?;

        let mut line = Vec::new();
        let read = self
            .input
            .read_until(b'\n', &mut line)
            .context("cannot read command line")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}

/// The read-eval loop.
///
/// Each line is parsed into a pipeline, executed, and every child it started
/// is waited for before the next prompt. Errors from a line go to `errors`
/// and never end the loop; only `exit` or end of input do.
pub struct Shell<E> {
    state: ShellState,
    spawner: CommandSpawner,
    errors: E,
}

impl<E: Write> Shell<E> {
    pub fn new(state: ShellState, errors: E) -> Self {
        Self {
            state,
            spawner: CommandSpawner,
            errors,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    /// Runs until `exit` or end of input and returns the shell's exit status
    /// (0 at end of input).
    pub fn run(&mut self, input: &mut dyn LineSource) -> Result<ExitCode> {
        loop {
            let prompt = self.state.prompt().to_string();
            let Some(line) = input.read_line(&prompt)? else {
                debug!("end of input");
                return Ok(0);
            };
            if let Some(code) = self.execute_line(&line).exit {
                return Ok(code);
            }
        }
    }

    /// Parses and executes one command line.
    ///
    /// A blank line does nothing. A parse error is reported and counted as a
    /// failure.
    pub fn execute_line(&mut self, line: &str) -> Outcome {
        let pipeline = match parse_pipeline(line) {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => return Outcome::default(),
            Err(err) => {
                // Nothing else can be done if stderr itself is gone.
                let _ = writeln!(self.errors, "psh: {err}");
                return Outcome {
                    failures: 1,
                    ..Outcome::default()
                };
            }
        };

        debug!(stages = pipeline.len(), "executing pipeline");
        PipelineExecutor::new(&mut self.state, &mut self.spawner, &mut self.errors)
            .execute(&pipeline, PipeStreams::new())
    }
}
