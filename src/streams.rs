use crate::command::StreamCoordinator;
use os_pipe::PipeReader;
use std::io;
use std::process::Stdio;
use tracing::trace;

/// Pipe endpoints for one pipeline, backed by anonymous OS pipes.
///
/// The first external stage reads the shell's stdin and the last one writes
/// the terminal output (the shell's stdout unless [`with_output`] was used).
/// Every interior boundary is a single pipe: its write end goes to the
/// producing stage, its read end waits in `pending` for the consuming stage.
///
/// [`with_output`]: PipeStreams::with_output
pub struct PipeStreams {
    pending: Option<PipeReader>,
    current_in: Option<Stdio>,
    current_out: Option<Stdio>,
    terminal: Option<Stdio>,
}

impl PipeStreams {
    /// Streams whose last stage writes to the inherited stdout.
    pub fn new() -> Self {
        Self {
            pending: None,
            current_in: None,
            current_out: None,
            terminal: None,
        }
    }

    /// Streams whose last stage writes to `output` instead of stdout.
    pub fn with_output(output: impl Into<Stdio>) -> Self {
        Self {
            terminal: Some(output.into()),
            ..Self::new()
        }
    }

    #[cfg(test)]
    fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for PipeStreams {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamCoordinator for PipeStreams {
    fn advance(&mut self, has_more_stages: bool) -> io::Result<()> {
        self.release();

        let piped_input = self.pending.is_some();
        self.current_in = Some(match self.pending.take() {
            Some(reader) => reader.into(),
            None => Stdio::inherit(),
        });

        self.current_out = Some(if has_more_stages {
            let (reader, writer) = os_pipe::pipe()?;
            self.pending = Some(reader);
            writer.into()
        } else {
            self.terminal.take().unwrap_or_else(Stdio::inherit)
        });

        trace!(piped_input, piped_output = has_more_stages, "advanced streams");
        Ok(())
    }

    fn stage_stdout(&mut self) -> Stdio {
        self.current_out.take().unwrap_or_else(Stdio::inherit)
    }

    fn stage_stdin(&mut self) -> Stdio {
        self.current_in.take().unwrap_or_else(Stdio::inherit)
    }

    fn release(&mut self) {
        let input = self.current_in.take();
        let output = self.current_out.take();
        if input.is_some() || output.is_some() {
            trace!("released unclaimed stage endpoints");
        }
    }

    fn close(&mut self) {
        self.release();
        if self.pending.take().is_some() {
            trace!("closed unconsumed pipe read end");
        }
        self.terminal = None;
    }
}
