use anyhow::Result;
use argh::FromArgs;
use pipeline_shell::command::ExitCode;
use pipeline_shell::interpreter::{Editor, LineSource, Plain};
use pipeline_shell::{Shell, ShellState};
use std::io::{self, IsTerminal};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(FromArgs)]
/// An interactive shell that runs pipelines of programs.
struct Args {
    #[argh(option, short = 'c')]
    /// run this command line, then exit with its status.
    command: Option<String>,

    #[argh(option)]
    /// initial prompt; overrides the PROMPT environment variable.
    prompt: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_env_var("PSH_LOG")
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: Args) -> Result<ExitCode> {
    let mut state = ShellState::new();
    if let Some(prompt) = args.prompt {
        state.set_var("PROMPT", prompt);
    }
    let mut shell = Shell::new(state, io::stderr());

    if let Some(line) = args.command {
        let outcome = shell.execute_line(&line);
        return Ok(outcome.exit.unwrap_or_else(|| outcome.status()));
    }

    let mut input: Box<dyn LineSource> = if io::stdin().is_terminal() {
        Box::new(Editor::new()?)
    } else {
        Box::new(Plain::new(io::stdin().lock(), io::stdout()))
    };
    shell.run(input.as_mut())
}

fn main() {
    init_logging();
    let args: Args = argh::from_env();
    let code = match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("psh: {err:#}");
            1
        }
    };
    std::process::exit(code)
}
