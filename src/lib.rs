//! An interactive shell that runs pipelines of programs.
//!
//! A command line such as `printf 'a|b' | tr a-z A-Z | cat` is split into
//! stages by [`parser::parse_pipeline`]. Each stage is either a builtin
//! (`cd`, `exit`, `export`) that runs inside the shell against an explicit
//! [`ShellState`], or an external program started by a
//! [`ProcessSpawner`](command::ProcessSpawner) with its standard streams
//! wired to its neighbours by a
//! [`StreamCoordinator`](command::StreamCoordinator).
//!
//! The main entry point is [`Shell`], which reads lines from a
//! [`LineSource`](interpreter::LineSource) and executes them until `exit` or
//! end of input.

pub mod builtin;
pub mod command;
pub mod env;
pub mod error;
pub mod external;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod streams;

pub use env::ShellState;
pub use interpreter::Shell;
