//! An interactive POSIX-style command shell.
//!
//! This crate reads a line of input, interprets quoting, escaping, and
//! operator syntax, and executes the result either as in-process builtins or
//! as external OS processes, composing multiple commands into a pipeline with
//! an optional trailing output redirection.
//!
//! The main entry point is [`Interpreter`], which owns the session state and
//! drives the read-eval loop. The pipeline data model lives in [`parser`],
//! the tokenizer in [`lexer`], and the `PATH` lookup in [`external`].

mod builtin;
pub mod command;
pub mod completion;
pub mod env;
pub mod external;
mod interpreter;
pub mod lexer;
pub mod parser;

/// Convenient re-exports of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API; [`run_headless`] backs the
/// hidden mode in which the binary executes a single builtin as a pipeline
/// stage.
pub use interpreter::{HEADLESS_FLAG, Interpreter, run_headless};
