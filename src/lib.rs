//! A small interactive shell.
//!
//! A line is split into tokens ([`lexer`]), folded into a [`parser::Pipeline`]
//! with `$NAME` expansion ([`expand`]) and then either handled by a built-in
//! (`cd`, `exit`, `export`, `pwd`, `echo`) or run as a chain of forked
//! processes connected by pipes ([`executor`]).
//!
//! The main entry point is [`Interpreter`], which owns the shell state
//! ([`env::Environment`]) and drives the read-eval loop over a
//! [`reader::LineReader`].

mod builtin;
pub mod command;
pub mod env;
pub mod error;
pub mod executor;
pub mod expand;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod reader;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
