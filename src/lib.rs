//! A small interactive shell: pipelines of OS processes with file
//! redirection, background jobs polled between prompts, and a `cd`
//! builtin with `cd -` memory.
//!
//! The crate is a library so that several independent [`Session`]s can
//! be driven inside one test process; the `msh` binary wraps a single
//! session in a read-eval loop.

pub mod command;
pub mod error;
pub mod exec;
pub mod jobs;
pub mod navigate;
pub mod parse;
pub mod session;

pub use command::{Command, Pipeline, StagePos};
pub use error::ShellError;
pub use exec::Outcome;
pub use jobs::{JobId, JobOutcome, JobReport};
pub use session::Session;
