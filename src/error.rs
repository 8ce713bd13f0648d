//! Error taxonomy: what aborts an in-progress pipeline versus what is
//! only reported before the loop continues.

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use crate::parse::ParseError;

#[derive(Debug, Error)]
pub enum ShellError {
    /// Malformed input line; nothing was launched.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Misplaced redirection or builtin misuse; nothing was launched.
    #[error("{0}")]
    Config(String),

    /// pipe/fork/wait failure; the in-progress pipeline was aborted and
    /// every already-spawned stage handed off for non-blocking reaping.
    #[error("{op}: {source}")]
    Resource { op: &'static str, source: Errno },

    #[error("cd: {}: {source}", target.display())]
    ChangeDir { target: PathBuf, source: io::Error },
}
