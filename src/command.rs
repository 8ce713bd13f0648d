//! Data model shared by the tokenizer and the launcher: one `Command`
//! per pipeline stage, a non-empty `Pipeline` around them.

use std::path::PathBuf;

use crate::error::ShellError;

/// One stage of a pipeline, immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Program name first, then its arguments.
    pub argv: Vec<String>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// Only meaningful on the last stage; see [`Pipeline::detached`].
    pub detached: bool,
}

impl Command {
    pub fn program(&self) -> &str {
        &self.argv[0]
    }
}

/// An ordered, left-to-right chain of commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    /// Panics on an empty command list; the parser never produces one.
    pub fn new(commands: Vec<Command>) -> Pipeline {
        assert!(!commands.is_empty(), "pipeline needs at least one command");
        Pipeline { commands }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// The detached flag is read from the last command and covers the
    /// whole pipeline.
    pub fn detached(&self) -> bool {
        self.commands.last().map(|c| c.detached).unwrap_or(false)
    }

    /// Input redirection is only meaningful on the first stage, output
    /// on the last. Violations are rejected here, before a single
    /// process is created.
    pub fn validate(&self) -> Result<(), ShellError> {
        let len = self.commands.len();
        for (i, cmd) in self.commands.iter().enumerate() {
            let pos = StagePos::of(i, len);
            if cmd.input.is_some() && !pos.is_first() {
                return Err(ShellError::Config(
                    "input redirection is only allowed on the first command".into(),
                ));
            }
            if cmd.output.is_some() && !pos.is_last() {
                return Err(ShellError::Config(
                    "output redirection is only allowed on the last command".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Where a stage sits within its pipeline. Wiring decisions match on
/// this instead of re-deriving index comparisons at every use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePos {
    Only,
    First,
    Middle,
    Last,
}

impl StagePos {
    pub fn of(index: usize, len: usize) -> StagePos {
        match (index == 0, index + 1 == len) {
            (true, true) => StagePos::Only,
            (true, false) => StagePos::First,
            (false, false) => StagePos::Middle,
            (false, true) => StagePos::Last,
        }
    }

    pub fn is_first(self) -> bool {
        matches!(self, StagePos::Only | StagePos::First)
    }

    pub fn is_last(self) -> bool {
        matches!(self, StagePos::Only | StagePos::Last)
    }

    /// A stage that is not last writes into a pipe it must create.
    pub fn writes_pipe(self) -> bool {
        !self.is_last()
    }

    /// A stage that is not first reads the previous stage's pipe.
    pub fn reads_pipe(self) -> bool {
        !self.is_first()
    }
}
