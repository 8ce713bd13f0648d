//! One interpreter session: the job table and the `cd -` slot, plus
//! the single "execute one parsed line" entry point.

use std::path::{Path, PathBuf};

use crate::error::ShellError;
use crate::exec::{self, Outcome};
use crate::jobs::{JobReport, JobTable};
use crate::{navigate, parse};

#[derive(Debug, Default)]
pub struct Session {
    jobs: JobTable,
    prev_dir: Option<PathBuf>,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    /// Execute one line of input: a builtin action, a foreground
    /// pipeline that is awaited, or a background registration that
    /// returns immediately.
    pub fn execute(&mut self, line: &str) -> Result<Outcome, ShellError> {
        let Some(pipeline) = parse::parse_line(line)? else {
            return Ok(Outcome::Empty);
        };
        if pipeline.commands()[0].program() == "cd" {
            navigate::run(&pipeline, &mut self.prev_dir)?;
            return Ok(Outcome::Builtin);
        }
        exec::run(&pipeline, &mut self.jobs)
    }

    /// Non-blocking completion check over every tracked background job;
    /// run once per loop iteration, before the next prompt.
    pub fn poll_jobs(&mut self) -> Vec<JobReport> {
        self.jobs.poll()
    }

    pub fn previous_dir(&self) -> Option<&Path> {
        self.prev_dir.as_deref()
    }
}
