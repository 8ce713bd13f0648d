//! Pipeline launch: one forked process per stage, pipe chaining with
//! immediate parent-side closing, per-child redirection wiring, and the
//! foreground wait / background registration split.

use std::ffi::CString;
use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg};
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::command::{Command, Pipeline, StagePos};
use crate::error::ShellError;
use crate::jobs::{JobId, JobTable};

/// What became of one executed line.
#[derive(Debug)]
pub enum Outcome {
    /// The line held nothing to run.
    Empty,
    /// A builtin ran in the shell's own process.
    Builtin,
    /// Foreground pipeline: exit status of the last stage.
    Exited(i32),
    /// Foreground pipeline: the last stage died on a signal.
    Signaled(Signal),
    /// Detached pipeline, registered and not awaited.
    Background { id: JobId, pids: Vec<Pid> },
}

// Exit statuses for a child that never reached its program.
const WIRE_FAILURE: i32 = 126;
const EXEC_FAILURE: i32 = 127;

/// Launch a pipeline. Either every stage is running when this returns,
/// or the launch was aborted with every descriptor closed and every
/// already-spawned stage handed off for non-blocking reaping.
pub fn run(pipeline: &Pipeline, jobs: &mut JobTable) -> Result<Outcome, ShellError> {
    pipeline.validate()?;
    let _stdio = StdioBackup::save()?;

    let commands = pipeline.commands();
    let mut pids: Vec<Pid> = Vec::with_capacity(commands.len());
    let mut prev_read: Option<OwnedFd> = None;

    for (i, cmd) in commands.iter().enumerate() {
        let pos = StagePos::of(i, commands.len());

        let argv = match to_cstrings(&cmd.argv) {
            Ok(argv) => argv,
            Err(e) => {
                drop(prev_read);
                abort_spawned(&pids, jobs);
                return Err(e);
            }
        };

        let pipe_pair = if pos.writes_pipe() {
            match unistd::pipe() {
                Ok(pair) => Some(pair),
                Err(e) => {
                    drop(prev_read);
                    abort_spawned(&pids, jobs);
                    return Err(ShellError::Resource { op: "pipe", source: e });
                }
            }
        } else {
            None
        };

        match unsafe { unistd::fork() } {
            Ok(ForkResult::Child) => {
                let code = wire_and_exec(cmd, prev_read, pipe_pair, &argv);
                unsafe { libc::_exit(code) }
            }
            Ok(ForkResult::Parent { child }) => {
                pids.push(child);
                // The write end belongs to the child alone; holding it
                // open here would keep the next reader from ever seeing
                // EOF. The previous read end was consumed by this child
                // and is dropped by the assignment.
                prev_read = pipe_pair.map(|(read, write)| {
                    drop(write);
                    read
                });
            }
            Err(e) => {
                drop(pipe_pair);
                drop(prev_read);
                abort_spawned(&pids, jobs);
                return Err(ShellError::Resource { op: "fork", source: e });
            }
        }
    }

    if pipeline.detached() {
        let id = jobs.register(pids.clone());
        Ok(Outcome::Background { id, pids })
    } else {
        wait_foreground(&pids, jobs)
    }
}

/// Block on the last stage, then probe the earlier ones without
/// blocking. A genuinely slow earlier stage is adopted by the job table
/// instead of holding up the next prompt.
fn wait_foreground(pids: &[Pid], jobs: &mut JobTable) -> Result<Outcome, ShellError> {
    let (&last, rest) = pids.split_last().expect("pipeline spawns at least one stage");
    let outcome = loop {
        match waitpid(last, None) {
            Ok(WaitStatus::Exited(_, code)) => break Outcome::Exited(code),
            Ok(WaitStatus::Signaled(_, sig, _)) => break Outcome::Signaled(sig),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(e) => {
                abort_spawned(rest, jobs);
                return Err(ShellError::Resource { op: "waitpid", source: e });
            }
        }
    };
    abort_spawned(rest, jobs);
    Ok(outcome)
}

/// Non-blocking pass over already-created stages; whatever is still
/// running gets tracked silently so a later poll reaps it.
fn abort_spawned(pids: &[Pid], jobs: &mut JobTable) {
    for &pid in pids {
        if !try_reap(pid) {
            jobs.adopt(pid);
        }
    }
}

/// One non-blocking probe. True when the pid needs no further tracking:
/// it was reaped here, or some other path already collected it.
fn try_reap(pid: Pid) -> bool {
    !matches!(
        waitpid(pid, Some(WaitPidFlag::WNOHANG)),
        Ok(WaitStatus::StillAlive)
    )
}

/// Child side. Binds stdin/stdout in priority order (explicit file,
/// then pipe, then the shell's own stream), closes every piece of
/// shell-internal plumbing, and replaces itself with the target
/// program. Returns only on failure, with the status to `_exit` with.
fn wire_and_exec(
    cmd: &Command,
    prev_read: Option<OwnedFd>,
    pipe_pair: Option<(OwnedFd, OwnedFd)>,
    argv: &[CString],
) -> i32 {
    if let Some(path) = &cmd.input {
        let file = match OpenOptions::new().read(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("msh: {}: {}", path.display(), e);
                return WIRE_FAILURE;
            }
        };
        if let Err(e) = unistd::dup2(file.as_raw_fd(), libc::STDIN_FILENO) {
            eprintln!("msh: dup2: {e}");
            return WIRE_FAILURE;
        }
    } else if let Some(read) = &prev_read {
        if let Err(e) = unistd::dup2(read.as_raw_fd(), libc::STDIN_FILENO) {
            eprintln!("msh: dup2: {e}");
            return WIRE_FAILURE;
        }
    }

    if let Some(path) = &cmd.output {
        let file = match OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
        {
            Ok(f) => f,
            Err(e) => {
                eprintln!("msh: {}: {}", path.display(), e);
                return WIRE_FAILURE;
            }
        };
        if let Err(e) = unistd::dup2(file.as_raw_fd(), libc::STDOUT_FILENO) {
            eprintln!("msh: dup2: {e}");
            return WIRE_FAILURE;
        }
    } else if let Some((_, write)) = &pipe_pair {
        if let Err(e) = unistd::dup2(write.as_raw_fd(), libc::STDOUT_FILENO) {
            eprintln!("msh: dup2: {e}");
            return WIRE_FAILURE;
        }
    }

    // The target program must not inherit any pipe end beyond the
    // standard streams just wired up.
    drop(prev_read);
    drop(pipe_pair);

    match unistd::execvp(argv[0].as_c_str(), argv) {
        Ok(_) => unreachable!(),
        Err(e) => {
            eprintln!("msh: {}: {}", cmd.program(), e);
            EXEC_FAILURE
        }
    }
}

fn to_cstrings(argv: &[String]) -> Result<Vec<CString>, ShellError> {
    argv.iter()
        .map(|a| CString::new(a.as_str()))
        .collect::<Result<_, _>>()
        .map_err(|_| ShellError::Config("argument contains an interior NUL byte".into()))
}

/// Backup of the shell's own stdin/stdout, restored unconditionally on
/// drop so a pipeline's redirections never bleed into the next prompt.
struct StdioBackup {
    stdin: OwnedFd,
    stdout: OwnedFd,
}

impl StdioBackup {
    fn save() -> Result<StdioBackup, ShellError> {
        let stdin = dup_backup(libc::STDIN_FILENO)
            .map_err(|e| ShellError::Resource { op: "dup stdin", source: e })?;
        let stdout = dup_backup(libc::STDOUT_FILENO)
            .map_err(|e| ShellError::Resource { op: "dup stdout", source: e })?;
        Ok(StdioBackup { stdin, stdout })
    }
}

impl Drop for StdioBackup {
    fn drop(&mut self) {
        // Restore failure must not kill the session; the OS-level
        // streams are still attached to the terminal.
        if let Err(e) = unistd::dup2(self.stdin.as_raw_fd(), libc::STDIN_FILENO) {
            eprintln!("msh: failed to restore stdin: {e}");
        }
        if let Err(e) = unistd::dup2(self.stdout.as_raw_fd(), libc::STDOUT_FILENO) {
            eprintln!("msh: failed to restore stdout: {e}");
        }
    }
}

/// Duplicate above the low descriptor range with close-on-exec set, so
/// launched programs never see the backup.
fn dup_backup(fd: RawFd) -> nix::Result<OwnedFd> {
    let dup = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(10))?;
    Ok(unsafe { OwnedFd::from_raw_fd(dup) })
}
