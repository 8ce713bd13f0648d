//! Background job tracking: every stage handle is probed with a
//! non-blocking wait between prompts and reaped exactly once.

use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

pub type JobId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageStatus {
    Running,
    Exited(i32),
    Signaled(Signal),
    /// Another code path already reaped this pid; nothing left to
    /// collect and nothing to report as a fault.
    Lost,
}

#[derive(Debug)]
struct StageHandle {
    pid: Pid,
    status: StageStatus,
}

#[derive(Debug)]
struct Job {
    id: JobId,
    stages: Vec<StageHandle>,
}

impl Job {
    fn done(&self) -> bool {
        self.stages.iter().all(|s| s.status != StageStatus::Running)
    }

    /// The last stage speaks for the pipeline, as in the foreground case.
    fn outcome(&self) -> JobOutcome {
        match self.stages.last().map(|s| s.status) {
            Some(StageStatus::Exited(code)) if code != 0 => JobOutcome::Failed(code),
            Some(StageStatus::Signaled(sig)) => JobOutcome::Killed(sig),
            _ => JobOutcome::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    Failed(i32),
    Killed(Signal),
}

/// Completion notice for one job, emitted exactly once.
#[derive(Debug)]
pub struct JobReport {
    pub id: JobId,
    pub outcome: JobOutcome,
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            JobOutcome::Done => write!(f, "[{}] done", self.id),
            JobOutcome::Failed(code) => write!(f, "[{}] exited with status {}", self.id, code),
            JobOutcome::Killed(sig) => write!(f, "[{}] killed by {}", self.id, sig.as_str()),
        }
    }
}

/// In-flight background process groups, private to one session.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    /// Pids from aborted or partially reaped pipelines: polled like any
    /// stage handle, but never reported.
    orphans: Vec<Pid>,
}

impl JobTable {
    pub fn new() -> JobTable {
        JobTable::default()
    }

    /// Track a freshly launched detached pipeline. The returned id is
    /// derived from the table size at registration time.
    pub fn register(&mut self, pids: Vec<Pid>) -> JobId {
        debug_assert!(!pids.is_empty(), "a job never contains zero stages");
        let id = self.jobs.len() + 1;
        self.jobs.push(Job {
            id,
            stages: pids
                .into_iter()
                .map(|pid| StageHandle {
                    pid,
                    status: StageStatus::Running,
                })
                .collect(),
        });
        id
    }

    /// Track a pid whose pipeline is not a reportable job, only so it
    /// does not linger as a zombie.
    pub fn adopt(&mut self, pid: Pid) {
        self.orphans.push(pid);
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.orphans.is_empty()
    }

    /// One non-blocking pass over every tracked handle. Finished jobs
    /// are removed and returned; callers print each report on its own
    /// line before the next prompt.
    pub fn poll(&mut self) -> Vec<JobReport> {
        self.orphans.retain(|&pid| {
            matches!(
                waitpid(pid, Some(WaitPidFlag::WNOHANG)),
                Ok(WaitStatus::StillAlive)
            )
        });

        for job in &mut self.jobs {
            for stage in &mut job.stages {
                if stage.status != StageStatus::Running {
                    // already reaped; a second wait would be a logic error
                    continue;
                }
                stage.status = match waitpid(stage.pid, Some(WaitPidFlag::WNOHANG)) {
                    Ok(WaitStatus::StillAlive) => StageStatus::Running,
                    Ok(WaitStatus::Exited(_, code)) => StageStatus::Exited(code),
                    Ok(WaitStatus::Signaled(_, sig, _)) => StageStatus::Signaled(sig),
                    Ok(_) => StageStatus::Running,
                    Err(Errno::ECHILD) => StageStatus::Lost,
                    Err(e) => {
                        eprintln!("msh: waitpid {}: {}", stage.pid, e);
                        StageStatus::Lost
                    }
                };
            }
        }

        let mut reports = Vec::new();
        self.jobs.retain(|job| {
            if job.done() {
                reports.push(JobReport {
                    id: job.id,
                    outcome: job.outcome(),
                });
                false
            } else {
                true
            }
        });
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{fork, ForkResult};
    use std::time::Duration;

    fn spawn_child(code: i32) -> Pid {
        match unsafe { fork() }.expect("fork") {
            ForkResult::Child => unsafe { libc::_exit(code) },
            ForkResult::Parent { child } => child,
        }
    }

    fn poll_until_report(table: &mut JobTable) -> Vec<JobReport> {
        for _ in 0..200 {
            let reports = table.poll();
            if !reports.is_empty() {
                return reports;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("job never completed");
    }

    #[test]
    fn completion_is_reported_exactly_once() {
        let mut table = JobTable::new();
        let id = table.register(vec![spawn_child(0), spawn_child(0)]);
        let reports = poll_until_report(&mut table);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, id);
        assert_eq!(reports[0].outcome, JobOutcome::Done);
        assert!(table.poll().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn failing_last_stage_is_reported_as_a_failure() {
        let mut table = JobTable::new();
        table.register(vec![spawn_child(0), spawn_child(3)]);
        let reports = poll_until_report(&mut table);
        assert_eq!(reports[0].outcome, JobOutcome::Failed(3));
    }

    #[test]
    fn already_reaped_handle_is_not_a_fault() {
        let mut table = JobTable::new();
        let pid = spawn_child(0);
        waitpid(pid, None).expect("reap");
        table.register(vec![pid]);
        let reports = poll_until_report(&mut table);
        assert_eq!(reports[0].outcome, JobOutcome::Done);
    }

    #[test]
    fn adopted_pids_are_reaped_silently() {
        let mut table = JobTable::new();
        table.adopt(spawn_child(0));
        for _ in 0..200 {
            assert!(table.poll().is_empty());
            if table.is_empty() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("orphan never reaped");
    }

    #[test]
    fn independent_jobs_report_independently() {
        let mut table = JobTable::new();
        let first = table.register(vec![spawn_child(0)]);
        let second = table.register(vec![spawn_child(0)]);
        assert_ne!(first, second);
        let mut seen = Vec::new();
        for _ in 0..200 {
            seen.extend(table.poll());
            if seen.len() == 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let mut ids: Vec<JobId> = seen.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![first, second]);
    }
}
