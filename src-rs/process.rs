//! Launch, supersession and liveness of the application under test.
//!
//! Processes are matched by name substring. An unrelated process whose name
//! happens to contain the substring is indistinguishable from the target;
//! lookups that see more than one match say so in the debug log.

use crate::error::HarnessError;
use crate::target::ApplicationTarget;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;
use sysinfo::{Pid, Process, ProcessStatus, System};
use tracing::{debug, info, warn};

/// Process operations the orchestrator needs. [`ProcessController`] is the
/// real implementation; tests substitute their own.
pub trait ProcessControl {
    fn launch(&mut self, target: &ApplicationTarget) -> Result<u32, HarnessError>;
    fn is_alive(&mut self, target: &ApplicationTarget) -> bool;
    /// Kill every matching process. Returns how many were signalled.
    fn terminate(&mut self, target: &ApplicationTarget) -> usize;
}

/// Linux keeps at most this many bytes of a process name in `comm`.
const COMM_LEN: usize = 15;

/// The process name, extended from the executable path or `argv[0]` when
/// the kernel truncated it.
fn full_name(proc_: &Process) -> String {
    let name = proc_.name();
    if name.len() < COMM_LEN {
        return name.to_string();
    }
    let from_cmd = proc_.cmd().first().map(|arg0| Path::new(arg0.as_str()));
    proc_
        .exe()
        .into_iter()
        .chain(from_cmd)
        .filter_map(Path::file_name)
        .map(|file| file.to_string_lossy())
        .find(|file| file.starts_with(name))
        .map_or_else(|| name.to_string(), |file| file.into_owned())
}

pub struct ProcessController {
    system: System,
    supersede_settle: Duration,
    launch_warmup: Duration,
    child: Option<Child>,
}

impl ProcessController {
    pub fn new(supersede_settle: Duration, launch_warmup: Duration) -> Self {
        Self {
            system: System::new(),
            supersede_settle,
            launch_warmup,
            child: None,
        }
    }

    /// Pids of live (non-zombie) processes matching the target, excluding the
    /// harness itself. Threads are listed by the OS alongside processes and
    /// never count as instances.
    pub fn matching_pids(&mut self, target: &ApplicationTarget) -> Vec<u32> {
        self.reap_child();
        self.system.refresh_processes();
        let own = Pid::from_u32(std::process::id());
        let mut pids: Vec<u32> = self
            .system
            .processes()
            .iter()
            .filter(|(pid, proc_)| {
                **pid != own
                    && proc_.thread_kind().is_none()
                    && !matches!(proc_.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
                    && target.matches_process(&full_name(proc_))
            })
            .map(|(pid, _)| pid.as_u32())
            .collect();
        pids.sort_unstable();
        if pids.len() > 1 {
            debug!(
                pattern = %target.process_name,
                ?pids,
                "several processes match the target name"
            );
        }
        pids
    }

    fn kill_matching(&mut self, target: &ApplicationTarget) -> usize {
        let pids = self.matching_pids(target);
        let mut signalled = 0;
        for pid in pids {
            let Some(proc_) = self.system.process(Pid::from_u32(pid)) else {
                continue;
            };
            if proc_.kill() {
                info!(pid, name = proc_.name(), "killed matching process");
                signalled += 1;
            } else {
                warn!(pid, name = proc_.name(), "failed to kill matching process");
            }
        }
        signalled
    }

    /// Collect our own child if it has exited so it never lingers as a zombie.
    fn reap_child(&mut self) {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(pid = child.id(), %status, "launched process exited");
                    self.child = None;
                }
                Ok(None) => {}
                Err(err) => debug!(error = %err, "try_wait on launched process failed"),
            }
        }
    }
}

impl ProcessControl for ProcessController {
    fn launch(&mut self, target: &ApplicationTarget) -> Result<u32, HarnessError> {
        if !target.executable.is_file() {
            return Err(HarnessError::BinaryNotFound(target.executable.clone()));
        }

        let superseded = self.kill_matching(target);
        if superseded > 0 {
            info!(count = superseded, "superseded running instances");
            thread::sleep(self.supersede_settle);
        }
        self.reap_child();

        let mut cmd = Command::new(&target.executable);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group: terminal signals aimed at the harness skip the target.
            cmd.process_group(0);
        }
        let child = cmd.spawn().map_err(|source| HarnessError::LaunchFailed {
            path: target.executable.clone(),
            source,
        })?;
        let pid = child.id();
        self.child = Some(child);
        info!(pid, executable = %target.executable.display(), "launched application");

        thread::sleep(self.launch_warmup);
        Ok(pid)
    }

    fn is_alive(&mut self, target: &ApplicationTarget) -> bool {
        !self.matching_pids(target).is_empty()
    }

    fn terminate(&mut self, target: &ApplicationTarget) -> usize {
        let count = self.kill_matching(target);
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        count
    }
}
