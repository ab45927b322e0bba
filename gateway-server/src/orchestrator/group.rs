// gateway-server/src/orchestrator/group.rs
//! The toolkit runs in its own process group so that a timeout or a dropped
//! request takes down everything it started, not just the direct child.

/// Process group led by a spawned toolkit. Killed on drop unless disarmed.
#[derive(Debug)]
pub struct ProcessGroup {
    leader: Option<u32>,
}

impl ProcessGroup {
    /// `leader` must have been spawned with `process_group(0)`.
    pub fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    /// SIGKILL every process in the group. Only the first call signals.
    pub fn kill(&mut self) {
        if let Some(pgid) = self.leader.take() {
            signal_group(pgid);
        }
    }

    /// The leader exited and its output closed; leave the group alone.
    pub fn disarm(&mut self) {
        self.leader = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn signal_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    #[allow(clippy::cast_possible_wrap)]
    let group = Pid::from_raw(pgid as i32);
    match killpg(group, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {},
        Err(e) => tracing::warn!(pgid, "Failed to kill toolkit process group: {}", e),
    }
}

#[cfg(not(unix))]
fn signal_group(_pgid: u32) {}
