use std::time::Duration;

use sysinfo::{Pid, System};
use tokio::sync::oneshot;

/// Sampling interval for the RSS monitor. 50ms gives 20 Hz, the minimum rate
/// spec.md requires for memory enforcement.
const SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

/// Polls a child's peak RSS against `limit_bytes`, killing its process group
/// the moment it's exceeded. Runs until the child exits (signaled via
/// `stop`) or is killed by this monitor, whichever comes first.
///
/// Returns `(killed, peak_rss_bytes)`. `killed` is true only when this
/// monitor issued the SIGKILL — a concurrent timeout kill reports `false`
/// here even though the process also died.
pub async fn watch_memory(pid: u32, limit_bytes: u64, mut stop: oneshot::Receiver<()>) -> (bool, u64) {
    let mut system = System::new();
    let sysinfo_pid = Pid::from_u32(pid);
    let mut peak: u64 = 0;

    loop {
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[sysinfo_pid]), true);
        if let Some(process) = system.process(sysinfo_pid) {
            let rss = process.memory();
            peak = peak.max(rss);
            if rss > limit_bytes {
                unsafe {
                    libc::kill(-(pid as i32), libc::SIGKILL);
                }
                return (true, peak);
            }
        } else {
            // Process already gone; nothing left to monitor.
            return (false, peak);
        }

        tokio::select! {
            _ = &mut stop => return (false, peak),
            _ = tokio::time::sleep(SAMPLE_INTERVAL) => {}
        }
    }
}
