//! Platform-specific process management.
//!
//! Liveness probes, detached spawning, signal delivery and the two-phase
//! (graceful, then forced) termination used by the stop path.

use crate::error::{FgError, Result};
use std::process::Command;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Which termination request to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGTERM on Unix, `taskkill` without `/F` on Windows.
    Graceful,
    /// SIGKILL on Unix, `taskkill /F /T` on Windows.
    Forced,
}

/// What the OS reported when a signal was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDelivery {
    Delivered,
    NoSuchProcess,
}

/// How a process ended up terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPath {
    /// Exited within the grace period after the graceful request.
    Graceful,
    /// Still alive after the grace period and was force-killed.
    Forced,
    /// Already gone when the first signal was sent.
    AlreadyGone,
}

/// Check if a process with the given PID exists.
///
/// # Platform Behavior
/// - **Linux/macOS**: `kill(pid, 0)`; `EPERM` still means the process exists
/// - **Windows**: `OpenProcess` + `GetExitCodeProcess == STILL_ACTIVE`
///
/// Zombies count as alive here; [`crate::system::OsProcessTable`] filters them.
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::kill;

        let Some(nix_pid) = to_nix_pid(pid) else {
            return false;
        };
        match kill(nix_pid, None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(windows)]
    {
        is_process_alive_windows(pid)
    }

    #[cfg(not(any(unix, windows)))]
    {
        warn!("Process alive check not implemented for this platform");
        let _ = pid;
        true
    }
}

/// PIDs 0 and anything above `i32::MAX` would address process groups or
/// wrap negative, so they are never valid targets.
#[cfg(unix)]
fn to_nix_pid(pid: u32) -> Option<nix::unistd::Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(nix::unistd::Pid::from_raw(raw)),
        _ => None,
    }
}

#[cfg(windows)]
#[allow(unsafe_code)]
fn is_process_alive_windows(pid: u32) -> bool {
    use windows_sys::Win32::Foundation::{CloseHandle, STILL_ACTIVE};
    use windows_sys::Win32::System::Threading::{
        GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
    };

    // SAFETY: the handle is checked for null before use and closed exactly once.
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
        if handle.is_null() {
            return false;
        }
        let mut code: u32 = 0;
        let ok = GetExitCodeProcess(handle, &mut code) != 0;
        CloseHandle(handle);
        ok && code == STILL_ACTIVE as u32
    }
}

/// Detach a command from the controlling invocation so the child outlives it.
///
/// # Platform Behavior
/// - **Linux/macOS**: the child calls `setsid()` and leads a new session, so
///   terminal hangups and Ctrl+C in the launching shell do not reach it
/// - **Windows**: `CREATE_NEW_PROCESS_GROUP`
#[allow(unsafe_code)]
pub fn detach(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;

        // SAFETY: setsid() is async-signal-safe; the closure allocates nothing
        // and touches no locks between fork and exec.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::from)?;
                Ok(())
            });
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;

        const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }
}

/// Deliver a termination request to `pid`.
///
/// On Unix, a process that leads its own process group (every instance
/// started through [`detach`]) is signalled as a group, so helpers forked by
/// a wrapper script go down with it. Other processes are signalled alone.
///
/// A process that no longer exists is reported as
/// [`SignalDelivery::NoSuchProcess`], not as an error. Every other OS refusal
/// (for example `EPERM`) is an error.
pub fn send_signal(pid: u32, signal: TerminationSignal) -> Result<SignalDelivery> {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, killpg, Signal};
        use nix::unistd::getpgid;

        let Some(nix_pid) = to_nix_pid(pid) else {
            return Ok(SignalDelivery::NoSuchProcess);
        };
        let sig = match signal {
            TerminationSignal::Graceful => Signal::SIGTERM,
            TerminationSignal::Forced => Signal::SIGKILL,
        };

        let leads_group = match getpgid(Some(nix_pid)) {
            Ok(pgid) => pgid == nix_pid,
            Err(Errno::ESRCH) => return Ok(SignalDelivery::NoSuchProcess),
            Err(_) => false,
        };

        let sent = if leads_group {
            debug!("Sending {} to process group {}", sig, pid);
            killpg(nix_pid, sig)
        } else {
            debug!("Sending {} to process {}", sig, pid);
            kill(nix_pid, sig)
        };
        match sent {
            Ok(()) => Ok(SignalDelivery::Delivered),
            Err(Errno::ESRCH) => Ok(SignalDelivery::NoSuchProcess),
            Err(e) => Err(FgError::Signal {
                pid,
                message: format!("{} failed: {}", sig, e),
            }),
        }
    }

    #[cfg(windows)]
    {
        send_signal_windows(pid, signal)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = signal;
        Err(FgError::Signal {
            pid,
            message: "Process termination not implemented for this platform".into(),
        })
    }
}

#[cfg(windows)]
fn send_signal_windows(pid: u32, signal: TerminationSignal) -> Result<SignalDelivery> {
    let pid_arg = pid.to_string();
    let mut args = vec!["/PID", pid_arg.as_str()];
    if signal == TerminationSignal::Forced {
        args.extend(["/F", "/T"]);
    }

    debug!("Running taskkill {:?}", args);
    let output = Command::new("taskkill")
        .args(&args)
        .output()
        .map_err(|e| FgError::Signal {
            pid,
            message: format!("Failed to run taskkill: {}", e),
        })?;

    if output.status.success() {
        return Ok(SignalDelivery::Delivered);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("not found") || stderr.contains("not running") {
        Ok(SignalDelivery::NoSuchProcess)
    } else if signal == TerminationSignal::Graceful {
        // Console programs cannot receive a close request; escalation handles them.
        debug!("Graceful taskkill for {} refused: {}", pid, stderr.trim());
        Ok(SignalDelivery::Delivered)
    } else {
        Err(FgError::Signal {
            pid,
            message: stderr.trim().to_string(),
        })
    }
}

/// Reap `pid` if it is our exited child. Harmless for non-children.
fn reap(pid: u32) {
    #[cfg(unix)]
    {
        use nix::sys::wait::{waitpid, WaitPidFlag};

        if let Some(nix_pid) = to_nix_pid(pid) {
            // ECHILD means we're not the parent - that's fine, init will reap it
            let _ = waitpid(nix_pid, Some(WaitPidFlag::WNOHANG));
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

/// Poll `is_alive` until it reports false or `timeout` elapses.
fn wait_for_exit(
    pid: u32,
    timeout: Duration,
    poll: Duration,
    is_alive: &dyn Fn(u32) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        reap(pid);
        if !is_alive(pid) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        sleep(poll.min(deadline - now));
    }
}

/// Terminate a process gracefully, then forcefully once `grace` expires.
///
/// `is_alive` is the liveness probe consulted while waiting; pass a
/// zombie-aware probe so an exited-but-unreaped child counts as gone.
///
/// A hung process cannot hold this call for longer than
/// `grace + settle` plus one poll interval.
pub fn terminate_with_grace(
    pid: u32,
    grace: Duration,
    poll: Duration,
    settle: Duration,
    is_alive: &dyn Fn(u32) -> bool,
) -> Result<TerminationPath> {
    if send_signal(pid, TerminationSignal::Graceful)? == SignalDelivery::NoSuchProcess {
        debug!("Process {} was already gone", pid);
        reap(pid);
        return Ok(TerminationPath::AlreadyGone);
    }

    if wait_for_exit(pid, grace, poll, is_alive) {
        debug!("Process {} terminated gracefully", pid);
        return Ok(TerminationPath::Graceful);
    }

    debug!("Process {} still running after {:?}, forcing", pid, grace);
    if send_signal(pid, TerminationSignal::Forced)? == SignalDelivery::NoSuchProcess {
        // Exited between the last probe and the kill.
        reap(pid);
        return Ok(TerminationPath::Graceful);
    }

    if !wait_for_exit(pid, settle, poll, is_alive) {
        warn!(
            "Process {} still visible {:?} after forced kill",
            pid, settle
        );
    }
    Ok(TerminationPath::Forced)
}
