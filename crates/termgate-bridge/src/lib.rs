//! The bridge process: one shell on one pseudo-terminal.
//!
//! stdin carries newline-delimited JSON control frames, stdout carries the
//! PTY output byte for byte, stderr carries [`BridgeEvent`] lines and logs.

pub mod config;
mod pty;
pub mod relay;

use std::io::{self, BufReader, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use portable_pty::ExitStatus;
use termgate_protocol::{env, BridgeEvent};
use tracing_subscriber::EnvFilter;

pub use config::BridgeConfig;
pub use pty::{PtyInput, PtyShell};
pub use relay::{relay_output, Applied, ControlRelay, OutputEnd, PtyControl};

/// How long the output relay may keep draining after the shell exits
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Route bridge logs to stderr without colors; `BRIDGE_LOG` sets the filter
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(env::BRIDGE_LOG).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}

fn emit(event: &BridgeEvent) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{}", event.to_line());
    let _ = stderr.flush();
}

/// The code the bridge exits with for a finished shell. portable-pty only
/// exposes the terminating signal through `Display`.
pub fn exit_code_of(status: &ExitStatus) -> i32 {
    if !status.success() && status.to_string().starts_with("Terminated by") {
        return 0;
    }
    i32::try_from(status.exit_code()).unwrap_or(1)
}

/// Run the bridge until the shell exits. Returns the process exit code:
/// the shell's own code, or 0 when it was killed by a signal.
pub fn run(config: BridgeConfig) -> Result<i32> {
    let PtyShell {
        input,
        output,
        mut child,
    } = PtyShell::spawn(&config)?;

    emit(&BridgeEvent::Ready {
        pid: child.process_id(),
        cols: config.grid.cols(),
        rows: config.grid.rows(),
    });
    tracing::info!(shell = %config.shell, grid = %config.grid, cwd = %config.cwd.display(), "Shell started");

    let (done_tx, done_rx) = mpsc::channel();
    thread::Builder::new()
        .name("pty-output".into())
        .spawn(move || {
            let end = relay_output(output, io::stdout());
            if end == OutputEnd::ReaderGone {
                // Nobody is listening any more; that is a normal ending
                std::process::exit(0);
            }
            let _ = done_tx.send(end);
        })
        .context("Failed to start output relay")?;

    let mut killer = child.clone_killer();
    thread::Builder::new()
        .name("pty-control".into())
        .spawn(move || {
            let mut relay = ControlRelay::new(input);
            match relay.run(BufReader::new(io::stdin())) {
                Ok(()) => tracing::debug!("Control channel closed"),
                Err(e) => tracing::warn!("Control relay stopped: {}", e),
            }
            // Gateway hung up; take the shell down with us
            let _ = killer.kill();
        })
        .context("Failed to start control relay")?;

    let status = child.wait().context("Failed to wait for shell")?;
    let code = exit_code_of(&status);
    tracing::debug!(%status, code, "Shell finished");

    if done_rx.recv_timeout(DRAIN_GRACE).is_err() {
        tracing::debug!("Output relay still busy after shell exit");
    }
    emit(&BridgeEvent::Exited { code });
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_passes_through() {
        assert_eq!(exit_code_of(&ExitStatus::with_exit_code(0)), 0);
        assert_eq!(exit_code_of(&ExitStatus::with_exit_code(3)), 3);
        assert_eq!(exit_code_of(&ExitStatus::with_exit_code(u32::MAX)), 1);
    }

    #[test]
    fn test_signalled_shell_exits_zero() {
        assert_eq!(exit_code_of(&ExitStatus::with_signal("Killed")), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_signalled_std_status_exits_zero() {
        use std::os::unix::process::ExitStatusExt;

        // Raw wait status 9: killed by SIGKILL
        let status: ExitStatus = std::process::ExitStatus::from_raw(9).into();
        assert_eq!(exit_code_of(&status), 0);

        // Raw wait status 0x0200: exited with code 2
        let status: ExitStatus = std::process::ExitStatus::from_raw(0x0200).into();
        assert_eq!(exit_code_of(&status), 2);
    }
}
