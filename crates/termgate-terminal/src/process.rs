use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use termgate_protocol::{env, BridgeEvent};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};

use crate::launcher::{BridgeIo, BridgeLauncher, BridgeProcess, LaunchOptions};

/// Launches the bridge executable as a child process
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    bridge_path: PathBuf,
    shell: Option<String>,
}

impl ProcessLauncher {
    pub fn new(bridge_path: impl Into<PathBuf>) -> Self {
        Self {
            bridge_path: bridge_path.into(),
            shell: None,
        }
    }

    /// Shell the bridge should run instead of its platform default
    pub fn with_shell(mut self, shell: Option<String>) -> Self {
        self.shell = shell;
        self
    }

    /// `termgate-bridge` next to the running executable
    pub fn default_bridge_path() -> Result<PathBuf> {
        let exe = std::env::current_exe().context("Failed to locate current executable")?;
        let dir = exe
            .parent()
            .context("Current executable has no parent directory")?;
        Ok(dir.join(format!("termgate-bridge{}", std::env::consts::EXE_SUFFIX)))
    }
}

#[async_trait]
impl BridgeLauncher for ProcessLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<BridgeIo> {
        let mut cmd = Command::new(&self.bridge_path);
        cmd.env(env::PTY_COLS, options.grid.cols().to_string())
            .env(env::PTY_ROWS, options.grid.rows().to_string())
            .env(env::PTY_CWD, &options.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(shell) = &self.shell {
            cmd.env(env::SHELL_PATH, shell);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn bridge {}", self.bridge_path.display()))?;

        let stdin = child.stdin.take().context("Bridge stdin unavailable")?;
        let stdout = child.stdout.take().context("Bridge stdout unavailable")?;
        let stderr = child.stderr.take().context("Bridge stderr unavailable")?;

        let mut lines = BufReader::new(stderr).lines();
        let shell_pid = wait_until_ready(&mut child, &mut lines, &options.session_id).await?;

        tracing::debug!(
            session_id = %options.session_id,
            bridge_pid = ?child.id(),
            shell_pid = ?shell_pid,
            "Bridge ready"
        );
        tokio::spawn(forward_bridge_log(options.session_id.clone(), lines));

        Ok(BridgeIo {
            control: Box::new(stdin),
            output: Box::new(stdout),
            process: Box::new(ChildBridge { child }),
        })
    }

    fn name(&self) -> &str {
        "process"
    }
}

/// Read stderr until the bridge announces its PTY. Anything else it prints
/// first is kept as the failure reason if it never gets there.
async fn wait_until_ready(
    child: &mut Child,
    lines: &mut Lines<BufReader<ChildStderr>>,
    session_id: &str,
) -> Result<Option<u32>> {
    let mut early = Vec::new();
    loop {
        let line = lines
            .next_line()
            .await
            .context("Failed to read bridge stderr")?;
        match line {
            Some(line) => match BridgeEvent::parse(&line) {
                Some(BridgeEvent::Ready { pid, .. }) => return Ok(pid),
                _ => {
                    tracing::debug!(session_id, "[bridge] {}", line);
                    early.push(line);
                }
            },
            None => {
                let status = child.wait().await.ok();
                let detail = if early.is_empty() {
                    "no output".to_string()
                } else {
                    early.join("; ")
                };
                match status {
                    Some(status) => bail!("bridge exited before ready ({}): {}", status, detail),
                    None => bail!("bridge exited before ready: {}", detail),
                }
            }
        }
    }
}

async fn forward_bridge_log(session_id: String, mut lines: Lines<BufReader<ChildStderr>>) {
    while let Ok(Some(line)) = lines.next_line().await {
        match BridgeEvent::parse(&line) {
            Some(BridgeEvent::Exited { code }) => {
                tracing::debug!(session_id = %session_id, code, "Shell exited");
            }
            _ => tracing::debug!(session_id = %session_id, "[bridge] {}", line),
        }
    }
}

struct ChildBridge {
    child: Child,
}

#[async_trait]
impl BridgeProcess for ChildBridge {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_exit_code(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.code().unwrap_or(0)),
            _ => None,
        }
    }

    async fn terminate(&mut self, grace: Duration) -> io::Result<Option<i32>> {
        // With stdin closed the bridge takes its shell down and exits itself
        if let Ok(status) = tokio::time::timeout(grace, self.child.wait()).await {
            return Ok(status?.code());
        }

        tracing::debug!(pid = ?self.child.id(), "Bridge did not exit in time, killing");
        self.child.kill().await?;
        Ok(self.child.wait().await?.code())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;
    use termgate_protocol::GridSize;

    fn options(dir: &Path) -> LaunchOptions {
        LaunchOptions {
            session_id: "t".into(),
            grid: GridSize::default(),
            working_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_missing_bridge_binary_fails_to_launch() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ProcessLauncher::new(dir.path().join("no-such-bridge"));
        let err = launcher.launch(&options(dir.path())).await.err().unwrap();
        assert!(format!("{err:#}").contains("Failed to spawn bridge"));
    }

    #[tokio::test]
    async fn test_bridge_that_exits_early_reports_its_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-bridge.sh");
        std::fs::write(&script, "#!/bin/sh\necho 'cannot open pty' >&2\nexit 3\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let launcher = ProcessLauncher::new(&script);
        let err = launcher.launch(&options(dir.path())).await.err().unwrap();
        let message = format!("{err:#}");
        assert!(message.contains("before ready"), "{message}");
        assert!(message.contains("cannot open pty"), "{message}");
    }
}
