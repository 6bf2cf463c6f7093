//! Bridge launcher abstraction: how the registry obtains a bridge

use anyhow::Result;
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use termgate_protocol::GridSize;
use tokio::io::{AsyncRead, AsyncWrite};

/// Control channel into a bridge (newline-delimited JSON)
pub type ControlSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Raw PTY output coming out of a bridge
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Parameters for starting one bridge
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub session_id: String,
    pub grid: GridSize,
    pub working_dir: PathBuf,
}

/// A running bridge: its two channels and a handle on the process
pub struct BridgeIo {
    pub control: ControlSink,
    pub output: OutputStream,
    pub process: Box<dyn BridgeProcess>,
}

/// Handle on a running bridge process
#[async_trait]
pub trait BridgeProcess: Send {
    /// OS process id, when there is one
    fn id(&self) -> Option<u32>;

    /// Exit code if the bridge has already exited, without blocking
    fn try_exit_code(&mut self) -> Option<i32>;

    /// Wait up to `grace` for the bridge to exit on its own, then kill it.
    /// Returns the exit code when the bridge exited normally.
    async fn terminate(&mut self, grace: Duration) -> io::Result<Option<i32>>;
}

/// Starts bridges. Implementations must only return once the bridge's PTY
/// is ready, or fail.
#[async_trait]
pub trait BridgeLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<BridgeIo>;

    /// Launcher name for debugging
    fn name(&self) -> &str;
}
