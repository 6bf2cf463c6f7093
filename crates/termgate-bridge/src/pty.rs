use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use termgate_protocol::GridSize;

use crate::config::{BridgeConfig, TERM_NAME};
use crate::relay::PtyControl;

/// A shell attached to a freshly allocated pseudo-terminal
pub struct PtyShell {
    pub input: PtyInput,
    pub output: Box<dyn Read + Send>,
    pub child: Box<dyn Child + Send + Sync>,
}

/// Write side of the PTY: keystrokes and window size
pub struct PtyInput {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
}

impl PtyShell {
    /// Allocate a PTY of the configured size and spawn the shell on it
    pub fn spawn(config: &BridgeConfig) -> Result<Self> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(pty_size(config.grid))
            .context("Failed to open PTY")?;

        // Inherits the bridge's full environment
        let mut cmd = CommandBuilder::new(&config.shell);
        cmd.cwd(&config.cwd);
        cmd.env("TERM", TERM_NAME);

        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("Failed to spawn '{}' in PTY", config.shell))?;

        // Keeping the slave open would hide the shell's exit from the reader
        drop(pair.slave);

        let output = pair
            .master
            .try_clone_reader()
            .context("Failed to clone PTY reader")?;
        let writer = pair
            .master
            .take_writer()
            .context("Failed to take PTY writer")?;

        Ok(Self {
            input: PtyInput {
                master: pair.master,
                writer,
            },
            output,
            child,
        })
    }
}

impl PtyControl for PtyInput {
    fn write_input(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }

    fn resize(&mut self, grid: GridSize) -> Result<()> {
        self.master
            .resize(pty_size(grid))
            .context("Failed to resize PTY")
    }
}

fn pty_size(grid: GridSize) -> PtySize {
    PtySize {
        rows: grid.rows(),
        cols: grid.cols(),
        pixel_width: 0,
        pixel_height: 0,
    }
}
