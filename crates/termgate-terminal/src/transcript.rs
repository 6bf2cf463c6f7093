use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use termgate_protocol::GridSize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Per-session transcript of terminal traffic, one JSON object per line
pub struct Transcript {
    session_id: String,
    path: PathBuf,
    file: Mutex<File>,
}

impl Transcript {
    /// Open (or append to) `session-<id>.jsonl` under `dir`
    pub async fn create(dir: &Path, session_id: &str) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .context("Failed to create transcript directory")?;

        let path = dir.join(format!("session-{}.jsonl", session_id));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open transcript {}", path.display()))?;

        Ok(Self {
            session_id: session_id.to_string(),
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log input sent to the shell
    pub async fn log_input(&self, data: &[u8]) -> Result<()> {
        self.log_data("in", data).await
    }

    /// Log output produced by the shell
    pub async fn log_output(&self, data: &[u8]) -> Result<()> {
        self.log_data("out", data).await
    }

    pub async fn log_resize(&self, grid: GridSize) -> Result<()> {
        self.append(json!({
            "timestamp": Utc::now().to_rfc3339(),
            "session_id": self.session_id,
            "event": "resize",
            "cols": grid.cols(),
            "rows": grid.rows(),
        }))
        .await
    }

    pub async fn log_closed(&self, exit_code: Option<i32>) -> Result<()> {
        self.append(json!({
            "timestamp": Utc::now().to_rfc3339(),
            "session_id": self.session_id,
            "event": "closed",
            "exit_code": exit_code,
        }))
        .await
    }

    async fn log_data(&self, direction: &str, data: &[u8]) -> Result<()> {
        self.append(json!({
            "timestamp": Utc::now().to_rfc3339(),
            "session_id": self.session_id,
            "direction": direction,
            "data": String::from_utf8_lossy(data),
        }))
        .await
    }

    async fn append(&self, entry: Value) -> Result<()> {
        let mut line = entry.to_string();
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .context("Failed to write to transcript")?;
        file.flush().await?;
        Ok(())
    }
}
