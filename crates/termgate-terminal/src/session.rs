use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use termgate_protocol::{GridSize, SessionState};
use tokio::sync::Mutex;

use crate::launcher::{BridgeProcess, ControlSink, OutputStream};
use crate::transcript::Transcript;

/// One terminal session: the pairing of a session id with a bridge
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    pub(crate) inner: Mutex<SessionInner>,
}

pub(crate) struct SessionInner {
    pub state: SessionState,
    pub grid: GridSize,
    pub working_dir: PathBuf,
    pub last_resize_at: Option<DateTime<Utc>>,
    pub control: Option<ControlSink>,
    pub output: Option<OutputStream>,
    pub process: Option<Box<dyn BridgeProcess>>,
    pub attached: bool,
    /// Set when the bridge could not be started
    pub failure: Option<String>,
    pub transcript: Option<Arc<Transcript>>,
}

impl SessionInner {
    /// Nobody has tried to start the bridge yet
    pub fn awaiting_launch(&self) -> bool {
        self.state == SessionState::Starting && self.process.is_none() && self.failure.is_none()
    }
}

/// Snapshot of a session for listings
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionInfo {
    pub id: String,
    pub state: SessionState,
    pub cols: u16,
    pub rows: u16,
    pub working_dir: String,
    pub attached: bool,
    pub bridge_pid: Option<u32>,
    pub created_at: String,
    pub last_resize_at: Option<String>,
}

impl Session {
    pub(crate) fn new(id: &str, grid: GridSize, working_dir: PathBuf) -> Self {
        Self {
            id: id.to_string(),
            created_at: Utc::now(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Starting,
                grid,
                working_dir,
                last_resize_at: None,
                control: None,
                output: None,
                process: None,
                attached: false,
                failure: None,
                transcript: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn grid(&self) -> GridSize {
        self.inner.lock().await.grid
    }

    pub async fn transcript(&self) -> Option<Arc<Transcript>> {
        self.inner.lock().await.transcript.clone()
    }

    pub async fn info(&self) -> SessionInfo {
        let inner = self.inner.lock().await;
        SessionInfo {
            id: self.id.clone(),
            state: inner.state,
            cols: inner.grid.cols(),
            rows: inner.grid.rows(),
            working_dir: inner.working_dir.display().to_string(),
            attached: inner.attached,
            bridge_pid: inner.process.as_ref().and_then(|p| p.id()),
            created_at: self.created_at.to_rfc3339(),
            last_resize_at: inner.last_resize_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
