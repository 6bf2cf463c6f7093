use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use termgate_protocol::{ControlFrame, GridSize, SessionState};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::GatewayError;
use crate::launcher::{BridgeLauncher, LaunchOptions, OutputStream};
use crate::session::{Session, SessionInfo, SessionInner};
use crate::transcript::Transcript;
use crate::{BRIDGE_EXIT_GRACE_MS, MAX_CONCURRENT_SESSIONS};

/// What a resize request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Forwarded to the bridge
    Applied(GridSize),
    /// Same grid as the current one, nothing sent
    Unchanged,
    /// Non-positive dimensions, dropped
    Ignored,
}

/// Table of live sessions keyed by session id.
///
/// The table lock is never held while a session lock is being acquired, so
/// slow bridge I/O on one session never blocks lookups of another.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    launcher: Arc<dyn BridgeLauncher>,
    max_sessions: usize,
    transcript_dir: Option<PathBuf>,
    exit_grace: Duration,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("launcher", &self.launcher.name())
            .field("max_sessions", &self.max_sessions)
            .field("transcript_dir", &self.transcript_dir)
            .finish()
    }
}

impl SessionRegistry {
    pub fn new(launcher: Arc<dyn BridgeLauncher>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            launcher,
            max_sessions: MAX_CONCURRENT_SESSIONS,
            transcript_dir: None,
            exit_grace: Duration::from_millis(BRIDGE_EXIT_GRACE_MS),
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Record every session's traffic under `dir`
    pub fn with_transcripts(mut self, dir: Option<PathBuf>) -> Self {
        self.transcript_dir = dir;
        self
    }

    /// Return the session for `id`, starting a bridge if there is none.
    ///
    /// Concurrent callers for the same new id share one bridge: the first to
    /// take the session lock launches it, the rest wait and observe the result.
    pub async fn get_or_create(
        &self,
        id: &str,
        options: LaunchOptions,
    ) -> Result<Arc<Session>, GatewayError> {
        let session = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(id) {
                Some(existing) => existing.clone(),
                None => {
                    if sessions.len() >= self.max_sessions {
                        return Err(GatewayError::CapacityReached(self.max_sessions));
                    }
                    let session = Arc::new(Session::new(
                        id,
                        options.grid,
                        options.working_dir.clone(),
                    ));
                    sessions.insert(id.to_string(), session.clone());
                    session
                }
            }
        };

        let mut inner = session.inner.lock().await;
        if inner.awaiting_launch() {
            tracing::info!(
                session_id = id,
                grid = %options.grid,
                cwd = %options.working_dir.display(),
                launcher = self.launcher.name(),
                "Starting session"
            );
            match self.launcher.launch(&options).await {
                Ok(io) => {
                    inner.control = Some(io.control);
                    inner.output = Some(io.output);
                    inner.process = Some(io.process);
                    inner.transcript = self.open_transcript(id).await;
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    tracing::error!(session_id = id, "Failed to start bridge: {}", reason);
                    inner.state = SessionState::Closed;
                    inner.failure = Some(reason.clone());
                    drop(inner);
                    self.remove_entry(&session).await;
                    return Err(GatewayError::SpawnFailed {
                        id: id.to_string(),
                        reason,
                    });
                }
            }
        } else if let Some(reason) = &inner.failure {
            return Err(GatewayError::SpawnFailed {
                id: id.to_string(),
                reason: reason.clone(),
            });
        }
        drop(inner);

        Ok(session)
    }

    async fn open_transcript(&self, id: &str) -> Option<Arc<Transcript>> {
        let dir = self.transcript_dir.as_ref()?;
        match Transcript::create(dir, id).await {
            Ok(transcript) => Some(Arc::new(transcript)),
            Err(e) => {
                tracing::warn!(session_id = id, "Transcript disabled: {:#}", e);
                None
            }
        }
    }

    async fn lookup(&self, id: &str) -> Result<Arc<Session>, GatewayError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    /// Starting -> Active once the bridge is known to be ready
    pub async fn mark_active(&self, id: &str) -> Result<(), GatewayError> {
        let session = self.lookup(id).await?;
        let mut inner = session.inner.lock().await;
        match inner.state {
            SessionState::Active => Ok(()),
            from => transition(id, &mut inner, from, SessionState::Active),
        }
    }

    /// Hand the session's output stream to exactly one connection
    pub async fn attach(&self, id: &str) -> Result<OutputStream, GatewayError> {
        let session = self.lookup(id).await?;
        let mut inner = session.inner.lock().await;
        if !inner.state.is_live() {
            return Err(GatewayError::SessionClosed(id.to_string()));
        }
        let output = inner
            .output
            .take()
            .ok_or_else(|| GatewayError::AlreadyAttached(id.to_string()))?;
        inner.attached = true;
        Ok(output)
    }

    /// Forward keystrokes to the session's shell
    pub async fn send_input(&self, id: &str, data: &str) -> Result<(), GatewayError> {
        let session = self.lookup(id).await?;
        let mut inner = session.inner.lock().await;
        write_frame(id, &mut inner, &ControlFrame::input(data)).await?;

        if let Some(transcript) = &inner.transcript {
            let _ = transcript.log_input(data.as_bytes()).await;
        }
        Ok(())
    }

    /// Ask the bridge to resize its PTY. Later requests simply overwrite
    /// earlier ones.
    pub async fn resize(
        &self,
        id: &str,
        cols: i64,
        rows: i64,
    ) -> Result<ResizeOutcome, GatewayError> {
        let Some(grid) = GridSize::from_signed(cols, rows) else {
            tracing::debug!(session_id = id, cols, rows, "Ignoring resize");
            return Ok(ResizeOutcome::Ignored);
        };

        let session = self.lookup(id).await?;
        let mut inner = session.inner.lock().await;
        if !inner.state.is_live() {
            return Err(GatewayError::SessionClosed(id.to_string()));
        }
        if inner.grid == grid {
            return Ok(ResizeOutcome::Unchanged);
        }

        write_frame(id, &mut inner, &ControlFrame::resize(grid)).await?;
        inner.grid = grid;
        inner.last_resize_at = Some(Utc::now());
        tracing::debug!(session_id = id, grid = %grid, "Resized");

        if let Some(transcript) = &inner.transcript {
            let _ = transcript.log_resize(grid).await;
        }
        Ok(ResizeOutcome::Applied(grid))
    }

    /// Tear the session down and forget it. Closing an unknown or already
    /// closed session is a no-op returning `None`.
    pub async fn close(&self, id: &str) -> Result<Option<i32>, GatewayError> {
        let session = match self.sessions.read().await.get(id).cloned() {
            Some(session) => session,
            None => return Ok(None),
        };
        self.close_session(&session).await
    }

    /// Close this particular session. Unlike [`close`](Self::close), a
    /// session that reuses the id later is left alone.
    pub async fn close_session(&self, session: &Arc<Session>) -> Result<Option<i32>, GatewayError> {
        let id = session.id();
        let mut inner = session.inner.lock().await;
        let from = inner.state;
        if !from.is_live() {
            return Ok(None);
        }
        transition(id, &mut inner, from, SessionState::Closing)?;

        // Dropping the control channel is the bridge's cue to stop its shell
        inner.control = None;
        inner.output = None;
        let code = match inner.process.take() {
            Some(mut process) => match process.try_exit_code() {
                Some(code) => {
                    tracing::debug!(session_id = id, code, "Bridge had already exited");
                    Some(code)
                }
                None => match process.terminate(self.exit_grace).await {
                    Ok(code) => code,
                    Err(e) => {
                        tracing::warn!(session_id = id, "Failed to stop bridge: {}", e);
                        None
                    }
                },
            },
            None => None,
        };
        transition(id, &mut inner, SessionState::Closing, SessionState::Closed)?;

        if let Some(transcript) = inner.transcript.take() {
            let _ = transcript.log_closed(code).await;
        }
        drop(inner);

        self.remove_entry(session).await;
        tracing::info!(session_id = id, exit_code = ?code, "Session closed");
        Ok(code)
    }

    /// Remove `session` from the table unless the id was reused meanwhile
    async fn remove_entry(&self, session: &Arc<Session>) {
        let mut sessions = self.sessions.write().await;
        if let Some(current) = sessions.get(session.id()) {
            if Arc::ptr_eq(current, session) {
                sessions.remove(session.id());
            }
        }
    }

    /// Close every session; used at shutdown
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        for session in sessions {
            if let Err(e) = self.close_session(&session).await {
                tracing::warn!(session_id = session.id(), "Close failed: {}", e);
            }
        }
    }

    pub async fn state(&self, id: &str) -> Option<SessionState> {
        let session = self.sessions.read().await.get(id).cloned()?;
        let state = session.state().await;
        Some(state)
    }

    pub async fn grid(&self, id: &str) -> Option<GridSize> {
        let session = self.sessions.read().await.get(id).cloned()?;
        let grid = session.grid().await;
        Some(grid)
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Snapshot of all sessions, ordered by creation time
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(session.info().await);
        }
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        infos
    }
}

fn transition(
    id: &str,
    inner: &mut SessionInner,
    from: SessionState,
    to: SessionState,
) -> Result<(), GatewayError> {
    if !from.can_transition_to(to) {
        return Err(GatewayError::InvalidTransition {
            id: id.to_string(),
            from,
            to,
        });
    }
    inner.state = to;
    Ok(())
}

async fn write_frame(
    id: &str,
    inner: &mut SessionInner,
    frame: &ControlFrame,
) -> Result<(), GatewayError> {
    if !inner.state.is_live() {
        return Err(GatewayError::SessionClosed(id.to_string()));
    }
    let control = inner
        .control
        .as_mut()
        .ok_or_else(|| GatewayError::SessionClosed(id.to_string()))?;

    let line = frame.encode_line().map_err(|e| GatewayError::Io {
        id: id.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;
    let io_err = |source| GatewayError::Io {
        id: id.to_string(),
        source,
    };
    control.write_all(&line).await.map_err(io_err)?;
    control.flush().await.map_err(io_err)?;
    Ok(())
}
