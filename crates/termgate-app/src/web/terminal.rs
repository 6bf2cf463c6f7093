//! WebSocket transport for terminal sessions.
//!
//! One connection drives one session. Client text is decoded into control
//! frames for the bridge; bridge output goes back as binary messages,
//! untouched. Whichever side ends first takes the session down.
//!
//! Binary client messages are typed as keystrokes. The control channel
//! carries input as JSON strings, so a binary message that is not valid
//! UTF-8 is dropped rather than mangled.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use termgate_protocol::{banner, ControlFrame, OUTPUT_CHUNK_SIZE};
use termgate_terminal::{GatewayError, OutputStream, ResizeOutcome, SessionRegistry, Transcript};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::web::routes::AppState;

const MAX_SESSION_ID_LEN: usize = 128;

/// Query parameters of a terminal connection
#[derive(Debug, Default, Deserialize)]
pub struct TerminalQuery {
    pub workspace: Option<String>,
    pub cols: Option<i64>,
    pub rows: Option<i64>,
}

/// 1 to 128 characters of `[A-Za-z0-9_.-]`
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

/// GET /terminal/:session_id - WebSocket endpoint
pub async fn terminal_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<TerminalQuery>,
) -> Response {
    if !is_valid_session_id(&session_id) {
        let body = Json(serde_json::json!({
            "error": format!("Invalid session id '{}'", session_id),
            "status": 400,
        }));
        return (StatusCode::BAD_REQUEST, body).into_response();
    }
    ws.on_upgrade(move |socket| handle_terminal(socket, state, session_id, query))
}

/// Why the connection-to-bridge pump stopped
#[derive(Debug)]
enum InputEnd {
    ClientClosed,
    BridgeGone(GatewayError),
}

/// Why the bridge-to-connection pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputEnd {
    BridgeEnded,
    ClientGone,
    Cancelled,
}

async fn handle_terminal(
    mut socket: WebSocket,
    state: AppState,
    session_id: String,
    query: TerminalQuery,
) {
    let registry = state.registry.clone();
    let options = state.config.launch_options(
        &session_id,
        query.workspace.as_deref(),
        query.cols,
        query.rows,
    );

    let session = match registry.get_or_create(&session_id, options).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(session_id = %session_id, "Refusing connection: {}", e);
            refuse_start(&mut socket, &e).await;
            return;
        }
    };

    let output = match registry.attach(&session_id).await {
        Ok(output) => output,
        Err(GatewayError::AlreadyAttached(_)) => {
            tracing::warn!(session_id = %session_id, "Session already has a connection");
            refuse(
                &mut socket,
                banner::already_attached(&session_id),
                close_code::POLICY,
                "already attached",
            )
            .await;
            return;
        }
        Err(e) => {
            tracing::warn!(session_id = %session_id, "Attach failed: {}", e);
            refuse_start(&mut socket, &e).await;
            return;
        }
    };

    if let Err(e) = registry.mark_active(&session_id).await {
        tracing::warn!(session_id = %session_id, "Session not usable: {}", e);
        refuse_start(&mut socket, &e).await;
        let _ = registry.close_session(&session).await;
        return;
    }

    tracing::info!(session_id = %session_id, "Terminal connected");
    if socket
        .send(Message::Binary(banner::connected(&session_id).into_bytes()))
        .await
        .is_err()
    {
        let _ = registry.close_session(&session).await;
        return;
    }

    let (sink, mut stream) = socket.split();
    let cancel = CancellationToken::new();
    let transcript = session.transcript().await;
    let mut output_task = tokio::spawn(pump_output(output, sink, cancel.clone(), transcript));

    let joined = tokio::select! {
        end = pump_input(&mut stream, &registry, &session_id) => {
            match end {
                InputEnd::ClientClosed => {
                    tracing::debug!(session_id = %session_id, "Client closed the connection")
                }
                InputEnd::BridgeGone(e) => {
                    tracing::warn!(session_id = %session_id, "Bridge stopped accepting input: {}", e)
                }
            }
            cancel.cancel();
            output_task.await
        }
        joined = &mut output_task => joined,
    };

    let code = match registry.close_session(&session).await {
        Ok(code) => code,
        Err(e) => {
            tracing::warn!(session_id = %session_id, "Close failed: {}", e);
            None
        }
    };
    tracing::info!(session_id = %session_id, exit_code = ?code, "Terminal disconnected");

    match joined {
        Ok((mut sink, OutputEnd::BridgeEnded)) => {
            let _ = sink
                .send(Message::Binary(banner::process_exited(code).into_bytes()))
                .await;
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: Cow::Borrowed("session ended"),
                })))
                .await;
        }
        Ok(_) => {}
        Err(e) => tracing::error!(session_id = %session_id, "Output pump failed: {}", e),
    }
}

async fn refuse_start(socket: &mut WebSocket, error: &GatewayError) {
    refuse(
        socket,
        banner::start_failed(&error.to_string()),
        close_code::ERROR,
        "start failed",
    )
    .await;
}

/// Tell the client why it cannot have the session, then close
async fn refuse(socket: &mut WebSocket, banner: String, code: u16, reason: &'static str) {
    let _ = socket.send(Message::Binary(banner.into_bytes())).await;
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: Cow::Borrowed(reason),
        })))
        .await;
}

/// Connection -> bridge
async fn pump_input(
    stream: &mut SplitStream<WebSocket>,
    registry: &Arc<SessionRegistry>,
    session_id: &str,
) -> InputEnd {
    while let Some(message) = stream.next().await {
        let frame = match message {
            Ok(Message::Text(text)) => ControlFrame::from_client_text(&text),
            Ok(Message::Binary(bytes)) => match binary_input(bytes) {
                Some(frame) => frame,
                None => {
                    tracing::warn!(session_id, "Dropping binary message that is not UTF-8");
                    continue;
                }
            },
            Ok(Message::Close(_)) => return InputEnd::ClientClosed,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(session_id, "WebSocket error: {}", e);
                return InputEnd::ClientClosed;
            }
        };

        let result = match frame {
            ControlFrame::Input { data } => registry.send_input(session_id, &data).await,
            ControlFrame::Resize {
                cols: Some(cols),
                rows: Some(rows),
            } => registry.resize(session_id, cols, rows).await.map(|outcome| {
                if outcome == ResizeOutcome::Ignored {
                    tracing::debug!(session_id, cols, rows, "Ignored resize");
                }
            }),
            ControlFrame::Resize { .. } | ControlFrame::Unknown => {
                tracing::debug!(session_id, "Ignoring incomplete frame");
                Ok(())
            }
        };

        if let Err(e) = result {
            return InputEnd::BridgeGone(e);
        }
    }
    InputEnd::ClientClosed
}

/// Keystrokes carried in a binary message, if they are valid UTF-8
fn binary_input(bytes: Vec<u8>) -> Option<ControlFrame> {
    String::from_utf8(bytes).ok().map(ControlFrame::input)
}

/// Bridge -> connection. Hands the sink back so the caller can still
/// say goodbye.
async fn pump_output(
    mut output: OutputStream,
    mut sink: SplitSink<WebSocket, Message>,
    cancel: CancellationToken,
    transcript: Option<Arc<Transcript>>,
) -> (SplitSink<WebSocket, Message>, OutputEnd) {
    let mut buf = vec![0u8; OUTPUT_CHUNK_SIZE];
    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return (sink, OutputEnd::Cancelled),
            read = output.read(&mut buf) => read,
        };

        let n = match read {
            Ok(0) => return (sink, OutputEnd::BridgeEnded),
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Bridge output failed: {}", e);
                return (sink, OutputEnd::BridgeEnded);
            }
        };

        if let Some(transcript) = &transcript {
            let _ = transcript.log_output(&buf[..n]).await;
        }
        if sink.send(Message::Binary(buf[..n].to_vec())).await.is_err() {
            return (sink, OutputEnd::ClientGone);
        }
    }
}
