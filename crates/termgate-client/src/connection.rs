//! Duplex connections from a tab to the gateway

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use termgate_protocol::ControlFrame;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::ClientError;

/// Something received on a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Raw terminal output
    Data(Vec<u8>),
    /// The connection ended, with the peer's reason if it gave one
    Closed(Option<String>),
}

/// Sending half of an open connection
pub trait Connection: Send {
    fn send(&mut self, frame: &ControlFrame) -> Result<(), ClientError>;

    /// Close the connection. Calling it again does nothing.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Opens connections. Incoming traffic is delivered on the returned channel,
/// which ends with [`Incoming::Closed`] or simply closes.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        url: &Url,
    ) -> Result<(Box<dyn Connection>, mpsc::UnboundedReceiver<Incoming>), ClientError>;
}

/// WebSocket connector
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &Url,
    ) -> Result<(Box<dyn Connection>, mpsc::UnboundedReceiver<Incoming>), ClientError> {
        tracing::info!("Connecting to WebSocket: {}", url);
        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let (mut sink, mut stream) = ws.split();

        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::debug!("WebSocket send failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let reason = loop {
                match stream.next().await {
                    Some(Ok(Message::Binary(data))) => {
                        let _ = incoming_tx.send(Incoming::Data(data.to_vec()));
                    }
                    Some(Ok(Message::Text(text))) => {
                        let _ = incoming_tx.send(Incoming::Data(text.as_str().as_bytes().to_vec()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            };
            tracing::info!("WebSocket connection closed");
            let _ = incoming_tx.send(Incoming::Closed(reason));
        });

        let connection = WsConnection {
            outgoing: Some(outgoing_tx),
            reader,
            writer,
        };
        Ok((Box::new(connection), incoming_rx))
    }
}

struct WsConnection {
    outgoing: Option<mpsc::UnboundedSender<Message>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection for WsConnection {
    fn send(&mut self, frame: &ControlFrame) -> Result<(), ClientError> {
        let outgoing = self
            .outgoing
            .as_ref()
            .ok_or_else(|| ClientError::Send("connection closed".into()))?;
        let json = frame_text(frame)?;
        tracing::debug!("Sending message: {}", json);
        outgoing
            .send(Message::text(json))
            .map_err(|_| ClientError::Send("connection closed".into()))
    }

    fn close(&mut self) {
        if let Some(outgoing) = self.outgoing.take() {
            let _ = outgoing.send(Message::Close(None));
        }
        self.reader.abort();
    }

    fn is_open(&self) -> bool {
        self.outgoing.is_some() && !self.writer.is_finished()
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// The gateway takes one control frame per text message, without the
/// trailing newline used on the bridge's control channel.
fn frame_text(frame: &ControlFrame) -> Result<String, ClientError> {
    let mut line = frame.encode_line()?;
    line.pop();
    String::from_utf8(line).map_err(|e| ClientError::Send(e.to_string()))
}
