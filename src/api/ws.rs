//! WebSocket session connection
//!
//! The reader half is the session's listener: it starts the debate, feeds
//! directives straight into the directive channel and queues
//! cross-examination commands. A writer task forwards the session's events.
//! Closing the socket tears down the session it started, and only that one.

use super::types::{collect_attachments, ClientMessage};
use super::AppState;
use crate::runtime::{CourtError, CourtEvent, SessionCommand, SessionHandle};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};

const OUTBOUND_BUFFER: usize = 256;

pub(super) async fn handle_socket(socket: WebSocket, session_id: String, state: AppState) {
    tracing::info!(session_id = %session_id, "WebSocket client connected");
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut listener = Listener {
        session_id: session_id.clone(),
        state,
        out: out_tx,
        handle: None,
        forwarder: None,
    };

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => listener.on_text(&text).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    listener.close().await;
    writer.abort();
    tracing::info!(session_id = %session_id, "WebSocket client disconnected");
}

struct Listener {
    session_id: String,
    state: AppState,
    out: mpsc::Sender<String>,
    handle: Option<SessionHandle>,
    forwarder: Option<tokio::task::JoinHandle<()>>,
}

impl Listener {
    async fn on_text(&mut self, text: &str) {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable client message");
                self.send_error(format!("invalid message: {e}")).await;
                return;
            }
        };

        if let Err(e) = self.dispatch(message).await {
            tracing::info!(session_id = %self.session_id, error = %e, "Client request rejected");
            self.send_error(e.to_string()).await;
        }
    }

    async fn dispatch(&mut self, message: ClientMessage) -> Result<(), CourtError> {
        match message {
            ClientMessage::Start {
                dilemma,
                attachments,
                image_data,
            } => {
                let attachments = collect_attachments(attachments, image_data);
                let (handle, events) = self
                    .state
                    .store
                    .create(&self.session_id, &dilemma, attachments)
                    .await?;
                self.forwarder = Some(tokio::spawn(forward_events(events, self.out.clone())));
                self.handle = Some(handle);
                Ok(())
            }
            ClientMessage::Intervention { content } => self.session()?.interrupt(&content),
            ClientMessage::Interrupt { content } => {
                self.session()?.interrupt(content.as_deref().unwrap_or_default())
            }
            ClientMessage::StartCrossExam => {
                self.session()?.send(SessionCommand::BeginCrossExam).await
            }
            ClientMessage::ConcludeCrossExam => {
                self.session()?.send(SessionCommand::ConcludeCrossExam).await
            }
        }
    }

    /// Stop forwarding and drop the session this socket started, if any
    async fn close(mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if self.handle.take().is_some() {
            self.state.store.remove(&self.session_id).await;
        }
    }

    fn session(&self) -> Result<&SessionHandle, CourtError> {
        self.handle
            .as_ref()
            .ok_or_else(|| CourtError::SessionNotFound(self.session_id.clone()))
    }

    async fn send_error(&self, message: String) {
        if let Ok(json) = serde_json::to_string(&CourtEvent::error(message, false)) {
            let _ = self.out.send(json).await;
        }
    }
}

/// Serialize session events onto the outbound queue
async fn forward_events(mut events: broadcast::Receiver<CourtEvent>, out: mpsc::Sender<String>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, kind = event.kind(), "Failed to serialize event");
                        continue;
                    }
                };
                if out.send(json).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Client fell behind; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
