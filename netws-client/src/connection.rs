//! WebSocket connection session.

use crate::config::ClientConfig;
use crate::error::{WebSocketError, WebSocketResult};
use crate::frame::{FrameReader, FrameWriter, OpCode};
use crate::handler::MessageHandler;
use crate::handshake::{self, HandshakeRequest, HandshakeResponse, Target};
use crate::key;
use crate::message::{CloseInfo, CloseOrigin, DeliveryEvent, Incoming};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

type Reader<S> = FrameReader<BufReader<ReadHalf<S>>>;

/// The write half is shared with the delivery task so it can shut the
/// socket down after a peer close or a failed read.
type SharedWriter<W> = Arc<Mutex<FrameWriter<W>>>;

/// Which end of the connection this session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiated the connection
    Client,
    /// Accepted the connection; inbound frames must be masked
    Server,
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake not yet completed
    Connecting,
    /// Handshake done, frames flow
    Open,
    /// Closed locally, by the peer, by end of stream or by a fatal error
    Closed,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Close requested locally or by a peer close frame
    Closed(CloseInfo),
    /// The stream ended without a close frame
    EndOfStream,
    /// Handshake or protocol failure
    Failed(String),
}

#[derive(Debug)]
struct SessionState {
    state: ConnectionState,
    termination: Option<Termination>,
}

/// State shared between the session and its delivery task.
#[derive(Debug, Clone)]
struct SharedState {
    inner: Arc<RwLock<SessionState>>,
}

impl SharedState {
    fn new(state: ConnectionState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionState {
                state,
                termination: None,
            })),
        }
    }

    fn state(&self) -> ConnectionState {
        self.inner.read().state
    }

    fn set_state(&self, state: ConnectionState) {
        self.inner.write().state = state;
    }

    fn termination(&self) -> Option<Termination> {
        self.inner.read().termination.clone()
    }

    /// The first terminal condition wins.
    fn terminate(&self, termination: Termination) {
        let mut session = self.inner.write();
        session.state = ConnectionState::Closed;
        if session.termination.is_none() {
            session.termination = Some(termination);
        }
    }

    fn settle(&self, outcome: &WebSocketResult<Incoming>) {
        match outcome {
            Ok(Incoming::Closed(info)) => self.terminate(Termination::Closed(info.clone())),
            Ok(Incoming::EndOfStream) => self.terminate(Termination::EndOfStream),
            Ok(_) => {}
            Err(e) if e.is_connection_fatal() => self.terminate(Termination::Failed(e.to_string())),
            Err(_) => {}
        }
    }
}

/// A WebSocket session over any byte stream.
///
/// Reads and writes go through separate halves of the stream, so the read
/// half can be moved into a background delivery task while the owner keeps
/// sending.
pub struct Connection<S> {
    role: Role,
    config: ClientConfig,
    handshake_complete: bool,
    reader: Option<Reader<S>>,
    writer: SharedWriter<WriteHalf<S>>,
    shared: SharedState,
    delivery: Option<JoinHandle<()>>,
    handler: Option<JoinHandle<()>>,
    released: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Wrap a freshly connected stream. [`handshake`](Self::handshake) must
    /// run before frames can be exchanged.
    pub fn new(stream: S, role: Role, config: ClientConfig) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            role,
            reader: Some(FrameReader::new(BufReader::new(read_half), role, config.debug)),
            writer: Arc::new(Mutex::new(FrameWriter::new(write_half, config.debug))),
            config,
            handshake_complete: false,
            shared: SharedState::new(ConnectionState::Connecting),
            delivery: None,
            handler: None,
            released: false,
        }
    }

    /// Wrap a stream whose upgrade already happened elsewhere.
    pub fn from_upgraded(stream: S, role: Role, config: ClientConfig) -> Self {
        let mut connection = Self::new(stream, role, config);
        connection.handshake_complete = true;
        connection.shared.set_state(ConnectionState::Open);
        connection
    }

    /// Perform the opening handshake against `target`.
    ///
    /// A rejected handshake closes the session; there is no retry.
    pub async fn handshake(&mut self, target: &Target) -> WebSocketResult<()> {
        if self.handshake_complete {
            return Ok(());
        }

        match self.negotiate(target).await {
            Ok(()) => {
                self.handshake_complete = true;
                self.shared.set_state(ConnectionState::Open);
                tracing::info!(host = %target.host, port = target.port, path = %target.path, "WebSocket handshake complete");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(host = %target.host, error = %e, "WebSocket handshake failed");
                self.shared.terminate(Termination::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn negotiate(&mut self, target: &Target) -> WebSocketResult<()> {
        let key = key::generate_key(self.config.key_scheme);
        let origin = self
            .config
            .origin
            .clone()
            .unwrap_or_else(|| target.origin());
        let request = HandshakeRequest::new(target, &key, &origin);
        self.writer.lock().await.write_raw(&request.to_bytes()).await?;

        let reader = self.reader.as_mut().ok_or(WebSocketError::ReaderDetached)?;
        let head = handshake::read_response_head(reader.get_mut(), self.config.debug).await?;
        let response = HandshakeResponse::parse(&head)?;
        tracing::debug!(status = %response.status, "Received handshake response");
        response.verify(&key)
    }

    /// Send a text message.
    pub async fn send(&mut self, text: &str) -> WebSocketResult<()> {
        let mask = self.role == Role::Client && self.config.mask_outbound;
        self.send_frame(OpCode::Text, text.as_bytes(), mask).await
    }

    /// Send a single final frame.
    pub async fn send_frame(&mut self, opcode: OpCode, payload: &[u8], mask: bool) -> WebSocketResult<()> {
        self.ensure_open()?;
        self.writer.lock().await.write_frame(opcode, payload, mask).await
    }

    /// Receive the next text message.
    ///
    /// `Ok(None)` covers end of stream, a peer close and an ignored pong;
    /// use [`next_event`](Self::next_event) to tell them apart.
    pub async fn receive(&mut self) -> WebSocketResult<Option<String>> {
        Ok(self.next_event().await?.into_text())
    }

    /// Run one decode cycle and report its outcome.
    pub async fn next_event(&mut self) -> WebSocketResult<Incoming> {
        self.ensure_open()?;
        let reader = self.reader.as_mut().ok_or(WebSocketError::ReaderDetached)?;
        let outcome = reader.next_incoming().await;
        self.shared.settle(&outcome);

        match &outcome {
            Ok(Incoming::Closed(info)) => {
                tracing::info!(code = info.code, "Peer closed the connection");
                self.release().await;
            }
            Err(e) if e.is_connection_fatal() => {
                tracing::warn!(error = %e, "Closing connection after fatal read error");
                self.release().await;
            }
            _ => {}
        }

        outcome
    }

    /// Move the read half into a background task that pushes every decoded
    /// message into the returned channel.
    ///
    /// The task ends after a close, end of stream or error event, or when the
    /// receiver is dropped. Any error ends the session, and a peer close or
    /// an error also shuts down the write side.
    pub fn subscribe(&mut self) -> WebSocketResult<mpsc::Receiver<DeliveryEvent>> {
        self.ensure_open()?;
        let reader = self.reader.take().ok_or(WebSocketError::ReaderDetached)?;
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        self.delivery = Some(tokio::spawn(deliver(
            reader,
            self.writer.clone(),
            self.shared.clone(),
            tx,
        )));
        Ok(rx)
    }

    /// Deliver every decoded message to `handler` from a background task.
    pub fn spawn_handler<H: MessageHandler>(&mut self, handler: H) -> WebSocketResult<()> {
        let mut events = self.subscribe()?;
        self.handler = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    DeliveryEvent::Message(text) => handler.on_message(text).await,
                    DeliveryEvent::Closed(info) => handler.on_close(&info).await,
                    DeliveryEvent::EndOfStream => handler.on_end_of_stream().await,
                    DeliveryEvent::Error(e) => handler.on_error(&e).await,
                }
            }
        }));
        Ok(())
    }

    /// Close the connection.
    ///
    /// No close frame is sent; the socket's write side is shut down and the
    /// close is recorded. Calling it again is a no-op.
    pub async fn close(&mut self, code: u16, reason: &str, origin: CloseOrigin) -> WebSocketResult<()> {
        self.stop_tasks();
        if self.released {
            return Ok(());
        }

        self.shared
            .terminate(Termination::Closed(CloseInfo::new(code, reason, origin)));
        tracing::debug!(code, origin = ?origin, "Closing connection");
        self.release().await;
        Ok(())
    }

    async fn release(&mut self) {
        self.released = true;
        self.reader = None;
        if let Err(e) = self.writer.lock().await.shutdown().await {
            tracing::debug!(error = %e, "Socket shutdown failed");
        }
    }

    fn stop_tasks(&mut self) {
        for task in [self.delivery.take(), self.handler.take()].into_iter().flatten() {
            task.abort();
        }
    }

    fn ensure_open(&self) -> WebSocketResult<()> {
        if !self.handshake_complete {
            return Err(WebSocketError::HandshakeRequired);
        }
        if self.shared.state() == ConnectionState::Closed {
            return Err(WebSocketError::ConnectionClosed);
        }
        Ok(())
    }
}

impl<S> Connection<S> {
    /// Get the connection role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Get the connection configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Check if the opening handshake completed.
    pub fn is_handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    /// Get the connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Check if the connection is open.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// How the session ended, once it has.
    pub fn termination(&self) -> Option<Termination> {
        self.shared.termination()
    }

    /// Recorded close status, if the session was closed by either side.
    pub fn close_info(&self) -> Option<CloseInfo> {
        match self.termination() {
            Some(Termination::Closed(info)) => Some(info),
            _ => None,
        }
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("state", &self.state())
            .field("handshake_complete", &self.handshake_complete)
            .finish_non_exhaustive()
    }
}

impl<S> Drop for Connection<S> {
    fn drop(&mut self) {
        for task in [self.delivery.take(), self.handler.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

async fn deliver<R, W>(
    mut reader: FrameReader<R>,
    writer: SharedWriter<W>,
    shared: SharedState,
    tx: mpsc::Sender<DeliveryEvent>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let outcome = reader.next_incoming().await;
        shared.settle(&outcome);

        let event = match outcome {
            Ok(Incoming::Text(text)) => DeliveryEvent::Message(text),
            Ok(Incoming::Ignored) => continue,
            Ok(Incoming::Closed(info)) => {
                tracing::info!(code = info.code, "Peer closed the connection");
                DeliveryEvent::Closed(info)
            }
            Ok(Incoming::EndOfStream) => DeliveryEvent::EndOfStream,
            Err(e) => {
                tracing::error!(error = %e, "WebSocket delivery loop stopped");
                // Nothing reads after this, so the session is over.
                shared.terminate(Termination::Failed(e.to_string()));
                DeliveryEvent::Error(e)
            }
        };

        if matches!(event, DeliveryEvent::Closed(_) | DeliveryEvent::Error(_)) {
            if let Err(e) = writer.lock().await.shutdown().await {
                tracing::debug!(error = %e, "Socket shutdown failed");
            }
        }

        let terminal = event.is_terminal();
        if tx.send(event).await.is_err() || terminal {
            break;
        }
    }
}
