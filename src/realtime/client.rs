//! Realtime client with automatic reconnection

use super::backoff::Backoff;
use super::observers::{ObserverSet, Subscription};
use super::transport::{FrameSink, FrameStream, Transport, WsTransport};
use super::types::{ClientConfig, ConnectionState, InboundMessage, RealtimeError};
use crate::telemetry::{increment, set_connection_state, RealtimeCounter};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Frames `send` may queue ahead of a slow socket
const OUTBOUND_BUFFER: usize = 256;

/// Budget for flushing queued frames and the Close frame after `close()`
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle to one realtime connection.
///
/// Cloning shares the same connection, observers and state. Nothing runs
/// until [`RealtimeClient::connect`] is called.
#[derive(Clone)]
pub struct RealtimeClient {
    shared: Arc<Shared>,
}

struct Shared {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    observers: ObserverSet,
    state: watch::Sender<ConnectionState>,
    lifecycle: Mutex<Lifecycle>,
}

/// Guarded by one lock so that state writes, the generation check and the
/// outbound channel always agree.
#[derive(Default)]
struct Lifecycle {
    generation: u64,
    cancel: Option<CancellationToken>,
    outbound: Option<mpsc::Sender<String>>,
    worker: Option<JoinHandle<()>>,
}

enum SessionEnd {
    Cancelled,
    Lost(RealtimeError),
}

impl RealtimeClient {
    /// Create a client that talks WebSocket to `config.url`
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, WsTransport)
    }

    /// Create a client using a custom transport
    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            shared: Arc::new(Shared {
                config,
                transport: Arc::new(transport),
                observers: ObserverSet::new(),
                state,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// Get the configured URL
    pub fn url(&self) -> &str {
        &self.shared.config.url
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.shared.observers.len()
    }

    /// Start the connection worker.
    ///
    /// Does nothing while a worker is already connecting, open or waiting to
    /// retry, and after [`RealtimeClient::close`]. From `GivenUp` it starts
    /// a fresh cycle with a full retry budget. Failures are reported through
    /// logs and [`RealtimeClient::state`], never to the caller.
    pub fn connect(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!(url = %self.url(), "Realtime connect called outside a tokio runtime");
            return;
        };

        let mut lifecycle = self.shared.lifecycle.lock();
        let state = *self.shared.state.borrow();
        if state == ConnectionState::Closed {
            tracing::warn!(url = %self.url(), "Realtime client is closed, ignoring connect");
            return;
        }
        if state.is_active() {
            tracing::debug!(state = %state, "Realtime client already running");
            return;
        }

        lifecycle.generation += 1;
        let generation = lifecycle.generation;
        let cancel = CancellationToken::new();
        lifecycle.cancel = Some(cancel.clone());
        self.shared.publish(ConnectionState::Connecting);

        let shared = Arc::clone(&self.shared);
        lifecycle.worker = Some(runtime.spawn(async move {
            run_connection_loop(shared, generation, cancel).await;
        }));
    }

    /// Register `callback` for every future inbound message
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&InboundMessage) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe(Arc::new(callback))
    }

    /// Serialize `message` to JSON and transmit it.
    ///
    /// When the connection is not open the message is dropped, not queued.
    /// While open, up to 256 frames may wait for the socket; beyond that
    /// `send` fails with [`RealtimeError::OutboundFull`].
    pub fn send<T>(&self, message: &T) -> Result<(), RealtimeError>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_json::to_string(message).map_err(|e| {
            tracing::error!(error = %e, "Failed to encode realtime message");
            RealtimeError::Encode(e)
        })?;

        let lifecycle = self.shared.lifecycle.lock();
        let state = *self.shared.state.borrow();
        if state == ConnectionState::Open {
            if let Some(outbound) = lifecycle.outbound.as_ref() {
                match outbound.try_send(text) {
                    Ok(()) => {
                        increment(RealtimeCounter::MessagesSent);
                        return Ok(());
                    }
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            capacity = OUTBOUND_BUFFER,
                            "Realtime outbound buffer full, dropping message"
                        );
                        increment(RealtimeCounter::SendsDropped);
                        return Err(RealtimeError::OutboundFull);
                    }
                    Err(TrySendError::Closed(_)) => {}
                }
            }
        }

        tracing::error!(state = %state, "Realtime connection is not open, dropping message");
        increment(RealtimeCounter::SendsDropped);
        Err(RealtimeError::NotConnected)
    }

    /// Stop all activity: cancel any pending retry, close the socket if open
    /// and move to the terminal `Closed` state.
    ///
    /// Messages already accepted by `send` are still flushed before the
    /// Close frame, within a one second budget.
    pub fn close(&self) {
        let mut lifecycle = self.shared.lifecycle.lock();
        lifecycle.generation += 1;
        if let Some(cancel) = lifecycle.cancel.take() {
            cancel.cancel();
        }
        lifecycle.outbound = None;

        let previous = self.shared.publish(ConnectionState::Closed);
        if previous != ConnectionState::Closed {
            tracing::info!(url = %self.url(), previous = %previous, "Realtime client closed");
        }
    }

    /// [`RealtimeClient::close`], then wait for the worker to flush and
    /// release the socket.
    pub async fn shutdown(&self) {
        self.close();
        let worker = self.shared.lifecycle.lock().worker.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "Realtime worker ended abnormally");
            }
        }
    }

    /// Wait until the connection is open.
    ///
    /// Fails once the retry budget is exhausted or the client is closed.
    /// Waits indefinitely on an `Idle` client.
    pub async fn wait_until_open(&self) -> Result<(), RealtimeError> {
        let mut states = self.state_changes();
        let state = *states
            .wait_for(|s| {
                matches!(
                    s,
                    ConnectionState::Open | ConnectionState::GivenUp | ConnectionState::Closed
                )
            })
            .await
            .map_err(|_| RealtimeError::Closed)?;

        match state {
            ConnectionState::Open => Ok(()),
            ConnectionState::GivenUp => Err(RealtimeError::ConnectionFailed(
                "retry budget exhausted".into(),
            )),
            _ => Err(RealtimeError::Closed),
        }
    }
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("url", &self.url())
            .field("state", &self.state())
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl Shared {
    /// Caller must hold the lifecycle lock
    fn publish(&self, state: ConnectionState) -> ConnectionState {
        set_connection_state(&state);
        self.state.send_replace(state)
    }

    /// Apply `state` if `generation` is still current
    fn transition(&self, generation: u64, state: ConnectionState) -> bool {
        let lifecycle = self.lifecycle.lock();
        if lifecycle.generation != generation {
            return false;
        }
        self.publish(state);
        true
    }

    /// Install the outbound channel and mark the connection open
    fn open(&self, generation: u64, outbound: mpsc::Sender<String>) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.generation != generation {
            return false;
        }
        lifecycle.outbound = Some(outbound);
        self.publish(ConnectionState::Open);
        true
    }

    fn clear_outbound(&self, generation: u64) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.generation == generation {
            lifecycle.outbound = None;
        }
    }

    fn deliver(&self, text: &str) {
        match InboundMessage::decode(text) {
            Ok(message) => {
                increment(RealtimeCounter::MessagesReceived);
                let delivered = self.observers.dispatch(&message);
                tracing::trace!(
                    message_type = message.message_type().unwrap_or("-"),
                    observers = delivered,
                    "Dispatched realtime message"
                );
            }
            Err(e) => {
                increment(RealtimeCounter::MalformedMessages);
                tracing::warn!(error = %e, "Dropping malformed realtime message");
            }
        }
    }
}

/// Run connect / stream / back off until closed or out of retries
async fn run_connection_loop(shared: Arc<Shared>, generation: u64, cancel: CancellationToken) {
    let config = &shared.config;
    let mut backoff = Backoff::new(
        config.base_reconnect_delay,
        config.max_reconnect_delay,
        config.max_reconnect_attempts,
    );

    loop {
        if !shared.transition(generation, ConnectionState::Connecting) {
            return;
        }
        increment(RealtimeCounter::ConnectAttempts);
        tracing::info!(url = %config.url, retry = backoff.attempts(), "Connecting to realtime endpoint");

        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            result = shared.transport.open(&config.url) => result,
        };

        match opened {
            Ok((sink, stream)) => {
                let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
                if !shared.open(generation, outbound_tx) {
                    return;
                }
                backoff.reset();
                increment(RealtimeCounter::Opens);
                tracing::info!(url = %config.url, "Realtime connection open");

                let end = run_session(&shared, sink, stream, outbound_rx, &cancel).await;
                shared.clear_outbound(generation);
                match end {
                    SessionEnd::Cancelled => return,
                    SessionEnd::Lost(e) => {
                        tracing::warn!(error = %e, "Realtime connection lost");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Realtime connection attempt failed");
            }
        }
        increment(RealtimeCounter::Failures);

        let Some(delay) = backoff.next_delay() else {
            tracing::error!(
                attempts = backoff.attempts(),
                "Max reconnection attempts reached, giving up"
            );
            increment(RealtimeCounter::GiveUps);
            shared.transition(generation, ConnectionState::GivenUp);
            return;
        };

        let attempt = backoff.attempts();
        if !shared.transition(generation, ConnectionState::Retrying { attempt, delay }) {
            return;
        }
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting after delay");

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(delay) => {}
        }
    }
}

/// Stream one open connection until it drops or the client is closed
async fn run_session(
    shared: &Shared,
    mut sink: FrameSink,
    mut stream: FrameStream,
    mut outbound: mpsc::Receiver<String>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let config = &shared.config;
    let write_limit = config.pong_timeout;

    let mut keepalive = config.ping_interval.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let deadline = pong_deadline;
        let step = tokio::select! {
            _ = cancel.cancelled() => Err(SessionEnd::Cancelled),

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    shared.deliver(&text);
                    Ok(())
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(len = data.len(), "Ignoring binary realtime frame");
                    Ok(())
                }
                Some(Ok(Message::Ping(data))) => {
                    write_unless_cancelled(&mut sink, Message::Pong(data), write_limit, cancel).await
                }
                Some(Ok(Message::Pong(_))) => {
                    pong_deadline = None;
                    Ok(())
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Received close frame");
                    Err(SessionEnd::Lost(RealtimeError::ConnectionFailed(
                        "closed by server".into(),
                    )))
                }
                Some(Ok(Message::Frame(_))) => Ok(()),
                Some(Err(e)) => Err(SessionEnd::Lost(e)),
                None => Err(SessionEnd::Lost(RealtimeError::ConnectionFailed(
                    "stream ended unexpectedly".into(),
                ))),
            },

            text = outbound.recv() => match text {
                Some(text) => {
                    write_unless_cancelled(&mut sink, Message::Text(text), write_limit, cancel).await
                }
                // Sender dropped by close()
                None => Err(SessionEnd::Cancelled),
            },

            _ = async {
                match keepalive.as_mut() {
                    Some(interval) => {
                        interval.tick().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            } => {
                let sent =
                    write_unless_cancelled(&mut sink, Message::Ping(Vec::new()), write_limit, cancel)
                        .await;
                if sent.is_ok() && pong_deadline.is_none() {
                    pong_deadline = Some(Instant::now() + config.pong_timeout);
                }
                sent
            }

            _ = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            } => Err(SessionEnd::Lost(RealtimeError::ConnectionFailed("pong timeout".into()))),
        };

        if let Err(end) = step {
            if matches!(end, SessionEnd::Cancelled) {
                say_goodbye(&mut sink, &mut outbound).await;
            }
            return end;
        }
    }
}

/// Write one frame, failing if the socket does not take it within `limit`
async fn write_frame(
    sink: &mut FrameSink,
    frame: Message,
    limit: Duration,
) -> Result<(), RealtimeError> {
    match timeout(limit, sink.send(frame)).await {
        Ok(result) => result,
        Err(_) => Err(RealtimeError::ConnectionFailed(format!(
            "write stalled for {}ms",
            limit.as_millis()
        ))),
    }
}

/// Write one frame. If the client is closed meanwhile, the frame in flight
/// gets `CLOSE_TIMEOUT` to finish before the session ends.
async fn write_unless_cancelled(
    sink: &mut FrameSink,
    frame: Message,
    limit: Duration,
    cancel: &CancellationToken,
) -> Result<(), SessionEnd> {
    let write = write_frame(sink, frame, limit);
    tokio::pin!(write);

    tokio::select! {
        result = &mut write => result.map_err(SessionEnd::Lost),
        _ = cancel.cancelled() => {
            if timeout(CLOSE_TIMEOUT, &mut write).await.is_err() {
                tracing::debug!("Frame in flight abandoned on close");
            }
            Err(SessionEnd::Cancelled)
        }
    }
}

/// Flush frames queued before `close()`, then send a Close frame. Gives up
/// after `CLOSE_TIMEOUT` so a stalled peer cannot keep the socket alive.
async fn say_goodbye(sink: &mut FrameSink, outbound: &mut mpsc::Receiver<String>) {
    let flush = async {
        while let Ok(text) = outbound.try_recv() {
            sink.send(Message::Text(text)).await?;
        }
        sink.send(Message::Close(None)).await?;
        Ok::<(), RealtimeError>(())
    };

    match timeout(CLOSE_TIMEOUT, flush).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "Close handshake failed"),
        Err(_) => tracing::debug!("Close handshake timed out, dropping socket"),
    }
}
