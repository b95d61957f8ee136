//! Realtime update client
//!
//! Maintains one WebSocket connection to the dashboard's realtime endpoint,
//! fans every inbound JSON message out to registered observers, and restores
//! the connection after loss with capped exponential backoff.

mod backoff;
mod client;
mod observers;
mod transport;
mod types;

pub use backoff::Backoff;
pub use client::RealtimeClient;
pub use observers::{Observer, ObserverSet, Subscription};
pub use transport::{FrameSink, FrameStream, Transport, WsTransport};
pub use types::{ClientConfig, ConnectionState, InboundMessage, RealtimeError, DEFAULT_URL};
