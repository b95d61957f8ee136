//! nfc-realtime: Realtime update client for the NFC access-control dashboard
//!
//! This library provides:
//! - A WebSocket client with observer fan-out and capped exponential backoff
//! - Explicit teardown and a queryable connection state
//! - Typed views of the dashboard's realtime event conventions
//! - An attendance tracker fed by realtime messages
//! - Configuration, structured logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod events;
pub mod realtime;
pub mod telemetry;
