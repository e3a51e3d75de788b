//! Message transport capabilities.
//!
//! The pipeline only talks to these traits; the NATS implementation lives in
//! `crate::nats`, tests plug in in-memory channels.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Source of raw status-and-intent payloads
#[async_trait]
pub trait InboundTransport: Send {
    /// Wait up to `timeout` for the next payload.
    ///
    /// `Ok(None)` means nothing arrived in time.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// False once the transport can no longer deliver messages
    fn is_running(&self) -> bool;

    async fn stop(&mut self) -> Result<()>;
}

/// Sink for serialized schedules
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    async fn send(&self, payload: Vec<u8>) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}
