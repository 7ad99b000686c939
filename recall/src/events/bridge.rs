//! `PubSubBridge` (§6): the cross-process mirror that lets a multi-process
//! deployment fan `EventBus` publishes out to remote subscribers. No
//! networked transport (Redis, NATS, ...) is an in-scope external
//! collaborator any more than the vision/OCR model or an object-store
//! backend are (§1) — this crate defines the capability interface a
//! deployment wires a concrete implementation into, and runs single-process
//! (`EventBus` alone, no bridge) without one.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait PubSubBridge: Send + Sync {
    async fn publish(&self, channel: &str, bytes: &[u8]) -> Result<()>;
    async fn subscribe(&self, channels: &[&str]) -> Result<tokio::sync::mpsc::UnboundedReceiver<(String, Vec<u8>)>>;
}
