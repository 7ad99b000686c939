use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type names emitted by the core (§4.12, §6). Shared verbatim with the
/// cross-process pub/sub bridge's channel-name mapping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    MemoryCreated,
    MemoryUpdated,
    MemoryDeleted,
    MemoryEmbeddingComplete,
    TenantUserJoined,
    TenantUserLeft,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemoryCreated => "memory.created",
            Self::MemoryUpdated => "memory.updated",
            Self::MemoryDeleted => "memory.deleted",
            Self::MemoryEmbeddingComplete => "memory.embedding_complete",
            Self::TenantUserJoined => "tenant.user_joined",
            Self::TenantUserLeft => "tenant.user_left",
        }
    }

    /// The cross-process bridge's named channel for this event type (§4.12).
    pub fn bridge_channel(&self) -> Option<&'static str> {
        match self {
            Self::MemoryCreated => Some("memories:created"),
            Self::MemoryUpdated => Some("memories:updated"),
            Self::MemoryDeleted => Some("memories:deleted"),
            Self::MemoryEmbeddingComplete => Some("memories:embedding_complete"),
            Self::TenantUserJoined | Self::TenantUserLeft => None,
        }
    }
}

/// A published event, tenant-scoped at delivery time (§4.12: "a message with
/// `tenant_id=T` is never delivered to a subscriber whose user lives outside
/// `T`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub tenant_id: String,
    pub payload: Value,
    pub emitted_at: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: EventType, tenant_id: String, payload: Value) -> Self {
        Self {
            event_type,
            tenant_id,
            payload,
            emitted_at: Utc::now(),
        }
    }
}
