use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Metadata;

/// Per-tenant quota/behavior knobs (§3). Seeded from `TenancyConfig` defaults
/// at creation time, then stored per-row so they can be adjusted per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    pub max_memories: Option<i64>,
    pub max_file_size_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub slug: String,
    pub plan: String,
    pub settings: TenantSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(id: String, slug: String, plan: String, settings: TenantSettings) -> Self {
        let now = Utc::now();
        Self {
            id,
            slug,
            plan,
            settings,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenantRequest {
    pub slug: String,
    pub plan: Option<String>,
    pub max_memories: Option<i64>,
    pub max_file_size_bytes: Option<i64>,
    #[serde(default)]
    pub metadata: Metadata,
}
