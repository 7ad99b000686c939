use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    pub email: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: String, tenant_id: String, email: String, role: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            tenant_id,
            email,
            role,
            permissions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// The identity context a trusted upstream resolves per request. The Request
/// Surface never issues or validates credentials itself — it only trusts
/// these three fields once they arrive via headers set by the upstream
/// gateway (§4.11, §9).
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub permissions: Vec<String>,
}

impl RequestContext {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_has_permission() {
        let mut user = User::new("u1".into(), "t1".into(), "a@example.com".into(), "member".into());
        user.permissions.push("memory:write".into());
        assert!(user.has_permission("memory:write"));
        assert!(!user.has_permission("memory:delete"));
    }

    #[test]
    fn test_request_context_permission_check() {
        let ctx = RequestContext {
            tenant_id: "t1".into(),
            user_id: Some("u1".into()),
            permissions: vec!["memory:read".into()],
        };
        assert!(ctx.has_permission("memory:read"));
        assert!(!ctx.has_permission("memory:write"));
    }
}
