use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReferenceType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalReference {
    pub id: String,
    pub memory_id: String,
    pub reference_type: ReferenceType,
    pub value: String,
    pub context: Option<String>,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

impl ExternalReference {
    pub fn new(id: String, memory_id: String, reference_type: ReferenceType, value: String) -> Self {
        Self {
            id,
            memory_id,
            reference_type,
            value,
            context: None,
            is_valid: true,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_reference_is_valid_by_default() {
        let reference = ExternalReference::new(
            "r1".into(),
            "m1".into(),
            ReferenceType::Url,
            "https://example.com".into(),
        );
        assert!(reference.is_valid);
    }
}
