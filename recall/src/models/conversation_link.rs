use serde::{Deserialize, Serialize};

use super::ConversationLinkType;

/// Unique on (source_conversation_id, target_conversation_id) (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLink {
    pub source_conversation_id: String,
    pub target_conversation_id: String,
    pub link_type: ConversationLinkType,
    pub context: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_link_roundtrip() {
        let link = ConversationLink {
            source_conversation_id: "c1".into(),
            target_conversation_id: "c2".into(),
            link_type: ConversationLinkType::Followup,
            context: Some("picks up where c1 left off".into()),
        };
        let json = serde_json::to_string(&link).unwrap();
        let back: ConversationLink = serde_json::from_str(&json).unwrap();
        assert_eq!(back.source_conversation_id, "c1");
        assert_eq!(back.link_type, ConversationLinkType::Followup);
    }
}
