use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Metadata = HashMap<String, serde_json::Value>;

/// Per-memory visibility scope (§3, glossary).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Team,
    Public,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
            Self::Team => write!(f, "team"),
            Self::Public => write!(f, "public"),
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "team" => Ok(Self::Team),
            "public" => Ok(Self::Public),
            _ => Err(format!("Unknown visibility: {s}")),
        }
    }
}

/// MemoryVersion.change_type (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Update,
    Merge,
    Rollback,
    Correction,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Merge => write!(f, "merge"),
            Self::Rollback => write!(f, "rollback"),
            Self::Correction => write!(f, "correction"),
        }
    }
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "merge" => Ok(Self::Merge),
            "rollback" => Ok(Self::Rollback),
            "correction" => Ok(Self::Correction),
            _ => Err(format!("Unknown change type: {s}")),
        }
    }
}

/// Merge strategy for `update_or_merge` (§4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    #[default]
    Smart,
    Append,
    Replace,
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smart" => Ok(Self::Smart),
            "append" => Ok(Self::Append),
            "replace" => Ok(Self::Replace),
            _ => Err(format!("Unknown merge strategy: {s}")),
        }
    }
}

/// Entity.entity_type (§3, §4.6). Unknown extracted types coerce to `Other`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Organization,
    Location,
    Event,
    Project,
    Technology,
    Concept,
    Document,
    #[default]
    Other,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Person => write!(f, "person"),
            Self::Organization => write!(f, "organization"),
            Self::Location => write!(f, "location"),
            Self::Event => write!(f, "event"),
            Self::Project => write!(f, "project"),
            Self::Technology => write!(f, "technology"),
            Self::Concept => write!(f, "concept"),
            Self::Document => write!(f, "document"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = std::convert::Infallible;

    /// Unrecognized input coerces to `Other` rather than erroring, matching
    /// the Graph's normalization contract in §4.6.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "person" => Self::Person,
            "organization" | "org" => Self::Organization,
            "location" => Self::Location,
            "event" => Self::Event,
            "project" => Self::Project,
            "technology" | "tech" => Self::Technology,
            "concept" => Self::Concept,
            "document" => Self::Document,
            _ => Self::Other,
        })
    }
}

/// ActionItem.status (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionItemStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for ActionItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ActionItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown action item status: {s}")),
        }
    }
}

/// ExternalReference.reference_type (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Url,
    Github,
    SlackUser,
    Email,
    Phone,
}

impl std::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url => write!(f, "url"),
            Self::Github => write!(f, "github"),
            Self::SlackUser => write!(f, "slack_user"),
            Self::Email => write!(f, "email"),
            Self::Phone => write!(f, "phone"),
        }
    }
}

impl std::str::FromStr for ReferenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "url" => Ok(Self::Url),
            "github" => Ok(Self::Github),
            "slack_user" => Ok(Self::SlackUser),
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            _ => Err(format!("Unknown reference type: {s}")),
        }
    }
}

/// ConversationLink.link_type (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationLinkType {
    Continuation,
    Reference,
    Related,
    Followup,
}

impl std::fmt::Display for ConversationLinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continuation => write!(f, "continuation"),
            Self::Reference => write!(f, "reference"),
            Self::Related => write!(f, "related"),
            Self::Followup => write!(f, "followup"),
        }
    }
}

impl std::str::FromStr for ConversationLinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continuation" => Ok(Self::Continuation),
            "reference" => Ok(Self::Reference),
            "related" => Ok(Self::Related),
            "followup" => Ok(Self::Followup),
            _ => Err(format!("Unknown conversation link type: {s}")),
        }
    }
}

/// Upload/processing lifecycle shared by Attachment (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown lifecycle status: {s}")),
        }
    }
}

/// Search Planner dispatch mode (§4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Keyword,
    Semantic,
    #[default]
    Hybrid,
    Entity,
    Nlp,
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            "entity" => Ok(Self::Entity),
            "nlp" => Ok(Self::Nlp),
            _ => Err(format!("Unknown search mode: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_default_is_private() {
        assert_eq!(Visibility::default(), Visibility::Private);
    }

    #[test]
    fn test_visibility_roundtrip() {
        for v in [Visibility::Private, Visibility::Team, Visibility::Public] {
            let s = v.to_string();
            assert_eq!(s.parse::<Visibility>().unwrap(), v);
        }
    }

    #[test]
    fn test_entity_type_unknown_coerces_to_other() {
        assert_eq!("spaceship".parse::<EntityType>().unwrap(), EntityType::Other);
    }

    #[test]
    fn test_entity_type_known_values() {
        assert_eq!("Person".parse::<EntityType>().unwrap(), EntityType::Person);
        assert_eq!("ORG".parse::<EntityType>().unwrap(), EntityType::Organization);
    }

    #[test]
    fn test_change_type_serialization() {
        assert_eq!(serde_json::to_string(&ChangeType::Rollback).unwrap(), "\"rollback\"");
    }

    #[test]
    fn test_search_mode_parse() {
        assert_eq!("hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert!("bogus".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_merge_strategy_default_is_smart() {
        assert_eq!(MergeStrategy::default(), MergeStrategy::Smart);
    }
}
