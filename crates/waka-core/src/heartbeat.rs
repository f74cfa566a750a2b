use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of activity a heartbeat records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "coding")]
    Coding,
    #[serde(rename = "browsing")]
    Browsing,
    #[serde(rename = "building")]
    Building,
    #[serde(rename = "code reviewing")]
    CodeReviewing,
    #[serde(rename = "debugging")]
    Debugging,
    #[serde(rename = "designing")]
    Designing,
    #[serde(rename = "indexing")]
    Indexing,
    #[serde(rename = "manual testing")]
    ManualTesting,
    #[serde(rename = "running tests")]
    RunningTests,
    #[serde(rename = "writing tests")]
    WritingTests,
    #[serde(rename = "learning")]
    Learning,
    #[serde(rename = "meeting")]
    Meeting,
    #[serde(rename = "planning")]
    Planning,
    #[serde(rename = "researching")]
    Researching,
    #[serde(rename = "communicating")]
    Communicating,
    #[serde(rename = "writing docs")]
    WritingDocs,
    #[serde(rename = "supporting")]
    Supporting,
    #[serde(rename = "translating")]
    Translating,
    #[serde(rename = "ai coding")]
    AiCoding,
}

impl Category {
    pub const ALL: [Category; 19] = [
        Category::Coding,
        Category::Browsing,
        Category::Building,
        Category::CodeReviewing,
        Category::Debugging,
        Category::Designing,
        Category::Indexing,
        Category::ManualTesting,
        Category::RunningTests,
        Category::WritingTests,
        Category::Learning,
        Category::Meeting,
        Category::Planning,
        Category::Researching,
        Category::Communicating,
        Category::WritingDocs,
        Category::Supporting,
        Category::Translating,
        Category::AiCoding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Coding => "coding",
            Category::Browsing => "browsing",
            Category::Building => "building",
            Category::CodeReviewing => "code reviewing",
            Category::Debugging => "debugging",
            Category::Designing => "designing",
            Category::Indexing => "indexing",
            Category::ManualTesting => "manual testing",
            Category::RunningTests => "running tests",
            Category::WritingTests => "writing tests",
            Category::Learning => "learning",
            Category::Meeting => "meeting",
            Category::Planning => "planning",
            Category::Researching => "researching",
            Category::Communicating => "communicating",
            Category::WritingDocs => "writing docs",
            Category::Supporting => "supporting",
            Category::Translating => "translating",
            Category::AiCoding => "ai coding",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseKindError {
                kind: "category",
                value: s.to_string(),
            })
    }
}

/// What the heartbeat's `entity` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    File,
    App,
    Domain,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::File => "file",
            EntityType::App => "app",
            EntityType::Domain => "domain",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(EntityType::File),
            "app" => Ok(EntityType::App),
            "domain" => Ok(EntityType::Domain),
            other => Err(ParseKindError {
                kind: "entity type",
                value: other.to_string(),
            }),
        }
    }
}

/// Unknown category or entity type string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseKindError {
    pub kind: &'static str,
    pub value: String,
}

/// One observed activity event, serialized in the bulk heartbeat API shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub category: Category,
    #[serde(
        rename = "cursorpos",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cursor_position: Option<u64>,
    /// Empty means absent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    pub entity: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_write: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "lineno", default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Unix timestamp in seconds.
    pub time: f64,
    pub user_agent: String,
}

impl Heartbeat {
    /// A heartbeat carrying only the required fields.
    pub fn new(
        entity: impl Into<String>,
        entity_type: EntityType,
        category: Category,
        time: f64,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            branch: None,
            category,
            cursor_position: None,
            dependencies: Vec::new(),
            entity: entity.into(),
            entity_type,
            is_write: None,
            language: None,
            line_number: None,
            lines: None,
            project: None,
            time,
            user_agent: user_agent.into(),
        }
    }
}

/// Outcome of submitting one heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeartbeatResult {
    pub status: u16,
    pub errors: Vec<String>,
}

impl HeartbeatResult {
    pub fn accepted(status: u16) -> Self {
        Self {
            status,
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && self.errors.is_empty()
    }
}
