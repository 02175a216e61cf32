use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SharedError;

/// Fight identifier, unique within a report.
pub type FightId = u32;

/// Auto-increment id of a stored record fragment.
pub type RecordId = i64;

/// Code identifying a remote report.
///
/// Codes are non-empty ASCII alphanumeric strings. The value is checked once
/// on construction (including deserialization) and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ReportCode(String);

impl ReportCode {
    pub fn new(code: impl Into<String>) -> Result<Self, SharedError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SharedError::InvalidReportCode(code));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ReportCode {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReportCode> for String {
    fn from(code: ReportCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for ReportCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for visualizations and sections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Guid(pub Uuid);

impl Guid {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One fight of a report, as delivered by the report metadata endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FightMeta {
    pub id: FightId,
    /// Encounter id; `0` (or negative) for trash.
    #[serde(default)]
    pub boss: i64,
    #[serde(default)]
    pub name: String,
    /// Milliseconds relative to the report start.
    pub start_time: i64,
    pub end_time: i64,
}

impl FightMeta {
    pub fn is_boss(&self) -> bool {
        self.boss > 0
    }

    /// Whether a timestamp lies inside this fight (both ends inclusive).
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start_time && timestamp <= self.end_time
    }
}

/// A friendly or enemy actor appearing in a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorMeta {
    pub id: i64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_code_validation() {
        assert_eq!(ReportCode::new(" ABC123 ").unwrap().as_str(), "ABC123");
        assert!(ReportCode::new("").is_err());
        assert!(ReportCode::new("ABC/123").is_err());
    }

    #[test]
    fn test_report_code_deserialize_rejects_invalid() {
        let ok: ReportCode = serde_json::from_str("\"xYz9\"").unwrap();
        assert_eq!(ok.to_string(), "xYz9");
        assert!(serde_json::from_str::<ReportCode>("\"bad code\"").is_err());
    }

    #[test]
    fn test_fight_window_is_inclusive() {
        let fight = FightMeta {
            id: 1,
            boss: 0,
            name: "Trash".into(),
            start_time: 10,
            end_time: 20,
        };
        assert!(!fight.is_boss());
        assert!(fight.contains(10));
        assert!(fight.contains(20));
        assert!(!fight.contains(21));
    }
}
