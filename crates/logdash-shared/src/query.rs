//! Query definitions and the cache key derived from them.
//!
//! A [`QueryKey`] partitions cached data: two definitions with the same key
//! are answered by the same remote data. The boss filter is deliberately not
//! part of the key, it is applied when reading cached fights.

use serde::{Deserialize, Serialize};

use crate::constants::QUERY_KEY_SEPARATOR;

/// Table views offered by the remote API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TableKind {
    #[serde(rename = "damage-done")]
    Damage,
    #[serde(rename = "damage-taken")]
    DamageTaken,
    #[serde(rename = "healing")]
    Healing,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Damage => "damage-done",
            TableKind::DamageTaken => "damage-taken",
            TableKind::Healing => "healing",
        }
    }
}

/// Event stream or aggregated table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QueryKind {
    Event,
    Table { table: TableKind },
}

impl QueryKind {
    pub fn is_event(&self) -> bool {
        matches!(self, QueryKind::Event)
    }

    fn key_part(&self) -> String {
        match self {
            QueryKind::Event => "event".to_string(),
            QueryKind::Table { table } => format!("table-{}", table.as_str()),
        }
    }
}

/// A user-defined query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryDefinition {
    /// Filter expression passed through to the remote API.
    pub filter: String,
    /// Boss id the query is restricted to, `None` for any boss.
    #[serde(rename = "bossid", default)]
    pub boss_filter: Option<String>,
    pub kind: QueryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<f64>,
}

impl QueryDefinition {
    pub fn event(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            boss_filter: None,
            kind: QueryKind::Event,
            cutoff: None,
        }
    }

    pub fn table(table: TableKind, filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            boss_filter: None,
            kind: QueryKind::Table { table },
            cutoff: None,
        }
    }

    pub fn with_boss(mut self, boss: impl Into<String>) -> Self {
        self.boss_filter = Some(boss.into());
        self
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    /// Whether a fight with the given boss id passes this query's boss filter.
    pub fn matches_boss(&self, boss: i64) -> bool {
        match &self.boss_filter {
            None => true,
            Some(filter) => filter.trim() == boss.to_string(),
        }
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::compute(self)
    }
}

/// Cache-partitioning identity of a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    /// `filter::kind::cutoff`. Neither the kind nor the cutoff part contains
    /// the separator, so the key splits back unambiguously from the right.
    pub fn compute(query: &QueryDefinition) -> Self {
        let cutoff = match query.cutoff {
            Some(cutoff) => cutoff.to_string(),
            None => "none".to_string(),
        };
        Self(
            [query.filter.as_str(), &query.kind.key_part(), &cutoff].join(QUERY_KEY_SEPARATOR),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let q = QueryDefinition::event("type = 'cast'").with_cutoff(3.0);
        assert_eq!(q.key(), q.key());
        assert_eq!(q.key(), q.clone().key());
        assert_eq!(q.key().as_str(), "type = 'cast'::event::3");
    }

    #[test]
    fn test_boss_filter_does_not_partition() {
        let any = QueryDefinition::event("x");
        let boss = QueryDefinition::event("x").with_boss("2052");
        assert_eq!(any.key(), boss.key());
    }

    #[test]
    fn test_kind_and_table_partition() {
        let event = QueryDefinition::event("x");
        let damage = QueryDefinition::table(TableKind::Damage, "x");
        let healing = QueryDefinition::table(TableKind::Healing, "x");
        assert_ne!(event.key(), damage.key());
        assert_ne!(damage.key(), healing.key());
        assert_eq!(healing.key().as_str(), "x::table-healing::none");
    }

    #[test]
    fn test_missing_cutoff_differs_from_zero() {
        let none = QueryDefinition::event("x");
        let zero = QueryDefinition::event("x").with_cutoff(0.0);
        assert_ne!(none.key(), zero.key());
    }

    #[test]
    fn test_persisted_shape() {
        let json = r#"{"filter":"f","bossid":null,"kind":{"kind":"table","table":"damage-taken"}}"#;
        let q: QueryDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(q, QueryDefinition::table(TableKind::DamageTaken, "f"));

        let unknown = r#"{"filter":"f","bossid":null,"kind":{"kind":"table","table":"dispels"}}"#;
        assert!(serde_json::from_str::<QueryDefinition>(unknown).is_err());
    }

    #[test]
    fn test_matches_boss() {
        let q = QueryDefinition::event("").with_boss("7");
        assert!(q.matches_boss(7));
        assert!(!q.matches_boss(8));
        assert!(QueryDefinition::event("").matches_boss(8));
    }
}
