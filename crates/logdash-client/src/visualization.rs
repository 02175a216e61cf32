//! Visualizations and the queries they are bound to.
//!
//! The collection is kept ordered by display index and every `index` field
//! equals the visualization's position, so callers never see gaps or
//! duplicates after a delete or reorder.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use logdash_shared::{Guid, QueryDefinition, QueryKey};

use crate::error::{ClientError, Result};

/// A chart: an opaque chart specification bound to at most one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VizState {
    pub guid: Guid,
    #[serde(default)]
    pub spec: Value,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub query: Option<QueryDefinition>,
    #[serde(default)]
    pub section: Option<Guid>,
}

impl VizState {
    pub fn new(spec: Value) -> Self {
        Self {
            guid: Guid::new(),
            spec,
            index: 0,
            query: None,
            section: None,
        }
    }

    /// Chart title from the spec, falling back to the guid.
    pub fn title(&self) -> String {
        self.spec
            .get("title")
            .and_then(|title| match title {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .unwrap_or_else(|| self.guid.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Visualizations {
    items: Vec<VizState>,
}

impl Visualizations {
    /// Order by existing index (ties keep input order) and renumber.
    pub fn from_vec(mut items: Vec<VizState>) -> Self {
        items.sort_by_key(|viz| viz.index);
        let mut vizs = Self { items };
        vizs.reindex();
        vizs
    }

    fn reindex(&mut self) {
        for (index, viz) in self.items.iter_mut().enumerate() {
            viz.index = index;
        }
    }

    fn position(&self, guid: Guid) -> Result<usize> {
        self.items
            .iter()
            .position(|viz| viz.guid == guid)
            .ok_or(ClientError::UnknownVisualization(guid))
    }

    fn get_mut(&mut self, guid: Guid) -> Result<&mut VizState> {
        let pos = self.position(guid)?;
        Ok(&mut self.items[pos])
    }

    pub fn get(&self, guid: Guid) -> Option<&VizState> {
        self.items.iter().find(|viz| viz.guid == guid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VizState> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a new unbound visualization.
    pub fn create(&mut self, spec: Value) -> Guid {
        let mut viz = VizState::new(spec);
        viz.index = self.items.len();
        let guid = viz.guid;
        self.items.push(viz);
        guid
    }

    pub fn set_spec(&mut self, guid: Guid, spec: Value) -> Result<()> {
        self.get_mut(guid)?.spec = spec;
        Ok(())
    }

    pub fn set_query(&mut self, guid: Guid, query: Option<QueryDefinition>) -> Result<()> {
        self.get_mut(guid)?.query = query;
        Ok(())
    }

    pub fn set_section(&mut self, guid: Guid, section: Option<Guid>) -> Result<()> {
        self.get_mut(guid)?.section = section;
        Ok(())
    }

    /// Copy a visualization under a fresh guid, appended at the end.
    pub fn duplicate(&mut self, guid: Guid) -> Result<Guid> {
        let pos = self.position(guid)?;
        let mut copy = self.items[pos].clone();
        copy.guid = Guid::new();
        copy.index = self.items.len();
        let new_guid = copy.guid;
        self.items.push(copy);
        Ok(new_guid)
    }

    pub fn delete(&mut self, guid: Guid) -> Result<VizState> {
        let pos = self.position(guid)?;
        let removed = self.items.remove(pos);
        self.reindex();
        Ok(removed)
    }

    /// Move the visualization at `old_index` to `new_index`, shifting the
    /// ones in between by one.
    pub fn reorder(&mut self, old_index: usize, new_index: usize) -> Result<()> {
        let len = self.items.len();
        for index in [old_index, new_index] {
            if index >= len {
                return Err(ClientError::InvalidIndex { index, len });
            }
        }
        let viz = self.items.remove(old_index);
        self.items.insert(new_index, viz);
        self.reindex();
        Ok(())
    }

    /// Replace the visualization with the same guid in place, or append.
    pub fn upsert(&mut self, mut viz: VizState) {
        match self.position(viz.guid) {
            Ok(pos) => {
                viz.index = pos;
                self.items[pos] = viz;
            }
            Err(_) => {
                viz.index = self.items.len();
                self.items.push(viz);
            }
        }
    }

    /// Unassign every visualization from `section`.
    pub fn clear_section(&mut self, section: Guid) {
        for viz in self.items.iter_mut() {
            if viz.section == Some(section) {
                viz.section = None;
            }
        }
    }

    /// Queries bound to a visualization, in display order.
    pub fn queries(&self) -> impl Iterator<Item = &QueryDefinition> {
        self.items.iter().filter_map(|viz| viz.query.as_ref())
    }

    /// Keys of every query bound to a visualization.
    pub fn active_query_keys(&self) -> HashSet<QueryKey> {
        self.queries().map(QueryDefinition::key).collect()
    }
}
