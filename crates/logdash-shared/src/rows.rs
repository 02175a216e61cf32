use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::ROWSET_NAME;

/// Named set of rows handed to the chart layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RowSet {
    pub name: String,
    pub values: Vec<Value>,
}

impl RowSet {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            name: ROWSET_NAME.to_string(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `timestamp` field of the first row, if present.
    pub fn first_timestamp(&self) -> Option<&Value> {
        self.values.first().and_then(|row| row.get("timestamp"))
    }

    /// `timestamp` field of the last row, if present.
    pub fn last_timestamp(&self) -> Option<&Value> {
        self.values.last().and_then(|row| row.get("timestamp"))
    }
}
