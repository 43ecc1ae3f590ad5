//! Keys and rows of the key-value state table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::CldError;

/// The fixed set of keys the workspace persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateKey {
    Images,
    Pages,
    PageCount,
}

impl StateKey {
    pub const ALL: [Self; 3] = [Self::Images, Self::Pages, Self::PageCount];

    /// Column value used in the `state` table.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Pages => "pages",
            Self::PageCount => "pageCount",
        }
    }

    /// Empty value seeded for this key in a fresh store.
    pub fn default_value(self) -> Value {
        match self {
            Self::Images | Self::Pages => json!([]),
            Self::PageCount => json!(0),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateKey {
    type Err = CldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| CldError::Other(format!("Unknown state key: {s}")))
    }
}

/// One row of the state table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEntry {
    pub key: String,
    pub value: Value,
    /// Unix timestamp in milliseconds of the last write to this key.
    pub updated_at: i64,
}

/// Every key's current value plus the store watermark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDump {
    pub values: BTreeMap<String, Value>,
    /// Maximum `updated_at` across all keys, `0` for an empty store.
    pub watermark: i64,
}

impl StateDump {
    pub fn get(&self, key: StateKey) -> Option<&Value> {
        self.values.get(key.as_str())
    }
}
