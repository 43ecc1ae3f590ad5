//! Workspace data types as persisted in the state store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// URL prefix under which uploaded assets are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

/// An uploaded image in the asset library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageItem {
    pub id: String,
    /// Original upload name, also the on-disk asset name.
    pub filename: String,
    pub url: String,
}

impl ImageItem {
    /// Creates an item with a freshly generated id.
    pub fn new(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            url: format!("{UPLOADS_URL_PREFIX}{filename}"),
            filename,
        }
    }
}

/// One comic page, kept as the exact JSON object the editor sent.
///
/// Pages are saved wholesale and read back unchanged, so no field is
/// required and nothing is filled in. The accessors read the fields the
/// editor is known to send.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Page(Map<String, Value>);

impl Page {
    pub fn new(id: impl Into<String>, layout: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("id".to_string(), Value::String(id.into()));
        fields.insert("layout".to_string(), Value::String(layout.into()));
        Self(fields)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Name of a layout in the catalog.
    pub fn layout(&self) -> Option<&str> {
        self.0.get("layout").and_then(Value::as_str)
    }

    /// Slot identifier to assigned image reference.
    pub fn slots(&self) -> Option<&Map<String, Value>> {
        self.0.get("slots").and_then(Value::as_object)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Page {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// The unit of persistence and synchronization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    pub images: Vec<ImageItem>,
    pub pages: Vec<Page>,
    pub page_count: usize,
    /// Store watermark at the time of the read.
    #[serde(skip)]
    pub watermark: i64,
}
