//! Events emitted by the change-notification stream.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::workspace::{ImageItem, Page, WorkspaceSnapshot};

/// Event name for snapshot pushes.
pub const PAGES_EVENT: &str = "pages";
/// Event name for the terminal timeout notice.
pub const KEEPALIVE_EVENT: &str = "keepalive";
/// Body of the terminal timeout notice.
pub const CONNECTION_TIMEOUT: &str = "connection_timeout";

/// Body of a `pages` event: the full workspace plus server time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagesPayload {
    pub images: Vec<ImageItem>,
    pub pages: Vec<Page>,
    pub page_count: usize,
    /// Server time in unix seconds when the payload was built.
    pub timestamp: i64,
}

impl From<WorkspaceSnapshot> for PagesPayload {
    fn from(snapshot: WorkspaceSnapshot) -> Self {
        Self {
            images: snapshot.images,
            pages: snapshot.pages,
            page_count: snapshot.page_count,
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// One message on a change stream, in emission order:
/// `Retry`, `Pages { initial: true }`, any number of `Pages`, then
/// `Keepalive` if the connection budget ran out.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Client reconnect delay, sent once at connection start.
    Retry(Duration),
    /// Full workspace snapshot.
    Pages { initial: bool, payload: PagesPayload },
    /// Budget exhausted; the stream closes after this.
    Keepalive,
}

impl StreamEvent {
    /// Textual tag of the event, if it carries one.
    pub const fn name(&self) -> Option<&'static str> {
        match self {
            Self::Retry(_) => None,
            Self::Pages { .. } => Some(PAGES_EVENT),
            Self::Keepalive => Some(KEEPALIVE_EVENT),
        }
    }

    /// Event body: JSON for snapshots, a fixed notice for keepalive.
    pub fn data(&self) -> Result<Option<String>> {
        Ok(match self {
            Self::Retry(_) => None,
            Self::Pages { payload, .. } => Some(serde_json::to_string(payload)?),
            Self::Keepalive => Some(CONNECTION_TIMEOUT.to_string()),
        })
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Keepalive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_event_names() {
        assert_eq!(StreamEvent::Retry(Duration::from_secs(5)).name(), None);
        assert_eq!(StreamEvent::Keepalive.name(), Some("keepalive"));
        assert!(StreamEvent::Keepalive.is_terminal());
    }

    #[test]
    fn test_pages_body() {
        let snapshot = WorkspaceSnapshot {
            pages: vec![Page::new("p1", "grid")],
            page_count: 1,
            ..WorkspaceSnapshot::default()
        };
        let event = StreamEvent::Pages {
            initial: true,
            payload: snapshot.into(),
        };
        let body: Value = serde_json::from_str(&event.data().unwrap().unwrap()).unwrap();
        assert_eq!(body["pageCount"], json!(1));
        assert_eq!(body["pages"][0]["id"], json!("p1"));
        assert!(body["timestamp"].as_i64().unwrap() > 0);
        assert_eq!(body["images"], json!([]));
    }

    #[test]
    fn test_keepalive_body() {
        assert_eq!(
            StreamEvent::Keepalive.data().unwrap().as_deref(),
            Some("connection_timeout")
        );
    }
}
