//! Change notification stream.
//!
//! A stream pushes the full workspace snapshot on connect and again each
//! time the store watermark moves. Connections are bounded by a wall-clock
//! budget and a poll budget; clients are expected to reconnect after the
//! terminal keepalive.

mod event;
mod poller;
mod source;

pub use event::{CONNECTION_TIMEOUT, KEEPALIVE_EVENT, PAGES_EVENT, PagesPayload, StreamEvent};
pub use poller::{StreamConfig, StreamEnd, stream_changes};
pub use source::ChangeSource;
