//! What the stream observes.

use crate::error::Result;
use crate::workspace::{Workspace, WorkspaceSnapshot};

/// A source of workspace state and its change watermark.
///
/// The stream only compares watermarks, so any implementation whose
/// watermark changes on every write works, whether it is polled or woken.
pub trait ChangeSource: Send + Sync + 'static {
    /// Current watermark. Any change means "something was written".
    fn watermark(&self) -> Result<i64>;

    /// Full current state, with the watermark it was read at.
    fn snapshot(&self) -> Result<WorkspaceSnapshot>;
}

impl ChangeSource for Workspace {
    fn watermark(&self) -> Result<i64> {
        self.last_modified()
    }

    fn snapshot(&self) -> Result<WorkspaceSnapshot> {
        Self::snapshot(self)
    }
}
