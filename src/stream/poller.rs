//! Bounded watermark polling loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use super::event::StreamEvent;
use super::source::ChangeSource;
use crate::error::{CldError, Result};

/// Timing and budget for one stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Delay between watermark polls.
    pub poll_interval: Duration,
    /// Wall-clock budget for the connection.
    pub max_duration: Duration,
    /// Maximum number of polls for the connection.
    pub max_ticks: u32,
    /// Reconnect delay advertised to the client.
    pub retry: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_duration: Duration::from_secs(30),
            max_ticks: 25,
            retry: Duration::from_millis(5000),
        }
    }
}

/// Why a stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Wall-clock budget ran out; a keepalive was sent.
    TimedOut,
    /// Poll budget ran out; a keepalive was sent.
    TickBudget,
    /// The receiver went away.
    Cancelled,
    /// A snapshot could not be read.
    Failed,
}

/// Drives one change stream until a budget runs out or `tx` is closed.
///
/// Emits the retry hint, then the current snapshot, then a snapshot
/// whenever the source's watermark moves. Transient watermark failures
/// are logged and the loop keeps polling; a failed snapshot read ends the
/// stream.
pub async fn stream_changes<S>(
    source: Arc<S>,
    tx: mpsc::Sender<StreamEvent>,
    config: StreamConfig,
) -> StreamEnd
where
    S: ChangeSource + ?Sized,
{
    let started = Instant::now();

    if tx.send(StreamEvent::Retry(config.retry)).await.is_err() {
        return StreamEnd::Cancelled;
    }

    let mut last_seen = match push_snapshot(&source, &tx, true).await {
        Ok(Some(watermark)) => watermark,
        Ok(None) => return StreamEnd::Cancelled,
        Err(e) => {
            error!(error = %e, "Failed to read initial snapshot");
            return StreamEnd::Failed;
        }
    };
    debug!(watermark = last_seen, "Stream opened");

    let deadline = started + config.max_duration;
    let mut ticker = tokio::time::interval_at(started + config.poll_interval, config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u32 = 0;

    loop {
        tokio::select! {
            biased;

            () = tx.closed() => {
                debug!(ticks, "Stream receiver closed");
                return StreamEnd::Cancelled;
            }
            () = tokio::time::sleep_until(deadline) => {
                return finish(&tx, StreamEnd::TimedOut, ticks).await;
            }
            _ = ticker.tick() => {
                if ticks >= config.max_ticks {
                    return finish(&tx, StreamEnd::TickBudget, ticks).await;
                }
                ticks += 1;

                match read(&source, |s| s.watermark()).await {
                    Err(e) => warn!(error = %e, tick = ticks, "Failed to poll watermark"),
                    Ok(watermark) if watermark == last_seen => {
                        trace!(tick = ticks, "No change");
                    }
                    Ok(_) => match push_snapshot(&source, &tx, false).await {
                        Ok(Some(watermark)) => last_seen = watermark,
                        Ok(None) => return StreamEnd::Cancelled,
                        Err(e) => {
                            error!(error = %e, tick = ticks, "Failed to read snapshot");
                            return StreamEnd::Failed;
                        }
                    },
                }
            }
        }
    }
}

/// Sends the current snapshot. Returns its watermark, or `None` if the
/// receiver is gone.
async fn push_snapshot<S>(
    source: &Arc<S>,
    tx: &mpsc::Sender<StreamEvent>,
    initial: bool,
) -> Result<Option<i64>>
where
    S: ChangeSource + ?Sized,
{
    let snapshot = read(source, |s| s.snapshot()).await?;
    let watermark = snapshot.watermark;
    let event = StreamEvent::Pages {
        initial,
        payload: snapshot.into(),
    };
    Ok(tx.send(event).await.ok().map(|()| watermark))
}

async fn finish(tx: &mpsc::Sender<StreamEvent>, end: StreamEnd, ticks: u32) -> StreamEnd {
    if tx.send(StreamEvent::Keepalive).await.is_err() {
        return StreamEnd::Cancelled;
    }
    info!(?end, ticks, "Stream budget exhausted");
    end
}

/// Runs a blocking store read off the async runtime.
async fn read<S, T, F>(source: &Arc<S>, f: F) -> Result<T>
where
    S: ChangeSource + ?Sized,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T> + Send + 'static,
{
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || f(&source))
        .await
        .map_err(|e| CldError::Other(format!("store read task failed: {e}")))?
}
