//! Adapters turning common event sources into push event streams.

use super::PushEvent;
use futures::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;

/// Stream events from a shared broadcast channel. A lagging receiver logs
/// how many events it missed and keeps going; the stream ends when every
/// sender is dropped.
pub fn broadcast_stream(
    mut rx: broadcast::Receiver<PushEvent>,
) -> impl Stream<Item = PushEvent> + Send + 'static {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => yield event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Push consumer lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Stream events from newline-delimited JSON (`{"type": .., "data": ..}` per
/// line). Blank lines are skipped; malformed lines are logged and skipped.
pub fn json_lines<R>(reader: R) -> impl Stream<Item = PushEvent> + Send + 'static
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async_stream::stream! {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match PushEvent::parse(&line) {
                        Ok(event) => yield event,
                        Err(e) => tracing::warn!(error = %e, "Skipping malformed push event"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Push event source read failed");
                    break;
                }
            }
        }
    }
}
