use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::{ItemOutcome, PipelineEvent};
use crate::traits::ListingPublisher;

/// Counters for one drained event stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkSummary {
    pub published: usize,
    pub publish_failed: usize,
    /// Failure events received (logged, never published).
    pub skipped: usize,
}

/// Consumes pipeline events and hands emitted records to a publisher.
///
/// Publish failures are logged and counted; they never stop the drain.
pub struct SinkAdapter<P: ListingPublisher> {
    publisher: P,
    publish_delay: Duration,
}

impl<P: ListingPublisher> SinkAdapter<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            publish_delay: Duration::ZERO,
        }
    }

    /// Pause after every successful publish (destination rate limits).
    pub fn with_publish_delay(mut self, delay: Duration) -> Self {
        self.publish_delay = delay;
        self
    }

    /// Handle one event.
    pub async fn handle(&self, event: &PipelineEvent, summary: &mut SinkSummary) {
        match &event.outcome {
            ItemOutcome::Emitted { record, .. } => {
                match self.publisher.publish(record, &event.item).await {
                    Ok(()) => {
                        summary.published += 1;
                        tracing::info!(index = event.index, identifier = %event.identifier(), name = %record.name, "Listing published");
                        if !self.publish_delay.is_zero() {
                            tokio::time::sleep(self.publish_delay).await;
                        }
                    }
                    Err(e) => {
                        summary.publish_failed += 1;
                        tracing::error!(index = event.index, identifier = %event.identifier(), error = %e, "Failed to publish listing");
                    }
                }
            }
            ItemOutcome::Failed { stage, reason } => {
                summary.skipped += 1;
                tracing::warn!(index = event.index, identifier = %event.identifier(), %stage, %reason, "Skipping failed item");
            }
        }
    }

    /// Drain `events` until the producer side closes.
    pub async fn drain(&self, mut events: mpsc::Receiver<PipelineEvent>) -> SinkSummary {
        let mut summary = SinkSummary::default();
        while let Some(event) = events.recv().await {
            self.handle(&event, &mut summary).await;
        }
        tracing::info!(
            published = summary.published,
            publish_failed = summary.publish_failed,
            skipped = summary.skipped,
            "Sink drained"
        );
        summary
    }
}
