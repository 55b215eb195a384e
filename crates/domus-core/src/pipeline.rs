use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    BagStatus, BatchSummary, FailureStage, ItemOutcome, PipelineEvent, WorkItem, compute_hash,
};
use crate::produce::{DEFAULT_MAX_ATTEMPTS, ProduceValidateLoop};
use crate::registry::{Strategy, StrategyRegistry};
use crate::schema::SchemaValidator;
use crate::traits::{Formatter, PageExtractor, WorkItemSource};

/// Tunables for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Formatting attempts per item (at least 1).
    pub max_attempts: u32,
    /// Capacity of the event channel handed to the sink.
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            event_buffer: 32,
        }
    }
}

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchProgress<'a> {
    Started {
        run_id: Uuid,
        total: usize,
    },
    ItemStarted {
        index: usize,
        identifier: &'a str,
        strategy: Strategy,
    },
    Extracted {
        index: usize,
        identifier: &'a str,
        status: &'a BagStatus,
    },
    ItemEmitted {
        index: usize,
        identifier: &'a str,
        attempts: u32,
    },
    ItemFailed {
        index: usize,
        identifier: &'a str,
        stage: FailureStage,
        reason: &'a str,
    },
    Cancelled {
        remaining: usize,
    },
    Finished {
        summary: &'a BatchSummary,
    },
    Aborted {
        error: &'a AppError,
    },
}

/// Receives batch progress (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: BatchProgress<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn report(&self, event: BatchProgress<'_>) {
        match event {
            BatchProgress::Started { run_id, total } => {
                tracing::info!(%run_id, %total, "Batch started");
            }
            BatchProgress::ItemStarted {
                index,
                identifier,
                strategy,
            } => {
                tracing::info!(%index, %identifier, %strategy, "Processing item");
            }
            BatchProgress::Extracted {
                index,
                identifier,
                status,
            } => match status {
                BagStatus::Partial { missing } => {
                    tracing::info!(%index, %identifier, ?missing, "Extraction partial");
                }
                _ => tracing::debug!(%index, %identifier, ?status, "Extraction done"),
            },
            BatchProgress::ItemEmitted {
                index,
                identifier,
                attempts,
            } => {
                tracing::info!(%index, %identifier, %attempts, "Record emitted");
            }
            BatchProgress::ItemFailed {
                index,
                identifier,
                stage,
                reason,
            } => {
                tracing::warn!(%index, %identifier, %stage, %reason, "Item failed");
            }
            BatchProgress::Cancelled { remaining } => {
                tracing::info!(%remaining, "Batch cancelled");
            }
            BatchProgress::Finished { summary } => {
                tracing::info!(
                    run_id = %summary.run_id,
                    total = summary.total,
                    emitted = summary.emitted,
                    extraction_failed = summary.extraction_failed,
                    format_failed = summary.format_failed,
                    unexpected = summary.unexpected,
                    cancelled = summary.cancelled,
                    "Batch finished"
                );
            }
            BatchProgress::Aborted { error } => {
                tracing::error!(%error, "Batch aborted");
            }
        }
    }
}

/// Per-item state, dropped before the next item starts.
struct ItemContext<'a> {
    index: usize,
    identifier: &'a str,
    raw_text: String,
}

/// Handle to a batch running on a background task.
pub struct BatchHandle {
    pub events: mpsc::Receiver<PipelineEvent>,
    pub join: JoinHandle<Result<BatchSummary, AppError>>,
}

impl BatchHandle {
    /// Wait for the batch task. Drain `events` first or the task may block
    /// on a full channel.
    pub async fn finish(self) -> Result<BatchSummary, AppError> {
        self.join
            .await
            .map_err(|e| AppError::Generic(format!("Batch task failed: {e}")))?
    }
}

/// Runs work items through extract → produce-validate, one at a time, in
/// input order, emitting one terminal event per processed item.
#[derive(Clone)]
pub struct BatchOrchestrator<E: PageExtractor, F: Formatter> {
    registry: Arc<StrategyRegistry>,
    extractor: E,
    producer: ProduceValidateLoop<F>,
    config: PipelineConfig,
}

impl<E: PageExtractor, F: Formatter> BatchOrchestrator<E, F> {
    pub fn new(
        registry: StrategyRegistry,
        extractor: E,
        formatter: F,
        validator: SchemaValidator,
        config: PipelineConfig,
    ) -> Self {
        let producer = ProduceValidateLoop::new(formatter, Arc::new(validator), config.max_attempts);
        Self {
            registry: Arc::new(registry),
            extractor,
            producer,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process `items` in order and send one event per processed item.
    ///
    /// Item failures never stop the batch. Cancellation is checked before
    /// each item; an item already in progress completes first. If the
    /// receiver goes away the run stops as if cancelled.
    pub async fn run<R: PipelineReporter>(
        &self,
        items: Vec<WorkItem>,
        events: &mpsc::Sender<PipelineEvent>,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> BatchSummary {
        let total = items.len();
        let mut summary = BatchSummary::new(Uuid::new_v4(), total);
        reporter.report(BatchProgress::Started {
            run_id: summary.run_id,
            total,
        });

        for (index, item) in items.into_iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                reporter.report(BatchProgress::Cancelled {
                    remaining: total - index,
                });
                break;
            }

            let outcome = self.process_isolated(index, &item, reporter).await;
            match &outcome {
                ItemOutcome::Emitted { attempts, .. } => {
                    reporter.report(BatchProgress::ItemEmitted {
                        index,
                        identifier: item.identifier(),
                        attempts: *attempts,
                    });
                }
                ItemOutcome::Failed { stage, reason } => {
                    reporter.report(BatchProgress::ItemFailed {
                        index,
                        identifier: item.identifier(),
                        stage: *stage,
                        reason,
                    });
                }
            }
            // Only delivered events are counted.
            let Ok(permit) = events.reserve().await else {
                tracing::warn!(index, "Event receiver dropped, stopping batch");
                summary.cancelled = true;
                break;
            };
            summary.record(&outcome);
            permit.send(PipelineEvent {
                index,
                item,
                outcome,
            });
        }

        reporter.report(BatchProgress::Finished { summary: &summary });
        summary
    }

    /// Fetch items from `source`, then [`run`](Self::run) them.
    ///
    /// A source failure aborts the run before any item is processed.
    pub async fn run_from_source<S: WorkItemSource, R: PipelineReporter>(
        &self,
        source: &S,
        events: &mpsc::Sender<PipelineEvent>,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<BatchSummary, AppError> {
        let items = match source.fetch_items().await {
            Ok(items) => items,
            Err(e) => {
                reporter.report(BatchProgress::Aborted { error: &e });
                return Err(e);
            }
        };
        Ok(self.run(items, events, cancel, reporter).await)
    }

    /// Run a batch on a background task. Events arrive on the returned
    /// handle's bounded channel.
    pub fn spawn<S, R>(self, source: S, cancel: CancellationToken, reporter: R) -> BatchHandle
    where
        E: 'static,
        F: 'static,
        S: WorkItemSource + 'static,
        R: PipelineReporter + 'static,
    {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let join = tokio::spawn(async move {
            self.run_from_source(&source, &tx, &cancel, &reporter)
                .await
        });
        BatchHandle { events: rx, join }
    }

    /// Item boundary: a panic anywhere below becomes an `Unexpected` failure
    /// for this item only.
    async fn process_isolated<R: PipelineReporter>(
        &self,
        index: usize,
        item: &WorkItem,
        reporter: &R,
    ) -> ItemOutcome {
        match AssertUnwindSafe(self.process_item(index, item, reporter))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => ItemOutcome::Failed {
                stage: FailureStage::Unexpected,
                reason: panic_message(&*panic),
            },
        }
    }

    async fn process_item<R: PipelineReporter>(
        &self,
        index: usize,
        item: &WorkItem,
        reporter: &R,
    ) -> ItemOutcome {
        let identifier = item.identifier();
        let strategy = self.registry.resolve(identifier);
        reporter.report(BatchProgress::ItemStarted {
            index,
            identifier,
            strategy,
        });

        let bag = strategy.extract(&self.extractor, identifier).await;
        reporter.report(BatchProgress::Extracted {
            index,
            identifier,
            status: &bag.status,
        });
        if let Some(message) = bag.error_message() {
            return ItemOutcome::Failed {
                stage: FailureStage::Extraction,
                reason: message.to_string(),
            };
        }

        let ctx = ItemContext {
            index,
            identifier,
            raw_text: bag.render_text(),
        };
        drop(bag);

        match self
            .producer
            .produce_valid(ctx.identifier, &ctx.raw_text)
            .await
        {
            Ok(produced) => match serde_json::to_string(&produced.record) {
                Ok(serialized) => ItemOutcome::Emitted {
                    data_hash: compute_hash(&serialized),
                    record: produced.record,
                    attempts: produced.attempts,
                },
                Err(e) => ItemOutcome::Failed {
                    stage: FailureStage::Unexpected,
                    reason: format!("Failed to serialize record: {e}"),
                },
            },
            Err(failure) => {
                tracing::debug!(index = ctx.index, identifier = %ctx.identifier, "Formatting exhausted");
                ItemOutcome::Failed {
                    stage: FailureStage::Formatting,
                    reason: failure.to_string(),
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: <non-string payload>".to_string()
    }
}
