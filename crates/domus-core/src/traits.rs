use std::future::Future;

use crate::error::AppError;
use crate::models::{CandidateRecord, RawBag, WorkItem};
use crate::registry::SourceFamily;

/// Reads the raw content of one listing page.
///
/// Never fails: transport, timeout and DOM errors are reported through the
/// returned bag's status so the caller can resolve the item terminally.
pub trait PageExtractor: Send + Sync + Clone {
    fn extract(&self, family: SourceFamily, url: &str) -> impl Future<Output = RawBag> + Send;
}

/// Input for one formatting attempt.
#[derive(Debug, Clone, Copy)]
pub struct FormatRequest<'a> {
    /// Identifier of the item being formatted (for logging only).
    pub identifier: &'a str,
    /// Rendered raw bag.
    pub raw_text: &'a str,
    /// Schema the output must satisfy.
    pub schema: &'a serde_json::Value,
    /// Validation errors from the previous attempt; empty on the first one.
    pub corrections: &'a [String],
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Turns raw page text into a text blob expected to contain one JSON object.
pub trait Formatter: Send + Sync + Clone {
    fn format(
        &self,
        request: &FormatRequest<'_>,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Enumerates the work items of a batch.
pub trait WorkItemSource: Send + Sync {
    fn fetch_items(&self) -> impl Future<Output = Result<Vec<WorkItem>, AppError>> + Send;
}

/// Persists a validated record in the destination catalog.
pub trait ListingPublisher: Send + Sync {
    fn publish(
        &self,
        record: &CandidateRecord,
        item: &WorkItem,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A source backed by an in-memory list, for single-URL runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    items: Vec<WorkItem>,
}

impl StaticSource {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self { items }
    }
}

impl WorkItemSource for StaticSource {
    async fn fetch_items(&self) -> Result<Vec<WorkItem>, AppError> {
        Ok(self.items.clone())
    }
}
