pub mod error;
pub mod models;
pub mod pipeline;
pub mod produce;
pub mod registry;
pub mod schema;
pub mod sink;
pub mod traits;
pub mod util;

#[cfg(test)]
pub mod testutil;

pub use error::AppError;
pub use models::{
    BagStatus, BatchSummary, CandidateRecord, FailureStage, ItemOutcome, PipelineEvent, RawBag,
    RawValue, ValidationOutcome, WorkItem, compute_hash, parse_work_items,
};
pub use pipeline::{
    BatchHandle, BatchOrchestrator, BatchProgress, PipelineConfig, PipelineReporter,
    TracingReporter,
};
pub use produce::{FormatFailure, ProduceValidateLoop, ProducedRecord};
pub use registry::{SourceFamily, Strategy, StrategyRegistry};
pub use schema::{SchemaValidator, listing_schema};
pub use sink::{SinkAdapter, SinkSummary};
pub use traits::{
    FormatRequest, Formatter, ListingPublisher, PageExtractor, StaticSource, WorkItemSource,
};
