use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;
use crate::util::strip_code_fence;

/// Raw field holding the visible text of the main content region.
pub const PAGE_TEXT: &str = "pageText";
/// Raw field holding the gallery image URLs.
pub const IMAGE_URLS: &str = "imageUrls";
/// Raw field holding the advertiser's display name.
pub const OWNER_NAME: &str = "ownerName";
/// Raw field holding the price as printed on the page.
pub const PRICE_TEXT: &str = "priceText";

/// One unit of input to a batch run.
///
/// The source list is either a JSON array of URLs or a JSON array of
/// `{ "phoneNumber": ..., "url": ... }` objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkItem {
    Url(String),
    Contact {
        #[serde(rename = "phoneNumber")]
        contact_key: String,
        url: String,
    },
}

impl WorkItem {
    /// The URL that drives extraction.
    pub fn identifier(&self) -> &str {
        match self {
            WorkItem::Url(url) => url,
            WorkItem::Contact { url, .. } => url,
        }
    }

    pub fn contact_key(&self) -> Option<&str> {
        match self {
            WorkItem::Url(_) => None,
            WorkItem::Contact { contact_key, .. } => Some(contact_key),
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Url(url) => write!(f, "{url}"),
            WorkItem::Contact { contact_key, url } => write!(f, "{url} ({contact_key})"),
        }
    }
}

/// Parse the body returned by the work-item source.
///
/// Accepts an optional code fence around the array, since some upstream
/// producers wrap their output in Markdown.
pub fn parse_work_items(body: &str) -> Result<Vec<WorkItem>, AppError> {
    let body = strip_code_fence(body);
    serde_json::from_str(body)
        .map_err(|e| AppError::SourceError(format!("Invalid work item list: {e}")))
}

/// A single raw value read from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Urls(Vec<String>),
}

/// Outcome of an extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BagStatus {
    Success,
    /// One or more optional regions were absent.
    Partial { missing: Vec<String> },
    Error { message: String },
}

/// Unstructured fields produced by extraction, before schema normalization.
///
/// Field names differ per source family; consumers only rely on
/// [`RawBag::render_text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawBag {
    pub source_url: String,
    pub fields: BTreeMap<String, RawValue>,
    #[serde(flatten)]
    pub status: BagStatus,
}

impl RawBag {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            fields: BTreeMap::new(),
            status: BagStatus::Success,
        }
    }

    pub fn error(source_url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            fields: BTreeMap::new(),
            status: BagStatus::Error {
                message: message.into(),
            },
        }
    }

    pub fn insert_text(&mut self, field: &str, value: impl Into<String>) {
        self.fields
            .insert(field.to_string(), RawValue::Text(value.into()));
    }

    pub fn insert_urls(&mut self, field: &str, urls: Vec<String>) {
        self.fields.insert(field.to_string(), RawValue::Urls(urls));
    }

    /// Record that an optional region was not found. Degrades a successful
    /// bag to `Partial`; an errored bag stays errored.
    pub fn mark_missing(&mut self, field: &str) {
        match &mut self.status {
            BagStatus::Success => {
                self.status = BagStatus::Partial {
                    missing: vec![field.to_string()],
                };
            }
            BagStatus::Partial { missing } => {
                if !missing.iter().any(|m| m == field) {
                    missing.push(field.to_string());
                }
            }
            BagStatus::Error { .. } => {}
        }
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(RawValue::Text(t)) => Some(t),
            _ => None,
        }
    }

    pub fn urls(&self, field: &str) -> Option<&[String]> {
        match self.fields.get(field) {
            Some(RawValue::Urls(u)) => Some(u),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, BagStatus::Error { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            BagStatus::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Render the bag as the plain text handed to the formatter.
    pub fn render_text(&self) -> String {
        let mut sections = Vec::new();

        if let Some(text) = self.text(PAGE_TEXT) {
            sections.push(format!("Page Text: {text}"));
        }
        if let Some(price) = self.text(PRICE_TEXT) {
            sections.push(format!("Price: {price}"));
        }
        if let Some(owner) = self.text(OWNER_NAME) {
            sections.push(format!("Owner name: {owner}"));
        }
        if let Some(urls) = self.urls(IMAGE_URLS) {
            sections.push(format!("Image URLs: [{}]", urls.join(", ")));
        }

        const KNOWN: [&str; 4] = [PAGE_TEXT, PRICE_TEXT, OWNER_NAME, IMAGE_URLS];
        for (key, value) in &self.fields {
            if KNOWN.contains(&key.as_str()) {
                continue;
            }
            match value {
                RawValue::Text(t) => sections.push(format!("{key}: {t}")),
                RawValue::Urls(u) => sections.push(format!("{key}: [{}]", u.join(", "))),
            }
        }

        sections.join("\n\n")
    }
}

/// Structured listing produced by the formatter.
///
/// Only ever handed downstream after it passed schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub name: String,
    pub city: String,
    pub area: String,
    pub short_description: String,
    pub price: i64,
    pub surface: i64,
    pub no_of_rooms: i64,
    pub floor: String,
    pub owner_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
}

/// Result of validating a candidate against the listing schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

/// Stage at which an item terminally failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Extraction,
    Formatting,
    /// A defect (panic or unanticipated error) caught at the item boundary.
    Unexpected,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Extraction => "extraction_failed",
            FailureStage::Formatting => "format_failed",
            FailureStage::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal outcome of one work item.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Emitted {
        record: CandidateRecord,
        /// SHA-256 of the serialized record (for change detection downstream)
        data_hash: String,
        attempts: u32,
    },
    Failed {
        stage: FailureStage,
        reason: String,
    },
}

/// The emitted, terminal outcome for one work item.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    /// Zero-based position of the item in the input list.
    pub index: usize,
    pub item: WorkItem,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl PipelineEvent {
    pub fn identifier(&self) -> &str {
        self.item.identifier()
    }

    pub fn record(&self) -> Option<&CandidateRecord> {
        match &self.outcome {
            ItemOutcome::Emitted { record, .. } => Some(record),
            ItemOutcome::Failed { .. } => None,
        }
    }

    pub fn failure_stage(&self) -> Option<FailureStage> {
        match &self.outcome {
            ItemOutcome::Emitted { .. } => None,
            ItemOutcome::Failed { stage, .. } => Some(*stage),
        }
    }
}

/// Per-run counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub total: usize,
    pub emitted: usize,
    pub extraction_failed: usize,
    pub format_failed: usize,
    pub unexpected: usize,
    /// The run stopped early on cancellation.
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn new(run_id: Uuid, total: usize) -> Self {
        Self {
            run_id,
            total,
            emitted: 0,
            extraction_failed: 0,
            format_failed: 0,
            unexpected: 0,
            cancelled: false,
        }
    }

    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Emitted { .. } => self.emitted += 1,
            ItemOutcome::Failed { stage, .. } => match stage {
                FailureStage::Extraction => self.extraction_failed += 1,
                FailureStage::Formatting => self.format_failed += 1,
                FailureStage::Unexpected => self.unexpected += 1,
            },
        }
    }

    pub fn processed(&self) -> usize {
        self.emitted + self.extraction_failed + self.format_failed + self.unexpected
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
