//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{CandidateRecord, PAGE_TEXT, RawBag, WorkItem};
use crate::registry::SourceFamily;
use crate::traits::{FormatRequest, Formatter, ListingPublisher, PageExtractor, WorkItemSource};

/// A complete listing that passes schema validation.
pub fn sample_listing(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "city": "Cluj-Napoca",
        "area": "Zorilor",
        "shortDescription": "Apartament luminos, mobilat complet.",
        "price": 450,
        "surface": 52,
        "noOfRooms": 2,
        "floor": "3",
        "ownerName": "Maria",
        "imageUrls": ["https://img.example/1.jpg"]
    })
}

pub fn sample_listing_json(name: &str) -> String {
    sample_listing(name).to_string()
}

/// Sample listing with one required field removed.
pub fn listing_without(field: &str) -> String {
    let mut listing = sample_listing("Incomplete");
    if let Some(obj) = listing.as_object_mut() {
        obj.remove(field);
    }
    listing.to_string()
}

pub fn sample_record(name: &str) -> CandidateRecord {
    serde_json::from_value(sample_listing(name)).unwrap()
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor returning per-URL bags.
///
/// URLs without a configured bag get a successful bag whose page text
/// mentions the URL.
#[derive(Clone)]
pub struct MockExtractor {
    bags: Arc<Mutex<HashMap<String, RawBag>>>,
    panic_on: Arc<Mutex<Option<String>>>,
    cancel_after_first: Arc<Mutex<Option<CancellationToken>>>,
    /// Every call as (family, url).
    pub calls: Arc<Mutex<Vec<(SourceFamily, String)>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            bags: Arc::new(Mutex::new(HashMap::new())),
            panic_on: Arc::new(Mutex::new(None)),
            cancel_after_first: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_bag(self, url: &str, bag: RawBag) -> Self {
        self.bags.lock().unwrap().insert(url.to_string(), bag);
        self
    }

    /// Panic when asked to extract `url`.
    pub fn panicking_on(self, url: &str) -> Self {
        *self.panic_on.lock().unwrap() = Some(url.to_string());
        self
    }

    /// Cancel `token` during the first extraction (simulates Ctrl-C mid-item).
    pub fn cancelling_after_first(self, token: CancellationToken) -> Self {
        *self.cancel_after_first.lock().unwrap() = Some(token);
        self
    }
}

impl PageExtractor for MockExtractor {
    async fn extract(&self, family: SourceFamily, url: &str) -> RawBag {
        self.calls
            .lock()
            .unwrap()
            .push((family, url.to_string()));

        if let Some(token) = self.cancel_after_first.lock().unwrap().take() {
            token.cancel();
        }

        let should_panic = self.panic_on.lock().unwrap().as_deref() == Some(url);
        if should_panic {
            panic!("simulated DOM crash on {url}");
        }

        self.bags.lock().unwrap().get(url).cloned().unwrap_or_else(|| {
            let mut bag = RawBag::new(url);
            bag.insert_text(PAGE_TEXT, format!("Listing at {url}"));
            bag
        })
    }
}

// ---------------------------------------------------------------------------
// MockFormatter
// ---------------------------------------------------------------------------

/// Owned copy of a [`FormatRequest`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub identifier: String,
    pub raw_text: String,
    pub corrections: Vec<String>,
    pub attempt: u32,
}

/// Mock formatter with a response queue.
#[derive(Clone)]
pub struct MockFormatter {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a valid listing.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockFormatter {
    pub fn new(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always_valid() -> Self {
        Self::new(Vec::new())
    }
}

impl Formatter for MockFormatter {
    async fn format(&self, request: &FormatRequest<'_>) -> Result<String, AppError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            identifier: request.identifier.to_string(),
            raw_text: request.raw_text.to_string(),
            corrections: request.corrections.to_vec(),
            attempt: request.attempt,
        });

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(sample_listing_json("Default listing"))
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Mock work-item source. Returns its items once, then an empty list.
#[derive(Clone)]
pub struct MockSource {
    response: Arc<Mutex<Option<Result<Vec<WorkItem>, AppError>>>>,
}

impl MockSource {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            response: Arc::new(Mutex::new(Some(Ok(items)))),
        }
    }

    pub fn failing(error: AppError) -> Self {
        Self {
            response: Arc::new(Mutex::new(Some(Err(error)))),
        }
    }
}

impl WorkItemSource for MockSource {
    async fn fetch_items(&self) -> Result<Vec<WorkItem>, AppError> {
        self.response.lock().unwrap().take().unwrap_or(Ok(Vec::new()))
    }
}

// ---------------------------------------------------------------------------
// MockPublisher
// ---------------------------------------------------------------------------

/// Mock publisher that records what it was asked to publish.
#[derive(Clone)]
pub struct MockPublisher {
    pub published: Arc<Mutex<Vec<(CandidateRecord, WorkItem)>>>,
    fail_for: Arc<Mutex<Option<String>>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            fail_for: Arc::new(Mutex::new(None)),
        }
    }

    /// Reject records coming from `url`.
    pub fn failing_for(self, url: &str) -> Self {
        *self.fail_for.lock().unwrap() = Some(url.to_string());
        self
    }
}

impl ListingPublisher for MockPublisher {
    async fn publish(&self, record: &CandidateRecord, item: &WorkItem) -> Result<(), AppError> {
        let rejected = self.fail_for.lock().unwrap().as_deref() == Some(item.identifier());
        if rejected {
            return Err(AppError::PublishError("catalog rejected listing".into()));
        }
        self.published
            .lock()
            .unwrap()
            .push((record.clone(), item.clone()));
        Ok(())
    }
}
