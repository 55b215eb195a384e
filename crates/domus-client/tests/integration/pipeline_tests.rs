//! End to end: HTTP source → stub extractor → OpenAI-compatible formatter →
//! schema validation → multipart publisher, all against local fake servers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use domus_client::{HttpListingPublisher, HttpWorkItemSource, OpenAiFormatter};
use domus_core::models::{FailureStage, PAGE_TEXT, RawBag};
use domus_core::pipeline::{BatchOrchestrator, PipelineConfig, TracingReporter};
use domus_core::registry::{SourceFamily, StrategyRegistry};
use domus_core::schema::SchemaValidator;
use domus_core::sink::{SinkAdapter, SinkSummary};
use domus_core::traits::PageExtractor;

use crate::common::{Received, authorized, create_listing, field, serve};

/// Returns a canned bag instead of driving a browser.
#[derive(Clone)]
struct StubExtractor;

impl PageExtractor for StubExtractor {
    async fn extract(&self, _family: SourceFamily, url: &str) -> RawBag {
        let mut bag = RawBag::new(url);
        bag.insert_text(PAGE_TEXT, format!("Apartament de inchiriat, anunt {url}"));
        bag
    }
}

fn listing(name: &str, with_price: bool) -> Value {
    let mut listing = json!({
        "name": name,
        "city": "Cluj-Napoca",
        "area": "Gheorgheni",
        "shortDescription": "Apartament renovat",
        "price": 500,
        "surface": 60,
        "noOfRooms": 3,
        "floor": "2",
        "ownerName": "Ion"
    });
    if !with_price {
        listing.as_object_mut().unwrap().remove("price");
    }
    listing
}

/// First answer lacks `price`; every later one is valid.
async fn completions(State(calls): State<Arc<AtomicUsize>>) -> Json<Value> {
    let n = calls.fetch_add(1, Ordering::SeqCst);
    let content = listing(&format!("Listing {n}"), n > 0).to_string();
    Json(json!({"choices": [{"message": {"content": content}}]}))
}

async fn urls(headers: HeaderMap) -> Json<Value> {
    assert!(authorized(&headers));
    Json(json!([
        "https://www.olx.ro/d/oferta/a.html",
        "https://unknown.tld/y",
        {"phoneNumber": "0740", "url": "https://www.publi24.ro/anunturi/b.html"}
    ]))
}

#[tokio::test]
async fn batch_runs_from_source_to_catalog() {
    let calls = Arc::new(AtomicUsize::new(0));
    let llm = serve(
        Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(calls.clone()),
    )
    .await;

    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let backend = serve(
        Router::new()
            .route("/urls", get(urls))
            .route("/listings", post(create_listing))
            .with_state(received.clone()),
    )
    .await;

    let source = HttpWorkItemSource::new(format!("{backend}/urls"))
        .unwrap()
        .with_basic_auth("user", "pass");
    let formatter =
        OpenAiFormatter::with_base_url("key", "model", &format!("{llm}/v1")).unwrap();
    let orchestrator = BatchOrchestrator::new(
        StrategyRegistry::default(),
        StubExtractor,
        formatter,
        SchemaValidator::listing().unwrap(),
        PipelineConfig::default(),
    );

    let mut handle = orchestrator.spawn(source, CancellationToken::new(), TracingReporter);

    let mut failures = Vec::new();
    let publisher = HttpListingPublisher::new(format!("{backend}/listings"))
        .unwrap()
        .with_basic_auth("user", "pass");
    let sink = SinkAdapter::new(publisher);
    let mut sink_summary = SinkSummary::default();
    while let Some(event) = handle.events.recv().await {
        if let Some(stage) = event.failure_stage() {
            failures.push((event.index, stage));
        }
        sink.handle(&event, &mut sink_summary).await;
    }
    let summary = handle.finish().await.unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.emitted, 2);
    assert_eq!(summary.extraction_failed, 1);
    assert_eq!(failures, vec![(1, FailureStage::Extraction)]);
    assert_eq!(sink_summary.published, 2);
    // Item a needed a second attempt after the missing price.
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let forms = received.lock().unwrap();
    assert_eq!(forms.len(), 2);
    assert_eq!(field(&forms[0], "name").unwrap().text(), "Listing 1");
    assert_eq!(
        field(&forms[0], "listingSourceUrl").unwrap().text(),
        "https://www.olx.ro/d/oferta/a.html"
    );
    assert_eq!(field(&forms[1], "name").unwrap().text(), "Listing 2");
    assert_eq!(
        field(&forms[1], "listingSourceUrl").unwrap().text(),
        "https://www.publi24.ro/anunturi/b.html"
    );
}

#[tokio::test]
async fn unauthorized_source_yields_no_events() {
    let backend = serve(Router::new().route("/urls", get(urls_rejecting))).await;
    let source = HttpWorkItemSource::new(format!("{backend}/urls")).unwrap();
    let formatter = OpenAiFormatter::with_base_url("key", "model", "http://127.0.0.1:9").unwrap();
    let orchestrator = BatchOrchestrator::new(
        StrategyRegistry::default(),
        StubExtractor,
        formatter,
        SchemaValidator::listing().unwrap(),
        PipelineConfig::default(),
    );

    let mut handle = orchestrator.spawn(source, CancellationToken::new(), TracingReporter);
    assert!(handle.events.recv().await.is_none());
    let err = handle.finish().await.unwrap_err();
    assert!(matches!(err, domus_core::AppError::Unauthorized(_)));
}

async fn urls_rejecting() -> axum::http::StatusCode {
    axum::http::StatusCode::UNAUTHORIZED
}
