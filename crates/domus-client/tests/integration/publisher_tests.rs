use std::sync::{Arc, Mutex};

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};

use domus_client::HttpListingPublisher;
use domus_core::error::AppError;
use domus_core::models::{CandidateRecord, WorkItem};
use domus_core::traits::ListingPublisher;

use crate::common::{Received, create_listing, field, serve};

fn router(received: Received) -> Router {
    Router::new()
        .route("/listings", post(create_listing))
        .route(
            "/reject",
            post(|| async { (StatusCode::BAD_REQUEST, "floor must not be empty") }),
        )
        .route("/img/1.jpg", get(|| async { vec![1u8, 2, 3] }))
        .route("/img/2.jpg", get(|| async { vec![4u8, 5] }))
        .with_state(received)
}

fn record(image_urls: Option<Vec<String>>) -> CandidateRecord {
    CandidateRecord {
        name: "Apartament 2 camere Zorilor".into(),
        city: "Cluj-Napoca".into(),
        area: "Zorilor".into(),
        short_description: "Luminos, mobilat".into(),
        price: 450,
        surface: 52,
        no_of_rooms: 2,
        floor: "3/4".into(),
        owner_name: "Maria".into(),
        image_urls,
    }
}

#[tokio::test]
async fn publishes_multipart_listing_with_images() {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let base = serve(router(received.clone())).await;

    let publisher = HttpListingPublisher::new(format!("{base}/listings"))
        .unwrap()
        .with_basic_auth("user", "pass");
    let images = vec![
        format!("{base}/img/1.jpg"),
        format!("{base}/static/full-screen.5555ba1b6.svg"),
        format!("{base}/img/missing.jpg"),
        format!("{base}/img/2.jpg"),
    ];
    let item = WorkItem::Url("https://www.olx.ro/d/oferta/a.html".into());

    publisher.publish(&record(Some(images)), &item).await.unwrap();

    let forms = received.lock().unwrap();
    assert_eq!(forms.len(), 1);
    let parts = &forms[0];

    assert_eq!(field(parts, "name").unwrap().text(), "Apartament 2 camere Zorilor");
    assert_eq!(field(parts, "shortDescription").unwrap().text(), "Luminos, mobilat");
    assert_eq!(field(parts, "price").unwrap().text(), "450");
    assert_eq!(field(parts, "floor").unwrap().text(), "3/4");
    assert_eq!(field(parts, "propertyType").unwrap().text(), "rent");
    assert_eq!(field(parts, "active").unwrap().text(), "false");
    assert_eq!(field(parts, "availableFrom").unwrap().text().len(), 10);
    assert_eq!(
        field(parts, "listingSourceUrl").unwrap().text(),
        "https://www.olx.ro/d/oferta/a.html"
    );

    let photos: Vec<_> = parts.iter().filter(|p| p.name == "apartmentImages").collect();
    assert_eq!(photos.len(), 2);
    assert_eq!(photos[0].file_name.as_deref(), Some("image1.jpg"));
    assert_eq!(photos[0].data, vec![1, 2, 3]);
    assert_eq!(photos[1].file_name.as_deref(), Some("image2.jpg"));
    assert_eq!(photos[1].data, vec![4, 5]);
}

#[tokio::test]
async fn publishes_without_images() {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let base = serve(router(received.clone())).await;

    let publisher = HttpListingPublisher::new(format!("{base}/listings"))
        .unwrap()
        .with_basic_auth("user", "pass")
        .with_property_type("sale");
    let item = WorkItem::Contact {
        contact_key: "0740".into(),
        url: "https://www.publi24.ro/b".into(),
    };

    publisher.publish(&record(None), &item).await.unwrap();

    let forms = received.lock().unwrap();
    let parts = &forms[0];
    assert!(field(parts, "apartmentImages").is_none());
    assert_eq!(field(parts, "propertyType").unwrap().text(), "sale");
    assert_eq!(
        field(parts, "listingSourceUrl").unwrap().text(),
        "https://www.publi24.ro/b"
    );
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let base = serve(router(received.clone())).await;

    let publisher = HttpListingPublisher::new(format!("{base}/listings"))
        .unwrap()
        .with_basic_auth("user", "nope");
    let err = publisher
        .publish(&record(None), &WorkItem::Url("https://www.olx.ro/a".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized(_)));
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rejection_is_publish_error_with_body() {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let base = serve(router(received)).await;

    let publisher = HttpListingPublisher::new(format!("{base}/reject")).unwrap();
    let err = publisher
        .publish(&record(None), &WorkItem::Url("https://www.olx.ro/a".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::PublishError(_)));
    let message = err.to_string();
    assert!(message.contains("HTTP 400"));
    assert!(message.contains("floor must not be empty"));
}
