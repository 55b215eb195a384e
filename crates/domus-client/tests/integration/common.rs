use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use tokio::net::TcpListener;

/// `Authorization` value for user `user`, password `pass`.
pub const BASIC_USER_PASS: &str = "Basic dXNlcjpwYXNz";

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Test server failed");
    });
    format!("http://{addr}")
}

pub fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == BASIC_USER_PASS)
}

/// One multipart part as received by the fake catalog.
#[derive(Debug, Clone)]
pub struct ReceivedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

impl ReceivedPart {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

pub type Received = Arc<Mutex<Vec<Vec<ReceivedPart>>>>;

/// Fake create-listing endpoint: records every submitted form.
pub async fn create_listing(
    State(received): State<Received>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }

    let mut parts = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.expect("Failed to read part").to_vec();
        parts.push(ReceivedPart {
            name,
            file_name,
            data,
        });
    }
    received.lock().unwrap().push(parts);
    StatusCode::OK
}

pub fn field<'a>(parts: &'a [ReceivedPart], name: &str) -> Option<&'a ReceivedPart> {
    parts.iter().find(|p| p.name == name)
}
