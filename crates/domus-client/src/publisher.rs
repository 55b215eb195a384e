use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use domus_core::error::AppError;
use domus_core::models::{CandidateRecord, WorkItem};
use domus_core::traits::ListingPublisher;
use reqwest::Client;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

/// Multipart field holding each downloaded image.
pub const IMAGE_PART: &str = "apartmentImages";

/// Text fields of the catalog's create-listing form, in submission order.
pub fn listing_form_fields(
    record: &CandidateRecord,
    source_url: &str,
    property_type: &str,
    available_from: NaiveDate,
) -> Vec<(&'static str, String)> {
    vec![
        ("name", record.name.clone()),
        ("city", record.city.clone()),
        ("area", record.area.clone()),
        ("shortDescription", record.short_description.clone()),
        ("price", record.price.to_string()),
        ("propertyType", property_type.to_string()),
        ("surface", record.surface.to_string()),
        ("noOfRooms", record.no_of_rooms.to_string()),
        ("floor", record.floor.clone()),
        ("ownerName", record.owner_name.clone()),
        ("active", "false".to_string()),
        ("availableFrom", available_from.format("%Y-%m-%d").to_string()),
        ("listingSourceUrl", source_url.to_string()),
    ]
}

/// Gallery placeholders (`full-screen.<hash>.svg`) that are not listing photos.
pub fn is_placeholder_image(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    file.starts_with("full-screen") && file.ends_with(".svg")
}

/// Publishes listings to the catalog's multipart create-listing endpoint.
#[derive(Clone)]
pub struct HttpListingPublisher {
    client: Client,
    endpoint: String,
    credentials: Option<(String, String)>,
    property_type: String,
    timeout_secs: u64,
}

impl HttpListingPublisher {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, AppError> {
        Self::with_timeout(endpoint, Duration::from_secs(60))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            credentials: None,
            property_type: "rent".to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    pub fn with_property_type(mut self, property_type: impl Into<String>) -> Self {
        self.property_type = property_type.into();
        self
    }

    /// Download listing photos. Failures are logged and skipped.
    async fn download_images(&self, urls: &[String]) -> Vec<Vec<u8>> {
        let mut images = Vec::new();
        for url in urls {
            if is_placeholder_image(url) {
                tracing::debug!(%url, "Skipping placeholder image");
                continue;
            }
            match self.download(url).await {
                Ok(bytes) => images.push(bytes),
                Err(e) => tracing::warn!(%url, error = %e, "Skipping image"),
            }
        }
        images
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {url}",
                response.status().as_u16()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read image body: {e}")))?;
        Ok(bytes.to_vec())
    }
}

impl ListingPublisher for HttpListingPublisher {
    async fn publish(&self, record: &CandidateRecord, item: &WorkItem) -> Result<(), AppError> {
        let today = Local::now().date_naive();
        let mut form = Form::new();
        for (name, value) in listing_form_fields(record, item.identifier(), &self.property_type, today)
        {
            form = form.text(name, value);
        }

        let urls = record.image_urls.as_deref().unwrap_or_default();
        for (i, bytes) in self.download_images(urls).await.into_iter().enumerate() {
            let part = Part::bytes(bytes)
                .file_name(format!("image{}.jpg", i + 1))
                .mime_str("image/jpeg")
                .map_err(|e| AppError::PublishError(format!("Invalid image part: {e}")))?;
            form = form.part(IMAGE_PART, part);
        }

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .multipart(form);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthorized(
                "Catalog rejected credentials (HTTP 401)".into(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PublishError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonLine<'a> {
    listing_source_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_key: Option<&'a str>,
    #[serde(flatten)]
    record: &'a CandidateRecord,
}

/// Writes each record as one JSON line. Used for dry runs.
#[derive(Clone)]
pub struct JsonLinesPublisher {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl JsonLinesPublisher {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl ListingPublisher for JsonLinesPublisher {
    async fn publish(&self, record: &CandidateRecord, item: &WorkItem) -> Result<(), AppError> {
        let line = serde_json::to_string(&JsonLine {
            listing_source_url: item.identifier(),
            contact_key: item.contact_key(),
            record,
        })?;

        let mut out = self
            .out
            .lock()
            .map_err(|_| AppError::PublishError("Output writer poisoned".into()))?;
        writeln!(out, "{line}")
            .and_then(|()| out.flush())
            .map_err(|e| AppError::PublishError(format!("Failed to write record: {e}")))
    }
}
