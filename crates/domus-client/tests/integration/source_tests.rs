use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;

use domus_client::HttpWorkItemSource;
use domus_core::error::AppError;
use domus_core::models::WorkItem;
use domus_core::traits::WorkItemSource;

use crate::common::{authorized, serve};

async fn urls(headers: HeaderMap) -> (StatusCode, &'static str) {
    if authorized(&headers) {
        (
            StatusCode::OK,
            r#"["https://www.olx.ro/d/oferta/a.html", "https://www.publi24.ro/anunturi/b.html"]"#,
        )
    } else {
        (StatusCode::UNAUTHORIZED, "")
    }
}

fn router() -> Router {
    Router::new()
        .route("/urls", get(urls))
        .route(
            "/contacts",
            get(|| async {
                r#"```json
[{"phoneNumber": "+40740111222", "url": "https://www.olx.ro/d/oferta/a.html"}]
```"#
            }),
        )
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/garbage", get(|| async { "<html>maintenance</html>" }))
}

#[tokio::test]
async fn fetches_url_list_with_basic_auth() {
    let base = serve(router()).await;
    let source = HttpWorkItemSource::new(format!("{base}/urls"))
        .unwrap()
        .with_basic_auth("user", "pass");

    let items = source.fetch_items().await.unwrap();
    assert_eq!(
        items,
        vec![
            WorkItem::Url("https://www.olx.ro/d/oferta/a.html".into()),
            WorkItem::Url("https://www.publi24.ro/anunturi/b.html".into()),
        ]
    );
}

#[tokio::test]
async fn wrong_credentials_are_unauthorized() {
    let base = serve(router()).await;
    let source = HttpWorkItemSource::new(format!("{base}/urls"))
        .unwrap()
        .with_basic_auth("user", "wrong");

    let err = source.fetch_items().await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "got {err:?}");
}

#[tokio::test]
async fn missing_credentials_are_unauthorized() {
    let base = serve(router()).await;
    let source = HttpWorkItemSource::new(format!("{base}/urls")).unwrap();
    assert!(matches!(
        source.fetch_items().await,
        Err(AppError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn fenced_contact_list_is_accepted() {
    let base = serve(router()).await;
    let source = HttpWorkItemSource::new(format!("{base}/contacts")).unwrap();

    let items = source.fetch_items().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].contact_key(), Some("+40740111222"));
}

#[tokio::test]
async fn server_error_is_source_error() {
    let base = serve(router()).await;
    let source = HttpWorkItemSource::new(format!("{base}/broken")).unwrap();

    let err = source.fetch_items().await.unwrap_err();
    assert!(matches!(err, AppError::SourceError(_)));
    assert!(err.to_string().contains("HTTP 500"));
}

#[tokio::test]
async fn unparsable_body_is_source_error() {
    let base = serve(router()).await;
    let source = HttpWorkItemSource::new(format!("{base}/garbage")).unwrap();

    let err = source.fetch_items().await.unwrap_err();
    assert!(err.to_string().contains("Invalid work item list"));
}
