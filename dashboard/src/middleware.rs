use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};
use axum::extract::Request;
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, VARY};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

pub const NO_CACHE: Duration = Duration::ZERO;

/// Fragments are only served to htmx requests.
pub async fn require_hx(request: Request, next: Next) -> Response {
    let is_hx = request
        .headers()
        .get("HX-Request")
        .and_then(|v| v.to_str().ok())
        == Some("true");

    if !is_hx {
        return (StatusCode::BAD_REQUEST, "bad request").into_response();
    }

    next.run(request).await
}

/// Replaces any credentials with the devmode token.
pub async fn no_login(mut request: Request, next: Next) -> Response {
    request
        .headers_mut()
        .insert(AUTHORIZATION, HeaderValue::from_static("Bearer devmode"));
    next.run(request).await
}

pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    HTTP_REQUESTS_TOTAL.inc();
    HTTP_REQUEST_DURATION_SECONDS.observe(elapsed.as_secs_f64());

    let status = response.status();
    if status.is_server_error() {
        error!(method = %method, path = %path, status = status.as_u16(), ?elapsed, "served http request");
    } else if status.is_client_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), ?elapsed, "served http request");
    } else {
        debug!(method = %method, path = %path, status = status.as_u16(), ?elapsed, "served http request");
    }

    response
}

/// Sets `Cache-Control`. Anything up to a second is not cached at all.
pub fn cached(response: impl IntoResponse, max_age: Duration) -> Response {
    let mut response = response.into_response();
    let headers = response.headers_mut();

    if max_age > Duration::from_secs(1) {
        let value = format!("max-age={}", max_age.as_secs_f64().round() as u64);
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(CACHE_CONTROL, value);
        }
        headers.append(VARY, HeaderValue::from_static("Accept-Language"));
    } else {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::{middleware, Router};
    use tower::ServiceExt;

    fn router() -> Router {
        Router::new()
            .route(
                "/fragment",
                get(|| async { "ok" }).layer(middleware::from_fn(require_hx)),
            )
            .route(
                "/token",
                get(|request: Request| async move {
                    request
                        .headers()
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                }),
            )
    }

    #[tokio::test]
    async fn test_require_hx() {
        let rejected = router()
            .oneshot(Request::builder().uri("/fragment").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let accepted = router()
            .oneshot(
                Request::builder()
                    .uri("/fragment")
                    .header("HX-Request", "true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_no_login_overrides_token() {
        let app = router().layer(middleware::from_fn(no_login));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/token")
                    .header(AUTHORIZATION, "Bearer someone")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Bearer devmode");
    }

    #[test]
    fn test_cache_headers() {
        let response = cached("x", Duration::from_secs(600));
        assert_eq!(response.headers()[CACHE_CONTROL], "max-age=600");
        assert_eq!(response.headers()[VARY], "Accept-Language");

        let response = cached("x", Duration::from_secs(1));
        assert_eq!(response.headers()[CACHE_CONTROL], "no-cache");
        assert!(response.headers().get(VARY).is_none());
    }
}
