use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use dashboard::client::{Upstream, UpstreamClient};
use dashboard::config::Upstreams;
use dashboard::render::HtmlRenderer;
use dashboard::routes::{create_router, AppState};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(server: &MockServer, devmode: bool) -> Router {
    let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();
    let upstream = Upstream::new(client, Upstreams::with_base(&server.uri()));
    create_router(
        AppState::new(upstream, HtmlRenderer),
        devmode,
        Path::new("./assets"),
    )
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn form(uri: &str, body: &'static str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_sensor_table_pages_up_to_last() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v0/devices"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"totalRecords": 23, "count": 1},
            "data": [{"deviceID": "dev-1", "name": "Temp 1"}]
        })))
        .mount(&server)
        .await;

    let request = Request::get("/components/tables/sensors?offset=0&limit=10")
        .header("HX-Request", "true")
        .body(Body::empty())
        .unwrap();
    let response = app(&server, true).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-cache");

    let body = body_text(response).await;
    assert!(body.contains("Temp 1"));
    assert!(body.contains("page=3"));
    assert!(!body.contains("page=4"));
}

#[tokio::test]
async fn test_sensor_list_second_page_stays_in_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v0/devices"))
        .and(query_param("offset", "10"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"totalRecords": 23, "count": 1},
            "data": [{"deviceID": "dev-11"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::get("/components/sensors/list?page=2&limit=10&type=elsys")
        .header("HX-Request", "true")
        .body(Body::empty())
        .unwrap();
    let response = app(&server, true).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("page=1"));
    assert!(body.contains("page=3"));
    assert!(!body.contains("page=4"));
    assert!(body.contains("type=elsys"));
}

#[tokio::test]
async fn test_devmode_token_reaches_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v0/devices"))
        .and(header("Authorization", "Bearer devmode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"totalRecords": 0, "count": 0},
            "data": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::get("/components/tables/sensors")
        .header("HX-Request", "true")
        .header("Authorization", "Bearer someone-else")
        .body(Body::empty())
        .unwrap();
    let response = app(&server, true).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_fragment_without_hx_header_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let request = Request::get("/components/tables/things")
        .body(Body::empty())
        .unwrap();
    let response = app(&server, true).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unauthorized_upstream_maps_to_401() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v0/things"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let request = Request::get("/components/tables/things")
        .header("HX-Request", "true")
        .body(Body::empty())
        .unwrap();
    let response = app(&server, false).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, "not authorized");
}

#[tokio::test]
async fn test_sensor_save_without_marker_skips_update() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = app(&server, true)
        .oneshot(form("/components/sensors/details", "id=dev-1&name=Renamed"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/sensors/dev-1");
}

#[tokio::test]
async fn test_sensor_save_patches_device() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v0/devices/dev-1"))
        .and(body_partial_json(json!({"name": "Renamed"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server, true)
        .oneshot(form(
            "/components/sensors/details",
            "id=dev-1&name=Renamed&save=true",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/sensors/dev-1");
}

#[tokio::test]
async fn test_confirmed_delete_removes_thing() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v0/things/t1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::delete("/things/t1?confirmed=true")
        .body(Body::empty())
        .unwrap();
    let response = app(&server, true).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/things");
}

#[tokio::test]
async fn test_thing_update_connects_sensor() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v0/things/t1"))
        .and(body_partial_json(json!({
            "name": "Passage 1",
            "refDevices": [{"deviceID": "dev-1"}]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v0/things/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "t1", "type": "Passage", "name": "Passage 1"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v0/things/values"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let request = Request::post("/components/things/t1")
        .header("HX-Request", "true")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("name=Passage+1&currentDevice=dev-1"))
        .unwrap();
    let response = app(&server, true).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Passage 1"));
}

#[tokio::test]
async fn test_create_thing_redirects_to_edit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/things"))
        .and(body_partial_json(json!({"type": "Room", "name": "Office"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server, true)
        .oneshot(form("/things", "type=Room&name=Office&save=true"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("/things/"));
    assert!(location.ends_with("?mode=edit"));
}

#[tokio::test]
async fn test_export_downloads_upstream_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v0/admin/export"))
        .and(query_param("export", "devices"))
        .and(header("accept", "text/csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("deviceID;name\ndev-1;Temp\n"))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::get("/admin/export?export=devices&accept=text%2Fcsv&redirected=true")
        .body(Body::empty())
        .unwrap();
    let response = app(&server, true).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/csv");
    assert_eq!(body_text(response).await, "deviceID;name\ndev-1;Temp\n");
}

#[tokio::test]
async fn test_import_forwards_uploaded_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/admin/import"))
        .and(query_param("type", "things"))
        .and(header("content-type", "text/csv"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let body = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"type\"\r\n\r\n\
        things\r\n\
        --XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"things.csv\"\r\n\
        Content-Type: text/csv\r\n\r\n\
        id;type\nt1;Room\n\r\n\
        --XBOUNDARY--\r\n";
    let request = Request::post("/admin/import")
        .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();
    let response = app(&server, true).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/admin");
}

#[tokio::test]
async fn test_import_without_file_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let body = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"type\"\r\n\r\n\
        things\r\n\
        --XBOUNDARY--\r\n";
    let request = Request::post("/admin/import")
        .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();
    let response = app(&server, true).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_health() {
    tokio_test::block_on(async {
        let server = MockServer::start().await;
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let response = app(&server, false).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    });
}
