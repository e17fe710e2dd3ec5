use crate::client::Upstream;
use crate::handlers::{admin, events, home, sensors, things};
use crate::metrics::gather_metrics;
use crate::middleware::{log_requests, no_login, require_hx};
use crate::render::Renderer;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use crate::VERSION;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::services::ServeDir;

const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<Upstream>,
    pub renderer: Arc<dyn Renderer>,
    /// Pages from any other version are asked to reload.
    pub version: String,
    pub tick_interval: Duration,
    /// Set to `true` once the server stops.
    pub shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(upstream: Upstream, renderer: impl Renderer + 'static) -> Self {
        let (shutdown, _) = watch::channel(false);
        AppState {
            upstream: Arc::new(upstream),
            renderer: Arc::new(renderer),
            version: VERSION.to_string(),
            tick_interval: TICK_INTERVAL,
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Ends open event streams with a goodbye.
    pub fn shut_down(&self) {
        self.shutdown.send_replace(true);
    }
}

async fn metrics_handler() -> String {
    gather_metrics()
}

async fn health() -> &'static str {
    "ok"
}

/// Fragment routes, only answered for htmx requests.
fn fragments() -> Router<AppState> {
    Router::new()
        .route("/components/home/statistics", get(home::statistics))
        .route("/components/home/usage", get(home::usage))
        .route("/components/tables/alarms", get(home::alarm_table))
        .route("/components/sensors/list", get(sensors::sensor_data_list))
        .route("/components/tables/sensors", get(sensors::sensor_table))
        .route("/components/sensors/details", get(sensors::sensor_details))
        .route(
            "/components/sensors/details/edit",
            get(sensors::sensor_details_edit),
        )
        .route(
            "/components/sensors/:id/batterylevel",
            get(sensors::battery_level),
        )
        .route("/components/sensors/status/:id", get(sensors::status_chart))
        .route("/components/measurements", get(sensors::measurement_chart))
        .route("/components/things", get(things::new_thing_form))
        .route("/components/things/list", get(things::thing_data_list))
        .route("/components/tables/things", get(things::thing_table))
        .route(
            "/components/things/:id",
            get(things::thing_details)
                .post(things::update_thing)
                .delete(things::confirm_delete),
        )
        .route(
            "/components/things/measurements/:id",
            get(things::thing_chart),
        )
        .route("/components/admin/types", get(admin::measurement_types))
        .route_layer(from_fn(require_hx))
}

pub fn create_router(state: AppState, devmode: bool, asset_path: &Path) -> Router {
    let pages = Router::new()
        .route("/", get(home::home_page))
        .route("/home", get(home::home_page))
        .route("/sensors", get(sensors::sensors_page))
        .route("/sensors/:id", get(sensors::sensor_page))
        .route("/components/sensors/details", post(sensors::save_sensor))
        .route("/things", get(things::things_page).post(things::create_thing))
        .route("/objects", get(things::things_page))
        .route(
            "/things/:id",
            get(things::thing_page).delete(things::delete_thing),
        )
        .route("/objects/:id", get(things::thing_page))
        .route("/admin", get(admin::admin_page))
        .route("/admin/export", get(admin::export))
        .route("/admin/import", post(admin::import))
        .route("/error", get(admin::error_page))
        .route("/events/:version", get(events::version_events));

    let mut app = pages
        .merge(fragments())
        .with_state(state)
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health))
        .nest_service("/assets", ServeDir::new(asset_path));

    if devmode {
        app = app.layer(from_fn(no_login));
    }

    app.layer(from_fn(log_requests))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::UpstreamClient;
    use crate::config::Upstreams;
    use crate::render::HtmlRenderer;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::body::to_bytes;
    use futures::StreamExt;
    use tower::ServiceExt;

    fn state() -> AppState {
        let upstream = Upstream::new(
            UpstreamClient::new(Duration::from_secs(1)).unwrap(),
            Upstreams::with_base("http://127.0.0.1:9"),
        );
        AppState::new(upstream, HtmlRenderer)
            .with_version("v2")
            .with_tick_interval(Duration::from_millis(20))
    }

    fn router_with(state: AppState) -> Router {
        create_router(state, true, Path::new("./assets"))
    }

    fn router() -> Router {
        router_with(state())
    }

    /// Splits an event stream body into `(event, data)` pairs.
    fn parse_events(body: &str) -> Vec<(String, String)> {
        body.split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .map(|block| {
                let field = |name: &str| {
                    block
                        .lines()
                        .find_map(|line| line.strip_prefix(name))
                        .unwrap_or_default()
                        .trim()
                        .to_string()
                };
                (field("event:"), field("data:"))
            })
            .collect()
    }

    async fn status(request: Request<Body>) -> StatusCode {
        router().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let health = Request::get("/health").body(Body::empty()).unwrap();
        assert_eq!(status(health).await, StatusCode::OK);

        let metrics = Request::get("/metrics").body(Body::empty()).unwrap();
        assert_eq!(status(metrics).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fragment_requires_hx_header() {
        let request = Request::get("/components/tables/sensors")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(request).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let request = Request::get("/nope").body(Body::empty()).unwrap();
        assert_eq!(status(request).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sensor_save_without_marker_redirects() {
        let request = Request::post("/components/sensors/details")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("id=dev-1&name=Temp"))
            .unwrap();

        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/sensors/dev-1");
    }

    #[tokio::test]
    async fn test_sensor_save_without_id_is_bad_request() {
        let request = Request::post("/components/sensors/details")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("save=true"))
            .unwrap();
        assert_eq!(status(request).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_thing_without_marker_returns_to_list() {
        let request = Request::post("/things")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("type=Room&name=Office"))
            .unwrap();

        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/things");
    }

    #[tokio::test]
    async fn test_unconfirmed_delete_only_redirects() {
        let request = Request::delete("/things/t1").body(Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/things");
    }

    #[tokio::test]
    async fn test_delete_confirmation_fragment() {
        let request = Request::delete("/components/things/t1?name=Bin")
            .header("HX-Request", "true")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["cache-control"], "no-cache");
    }

    #[tokio::test]
    async fn test_error_page() {
        let request = Request::get("/error").body(Body::empty()).unwrap();
        assert_eq!(status(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_outdated_client_is_told_to_upgrade() {
        let request = Request::get("/events/v1").body(Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let events = parse_events(std::str::from_utf8(&body).unwrap());

        assert_eq!(
            events,
            vec![
                ("upgrade".to_string(), "v2".to_string()),
                ("goodbye".to_string(), "see you soon".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_current_client_gets_hello_ticks_and_goodbye() {
        let state = state();
        let request = Request::get("/events/v2").body(Body::empty()).unwrap();
        let response = router_with(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut chunks = response.into_body().into_data_stream();
        let mut body = String::new();
        while parse_events(&body).len() < 3 {
            let chunk = chunks.next().await.unwrap().unwrap();
            body.push_str(std::str::from_utf8(&chunk).unwrap());
        }

        state.shut_down();
        while let Some(chunk) = chunks.next().await {
            body.push_str(std::str::from_utf8(&chunk.unwrap()).unwrap());
        }

        let events = parse_events(&body);
        let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();

        assert_eq!(events[0], ("hello".to_string(), "version handshake ok".to_string()));
        assert!(names[1..names.len() - 1].iter().all(|name| *name == "tick"));
        assert!(names.len() >= 4);
        assert_eq!(
            events.last().unwrap(),
            &("goodbye".to_string(), "system closing down".to_string())
        );
    }

    #[tokio::test]
    async fn test_export_requires_format() {
        let request = Request::get("/admin/export?export=devices")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(request).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_redirects_first() {
        let request = Request::get("/admin/export?export=devices&accept=text%2Fcsv")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["hx-redirect"],
            "/admin/export?export=devices&accept=text%2Fcsv&redirected=true"
        );
    }

    #[tokio::test]
    async fn test_import_requires_multipart() {
        let request = Request::post("/admin/import")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("type=devices"))
            .unwrap();
        assert_eq!(status(request).await, StatusCode::BAD_REQUEST);
    }
}
