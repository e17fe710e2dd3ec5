use super::{html, HandlerResult};
use crate::context::{RequestContext, Section};
use crate::errors::Error;
use crate::middleware::NO_CACHE;
use crate::routes::AppState;
use crate::views::sensors::compose_type_options;
use axum::extract::{Multipart, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use tracing::{info, warn};

pub async fn admin_page(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let ctx = ctx.in_section(Section::Admin);
    html(state.renderer.admin_page(&ctx), NO_CACHE)
}

pub async fn error_page(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let ctx = ctx.in_section(Section::Error);
    html(state.renderer.error_page(&ctx), NO_CACHE)
}

/// Measurement type checkboxes for the profile with decoder `sensorType`.
/// With `id`, that sensor's current types are checked.
pub async fn measurement_types(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let decoder = ctx.query.get("sensorType").unwrap_or_default();
    let sensor_id = ctx.query.get("id").filter(|id| !id.is_empty());
    let options = compose_type_options(&state.upstream, &ctx, decoder, sensor_id).await;

    html(state.renderer.type_options(&options), NO_CACHE)
}

/// Downloads an export in the `accept` format.
///
/// htmx cannot save files, so the first request only answers with an
/// `HX-Redirect` back here marked `redirected=true` and the browser follows it.
pub async fn export(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    if !ctx.query.contains("export") || !ctx.query.contains("accept") {
        return Ok(StatusCode::BAD_REQUEST.into_response());
    }

    if !ctx.query.contains("redirected") {
        let mut query = ctx.query.clone();
        query.set("redirected", "true");
        let location = format!("/admin/export?{}", query.encode());
        return Ok((StatusCode::OK, [("HX-Redirect", location)], "").into_response());
    }

    let accept = ctx.query.get("accept").unwrap_or_default();
    let content_type = HeaderValue::from_str(accept)
        .map_err(|_| Error::Validation(format!("invalid export format {:?}", accept)))?;

    let mut query = ctx.query.clone();
    query.remove("redirected");
    let body = state.upstream.export(&ctx, &query, accept).await?;
    info!(export = ?query.get("export"), bytes = body.len(), "Exported");

    Ok(([(CONTENT_TYPE, content_type)], body).into_response())
}

/// Forwards an uploaded `file` of the submitted `type` and returns to the admin page.
pub async fn import(
    State(state): State<AppState>,
    ctx: RequestContext,
    mut multipart: Multipart,
) -> HandlerResult {
    let mut kind = String::new();
    let mut file: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read import upload: {}", e);
                return Ok(StatusCode::BAD_REQUEST.into_response());
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "type" => {
                kind = field.text().await.unwrap_or_default();
            }
            "file" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((content_type, bytes.to_vec())),
                    Err(e) => {
                        warn!("Failed to read import file: {}", e);
                        return Ok(StatusCode::BAD_REQUEST.into_response());
                    }
                }
            }
            _ => {}
        }
    }

    let Some((content_type, bytes)) = file else {
        return Ok(StatusCode::BAD_REQUEST.into_response());
    };

    let size = bytes.len();
    state
        .upstream
        .import(&ctx, &kind, &content_type, bytes)
        .await?;
    info!(kind = %kind, bytes = size, "Imported");

    Ok(Redirect::to("/admin").into_response())
}
