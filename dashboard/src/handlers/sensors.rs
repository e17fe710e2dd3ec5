use super::{found, html, HandlerResult};
use crate::context::{RequestContext, Section};
use crate::forms::{require_id, sensor_fields, SAVE_MARKER};
use crate::middleware::{cached, NO_CACHE};
use crate::paging::QueryParams;
use crate::routes::AppState;
use crate::views::sensors::{
    battery_text, compose_measurement_chart, compose_sensor_details, compose_sensor_list,
    compose_status_chart,
};
use crate::views::ListRequest;
use axum::extract::{Path, State};
use axum::{Form, Json};
use std::time::Duration;
use tracing::info;

const BATTERY_MAX_AGE: Duration = Duration::from_secs(10 * 60);
const STATUS_MAX_AGE: Duration = Duration::from_secs(10);
const MEASUREMENT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

pub async fn sensors_page(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    let ctx = ctx.in_section(Section::Sensors);
    let request = ListRequest::from_query(&ctx.query);
    let list = compose_sensor_list(&state.upstream, &ctx, &request, true).await?;

    Ok(html(state.renderer.sensor_list_page(&ctx, &list), NO_CACHE))
}

pub async fn sensor_data_list(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    let request = ListRequest::from_query(&ctx.query);
    let list = compose_sensor_list(&state.upstream, &ctx, &request, false).await?;

    Ok(html(state.renderer.sensor_data_list(&list), NO_CACHE))
}

pub async fn sensor_table(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    let request = ListRequest::from_query(&ctx.query);
    let list = compose_sensor_list(&state.upstream, &ctx, &request, false).await?;

    Ok(html(state.renderer.sensor_table(&list), NO_CACHE))
}

pub async fn sensor_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> HandlerResult {
    let ctx = ctx.in_section(Section::Sensors);
    let id = require_id(Some(id.as_str()), "sensor")?;
    let details = compose_sensor_details(&state.upstream, &ctx, id).await?;

    Ok(html(state.renderer.sensor_details_page(&ctx, &details), NO_CACHE))
}

async fn details_fragment(state: AppState, ctx: RequestContext, edit: bool) -> HandlerResult {
    let id = require_id(ctx.query.get("id"), "sensor")?;
    let details = compose_sensor_details(&state.upstream, &ctx, id).await?;

    Ok(html(state.renderer.sensor_details(&details, edit), NO_CACHE))
}

pub async fn sensor_details(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    details_fragment(state, ctx, false).await
}

pub async fn sensor_details_edit(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    details_fragment(state, ctx, true).await
}

/// Applies the edit form, then sends the browser back to the sensor page.
pub async fn save_sensor(
    State(state): State<AppState>,
    ctx: RequestContext,
    Form(pairs): Form<Vec<(String, String)>>,
) -> HandlerResult {
    let form = QueryParams::from_pairs(pairs);
    let id = require_id(form.get("id"), "sensor")?;
    let location = format!("/sensors/{}", id);

    if !form.contains(SAVE_MARKER) {
        return Ok(found(&location));
    }

    state
        .upstream
        .update_sensor(&ctx, id, &sensor_fields(&form))
        .await?;
    info!(device_id = %id, "Updated sensor");

    Ok(found(&location))
}

pub async fn battery_level(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> HandlerResult {
    let id = require_id(Some(id.as_str()), "sensor")?;
    let text = battery_text(&state.upstream, &ctx, id).await?;

    Ok(html(text, BATTERY_MAX_AGE))
}

pub async fn status_chart(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> HandlerResult {
    let id = require_id(Some(id.as_str()), "sensor")?;
    let chart = compose_status_chart(&state.upstream, &ctx, id).await?;

    Ok(cached(Json(chart), STATUS_MAX_AGE))
}

pub async fn measurement_chart(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    let dataset = compose_measurement_chart(&state.upstream, &ctx, &ctx.query).await?;
    Ok(html(state.renderer.measurement_chart(&dataset), MEASUREMENT_MAX_AGE))
}
