use super::{html, HandlerResult};
use crate::context::{RequestContext, Section};
use crate::middleware::NO_CACHE;
use crate::routes::AppState;
use crate::statistics::get_statistics;
use crate::views::home::{compose_alarms, compose_usage, home_request};
use crate::views::ListRequest;
use axum::extract::State;
use axum::response::Response;
use std::time::Duration;

const STATISTICS_MAX_AGE: Duration = Duration::from_secs(30);
const USAGE_MAX_AGE: Duration = Duration::from_secs(10 * 60);

pub async fn home_page(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let ctx = ctx.in_section(Section::Home);
    let alarms = compose_alarms(&state.upstream, &ctx, &home_request(&ctx.query)).await;

    html(state.renderer.home_page(&ctx, &alarms), NO_CACHE)
}

pub async fn statistics(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let statistics = get_statistics(&state.upstream, &ctx).await;
    html(state.renderer.statistics(&statistics), STATISTICS_MAX_AGE)
}

pub async fn usage(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    let usage = compose_usage(&state.upstream, &ctx).await?;
    Ok(html(state.renderer.usage_chart(&usage), USAGE_MAX_AGE))
}

pub async fn alarm_table(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let request = ListRequest::from_query(&ctx.query);
    let alarms = compose_alarms(&state.upstream, &ctx, &request).await;

    html(state.renderer.alarm_table(&alarms), NO_CACHE)
}
