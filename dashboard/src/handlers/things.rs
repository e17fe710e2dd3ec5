use super::{html, HandlerResult};
use crate::context::{RequestContext, Section};
use crate::forms::{new_thing, require_id, thing_fields, SAVE_MARKER};
use crate::middleware::NO_CACHE;
use crate::paging::QueryParams;
use crate::routes::AppState;
use crate::views::things::{
    compose_new_thing_form, compose_thing_chart, compose_thing_details, compose_thing_list,
};
use crate::views::ListRequest;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect};
use axum::Form;
use tracing::info;
use uuid::Uuid;

fn edit_mode(query: &QueryParams) -> bool {
    query.get("mode") == Some("edit")
}

pub async fn things_page(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    let ctx = ctx.in_section(Section::Things);
    let request = ListRequest::from_query(&ctx.query);
    let list = compose_thing_list(&state.upstream, &ctx, &request, true).await?;

    Ok(html(state.renderer.thing_list_page(&ctx, &list), NO_CACHE))
}

pub async fn thing_data_list(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    let request = ListRequest::from_query(&ctx.query);
    let list = compose_thing_list(&state.upstream, &ctx, &request, false).await?;

    Ok(html(state.renderer.thing_data_list(&list), NO_CACHE))
}

/// Table rows only; the map flag is ignored here.
pub async fn thing_table(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    let mut request = ListRequest::from_query(&ctx.query);
    request.map_view = false;
    let list = compose_thing_list(&state.upstream, &ctx, &request, false).await?;

    Ok(html(state.renderer.thing_table(&list), NO_CACHE))
}

pub async fn thing_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> HandlerResult {
    let ctx = ctx.in_section(Section::Things);
    let id = require_id(Some(id.as_str()), "thing")?;
    let details =
        compose_thing_details(&state.upstream, &ctx, id, &ctx.query, edit_mode(&ctx.query)).await?;

    Ok(html(state.renderer.thing_details_page(&ctx, &details), NO_CACHE))
}

pub async fn thing_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> HandlerResult {
    let id = require_id(Some(id.as_str()), "thing")?;
    let details =
        compose_thing_details(&state.upstream, &ctx, id, &ctx.query, edit_mode(&ctx.query)).await?;

    Ok(html(state.renderer.thing_details(&details), NO_CACHE))
}

/// Applies the edit form and answers with the updated details.
pub async fn update_thing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
    Form(pairs): Form<Vec<(String, String)>>,
) -> HandlerResult {
    let id = require_id(Some(id.as_str()), "thing")?;
    let form = QueryParams::from_pairs(pairs);

    state
        .upstream
        .update_thing(&ctx, id, &thing_fields(&form))
        .await?;
    info!(thing_id = %id, "Updated thing");

    let details = compose_thing_details(&state.upstream, &ctx, id, &ctx.query, false).await?;
    Ok(html(state.renderer.thing_details(&details), NO_CACHE))
}

/// Asks for confirmation before deleting.
pub async fn confirm_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> HandlerResult {
    let id = require_id(Some(id.as_str()), "thing")?;
    let name = ctx.query.get("name").filter(|n| !n.is_empty()).unwrap_or(id);

    Ok(html(state.renderer.delete_thing(id, name), NO_CACHE))
}

/// Deletes once confirmed. Either way the browser goes back to the list.
pub async fn delete_thing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> HandlerResult {
    let id = require_id(Some(id.as_str()), "thing")?;

    if ctx.query.get("confirmed") == Some("true") {
        state.upstream.delete_thing(&ctx, id).await?;
        info!(thing_id = %id, "Deleted thing");
    }

    Ok(Redirect::to("/things").into_response())
}

pub async fn create_thing(
    State(state): State<AppState>,
    ctx: RequestContext,
    Form(pairs): Form<Vec<(String, String)>>,
) -> HandlerResult {
    let form = QueryParams::from_pairs(pairs);
    if !form.contains(SAVE_MARKER) {
        return Ok(Redirect::to("/things").into_response());
    }

    let id = Uuid::new_v4().to_string();
    state.upstream.new_thing(&ctx, new_thing(&form, &id)).await?;
    info!(thing_id = %id, "Created thing");

    Ok(Redirect::to(&format!("/things/{}?mode=edit", id)).into_response())
}

pub async fn new_thing_form(State(state): State<AppState>, ctx: RequestContext) -> HandlerResult {
    let form = compose_new_thing_form(&state.upstream, &ctx).await;
    Ok(html(state.renderer.new_thing_form(&form), NO_CACHE))
}

/// Chart and statistics table for one tab of a thing.
pub async fn thing_chart(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> HandlerResult {
    let id = require_id(Some(id.as_str()), "thing")?;
    let chart = compose_thing_chart(&state.upstream, &ctx, id, &ctx.query).await?;

    Ok(html(state.renderer.thing_chart(&chart), NO_CACHE))
}
