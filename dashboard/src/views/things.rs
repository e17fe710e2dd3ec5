use super::ListRequest;
use crate::chart::{to_dataset, ChartDataset, ChartPresentation, ThingChart, TimeWindow};
use crate::client::Upstream;
use crate::context::RequestContext;
use crate::errors::Result;
use crate::model::{Location, Measurement, SensorIdentifier, Thing};
use crate::paging::{Paging, QueryParams};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

pub const THING_TABLE_URL: &str = "/components/tables/things";

#[derive(Debug, Clone, PartialEq)]
pub struct ThingRow {
    pub id: String,
    pub thing_type: String,
    pub sub_type: String,
    pub name: String,
    pub alternative_name: String,
    pub description: String,
    pub location: Location,
    pub tenant: String,
    pub tags: Vec<String>,
    pub observed_at: Option<DateTime<Utc>>,
    /// Series of the first reference device.
    pub measurements: Vec<Measurement>,
    pub properties: BTreeMap<String, Value>,
    /// Never empty: a thing without devices gets one blank entry.
    pub ref_devices: Vec<String>,
}

impl From<Thing> for ThingRow {
    fn from(thing: Thing) -> Self {
        let mut ref_devices: Vec<String> =
            thing.ref_devices.into_iter().map(|r| r.device_id).collect();
        if ref_devices.is_empty() {
            ref_devices.push(String::new());
        }

        ThingRow {
            properties: thing.type_values.properties(),
            measurements: thing.values.into_iter().next().unwrap_or_default(),
            id: thing.id,
            thing_type: thing.thing_type,
            sub_type: thing.sub_type.unwrap_or_default(),
            name: thing.name,
            alternative_name: thing.alternative_name.unwrap_or_default(),
            description: thing.description,
            location: thing.location,
            tenant: thing.tenant,
            tags: thing.tags,
            observed_at: thing.observed_at,
            ref_devices,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThingList {
    pub things: Vec<ThingRow>,
    pub tags: Vec<String>,
    pub types: Vec<String>,
    pub paging: Paging,
    pub map_view: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThingDetails {
    pub thing: ThingRow,
    /// Lowercase `type[:subtype]`, used to pick the chart.
    pub thing_type: String,
    pub tenant: String,
    /// At least one entry, possibly blank.
    pub tabs: Vec<String>,
    pub latest: BTreeMap<String, Measurement>,
    pub edit: Option<ThingEdit>,
}

/// Choices offered by the edit form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThingEdit {
    pub valid_sensors: Vec<SensorIdentifier>,
    pub organisations: Vec<String>,
    pub tags: Vec<String>,
}

/// Choices offered by the new-thing form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewThingForm {
    pub types: Vec<String>,
    pub organisations: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThingChartView {
    pub datasets: Vec<ChartDataset>,
    pub presentation: ChartPresentation,
    pub window: TimeWindow,
}

async fn soft_tags(upstream: &Upstream, ctx: &RequestContext) -> Vec<String> {
    upstream.get_tags(ctx).await.unwrap_or_else(|e| {
        warn!("Failed to fetch tags: {}", e);
        Vec::new()
    })
}

async fn soft_types(upstream: &Upstream, ctx: &RequestContext) -> Vec<String> {
    upstream.get_types(ctx).await.unwrap_or_else(|e| {
        warn!("Failed to fetch thing types: {}", e);
        Vec::new()
    })
}

/// A page of things. Tags and types are only fetched for full pages.
pub async fn compose_thing_list(
    upstream: &Upstream,
    ctx: &RequestContext,
    request: &ListRequest,
    with_reference_data: bool,
) -> Result<ThingList> {
    let request = request.clone().for_map();

    let reference = async {
        if with_reference_data {
            futures::join!(soft_tags(upstream, ctx), soft_types(upstream, ctx))
        } else {
            (Vec::new(), Vec::new())
        }
    };

    let (page, (tags, types)) = futures::join!(
        upstream.get_things(ctx, request.offset, request.limit, &request.filters),
        reference
    );
    let page = page?;

    let paging = request.paging(page.count, page.total_records, THING_TABLE_URL);

    Ok(ThingList {
        things: page.items.into_iter().map(ThingRow::from).collect(),
        tags,
        types,
        paging,
        map_view: request.map_view,
    })
}

/// Tab name of a latest value: its id without the thing id prefix, `/` replaced by `-`.
fn tab_name(value_id: &str, thing_id: &str) -> String {
    let rest = value_id.replacen(thing_id, "", 1);
    rest.strip_prefix('/')
        .unwrap_or(&rest)
        .replace('/', "-")
}

pub async fn compose_thing_details(
    upstream: &Upstream,
    ctx: &RequestContext,
    id: &str,
    query: &QueryParams,
    edit: bool,
) -> Result<ThingDetails> {
    let mut extra = query.clone();
    extra.remove("mode");

    let (thing, latest_values) = futures::join!(
        upstream.get_thing(ctx, id, &extra),
        upstream.get_latest_values(ctx, id)
    );
    let thing = thing?;
    let latest_values = latest_values?;

    let mut tabs = Vec::new();
    let mut latest = BTreeMap::new();
    for value in latest_values {
        let tab = tab_name(&value.id, id);
        tabs.push(tab.clone());
        latest.insert(tab, value);
    }
    if tabs.is_empty() {
        tabs.push(String::new());
    }

    let mut thing_type = thing.thing_type.clone();
    if let Some(sub_type) = &thing.sub_type {
        thing_type.push(':');
        thing_type.push_str(sub_type);
    }

    let edit = if edit {
        let (valid_sensors, organisations, tags) = futures::join!(
            upstream.get_valid_sensors(ctx, &thing.valid_urns),
            upstream.get_tenants(ctx),
            soft_tags(upstream, ctx)
        );
        Some(ThingEdit {
            valid_sensors: valid_sensors.unwrap_or_else(|e| {
                warn!("Failed to fetch valid sensors: {}", e);
                Vec::new()
            }),
            organisations,
            tags,
        })
    } else {
        None
    };

    Ok(ThingDetails {
        tenant: thing.tenant.clone(),
        thing: ThingRow::from(thing),
        thing_type: thing_type.to_lowercase(),
        tabs,
        latest,
        edit,
    })
}

pub async fn compose_new_thing_form(upstream: &Upstream, ctx: &RequestContext) -> NewThingForm {
    let (types, organisations, tags) = futures::join!(
        soft_types(upstream, ctx),
        upstream.get_tenants(ctx),
        soft_tags(upstream, ctx)
    );

    NewThingForm {
        types,
        organisations,
        tags,
    }
}

/// Chart for one tab of a thing. Query keys `type`, `subType`, `tab`, `timeAt`, `endTimeAt`.
pub async fn compose_thing_chart(
    upstream: &Upstream,
    ctx: &RequestContext,
    id: &str,
    query: &QueryParams,
) -> Result<ThingChartView> {
    let chart = ThingChart::new(
        query.get("type").unwrap_or_default(),
        query.get("subType").unwrap_or_default(),
        query.get("tab").unwrap_or_default(),
    );
    let window = TimeWindow::from_query(query, TimeWindow::today(Utc::now()));

    let thing = upstream.get_thing(ctx, id, &chart.query(&window)).await?;

    let mut datasets: Vec<ChartDataset> = thing
        .values
        .iter()
        .map(|series| to_dataset(chart.label(), series))
        .collect();
    if datasets.is_empty() {
        datasets.push(ChartDataset::new(chart.label()));
    }

    Ok(ThingChartView {
        datasets,
        presentation: chart.presentation(thing.type_values.max_distance),
        window,
    })
}
