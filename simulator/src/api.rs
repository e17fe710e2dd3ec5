use crate::fleet::{daily_sums, type_name, Device, Fleet, Measurement, Thing, TENANTS};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

const DEFAULT_LIMIT: usize = 10_000;

type SharedFleet = Arc<RwLock<Fleet>>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    total_records: usize,
    count: usize,
    offset: usize,
    limit: usize,
}

#[derive(Debug, Serialize)]
struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<Meta>,
    data: Value,
}

impl Envelope {
    fn data(data: impl Serialize) -> Json<Self> {
        Json(Envelope {
            meta: None,
            data: serde_json::to_value(data).unwrap_or_default(),
        })
    }

    fn page<T: Serialize + Clone>(items: &[T], params: &Params) -> Json<Self> {
        let offset = params.number("offset").unwrap_or(0);
        let limit = params.number("limit").unwrap_or(DEFAULT_LIMIT);
        let page: Vec<T> = items.iter().skip(offset).take(limit).cloned().collect();

        Json(Envelope {
            meta: Some(Meta {
                total_records: items.len(),
                count: page.len(),
                offset,
                limit,
            }),
            data: serde_json::to_value(page).unwrap_or_default(),
        })
    }
}

/// Query string as pairs; keys such as `urn` repeat.
#[derive(Debug)]
struct Params(Vec<(String, String)>);

impl Params {
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, v)| k.eq_ignore_ascii_case(key) && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    fn all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v == "true")
    }

    fn number(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    fn time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

pub fn create_router(fleet: Fleet) -> Router {
    let state: SharedFleet = Arc::new(RwLock::new(fleet));

    let api = Router::new()
        .route("/devices", get(list_devices))
        .route("/devices/:id", get(get_device).patch(update_device))
        .route("/devices/:id/status", get(get_device_status))
        .route("/admin/tenants", get(tenants))
        .route("/admin/deviceprofiles", get(device_profiles))
        .route("/admin/export", get(export))
        .route("/admin/import", post(import))
        .route("/alarms", get(alarms))
        .route("/measurements", get(measurements))
        .route("/measurements/:id", get(measurement_info))
        .route("/things", get(list_things).post(create_thing))
        .route("/things/tags", get(thing_tags))
        .route("/things/types", get(thing_types))
        .route("/things/values", get(latest_values))
        .route(
            "/things/:id",
            get(get_thing).patch(update_thing).delete(delete_thing),
        );

    Router::new().nest("/api/v0", api).with_state(state)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}

fn device_matches(device: &Device, params: &Params) -> bool {
    if params.flag("active").is_some_and(|a| a != device.active) {
        return false;
    }
    if params
        .flag("online")
        .is_some_and(|o| o != device.device_state.online)
    {
        return false;
    }
    if let Some(profile) = params.get("type").or_else(|| params.get("profilename")) {
        if !device.device_profile.name.eq_ignore_ascii_case(profile) {
            return false;
        }
    }
    if let Some(search) = params.get("search") {
        let search = search.to_lowercase();
        if !device.name.to_lowercase().contains(&search)
            && !device.device_id.to_lowercase().contains(&search)
        {
            return false;
        }
    }

    let urns = params.all("urn");
    urns.is_empty()
        || device
            .device_profile
            .types
            .iter()
            .any(|t| urns.contains(&t.as_str()))
}

async fn list_devices(
    State(fleet): State<SharedFleet>,
    Query(params): Query<Vec<(String, String)>>,
) -> Json<Envelope> {
    let params = Params(params);
    let fleet = fleet.read().await;
    let devices: Vec<Device> = fleet
        .devices
        .iter()
        .filter(|d| device_matches(d, &params))
        .cloned()
        .collect();

    debug!("Serving {} matching devices", devices.len());
    Envelope::page(&devices, &params)
}

async fn get_device(State(fleet): State<SharedFleet>, Path(id): Path<String>) -> Response {
    match fleet.read().await.device(&id) {
        Some(device) => Envelope::data(device).into_response(),
        None => not_found(),
    }
}

/// Hourly radio status for the last day, ending with the device's current status.
async fn get_device_status(State(fleet): State<SharedFleet>, Path(id): Path<String>) -> Response {
    let fleet = fleet.read().await;
    let Some(device) = fleet.device(&id) else {
        return not_found();
    };

    let current = &device.device_status;
    let history: Vec<Value> = (0..24)
        .rev()
        .map(|hours_ago| {
            let drift = (hours_ago % 5) as f64;
            json!({
                "batteryLevel": current.battery_level,
                "rssi": current.rssi - drift,
                "loRaSNR": current.lora_snr - drift / 2.0,
                "frequency": current.frequency,
                "spreadingFactor": current.spreading_factor,
                "dr": current.dr,
                "observedAt": current.observed_at - Duration::hours(hours_ago),
            })
        })
        .collect();

    Envelope::data(history).into_response()
}

async fn update_device(
    State(fleet): State<SharedFleet>,
    Path(id): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> StatusCode {
    if fleet.write().await.update_device(&id, &fields) {
        info!(device_id = %id, "Updated device");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn tenants() -> Json<Envelope> {
    Envelope::data(TENANTS)
}

async fn device_profiles(State(fleet): State<SharedFleet>) -> Json<Envelope> {
    Envelope::data(&fleet.read().await.profiles)
}

/// Devices or things as `;` separated text when CSV is asked for, JSON otherwise.
async fn export(
    State(fleet): State<SharedFleet>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let params = Params(params);
    let csv = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/csv"));
    let fleet = fleet.read().await;

    let rows: Vec<[String; 5]> = match params.get("export") {
        Some("devices") => fleet
            .devices
            .iter()
            .map(|d| {
                [
                    d.device_id.clone(),
                    d.name.clone(),
                    d.tenant.clone(),
                    d.location.latitude.to_string(),
                    d.location.longitude.to_string(),
                ]
            })
            .collect(),
        Some("things") => fleet
            .things
            .iter()
            .map(|t| {
                [
                    t.id.clone(),
                    t.name.clone(),
                    t.tenant.clone(),
                    t.location.latitude.to_string(),
                    t.location.longitude.to_string(),
                ]
            })
            .collect(),
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    info!("Exporting {} rows", rows.len());

    if !csv {
        return Json(rows).into_response();
    }

    let mut body = String::from("id;name;tenant;latitude;longitude\n");
    for row in rows {
        body.push_str(&row.join(";"));
        body.push('\n');
    }
    ([(header::CONTENT_TYPE, "text/csv")], body).into_response()
}

/// Accepts any upload and reports how many records it held.
async fn import(Query(params): Query<Vec<(String, String)>>, body: Bytes) -> StatusCode {
    let params = Params(params);
    let records = String::from_utf8_lossy(&body)
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .count();

    info!(kind = ?params.get("type"), records, "Imported");
    StatusCode::CREATED
}

async fn alarms(
    State(fleet): State<SharedFleet>,
    Query(params): Query<Vec<(String, String)>>,
) -> Json<Envelope> {
    let params = Params(params);
    Envelope::page(&fleet.read().await.alarms(), &params)
}

fn battery_series(device: &Device) -> Value {
    let values: Vec<Value> = device
        .battery
        .map(|v| {
            json!({
                "v": (v * 10.0).round() / 10.0,
                "unit": "%",
                "timestamp": device.device_status.observed_at,
            })
        })
        .into_iter()
        .collect();

    json!({"deviceID": device.device_id, "values": values})
}

/// Battery series, a device series or, without an id, daily usage sums.
async fn measurements(
    State(fleet): State<SharedFleet>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let params = Params(params);
    let now = Utc::now();

    let Some(id) = params.get("id") else {
        let (Some(start), Some(end)) = (params.time("timeat"), params.time("endTimeAt")) else {
            return Envelope::data(json!({"values": []})).into_response();
        };

        let sums: Vec<Value> = daily_sums(&mut rand::thread_rng(), start, end, now)
            .into_iter()
            .map(|(timestamp, sum)| json!({"timestamp": timestamp, "sum": sum}))
            .collect();
        return Envelope::data(json!({"values": sums})).into_response();
    };

    let fleet = fleet.read().await;
    let device_id = id.split('/').next().unwrap_or_default();
    let Some(device) = fleet.device(device_id) else {
        return not_found();
    };

    if id.ends_with("/3/9") {
        return Envelope::data(battery_series(device)).into_response();
    }

    let limit = params.number("limit").unwrap_or(100);
    let end = params.time("endTimeAt").unwrap_or(now);
    let start = params
        .time("timeat")
        .unwrap_or(end - Duration::hours(24));
    let step = ((end - start) / limit.max(1) as i32).max(Duration::minutes(1));

    let mut values = Vec::new();
    let mut at = end;
    let mut value = 20.0;
    while at > start && values.len() < limit {
        value += rand::random::<f64>() - 0.5;
        values.push(json!({"v": (value * 100.0_f64).round() / 100.0, "timestamp": at}));
        at -= step;
    }
    if params.flag("reverse") != Some(true) {
        values.reverse();
    }

    Envelope::data(json!({"deviceID": device.device_id, "urn": id, "values": values})).into_response()
}

/// Latest value of each resource the device reports.
async fn measurement_info(State(fleet): State<SharedFleet>, Path(id): Path<String>) -> Response {
    let fleet = fleet.read().await;
    let Some(device) = fleet.device(&id) else {
        return not_found();
    };

    let values: Vec<Value> = device
        .types
        .iter()
        .filter_map(|t| {
            let object = t.urn.rsplit(':').next()?;
            let (resource, value, unit) = match type_name(&t.urn) {
                "Temperature" => ("5700", 21.5, "Cel"),
                "Humidity" => ("5700", 41.0, "%RH"),
                "Distance" => ("5700", 0.84, "m"),
                "WaterMeter" => ("1", 123.4, "m3"),
                _ => return None,
            };
            Some(json!({
                "id": format!("{}/{}/{}", device.device_id, object, resource),
                "n": t.name,
                "v": value,
                "unit": unit,
                "timestamp": device.device_state.observed_at,
            }))
        })
        .collect();

    Envelope::data(values).into_response()
}

fn thing_matches(thing: &Thing, params: &Params) -> bool {
    if let Some(thing_type) = params.get("type") {
        if !thing.thing_type.eq_ignore_ascii_case(thing_type) {
            return false;
        }
    }
    if let Some(sub_type) = params.get("subType") {
        let matches = thing
            .sub_type
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(sub_type));
        if !matches {
            return false;
        }
    }

    let tags = params.all("tags");
    tags.is_empty() || thing.tags.iter().any(|t| tags.contains(&t.as_str()))
}

async fn list_things(
    State(fleet): State<SharedFleet>,
    Query(params): Query<Vec<(String, String)>>,
) -> Json<Envelope> {
    let params = Params(params);
    let fleet = fleet.read().await;
    let things: Vec<Thing> = fleet
        .things
        .iter()
        .filter(|t| thing_matches(t, &params))
        .map(|t| Thing {
            values: Map::new(),
            ..t.clone()
        })
        .collect();

    Envelope::page(&things, &params)
}

fn in_window(measurement: &Value, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    let Some(timestamp) = measurement
        .get("timestamp")
        .and_then(|t| serde_json::from_value::<DateTime<Utc>>(t.clone()).ok())
    else {
        return false;
    };

    start.map_or(true, |s| timestamp >= s) && end.map_or(true, |e| timestamp <= e)
}

/// One thing with its series cut to `timeat` and `endTimeAt`.
async fn get_thing(
    State(fleet): State<SharedFleet>,
    Path(id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let params = Params(params);
    let fleet = fleet.read().await;
    let Some(thing) = fleet.thing(&id) else {
        return not_found();
    };

    let start = params.time("timeat");
    let end = params.time("endTimeAt");
    let mut thing = thing.clone();
    for series in thing.values.values_mut() {
        if let Value::Array(points) = series {
            points.retain(|m| in_window(m, start, end));
        }
    }

    Envelope::data(thing).into_response()
}

async fn create_thing(State(fleet): State<SharedFleet>, Json(body): Json<Value>) -> StatusCode {
    let Ok(mut thing) = serde_json::from_value::<NewThing>(body) else {
        return StatusCode::BAD_REQUEST;
    };
    thing.name = thing.name.trim().to_string();

    let now = Utc::now();
    let mut fleet = fleet.write().await;
    if fleet.thing(&thing.id).is_some() {
        return StatusCode::CONFLICT;
    }

    info!(thing_id = %thing.id, thing_type = %thing.thing_type, "Created thing");
    fleet.things.push(Thing {
        id: thing.id,
        thing_type: thing.thing_type,
        sub_type: thing.sub_type,
        name: thing.name,
        description: thing.description,
        location: thing.location,
        ref_devices: Vec::new(),
        tags: Vec::new(),
        tenant: thing.tenant,
        observed_at: now,
        valid_urns: Vec::new(),
        values: Map::new(),
        properties: Map::new(),
    });

    StatusCode::CREATED
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewThing {
    id: String,
    #[serde(rename = "type")]
    thing_type: String,
    sub_type: Option<String>,
    name: String,
    #[serde(default)]
    description: String,
    location: crate::fleet::Location,
    #[serde(default)]
    tenant: String,
}

async fn update_thing(
    State(fleet): State<SharedFleet>,
    Path(id): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> StatusCode {
    let mut fleet = fleet.write().await;
    let Some(thing) = fleet.things.iter_mut().find(|t| t.id == id) else {
        return StatusCode::NOT_FOUND;
    };

    let mut current = match serde_json::to_value(&*thing) {
        Ok(Value::Object(map)) => map,
        _ => return StatusCode::INTERNAL_SERVER_ERROR,
    };
    current.extend(fields);

    match serde_json::from_value::<Thing>(Value::Object(current)) {
        Ok(updated) => {
            *thing = updated;
            info!(thing_id = %id, "Updated thing");
            StatusCode::NO_CONTENT
        }
        Err(_) => StatusCode::BAD_REQUEST,
    }
}

async fn delete_thing(State(fleet): State<SharedFleet>, Path(id): Path<String>) -> StatusCode {
    let mut fleet = fleet.write().await;
    let before = fleet.things.len();
    fleet.things.retain(|t| t.id != id);

    if fleet.things.len() < before {
        info!(thing_id = %id, "Deleted thing");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn thing_tags(State(fleet): State<SharedFleet>) -> Json<Envelope> {
    Envelope::data(fleet.read().await.tags())
}

async fn thing_types(State(fleet): State<SharedFleet>) -> Json<Envelope> {
    let types: Vec<Value> = fleet
        .read()
        .await
        .thing_types()
        .into_iter()
        .map(|name| json!({"name": name}))
        .collect();
    Envelope::data(types)
}

/// Newest measurement of each series of a thing.
async fn latest_values(
    State(fleet): State<SharedFleet>,
    Query(params): Query<Vec<(String, String)>>,
) -> Json<Envelope> {
    let params = Params(params);
    let fleet = fleet.read().await;

    let latest: Vec<Measurement> = params
        .get("thingid")
        .and_then(|id| fleet.thing(id))
        .map(|thing| {
            thing
                .values
                .values()
                .filter_map(|series| {
                    serde_json::from_value::<Vec<Measurement>>(series.clone()).ok()
                })
                .filter_map(|series| series.into_iter().max_by_key(|m| m.timestamp))
                .collect()
        })
        .unwrap_or_default();

    Envelope::data(latest)
}
