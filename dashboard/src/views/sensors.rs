use super::ListRequest;
use crate::chart::{status_chart, to_dataset, ChartDataset, StatusChart, TimeWindow};
use crate::client::Upstream;
use crate::context::RequestContext;
use crate::devices::MeasurementQuery;
use crate::errors::Result;
use crate::model::{DeviceProfile, DeviceStatus, Location, MeasurementValue, Sensor, Statistics};
use crate::paging::{Paging, QueryParams};
use crate::statistics::get_statistics;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::debug;

pub const SENSOR_TABLE_URL: &str = "/components/tables/sensors";

/// Checkbox name used by the sensor edit form for measurement types.
pub const MEASUREMENT_TYPE_OPTION: &str = "measurementType-option[]";

/// Battery level shown when none could be read.
pub const UNKNOWN_BATTERY: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct SensorDetails {
    pub device_id: String,
    pub dev_eui: String,
    pub name: String,
    pub location: Location,
    pub device_profile: String,
    pub tenant: String,
    pub description: String,
    pub active: bool,
    pub types: Vec<String>,
    pub environment: String,
    pub interval: i64,
    pub observed_at: Option<DateTime<Utc>>,
    pub device_status: DeviceStatus,
    pub measurement_types: Vec<String>,
    pub measurements: Vec<MeasurementValue>,
    pub organisations: Vec<String>,
    pub device_profiles: Vec<DeviceProfile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorRow {
    pub device_id: String,
    pub dev_eui: String,
    pub name: String,
    pub active: bool,
    pub sensor_type: String,
    pub location: Location,
    pub last_seen: Option<DateTime<Utc>>,
    pub battery_level: i64,
    pub has_alerts: bool,
}

impl From<Sensor> for SensorRow {
    fn from(sensor: Sensor) -> Self {
        SensorRow {
            location: sensor.location(),
            last_seen: sensor.observed_at(),
            has_alerts: !sensor.alarms.is_empty(),
            sensor_type: sensor
                .device_profile
                .map(|p| p.name)
                .unwrap_or_default(),
            dev_eui: sensor.sensor_id.unwrap_or_default(),
            name: sensor.name.unwrap_or_default(),
            active: sensor.active,
            device_id: sensor.device_id,
            battery_level: UNKNOWN_BATTERY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorList {
    pub sensors: Vec<SensorRow>,
    /// Only composed for full pages.
    pub statistics: Option<Statistics>,
    pub paging: Paging,
    pub map_view: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeOption {
    pub value: String,
    pub text: String,
    pub name: String,
    pub selected: bool,
}

pub async fn compose_sensor_details(
    upstream: &Upstream,
    ctx: &RequestContext,
    id: &str,
) -> Result<SensorDetails> {
    let sensor = upstream.get_sensor(ctx, id).await?;

    let (organisations, device_profiles) = futures::join!(
        upstream.get_tenants(ctx),
        upstream.get_device_profiles(ctx)
    );

    let measurements = upstream.get_measurement_info(ctx, id).await?;
    let measurement_types = measurements
        .iter()
        .filter_map(|m| m.id.clone())
        .collect();

    let profile = sensor.device_profile.clone().unwrap_or_default();

    Ok(SensorDetails {
        location: sensor.location(),
        observed_at: sensor.observed_at(),
        types: sensor.types.into_iter().map(|t| t.urn).collect(),
        dev_eui: sensor.sensor_id.unwrap_or_default(),
        name: sensor.name.unwrap_or_default(),
        device_profile: profile.name,
        interval: profile.interval,
        tenant: sensor.tenant.unwrap_or_default(),
        description: sensor.description.unwrap_or_default(),
        environment: sensor.environment.unwrap_or_default(),
        active: sensor.active,
        device_status: sensor.device_status.unwrap_or_default(),
        device_id: sensor.device_id,
        measurement_types,
        measurements,
        organisations,
        device_profiles,
    })
}

/// Latest battery reading of a device clamped to 0..=100, or -1 when unavailable.
pub async fn battery_level(upstream: &Upstream, ctx: &RequestContext, device_id: &str) -> i64 {
    let id = format!("{}/3/9", device_id);
    let query = MeasurementQuery::new().last_n(true).limit(1);

    match upstream.get_measurement_data(ctx, Some(&id), &query).await {
        Ok(data) => data
            .values
            .first()
            .and_then(|v| v.value)
            .map(|v| v.clamp(0.0, 100.0) as i64)
            .unwrap_or(UNKNOWN_BATTERY),
        Err(e) => {
            debug!(device_id = %device_id, "Failed to fetch battery level: {}", e);
            UNKNOWN_BATTERY
        }
    }
}

/// Latest battery reading with its unit, `-` when the device has reported none.
pub async fn battery_text(
    upstream: &Upstream,
    ctx: &RequestContext,
    device_id: &str,
) -> Result<String> {
    let id = format!("{}/3/9", device_id);
    let query = MeasurementQuery::new().last_n(true).limit(1);
    let data = upstream.get_measurement_data(ctx, Some(&id), &query).await?;

    Ok(match data.values.first() {
        Some(MeasurementValue {
            value: Some(v),
            unit,
            ..
        }) => format!("{:.0}{}", v, unit),
        _ => "-".to_string(),
    })
}

/// A page of sensors with per-row battery levels, and statistics when requested.
pub async fn compose_sensor_list(
    upstream: &Upstream,
    ctx: &RequestContext,
    request: &ListRequest,
    with_statistics: bool,
) -> Result<SensorList> {
    let statistics = async {
        if with_statistics {
            Some(get_statistics(upstream, ctx).await)
        } else {
            None
        }
    };

    let (page, statistics) = futures::join!(
        upstream.get_sensors(ctx, request.offset, request.limit, &request.filters),
        statistics
    );
    let page = page?;

    let levels = join_all(
        page.items
            .iter()
            .map(|s| battery_level(upstream, ctx, &s.device_id)),
    )
    .await;

    let paging = request.paging(page.count, page.total_records, SENSOR_TABLE_URL);

    let sensors = page
        .items
        .into_iter()
        .zip(levels)
        .map(|(sensor, level)| SensorRow {
            battery_level: level,
            ..SensorRow::from(sensor)
        })
        .collect();

    Ok(SensorList {
        sensors,
        statistics,
        paging,
        map_view: request.map_view,
    })
}

pub async fn compose_status_chart(
    upstream: &Upstream,
    ctx: &RequestContext,
    id: &str,
) -> Result<StatusChart> {
    let statuses = upstream.get_sensor_status(ctx, id).await?;
    Ok(status_chart(&statuses))
}

/// Chart of one measurement series, `sensorMeasurementTypes` in the query, over the last day.
pub async fn compose_measurement_chart(
    upstream: &Upstream,
    ctx: &RequestContext,
    query: &QueryParams,
) -> Result<ChartDataset> {
    let id = query.get("sensorMeasurementTypes").unwrap_or_default();
    if id.is_empty() {
        return Ok(ChartDataset::new(""));
    }

    let window = TimeWindow::from_query(query, TimeWindow::last_day(Utc::now()));
    let measurement_query = MeasurementQuery::new()
        .last_n(true)
        .limit(100)
        .reverse(true)
        .between(window.start, window.end);

    let data = upstream
        .get_measurement_data(ctx, Some(id), &measurement_query)
        .await?;

    Ok(to_dataset("", &data.values))
}

/// Measurement types a device profile supports, sorted by display text.
/// Types in `current` come pre-selected.
pub fn type_options(
    profiles: &[DeviceProfile],
    decoder: &str,
    current: &[String],
) -> Vec<TypeOption> {
    let Some(profile) = profiles.iter().find(|p| p.decoder == decoder) else {
        return Vec::new();
    };

    let mut options: Vec<TypeOption> = profile
        .types
        .iter()
        .flatten()
        .map(|t| TypeOption {
            text: t.split(':').skip(1).collect::<Vec<_>>().join("-"),
            value: t.clone(),
            name: MEASUREMENT_TYPE_OPTION.to_string(),
            selected: current.contains(t),
        })
        .collect();

    options.sort_by(|a, b| a.text.cmp(&b.text));
    options
}

pub async fn compose_type_options(
    upstream: &Upstream,
    ctx: &RequestContext,
    decoder: &str,
    sensor_id: Option<&str>,
) -> Vec<TypeOption> {
    let current = async {
        let Some(id) = sensor_id else {
            return Vec::new();
        };
        match upstream.get_sensor(ctx, id).await {
            Ok(sensor) => sensor.types.into_iter().map(|t| t.urn).collect(),
            Err(e) => {
                debug!("No current types for sensor {}: {}", id, e);
                Vec::new()
            }
        }
    };

    let (profiles, current) = futures::join!(upstream.get_device_profiles(ctx), current);
    type_options(&profiles, decoder, &current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::testing::upstream;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> RequestContext {
        RequestContext::new("token")
    }

    async fn mount_battery(server: &MockServer, device_id: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/v0/measurements"))
            .and(query_param("id", format!("{}/3/9", device_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn battery(v: f64) -> serde_json::Value {
        json!({"data": {"deviceID": "x", "values": [
            {"v": v, "unit": "%", "timestamp": "2024-05-01T10:00:00Z"}
        ]}})
    }

    #[tokio::test]
    async fn test_battery_levels_degrade_per_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/devices"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "meta": {"totalRecords": 23, "count": 3},
                "data": [
                    {"deviceID": "a", "name": "A", "deviceProfile": {"name": "elsys"},
                     "deviceState": {"online": true, "state": 1, "observedAt": "2024-05-01T10:00:00Z"}},
                    {"deviceID": "b", "alarms": ["low battery"]},
                    {"deviceID": "c"}
                ]
            })))
            .mount(&server)
            .await;
        mount_battery(&server, "a", battery(120.0)).await;
        mount_battery(&server, "b", json!({"data": {"deviceID": "b", "values": []}})).await;
        Mock::given(method("GET"))
            .and(path("/api/v0/measurements"))
            .and(query_param("id", "c/3/9"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let request = ListRequest::from_query(&QueryParams::parse("offset=0&limit=10"));
        let list = compose_sensor_list(&upstream(&server), &ctx(), &request, false)
            .await
            .unwrap();

        let levels: Vec<i64> = list.sensors.iter().map(|s| s.battery_level).collect();
        assert_eq!(levels, vec![100, -1, -1]);
        assert_eq!(list.sensors[0].sensor_type, "elsys");
        assert!(list.sensors[0].last_seen.is_some());
        assert!(list.sensors[1].has_alerts);
        assert!(list.statistics.is_none());
        assert_eq!(list.paging.page_last, 3);
    }

    #[tokio::test]
    async fn test_sensor_list_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/devices"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let request = ListRequest::from_query(&QueryParams::new());
        let result = compose_sensor_list(&upstream(&server), &ctx(), &request, true).await;

        assert!(matches!(result, Err(crate::errors::Error::Unauthorized)));
    }

    #[tokio::test]
    async fn test_compose_sensor_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/devices/dev-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {
                "deviceID": "dev-1",
                "sensorID": "a81758fffe0001",
                "name": "Temp 1",
                "active": true,
                "tenant": "default",
                "types": [{"urn": "urn:oma:lwm2m:ext:3303", "name": "Temperature"}],
                "deviceProfile": {"name": "elsys", "decoder": "elsys", "interval": 3600},
                "deviceStatus": {"batteryLevel": 87}
            }})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v0/admin/tenants"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": ["default"]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v0/admin/deviceprofiles"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v0/measurements/dev-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
                {"id": "dev-1/3303/5700", "v": 21.5, "timestamp": "2024-05-01T10:00:00Z"}
            ]})))
            .mount(&server)
            .await;

        let details = compose_sensor_details(&upstream(&server), &ctx(), "dev-1")
            .await
            .unwrap();

        assert_eq!(details.dev_eui, "a81758fffe0001");
        assert_eq!(details.device_profile, "elsys");
        assert_eq!(details.interval, 3600);
        assert_eq!(details.types, vec!["urn:oma:lwm2m:ext:3303"]);
        assert_eq!(details.device_status.battery_level, 87);
        assert_eq!(details.measurement_types, vec!["dev-1/3303/5700"]);
        assert_eq!(details.organisations, vec!["default"]);
        assert!(details.device_profiles.is_empty());
    }

    #[tokio::test]
    async fn test_battery_text() {
        let server = MockServer::start().await;
        mount_battery(&server, "a", battery(86.6)).await;
        mount_battery(&server, "b", json!({"data": {"deviceID": "b", "values": []}})).await;

        let up = upstream(&server);
        assert_eq!(battery_text(&up, &ctx(), "a").await.unwrap(), "87%");
        assert_eq!(battery_text(&up, &ctx(), "b").await.unwrap(), "-");
    }

    #[tokio::test]
    async fn test_measurement_chart_without_series_skips_upstream() {
        let server = MockServer::start().await;

        let dataset = compose_measurement_chart(&upstream(&server), &ctx(), &QueryParams::new())
            .await
            .unwrap();

        assert!(dataset.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_type_options_sorted_by_text() {
        let profiles = vec![DeviceProfile {
            name: "elsys".to_string(),
            decoder: "elsys".to_string(),
            interval: 3600,
            types: Some(vec![
                "urn:oma:lwm2m:ext:3303".to_string(),
                "urn:oma:lwm2m:ext:3200".to_string(),
            ]),
        }];

        let current = vec!["urn:oma:lwm2m:ext:3303".to_string()];
        let options = type_options(&profiles, "elsys", &current);

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].text, "oma-lwm2m-ext-3200");
        assert_eq!(options[0].name, "measurementType-option[]");
        assert!(!options[0].selected);
        assert!(options[1].selected);
        assert!(type_options(&profiles, "unknown", &current).is_empty());
    }

    #[tokio::test]
    async fn test_type_options_select_current_sensor_types() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/admin/deviceprofiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
                {"name": "Elsys", "decoder": "elsys", "interval": 3600,
                 "types": ["urn:oma:lwm2m:ext:3303", "urn:oma:lwm2m:ext:3304"]}
            ]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v0/devices/dev-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {
                "deviceID": "dev-1",
                "types": [{"urn": "urn:oma:lwm2m:ext:3304", "name": "Humidity"}]
            }})))
            .mount(&server)
            .await;

        let up = upstream(&server);
        let options = compose_type_options(&up, &ctx(), "elsys", Some("dev-1")).await;
        let selected: Vec<&str> = options
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.value.as_str())
            .collect();
        assert_eq!(selected, vec!["urn:oma:lwm2m:ext:3304"]);

        let options = compose_type_options(&up, &ctx(), "elsys", Some("missing")).await;
        assert_eq!(options.len(), 2);
        assert!(options.iter().all(|o| !o.selected));
    }
}
