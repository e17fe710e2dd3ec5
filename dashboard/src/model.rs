use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

/// Capability of a sensor, e.g. `urn:oma:lwm2m:ext:3303` / Temperature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorType {
    #[serde(default)]
    pub urn: String,
    #[serde(default)]
    pub name: String,
}

/// Decoder configuration shared by sensors of the same make.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    #[serde(default)]
    pub decoder: String,
    #[serde(default)]
    pub interval: i64,
    #[serde(default)]
    pub types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(default)]
    pub battery_level: i64,
    pub rssi: Option<f64>,
    #[serde(rename = "loRaSNR")]
    pub lora_snr: Option<f64>,
    pub frequency: Option<i64>,
    pub spreading_factor: Option<f64>,
    pub dr: Option<i64>,
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub state: i64,
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub key: String,
    pub value: String,
}

/// A device as reported by device management. Only `deviceID` is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "sensorID", default)]
    pub sensor_id: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub types: Vec<SensorType>,
    #[serde(default)]
    pub device_profile: Option<DeviceProfile>,
    #[serde(default)]
    pub device_status: Option<DeviceStatus>,
    #[serde(default)]
    pub device_state: Option<DeviceState>,
    #[serde(default)]
    pub alarms: Vec<String>,
    #[serde(default)]
    pub metadata: Vec<Metadata>,
}

impl Sensor {
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.device_state.as_ref().and_then(|s| s.observed_at)
    }

    pub fn location(&self) -> Location {
        self.location.unwrap_or_default()
    }
}

/// Minimal identity of a sensor that may be connected to a thing.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorIdentifier {
    pub sensor_id: String,
    pub device_id: String,
    pub decoder: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    pub observed_at: DateTime<Utc>,
    #[serde(rename = "alarms", default)]
    pub types: Vec<String>,
}

/// One point of a time series from the measurement service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementValue {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "n", default)]
    pub name: Option<String>,
    #[serde(rename = "v", default)]
    pub value: Option<f64>,
    #[serde(rename = "vb", default)]
    pub bool_value: Option<bool>,
    #[serde(rename = "vs", default)]
    pub string_value: Option<String>,
    #[serde(rename = "sum", default)]
    pub count: Option<f64>,
    #[serde(default)]
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementData {
    #[serde(rename = "deviceID", default)]
    pub device_id: String,
    #[serde(default)]
    pub urn: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub values: Vec<MeasurementValue>,
}

/// One point of a thing's time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(default)]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub urn: String,
    #[serde(rename = "v", default)]
    pub value: Option<f64>,
    #[serde(rename = "vb", default)]
    pub bool_value: Option<bool>,
    #[serde(rename = "vs", default)]
    pub string_value: Option<String>,
    #[serde(default)]
    pub count: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(rename = "ref", default)]
    pub ref_device: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRef {
    #[serde(rename = "deviceID")]
    pub device_id: String,
}

/// Values a thing reports at the top level, depending on its type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThingTypeValues {
    // building
    pub energy: Option<f64>,
    pub power: Option<f64>,
    // lifebuoy, desk
    pub presence: Option<bool>,
    // room, beach
    pub temperature: Option<f64>,
    // container
    #[serde(rename = "maxd")]
    pub max_distance: Option<f64>,
    #[serde(rename = "maxl")]
    pub max_level: Option<f64>,
    #[serde(rename = "meanl")]
    pub mean_level: Option<f64>,
    pub offset: Option<f64>,
    pub angle: Option<f64>,
    pub current_level: Option<f64>,
    pub percent: Option<f64>,
    // passage
    pub cumulated_number_of_passages: Option<i64>,
    pub passages_today: Option<i64>,
    pub current_state: Option<bool>,
    // pumpingstation
    pub pumping_observed: Option<bool>,
    pub pumping_observed_at: Option<DateTime<Utc>>,
    // sewer
    pub overflow_observed: Option<bool>,
    pub overflow_observed_at: Option<DateTime<Utc>>,
    // watermeter
    pub cumulative_volume: Option<f64>,
    pub leakage: Option<bool>,
    pub burst: Option<bool>,
    pub backflow: Option<bool>,
    pub fraud: Option<bool>,
}

impl ThingTypeValues {
    /// Populated values keyed by their wire name.
    pub fn properties(&self) -> BTreeMap<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => {
                map.into_iter().filter(|(_, v)| !v.is_null()).collect()
            }
            _ => BTreeMap::new(),
        }
    }
}

/// Wire shape of `values`: either one series or series grouped by reference device.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawValues {
    Flat(Vec<Measurement>),
    Grouped(BTreeMap<String, Vec<Measurement>>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawThing {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    thing_type: String,
    #[serde(default)]
    sub_type: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    alternative_name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: Option<Location>,
    #[serde(default)]
    ref_devices: Vec<DeviceRef>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    tenant: String,
    #[serde(default)]
    observed_at: Option<DateTime<Utc>>,
    #[serde(rename = "validURN", default)]
    valid_urns: Vec<String>,
    #[serde(default)]
    values: Option<RawValues>,
    #[serde(flatten)]
    type_values: ThingTypeValues,
}

/// A higher level entity (container, passage, room, ...) built from one or more sensors.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawThing")]
pub struct Thing {
    pub id: String,
    pub thing_type: String,
    pub sub_type: Option<String>,
    pub name: String,
    pub alternative_name: Option<String>,
    pub description: String,
    pub location: Location,
    pub ref_devices: Vec<DeviceRef>,
    pub tags: Vec<String>,
    pub tenant: String,
    pub observed_at: Option<DateTime<Utc>>,
    pub valid_urns: Vec<String>,
    /// Time series, one per reference device. Always this shape after decoding.
    pub values: Vec<Vec<Measurement>>,
    pub type_values: ThingTypeValues,
}

impl From<RawThing> for Thing {
    fn from(raw: RawThing) -> Self {
        let values = match raw.values {
            Some(RawValues::Flat(series)) => vec![series],
            Some(RawValues::Grouped(groups)) => groups.into_values().collect(),
            None => Vec::new(),
        };

        Thing {
            id: raw.id,
            thing_type: raw.thing_type,
            sub_type: raw.sub_type.filter(|s| !s.is_empty()),
            name: raw.name,
            alternative_name: raw.alternative_name,
            description: raw.description,
            location: raw.location.unwrap_or_default(),
            ref_devices: raw.ref_devices,
            tags: raw.tags,
            tenant: raw.tenant,
            observed_at: raw.observed_at,
            valid_urns: raw.valid_urns,
            values,
            type_values: raw.type_values,
        }
    }
}

/// Body posted to thing management when a thing is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThing {
    pub id: String,
    #[serde(rename = "type")]
    pub thing_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    pub name: String,
    pub description: String,
    pub location: Location,
    pub tenant: String,
}

/// A page of entities from a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total_records: u64,
    pub count: usize,
    pub offset: u64,
    pub limit: u64,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, total_records: u64, offset: u64, limit: u64) -> Self {
        Paged {
            count: items.len(),
            items,
            total_records,
            offset,
            limit,
        }
    }
}

/// Device counts by category. Categories overlap and are queried independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub online: u64,
    pub unknown: u64,
}
