use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const TENANTS: [&str; 2] = ["default", "sundsvall"];
pub const TAGS: [&str; 4] = ["centrum", "hamnen", "skola", "norr"];

// Around Sundsvall.
const ORIGIN: (f64, f64) = (62.3908, 17.3069);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorType {
    pub urn: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    pub decoder: String,
    pub interval: i64,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub battery_level: i64,
    pub rssi: f64,
    #[serde(rename = "loRaSNR")]
    pub lora_snr: f64,
    pub frequency: i64,
    pub spreading_factor: f64,
    pub dr: i64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub online: bool,
    pub state: i64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "sensorID")]
    pub sensor_id: String,
    pub active: bool,
    pub tenant: String,
    pub name: String,
    pub description: String,
    pub environment: String,
    pub location: Location,
    pub types: Vec<SensorType>,
    pub device_profile: DeviceProfile,
    pub device_status: DeviceStatus,
    pub device_state: DeviceState,
    pub alarms: Vec<String>,
    /// Last battery reading in percent, served by the measurement endpoint.
    #[serde(skip)]
    pub battery: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    pub observed_at: DateTime<Utc>,
    pub alarms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub urn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vb: Option<bool>,
    pub unit: String,
    #[serde(rename = "ref")]
    pub ref_device: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRef {
    #[serde(rename = "deviceID")]
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thing {
    pub id: String,
    #[serde(rename = "type")]
    pub thing_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    pub name: String,
    pub description: String,
    pub location: Location,
    pub ref_devices: Vec<DeviceRef>,
    pub tags: Vec<String>,
    pub tenant: String,
    pub observed_at: DateTime<Utc>,
    #[serde(rename = "validURN")]
    pub valid_urns: Vec<String>,
    /// Series keyed by reference device.
    pub values: Map<String, Value>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

/// Kind of thing the simulator knows how to fill with values.
struct ThingKind {
    thing_type: &'static str,
    sub_type: Option<&'static str>,
    urn: &'static str,
    unit: &'static str,
    boolean: bool,
}

const THING_KINDS: [ThingKind; 5] = [
    ThingKind {
        thing_type: "Container",
        sub_type: Some("WasteContainer"),
        urn: "urn:oma:lwm2m:ext:3330",
        unit: "m",
        boolean: false,
    },
    ThingKind {
        thing_type: "Room",
        sub_type: None,
        urn: "urn:oma:lwm2m:ext:3303",
        unit: "Cel",
        boolean: false,
    },
    ThingKind {
        thing_type: "Passage",
        sub_type: None,
        urn: "urn:oma:lwm2m:ext:3200",
        unit: "",
        boolean: true,
    },
    ThingKind {
        thing_type: "Lifebuoy",
        sub_type: None,
        urn: "urn:oma:lwm2m:ext:3302",
        unit: "",
        boolean: true,
    },
    ThingKind {
        thing_type: "WaterMeter",
        sub_type: None,
        urn: "urn:oma:lwm2m:ext:3424",
        unit: "m3",
        boolean: false,
    },
];

pub fn profiles() -> Vec<DeviceProfile> {
    let profile = |name: &str, interval, types: &[&str]| DeviceProfile {
        name: name.to_string(),
        decoder: name.to_string(),
        interval,
        types: types.iter().map(|t| format!("urn:oma:lwm2m:ext:{}", t)).collect(),
    };

    vec![
        profile("elsys", 3600, &["3", "3303", "3304"]),
        profile("qalcosonic", 172800, &["3", "3424", "3303"]),
        profile("milesight", 1800, &["3", "3330"]),
        profile("sensative", 3600, &["3", "3200", "3302"]),
        profile("unknown", 0, &[]),
    ]
}

pub fn type_name(urn: &str) -> &'static str {
    match urn.rsplit(':').next().unwrap_or_default() {
        "3" => "Device",
        "3200" => "DigitalInput",
        "3302" => "Presence",
        "3303" => "Temperature",
        "3304" => "Humidity",
        "3330" => "Distance",
        "3424" => "WaterMeter",
        _ => "Unknown",
    }
}

fn jitter(rng: &mut impl Rng) -> Location {
    Location {
        latitude: ORIGIN.0 + rng.gen_range(-0.03..0.03),
        longitude: ORIGIN.1 + rng.gen_range(-0.05..0.05),
    }
}

fn generate_device(rng: &mut impl Rng, index: usize, profiles: &[DeviceProfile], now: DateTime<Utc>) -> Device {
    let profile = profiles[index % profiles.len()].clone();
    let active = rng.gen_bool(0.8);
    let online = active && rng.gen_bool(0.75);
    let observed_at = now - Duration::minutes(rng.gen_range(1..24 * 60));

    let battery = if profile.name == "unknown" || rng.gen_bool(0.1) {
        None
    } else if rng.gen_bool(0.02) {
        Some(rng.gen_range(0.0..20.0)) // 2% low battery
    } else {
        Some(rng.gen_range(20.0..100.0))
    };

    let mut alarms = Vec::new();
    if active && !online && rng.gen_bool(0.5) {
        alarms.push("DeviceNotObserved".to_string());
    }

    Device {
        device_id: uuid::Uuid::new_v4().to_string(),
        sensor_id: format!("{:016x}", rng.gen::<u64>()),
        active,
        tenant: TENANTS[index % TENANTS.len()].to_string(),
        name: format!("{}-{:03}", profile.name, index),
        description: String::new(),
        environment: ["indoors", "outdoors", "water"][index % 3].to_string(),
        location: jitter(rng),
        types: profile
            .types
            .iter()
            .map(|urn| SensorType {
                urn: urn.clone(),
                name: type_name(urn).to_string(),
            })
            .collect(),
        device_status: DeviceStatus {
            battery_level: battery.map(|b: f64| b.round() as i64).unwrap_or(-1),
            rssi: rng.gen_range(-120.0..-40.0),
            lora_snr: rng.gen_range(-10.0..12.0),
            frequency: *[867_100_000, 867_300_000, 868_100_000]
                .choose(rng)
                .unwrap_or(&868_100_000),
            spreading_factor: f64::from(rng.gen_range(7u8..=12)),
            dr: rng.gen_range(0..=5),
            observed_at,
        },
        device_state: DeviceState {
            online,
            state: if online { 1 } else { 0 },
            observed_at,
        },
        device_profile: profile,
        alarms,
        battery,
    }
}

fn reading(rng: &mut impl Rng, kind: &ThingKind, previous: f64) -> f64 {
    match kind.unit {
        "m" => rng.gen_range(0.2..1.8),
        "Cel" => (previous + rng.gen_range(-0.5..0.5)).clamp(15.0, 28.0),
        _ => previous + rng.gen_range(0.0..0.4),
    }
}

fn generate_series(
    rng: &mut impl Rng,
    kind: &ThingKind,
    device_id: &str,
    now: DateTime<Utc>,
) -> Vec<Measurement> {
    let start = now
        .duration_trunc(Duration::hours(1))
        .unwrap_or(now)
        - Duration::hours(48);
    let id = format!("{}/{}", device_id, kind.urn.rsplit(':').next().unwrap_or_default());

    let mut value = rng.gen_range(18.0..22.0);
    (0..48)
        .map(|hour| {
            value = reading(rng, kind, value);
            Measurement {
                id: id.clone(),
                timestamp: start + Duration::hours(hour + 1),
                urn: kind.urn.to_string(),
                v: (!kind.boolean).then_some((value * 100.0).round() / 100.0),
                vb: kind.boolean.then(|| rng.gen_bool(0.3)),
                unit: kind.unit.to_string(),
                ref_device: device_id.to_string(),
            }
        })
        .collect()
}

fn kind_properties(rng: &mut impl Rng, kind: &ThingKind, last: Option<&Measurement>) -> Map<String, Value> {
    let mut properties = Map::new();
    let last_value = last.and_then(|m| m.v).unwrap_or_default();

    match kind.thing_type {
        "Container" => {
            let max_distance = 2.0;
            properties.insert("maxd".into(), json!(max_distance));
            properties.insert("maxl".into(), json!(1.8));
            properties.insert("currentLevel".into(), json!(max_distance - last_value));
            properties.insert(
                "percent".into(),
                json!(((max_distance - last_value) / max_distance * 100.0).round()),
            );
        }
        "Room" => {
            properties.insert("temperature".into(), json!(last_value));
        }
        "Passage" => {
            properties.insert("passagesToday".into(), json!(rng.gen_range(0..400)));
            properties.insert(
                "cumulatedNumberOfPassages".into(),
                json!(rng.gen_range(1000..50_000)),
            );
            properties.insert("currentState".into(), json!(rng.gen_bool(0.5)));
        }
        "Lifebuoy" => {
            properties.insert("presence".into(), json!(rng.gen_bool(0.9)));
        }
        "WaterMeter" => {
            properties.insert("cumulativeVolume".into(), json!(last_value));
            properties.insert("leakage".into(), json!(rng.gen_bool(0.05)));
            properties.insert("burst".into(), json!(false));
            properties.insert("backflow".into(), json!(false));
            properties.insert("fraud".into(), json!(false));
        }
        _ => {}
    }

    properties
}

fn generate_thing(
    rng: &mut impl Rng,
    index: usize,
    devices: &[Device],
    now: DateTime<Utc>,
) -> Thing {
    let kind = &THING_KINDS[index % THING_KINDS.len()];
    let device = devices.choose(rng);

    let mut values = Map::new();
    let mut last = None;
    if let Some(device) = device {
        let series = generate_series(rng, kind, &device.device_id, now);
        last = series.last().cloned();
        values.insert(device.device_id.clone(), json!(series));
    }

    let tag_count = rng.gen_range(0..=2);
    let mut tags: Vec<String> = TAGS
        .choose_multiple(rng, tag_count)
        .map(|t| t.to_string())
        .collect();
    tags.sort();

    Thing {
        id: uuid::Uuid::new_v4().to_string(),
        thing_type: kind.thing_type.to_string(),
        sub_type: kind.sub_type.map(str::to_string),
        name: format!("{} {}", kind.thing_type, index + 1),
        description: String::new(),
        location: jitter(rng),
        ref_devices: device
            .map(|d| DeviceRef {
                device_id: d.device_id.clone(),
            })
            .into_iter()
            .collect(),
        tags,
        tenant: TENANTS[0].to_string(),
        observed_at: last.as_ref().map(|m| m.timestamp).unwrap_or(now),
        valid_urns: vec![kind.urn.to_string()],
        properties: kind_properties(rng, kind, last.as_ref()),
        values,
    }
}

/// Everything the simulator serves. Generated once at start.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    pub devices: Vec<Device>,
    pub things: Vec<Thing>,
    pub profiles: Vec<DeviceProfile>,
}

impl Fleet {
    pub fn generate(rng: &mut impl Rng, num_devices: usize, now: DateTime<Utc>) -> Self {
        let profiles = profiles();
        let devices: Vec<Device> = (0..num_devices)
            .map(|i| generate_device(rng, i, &profiles, now))
            .collect();
        let things = (0..(num_devices / 2).max(THING_KINDS.len()))
            .map(|i| generate_thing(rng, i, &devices, now))
            .collect();

        Fleet {
            devices,
            things,
            profiles,
        }
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.device_id == id)
    }

    pub fn thing(&self, id: &str) -> Option<&Thing> {
        self.things.iter().find(|t| t.id == id)
    }

    /// Alarms of every device that has any, newest first.
    pub fn alarms(&self) -> Vec<Alarm> {
        let mut alarms: Vec<Alarm> = self
            .devices
            .iter()
            .filter(|d| !d.alarms.is_empty())
            .map(|d| Alarm {
                device_id: d.device_id.clone(),
                observed_at: d.device_state.observed_at,
                alarms: d.alarms.clone(),
            })
            .collect();
        alarms.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        alarms
    }

    /// Tags in use, sorted and deduplicated.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.things.iter().flat_map(|t| t.tags.clone()).collect();
        tags.sort();
        tags.dedup();
        tags
    }

    /// Type names as accepted by the `type` filter, `Type-SubType` for sub types.
    pub fn thing_types(&self) -> Vec<String> {
        THING_KINDS
            .iter()
            .map(|k| match k.sub_type {
                Some(sub) => format!("{}-{}", k.thing_type, sub),
                None => k.thing_type.to_string(),
            })
            .collect()
    }

    /// Applies a partial update from the dashboard's sensor form.
    pub fn update_device(&mut self, id: &str, fields: &Map<String, Value>) -> bool {
        let profiles = self.profiles.clone();
        let Some(device) = self.devices.iter_mut().find(|d| d.device_id == id) else {
            return false;
        };

        for (key, value) in fields {
            match (key.as_str(), value) {
                ("name", Value::String(s)) => device.name = s.clone(),
                ("description", Value::String(s)) => device.description = s.clone(),
                ("environment", Value::String(s)) => device.environment = s.clone(),
                ("tenant", Value::String(s)) => device.tenant = s.clone(),
                ("active", Value::Bool(b)) => device.active = *b,
                ("latitude", Value::Number(n)) => {
                    device.location.latitude = n.as_f64().unwrap_or(device.location.latitude)
                }
                ("longitude", Value::Number(n)) => {
                    device.location.longitude = n.as_f64().unwrap_or(device.location.longitude)
                }
                ("interval", Value::String(s)) => {
                    if let Ok(interval) = s.parse() {
                        device.device_profile.interval = interval;
                    }
                }
                ("deviceProfile", Value::String(name)) => {
                    if let Some(profile) = profiles.iter().find(|p| &p.name == name) {
                        device.device_profile = profile.clone();
                    }
                }
                ("types", Value::Array(urns)) => {
                    device.types = urns
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|urn| SensorType {
                            urn: urn.to_string(),
                            name: type_name(urn).to_string(),
                        })
                        .collect();
                }
                _ => {}
            }
        }

        true
    }
}

/// Cumulative daily sums from `start` up to `end` or now, whichever comes first.
/// The counter rises towards a random ceiling so the curve flattens out.
pub fn daily_sums(
    rng: &mut impl Rng,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, i64)> {
    let max_sum = 100_000.0 + rng.gen::<f64>() * 100_000.0;
    let mut current = rng.gen::<f64>() * max_sum;
    let mut sums = Vec::new();

    let mut date = start;
    while date < end && date < now {
        let days_left = (end - date).num_days().max(1) as f64;
        current += (max_sum - current) / days_left;
        sums.push((date, current as i64));
        date += Duration::days(1);
    }

    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fleet() -> Fleet {
        let mut rng = StdRng::seed_from_u64(7);
        Fleet::generate(&mut rng, 20, Utc::now())
    }

    #[test]
    fn test_generate_fleet() {
        let fleet = fleet();

        assert_eq!(fleet.devices.len(), 20);
        assert_eq!(fleet.things.len(), 10);
        assert!(fleet.devices.iter().all(|d| d.active || !d.device_state.online));
        assert!(fleet
            .devices
            .iter()
            .filter(|d| d.device_profile.name == "unknown")
            .all(|d| d.battery.is_none()));
        assert!(fleet.things.iter().all(|t| t.ref_devices.len() == 1));
    }

    #[test]
    fn test_alarms_are_newest_first() {
        let alarms = fleet().alarms();
        assert!(alarms
            .windows(2)
            .all(|w| w[0].observed_at >= w[1].observed_at));
    }

    #[test]
    fn test_update_device() {
        let mut fleet = fleet();
        let id = fleet.devices[0].device_id.clone();
        let fields = json!({
            "name": "Renamed",
            "active": false,
            "deviceProfile": "qalcosonic",
            "types": ["urn:oma:lwm2m:ext:3424"],
            "unknown": 1
        });

        assert!(fleet.update_device(&id, fields.as_object().unwrap()));

        let device = fleet.device(&id).unwrap();
        assert_eq!(device.name, "Renamed");
        assert!(!device.active);
        assert_eq!(device.device_profile.name, "qalcosonic");
        assert_eq!(device.types[0].name, "WaterMeter");
        assert!(!fleet.update_device("missing", &Map::new()));
    }

    #[test]
    fn test_daily_sums_are_cumulative_and_stop_at_now() {
        let mut rng = StdRng::seed_from_u64(1);
        let start = Utc.with_ymd_and_hms(2024, 1, 29, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap();

        let sums = daily_sums(&mut rng, start, end, now);

        assert_eq!(sums.len(), 13);
        assert_eq!(sums[0].0, start);
        assert!(sums.windows(2).all(|w| w[0].1 <= w[1].1));
    }
}
