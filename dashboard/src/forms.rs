use crate::errors::{Error, Result};
use crate::model::{DeviceRef, Location, NewThing};
use crate::paging::QueryParams;
use serde_json::{json, Map, Value};

/// Form field that gates whether a submitted form is applied.
pub const SAVE_MARKER: &str = "save";

/// Rejects a missing or blank identifier.
pub fn require_id<'a>(id: Option<&'a str>, what: &str) -> Result<&'a str> {
    match id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(Error::Validation(format!("no {} id found in request", what))),
    }
}

fn as_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

/// Converts a submitted sensor form into a partial device update.
///
/// Only known fields are kept and blank values are skipped.
pub fn sensor_fields(form: &QueryParams) -> Map<String, Value> {
    let mut fields = Map::new();

    for (key, value) in form.iter() {
        if value.is_empty() {
            continue;
        }

        match key {
            "id" => {
                fields.insert("deviceID".to_string(), json!(value));
            }
            "active" => {
                fields.insert("active".to_string(), json!(value == "on"));
            }
            "longitude" | "latitude" => {
                if let Some(f) = as_float(value) {
                    fields.insert(key.to_string(), json!(f));
                }
            }
            "sensorType" => {
                fields.insert("deviceProfile".to_string(), json!(value));
            }
            "organisation" => {
                fields.insert("tenant".to_string(), json!(value));
            }
            "name" | "description" | "environment" | "interval" => {
                fields.insert(key.to_string(), json!(value));
            }
            "measurementType-option[]" => {
                let types: Vec<&str> = form
                    .get_all(key)
                    .iter()
                    .map(String::as_str)
                    .filter(|t| !t.is_empty())
                    .collect();
                fields.insert("types".to_string(), json!(types));
            }
            _ => {}
        }
    }

    fields
}

fn push_unique(target: &mut Vec<String>, values: impl IntoIterator<Item = String>) {
    for value in values {
        if !value.is_empty() && !target.contains(&value) {
            target.push(value);
        }
    }
}

/// Converts a submitted thing form into a partial thing update.
///
/// `tags` is always present so an empty selection clears the tags.
pub fn thing_fields(form: &QueryParams) -> Map<String, Value> {
    let mut fields = Map::new();
    let mut tags: Vec<String> = Vec::new();
    let mut location: Option<Location> = None;

    for (key, value) in form.iter() {
        if value.is_empty() {
            continue;
        }

        match key {
            "longitude" => {
                let loc = location.get_or_insert_with(Location::default);
                if let Some(f) = as_float(value) {
                    loc.longitude = f;
                }
            }
            "latitude" => {
                let loc = location.get_or_insert_with(Location::default);
                if let Some(f) = as_float(value) {
                    loc.latitude = f;
                }
            }
            "organisation" => {
                fields.insert("tenant".to_string(), json!(value));
            }
            "selectedTags" => {
                push_unique(&mut tags, value.split(',').map(|t| t.trim().to_string()));
            }
            "name" | "alternativeName" | "description" => {
                fields.insert(key.to_string(), json!(value.trim()));
            }
            "currentDevice" => {
                let mut ids = Vec::new();
                push_unique(&mut ids, value.split(',').map(|d| d.trim().to_string()));
                let refs: Vec<DeviceRef> = ids
                    .into_iter()
                    .map(|device_id| DeviceRef { device_id })
                    .collect();
                fields.insert("refDevices".to_string(), json!(refs));
            }
            "maxl" | "maxd" | "angle" | "offset" => {
                if let Some(f) = as_float(value) {
                    fields.insert(key.to_string(), json!(f));
                }
            }
            _ => {}
        }
    }

    fields.insert("tags".to_string(), json!(tags));
    if let Some(location) = location {
        fields.insert("location".to_string(), json!(location));
    }

    fields
}

/// Builds the thing to create from the new-thing form. `type` may be `type:subType`.
pub fn new_thing(form: &QueryParams, id: &str) -> NewThing {
    let field = |key: &str| form.get(key).unwrap_or_default().trim().to_string();

    let mut thing_type = field("type");
    let mut sub_type = None;
    if let Some((main, sub)) = thing_type.split_once(':') {
        sub_type = Some(sub.to_string()).filter(|s| !s.is_empty());
        thing_type = main.to_string();
    }

    NewThing {
        id: id.to_string(),
        thing_type,
        sub_type,
        name: field("name"),
        description: field("description"),
        location: Location::default(),
        tenant: field("organisation"),
    }
}
