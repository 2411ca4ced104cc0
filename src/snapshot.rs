//! Normalization of the raw `/appliances` and `/devices` payloads into one keyed
//! [`Snapshot`].

use crate::models::remo::{Appliance, ApplianceId, Device, DeviceId, Fields};
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::hash::Hash;

/// One consistent view of every appliance and device of an account.
///
/// Built in one piece by [`normalize`]; consumers only ever see it behind an `Arc`
/// and never mutate it. Both maps iterate in the order the API listed the records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub appliances: IndexMap<ApplianceId, Appliance>,
    pub devices: IndexMap<DeviceId, Device>,
}

impl Snapshot {
    pub fn appliance(&self, id: &ApplianceId) -> Option<&Appliance> {
        self.appliances.get(id)
    }

    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("{collection}: expected a JSON array, got {found}")]
    NotAnArray { collection: &'static str, found: &'static str },
    #[error("{collection}[{index}]: missing string `id`")]
    MissingId { collection: &'static str, index: usize },
    #[error("{collection}: duplicate id {id:?}")]
    DuplicateId { collection: &'static str, id: String },
}

/// Build a snapshot from the two raw API arrays.
///
/// Every element must be an object with a string `id`, and ids must be unique
/// within their collection. All other fields are stored untouched. Nothing is
/// returned unless both collections are valid.
pub fn normalize(appliances: Value, devices: Value) -> Result<Snapshot, NormalizeError> {
    let appliances = index_by_id("appliances", appliances, Appliance::from_fields, Appliance::id)?;
    let devices = index_by_id("devices", devices, Device::from_fields, Device::id)?;
    Ok(Snapshot { appliances, devices })
}

fn index_by_id<K, T>(
    collection: &'static str,
    raw: Value,
    from_fields: impl Fn(Fields) -> Option<T>,
    key_of: impl Fn(&T) -> &K,
) -> Result<IndexMap<K, T>, NormalizeError>
where
    K: Hash + Eq + Clone + Display,
{
    let items = match raw {
        Value::Array(items) => items,
        other => {
            return Err(NormalizeError::NotAnArray {
                collection,
                found: json_type_name(&other),
            });
        }
    };

    let mut out = IndexMap::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let record = match item {
            Value::Object(fields) => from_fields(fields),
            _ => None,
        }
        .ok_or(NormalizeError::MissingId { collection, index })?;

        match out.entry(key_of(&record).clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(taken) => {
                return Err(NormalizeError::DuplicateId {
                    collection,
                    id: taken.key().to_string(),
                });
            }
        }
    }
    Ok(out)
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn load_fixture(name: &str) -> Value {
        let json = std::fs::read_to_string(format!("tests/data/{name}")).expect("fixture present");
        serde_json::from_str(&json).expect("parse fixture")
    }

    #[test]
    fn keys_match_ids_and_records_are_preserved() {
        let appliances = load_fixture("appliances.json");
        let devices = load_fixture("devices.json");
        let snap = normalize(appliances.clone(), devices.clone()).expect("valid fixtures");

        let raw_appliances = appliances.as_array().unwrap();
        assert_eq!(snap.appliances.len(), raw_appliances.len());
        for raw in raw_appliances {
            let id = ApplianceId(raw["id"].as_str().unwrap().to_string());
            let stored = snap.appliance(&id).expect("indexed by id");
            assert_eq!(stored.id(), &id);
            assert_eq!(&serde_json::to_value(stored).unwrap(), raw);
        }

        let raw_devices = devices.as_array().unwrap();
        assert_eq!(snap.devices.len(), raw_devices.len());
        for raw in raw_devices {
            let id = DeviceId(raw["id"].as_str().unwrap().to_string());
            let stored = snap.device(&id).expect("indexed by id");
            assert_eq!(&serde_json::to_value(stored).unwrap(), raw);
        }
    }

    #[test]
    fn nulls_and_timestamp_text_survive_unchanged() {
        let appliances = json!([
            {"id": "a1", "nickname": null, "smart_meter": null, "device": {"id": "x", "name": null}}
        ]);
        let devices = json!([
            {"id": "d1", "created_at": "2024-01-01T09:00:00+09:00",
             "newest_events": {"te": {"val": 23.5, "created_at": "2024-01-01 00:00:00"}}}
        ]);
        let snap = normalize(appliances.clone(), devices.clone()).unwrap();
        assert_eq!(serde_json::to_value(snap.appliances.get_index(0).unwrap().1).unwrap(), appliances[0]);
        assert_eq!(serde_json::to_value(snap.devices.get_index(0).unwrap().1).unwrap(), devices[0]);
    }

    #[test]
    fn records_keep_api_order() {
        let devices = json!([{"id": "zz"}, {"id": "aa"}, {"id": "mm"}]);
        let snap = normalize(json!([]), devices).unwrap();
        let ids: Vec<&str> = snap.devices.keys().map(|id| id.0.as_str()).collect();
        assert_eq!(ids, vec!["zz", "aa", "mm"]);
    }

    #[test]
    fn empty_arrays_give_empty_snapshot() {
        let snap = normalize(json!([]), json!([])).unwrap();
        assert_eq!(snap, Snapshot::default());
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let devices = json!([{"id": "d1", "name": "A"}, {"id": "d1", "name": "B"}]);
        let err = normalize(json!([]), devices).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::DuplicateId { collection: "devices", ref id } if id == "d1"
        ));
    }

    #[test]
    fn missing_id_is_rejected() {
        let appliances = json!([{"id": "a1"}, {"nickname": "no id"}]);
        let err = normalize(appliances, json!([])).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingId { collection: "appliances", index: 1 }));
    }

    #[test]
    fn non_string_id_counts_as_missing() {
        let err = normalize(json!([]), json!([{"id": 7}])).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingId { collection: "devices", index: 0 }));
    }

    #[test]
    fn non_array_payload_is_rejected() {
        let err = normalize(json!({"message": "oops"}), json!([])).unwrap_err();
        assert!(matches!(err, NormalizeError::NotAnArray { collection: "appliances", found: "an object" }));
    }

    #[test]
    fn non_object_element_counts_as_missing_id() {
        let err = normalize(json!([{"id": "a0"}, "a1"]), json!([])).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingId { collection: "appliances", index: 1 }));
    }

    #[test]
    fn oddly_typed_fields_are_kept() {
        let appliances = json!([
            {"id": "a0", "type": "AC",
             "smart_meter": {"echonetlite_properties": [{"epc": "231", "val": 1}]}},
            {"id": "a1", "nickname": 42}
        ]);
        let devices = json!([
            {"id": "d1", "newest_events": {"te": {"val": 23.5, "created_at": "yesterday"}}}
        ]);
        let snap = normalize(appliances.clone(), devices).unwrap();
        assert_eq!(snap.appliances.len(), 2);
        let a0 = snap.appliance(&ApplianceId("a0".into())).unwrap();
        assert_eq!(serde_json::to_value(a0).unwrap(), appliances[0]);
        assert!(snap.device(&DeviceId("d1".into())).is_some());
    }
}
