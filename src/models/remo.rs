//! Models for the Nature Remo cloud API (`/1/appliances`, `/1/devices`).
//!
//! Scope: types only — no API client code.
//!
//! Notes
//! - Records are kept exactly as the API sent them (key order, `null`s, timestamp
//!   text). Only `id` is required; the accessors below look fields up on demand
//!   and return `None` when a field is absent or has an unexpected shape.
//! - The API reports timestamps as RFC 3339 strings; they are handed out as-is.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

pub type Fields = Map<String, Value>;

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ApplianceId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl fmt::Display for ApplianceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ECHONET Lite property code for "measured instantaneous electric power".
pub const EPC_INSTANTANEOUS_POWER: u64 = 231;

// =====================
// Enums
// =====================

/// Appliance profile type. Unknown values are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ApplianceType {
    AirConditioner,
    Tv,
    Light,
    Ir,
    SmartMeter,
    Other(String),
}

impl ApplianceType {
    pub fn as_str(&self) -> &str {
        match self {
            ApplianceType::AirConditioner => "AC",
            ApplianceType::Tv => "TV",
            ApplianceType::Light => "LIGHT",
            ApplianceType::Ir => "IR",
            ApplianceType::SmartMeter => "EL_SMART_METER",
            ApplianceType::Other(s) => s,
        }
    }
}

impl From<&str> for ApplianceType {
    fn from(value: &str) -> Self {
        match value {
            "AC" => ApplianceType::AirConditioner,
            "TV" => ApplianceType::Tv,
            "LIGHT" => ApplianceType::Light,
            "IR" => ApplianceType::Ir,
            "EL_SMART_METER" => ApplianceType::SmartMeter,
            other => ApplianceType::Other(other.to_string()),
        }
    }
}

// =====================
// Field helpers
// =====================

fn str_field<'a>(fields: &'a Fields, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

fn object_field<'a>(fields: &'a Fields, key: &str) -> Option<&'a Fields> {
    fields.get(key).and_then(Value::as_object)
}

/// Present and not `null`.
fn value_field<'a>(fields: &'a Fields, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

// =====================
// Records
// =====================

/// One element of `/appliances`.
#[derive(Debug, Clone, PartialEq)]
pub struct Appliance {
    id: ApplianceId,
    fields: Fields,
}

impl Appliance {
    /// `None` unless the record carries a string `id`.
    pub fn from_fields(fields: Fields) -> Option<Self> {
        let id = ApplianceId(str_field(&fields, "id")?.to_string());
        Some(Appliance { id, fields })
    }

    pub fn id(&self) -> &ApplianceId {
        &self.id
    }

    /// The record as received.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn nickname(&self) -> Option<&str> {
        str_field(&self.fields, "nickname")
    }

    pub fn appliance_type(&self) -> Option<ApplianceType> {
        str_field(&self.fields, "type").map(ApplianceType::from)
    }

    pub fn is_smart_meter(&self) -> bool {
        matches!(self.appliance_type(), Some(ApplianceType::SmartMeter))
    }

    /// The hub this appliance is registered against.
    pub fn device(&self) -> Option<DeviceRef<'_>> {
        DeviceRef::new(object_field(&self.fields, "device")?)
    }

    /// `smart_meter.echonetlite_properties`, in API order. Non-object entries are skipped.
    pub fn echonetlite_properties(&self) -> impl Iterator<Item = EchonetliteProperty<'_>> {
        object_field(&self.fields, "smart_meter")
            .and_then(|meter| meter.get("echonetlite_properties"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .map(EchonetliteProperty)
    }

    /// First property carrying the given EPC code, in API order.
    pub fn property(&self, epc: u64) -> Option<EchonetliteProperty<'_>> {
        self.echonetlite_properties().find(|p| p.epc() == Some(epc))
    }
}

impl Serialize for Appliance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// The hub embedded in an appliance record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceRef<'a> {
    id: &'a str,
    fields: &'a Fields,
}

impl<'a> DeviceRef<'a> {
    fn new(fields: &'a Fields) -> Option<Self> {
        let id = str_field(fields, "id")?;
        Some(DeviceRef { id, fields })
    }

    pub fn id(&self) -> DeviceId {
        DeviceId(self.id.to_string())
    }

    pub fn name(&self) -> Option<&'a str> {
        str_field(self.fields, "name")
    }

    pub fn serial_number(&self) -> Option<&'a str> {
        str_field(self.fields, "serial_number")
    }

    pub fn firmware_version(&self) -> Option<&'a str> {
        str_field(self.fields, "firmware_version")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchonetliteProperty<'a>(&'a Fields);

impl<'a> EchonetliteProperty<'a> {
    /// Numeric `epc`; any other shape reads as `None`.
    pub fn epc(&self) -> Option<u64> {
        self.0.get("epc").and_then(Value::as_u64)
    }

    pub fn val(&self) -> Option<&'a Value> {
        value_field(self.0, "val")
    }
}

/// One element of `/devices`.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    id: DeviceId,
    fields: Fields,
}

impl Device {
    /// `None` unless the record carries a string `id`.
    pub fn from_fields(fields: Fields) -> Option<Self> {
        let id = DeviceId(str_field(&fields, "id")?.to_string());
        Some(Device { id, fields })
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn name(&self) -> Option<&str> {
        str_field(&self.fields, "name")
    }

    pub fn serial_number(&self) -> Option<&str> {
        str_field(&self.fields, "serial_number")
    }

    pub fn firmware_version(&self) -> Option<&str> {
        str_field(&self.fields, "firmware_version")
    }

    pub fn mac_address(&self) -> Option<&str> {
        str_field(&self.fields, "mac_address")
    }

    /// Sensor codes in `newest_events`, in API order.
    pub fn event_codes(&self) -> impl Iterator<Item = &str> {
        object_field(&self.fields, "newest_events")
            .into_iter()
            .flat_map(|events| events.keys().map(String::as_str))
    }

    /// Latest reading for one sensor code (`te`, `hu`, `il`, `mo`).
    pub fn event(&self, code: &str) -> Option<SensorEvent<'_>> {
        object_field(&self.fields, "newest_events")
            .and_then(|events| object_field(events, code))
            .map(SensorEvent)
    }
}

impl Serialize for Device {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent<'a>(&'a Fields);

impl<'a> SensorEvent<'a> {
    /// Number or string, exactly as delivered.
    pub fn val(&self) -> Option<&'a Value> {
        value_field(self.0, "val")
    }

    pub fn created_at(&self) -> Option<&'a Value> {
        value_field(self.0, "created_at")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        match v {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn appliance_type_keeps_unknown_values() {
        let t = ApplianceType::from("MORNING_ROBOT");
        assert_eq!(t, ApplianceType::Other("MORNING_ROBOT".into()));
        assert_eq!(t.as_str(), "MORNING_ROBOT");
        assert_eq!(ApplianceType::from("EL_SMART_METER"), ApplianceType::SmartMeter);
        assert_eq!(ApplianceType::SmartMeter.as_str(), "EL_SMART_METER");
    }

    #[test]
    fn device_serializes_back_to_what_was_received() {
        let raw = json!({
            "id": "d1",
            "name": null,
            "bt_mac_address": "aa:bb",
            "users": [{"id": "u1"}],
            "newest_events": {"te": {"val": 23.5, "created_at": "2024-01-01T09:00:00+09:00"}}
        });
        let dev = Device::from_fields(fields(raw.clone())).unwrap();
        assert_eq!(dev.id(), &DeviceId("d1".into()));
        assert_eq!(dev.name(), None);
        assert_eq!(serde_json::to_value(&dev).unwrap(), raw);
        assert_eq!(
            dev.event("te").and_then(|e| e.created_at()),
            Some(&json!("2024-01-01T09:00:00+09:00"))
        );
    }

    #[test]
    fn record_without_string_id_is_refused() {
        assert!(Device::from_fields(fields(json!({"name": "x"}))).is_none());
        assert!(Appliance::from_fields(fields(json!({"id": 7}))).is_none());
    }

    #[test]
    fn property_lookup_uses_first_numeric_match() {
        let appliance = Appliance::from_fields(fields(json!({
            "id": "a1",
            "smart_meter": {"echonetlite_properties": [
                {"name": "coefficient", "epc": 211, "val": "1"},
                {"epc": "231", "val": "text epc"},
                "garbage",
                {"name": "measured_instantaneous", "epc": 231, "val": "142"},
                {"epc": 231, "val": "999"}
            ]}
        })))
        .unwrap();
        let found = appliance.property(EPC_INSTANTANEOUS_POWER).and_then(|p| p.val());
        assert_eq!(found, Some(&json!("142")));
        assert!(appliance.property(224).is_none());
        assert_eq!(appliance.echonetlite_properties().count(), 4);
    }

    #[test]
    fn malformed_sub_objects_read_as_absent() {
        let appliance = Appliance::from_fields(fields(json!({
            "id": "a1",
            "type": 3,
            "device": {"name": "no id"},
            "smart_meter": null
        })))
        .unwrap();
        assert_eq!(appliance.appliance_type(), None);
        assert!(appliance.device().is_none());
        assert_eq!(appliance.echonetlite_properties().count(), 0);

        let device = Device::from_fields(fields(json!({"id": "d1", "newest_events": []}))).unwrap();
        assert_eq!(device.event_codes().count(), 0);
        assert!(device.event("te").is_none());
    }
}
