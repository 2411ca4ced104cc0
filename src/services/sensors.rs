//! Sensor readings derived from a [`Snapshot`].
//!
//! Extractors are pure: they look a value up in the snapshot and pass it through
//! untouched. A missing appliance, device, event code or property, or one with an
//! unexpected shape, is a [`ExtractError::MissingField`]; callers treat that sensor
//! as unavailable for the current poll.

use crate::models::remo::{ApplianceId, Device, DeviceId, DeviceRef, EPC_INSTANTANEOUS_POWER};
use crate::snapshot::Snapshot;
use serde_json::Value;
use std::fmt;

pub const MANUFACTURER: &str = "Nature Remo";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Power,
    Temperature,
    Humidity,
    Illuminance,
    Motion,
}

impl SensorKind {
    pub const DEVICE_KINDS: [SensorKind; 4] = [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::Illuminance,
        SensorKind::Motion,
    ];

    /// `newest_events` key for device-backed sensors.
    pub fn event_code(self) -> Option<&'static str> {
        match self {
            SensorKind::Power => None,
            SensorKind::Temperature => Some("te"),
            SensorKind::Humidity => Some("hu"),
            SensorKind::Illuminance => Some("il"),
            SensorKind::Motion => Some("mo"),
        }
    }

    pub fn from_event_code(code: &str) -> Option<Self> {
        Self::DEVICE_KINDS
            .into_iter()
            .find(|k| k.event_code() == Some(code))
    }

    pub fn unit(self) -> Option<&'static str> {
        match self {
            SensorKind::Power => Some("W"),
            SensorKind::Temperature => Some("°C"),
            SensorKind::Humidity => Some("%"),
            SensorKind::Illuminance => Some("lx"),
            SensorKind::Motion => None,
        }
    }

    pub fn device_class(self) -> &'static str {
        match self {
            SensorKind::Power => "power",
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::Illuminance => "illuminance",
            SensorKind::Motion => "timestamp",
        }
    }

    /// Appended to the device name to build the display name.
    pub fn name_suffix(self) -> Option<&'static str> {
        match self {
            SensorKind::Power => None,
            SensorKind::Temperature => Some("Temperature"),
            SensorKind::Humidity => Some("Humidity"),
            SensorKind::Illuminance => Some("Illuminance"),
            SensorKind::Motion => Some("Motion"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("{entity}: `{field}` not present in current snapshot")]
    MissingField { entity: String, field: String },
}

fn missing(entity: impl fmt::Display, field: impl Into<String>) -> ExtractError {
    ExtractError::MissingField {
        entity: entity.to_string(),
        field: field.into(),
    }
}

/// A value read from the snapshot, unconverted. Strings display without quotes.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading(pub Value);

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

/// Instantaneous power (EPC 231) of a smart-meter appliance, as the API sent it.
pub fn extract_power<'a>(snapshot: &'a Snapshot, appliance_id: &ApplianceId) -> Result<&'a Value, ExtractError> {
    let appliance = snapshot
        .appliance(appliance_id)
        .ok_or_else(|| missing(appliance_id, "appliance"))?;
    appliance
        .property(EPC_INSTANTANEOUS_POWER)
        .and_then(|p| p.val())
        .ok_or_else(|| {
            missing(
                appliance_id,
                format!("smart_meter.echonetlite_properties[epc={}].val", EPC_INSTANTANEOUS_POWER),
            )
        })
}

fn event_value<'a>(snapshot: &'a Snapshot, device_id: &DeviceId, code: &str) -> Result<&'a Value, ExtractError> {
    let device = snapshot
        .device(device_id)
        .ok_or_else(|| missing(device_id, "device"))?;
    device
        .event(code)
        .and_then(|e| e.val())
        .ok_or_else(|| missing(device_id, format!("newest_events.{}", code)))
}

pub fn extract_temperature<'a>(snapshot: &'a Snapshot, device_id: &DeviceId) -> Result<&'a Value, ExtractError> {
    event_value(snapshot, device_id, "te")
}

pub fn extract_humidity<'a>(snapshot: &'a Snapshot, device_id: &DeviceId) -> Result<&'a Value, ExtractError> {
    event_value(snapshot, device_id, "hu")
}

pub fn extract_illuminance<'a>(snapshot: &'a Snapshot, device_id: &DeviceId) -> Result<&'a Value, ExtractError> {
    event_value(snapshot, device_id, "il")
}

/// Time of the last detected motion (not a boolean state), as the API sent it.
pub fn extract_motion<'a>(snapshot: &'a Snapshot, device_id: &DeviceId) -> Result<&'a Value, ExtractError> {
    let device = snapshot
        .device(device_id)
        .ok_or_else(|| missing(device_id, "device"))?;
    device
        .event("mo")
        .and_then(|e| e.created_at())
        .ok_or_else(|| missing(device_id, "newest_events.mo.created_at"))
}

/// Which record a sensor reads from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SensorSource {
    Appliance(ApplianceId),
    Device(DeviceId),
}

/// Device-registry information attached to every sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub identifier: DeviceId,
    pub name: Option<String>,
    pub manufacturer: &'static str,
    pub model: Option<String>,
    pub sw_version: Option<String>,
}

impl From<DeviceRef<'_>> for DeviceInfo {
    fn from(d: DeviceRef<'_>) -> Self {
        DeviceInfo {
            identifier: d.id(),
            name: d.name().map(str::to_string),
            manufacturer: MANUFACTURER,
            model: d.serial_number().map(str::to_string),
            sw_version: d.firmware_version().map(str::to_string),
        }
    }
}

impl From<&Device> for DeviceInfo {
    fn from(d: &Device) -> Self {
        DeviceInfo {
            identifier: d.id().clone(),
            name: d.name().map(str::to_string),
            manufacturer: MANUFACTURER,
            model: d.serial_number().map(str::to_string),
            sw_version: d.firmware_version().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDescriptor {
    pub kind: SensorKind,
    pub source: SensorSource,
    pub unique_id: String,
    pub name: String,
    pub device_info: Option<DeviceInfo>,
}

impl SensorDescriptor {
    pub fn read(&self, snapshot: &Snapshot) -> Result<Reading, ExtractError> {
        match (&self.source, self.kind) {
            (SensorSource::Appliance(id), SensorKind::Power) => {
                extract_power(snapshot, id).map(|v| Reading(v.clone()))
            }
            (SensorSource::Device(id), SensorKind::Motion) => {
                extract_motion(snapshot, id).map(|v| Reading(v.clone()))
            }
            (SensorSource::Device(id), kind) => {
                let code = kind
                    .event_code()
                    .ok_or_else(|| missing(id, format!("{:?} reading", kind)))?;
                event_value(snapshot, id, code).map(|v| Reading(v.clone()))
            }
            (SensorSource::Appliance(id), kind) => Err(missing(id, format!("{:?} reading", kind))),
        }
    }
}

/// Enumerate every sensor the snapshot supports right now.
///
/// The set is fixed at this point: event codes a device starts reporting later are
/// not picked up until discovery runs again.
pub fn discover(snapshot: &Snapshot) -> Vec<SensorDescriptor> {
    let mut out = Vec::new();

    for appliance in snapshot.appliances.values().filter(|a| a.is_smart_meter()) {
        out.push(SensorDescriptor {
            kind: SensorKind::Power,
            source: SensorSource::Appliance(appliance.id().clone()),
            unique_id: appliance.id().0.clone(),
            name: format!("{} {}", MANUFACTURER, appliance.nickname().unwrap_or_default()),
            device_info: appliance.device().map(DeviceInfo::from),
        });
    }

    for device in snapshot.devices.values() {
        let base_name = format!("{} {}", MANUFACTURER, device.name().unwrap_or_default());
        let info = DeviceInfo::from(device);
        for code in device.event_codes() {
            let Some(kind) = SensorKind::from_event_code(code) else {
                continue;
            };
            let suffix = kind.name_suffix().unwrap_or_default();
            out.push(SensorDescriptor {
                kind,
                source: SensorSource::Device(device.id().clone()),
                unique_id: format!("{}-{}", device.id().0, code),
                name: format!("{} {}", base_name.trim(), suffix),
                device_info: Some(info.clone()),
            });
        }
    }

    out
}
