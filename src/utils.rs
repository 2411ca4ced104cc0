use crate::services::sensors::{ExtractError, Reading, SensorDescriptor};

/// One log line for a sensor after a refresh, e.g. `Nature Remo Living Temperature = 23.5 °C`.
pub fn describe_reading(sensor: &SensorDescriptor, reading: &Result<Reading, ExtractError>) -> String {
    match reading {
        Ok(value) => match sensor.kind.unit() {
            Some(unit) => format!("{} = {} {}", sensor.name, value, unit),
            None => format!("{} = {}", sensor.name, value),
        },
        Err(e) => format!("{} unavailable ({})", sensor.name, e),
    }
}
