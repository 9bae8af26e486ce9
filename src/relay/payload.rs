use serde_json::{json, Map, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::sensors::{Sample, SensorType};

/// Build the backend JSON body for a relayed batch.
///
/// Blood pressure sends the most recent systolic/diastolic pair, temperature
/// and SpO2 send only the most recent reading, waveform sensors send the full
/// ordered list under `"{sensor}data"`.
pub fn build_payload(
    device_id: &str,
    user_id: &str,
    sensor: SensorType,
    samples: &[Sample],
) -> GatewayResult<Value> {
    if device_id.trim().is_empty() {
        return Err(GatewayError::InvalidIdentifier("device_id is empty".to_string()));
    }
    if user_id.trim().is_empty() {
        return Err(GatewayError::InvalidIdentifier("userid is empty".to_string()));
    }
    let latest = samples
        .last()
        .ok_or_else(|| GatewayError::EmptyBatch(sensor.to_string()))?;

    let mut body = Map::new();
    body.insert("device_id".to_string(), json!(device_id));
    body.insert("userid".to_string(), json!(user_id));

    let field = format!("{}data", sensor.as_str());
    match sensor {
        SensorType::BloodPressure => {
            let Sample::BloodPressure { systolic, diastolic } = latest else {
                return Err(GatewayError::EmptyBatch(sensor.to_string()));
            };
            body.insert("systolic".to_string(), json!(systolic));
            body.insert("diastolic".to_string(), json!(diastolic));
        }
        SensorType::Temperature | SensorType::OxygenSaturation => {
            body.insert(field, serde_json::to_value(latest)?);
        }
        _ => {
            body.insert(field, serde_json::to_value(samples)?);
        }
    }

    Ok(Value::Object(body))
}
