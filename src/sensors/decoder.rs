//! Per-sensor decoding of validated frames into samples.
//!
//! Waveform frames carry 4-byte groups after the header. Each group decodes
//! to `b0 + b1 + be_u16(b2, b3)`. Scalar frames carry one reading at fixed
//! offsets.

use serde::Serialize;

use super::frame::{Frame, FrameRejection};
use super::registry::SensorType;

/// Airflow sentinel that the device emits for readings below zero
const AIRFLOW_BELOW_ZERO: i32 = 0xFFFF;

const GROUP_LEN: usize = 4;

/// One decoded reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Sample {
    Waveform(i32),
    Temperature(f64),
    BloodPressure { systolic: u8, diastolic: u8 },
    OxygenSaturation(u8),
}

/// Decode a validated frame for `sensor_type`
pub fn decode(sensor_type: SensorType, frame: &Frame<'_>) -> Result<Vec<Sample>, FrameRejection> {
    let expected = sensor_type.command_code();
    if frame.command_code() != expected {
        return Err(FrameRejection::CommandMismatch {
            expected,
            actual: frame.command_code(),
        });
    }

    let bytes = frame.as_bytes();
    let samples = match sensor_type {
        SensorType::Ecg | SensorType::Emg | SensorType::Eog | SensorType::Gsr => {
            decode_waveform(frame.body(), false)
        }
        SensorType::Airflow => decode_waveform(frame.body(), true),
        SensorType::Temperature => {
            let high = u16::from_be_bytes([bytes[3], bytes[4]]);
            let low = u16::from_be_bytes([bytes[5], bytes[6]]);
            vec![Sample::Temperature((high as f64 + low as f64) / 100.0)]
        }
        SensorType::BloodPressure => vec![Sample::BloodPressure {
            systolic: bytes[5],
            diastolic: bytes[4],
        }],
        SensorType::OxygenSaturation => vec![Sample::OxygenSaturation(bytes[5])],
    };

    Ok(samples)
}

fn decode_waveform(body: &[u8], airflow: bool) -> Vec<Sample> {
    let mut samples = Vec::with_capacity(body.len() / GROUP_LEN);

    // chunks_exact drops a short trailing group
    for group in body.chunks_exact(GROUP_LEN) {
        let value = group[0] as i32 + group[1] as i32 + u16::from_be_bytes([group[2], group[3]]) as i32;

        if airflow && value == AIRFLOW_BELOW_ZERO {
            samples.push(Sample::Waveform(-1));
            break;
        }
        samples.push(Sample::Waveform(value));
    }

    samples
}
