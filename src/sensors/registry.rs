use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};

/// First byte of every frame
pub const START_MARKER: u8 = 0xF7;
/// Last byte of every frame
pub const END_MARKER: u8 = 0xFA;

/// Declared payload length of waveform frames
pub const WAVEFORM_PAYLOAD_LEN: u8 = 0x50;
/// Declared payload length of scalar frames
pub const SCALAR_PAYLOAD_LEN: u8 = 0x04;

/// Total length of a waveform frame on the wire
pub const WAVEFORM_FRAME_LEN: usize = 86;
/// Total length of a scalar frame on the wire
pub const SCALAR_FRAME_LEN: usize = 10;

/// Supported bedside sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SensorType {
    #[serde(rename = "ecg")]
    Ecg,
    #[serde(rename = "emg")]
    Emg,
    #[serde(rename = "eog")]
    Eog,
    #[serde(rename = "gsr")]
    Gsr,
    #[serde(rename = "airflow")]
    Airflow,
    #[serde(rename = "temp")]
    Temperature,
    #[serde(rename = "nibp")]
    BloodPressure,
    #[serde(rename = "spo2")]
    OxygenSaturation,
}

impl SensorType {
    pub const ALL: [SensorType; 8] = [
        SensorType::Ecg,
        SensorType::Emg,
        SensorType::Eog,
        SensorType::Gsr,
        SensorType::Airflow,
        SensorType::Temperature,
        SensorType::BloodPressure,
        SensorType::OxygenSaturation,
    ];

    /// Wire name used in routes and backend payload field names
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Ecg => "ecg",
            SensorType::Emg => "emg",
            SensorType::Eog => "eog",
            SensorType::Gsr => "gsr",
            SensorType::Airflow => "airflow",
            SensorType::Temperature => "temp",
            SensorType::BloodPressure => "nibp",
            SensorType::OxygenSaturation => "spo2",
        }
    }

    /// Waveform sensors carry 80 bytes of sample data per frame
    pub fn is_waveform(&self) -> bool {
        matches!(
            self,
            SensorType::Ecg
                | SensorType::Emg
                | SensorType::Eog
                | SensorType::Gsr
                | SensorType::Airflow
        )
    }

    /// Command byte the device firmware uses for this sensor
    pub fn command_code(&self) -> u8 {
        match self {
            SensorType::Ecg => 0x12,
            SensorType::Emg => 0x22,
            SensorType::Eog => 0x32,
            SensorType::Gsr => 0x82,
            SensorType::Airflow => 0x62,
            SensorType::Temperature => 0xA2,
            SensorType::BloodPressure => 0x42,
            SensorType::OxygenSaturation => 0x52,
        }
    }

    fn default_capacity(&self) -> usize {
        match self {
            SensorType::Temperature => 60,
            SensorType::BloodPressure => 1,
            SensorType::OxygenSaturation => 10,
            _ => 15_000,
        }
    }

    fn backend_path(&self) -> &'static str {
        match self {
            SensorType::Temperature => "/ws/bodytemp",
            SensorType::Ecg => "/ws/ecg",
            SensorType::Emg => "/ws/emg",
            SensorType::Eog => "/ws/eog",
            SensorType::Gsr => "/ws/gsr",
            SensorType::Airflow => "/ws/airflow",
            SensorType::BloodPressure => "/ws/nibp",
            SensorType::OxygenSaturation => "/ws/spo2",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ecg" => Ok(SensorType::Ecg),
            "emg" => Ok(SensorType::Emg),
            "eog" => Ok(SensorType::Eog),
            "gsr" => Ok(SensorType::Gsr),
            "airflow" => Ok(SensorType::Airflow),
            "temp" | "temperature" | "body_temp" => Ok(SensorType::Temperature),
            "nibp" | "blood_pressure" => Ok(SensorType::BloodPressure),
            "spo2" | "oxygen_saturation" => Ok(SensorType::OxygenSaturation),
            _ => Err(GatewayError::UnknownSensorType(s.to_string())),
        }
    }
}

/// Static wire and relay parameters for one sensor type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorProfile {
    pub sensor_type: SensorType,
    pub command_code: u8,
    pub payload_length: u8,
    pub buffer_capacity: usize,
    pub relay_endpoint: String,
}

impl SensorProfile {
    /// Expected total frame length for this sensor
    pub fn frame_length(&self) -> usize {
        if self.sensor_type.is_waveform() {
            WAVEFORM_FRAME_LEN
        } else {
            SCALAR_FRAME_LEN
        }
    }
}

/// Read-only table of sensor profiles, built once at startup
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    profiles: HashMap<SensorType, SensorProfile>,
}

impl SensorRegistry {
    /// Default profiles pointing at `base_url`
    pub fn with_base_url(base_url: &str) -> Self {
        Self::build(base_url, &HashMap::new())
    }

    /// Profiles for the configured relay target and capacity overrides
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::build(&config.relay_base_url, &config.capacity_overrides)
    }

    fn build(base_url: &str, overrides: &HashMap<SensorType, usize>) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let profiles = SensorType::ALL
            .into_iter()
            .map(|sensor| {
                let payload_length = if sensor.is_waveform() {
                    WAVEFORM_PAYLOAD_LEN
                } else {
                    SCALAR_PAYLOAD_LEN
                };
                let profile = SensorProfile {
                    sensor_type: sensor,
                    command_code: sensor.command_code(),
                    payload_length,
                    buffer_capacity: overrides
                        .get(&sensor)
                        .copied()
                        .unwrap_or_else(|| sensor.default_capacity()),
                    relay_endpoint: format!("{}{}", base_url, sensor.backend_path()),
                };
                (sensor, profile)
            })
            .collect();

        Self { profiles }
    }

    /// Profile for a sensor type
    pub fn lookup(&self, sensor_type: SensorType) -> GatewayResult<&SensorProfile> {
        self.profiles
            .get(&sensor_type)
            .ok_or_else(|| GatewayError::UnknownSensorType(sensor_type.to_string()))
    }

    /// Profile for a route name such as `ecg` or `spo2`
    pub fn resolve(&self, name: &str) -> GatewayResult<&SensorProfile> {
        let sensor_type: SensorType = name.parse()?;
        self.lookup(sensor_type)
    }

    /// All profiles in sensor order
    pub fn profiles(&self) -> Vec<&SensorProfile> {
        let mut profiles: Vec<_> = self.profiles.values().collect();
        profiles.sort_by_key(|p| p.sensor_type);
        profiles
    }
}
