//! Domain records produced by the parser and consumed by dispatch.
//!
//! Optional fields are skipped when serializing, so a field that was never
//! present upstream never shows up as `null` or `""` in a log line.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw SIRI-VM payload fetched for one line.
#[derive(Debug, Clone)]
pub struct BusData {
    pub line_ref: String,
    pub xml: Bytes,
    pub fetched_at: DateTime<Utc>,
}

impl BusData {
    pub fn new(line_ref: impl Into<String>, xml: impl Into<Bytes>) -> Self {
        Self {
            line_ref: line_ref.into(),
            xml: xml.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// Everything parsed from one fetch of one line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedBusData {
    pub line_ref: String,
    /// Capture time, `YYYY-MM-DDTHH:MM:SS.mmmZ`.
    pub timestamp: String,
    #[serde(rename = "vehicle_activities")]
    pub vehicles: Vec<VehicleActivity>,
}

/// One upstream position/status report for one vehicle.
///
/// `bearing` and `velocity` use `0.0` for "not reported", so an upstream
/// value of exactly zero is dropped from the serialized record too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleActivity {
    #[serde(default)]
    pub vehicle_ref: String,
    #[serde(default)]
    pub line_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub direction_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operator_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin_aimed_departure_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_aimed_arrival_time: String,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recorded_at_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub valid_until_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bus_image: String,

    // heading in degrees, 0-360
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bearing: f64,
    // metres per second
    #[serde(default, skip_serializing_if = "is_zero")]
    pub velocity: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub occupancy: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub progress_status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub published_line_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub block_ref: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitored_call: Option<StopCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub onward_calls: Vec<StopCall>,
}

/// Predicted or scheduled arrival/departure at one stop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopCall {
    #[serde(default)]
    pub stop_point_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stop_point_name: String,
    #[serde(default, skip_serializing_if = "is_zero_int")]
    pub visit_number: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aimed_arrival_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expected_arrival_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aimed_departure_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expected_departure_time: String,
}

impl StopCall {
    /// A call with neither a ref nor a name carries no usable data.
    pub fn is_empty(&self) -> bool {
        self.stop_point_ref.is_empty() && self.stop_point_name.is_empty()
    }
}

/// One vehicle as it appears in a log line: the record with the batch-level
/// timestamp and line merged in.
#[derive(Debug, Serialize)]
pub struct VehicleLogEntry<'a> {
    pub timestamp: &'a str,
    pub line_ref: &'a str,
    #[serde(flatten)]
    pub vehicle: VehicleFields<'a>,
}

/// [`VehicleActivity`] minus its own `line_ref`, which the entry replaces with
/// the batch line so the key is emitted exactly once.
#[derive(Debug)]
pub struct VehicleFields<'a>(pub &'a VehicleActivity);

impl Serialize for VehicleFields<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error;

        let mut value = serde_json::to_value(self.0).map_err(S::Error::custom)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("line_ref");
        }
        value.serialize(serializer)
    }
}

impl ParsedBusData {
    /// Log-line views of every vehicle in the batch, in parse order.
    pub fn log_entries(&self) -> impl Iterator<Item = VehicleLogEntry<'_>> {
        self.vehicles.iter().map(move |vehicle| VehicleLogEntry {
            timestamp: &self.timestamp,
            line_ref: &self.line_ref,
            vehicle: VehicleFields(vehicle),
        })
    }
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

fn is_zero_int(v: &i64) -> bool {
    *v == 0
}
