//! SIRI-VM XML parser.
//!
//! Converts one line's raw payload into [`ParsedBusData`]. Only a document
//! that is not well-formed XML is an error; a feed with no vehicles, or with
//! parts of the expected structure missing, yields fewer (or zero) records.

pub mod image;
pub mod tree;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::ParseError;
use crate::types::{BusData, ParsedBusData, StopCall, VehicleActivity};

pub use image::BusImageGenerator;
pub use tree::XmlNode;

const VEHICLE_ACTIVITY_PATH: &[&str] = &[
    "Siri",
    "ServiceDelivery",
    "VehicleMonitoringDelivery",
    "VehicleActivity",
];

/// Stateless SIRI-VM to [`ParsedBusData`] converter.
#[derive(Debug, Default, Clone)]
pub struct XmlParser {
    images: BusImageGenerator,
}

impl XmlParser {
    pub fn new() -> Self {
        Self {
            images: BusImageGenerator::new(),
        }
    }

    /// Parses a fetched payload, stamping the batch with its fetch time.
    #[tracing::instrument(
        name = "parse_bus_data",
        skip_all,
        fields(line_ref = %data.line_ref, xml_size_bytes = data.xml.len())
    )]
    pub fn parse_bus_data(&self, data: &BusData) -> Result<ParsedBusData, ParseError> {
        self.parse(&data.xml, &data.line_ref, data.fetched_at)
    }

    /// Parses `xml` for `line_ref`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the bytes are not a well-formed UTF-8 XML
    /// document. No partial result is produced in that case.
    pub fn parse(
        &self,
        xml: &[u8],
        line_ref: &str,
        capture_time: DateTime<Utc>,
    ) -> Result<ParsedBusData, ParseError> {
        let text = std::str::from_utf8(xml)?;
        let tree = XmlNode::parse(text)?;

        let vehicles = self.extract_vehicle_activities(&tree);
        debug!(vehicles = vehicles.len(), "Extracted vehicle activities");

        Ok(ParsedBusData {
            line_ref: line_ref.to_string(),
            timestamp: format_timestamp(capture_time),
            vehicles,
        })
    }

    fn extract_vehicle_activities(&self, tree: &XmlNode) -> Vec<VehicleActivity> {
        let Some(activities) = tree.path(VEHICLE_ACTIVITY_PATH) else {
            return Vec::new();
        };

        activities
            .items()
            .iter()
            .filter_map(|activity| self.parse_vehicle_activity(activity))
            .collect()
    }

    /// Builds one record from a `VehicleActivity` element. Returns `None`
    /// only when the element is not a container (e.g. an empty tag).
    pub fn parse_vehicle_activity(&self, activity: &XmlNode) -> Option<VehicleActivity> {
        if !activity.is_map() {
            return None;
        }

        let mut vehicle = VehicleActivity {
            recorded_at_time: text(activity, "RecordedAtTime"),
            valid_until_time: text(activity, "ValidUntilTime"),
            ..Default::default()
        };

        if let Some(journey) = activity.get("MonitoredVehicleJourney") {
            vehicle.line_ref = text(journey, "LineRef");
            vehicle.direction_ref = text(journey, "DirectionRef");
            vehicle.operator_ref = text(journey, "OperatorRef");
            vehicle.published_line_name = text(journey, "PublishedLineName");
            vehicle.block_ref = text(journey, "BlockRef");

            vehicle.vehicle_ref = text(journey, "VehicleRef");
            if vehicle.vehicle_ref.is_empty() {
                vehicle.vehicle_ref = journey
                    .path(&["FramedVehicleJourneyRef", "DatedVehicleJourneyRef"])
                    .and_then(XmlNode::as_text)
                    .unwrap_or_default()
                    .to_string();
            }

            vehicle.origin_ref = text(journey, "OriginRef");
            vehicle.origin_name = format_stop_name(&text(journey, "OriginName"));
            vehicle.destination_ref = text(journey, "DestinationRef");
            vehicle.destination_name = format_stop_name(&text(journey, "DestinationName"));
            vehicle.origin_aimed_departure_time = text(journey, "OriginAimedDepartureTime");
            vehicle.destination_aimed_arrival_time = text(journey, "DestinationAimedArrivalTime");

            if let Some(location) = journey.get("VehicleLocation") {
                vehicle.longitude = float(location, "Longitude");
                vehicle.latitude = float(location, "Latitude");
            }

            vehicle.bearing = float(journey, "Bearing");
            vehicle.velocity = float(journey, "Velocity");
            vehicle.occupancy = text(journey, "Occupancy");
            vehicle.progress_status = text(journey, "ProgressStatus");

            vehicle.monitored_call = journey.get("MonitoredCall").and_then(parse_stop_call);
            vehicle.onward_calls = journey
                .get("OnwardCalls")
                .map(parse_onward_calls)
                .unwrap_or_default();
        }

        vehicle.bus_image = self
            .images
            .compact_bus_image(&vehicle.line_ref, &vehicle.direction_ref);

        Some(vehicle)
    }
}

/// Extracts a stop call, discarding it when it has neither ref nor name.
pub fn parse_stop_call(node: &XmlNode) -> Option<StopCall> {
    let call = StopCall {
        stop_point_ref: text(node, "StopPointRef"),
        stop_point_name: format_stop_name(&text(node, "StopPointName")),
        visit_number: int(node, "VisitNumber"),
        aimed_arrival_time: text(node, "AimedArrivalTime"),
        expected_arrival_time: text(node, "ExpectedArrivalTime"),
        aimed_departure_time: text(node, "AimedDepartureTime"),
        expected_departure_time: text(node, "ExpectedDepartureTime"),
    };

    (!call.is_empty()).then_some(call)
}

/// Extracts every `OnwardCall` under an `OnwardCalls` element, in order.
pub fn parse_onward_calls(node: &XmlNode) -> Vec<StopCall> {
    node.get("OnwardCall")
        .map(|calls| calls.items().iter().filter_map(parse_stop_call).collect())
        .unwrap_or_default()
}

/// Cleans up BODS stop names: `__` becomes `" - "`, then any remaining `_`
/// becomes a space. `"Lyde_Green__Science_Park"` -> `"Lyde Green - Science Park"`.
pub fn format_stop_name(name: &str) -> String {
    name.replace("__", " - ").replace('_', " ")
}

/// ISO-8601 with millisecond precision and a literal `Z`.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn text(node: &XmlNode, key: &str) -> String {
    node.text(key).unwrap_or_default().to_string()
}

fn float(node: &XmlNode, key: &str) -> f64 {
    node.text(key).and_then(parse_float).unwrap_or_default()
}

fn int(node: &XmlNode, key: &str) -> i64 {
    node.text(key).and_then(parse_int).unwrap_or_default()
}

fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_int(s: &str) -> Option<i64> {
    s.trim().parse().ok()
}
