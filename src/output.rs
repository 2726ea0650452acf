//! Dry-run output: a human-readable summary of a batch followed by every log
//! line exactly as it would be pushed.

use std::io::Write;

use tracing::debug;

use crate::error::SendError;
use crate::types::{ParsedBusData, VehicleActivity};

/// Writes the dry-run report for one batch to `out`.
pub fn print_dry_run<W: Write>(out: &mut W, data: &ParsedBusData) -> Result<(), SendError> {
    writeln!(out, "=== DRY RUN - Bus Data for Line {} ===", data.line_ref)?;
    writeln!(out, "Timestamp: {}", data.timestamp)?;
    writeln!(out, "Vehicle Count: {}", data.vehicles.len())?;
    writeln!(out)?;

    for (i, vehicle) in data.vehicles.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, summary(vehicle))?;
    }

    writeln!(out)?;
    writeln!(out, "Log lines:")?;
    for entry in data.log_entries() {
        writeln!(out, "{}", serde_json::to_string(&entry)?)?;
    }
    writeln!(out, "=== END DRY RUN ===")?;
    writeln!(out)?;
    out.flush()?;

    debug!(line_ref = %data.line_ref, vehicles = data.vehicles.len(), "Dry-run batch printed");
    Ok(())
}

fn summary(vehicle: &VehicleActivity) -> String {
    let mut line = format!(
        "Vehicle: {}, Direction: {}, Location: ({:.6}, {:.6})",
        vehicle.vehicle_ref, vehicle.direction_ref, vehicle.latitude, vehicle.longitude
    );
    if !vehicle.origin_name.is_empty() && !vehicle.destination_name.is_empty() {
        line.push_str(&format!(
            " ({} → {})",
            vehicle.origin_name, vehicle.destination_name
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn vehicle(id: &str, origin: &str, destination: &str) -> VehicleActivity {
        VehicleActivity {
            vehicle_ref: id.to_string(),
            line_ref: "1".to_string(),
            direction_ref: "inbound".to_string(),
            origin_name: origin.to_string(),
            destination_name: destination.to_string(),
            latitude: 51.4545,
            longitude: -2.5879,
            ..Default::default()
        }
    }

    fn render(data: &ParsedBusData) -> String {
        let mut buf = Vec::new();
        print_dry_run(&mut buf, data).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_summary_with_and_without_route() {
        assert_eq!(
            summary(&vehicle("BUS001", "Bristol", "Bath")),
            "Vehicle: BUS001, Direction: inbound, Location: (51.454500, -2.587900) (Bristol → Bath)"
        );
        assert_eq!(
            summary(&vehicle("BUS002", "Bristol", "")),
            "Vehicle: BUS002, Direction: inbound, Location: (51.454500, -2.587900)"
        );
    }

    #[test]
    fn test_report_layout() {
        let data = ParsedBusData {
            line_ref: "1".to_string(),
            timestamp: "2024-01-15T10:30:00.000Z".to_string(),
            vehicles: vec![vehicle("BUS001", "A", "B"), vehicle("BUS002", "", "")],
        };
        let out = render(&data);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "=== DRY RUN - Bus Data for Line 1 ===");
        assert_eq!(lines[1], "Timestamp: 2024-01-15T10:30:00.000Z");
        assert_eq!(lines[2], "Vehicle Count: 2");
        assert!(lines[4].starts_with("1. Vehicle: BUS001"));
        assert!(lines[5].starts_with("2. Vehicle: BUS002"));
        assert!(out.contains("=== END DRY RUN ==="));

        let json_lines: Vec<Value> = lines
            .iter()
            .filter(|l| l.starts_with('{'))
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(json_lines.len(), 2);
        assert_eq!(json_lines[0]["vehicle_ref"], "BUS001");
        assert_eq!(json_lines[0]["line_ref"], "1");
        assert_eq!(json_lines[1]["timestamp"], "2024-01-15T10:30:00.000Z");
    }

    #[test]
    fn test_empty_batch() {
        let data = ParsedBusData {
            line_ref: "49x".to_string(),
            timestamp: "2024-01-15T10:30:00.000Z".to_string(),
            vehicles: vec![],
        };
        let out = render(&data);
        assert!(out.contains("Vehicle Count: 0"));
        assert!(!out.contains('{'));
    }

    #[test]
    fn test_deterministic() {
        let data = ParsedBusData {
            line_ref: "1".to_string(),
            timestamp: "2024-01-15T10:30:00.000Z".to_string(),
            vehicles: vec![vehicle("BUS001", "A", "B")],
        };
        assert_eq!(render(&data), render(&data));
    }
}
