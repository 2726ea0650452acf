//! Small SVG bus icons, embedded in each vehicle record as a data URI.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

static LINE_COLORS: &[(&str, &str)] = &[
    ("49x", "#E74C3C"),
    ("7", "#3498DB"),
    ("18", "#2ECC71"),
    ("42", "#F39C12"),
    ("50", "#9B59B6"),
    ("1", "#1ABC9C"),
    ("2", "#34495E"),
    ("8", "#E67E22"),
    ("15", "#8E44AD"),
    ("20", "#27AE60"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct BusImageGenerator;

impl BusImageGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Fill colour for a line: a fixed palette entry, otherwise a hue derived
    /// from the line name so the same line always gets the same colour.
    pub fn line_color(&self, line_ref: &str) -> String {
        if let Some((_, color)) = LINE_COLORS.iter().find(|(line, _)| *line == line_ref) {
            return color.to_string();
        }

        let hash = line_ref.chars().fold(0i64, |hash, c| {
            (c as i64).wrapping_add((hash << 5).wrapping_sub(hash))
        });
        format!("hsl({}, 70%, 50%)", hash.rem_euclid(360))
    }

    /// 90x45 icon with the line number and a direction marker, as a
    /// `data:image/svg+xml;base64,...` URI.
    pub fn compact_bus_image(&self, line_ref: &str, direction: &str) -> String {
        let bus_color = self.line_color(line_ref);

        let (direction_shape, direction_color) = match direction.to_lowercase().as_str() {
            "inbound" => (
                r##"<polygon points="45,22 50,25 45,28" fill="#28a745"/>"##,
                "#28a745",
            ),
            "outbound" => (
                r##"<polygon points="50,22 55,25 50,28" fill="#dc3545"/>"##,
                "#dc3545",
            ),
            _ => (r##"<circle cx="50" cy="25" r="2" fill="#6c757d"/>"##, "#6c757d"),
        };

        let label: String = direction.chars().take(2).collect::<String>().to_uppercase();

        let svg = format!(
            r##"<svg width="90" height="45" xmlns="http://www.w3.org/2000/svg">
  <rect width="90" height="45" fill="white" stroke="#dee2e6" stroke-width="1" rx="6"/>
  <rect x="8" y="15" width="32" height="18" fill="{bus_color}" rx="3"/>
  <rect x="6" y="17" width="3" height="14" fill="{bus_color}" rx="1"/>
  <rect x="10" y="17" width="5" height="4" fill="#87CEEB" rx="1"/>
  <rect x="16" y="17" width="5" height="4" fill="#87CEEB" rx="1"/>
  <rect x="22" y="17" width="5" height="4" fill="#87CEEB" rx="1"/>
  <rect x="28" y="17" width="5" height="4" fill="#87CEEB" rx="1"/>
  <rect x="34" y="17" width="4" height="4" fill="#87CEEB" rx="1"/>
  <rect x="18" y="22" width="8" height="9" fill="#2C3E50" rx="1"/>
  <rect x="19" y="23" width="6" height="7" fill="#34495E" rx="0.5"/>
  <circle cx="15" cy="35" r="3" fill="#2C3E50"/>
  <circle cx="31" cy="35" r="3" fill="#2C3E50"/>
  <circle cx="15" cy="35" r="1.5" fill="#7F8C8D"/>
  <circle cx="31" cy="35" r="1.5" fill="#7F8C8D"/>
  <rect x="45" y="12" width="35" height="12" fill="{bus_color}" rx="2"/>
  <text x="62.5" y="21" font-family="Arial, sans-serif" font-size="9" font-weight="bold" fill="white" text-anchor="middle">{line_ref}</text>
  {direction_shape}
  <text x="62.5" y="35" font-family="Arial, sans-serif" font-size="7" font-weight="bold" fill="{direction_color}" text-anchor="middle">{label}</text>
</svg>"##
        );

        format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
    }
}
