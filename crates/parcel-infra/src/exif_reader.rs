//! EXIF metadata reader for captured photos
//!
//! Extracts capture datetime and camera identity from encoded image bytes.

use std::io::Cursor;

use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{In, Reader, Tag};

/// EXIF metadata extracted from a photo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoMetadata {
    /// Original capture datetime (from camera)
    pub captured_at: Option<DateTime<Utc>>,
    /// Camera make (e.g., "Apple", "Canon")
    pub camera_make: Option<String>,
    /// Camera model (e.g., "iPhone 14 Pro")
    pub camera_model: Option<String>,
}

impl PhotoMetadata {
    /// Read EXIF metadata from encoded image bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(bytes);
        let exif = Reader::new().read_from_container(&mut cursor).ok()?;

        let captured_at = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))
            .and_then(|f| parse_exif_datetime(&f.display_value().to_string()));

        let camera_make = exif
            .get_field(Tag::Make, In::PRIMARY)
            .map(|f| f.display_value().to_string().trim_matches('"').trim().to_string());

        let camera_model = exif
            .get_field(Tag::Model, In::PRIMARY)
            .map(|f| f.display_value().to_string().trim_matches('"').trim().to_string());

        Some(Self {
            captured_at,
            camera_make,
            camera_model,
        })
    }

    /// Capture time from EXIF, falling back to the given shutter time
    pub fn captured_at_or(bytes: &[u8], shutter_time: DateTime<Utc>) -> DateTime<Utc> {
        Self::from_bytes(bytes)
            .and_then(|m| m.captured_at)
            .unwrap_or(shutter_time)
    }
}

/// Parse EXIF datetime string (format: "2024:01:15 10:30:45")
fn parse_exif_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim().trim_matches('"');

    // display_value renders the standard format with dashes
    NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|dt| dt.and_utc())
}
