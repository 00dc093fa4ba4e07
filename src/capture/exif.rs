use chrono::NaiveDateTime;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Capture time as "YYYY-MM-DD HH:MM:SS"
pub fn extract_date(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let mut bufreader = BufReader::new(file);
    let exif_reader = exif::Reader::new();
    let exif = exif_reader.read_from_container(&mut bufreader)?;

    for tag in [exif::Tag::DateTimeOriginal, exif::Tag::DateTime] {
        if let Some(field) = exif.get_field(tag, exif::In::PRIMARY) {
            let raw = field.display_value().to_string();
            if let Some(normalized) = normalize_date(&raw) {
                return Ok(normalized);
            }
        }
    }

    Err("No date found in EXIF".into())
}

/// Accepts EXIF ("2026:10:19 08:15:00") or display ("2026-10-19 08:15:00") forms
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_matches('"');
    ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}
