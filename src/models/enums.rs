//! Enums for the import pipeline
//!
//! # Serde Casing Conventions
//!
//! - `DataFormat` serializes with the conventional spelling of each format
//!   (`CSV`, `GeoJSON`, `KML`, `GPX`).
//! - `ImportStatus` and `JobOperation` use `kebab-case`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFormat {
    #[serde(rename = "CSV")]
    Csv,
    #[serde(rename = "GeoJSON")]
    GeoJson,
    #[serde(rename = "KML")]
    Kml,
    #[serde(rename = "GPX")]
    Gpx,
}

impl DataFormat {
    /// Every supported format
    pub const ALL: [DataFormat; 4] = [
        DataFormat::Csv,
        DataFormat::GeoJson,
        DataFormat::Kml,
        DataFormat::Gpx,
    ];

    /// Map a MIME content type to a format
    ///
    /// Parameters such as `; charset=utf-8` are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        match mime.as_str() {
            "application/json" | "application/geo+json" | "application/vnd.geo+json" => {
                Some(DataFormat::GeoJson)
            }
            "application/vnd.google-earth.kml+xml" => Some(DataFormat::Kml),
            "application/gpx+xml" => Some(DataFormat::Gpx),
            "text/csv" | "application/csv" => Some(DataFormat::Csv),
            _ => None,
        }
    }

    /// Map a file extension (without the dot) to a format
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "csv" => Some(DataFormat::Csv),
            "geojson" | "json" => Some(DataFormat::GeoJson),
            "kml" => Some(DataFormat::Kml),
            "gpx" => Some(DataFormat::Gpx),
            _ => None,
        }
    }

    /// Guess the format from the first bytes of the content
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]);
        let trimmed = head.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with('{') {
            return Some(DataFormat::GeoJson);
        }
        if trimmed.starts_with('<') {
            let lower = trimmed.to_lowercase();
            if lower.contains("<kml") {
                return Some(DataFormat::Kml);
            }
            if lower.contains("<gpx") {
                return Some(DataFormat::Gpx);
            }
        }
        None
    }

    /// Detect the format of an upload
    ///
    /// The declared content type wins, then the file extension, then the
    /// content itself.
    pub fn detect(file_name: &str, content_type: Option<&str>, bytes: &[u8]) -> Option<Self> {
        content_type
            .and_then(Self::from_content_type)
            .or_else(|| {
                std::path::Path::new(file_name)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(Self::from_extension)
            })
            .or_else(|| Self::sniff(bytes))
    }

    /// Conventional MIME type of the format
    pub fn content_type(&self) -> &'static str {
        match self {
            DataFormat::Csv => "text/csv",
            DataFormat::GeoJson => "application/geo+json",
            DataFormat::Kml => "application/vnd.google-earth.kml+xml",
            DataFormat::Gpx => "application/gpx+xml",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Csv => write!(f, "CSV"),
            DataFormat::GeoJson => write!(f, "GeoJSON"),
            DataFormat::Kml => write!(f, "KML"),
            DataFormat::Gpx => write!(f, "GPX"),
        }
    }
}

impl std::str::FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(DataFormat::Csv),
            "geojson" | "json" => Ok(DataFormat::GeoJson),
            "kml" => Ok(DataFormat::Kml),
            "gpx" => Ok(DataFormat::Gpx),
            _ => Err(format!(
                "Unknown data format: {}. Use 'csv', 'geojson', 'kml' or 'gpx'.",
                s
            )),
        }
    }
}

/// Lifecycle status of an import job
///
/// `Ready` means "convertible", not "fully converted": conversions may run
/// any number of times and never move the job out of `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportStatus {
    /// File parsed and staged, no category yet
    Uploaded,
    /// Category attached, field mapping not submitted
    FieldsPending,
    /// Category and mapping present
    Ready,
}

/// Mutating operations on an import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobOperation {
    AttachCategory,
    CreateField,
    SubmitMapping,
    Convert,
    Delete,
}

impl ImportStatus {
    /// Whether `operation` is legal in this status
    pub fn permits(self, operation: JobOperation) -> bool {
        use ImportStatus::*;
        use JobOperation::*;

        match operation {
            Delete => true,
            AttachCategory => self == Uploaded,
            CreateField | SubmitMapping => matches!(self, FieldsPending | Ready),
            Convert => self == Ready,
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStatus::Uploaded => write!(f, "uploaded"),
            ImportStatus::FieldsPending => write!(f, "fields-pending"),
            ImportStatus::Ready => write!(f, "ready"),
        }
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(ImportStatus::Uploaded),
            "fields-pending" => Ok(ImportStatus::FieldsPending),
            "ready" => Ok(ImportStatus::Ready),
            _ => Err(format!("Unknown import status: {}", s)),
        }
    }
}

impl fmt::Display for JobOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOperation::AttachCategory => write!(f, "attach category"),
            JobOperation::CreateField => write!(f, "create field"),
            JobOperation::SubmitMapping => write!(f, "submit mapping"),
            JobOperation::Convert => write!(f, "convert"),
            JobOperation::Delete => write!(f, "delete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(
            DataFormat::from_content_type("application/json"),
            Some(DataFormat::GeoJson)
        );
        assert_eq!(
            DataFormat::from_content_type("text/csv; charset=utf-8"),
            Some(DataFormat::Csv)
        );
        assert_eq!(
            DataFormat::from_content_type("application/vnd.google-earth.kml+xml"),
            Some(DataFormat::Kml)
        );
        assert_eq!(DataFormat::from_content_type("image/png"), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(
            DataFormat::sniff(br#"  {"type": "FeatureCollection"}"#),
            Some(DataFormat::GeoJson)
        );
        assert_eq!(
            DataFormat::sniff(b"<?xml version=\"1.0\"?><kml xmlns=\"x\"></kml>"),
            Some(DataFormat::Kml)
        );
        assert_eq!(
            DataFormat::sniff(b"<?xml version=\"1.0\"?><gpx version=\"1.1\"></gpx>"),
            Some(DataFormat::Gpx)
        );
        assert_eq!(DataFormat::sniff(b"name,lat,lon"), None);
    }

    #[test]
    fn test_detect_precedence() {
        // Content type beats extension
        assert_eq!(
            DataFormat::detect("points.csv", Some("application/json"), b"a,b"),
            Some(DataFormat::GeoJson)
        );
        // Unknown content type falls back to the extension
        assert_eq!(
            DataFormat::detect("track.GPX", Some("application/octet-stream"), b""),
            Some(DataFormat::Gpx)
        );
        assert_eq!(
            DataFormat::detect("upload", None, b"<kml></kml>"),
            Some(DataFormat::Kml)
        );
        assert_eq!(DataFormat::detect("upload.bin", None, b"\x00\x01"), None);
    }

    #[test]
    fn test_status_permits() {
        assert!(ImportStatus::Uploaded.permits(JobOperation::AttachCategory));
        assert!(!ImportStatus::Uploaded.permits(JobOperation::SubmitMapping));
        assert!(!ImportStatus::Uploaded.permits(JobOperation::Convert));
        assert!(ImportStatus::FieldsPending.permits(JobOperation::SubmitMapping));
        assert!(!ImportStatus::FieldsPending.permits(JobOperation::AttachCategory));
        assert!(!ImportStatus::FieldsPending.permits(JobOperation::Convert));
        assert!(ImportStatus::Ready.permits(JobOperation::Convert));
        assert!(ImportStatus::Ready.permits(JobOperation::SubmitMapping));
        for status in [
            ImportStatus::Uploaded,
            ImportStatus::FieldsPending,
            ImportStatus::Ready,
        ] {
            assert!(status.permits(JobOperation::Delete));
        }
    }

    #[test]
    fn test_status_round_trip_names() {
        assert_eq!(
            serde_json::to_string(&ImportStatus::FieldsPending).unwrap(),
            "\"fields-pending\""
        );
        assert_eq!(
            "fields-pending".parse::<ImportStatus>(),
            Ok(ImportStatus::FieldsPending)
        );
    }
}
