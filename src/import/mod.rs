//! Import functionality
//!
//! Provides readers that turn uploaded geodata files into raw records:
//! - CSV (WKT geometry column or latitude/longitude columns)
//! - GeoJSON (FeatureCollection or single Feature)
//! - KML (Placemarks)
//! - GPX (waypoints, routes and tracks)
//!
//! Every reader is all-or-nothing: a record without parseable geometry fails
//! the whole file, before anything is persisted.

pub mod csv;
pub mod geojson;
pub mod gpx;
pub mod kml;
pub mod wkt;
mod xml;

pub use self::csv::CSVImporter;
pub use self::geojson::GeoJSONImporter;
pub use self::gpx::GPXImporter;
pub use self::kml::KMLImporter;

use crate::models::{DataFormat, RawRecord};
use tracing::{debug, info};

/// Default WKT column names for CSV files
pub const DEFAULT_GEOMETRY_COLUMNS: &[&str] = &["geom", "geometry", "wkt"];

/// Default latitude column names for CSV files
pub const DEFAULT_LATITUDE_COLUMNS: &[&str] = &["lat", "latitude"];

/// Default longitude column names for CSV files
pub const DEFAULT_LONGITUDE_COLUMNS: &[&str] = &["lon", "lng", "long", "longitude"];

/// Result of reading an uploaded file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[must_use = "import results should be staged or inspected"]
pub struct ImportResult {
    /// Format the file was read as
    pub format: DataFormat,
    /// Records in file order
    pub records: Vec<RawRecord>,
}

/// Error during import
#[derive(Debug, Clone, PartialEq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum ImportError {
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(String),
}

/// Options shared by the format readers.
///
/// Only the CSV reader has options today; column names are matched
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    pub delimiter: u8,
    pub geometry_columns: Vec<String>,
    pub latitude_columns: Vec<String>,
    pub longitude_columns: Vec<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        fn owned(names: &[&str]) -> Vec<String> {
            names.iter().map(|s| s.to_string()).collect()
        }

        Self {
            delimiter: b',',
            geometry_columns: owned(DEFAULT_GEOMETRY_COLUMNS),
            latitude_columns: owned(DEFAULT_LATITUDE_COLUMNS),
            longitude_columns: owned(DEFAULT_LONGITUDE_COLUMNS),
        }
    }
}

/// A parser for one upload format.
pub trait RecordReader: Send + Sync {
    /// Format handled by this reader
    fn format(&self) -> DataFormat;

    /// Parse file bytes into records, in file order.
    ///
    /// Reading the same bytes again yields the same records.
    fn read(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, ImportError>;
}

/// Reader for `format`.
pub fn reader_for(format: DataFormat, options: &ReaderOptions) -> Box<dyn RecordReader> {
    match format {
        DataFormat::Csv => Box::new(CSVImporter::with_options(options.clone())),
        DataFormat::GeoJson => Box::new(GeoJSONImporter::new()),
        DataFormat::Kml => Box::new(KMLImporter::new()),
        DataFormat::Gpx => Box::new(GPXImporter::new()),
    }
}

/// Detect the format of an upload, failing when nothing matches.
pub fn detect_format(
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<DataFormat, ImportError> {
    DataFormat::detect(file_name, content_type, bytes).ok_or_else(|| {
        ImportError::UnsupportedFormat(format!(
            "Cannot determine the format of '{}'{}",
            file_name,
            content_type
                .map(|ct| format!(" (content type {})", ct))
                .unwrap_or_default()
        ))
    })
}

/// Detect the format of an upload and read all of its records.
///
/// # Example
///
/// ```rust
/// use geo_import_sdk::import::{ReaderOptions, import_file};
/// use geo_import_sdk::models::DataFormat;
///
/// let csv = b"name,lat,lon\nOak,51.5,-0.12\n";
/// let result = import_file("trees.csv", None, csv, &ReaderOptions::default()).unwrap();
/// assert_eq!(result.format, DataFormat::Csv);
/// assert_eq!(result.records.len(), 1);
/// ```
pub fn import_file(
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
    options: &ReaderOptions,
) -> Result<ImportResult, ImportError> {
    let format = detect_format(file_name, content_type, bytes)?;
    debug!(file_name, %format, "Detected upload format");

    let records = reader_for(format, options).read(bytes)?;
    if records.is_empty() {
        return Err(ImportError::ParseError(format!(
            "'{}' contains no features",
            file_name
        )));
    }

    info!(file_name, %format, records = records.len(), "Read upload");
    Ok(ImportResult { format, records })
}

/// Decode file bytes as UTF-8, dropping a leading byte order mark.
pub(crate) fn decode_utf8(bytes: &[u8]) -> Result<&str, ImportError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ImportError::ParseError(format!("File is not valid UTF-8: {}", e)))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_is_unsupported() {
        let err = import_file("notes.txt", Some("text/plain"), b"hello", &ReaderOptions::default())
            .unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_empty_collection_is_parse_error() {
        let err = import_file(
            "empty.geojson",
            None,
            br#"{"type":"FeatureCollection","features":[]}"#,
            &ReaderOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::ParseError(_)));
    }

    #[test]
    fn test_reader_for_dispatches_by_format() {
        let options = ReaderOptions::default();
        for format in DataFormat::ALL {
            assert_eq!(reader_for(format, &options).format(), format);
        }
    }

    #[test]
    fn test_invalid_utf8() {
        assert!(decode_utf8(&[0xff, 0xfe, 0x00]).is_err());
        assert_eq!(decode_utf8("\u{feff}a,b".as_bytes()).unwrap(), "a,b");
    }
}
