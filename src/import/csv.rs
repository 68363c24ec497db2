//! CSV reader.
//!
//! The first row is the header. Each data row becomes one record whose
//! geometry comes either from a WKT column or from a latitude/longitude
//! column pair; those columns are not repeated as attributes. Empty cells are
//! left out of the record.

use super::wkt::parse_wkt;
use super::{ImportError, ReaderOptions, RecordReader, decode_utf8};
use crate::models::{AttributeValue, Attributes, DataFormat, Geometry, RawRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

static RE_HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));

/// Where a row's geometry is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeometrySource {
    Wkt(usize),
    LatLon { lat: usize, lon: usize },
}

impl GeometrySource {
    fn covers(&self, column: usize) -> bool {
        match *self {
            GeometrySource::Wkt(idx) => idx == column,
            GeometrySource::LatLon { lat, lon } => lat == column || lon == column,
        }
    }
}

/// Parser for CSV files with point or WKT geometry.
pub struct CSVImporter {
    options: ReaderOptions,
}

impl Default for CSVImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CSVImporter {
    /// Create a CSV reader with the default column names and `,` delimiter.
    ///
    /// # Example
    ///
    /// ```rust
    /// use geo_import_sdk::import::csv::CSVImporter;
    ///
    /// let importer = CSVImporter::new();
    /// let records = importer.import("name,geom\nOak,POINT (-0.12 51.5)\n").unwrap();
    /// assert_eq!(records[0].attributes["name"].to_string(), "Oak");
    /// ```
    pub fn new() -> Self {
        Self::with_options(ReaderOptions::default())
    }

    pub fn with_options(options: ReaderOptions) -> Self {
        Self { options }
    }

    /// Parse CSV text into records.
    pub fn import(&self, content: &str) -> Result<Vec<RawRecord>, ImportError> {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(::csv::Trim::All)
            .from_reader(content.as_bytes());

        let raw_headers = reader
            .headers()
            .map_err(|e| ImportError::ParseError(format!("Cannot read CSV header: {}", e)))?
            .clone();
        let headers = clean_headers(raw_headers.iter())?;
        let source = self.geometry_source(&headers)?;
        debug!(columns = headers.len(), ?source, "CSV header parsed");

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| ImportError::ParseError(format!("CSV error: {}", e)))?;
            let line = row.position().map(|p| p.line()).unwrap_or_default();

            if row.len() != headers.len() {
                return Err(ImportError::ParseError(format!(
                    "Line {}: expected {} columns, found {}",
                    line,
                    headers.len(),
                    row.len()
                )));
            }

            let geometry = read_geometry(&row, source)
                .map_err(|reason| ImportError::ParseError(format!("Line {}: {}", line, reason)))?;

            let mut attributes = Attributes::new();
            for (idx, (header, cell)) in headers.iter().zip(row.iter()).enumerate() {
                if source.covers(idx) || cell.is_empty() {
                    continue;
                }
                attributes.insert(header.clone(), AttributeValue::Text(cell.to_string()));
            }

            records.push(RawRecord::new(geometry, attributes));
        }

        Ok(records)
    }

    fn geometry_source(&self, headers: &[String]) -> Result<GeometrySource, ImportError> {
        let find = |names: &[String]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| n.eq_ignore_ascii_case(h)))
        };

        if let Some(idx) = find(self.options.geometry_columns.as_slice()) {
            return Ok(GeometrySource::Wkt(idx));
        }
        match (
            find(self.options.latitude_columns.as_slice()),
            find(self.options.longitude_columns.as_slice()),
        ) {
            (Some(lat), Some(lon)) => Ok(GeometrySource::LatLon { lat, lon }),
            _ => Err(ImportError::ParseError(format!(
                "No geometry column found. Expected one of [{}] or a latitude/longitude pair",
                self.options.geometry_columns.join(", ")
            ))),
        }
    }
}

impl RecordReader for CSVImporter {
    fn format(&self) -> DataFormat {
        DataFormat::Csv
    }

    fn read(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, ImportError> {
        self.import(decode_utf8(bytes)?)
    }
}

/// Strip markup from header names and reject empty or duplicate names
fn clean_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Result<Vec<String>, ImportError> {
    let mut seen = HashSet::new();
    let mut headers = Vec::new();

    for (idx, header) in raw.enumerate() {
        let name = RE_HTML_TAG.replace_all(header, "").trim().to_string();
        if name.is_empty() {
            return Err(ImportError::ParseError(format!(
                "Column {} has an empty header",
                idx + 1
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(ImportError::ParseError(format!(
                "Duplicate column header '{}'",
                name
            )));
        }
        headers.push(name);
    }

    if headers.is_empty() {
        return Err(ImportError::ParseError("CSV file has no header".to_string()));
    }
    Ok(headers)
}

fn read_geometry(row: &::csv::StringRecord, source: GeometrySource) -> Result<Geometry, String> {
    match source {
        GeometrySource::Wkt(idx) => {
            let text = row.get(idx).unwrap_or_default();
            if text.is_empty() {
                return Err("missing geometry".to_string());
            }
            parse_wkt(text).map_err(|e| format!("invalid geometry: {}", e))
        }
        GeometrySource::LatLon { lat, lon } => {
            let lat = parse_ordinate(row.get(lat), "latitude")?;
            let lon = parse_ordinate(row.get(lon), "longitude")?;
            Geometry::point(lon, lat).map_err(|e| format!("invalid geometry: {}", e))
        }
    }
}

fn parse_ordinate(cell: Option<&str>, what: &str) -> Result<f64, String> {
    match cell {
        None | Some("") => Err(format!("missing {}", what)),
        Some(text) => text
            .parse::<f64>()
            .map_err(|_| format!("invalid {} '{}'", what, text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinate;

    #[test]
    fn test_lat_lon_columns() {
        let records = CSVImporter::new()
            .import("name,lat,lon\nOak,51.5,-0.12\nAsh,51.6,-0.13\n")
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].geometry,
            Geometry::Point(Coordinate::new(-0.12, 51.5))
        );
        let keys: Vec<&String> = records[0].attributes.keys().collect();
        assert_eq!(keys, vec!["name"]);
    }

    #[test]
    fn test_wkt_column_takes_precedence() {
        let records = CSVImporter::new()
            .import("Geometry,lat,lon,kind\n\"LINESTRING (1 1, 2 2)\",5,5,path\n")
            .unwrap();
        assert_eq!(records[0].geometry.type_name(), "LineString");
        // Only the WKT column is consumed
        assert_eq!(records[0].attributes.len(), 3);
    }

    #[test]
    fn test_html_headers_and_empty_cells() {
        let records = CSVImporter::new()
            .import("<b>Name</b>,height,lat,lon\nOak,,51.5,-0.12\n")
            .unwrap();
        assert!(records[0].attributes.contains_key("Name"));
        assert!(!records[0].attributes.contains_key("height"));
    }

    #[test]
    fn test_bad_geometry_reports_line() {
        let err = CSVImporter::new()
            .import("name,lat,lon\nOak,51.5,-0.12\nAsh,north,-0.13\n")
            .unwrap_err();
        match err {
            ImportError::ParseError(msg) => {
                assert!(msg.starts_with("Line 3"), "{}", msg);
                assert!(msg.contains("latitude"), "{}", msg);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_header_errors() {
        assert!(CSVImporter::new().import("name,name,lat,lon\n").is_err());
        assert!(CSVImporter::new().import("name,,lat,lon\n").is_err());
        assert!(CSVImporter::new().import("name,height\nOak,12\n").is_err());
    }

    #[test]
    fn test_row_length_mismatch() {
        let err = CSVImporter::new()
            .import("name,lat,lon\nOak,51.5,-0.12,extra\n")
            .unwrap_err();
        assert_eq!(
            err,
            ImportError::ParseError("Line 2: expected 3 columns, found 4".to_string())
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let options = ReaderOptions {
            delimiter: b';',
            ..Default::default()
        };
        let err = CSVImporter::with_options(options)
            .import("name;latitude;longitude\nOak;51,5;-0,12\n")
            .unwrap_err();
        // Decimal commas are not numbers
        assert!(matches!(err, ImportError::ParseError(_)));

        let records = CSVImporter::with_options(ReaderOptions {
            delimiter: b';',
            ..Default::default()
        })
        .import("name;latitude;longitude\nOak;51.5;-0.12\n")
        .unwrap();
        assert_eq!(records.len(), 1);
    }
}
