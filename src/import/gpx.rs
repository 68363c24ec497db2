//! GPX reader.
//!
//! Waypoints become points, routes and tracks become line strings. Records
//! follow document order.

use super::xml::{XmlElement, parse_document};
use super::{ImportError, RecordReader, decode_utf8};
use crate::models::{AttributeValue, Attributes, Coordinate, DataFormat, Geometry, RawRecord};
use anyhow::{Context, Result, bail};
use tracing::debug;

/// Child elements copied into record attributes
const ATTRIBUTE_ELEMENTS: [&str; 7] = ["name", "desc", "cmt", "ele", "time", "type", "sym"];

/// Parser for GPX 1.0/1.1 documents.
pub struct GPXImporter;

impl Default for GPXImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl GPXImporter {
    /// Create a new GPX reader.
    pub fn new() -> Self {
        Self
    }

    /// Parse GPX text into records.
    ///
    /// # Example
    ///
    /// ```rust
    /// use geo_import_sdk::import::gpx::GPXImporter;
    ///
    /// let gpx = r#"<gpx version="1.1"><wpt lat="51.5" lon="-0.12"><name>Gate</name></wpt></gpx>"#;
    /// let records = GPXImporter::new().import(gpx).unwrap();
    /// assert_eq!(records[0].geometry.type_name(), "Point");
    /// ```
    pub fn import(&self, gpx_content: &str) -> Result<Vec<RawRecord>, ImportError> {
        self.parse(gpx_content)
            .map_err(|e| ImportError::ParseError(format!("{:#}", e)))
    }

    fn parse(&self, gpx_content: &str) -> Result<Vec<RawRecord>> {
        let root = parse_document(gpx_content).context("Invalid GPX document")?;
        if root.name != "gpx" {
            bail!("Expected a <gpx> root element, found <{}>", root.name);
        }

        let mut records = Vec::new();
        for (idx, element) in root.children.iter().enumerate() {
            let geometry = match element.name.as_str() {
                "wpt" => Geometry::Point(position(element)?),
                "rte" => Geometry::LineString(
                    element
                        .children_named("rtept")
                        .map(position)
                        .collect::<Result<_>>()?,
                ),
                "trk" => Geometry::LineString(
                    element
                        .children_named("trkseg")
                        .flat_map(|seg| seg.children_named("trkpt"))
                        .map(position)
                        .collect::<Result<_>>()?,
                ),
                _ => continue,
            };
            geometry
                .validate()
                .with_context(|| format!("<{}> element {}", element.name, idx))?;
            records.push(RawRecord::new(geometry, attributes_of(element)));
        }

        debug!(records = records.len(), "Read GPX document");
        Ok(records)
    }
}

impl RecordReader for GPXImporter {
    fn format(&self) -> DataFormat {
        DataFormat::Gpx
    }

    fn read(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, ImportError> {
        self.import(decode_utf8(bytes)?)
    }
}

fn position(point: &XmlElement) -> Result<Coordinate> {
    let ordinate = |name: &str| -> Result<f64> {
        let text = point
            .attribute(name)
            .with_context(|| format!("<{}> is missing the '{}' attribute", point.name, name))?;
        text.trim()
            .parse::<f64>()
            .with_context(|| format!("<{}> has an invalid {} '{}'", point.name, name, text))
    };
    Ok(Coordinate::new(ordinate("lon")?, ordinate("lat")?))
}

fn attributes_of(element: &XmlElement) -> Attributes {
    ATTRIBUTE_ELEMENTS
        .iter()
        .filter_map(|key| {
            element
                .child_text(key)
                .map(|text| (key.to_string(), AttributeValue::from(text)))
        })
        .collect()
}
