//! KML reader.
//!
//! Every `Placemark` in the document becomes one record. Its `name`,
//! `description`, `ExtendedData/Data` values and `SchemaData/SimpleData`
//! values become text attributes.

use super::xml::{XmlElement, parse_document};
use super::{ImportError, RecordReader, decode_utf8};
use crate::models::{AttributeValue, Attributes, Coordinate, DataFormat, Geometry, RawRecord};
use anyhow::{Context, Result, bail};
use tracing::debug;

/// Parser for KML documents.
pub struct KMLImporter;

impl Default for KMLImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl KMLImporter {
    /// Create a new KML reader.
    pub fn new() -> Self {
        Self
    }

    /// Parse KML text into records.
    pub fn import(&self, kml_content: &str) -> Result<Vec<RawRecord>, ImportError> {
        self.parse(kml_content)
            .map_err(|e| ImportError::ParseError(format!("{:#}", e)))
    }

    fn parse(&self, kml_content: &str) -> Result<Vec<RawRecord>> {
        let root = parse_document(kml_content).context("Invalid KML document")?;
        if root.name != "kml" {
            bail!("Expected a <kml> root element, found <{}>", root.name);
        }

        let placemarks = root.descendants("Placemark");
        debug!(placemarks = placemarks.len(), "Reading KML placemarks");

        placemarks
            .into_iter()
            .enumerate()
            .map(|(idx, placemark)| {
                read_placemark(placemark).with_context(|| match placemark.child_text("name") {
                    Some(name) => format!("Placemark {} ('{}')", idx, name),
                    None => format!("Placemark {}", idx),
                })
            })
            .collect()
    }
}

impl RecordReader for KMLImporter {
    fn format(&self) -> DataFormat {
        DataFormat::Kml
    }

    fn read(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, ImportError> {
        self.import(decode_utf8(bytes)?)
    }
}

fn read_placemark(placemark: &XmlElement) -> Result<RawRecord> {
    let mut attributes = Attributes::new();
    for key in ["name", "description"] {
        if let Some(text) = placemark.child_text(key) {
            attributes.insert(key.to_string(), AttributeValue::from(text));
        }
    }

    if let Some(extended) = placemark.child("ExtendedData") {
        for data in extended.children_named("Data") {
            if let (Some(name), Some(value)) = (data.attribute("name"), data.child_text("value")) {
                attributes.insert(name.to_string(), AttributeValue::from(value));
            }
        }
        for schema_data in extended.children_named("SchemaData") {
            for simple in schema_data.children_named("SimpleData") {
                let value = simple.text.trim();
                if let Some(name) = simple.attribute("name")
                    && !value.is_empty()
                {
                    attributes.insert(name.to_string(), AttributeValue::from(value));
                }
            }
        }
    }

    Ok(RawRecord::new(read_geometry(placemark)?, attributes))
}

fn read_geometry(placemark: &XmlElement) -> Result<Geometry> {
    if placemark.child("MultiGeometry").is_some() {
        bail!("MultiGeometry is not supported");
    }

    let geometry = if let Some(point) = placemark.child("Point") {
        let mut positions = coordinates_of(point)?;
        if positions.len() != 1 {
            bail!("Point must have exactly one position, found {}", positions.len());
        }
        Geometry::Point(positions.remove(0))
    } else if let Some(line) = placemark.child("LineString") {
        Geometry::LineString(coordinates_of(line)?)
    } else if let Some(polygon) = placemark.child("Polygon") {
        let outer = polygon
            .child("outerBoundaryIs")
            .and_then(|b| b.child("LinearRing"))
            .context("Polygon has no outer boundary")?;
        let mut rings = vec![coordinates_of(outer)?];
        for inner in polygon.children_named("innerBoundaryIs") {
            for ring in inner.children_named("LinearRing") {
                rings.push(coordinates_of(ring)?);
            }
        }
        Geometry::Polygon(rings)
    } else {
        bail!("no Point, LineString or Polygon geometry");
    };

    geometry.validate()?;
    Ok(geometry)
}

/// Parse a `<coordinates>` child: whitespace-separated `lon,lat[,alt]` tuples
fn coordinates_of(element: &XmlElement) -> Result<Vec<Coordinate>> {
    let text = element
        .child("coordinates")
        .map(|c| c.text.as_str())
        .with_context(|| format!("<{}> has no coordinates", element.name))?;

    text.split_whitespace()
        .map(|tuple| -> Result<Coordinate> {
            let ordinates = tuple
                .split(',')
                .map(|n| n.trim().parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .with_context(|| format!("invalid coordinate '{}'", tuple))?;
            Ok(Coordinate::try_from(ordinates)?)
        })
        .collect()
}
