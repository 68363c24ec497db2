//! GeoJSON reader.
//!
//! Accepts a `FeatureCollection` or a single `Feature`. Coordinates are taken
//! as WGS84; a legacy `crs` member naming anything else is rejected.

use super::{ImportError, RecordReader, decode_utf8};
use crate::models::{AttributeValue, Attributes, DataFormat, Geometry, RawRecord};
use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Top-level GeoJSON object
#[derive(Debug, Deserialize)]
struct Document {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Option<Vec<Feature>>,
    geometry: Option<Value>,
    properties: Option<IndexMap<String, Value>>,
    crs: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: String,
    geometry: Option<Value>,
    properties: Option<IndexMap<String, Value>>,
}

/// Parser for GeoJSON documents.
pub struct GeoJSONImporter;

impl Default for GeoJSONImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoJSONImporter {
    /// Create a new GeoJSON reader.
    pub fn new() -> Self {
        Self
    }

    /// Parse GeoJSON text into records.
    ///
    /// # Example
    ///
    /// ```rust
    /// use geo_import_sdk::import::geojson::GeoJSONImporter;
    ///
    /// let json = r#"{
    ///   "type": "Feature",
    ///   "geometry": {"type": "Point", "coordinates": [-0.12, 51.5]},
    ///   "properties": {"name": "Oak", "height": 12}
    /// }"#;
    /// let records = GeoJSONImporter::new().import(json).unwrap();
    /// assert_eq!(records.len(), 1);
    /// ```
    pub fn import(&self, json_content: &str) -> Result<Vec<RawRecord>, ImportError> {
        self.parse(json_content)
            .map_err(|e| ImportError::ParseError(format!("{:#}", e)))
    }

    fn parse(&self, json_content: &str) -> Result<Vec<RawRecord>> {
        let document: Document =
            serde_json::from_str(json_content).context("Invalid GeoJSON document")?;

        if let Some(crs) = &document.crs {
            check_crs(crs)?;
        }

        match document.kind.as_str() {
            "FeatureCollection" => {
                let features = document
                    .features
                    .context("FeatureCollection has no 'features' array")?;
                debug!(features = features.len(), "Reading GeoJSON FeatureCollection");
                features
                    .into_iter()
                    .enumerate()
                    .map(|(idx, feature)| {
                        if feature.kind != "Feature" {
                            bail!("Feature {}: expected type 'Feature', found '{}'", idx, feature.kind);
                        }
                        to_record(feature.geometry, feature.properties)
                            .with_context(|| format!("Feature {}", idx))
                    })
                    .collect()
            }
            "Feature" => Ok(vec![to_record(document.geometry, document.properties)?]),
            other => Err(anyhow!(
                "Unsupported GeoJSON type '{}'. Expected a FeatureCollection or a Feature",
                other
            )),
        }
    }
}

impl RecordReader for GeoJSONImporter {
    fn format(&self) -> DataFormat {
        DataFormat::GeoJson
    }

    fn read(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, ImportError> {
        self.import(decode_utf8(bytes)?)
    }
}

fn to_record(
    geometry: Option<Value>,
    properties: Option<IndexMap<String, Value>>,
) -> Result<RawRecord> {
    let geometry = match geometry {
        Some(Value::Null) | None => bail!("feature has no geometry"),
        Some(value) => parse_geometry(value)?,
    };

    let attributes: Attributes = properties
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, AttributeValue::from_json(&value)))
        .collect();

    Ok(RawRecord::new(geometry, attributes))
}

fn parse_geometry(value: Value) -> Result<Geometry> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("<missing>")
        .to_string();
    if !matches!(kind.as_str(), "Point" | "LineString" | "Polygon") {
        bail!("unsupported geometry type '{}'", kind);
    }

    let geometry: Geometry = serde_json::from_value(value)
        .with_context(|| format!("malformed {} coordinates", kind))?;
    geometry.validate()?;
    Ok(geometry)
}

/// Accept only WGS84 names in a legacy `crs` member
fn check_crs(crs: &Value) -> Result<()> {
    let name = crs
        .pointer("/properties/name")
        .and_then(Value::as_str)
        .context("Unsupported 'crs' member: only named WGS84 CRS is accepted")?;

    let upper = name.to_uppercase();
    if upper.ends_with("CRS84") || upper.ends_with("EPSG::4326") || upper.ends_with("EPSG:4326") {
        Ok(())
    } else {
        bail!("Unsupported coordinate reference system '{}'", name)
    }
}
