//! Geometry model
//!
//! Staged features carry a single WGS84 geometry. Readers never reproject:
//! every supported input format is WGS84 by definition, so normalization is
//! limited to validating that coordinates are finite and in range.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised when a geometry is structurally invalid
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum GeometryError {
    #[error("Coordinate is not finite: ({lon}, {lat})")]
    NotFinite { lon: f64, lat: f64 },
    #[error("Longitude out of range [-180, 180]: {0}")]
    LongitudeOutOfRange(f64),
    #[error("Latitude out of range [-90, 90]: {0}")]
    LatitudeOutOfRange(f64),
    #[error("Line string needs at least 2 positions, got {0}")]
    LineTooShort(usize),
    #[error("Polygon needs at least one ring")]
    EmptyPolygon,
    #[error("Polygon ring needs at least 4 positions, got {0}")]
    RingTooShort(usize),
    #[error("Polygon ring is not closed")]
    RingNotClosed,
    #[error("Position needs at least 2 ordinates, got {0}")]
    TooFewOrdinates(usize),
}

/// A WGS84 position, longitude first (GeoJSON axis order)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 2]", try_from = "Vec<f64>")]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Check that the position is finite and inside WGS84 bounds
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !self.lon.is_finite() || !self.lat.is_finite() {
            return Err(GeometryError::NotFinite {
                lon: self.lon,
                lat: self.lat,
            });
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(GeometryError::LongitudeOutOfRange(self.lon));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(GeometryError::LatitudeOutOfRange(self.lat));
        }
        Ok(())
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.lon, c.lat]
    }
}

impl TryFrom<Vec<f64>> for Coordinate {
    type Error = GeometryError;

    /// Extra ordinates (altitude, measure) are dropped.
    fn try_from(ordinates: Vec<f64>) -> Result<Self, Self::Error> {
        match ordinates.as_slice() {
            [lon, lat, ..] => Ok(Coordinate::new(*lon, *lat)),
            _ => Err(GeometryError::TooFewOrdinates(ordinates.len())),
        }
    }
}

/// Feature geometry
///
/// Serializes as a GeoJSON geometry object.
///
/// # Example
///
/// ```rust
/// use geo_import_sdk::models::Geometry;
///
/// let point = Geometry::point(-0.1276, 51.5072).unwrap();
/// assert_eq!(point.to_wkt(), "POINT (-0.1276 51.5072)");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coordinate),
    LineString(Vec<Coordinate>),
    Polygon(Vec<Vec<Coordinate>>),
}

impl Geometry {
    /// Build a validated point
    pub fn point(lon: f64, lat: f64) -> Result<Self, GeometryError> {
        let geometry = Geometry::Point(Coordinate::new(lon, lat));
        geometry.validate()?;
        Ok(geometry)
    }

    /// Build a validated line string
    pub fn line_string(positions: Vec<Coordinate>) -> Result<Self, GeometryError> {
        let geometry = Geometry::LineString(positions);
        geometry.validate()?;
        Ok(geometry)
    }

    /// Build a validated polygon (first ring is the exterior)
    pub fn polygon(rings: Vec<Vec<Coordinate>>) -> Result<Self, GeometryError> {
        let geometry = Geometry::Polygon(rings);
        geometry.validate()?;
        Ok(geometry)
    }

    /// Geometry type name as used by GeoJSON
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
        }
    }

    /// Structural validation of the geometry
    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            Geometry::Point(c) => c.validate(),
            Geometry::LineString(positions) => {
                if positions.len() < 2 {
                    return Err(GeometryError::LineTooShort(positions.len()));
                }
                positions.iter().try_for_each(Coordinate::validate)
            }
            Geometry::Polygon(rings) => {
                if rings.is_empty() {
                    return Err(GeometryError::EmptyPolygon);
                }
                for ring in rings {
                    if ring.len() < 4 {
                        return Err(GeometryError::RingTooShort(ring.len()));
                    }
                    if ring.first() != ring.last() {
                        return Err(GeometryError::RingNotClosed);
                    }
                    ring.iter().try_for_each(Coordinate::validate)?;
                }
                Ok(())
            }
        }
    }

    /// Render the geometry as well-known text
    pub fn to_wkt(&self) -> String {
        fn positions(coords: &[Coordinate]) -> String {
            coords
                .iter()
                .map(|c| format!("{} {}", c.lon, c.lat))
                .collect::<Vec<_>>()
                .join(", ")
        }

        match self {
            Geometry::Point(c) => format!("POINT ({} {})", c.lon, c.lat),
            Geometry::LineString(coords) => format!("LINESTRING ({})", positions(coords)),
            Geometry::Polygon(rings) => {
                let rings: Vec<String> = rings
                    .iter()
                    .map(|r| format!("({})", positions(r)))
                    .collect();
                format!("POLYGON ({})", rings.join(", "))
            }
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wkt())
    }
}
