//! Well-known text geometry parser.
//!
//! Supports the geometry types a staged feature can hold: `POINT`,
//! `LINESTRING` and `POLYGON`. Keywords are case-insensitive, `Z`/`M`/`ZM`
//! dimension markers are accepted and extra ordinates dropped. An EWKT
//! `SRID=4326;` prefix is accepted; any other SRID is rejected because
//! coordinates are never reprojected.

use crate::models::{Coordinate, Geometry, GeometryError};
use thiserror::Error;

/// Errors raised while parsing WKT
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WktError {
    #[error("Empty geometry text")]
    Empty,
    #[error("Unsupported geometry type: {0}")]
    UnsupportedType(String),
    #[error("Unsupported SRID: {0} (only 4326 is accepted)")]
    UnsupportedSrid(String),
    #[error("Malformed WKT: {0}")]
    Malformed(String),
    #[error("Invalid number in WKT: {0}")]
    InvalidNumber(String),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Parse a WKT string into a validated geometry.
///
/// # Example
///
/// ```rust
/// use geo_import_sdk::import::wkt::parse_wkt;
/// use geo_import_sdk::models::Geometry;
///
/// let geometry = parse_wkt("point z (30 10 5)").unwrap();
/// assert_eq!(geometry, Geometry::point(30.0, 10.0).unwrap());
/// ```
pub fn parse_wkt(text: &str) -> Result<Geometry, WktError> {
    let mut text = text.trim();
    if text.is_empty() {
        return Err(WktError::Empty);
    }

    if let Some(prefix) = text.get(..5)
        && prefix.eq_ignore_ascii_case("SRID=")
    {
        let (srid, rest) = text[5..]
            .split_once(';')
            .ok_or_else(|| WktError::Malformed("SRID prefix without ';'".to_string()))?;
        if srid.trim() != "4326" {
            return Err(WktError::UnsupportedSrid(srid.trim().to_string()));
        }
        text = rest.trim();
    }

    if text.to_uppercase().ends_with("EMPTY") {
        return Err(WktError::Empty);
    }

    let open = text
        .find('(')
        .ok_or_else(|| WktError::Malformed(format!("missing '(' in '{}'", text)))?;
    let mut head = text[..open].split_whitespace();
    let kind = head
        .next()
        .ok_or_else(|| WktError::Malformed("missing geometry type".to_string()))?
        .to_uppercase();
    if let Some(dimension) = head.next()
        && !matches!(dimension.to_uppercase().as_str(), "Z" | "M" | "ZM")
    {
        return Err(WktError::Malformed(format!(
            "unexpected token '{}' after {}",
            dimension, kind
        )));
    }

    let body = strip_parens(&text[open..])?;
    let geometry = match kind.as_str() {
        "POINT" => Geometry::Point(parse_position(body)?),
        "LINESTRING" => Geometry::LineString(parse_positions(body)?),
        "POLYGON" => Geometry::Polygon(
            split_groups(body)?
                .into_iter()
                .map(parse_positions)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        other => return Err(WktError::UnsupportedType(other.to_string())),
    };

    geometry.validate()?;
    Ok(geometry)
}

/// Remove one pair of enclosing parentheses
fn strip_parens(text: &str) -> Result<&str, WktError> {
    let text = text.trim();
    text.strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .map(str::trim)
        .ok_or_else(|| WktError::Malformed(format!("unbalanced parentheses in '{}'", text)))
}

/// Split `(a), (b)` into the inner texts `a` and `b`
fn split_groups(text: &str) -> Result<Vec<&str>, WktError> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in text.char_indices() {
        match c {
            '(' => {
                if depth == 0 {
                    start = Some(i + 1);
                }
                depth += 1;
            }
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| WktError::Malformed("unexpected ')'".to_string()))?;
                if depth == 0
                    && let Some(s) = start.take()
                {
                    groups.push(&text[s..i]);
                }
            }
            ',' | ' ' | '\t' | '\n' | '\r' => {}
            _ if depth == 0 => {
                return Err(WktError::Malformed(format!(
                    "unexpected '{}' between rings",
                    c
                )));
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(WktError::Malformed("unclosed ring".to_string()));
    }
    Ok(groups)
}

fn parse_positions(text: &str) -> Result<Vec<Coordinate>, WktError> {
    text.split(',').map(parse_position).collect()
}

fn parse_position(text: &str) -> Result<Coordinate, WktError> {
    let ordinates = text
        .split_whitespace()
        .map(|n| {
            n.parse::<f64>()
                .map_err(|_| WktError::InvalidNumber(n.to_string()))
        })
        .collect::<Result<Vec<f64>, _>>()?;
    Ok(Coordinate::try_from(ordinates)?)
}
