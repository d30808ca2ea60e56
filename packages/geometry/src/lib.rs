#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry utilities for community mapping and recommendation.
//!
//! Community boundaries are stored as `GeoJSON`-like values. Newer rows
//! carry a proper tagged geometry (`{"type": "Polygon", ...}`), older rows
//! hold bare nested coordinate arrays with no `type`. Both forms are
//! converted into the canonical [`Geometry`] union by [`Geometry::from_json`]
//! and everything downstream only deals with that union.
//!
//! Positions are `(longitude, latitude)` in degrees, stored as
//! [`geo::Coord`] with `x = longitude` and `y = latitude`.

mod centroid;
mod distance;
mod legacy;

pub use centroid::{centroid_of_ring, ring_area};
pub use distance::{EARTH_RADIUS_KM, haversine_km};

use serde_json::Value;
use thiserror::Error;

/// A single `(longitude, latitude)` position in degrees.
pub type Position = geo::Coord<f64>;

/// An ordered sequence of positions, treated as cyclic.
pub type Ring = Vec<Position>;

/// Errors produced when a value cannot be interpreted as a usable geometry.
///
/// These are values, not panics: callers decide whether an invalid
/// geometry fails a request or is simply skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Value is neither a tagged geometry nor a recognizable coordinate
    /// nesting.
    #[error("Unrecognized geometry shape")]
    UnrecognizedShape,

    /// Tagged geometry with a type other than Point, Polygon or
    /// `MultiPolygon`.
    #[error("Unsupported geometry type: {type_name}")]
    UnsupportedType {
        /// The `type` discriminator that was found.
        type_name: String,
    },

    /// Coordinates did not match the structure implied by the type.
    #[error("Malformed geometry: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },

    /// A ring with no positions, or a polygon or multipolygon with no
    /// rings to take one from.
    #[error("Geometry has an empty ring")]
    EmptyRing,

    /// A position outside longitude [-180, 180] or latitude [-90, 90].
    #[error("Position out of range: ({lng}, {lat})")]
    OutOfRange {
        /// Longitude as given.
        lng: f64,
        /// Latitude as given.
        lat: f64,
    },

    /// Evaluation produced a NaN or infinite coordinate.
    #[error("Geometry evaluation produced a non-finite value")]
    NonFinite,
}

/// Canonical tagged geometry.
///
/// Only the first ring of a polygon (the outer boundary) takes part in
/// centroid and area computations; holes are carried but ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// A single position.
    Point(Position),
    /// Outer ring followed by any holes.
    Polygon(Vec<Ring>),
    /// A collection of polygons.
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// Interprets a JSON value as a geometry.
    ///
    /// Objects carrying a `type` discriminator are read as `GeoJSON`.
    /// Bare arrays are classified by nesting depth: four levels is a
    /// `MultiPolygon`, three a `Polygon`, two a single ring (read as a
    /// one-ring `Polygon`).
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the value is not a recognizable Point,
    /// Polygon or `MultiPolygon`, or any position is non-finite or out of
    /// range.
    pub fn from_json(value: &Value) -> Result<Self, GeometryError> {
        match value {
            Value::Object(object) if object.contains_key("type") => Self::from_tagged(value),
            Value::Array(_) => legacy::infer(value),
            _ => Err(GeometryError::UnrecognizedShape),
        }
    }

    fn from_tagged(value: &Value) -> Result<Self, GeometryError> {
        let geometry = geojson::Geometry::from_json_value(value.clone()).map_err(|e| {
            GeometryError::Malformed {
                message: e.to_string(),
            }
        })?;

        match geometry.value {
            geojson::Value::Point(position) => Ok(Self::Point(position_from_slice(&position)?)),
            geojson::Value::Polygon(rings) => Ok(Self::Polygon(rings_from_nested(&rings)?)),
            geojson::Value::MultiPolygon(polygons) => Ok(Self::MultiPolygon(
                polygons
                    .iter()
                    .map(|rings| rings_from_nested(rings))
                    .collect::<Result<_, _>>()?,
            )),
            _ => Err(GeometryError::UnsupportedType {
                type_name: value
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
        }
    }

    /// The `GeoJSON` type name of this geometry.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Point(_) => "Point",
            Self::Polygon(_) => "Polygon",
            Self::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Computes the representative center of this geometry.
    ///
    /// * Point: the point itself.
    /// * Polygon: area-weighted centroid of the outer ring.
    /// * `MultiPolygon`: centroid of the sub-polygon whose outer ring has
    ///   the largest area. On equal areas the first one wins.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::EmptyRing`] for polygons without rings or
    /// empty multipolygons, and [`GeometryError::NonFinite`] if the
    /// arithmetic does not produce a finite position.
    pub fn centroid(&self) -> Result<Position, GeometryError> {
        match self {
            Self::Point(position) => Ok(*position),
            Self::Polygon(rings) => centroid_of_ring(outer_ring(rings)?),
            Self::MultiPolygon(polygons) => {
                let mut largest: Option<(f64, &[Position])> = None;
                for rings in polygons {
                    let outer = outer_ring(rings)?;
                    let area = ring_area(outer);
                    if largest.is_none_or(|(best, _)| area > best) {
                        largest = Some((area, outer));
                    }
                }
                let (_, outer) = largest.ok_or(GeometryError::EmptyRing)?;
                centroid_of_ring(outer)
            }
        }
    }
}

/// Parses a JSON value and returns its centroid in one step.
///
/// # Errors
///
/// Returns [`GeometryError`] if the value is not a usable geometry. See
/// [`Geometry::from_json`] and [`Geometry::centroid`].
pub fn centroid_of(value: &Value) -> Result<Position, GeometryError> {
    Geometry::from_json(value)?.centroid()
}

/// Renders a stored geometry value as a tagged `GeoJSON` geometry.
///
/// Tagged objects are returned unchanged. Bare coordinate arrays are
/// wrapped with the type inferred from their nesting; arrays that cannot
/// be classified are wrapped as a `Polygon` so clients still receive a
/// well-formed envelope. `null` stays `null`.
#[must_use]
pub fn to_geojson(value: &Value) -> Value {
    match value {
        Value::Null | Value::Object(_) => value.clone(),
        _ => match legacy::classify(value) {
            Some(legacy::LegacyShape::MultiPolygon) => serde_json::json!({
                "type": "MultiPolygon",
                "coordinates": value,
            }),
            Some(legacy::LegacyShape::Ring) => serde_json::json!({
                "type": "Polygon",
                "coordinates": [value],
            }),
            Some(legacy::LegacyShape::Polygon) | None => serde_json::json!({
                "type": "Polygon",
                "coordinates": value,
            }),
        },
    }
}

fn outer_ring(rings: &[Ring]) -> Result<&[Position], GeometryError> {
    rings.first().map(Vec::as_slice).ok_or(GeometryError::EmptyRing)
}

fn rings_from_nested(rings: &[Vec<Vec<f64>>]) -> Result<Vec<Ring>, GeometryError> {
    rings
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|position| position_from_slice(position))
                .collect()
        })
        .collect()
}

/// Builds a position from `[lng, lat, ...]`, ignoring any altitude.
pub(crate) fn position_from_slice(values: &[f64]) -> Result<Position, GeometryError> {
    let &[lng, lat, ..] = values else {
        return Err(GeometryError::Malformed {
            message: format!("position needs 2 coordinates, got {}", values.len()),
        });
    };

    if !lng.is_finite() || !lat.is_finite() {
        return Err(GeometryError::NonFinite);
    }
    if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
        return Err(GeometryError::OutOfRange { lng, lat });
    }

    Ok(geo::coord! { x: lng, y: lat })
}
