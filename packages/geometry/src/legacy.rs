//! Structural inference for untagged coordinate arrays.
//!
//! Older community rows store boundaries as bare nested arrays without a
//! `GeoJSON` `type`. The shape is recovered from how deeply the first
//! number is nested, then the whole value is read strictly as that shape.

use serde_json::Value;

use crate::{Geometry, GeometryError, Position, Ring, position_from_slice};

/// Shapes a bare coordinate array can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LegacyShape {
    /// `[[lng, lat], ...]`
    Ring,
    /// `[[[lng, lat], ...], ...]`
    Polygon,
    /// `[[[[lng, lat], ...], ...], ...]`
    MultiPolygon,
}

/// Classifies a value by following first elements down to a number.
pub(crate) fn classify(value: &Value) -> Option<LegacyShape> {
    let mut depth = 0usize;
    let mut current = value;
    while let Value::Array(items) = current {
        depth += 1;
        current = items.first()?;
    }

    if !current.is_number() {
        return None;
    }

    match depth {
        2 => Some(LegacyShape::Ring),
        3 => Some(LegacyShape::Polygon),
        4 => Some(LegacyShape::MultiPolygon),
        _ => None,
    }
}

/// Reads an untagged array as a canonical [`Geometry`].
pub(crate) fn infer(value: &Value) -> Result<Geometry, GeometryError> {
    let shape = classify(value).ok_or(GeometryError::UnrecognizedShape)?;
    log::trace!("Inferred legacy geometry shape {shape:?}");

    match shape {
        LegacyShape::Ring => Ok(Geometry::Polygon(vec![read_ring(value)?])),
        LegacyShape::Polygon => Ok(Geometry::Polygon(read_rings(value)?)),
        LegacyShape::MultiPolygon => Ok(Geometry::MultiPolygon(
            elements(value)?
                .iter()
                .map(read_rings)
                .collect::<Result<_, _>>()?,
        )),
    }
}

fn elements(value: &Value) -> Result<&Vec<Value>, GeometryError> {
    value.as_array().ok_or_else(|| GeometryError::Malformed {
        message: format!("expected an array, found {value}"),
    })
}

fn read_rings(value: &Value) -> Result<Vec<Ring>, GeometryError> {
    elements(value)?.iter().map(read_ring).collect()
}

fn read_ring(value: &Value) -> Result<Ring, GeometryError> {
    elements(value)?.iter().map(read_position).collect()
}

fn read_position(value: &Value) -> Result<Position, GeometryError> {
    let numbers = elements(value)?
        .iter()
        .map(|n| {
            n.as_f64().ok_or_else(|| GeometryError::Malformed {
                message: format!("expected a number, found {n}"),
            })
        })
        .collect::<Result<Vec<f64>, _>>()?;
    position_from_slice(&numbers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_by_depth() {
        assert_eq!(classify(&json!([[1, 2], [3, 4]])), Some(LegacyShape::Ring));
        assert_eq!(classify(&json!([[[1, 2]]])), Some(LegacyShape::Polygon));
        assert_eq!(classify(&json!([[[[1, 2]]]])), Some(LegacyShape::MultiPolygon));
        assert_eq!(classify(&json!([1, 2])), None);
        assert_eq!(classify(&json!([[[[[1, 2]]]]])), None);
        assert_eq!(classify(&json!([[]])), None);
        assert_eq!(classify(&json!([["a", "b"]])), None);
    }

    #[test]
    fn mixed_nesting_is_malformed() {
        assert!(matches!(
            infer(&json!([[0, 0], [1, 1], [[2, 2]]])),
            Err(GeometryError::Malformed { .. })
        ));
        assert!(matches!(
            infer(&json!([[0, 0], [1, "x"]])),
            Err(GeometryError::Malformed { .. })
        ));
    }

    #[test]
    fn multipolygon_keeps_every_part() {
        let geometry = infer(&json!([
            [[[0, 0], [0, 1], [1, 1]]],
            [[[5, 5], [5, 6], [6, 6]], [[5.1, 5.1], [5.1, 5.2], [5.2, 5.2]]]
        ]))
        .unwrap();

        let Geometry::MultiPolygon(parts) = geometry else {
            panic!("expected a multipolygon");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].len(), 2);
    }
}
