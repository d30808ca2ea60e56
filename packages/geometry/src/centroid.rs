//! Ring area and area-weighted centroid.
//!
//! Rings are treated as cyclic: the edge after the last position closes
//! back to the first, so explicitly closed and open rings give the same
//! area and centroid.

use crate::{GeometryError, Position};

/// Iterates over the edges `(p[i], p[i + 1])` of a cyclic ring.
fn edges(ring: &[Position]) -> impl Iterator<Item = (Position, Position)> + '_ {
    ring.iter()
        .copied()
        .zip(ring.iter().copied().cycle().skip(1))
}

/// Cross product term of the shoelace formula for one edge.
///
/// Both products are rounded separately so that repeated or mirrored
/// positions cancel to exactly zero.
#[allow(clippy::suboptimal_flops)]
fn cross(p: Position, q: Position) -> f64 {
    p.x * q.y - q.x * p.y
}

/// Unsigned area of a ring via the shoelace formula, in squared degrees.
///
/// Rings with fewer than three positions have no area.
#[must_use]
pub fn ring_area(ring: &[Position]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }

    let twice_area: f64 = edges(ring).map(|(p, q)| cross(p, q)).sum();
    twice_area.abs() / 2.0
}

/// Area-weighted centroid of a ring.
///
/// When the signed area is exactly zero (collinear or repeated positions,
/// fewer than three distinct points) the arithmetic mean of the positions
/// is returned instead.
///
/// # Errors
///
/// Returns [`GeometryError::EmptyRing`] for an empty ring and
/// [`GeometryError::NonFinite`] if the result is not finite.
#[allow(
    clippy::float_cmp,
    clippy::cast_precision_loss,
    clippy::suboptimal_flops
)]
pub fn centroid_of_ring(ring: &[Position]) -> Result<Position, GeometryError> {
    if ring.is_empty() {
        return Err(GeometryError::EmptyRing);
    }

    let mut twice_area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (p, q) in edges(ring) {
        let c = cross(p, q);
        twice_area += c;
        cx += (p.x + q.x) * c;
        cy += (p.y + q.y) * c;
    }
    let area = twice_area / 2.0;

    let centroid = if area == 0.0 {
        let n = ring.len() as f64;
        let (sum_x, sum_y) = ring
            .iter()
            .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
        geo::coord! { x: sum_x / n, y: sum_y / n }
    } else {
        geo::coord! { x: cx / (6.0 * area), y: cy / (6.0 * area) }
    };

    if centroid.x.is_finite() && centroid.y.is_finite() {
        Ok(centroid)
    } else {
        Err(GeometryError::NonFinite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(points: &[(f64, f64)]) -> Vec<Position> {
        points.iter().map(|&(x, y)| geo::coord! { x: x, y: y }).collect()
    }

    #[test]
    fn square_centroid_and_area() {
        let square = ring(&[(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0)]);
        let c = centroid_of_ring(&square).unwrap();
        assert!((c.x - 1.0).abs() < 1e-12);
        assert!((c.y - 1.0).abs() < 1e-12);
        assert!((ring_area(&square) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn closed_ring_matches_open_ring() {
        let open = ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 3.0)]);
        let closed = ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 0.0)]);
        assert_eq!(ring_area(&open), ring_area(&closed));

        let a = centroid_of_ring(&open).unwrap();
        let b = centroid_of_ring(&closed).unwrap();
        assert!((a.x - b.x).abs() < 1e-12);
        assert!((a.y - b.y).abs() < 1e-12);
        assert!((a.x - 8.0 / 3.0).abs() < 1e-12);
        assert!((a.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn winding_order_does_not_matter() {
        let cw = ring(&[(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0)]);
        let ccw = ring(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]);
        assert_eq!(ring_area(&cw), ring_area(&ccw));
        assert_eq!(centroid_of_ring(&cw), centroid_of_ring(&ccw));
    }

    #[test]
    fn degenerate_ring_falls_back_to_mean() {
        let same = ring(&[(3.0, 4.0), (3.0, 4.0), (3.0, 4.0)]);
        assert_eq!(centroid_of_ring(&same), Ok(geo::coord! { x: 3.0, y: 4.0 }));

        let collinear = ring(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (5.0, 5.0)]);
        assert_eq!(centroid_of_ring(&collinear), Ok(geo::coord! { x: 2.0, y: 2.0 }));
        assert_eq!(ring_area(&collinear), 0.0);
    }

    #[test]
    fn repeated_decimal_position_falls_back_to_mean() {
        let p = (-103.35, 20.67);
        let same = ring(&[p, p, p]);
        assert_eq!(ring_area(&same), 0.0);

        let c = centroid_of_ring(&same).unwrap();
        assert!((c.x - p.0).abs() < 1e-9, "{c:?}");
        assert!((c.y - p.1).abs() < 1e-9, "{c:?}");
    }

    #[test]
    fn collinear_decimal_ring_falls_back_to_mean() {
        let collinear = ring(&[(0.1, 0.1), (0.2, 0.2), (0.3, 0.3)]);
        assert_eq!(ring_area(&collinear), 0.0);

        let c = centroid_of_ring(&collinear).unwrap();
        assert!((c.x - 0.2).abs() < 1e-12, "{c:?}");
        assert!((c.y - 0.2).abs() < 1e-12, "{c:?}");
    }

    #[test]
    fn short_rings() {
        let single = ring(&[(7.0, -3.0)]);
        assert_eq!(centroid_of_ring(&single), Ok(geo::coord! { x: 7.0, y: -3.0 }));
        assert_eq!(ring_area(&single), 0.0);

        let pair = ring(&[(0.0, 0.0), (2.0, 4.0)]);
        assert_eq!(centroid_of_ring(&pair), Ok(geo::coord! { x: 1.0, y: 2.0 }));
        assert_eq!(ring_area(&pair), 0.0);

        assert_eq!(centroid_of_ring(&[]), Err(GeometryError::EmptyRing));
    }
}
