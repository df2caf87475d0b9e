//! Polyline simplification (Ramer–Douglas–Peucker).
//!
//! Used by authoring tools to thin out hand-drawn strokes and motion paths.

use crate::math::Point2D;

/// Distance from `point` to the infinite line through `start` and `end`.
///
/// A zero-length chord has no direction, so the distance to `start` is used.
pub fn perpendicular_distance(point: &Point2D, start: &Point2D, end: &Point2D) -> f64 {
    let chord = start.distance(end);
    if chord <= f64::EPSILON {
        return point.distance(start);
    }
    let numerator = (end.y - start.y) * point.x - (end.x - start.x) * point.y
        + end.x * start.y
        - end.y * start.x;
    numerator.abs() / chord
}

/// Reduce `points` to a polyline that stays within `tolerance` of the input.
///
/// Endpoints are always kept and inputs with fewer than three points come
/// back unchanged, as does a tolerance of zero or less.
pub fn simplify(points: &[Point2D], tolerance: f64) -> Vec<Point2D> {
    if points.len() < 3 || tolerance <= 0.0 {
        return points.to_vec();
    }

    // Pending (first, last) index ranges.
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    let mut ranges = vec![(0, points.len() - 1)];

    while let Some((first, last)) = ranges.pop() {
        if last - first < 2 {
            continue;
        }
        let mut max_distance = 0.0;
        let mut split = first + 1;
        for (i, point) in points.iter().enumerate().take(last).skip(first + 1) {
            let distance = perpendicular_distance(point, &points[first], &points[last]);
            if distance > max_distance {
                max_distance = distance;
                split = i;
            }
        }
        if max_distance < tolerance {
            continue;
        }
        keep[split] = true;
        ranges.push((split, last));
        ranges.push((first, split));
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(point, kept)| kept.then_some(*point))
        .collect()
}
