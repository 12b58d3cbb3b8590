//! Planar geometry on projected coordinates (e.g. British National Grid metres).
use geo::{Closest, ClosestPoint, Distance, Euclidean, Line, Point, coord};

pub fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    Euclidean.distance(Point::new(a.0, a.1), Point::new(b.0, b.1))
}

pub fn polyline_length(coords: &[(f64, f64)]) -> f64 {
    coords.windows(2).map(|pair| dist(pair[0], pair[1])).sum()
}

/// Closest point to `p` on the straight piece `a`→`b`.
pub fn closest_on_piece(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> (f64, f64) {
    let line = Line::new(coord! { x: a.0, y: a.1 }, coord! { x: b.0, y: b.1 });
    match line.closest_point(&Point::new(p.0, p.1)) {
        Closest::Intersection(c) | Closest::SinglePoint(c) => (c.x(), c.y()),
        // only for a zero length piece
        Closest::Indeterminate => a,
    }
}

pub fn dist_to_piece(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> f64 {
    dist(p, closest_on_piece(a, b, p))
}

/// Where a point lands on a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// The closest point on the polyline
    pub point: (f64, f64),
    /// Distance from the query point to `point`
    pub offset: f64,
    /// Distance along the polyline from its first vertex to `point`
    pub along: f64,
}

/// Project `p` onto the polyline. `None` for a polyline with fewer than 2 vertexes.
pub fn project_onto_polyline(coords: &[(f64, f64)], p: (f64, f64)) -> Option<Projection> {
    let mut best: Option<Projection> = None;
    let mut travelled = 0.;
    for pair in coords.windows(2) {
        let closest = closest_on_piece(pair[0], pair[1], p);
        let offset = dist(p, closest);
        if best.is_none_or(|b| offset < b.offset) {
            best = Some(Projection {
                point: closest,
                offset,
                along: travelled + dist(pair[0], closest),
            });
        }
        travelled += dist(pair[0], pair[1]);
    }
    best
}

/// The point `along` units from the start of the polyline. Clamped to the ends. `None` for an
/// empty polyline.
pub fn point_along(coords: &[(f64, f64)], along: f64) -> Option<(f64, f64)> {
    let mut travelled = 0.;
    for pair in coords.windows(2) {
        let piece_len = dist(pair[0], pair[1]);
        if piece_len > 0. && along <= travelled + piece_len {
            let t = ((along - travelled) / piece_len).clamp(0., 1.);
            return Some((
                pair[0].0 + t * (pair[1].0 - pair[0].0),
                pair[0].1 + t * (pair[1].1 - pair[0].1),
            ));
        }
        travelled += piece_len;
    }
    coords.last().copied()
}

/// The part of the polyline between 2 along-distances. If `start > end` the result runs
/// backwards. Consecutive duplicate vertexes are removed, so a zero length part is one vertex.
/// Empty for an empty polyline.
pub fn sub_polyline(coords: &[(f64, f64)], start: f64, end: f64) -> Vec<(f64, f64)> {
    if start > end {
        let mut result = sub_polyline(coords, end, start);
        result.reverse();
        return result;
    }
    let (Some(first), Some(last)) = (point_along(coords, start), point_along(coords, end)) else {
        return vec![];
    };
    let mut result = Vec::with_capacity(coords.len());
    result.push(first);
    let mut travelled = 0.;
    for pair in coords.windows(2) {
        travelled += dist(pair[0], pair[1]);
        if travelled > start && travelled < end {
            result.push(pair[1]);
        }
    }
    result.push(last);
    result.dedup();
    result
}

/// Midpoint along the polyline's length (not the centroid)
pub fn midpoint(coords: &[(f64, f64)]) -> Option<(f64, f64)> {
    if coords.len() < 2 {
        return None;
    }
    point_along(coords, polyline_length(coords) / 2.)
}
