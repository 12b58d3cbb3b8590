//! The fixed segments of the network which crossings are counted on.
use super::*;
use crate::geometry::{dist, dist_to_piece, midpoint};
use kdtree::KdTree;
use kdtree::distance::squared_euclidean;

/// A fixed length section of the network (e.g. 100 m of canal)
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSegment {
    pub segment_id: String,
    pub coords: Vec<(f64, f64)>,
}

/// Segments, with a k-d tree of their midpoints.
///
/// A route crosses a segment when it passes within the buffer distance of the segment's midpoint
/// (the midpoint along it's length). Using the midpoint, rather than any touch, means a route
/// which stops at the end of one segment doesn't count for the next one.
pub struct SegmentIndex {
    segments: Vec<FixedSegment>,
    /// `None` for segments with no usable geometry
    midpoints: Vec<Option<(f64, f64)>>,
    tree: KdTree<f64, usize, [f64; 2]>,
}

impl SegmentIndex {
    pub fn new(segments: Vec<FixedSegment>) -> Result<Self> {
        let midpoints = segments
            .par_iter()
            .map(|s| {
                if s.coords.iter().all(|c| c.0.is_finite() && c.1.is_finite()) {
                    midpoint(&s.coords)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();
        let mut tree = KdTree::new(2);
        for (idx, mid) in midpoints.iter().enumerate() {
            if let Some(mid) = mid {
                tree.add([mid.0, mid.1], idx).map_err(|e| {
                    anyhow::anyhow!(
                        "Can't index segment {}: {:?}",
                        segments[idx].segment_id,
                        e
                    )
                })?;
            }
        }
        Ok(SegmentIndex {
            segments,
            midpoints,
            tree,
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
    pub fn segments(&self) -> &[FixedSegment] {
        &self.segments
    }
    pub fn midpoint(&self, idx: usize) -> Option<(f64, f64)> {
        self.midpoints[idx]
    }

    /// Indexes of segments with no geometry, which nothing can cross
    pub fn without_geometry(&self) -> impl Iterator<Item = usize> + '_ {
        self.midpoints
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_none())
            .map(|(idx, _)| idx)
    }

    /// Does this route line cross segment `idx`?
    pub fn intersects(&self, coords: &[(f64, f64)], idx: usize, buffer: f64) -> bool {
        self.midpoints[idx].is_some_and(|mid| {
            coords
                .windows(2)
                .any(|pair| dist_to_piece(pair[0], pair[1], mid) <= buffer)
        })
    }

    /// Every segment this route line crosses, each once, in index order.
    pub fn crossed_by(&self, coords: &[(f64, f64)], buffer: f64) -> Vec<usize> {
        let mut crossed = Vec::new();
        if self.tree.size() == 0 {
            return crossed;
        }
        for pair in coords.windows(2) {
            let centre = [(pair[0].0 + pair[1].0) / 2., (pair[0].1 + pair[1].1) / 2.];
            let radius = dist(pair[0], pair[1]) / 2. + buffer;
            let Ok(nearby) = self.tree.within(&centre, radius * radius, &squared_euclidean) else {
                // only possible with a non-finite route coordinate
                continue;
            };
            crossed.extend(nearby.into_iter().map(|(_d, idx)| *idx).filter(|idx| {
                self.midpoints[*idx].is_some_and(|mid| dist_to_piece(pair[0], pair[1], mid) <= buffer)
            }));
        }
        crossed.sort_unstable();
        crossed.dedup();
        crossed
    }
}
