//! Counting how many routes cross each fixed segment
use super::*;
use crate::pairs::RouteId;
use crate::route::Route;
use crate::geometry::polyline_length;
use crate::graph::{EdgeId, UndirectedAdjGraph, VertexId};
use crate::network::vertex_at;
use crate::segments::SegmentIndex;
use kdtree::KdTree;
use std::collections::BTreeMap;

pub const DEFAULT_MIDPOINT_BUFFER: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityOptions {
    /// How close a route must pass to a segment's midpoint to cross it
    pub midpoint_buffer: f64,
}

impl Default for DensityOptions {
    fn default() -> Self {
        DensityOptions {
            midpoint_buffer: DEFAULT_MIDPOINT_BUFFER,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DensityRecord {
    pub segment_id: String,
    pub crossing_count: u64,
}

/// Data problems found while aggregating. Reported, not fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntegrityIssue {
    #[error("segment {segment_id} has no geometry, and can't be crossed")]
    SegmentWithoutGeometry { segment_id: String },
    #[error("route {route_id} (craft {entity_id}, notification {notification}) has no path")]
    RouteWithoutPath {
        route_id: RouteId,
        entity_id: i64,
        notification: i64,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DensityMap {
    /// One per segment, in the same order as the segments
    pub records: Vec<DensityRecord>,
    pub issues: Vec<IntegrityIssue>,
}

impl DensityMap {
    pub fn get(&self, segment_id: &str) -> Option<u64> {
        self.records
            .iter()
            .find(|r| r.segment_id == segment_id)
            .map(|r| r.crossing_count)
    }

    pub fn total_crossings(&self) -> u64 {
        self.records.iter().map(|r| r.crossing_count).sum()
    }
}

/// Count, for every segment, the number of routes which cross it.
///
/// A route which goes back & forth over a segment only counts once for it. Every segment gets a
/// record, even when no route crosses it. The routes aren't changed, so running this again gives
/// the same result.
pub fn aggregate_density(
    routes: &[Route],
    segments: &SegmentIndex,
    options: &DensityOptions,
    progress: &ProgressBar,
) -> DensityMap {
    let num_segments = segments.len();
    let counts = routes
        .par_iter()
        .filter(|r| !r.path.is_empty() && r.coords.len() >= 2)
        .fold(
            || vec![0u64; num_segments],
            |mut counts, route| {
                for idx in segments.crossed_by(&route.coords, options.midpoint_buffer) {
                    counts[idx] += 1;
                }
                progress.inc(1);
                counts
            },
        )
        .reduce(
            || vec![0u64; num_segments],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                a
            },
        );

    let mut issues = segments
        .without_geometry()
        .map(|idx| IntegrityIssue::SegmentWithoutGeometry {
            segment_id: segments.segments()[idx].segment_id.clone(),
        })
        .collect::<Vec<_>>();
    issues.extend(
        routes
            .iter()
            .filter(|r| r.path.is_empty() || r.coords.len() < 2)
            .map(|r| IntegrityIssue::RouteWithoutPath {
                route_id: r.route_id,
                entity_id: r.entity_id,
                notification: r.notification,
            }),
    );
    for issue in issues.iter() {
        warn!("{}", issue);
    }

    let records = segments
        .segments()
        .iter()
        .zip(counts)
        .map(|(seg, crossing_count)| DensityRecord {
            segment_id: seg.segment_id.clone(),
            crossing_count,
        })
        .collect::<Vec<_>>();

    debug!(
        "{} crossings over {} segments, {} with no crossings",
        records
            .iter()
            .map(|r| r.crossing_count)
            .sum::<u64>()
            .to_formatted_string(&Locale::en),
        records.len().to_formatted_string(&Locale::en),
        records
            .iter()
            .filter(|r| r.crossing_count == 0)
            .count()
            .to_formatted_string(&Locale::en),
    );

    DensityMap { records, issues }
}

/// Segment ends closer than this are joined when dissolving
pub const DISSOLVE_JOIN_TOLERANCE: f64 = 0.01;

/// A run of touching segments which all have the same crossing count
#[derive(Debug, Clone, PartialEq)]
pub struct DissolvedDensity {
    pub crossing_count: u64,
    pub num_segments: usize,
    pub coords: Vec<(f64, f64)>,
}

/// Merge touching segments with the same crossing count into single lines, lowest count first.
///
/// Segments are joined end to end through points where exactly 2 of them meet. Where 3 or more
/// meet (a junction) each branch is a separate line. Segments without geometry are left out.
pub fn dissolve(density: &DensityMap, segments: &SegmentIndex) -> Result<Vec<DissolvedDensity>> {
    let mut by_count: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (idx, record) in density.records.iter().enumerate() {
        if idx < segments.len() && segments.midpoint(idx).is_some() {
            by_count.entry(record.crossing_count).or_default().push(idx);
        }
    }

    let mut dissolved = Vec::new();
    for (crossing_count, seg_idxs) in by_count {
        for (num_segments, coords) in join_segments(segments, &seg_idxs)? {
            dissolved.push(DissolvedDensity {
                crossing_count,
                num_segments,
                coords,
            });
        }
    }
    Ok(dissolved)
}

/// Join these segments into chains. Returns the number of segments & the line of each chain.
fn join_segments(
    segments: &SegmentIndex,
    seg_idxs: &[usize],
) -> Result<Vec<(usize, Vec<(f64, f64)>)>> {
    let merge_tol_2 = DISSOLVE_JOIN_TOLERANCE.powi(2);
    let mut vertex_tree: KdTree<f64, VertexId, [f64; 2]> = KdTree::new(2);
    let mut vertex_pos = Vec::new();
    let mut graph = UndirectedAdjGraph::new();
    // graph edge id → segment
    let mut edge_segment = Vec::with_capacity(seg_idxs.len());
    for &idx in seg_idxs {
        let coords = &segments.segments()[idx].coords;
        let (first, last) = (coords[0], coords[coords.len() - 1]);
        let a = vertex_at(first, merge_tol_2, &mut vertex_tree, &mut vertex_pos, &mut graph)?;
        let b = vertex_at(last, merge_tol_2, &mut vertex_tree, &mut vertex_pos, &mut graph)?;
        graph.add_edge(a, b, polyline_length(coords));
        edge_segment.push(idx);
    }

    let mut used = vec![false; graph.num_edges()];
    let mut chains = Vec::new();
    let mut walk = |start: VertexId, first_edge: EdgeId, used: &mut [bool]| {
        let mut coords: Vec<(f64, f64)> = Vec::new();
        let mut num_segments = 0;
        let mut curr = start;
        let mut next_edge = Some(first_edge);
        while let Some(edge_id) = next_edge {
            used[edge_id] = true;
            num_segments += 1;
            let Some((a, b, _len)) = graph.edge(edge_id) else {
                break;
            };
            let seg = &segments.segments()[edge_segment[edge_id]].coords;
            let skip = usize::from(!coords.is_empty());
            if curr == a {
                coords.extend(seg.iter().skip(skip));
                curr = b;
            } else {
                coords.extend(seg.iter().rev().skip(skip));
                curr = a;
            }
            next_edge = if curr != start && graph.num_neighbours(curr) == 2 {
                graph
                    .neighbours(curr)
                    .map(|(_other, eid, _w)| eid)
                    .find(|eid| !used[*eid])
            } else {
                None
            };
        }
        chains.push((num_segments, coords));
    };

    // Chains start at ends & junctions
    for v in 0..graph.num_vertexes() {
        if graph.num_neighbours(v) == 2 {
            continue;
        }
        let edges = graph.neighbours(v).map(|(_o, eid, _w)| eid).collect::<Vec<_>>();
        for eid in edges {
            if !used[eid] {
                walk(v, eid, &mut used);
            }
        }
    }
    // Whatever's left is a ring
    for eid in 0..graph.num_edges() {
        if !used[eid] {
            if let Some((a, _b, _len)) = graph.edge(eid) {
                walk(a, eid, &mut used);
            }
        }
    }

    Ok(chains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dij::Traversal;
    use crate::segments::FixedSegment;
    use chrono::NaiveDate;
    use indicatif::ProgressDrawTarget;

    fn segments() -> SegmentIndex {
        SegmentIndex::new(
            (0..5)
                .map(|i| FixedSegment {
                    segment_id: format!("S{}", i),
                    coords: vec![(i as f64 * 100., 0.), ((i + 1) as f64 * 100., 0.)],
                })
                .chain(std::iter::once(FixedSegment {
                    segment_id: "broken".into(),
                    coords: vec![(f64::NAN, 0.), (1., 0.)],
                }))
                .collect(),
        )
        .unwrap()
    }

    fn route(route_id: RouteId, coords: Vec<(f64, f64)>) -> Route {
        let date = NaiveDate::from_ymd_opt(2016, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Route {
            route_id,
            entity_id: route_id as i64,
            notification: 1,
            end_notification: 2,
            date,
            end_date: date,
            path: vec![Traversal {
                edge: 0,
                from_along: 0.,
                to_along: 1.,
            }],
            length: crate::geometry::polyline_length(&coords),
            coords,
        }
    }

    fn aggregate(routes: &[Route]) -> DensityMap {
        let progress = ProgressBar::with_draw_target(
            Some(routes.len() as u64),
            ProgressDrawTarget::hidden(),
        );
        aggregate_density(routes, &segments(), &DensityOptions::default(), &progress)
    }

    fn counts(map: &DensityMap) -> Vec<u64> {
        map.records.iter().map(|r| r.crossing_count).collect()
    }

    #[test]
    fn two_routes_over_one_segment() {
        let map = aggregate(&[
            route(1, vec![(10., 0.), (190., 0.)]),
            route(2, vec![(120., 0.), (380., 0.)]),
        ]);
        assert_eq!(counts(&map), vec![1, 2, 1, 1, 0, 0]);
        assert_eq!(map.get("S1"), Some(2));
        assert_eq!(map.total_crossings(), 5);
    }

    #[test]
    fn backtracking_counts_once() {
        let map = aggregate(&[route(
            1,
            vec![(110., 0.), (190., 0.), (110., 0.), (190., 0.)],
        )]);
        assert_eq!(counts(&map), vec![0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn no_routes() {
        let map = aggregate(&[]);
        assert_eq!(map.records.len(), 6);
        assert!(map.records.iter().all(|r| r.crossing_count == 0));
        assert_eq!(
            map.issues,
            vec![IntegrityIssue::SegmentWithoutGeometry {
                segment_id: "broken".into()
            }]
        );
    }

    #[test]
    fn route_without_path_reported() {
        let mut empty = route(7, vec![]);
        empty.path.clear();
        let map = aggregate(&[empty, route(8, vec![(0., 0.), (60., 0.)])]);
        assert_eq!(counts(&map), vec![1, 0, 0, 0, 0, 0]);
        assert!(map.issues.contains(&IntegrityIssue::RouteWithoutPath {
            route_id: 7,
            entity_id: 7,
            notification: 1
        }));
    }

    #[test]
    fn same_again() {
        let routes = vec![
            route(1, vec![(10., 0.), (490., 0.)]),
            route(2, vec![(300., 0.), (120., 0.)]),
        ];
        assert_eq!(aggregate(&routes), aggregate(&routes));
    }

    #[test]
    fn dissolving() {
        let segs = segments();
        let map = aggregate(&[
            route(1, vec![(10., 0.), (190., 0.)]),
            route(2, vec![(120., 0.), (380., 0.)]),
        ]);
        let dissolved = dissolve(&map, &segs).unwrap();
        assert_eq!(
            dissolved
                .iter()
                .map(|d| (d.crossing_count, d.num_segments))
                .collect::<Vec<_>>(),
            vec![(0, 1), (1, 1), (1, 2), (2, 1)]
        );
        assert_eq!(dissolved[1].coords, vec![(0., 0.), (100., 0.)]);
        assert_eq!(
            dissolved[2].coords,
            vec![(200., 0.), (300., 0.), (400., 0.)]
        );
        assert_eq!(dissolved[3].coords, vec![(100., 0.), (200., 0.)]);
    }

    fn density_of(segs: &SegmentIndex, counts: &[u64]) -> DensityMap {
        DensityMap {
            records: segs
                .segments()
                .iter()
                .zip(counts)
                .map(|(s, c)| DensityRecord {
                    segment_id: s.segment_id.clone(),
                    crossing_count: *c,
                })
                .collect(),
            issues: vec![],
        }
    }

    fn index(lines: &[&[(f64, f64)]]) -> SegmentIndex {
        SegmentIndex::new(
            lines
                .iter()
                .enumerate()
                .map(|(i, coords)| FixedSegment {
                    segment_id: format!("S{}", i),
                    coords: coords.to_vec(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn dissolve_splits_at_gaps() {
        let segs = index(&[
            &[(0., 0.), (100., 0.)],
            &[(100., 0.), (200., 0.)],
            &[(200., 0.), (300., 0.)],
            &[(300., 0.), (400., 0.)],
        ]);
        let dissolved = dissolve(&density_of(&segs, &[1, 0, 1, 1]), &segs).unwrap();
        assert_eq!(
            dissolved
                .iter()
                .map(|d| (d.crossing_count, d.num_segments, d.coords.clone()))
                .collect::<Vec<_>>(),
            vec![
                (0, 1, vec![(100., 0.), (200., 0.)]),
                (1, 1, vec![(0., 0.), (100., 0.)]),
                (1, 2, vec![(200., 0.), (300., 0.), (400., 0.)]),
            ]
        );
    }

    #[test]
    fn dissolve_reversed_and_nearly_touching() {
        // 2nd segment is drawn backwards, and starts a hair away from the 1st's end
        let segs = index(&[
            &[(0., 0.), (100., 0.)],
            &[(200., 50.), (150., 0.), (100.001, 0.)],
        ]);
        let dissolved = dissolve(&density_of(&segs, &[3, 3]), &segs).unwrap();
        assert_eq!(dissolved.len(), 1);
        assert_eq!(dissolved[0].num_segments, 2);
        assert_eq!(
            dissolved[0].coords,
            vec![(0., 0.), (100., 0.), (150., 0.), (200., 50.)]
        );
    }

    #[test]
    fn dissolve_junction_and_ring() {
        let segs = index(&[
            // a Y shape, all meeting at (0, 0)
            &[(0., 0.), (-100., 0.)],
            &[(0., 0.), (100., 100.)],
            &[(100., -100.), (0., 0.)],
            // a square ring, away from the Y
            &[(1000., 0.), (1100., 0.)],
            &[(1100., 0.), (1100., 100.)],
            &[(1100., 100.), (1000., 100.)],
            &[(1000., 100.), (1000., 0.)],
        ]);
        let dissolved = dissolve(&density_of(&segs, &[1; 7]), &segs).unwrap();
        assert_eq!(
            dissolved.iter().map(|d| d.num_segments).collect::<Vec<_>>(),
            vec![1, 1, 1, 4]
        );
        assert!(dissolved.iter().all(|d| d.crossing_count == 1));
        let ring = &dissolved[3].coords;
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        // no segment is output twice
        assert_eq!(dissolved.iter().map(|d| d.num_segments).sum::<usize>(), 7);
    }
}
