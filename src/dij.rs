use super::*;
use crate::graph::{EdgeId, UndirectedAdjGraph, VertexId};
use crate::network::SnappedPoint;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// Part of one edge that a path goes along. `from_along` → `to_along` are distances from the
/// edge's `from` vertex, so `from_along > to_along` means the edge is travelled backwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Traversal {
    pub edge: EdgeId,
    pub from_along: f64,
    pub to_along: f64,
}

impl Traversal {
    pub fn length(&self) -> f64 {
        (self.to_along - self.from_along).abs()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPath {
    /// In travel order. Never empty.
    pub traversals: Vec<Traversal>,
    pub cost: f64,
}

impl NetworkPath {
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.traversals.iter().map(|t| t.edge)
    }
}

/// How the search leaves the start edge, or arrives on the end edge
#[derive(Debug, Clone, Copy, PartialEq)]
enum Via {
    /// The start & end are on the same edge, and we go directly along it
    Direct,
    /// Reach this vertex, then go along the end edge from `enter_along`
    Vertex {
        vertex: VertexId,
        enter_along: f64,
    },
}

/// Dijkstra search between 2 points which lie somewhere on edges.
///
/// The search starts from both end vertexes of `start`'s edge (each already `along` away), and
/// finishes when no unsettled vertex can beat the best way found onto `end`'s edge. Returns
/// `None` iff there is no path.
pub fn shortest_path(
    graph: &UndirectedAdjGraph,
    start: &SnappedPoint,
    end: &SnappedPoint,
) -> Option<NetworkPath> {
    let (s_from, s_to, s_len) = graph.edge(start.edge)?;
    let (e_from, e_to, e_len) = graph.edge(end.edge)?;
    trace!(
        "shortest_path started. edge {} @ {:.1} → edge {} @ {:.1}",
        start.edge, start.along, end.edge, end.along
    );

    // (cost, how we arrive at the end point)
    let mut best: Option<(OrderedFloat<f64>, Via)> = None;
    if start.edge == end.edge {
        best = Some((OrderedFloat((end.along - start.along).abs()), Via::Direct));
    }

    // vertex → (shortest known dist, previous vertex & edge). No previous means it's on the
    // start edge.
    let mut best_dist_prev: HashMap<VertexId, (OrderedFloat<f64>, Option<(VertexId, EdgeId)>)> =
        HashMap::new();
    let mut frontier = BinaryHeap::new();
    for (vertex, dist) in [(s_from, start.along), (s_to, s_len - start.along)] {
        let dist = OrderedFloat(dist.max(0.));
        if best_dist_prev
            .get(&vertex)
            .is_none_or(|(known, _)| dist < *known)
        {
            best_dist_prev.insert(vertex, (dist, None));
            // store negative distance so the shortest distance is the largest number
            frontier.push((-dist, vertex));
        }
    }

    let mut this_dist;
    while let Some((mut curr_dist, curr_id)) = frontier.pop() {
        curr_dist *= -1.;
        if best.is_some_and(|(best_cost, _)| curr_dist >= best_cost) {
            // Nothing left on the frontier can be shorter
            break;
        }
        if curr_dist > best_dist_prev[&curr_id].0 {
            // already found a shorter
            continue;
        }
        for (vertex, enter_along) in [(e_from, 0.), (e_to, e_len)] {
            if vertex == curr_id {
                let cost = curr_dist + OrderedFloat((end.along - enter_along).abs());
                if best.is_none_or(|(best_cost, _)| cost < best_cost) {
                    best = Some((
                        cost,
                        Via::Vertex {
                            vertex,
                            enter_along,
                        },
                    ));
                }
            }
        }
        for (neighbour, edge_id, weight) in graph.neighbours(curr_id) {
            this_dist = curr_dist + OrderedFloat(weight);
            best_dist_prev
                .entry(neighbour)
                .and_modify(|(dist, prev)| {
                    if this_dist < *dist {
                        *prev = Some((curr_id, edge_id));
                        *dist = this_dist;
                        frontier.push((-this_dist, neighbour));
                    }
                })
                .or_insert_with(|| {
                    frontier.push((-this_dist, neighbour));
                    (this_dist, Some((curr_id, edge_id)))
                });
        }
    }

    let (cost, via) = best?;
    let traversals = match via {
        Via::Direct => vec![Traversal {
            edge: start.edge,
            from_along: start.along,
            to_along: end.along,
        }],
        Via::Vertex {
            vertex: last_vertex,
            enter_along,
        } => {
            // walk backwards from the end
            let mut traversals = vec![Traversal {
                edge: end.edge,
                from_along: enter_along,
                to_along: end.along,
            }];
            let mut curr = last_vertex;
            while let Some((prev_vertex, edge_id)) = best_dist_prev[&curr].1 {
                let (a, _b, len) = graph.edge(edge_id)?;
                // a self loop is travelled forwards
                let forwards = a == prev_vertex;
                traversals.push(Traversal {
                    edge: edge_id,
                    from_along: if forwards { 0. } else { len },
                    to_along: if forwards { len } else { 0. },
                });
                curr = prev_vertex;
            }
            // when the start edge is a loop, leave by the nearer end
            let leave_by_from = curr == s_from && (curr != s_to || start.along <= s_len / 2.);
            traversals.push(Traversal {
                edge: start.edge,
                from_along: start.along,
                to_along: if leave_by_from { 0. } else { s_len },
            });
            traversals.reverse();
            // The partial start/end edges are zero length when the point is on a vertex
            if traversals.iter().any(|t| t.length() > 0.) {
                traversals.retain(|t| t.length() > 0.);
            } else {
                traversals.truncate(1);
            }
            traversals
        }
    };

    trace!(
        "shortest_path finished. {} traversals, cost {:.1}, {} vertexes looked at",
        traversals.len(),
        cost.0,
        best_dist_prev.len()
    );

    Some(NetworkPath {
        traversals,
        cost: cost.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(edge: EdgeId, along: f64) -> SnappedPoint {
        SnappedPoint {
            edge,
            along,
            point: (0., 0.),
            offset: 0.,
            vertex: None,
        }
    }

    /// Square 0-1-2-3 with sides of 10, plus a long diagonal 0-2 (edge 4) of 30
    fn square() -> UndirectedAdjGraph {
        let mut g = UndirectedAdjGraph::with_vertexes(4);
        g.add_edge(0, 1, 10.);
        g.add_edge(1, 2, 10.);
        g.add_edge(2, 3, 10.);
        g.add_edge(3, 0, 10.);
        g.add_edge(0, 2, 30.);
        g
    }

    /// Cost of the cheapest simple path from any start-edge end to any end-edge end, found by
    /// trying every simple path.
    fn brute_force(g: &UndirectedAdjGraph, start: &SnappedPoint, end: &SnappedPoint) -> f64 {
        fn walk(
            g: &UndirectedAdjGraph,
            curr: VertexId,
            dist: f64,
            visited: &mut Vec<VertexId>,
            out: &mut HashMap<VertexId, f64>,
        ) {
            let e = out.entry(curr).or_insert(f64::INFINITY);
            *e = e.min(dist);
            for (next, _eid, w) in g.neighbours(curr) {
                if !visited.contains(&next) {
                    visited.push(next);
                    walk(g, next, dist + w, visited, out);
                    visited.pop();
                }
            }
        }
        let (s_from, s_to, s_len) = g.edge(start.edge).unwrap();
        let (e_from, e_to, e_len) = g.edge(end.edge).unwrap();
        let mut best = if start.edge == end.edge {
            (start.along - end.along).abs()
        } else {
            f64::INFINITY
        };
        for (seed, seed_dist) in [(s_from, start.along), (s_to, s_len - start.along)] {
            let mut reached = HashMap::new();
            walk(g, seed, seed_dist, &mut vec![seed], &mut reached);
            for (target, extra) in [(e_from, end.along), (e_to, e_len - end.along)] {
                if let Some(d) = reached.get(&target) {
                    best = best.min(d + extra);
                }
            }
        }
        best
    }

    #[test]
    fn same_edge_direct() {
        let g = square();
        let p = shortest_path(&g, &at(0, 2.), &at(0, 7.)).unwrap();
        assert_eq!(p.cost, 5.);
        assert_eq!(
            p.traversals,
            vec![Traversal {
                edge: 0,
                from_along: 2.,
                to_along: 7.
            }]
        );
    }

    #[test]
    fn same_edge_backwards() {
        let g = square();
        let p = shortest_path(&g, &at(1, 8.), &at(1, 1.)).unwrap();
        assert_eq!(p.cost, 7.);
        assert_eq!(p.traversals[0].from_along, 8.);
        assert_eq!(p.traversals[0].to_along, 1.);
    }

    #[test]
    fn around_the_corner() {
        let g = square();
        // middle of 0-1 to middle of 2-3: 5 + 10 + 5 either way round
        let p = shortest_path(&g, &at(0, 5.), &at(2, 5.)).unwrap();
        assert_eq!(p.cost, 20.);
        assert_eq!(p.traversals.len(), 3);
        assert_eq!(p.traversals.iter().map(|t| t.length()).sum::<f64>(), 20.);
    }

    #[test]
    fn long_diagonal_avoided() {
        let g = square();
        // vertex 0 (start of edge 0) to vertex 2 (end of edge 1)
        let p = shortest_path(&g, &at(0, 0.), &at(1, 10.)).unwrap();
        assert_eq!(p.cost, 20.);
        assert_eq!(p.edges().collect::<Vec<_>>(), vec![0, 1]);
        // along the diagonal, starting at vertex 0
        let p = shortest_path(&g, &at(4, 0.), &at(4, 30.)).unwrap();
        assert_eq!(p.cost, 20.);
        assert!(!p.edges().any(|e| e == 4));
    }

    #[test]
    fn same_place() {
        let g = square();
        let p = shortest_path(&g, &at(2, 4.), &at(2, 4.)).unwrap();
        assert_eq!(p.cost, 0.);
        assert_eq!(p.traversals.len(), 1);
        // same vertex, reached from 2 different edges
        let p = shortest_path(&g, &at(0, 10.), &at(1, 0.)).unwrap();
        assert_eq!(p.cost, 0.);
        assert_eq!(p.traversals.len(), 1);
    }

    #[test]
    fn no_path() {
        let mut g = UndirectedAdjGraph::with_vertexes(4);
        g.add_edge(0, 1, 10.);
        g.add_edge(2, 3, 10.);
        assert!(shortest_path(&g, &at(0, 5.), &at(1, 5.)).is_none());
    }

    #[test]
    fn matches_brute_force() {
        // A small irregular graph with a parallel edge and a dead end
        let mut g = UndirectedAdjGraph::with_vertexes(7);
        for (a, b, w) in [
            (0, 1, 4.),
            (1, 2, 3.),
            (2, 3, 7.),
            (3, 0, 2.),
            (1, 3, 9.),
            (1, 3, 5.),
            (2, 4, 6.),
            (4, 5, 1.),
            (5, 3, 12.),
            (4, 6, 8.),
        ] {
            g.add_edge(a, b, w);
        }
        let num_edges = g.num_edges();
        for s_edge in 0..num_edges {
            for e_edge in 0..num_edges {
                let (_, _, s_len) = g.edge(s_edge).unwrap();
                let (_, _, e_len) = g.edge(e_edge).unwrap();
                for s_frac in [0., 0.3, 1.] {
                    for e_frac in [0., 0.6, 1.] {
                        let start = at(s_edge, s_len * s_frac);
                        let end = at(e_edge, e_len * e_frac);
                        let path = shortest_path(&g, &start, &end).unwrap();
                        let expected = brute_force(&g, &start, &end);
                        assert!(
                            (path.cost - expected).abs() < 1e-9,
                            "edge {s_edge}@{s_frac} → edge {e_edge}@{e_frac}: got {} expected {}",
                            path.cost,
                            expected
                        );
                        let walked = path.traversals.iter().map(|t| t.length()).sum::<f64>();
                        assert!((walked - path.cost).abs() < 1e-9);
                    }
                }
            }
        }
    }
}
