//! The navigable network: a graph of line edges, with a spatial index for finding the nearest
//! edge to a sighting.
use super::*;
use crate::dij::{self, NetworkPath};
use crate::geometry::{Projection, dist_to_piece, polyline_length, project_onto_polyline};
use crate::graph::{EdgeId, UndirectedAdjGraph, VertexId};
use kdtree::KdTree;
use kdtree::distance::squared_euclidean;
use rstar::{AABB, PointDistance, RTree, RTreeObject};

/// What the route resolver needs from a network.
pub trait RoutingNetwork: Sync {
    /// The nearest network edge to `point`, if one is within `radius`.
    fn nearest_element(&self, point: (f64, f64), radius: f64) -> Option<Located>;

    /// Fix a located point onto the network, moving it onto the edge's end vertex when it's
    /// within `tolerance` of it.
    fn snap(&self, located: &Located, tolerance: f64) -> SnappedPoint;

    /// Shortest path (by length) between 2 snapped points. `None` when they're not connected.
    fn shortest_path(&self, a: &SnappedPoint, b: &SnappedPoint) -> Option<NetworkPath>;

    /// Geometry of this edge, from it's `from` vertex to it's `to` vertex.
    fn edge_coords(&self, edge: EdgeId) -> &[(f64, f64)];
}

#[derive(Debug, Clone)]
pub struct NetworkEdge {
    pub from: VertexId,
    pub to: VertexId,
    pub length: f64,
    pub coords: Vec<(f64, f64)>,
}

/// A point projected onto the nearest edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located {
    pub edge: EdgeId,
    pub projection: Projection,
}

/// A sighting's position on the network
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedPoint {
    pub edge: EdgeId,
    /// Distance along `edge` from it's `from` vertex
    pub along: f64,
    pub point: (f64, f64),
    /// How far the sighting itself was from `point`
    pub offset: f64,
    /// Set when the point was snapped onto one of the edge's end vertexes
    pub vertex: Option<VertexId>,
}

/// One straight piece of a network edge, as stored in the nearest-edge index
#[derive(Debug, Clone)]
struct EdgePiece {
    edge: EdgeId,
    a: [f64; 2],
    b: [f64; 2],
}

impl RTreeObject for EdgePiece {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.a, self.b)
    }
}

impl PointDistance for EdgePiece {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        dist_to_piece(
            (self.a[0], self.a[1]),
            (self.b[0], self.b[1]),
            (point[0], point[1]),
        )
        .powi(2)
    }
}

pub struct Network {
    vertex_pos: Vec<(f64, f64)>,
    edges: Vec<NetworkEdge>,
    graph: UndirectedAdjGraph,
    component: Vec<VertexId>,
    index: RTree<EdgePiece>,
}

impl Network {
    /// Build the network from polylines. Line ends within `node_merge_tolerance` of each other
    /// become the same vertex. Lines with fewer than 2 distinct points are skipped.
    pub fn from_lines(
        lines: impl IntoIterator<Item = Vec<(f64, f64)>>,
        node_merge_tolerance: f64,
    ) -> Result<Self> {
        let mut vertex_pos = Vec::new();
        let mut vertex_tree: KdTree<f64, VertexId, [f64; 2]> = KdTree::new(2);
        let mut graph = UndirectedAdjGraph::new();
        let mut edges: Vec<NetworkEdge> = Vec::new();
        let merge_tol_2 = node_merge_tolerance.powi(2);
        let mut num_skipped = 0;

        for mut coords in lines {
            coords.dedup();
            let length = polyline_length(&coords);
            if coords.len() < 2 || length <= 0. {
                num_skipped += 1;
                continue;
            }
            let from = vertex_at(
                coords[0],
                merge_tol_2,
                &mut vertex_tree,
                &mut vertex_pos,
                &mut graph,
            )?;
            let to = vertex_at(
                coords[coords.len() - 1],
                merge_tol_2,
                &mut vertex_tree,
                &mut vertex_pos,
                &mut graph,
            )?;
            let edge_id = graph.add_edge(from, to, length);
            debug_assert_eq!(edge_id, edges.len());
            edges.push(NetworkEdge {
                from,
                to,
                length,
                coords,
            });
        }
        if num_skipped > 0 {
            warn!(
                "Skipped {} network line(s) with no length",
                num_skipped.to_formatted_string(&Locale::en)
            );
        }
        anyhow::ensure!(
            !edges.is_empty(),
            "The network has no usable lines, so no route can be calculated"
        );

        let pieces = edges
            .iter()
            .enumerate()
            .flat_map(|(edge_id, edge)| {
                edge.coords.windows(2).map(move |pair| EdgePiece {
                    edge: edge_id,
                    a: [pair[0].0, pair[0].1],
                    b: [pair[1].0, pair[1].1],
                })
            })
            .collect::<Vec<_>>();
        let index = RTree::bulk_load(pieces);
        let component = graph.connected_components();

        debug!(
            "Network built: {} vertexes, {} edges, {} pieces indexed, {} connected components",
            graph.num_vertexes().to_formatted_string(&Locale::en),
            graph.num_edges().to_formatted_string(&Locale::en),
            index.size().to_formatted_string(&Locale::en),
            component
                .iter()
                .enumerate()
                .filter(|(v, c)| v == *c)
                .count()
                .to_formatted_string(&Locale::en),
        );

        Ok(Network {
            vertex_pos,
            edges,
            graph,
            component,
            index,
        })
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
    pub fn num_vertexes(&self) -> usize {
        self.vertex_pos.len()
    }
    pub fn edge(&self, edge: EdgeId) -> &NetworkEdge {
        &self.edges[edge]
    }
    pub fn vertex_pos(&self, v: VertexId) -> (f64, f64) {
        self.vertex_pos[v]
    }
    pub fn graph(&self) -> &UndirectedAdjGraph {
        &self.graph
    }

    /// True iff some path along the network joins these 2 edges
    pub fn edges_connected(&self, a: EdgeId, b: EdgeId) -> bool {
        self.component[self.edges[a].from] == self.component[self.edges[b].from]
    }
}

/// Find the existing vertex at this position, or add a new one
pub(crate) fn vertex_at(
    pos: (f64, f64),
    merge_tol_2: f64,
    vertex_tree: &mut KdTree<f64, VertexId, [f64; 2]>,
    vertex_pos: &mut Vec<(f64, f64)>,
    graph: &mut UndirectedAdjGraph,
) -> Result<VertexId> {
    let point = [pos.0, pos.1];
    let nearest = vertex_tree
        .nearest(&point, 1, &squared_euclidean)
        .map_err(|e| anyhow::anyhow!("Invalid network coordinate {:?}: {:?}", pos, e))?;
    if let Some((d2, vertex)) = nearest.first() {
        if *d2 <= merge_tol_2 {
            return Ok(**vertex);
        }
    }
    let vertex = graph.add_vertex();
    vertex_pos.push(pos);
    vertex_tree
        .add(point, vertex)
        .map_err(|e| anyhow::anyhow!("Invalid network coordinate {:?}: {:?}", pos, e))?;
    Ok(vertex)
}

impl RoutingNetwork for Network {
    fn nearest_element(&self, point: (f64, f64), radius: f64) -> Option<Located> {
        let piece = self.index.nearest_neighbor(&[point.0, point.1])?;
        let projection = project_onto_polyline(&self.edges[piece.edge].coords, point)?;
        trace!(
            "Nearest edge to {:?} is {} at {:.3}",
            point, piece.edge, projection.offset
        );
        (projection.offset <= radius).then_some(Located {
            edge: piece.edge,
            projection,
        })
    }

    fn snap(&self, located: &Located, tolerance: f64) -> SnappedPoint {
        let edge = &self.edges[located.edge];
        let Projection {
            point,
            offset,
            along,
        } = located.projection;
        let (along, point, vertex) = if along <= tolerance && along <= edge.length - along {
            (0., self.vertex_pos[edge.from], Some(edge.from))
        } else if edge.length - along <= tolerance {
            (edge.length, self.vertex_pos[edge.to], Some(edge.to))
        } else {
            (along, point, None)
        };
        SnappedPoint {
            edge: located.edge,
            along,
            point,
            offset,
            vertex,
        }
    }

    fn shortest_path(&self, a: &SnappedPoint, b: &SnappedPoint) -> Option<NetworkPath> {
        if !self.edges_connected(a.edge, b.edge) {
            return None;
        }
        dij::shortest_path(&self.graph, a, b)
    }

    fn edge_coords(&self, edge: EdgeId) -> &[(f64, f64)] {
        &self.edges[edge].coords
    }
}
