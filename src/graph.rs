use smallvec::SmallVec;

pub type VertexId = usize;
pub type EdgeId = usize;

/// (other vertex, edge id). Most canal junctions have 2 or 3 neighbours
type SmallNeighbours = SmallVec<[(VertexId, EdgeId); 3]>;

/// Undirected multigraph. Vertexes are dense `0..num_vertexes()` indexes, and each edge has an
/// id so that 2 edges between the same pair of vertexes (e.g. either side of an island) are kept
/// apart. The edge weight is kept alongside.
#[derive(Debug, Default, Clone)]
pub struct UndirectedAdjGraph {
    neighbours: Vec<SmallNeighbours>,
    /// edge id → (vertex a, vertex b, weight)
    edges: Vec<(VertexId, VertexId, f64)>,
}

impl UndirectedAdjGraph {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_vertexes(num_vertexes: usize) -> Self {
        UndirectedAdjGraph {
            neighbours: vec![SmallVec::new(); num_vertexes],
            edges: Vec::new(),
        }
    }

    /// Adds a vertex, and returns it's id
    pub fn add_vertex(&mut self) -> VertexId {
        self.neighbours.push(SmallVec::new());
        self.neighbours.len() - 1
    }

    /// Adds an edge and returns it's id. Edge ids are allocated in order from 0.
    pub fn add_edge(&mut self, a: VertexId, b: VertexId, weight: f64) -> EdgeId {
        assert!(
            a < self.neighbours.len() && b < self.neighbours.len(),
            "Unknown vertex in edge {a}-{b}"
        );
        let edge_id = self.edges.len();
        self.edges.push((a, b, weight));
        self.neighbours[a].push((b, edge_id));
        if a != b {
            self.neighbours[b].push((a, edge_id));
        }
        edge_id
    }

    pub fn num_vertexes(&self) -> usize {
        self.neighbours.len()
    }
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
    pub fn contains_vertex(&self, v: VertexId) -> bool {
        v < self.neighbours.len()
    }

    pub fn edge(&self, edge_id: EdgeId) -> Option<(VertexId, VertexId, f64)> {
        self.edges.get(edge_id).copied()
    }

    pub fn edges_iter(&self) -> impl Iterator<Item = (EdgeId, VertexId, VertexId, f64)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .map(|(eid, (a, b, w))| (eid, *a, *b, *w))
    }

    /// All the neighbours of this vertex, with the connecting edge and it's weight
    pub fn neighbours(&self, v: VertexId) -> impl Iterator<Item = (VertexId, EdgeId, f64)> + '_ {
        self.neighbours
            .get(v)
            .into_iter()
            .flat_map(|ns| ns.iter())
            .map(|(other, eid)| (*other, *eid, self.edges[*eid].2))
    }

    pub fn num_neighbours(&self, v: VertexId) -> usize {
        self.neighbours.get(v).map_or(0, |ns| ns.len())
    }

    /// Label every vertex with it's connected component. Component ids are the smallest vertex id
    /// in the component.
    pub fn connected_components(&self) -> Vec<VertexId> {
        let mut component = vec![usize::MAX; self.num_vertexes()];
        let mut frontier = Vec::new();
        for root in 0..self.num_vertexes() {
            if component[root] != usize::MAX {
                continue;
            }
            frontier.truncate(0);
            frontier.push(root);
            component[root] = root;
            while let Some(curr) = frontier.pop() {
                for (other, _eid, _w) in self.neighbours(curr) {
                    if component[other] == usize::MAX {
                        component[other] = root;
                        frontier.push(other);
                    }
                }
            }
        }
        component
    }
}
