//! Resolving a notification pair into a route along the network
use crate::dij::Traversal;
use crate::geometry::sub_polyline;
use crate::network::RoutingNetwork;
use crate::pairs::{NotificationPair, RouteId};
use chrono::NaiveDateTime;

pub const DEFAULT_SNAP_TOLERANCE: f64 = 5.;
pub const DEFAULT_SEARCH_RADIUS: f64 = 500.;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveOptions {
    /// A sighting this close to an edge's end is put on that end vertex
    pub snap_tolerance: f64,
    /// Sightings further than this from the network can't be routed
    pub search_radius: f64,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            snap_tolerance: DEFAULT_SNAP_TOLERANCE,
            search_radius: DEFAULT_SEARCH_RADIUS,
        }
    }
}

/// Why no route could be calculated for a pair. These are expected, and don't stop the run.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum RouteFailure {
    #[error("no route: start sighting at {point:?} is more than {radius} from the network")]
    UnreachableStart { point: (f64, f64), radius: f64 },
    #[error("no route: end sighting at {point:?} is more than {radius} from the network")]
    UnreachableEnd { point: (f64, f64), radius: f64 },
    #[error("no route: sightings are on parts of the network which aren't connected")]
    Disconnected,
}

impl RouteFailure {
    /// Short name for reports
    pub fn kind(&self) -> &'static str {
        match self {
            RouteFailure::UnreachableStart { .. } => "unreachable_start",
            RouteFailure::UnreachableEnd { .. } => "unreachable_end",
            RouteFailure::Disconnected => "disconnected",
        }
    }
}

/// A calculated route between 2 sightings of a craft
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub route_id: RouteId,
    pub entity_id: i64,
    /// The start sighting's notification
    pub notification: i64,
    pub end_notification: i64,
    /// When the start sighting was
    pub date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    /// The parts of the network edges travelled, in order
    pub path: Vec<Traversal>,
    pub length: f64,
    /// Coordinates from the snapped start to the snapped end
    pub coords: Vec<(f64, f64)>,
}

pub type RouteOutcome = Result<Route, RouteFailure>;

/// Calculate the route for one pair. Failure only concerns this pair.
pub fn resolve_pair(
    network: &impl RoutingNetwork,
    pair: &NotificationPair,
    options: &ResolveOptions,
) -> RouteOutcome {
    let start_pos = pair.start.location();
    let end_pos = pair.end.location();
    let start = network
        .nearest_element(start_pos, options.search_radius)
        .ok_or(RouteFailure::UnreachableStart {
            point: start_pos,
            radius: options.search_radius,
        })?;
    let end = network
        .nearest_element(end_pos, options.search_radius)
        .ok_or(RouteFailure::UnreachableEnd {
            point: end_pos,
            radius: options.search_radius,
        })?;
    let start = network.snap(&start, options.snap_tolerance);
    let end = network.snap(&end, options.snap_tolerance);

    let path = network
        .shortest_path(&start, &end)
        .ok_or(RouteFailure::Disconnected)?;

    let mut coords: Vec<(f64, f64)> = Vec::new();
    for traversal in path.traversals.iter() {
        let part = sub_polyline(
            network.edge_coords(traversal.edge),
            traversal.from_along,
            traversal.to_along,
        );
        // consecutive parts share their joining vertex
        let skip = usize::from(coords.last().is_some() && coords.last() == part.first());
        coords.extend(part.into_iter().skip(skip));
    }
    if coords.len() == 1 {
        // A zero length route is still a valid line
        coords.push(coords[0]);
    }

    Ok(Route {
        route_id: pair.route_id,
        entity_id: pair.entity_id(),
        notification: pair.notification(),
        end_notification: pair.end.notification,
        date: pair.date(),
        end_date: pair.end.timestamp,
        length: path.cost,
        path: path.traversals,
        coords,
    })
}
