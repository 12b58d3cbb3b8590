//! Turning a trajectory into route requests between consecutive sightings
use crate::grouping::Trajectory;
use crate::observation::Observation;
use chrono::NaiveDateTime;

pub type RouteId = u64;

/// Hands out route ids, one per craft, starting at 1.
///
/// Every route of a craft shares that craft's id. A craft uses up an id even if none of it's
/// routes can be calculated.
#[derive(Debug, Clone)]
pub struct RouteIdAllocator {
    next: RouteId,
}

impl Default for RouteIdAllocator {
    fn default() -> Self {
        RouteIdAllocator { next: 1 }
    }
}

impl RouteIdAllocator {
    pub fn new() -> Self {
        Default::default()
    }

    /// The id for the next craft
    pub fn allocate(&mut self) -> RouteId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Allocate ids to all the trajectories, in order, and return the pairs of each
    pub fn pairs_for<'a>(
        &mut self,
        trajectories: &'a [Trajectory],
    ) -> Vec<NotificationPairs<'a>> {
        trajectories
            .iter()
            .map(|t| NotificationPairs::new(t, self.allocate()))
            .collect()
    }
}

/// A request to route between 2 consecutive sightings of one craft
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NotificationPair<'a> {
    pub route_id: RouteId,
    pub start: &'a Observation,
    pub end: &'a Observation,
}

impl NotificationPair<'_> {
    pub fn entity_id(&self) -> i64 {
        self.start.entity_id
    }
    pub fn notification(&self) -> i64 {
        self.start.notification
    }
    pub fn date(&self) -> NaiveDateTime {
        self.start.timestamp
    }
}

/// Iterator over the N-1 pairs of a trajectory of N sightings. Clone it to start again.
#[derive(Debug, Clone)]
pub struct NotificationPairs<'a> {
    trajectory: &'a Trajectory,
    route_id: RouteId,
    next_idx: usize,
}

impl<'a> NotificationPairs<'a> {
    pub fn new(trajectory: &'a Trajectory, route_id: RouteId) -> Self {
        NotificationPairs {
            trajectory,
            route_id,
            next_idx: 0,
        }
    }

    pub fn route_id(&self) -> RouteId {
        self.route_id
    }
    pub fn trajectory(&self) -> &'a Trajectory {
        self.trajectory
    }
}

impl<'a> Iterator for NotificationPairs<'a> {
    type Item = NotificationPair<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let obs = &self.trajectory.observations;
        let start = obs.get(self.next_idx)?;
        let end = obs.get(self.next_idx + 1)?;
        self.next_idx += 1;
        Some(NotificationPair {
            route_id: self.route_id,
            start,
            end,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .trajectory
            .observations
            .len()
            .saturating_sub(self.next_idx + 1);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for NotificationPairs<'_> {}
