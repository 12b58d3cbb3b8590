//! Collecting the calculated routes, and the pairs that couldn't be routed
use crate::pairs::{NotificationPair, RouteId};
use crate::route::{Route, RouteFailure, RouteOutcome};

/// A notification pair which has no route
#[derive(Debug, Clone, PartialEq)]
pub struct FailedPair {
    pub route_id: RouteId,
    pub entity_id: i64,
    pub notification: i64,
    pub end_notification: i64,
    pub reason: RouteFailure,
}

/// Every pair given to `push` ends up in exactly one of `routes` or `failures`, in the order
/// they were pushed.
#[derive(Debug, Clone, Default)]
pub struct RouteCollector {
    routes: Vec<Route>,
    failures: Vec<FailedPair>,
}

impl RouteCollector {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, pair: &NotificationPair, outcome: RouteOutcome) {
        match outcome {
            Ok(route) => self.routes.push(route),
            Err(reason) => self.failures.push(FailedPair {
                route_id: pair.route_id,
                entity_id: pair.entity_id(),
                notification: pair.notification(),
                end_notification: pair.end.notification,
                reason,
            }),
        }
    }

    /// Append everything from `other` after what's already here
    pub fn merge(&mut self, mut other: RouteCollector) {
        self.routes.append(&mut other.routes);
        self.failures.append(&mut other.failures);
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
    pub fn failures(&self) -> &[FailedPair] {
        &self.failures
    }

    /// Number of pairs pushed, routed or not
    pub fn pairs_seen(&self) -> usize {
        self.routes.len() + self.failures.len()
    }

    pub fn into_parts(self) -> (Vec<Route>, Vec<FailedPair>) {
        (self.routes, self.failures)
    }
}
