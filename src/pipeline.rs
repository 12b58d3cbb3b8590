//! Running every craft's sightings through route resolution
use super::*;
use crate::collector::RouteCollector;
use crate::grouping::Grouped;
use crate::network::RoutingNetwork;
use crate::pairs::{NotificationPairs, RouteIdAllocator};
use crate::route::{ResolveOptions, resolve_pair};

/// Resolve the routes of one craft, in time order
pub fn resolve_entity(
    network: &impl RoutingNetwork,
    pairs: NotificationPairs,
    options: &ResolveOptions,
    progress: &ProgressBar,
) -> RouteCollector {
    let mut collector = RouteCollector::new();
    for pair in pairs {
        let outcome = resolve_pair(network, &pair, options);
        if let Err(ref reason) = outcome {
            debug!(
                "Craft {} notification {}→{}: {}",
                pair.entity_id(),
                pair.notification(),
                pair.end.notification,
                reason
            );
        }
        collector.push(&pair, outcome);
        progress.inc(1);
    }
    collector
}

/// Calculate routes for every pair of consecutive sightings of every craft.
///
/// Route ids are given out before any work starts, in the order craft first appear, so the result
/// is the same however many threads are used. Craft are resolved in parallel, and the results
/// are merged back in craft order.
pub fn reconstruct_routes(
    network: &impl RoutingNetwork,
    grouped: &Grouped,
    options: &ResolveOptions,
    progress: &ProgressBar,
) -> RouteCollector {
    let mut ids = RouteIdAllocator::new();
    let per_entity = ids.pairs_for(&grouped.trajectories);

    let collectors = per_entity
        .into_par_iter()
        .map(|pairs| resolve_entity(network, pairs, options, progress))
        .collect::<Vec<_>>();

    let mut all = RouteCollector::new();
    for collector in collectors {
        all.merge(collector);
    }
    debug!(
        "{} pairs: {} routes, {} unrouteable",
        all.pairs_seen().to_formatted_string(&Locale::en),
        all.routes().len().to_formatted_string(&Locale::en),
        all.failures().len().to_formatted_string(&Locale::en),
    );
    all
}

#[cfg(test)]
mod tests;
