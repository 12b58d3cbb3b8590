use super::*;
use crate::density::{DensityOptions, aggregate_density};
use crate::grouping::group_by_entity;
use crate::network::Network;
use crate::observation::{CleanseOptions, read_observations};
use crate::route::RouteFailure;
use crate::segments::{FixedSegment, SegmentIndex};
use indicatif::ProgressDrawTarget;

fn hidden() -> ProgressBar {
    ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
}

/// 2 canals which never meet, one along y=100, one along y=2100
fn network() -> Network {
    Network::from_lines(
        vec![
            vec![(0., 100.), (500., 100.)],
            vec![(500., 100.), (1000., 100.)],
            vec![(0., 2100.), (1000., 2100.)],
        ],
        0.01,
    )
    .unwrap()
}

/// 10 segments of 100 along the first canal
fn segments() -> SegmentIndex {
    SegmentIndex::new(
        (0..10)
            .map(|i| FixedSegment {
                segment_id: format!("L{}", i + 1),
                coords: vec![(i as f64 * 100., 100.), ((i + 1) as f64 * 100., 100.)],
            })
            .collect(),
    )
    .unwrap()
}

const SIGHTINGS: &str = "Notification,Equipment,Date,Easting,Northing
11,7,2016-04-03 09:00:00,800,102
10,7,2016-04-02 09:00:00,400,101
9,7,2016-04-01 09:00:00,100,100
20,8,2016-04-01 10:00:00,300,100
21,8,2016-04-02 10:00:00,300,2100
30,9,2016-04-01 11:00:00,600,100
40,991100,2016-04-01 11:00:00,600,100
50,10,2016-04-01 11:00:00,0,500
";

fn run() -> (Grouped, RouteCollector) {
    let ingested = read_observations(SIGHTINGS.as_bytes(), &CleanseOptions::default()).unwrap();
    assert!(ingested.rejected.is_empty());
    assert_eq!(ingested.num_noise, 1);
    assert_eq!(ingested.num_zero_coordinate, 1);
    let grouped = group_by_entity(&ingested.observations);
    let collector = reconstruct_routes(
        &network(),
        &grouped,
        &ResolveOptions::default(),
        &hidden(),
    );
    (grouped, collector)
}

#[test]
fn three_sightings_two_routes_one_id() {
    let (_grouped, collector) = run();
    let e7 = collector
        .routes()
        .iter()
        .filter(|r| r.entity_id == 7)
        .collect::<Vec<_>>();
    assert_eq!(e7.len(), 2);
    assert!(e7.iter().all(|r| r.route_id == 1));
    assert_eq!(
        e7.iter()
            .map(|r| (r.notification, r.end_notification))
            .collect::<Vec<_>>(),
        vec![(9, 10), (10, 11)]
    );
    assert_eq!(e7[0].length, 300.);
    assert_eq!(e7[1].length, 400.);
    assert!(e7[0].date < e7[1].date);
}

#[test]
fn disconnected_craft() {
    let (_grouped, collector) = run();
    assert!(collector.routes().iter().all(|r| r.entity_id != 8));
    let failures = collector
        .failures()
        .iter()
        .filter(|f| f.entity_id == 8)
        .collect::<Vec<_>>();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].route_id, 2);
    assert_eq!(failures[0].notification, 20);
    assert_eq!(failures[0].end_notification, 21);
    assert_eq!(failures[0].reason, RouteFailure::Disconnected);
}

#[test]
fn carries_on_after_disconnected_pair() {
    let sightings = "Notification,Equipment,Date,Easting,Northing
1,12,2016-05-01 09:00:00,300,100
2,12,2016-05-02 09:00:00,300,2100
3,12,2016-05-03 09:00:00,800,2100
";
    let ingested = read_observations(sightings.as_bytes(), &CleanseOptions::default()).unwrap();
    let grouped = group_by_entity(&ingested.observations);
    assert_eq!(grouped.num_pairs(), 2);
    let collector = reconstruct_routes(
        &network(),
        &grouped,
        &ResolveOptions::default(),
        &hidden(),
    );

    assert_eq!(collector.failures().len(), 1);
    let failure = &collector.failures()[0];
    assert_eq!(failure.route_id, 1);
    assert_eq!((failure.notification, failure.end_notification), (1, 2));
    assert_eq!(failure.reason, RouteFailure::Disconnected);

    assert_eq!(collector.routes().len(), 1);
    let route = &collector.routes()[0];
    assert_eq!(route.route_id, 1);
    assert_eq!(route.entity_id, 12);
    assert_eq!((route.notification, route.end_notification), (2, 3));
    assert_eq!(route.length, 500.);

    assert_eq!(collector.pairs_seen(), grouped.num_pairs());
}

#[test]
fn single_sightings_never_routed() {
    let (grouped, collector) = run();
    assert_eq!(
        grouped
            .single_observation
            .iter()
            .map(|o| o.entity_id)
            .collect::<Vec<_>>(),
        vec![9]
    );
    assert!(collector.routes().iter().all(|r| r.entity_id != 9));
    assert!(collector.failures().iter().all(|f| f.entity_id != 9));
}

#[test]
fn every_pair_accounted_for() {
    let (grouped, collector) = run();
    assert_eq!(collector.pairs_seen(), grouped.num_pairs());
    assert_eq!(collector.routes().len() + collector.failures().len(), 3);
}

#[test]
fn same_result_on_one_thread() {
    let (grouped, collector) = run();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap();
    let single = pool.install(|| {
        reconstruct_routes(
            &network(),
            &grouped,
            &ResolveOptions::default(),
            &hidden(),
        )
    });
    assert_eq!(single.routes(), collector.routes());
    assert_eq!(single.failures(), collector.failures());
}

#[test]
fn density_from_routes() {
    let (_grouped, collector) = run();
    let density = aggregate_density(
        collector.routes(),
        &segments(),
        &DensityOptions::default(),
        &hidden(),
    );
    assert_eq!(density.records.len(), 10);
    assert_eq!(
        density
            .records
            .iter()
            .map(|r| r.crossing_count)
            .collect::<Vec<_>>(),
        vec![0, 1, 1, 1, 1, 1, 1, 1, 0, 0]
    );
    assert!(density.issues.is_empty());
}

#[test]
fn nothing_to_route() {
    let collector = reconstruct_routes(
        &network(),
        &Grouped::default(),
        &ResolveOptions::default(),
        &hidden(),
    );
    assert_eq!(collector.pairs_seen(), 0);
    let density = aggregate_density(
        collector.routes(),
        &segments(),
        &DensityOptions::default(),
        &hidden(),
    );
    assert_eq!(density.records.len(), 10);
    assert_eq!(density.total_crossings(), 0);
}
