//! Turning results into output rows & features
use super::*;
use crate::collector::FailedPair;
use crate::density::{DensityMap, DissolvedDensity};
use crate::grouping::{DATE_FORMAT, Grouped, sighting_ranges};
use crate::observation::{Observation, Rejected};
use crate::route::Route;
use crate::segments::SegmentIndex;
use serde::Serialize;
use serde_json::{Value, json};
use std::io::Write;

pub fn route_feature(route: &Route) -> (Value, Vec<Vec<(f64, f64)>>) {
    (
        json!({
            "route_id": route.route_id,
            "entity_id": route.entity_id,
            "notification": route.notification,
            "end_notification": route.end_notification,
            "date": route.date.format(DATE_FORMAT).to_string(),
            "end_date": route.end_date.format(DATE_FORMAT).to_string(),
            "length": (route.length * 1000.).round() / 1000.,
        }),
        vec![route.coords.clone()],
    )
}

/// One feature per segment, including the ones nothing crossed. Segments with no geometry get no
/// lines, and are written with a null geometry.
pub fn density_features<'a>(
    density: &'a DensityMap,
    segments: &'a SegmentIndex,
) -> impl Iterator<Item = (Value, Vec<Vec<(f64, f64)>>)> + 'a {
    density
        .records
        .iter()
        .zip(segments.segments().iter())
        .enumerate()
        .map(|(idx, (record, segment))| {
            let lines = if segments.midpoint(idx).is_some() {
                vec![segment.coords.clone()]
            } else {
                vec![]
            };
            (
                json!({
                    "segment_id": record.segment_id,
                    "crossing_count": record.crossing_count,
                }),
                lines,
            )
        })
}

pub fn dissolved_feature(dissolved: &DissolvedDensity) -> (Value, Vec<Vec<(f64, f64)>>) {
    (
        json!({
            "crossing_count": dissolved.crossing_count,
            "num_segments": dissolved.num_segments,
        }),
        vec![dissolved.coords.clone()],
    )
}

/// One row of the diagnostics CSV. Which columns are set depends on `kind`.
#[derive(Debug, Serialize, PartialEq)]
struct DiagnosticRow<'a> {
    kind: &'static str,
    entity_id: Option<i64>,
    notification: Option<i64>,
    end_notification: Option<i64>,
    route_id: Option<u64>,
    line: Option<u64>,
    reason: &'a str,
    message: String,
}

/// Write everything which didn't make it into a route. Returns the number of rows.
pub fn write_diagnostics(
    wtr: impl Write,
    failures: &[FailedPair],
    single_observation: &[Observation],
    rejected: &[Rejected],
) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(wtr);
    let mut num_rows = 0;
    for failure in failures {
        wtr.serialize(DiagnosticRow {
            kind: "unrouteable_pair",
            entity_id: Some(failure.entity_id),
            notification: Some(failure.notification),
            end_notification: Some(failure.end_notification),
            route_id: Some(failure.route_id),
            line: None,
            reason: failure.reason.kind(),
            message: failure.reason.to_string(),
        })?;
        num_rows += 1;
    }
    for obs in single_observation {
        wtr.serialize(DiagnosticRow {
            kind: "single_observation",
            entity_id: Some(obs.entity_id),
            notification: Some(obs.notification),
            end_notification: None,
            route_id: None,
            line: None,
            reason: "single_observation",
            message: "craft was only seen once".to_string(),
        })?;
        num_rows += 1;
    }
    for rej in rejected {
        wtr.serialize(DiagnosticRow {
            kind: "rejected_row",
            entity_id: None,
            notification: None,
            end_notification: None,
            route_id: None,
            line: Some(rej.line),
            reason: "malformed",
            message: rej.error.to_string(),
        })?;
        num_rows += 1;
    }
    wtr.flush()?;
    Ok(num_rows)
}

#[derive(Debug, Serialize)]
struct SightingRow {
    notification: i64,
    entity_id: i64,
    date: String,
    end_date: String,
    date_range: String,
    x: f64,
    y: f64,
}

/// Write every routed craft's sightings, in craft order then time order, with the time until the
/// next sighting.
pub fn write_sighting_ranges(wtr: impl Write, grouped: &Grouped) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(wtr);
    let mut num_rows = 0;
    for range in grouped.trajectories.iter().flat_map(sighting_ranges) {
        wtr.serialize(SightingRow {
            notification: range.notification,
            entity_id: range.entity_id,
            date: range.date.format(DATE_FORMAT).to_string(),
            end_date: range.end_date.format(DATE_FORMAT).to_string(),
            date_range: range.date_range(),
            x: range.x,
            y: range.y,
        })?;
        num_rows += 1;
    }
    wtr.flush()?;
    Ok(num_rows)
}
