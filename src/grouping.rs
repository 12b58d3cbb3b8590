//! Splitting sightings into one time-ordered trajectory per craft
use super::*;
use crate::observation::Observation;
use chrono::NaiveDateTime;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// All the sightings of one craft, oldest first. Always at least 2 sightings.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub entity_id: i64,
    pub observations: Vec<Observation>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.observations.len()
    }
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Grouped {
    /// In order of each craft's first sighting in the input
    pub trajectories: Vec<Trajectory>,
    /// Craft seen only once, which can't have a route
    pub single_observation: Vec<Observation>,
}

impl Grouped {
    pub fn get(&self, entity_id: i64) -> Option<&Trajectory> {
        self.trajectories.iter().find(|t| t.entity_id == entity_id)
    }

    /// How many notification pairs these trajectories will make
    pub fn num_pairs(&self) -> usize {
        self.trajectories.iter().map(|t| t.len() - 1).sum()
    }
}

/// Group the observations per craft, and sort each craft's sightings by time.
///
/// The sort is stable, so sightings with the same timestamp stay in input order.
pub fn group_by_entity(observations: &[Observation]) -> Grouped {
    let mut entity_idx: HashMap<i64, usize> = HashMap::new();
    let mut groups: Vec<Trajectory> = Vec::new();
    for obs in observations {
        let idx = *entity_idx.entry(obs.entity_id).or_insert_with(|| {
            groups.push(Trajectory {
                entity_id: obs.entity_id,
                observations: Vec::new(),
            });
            groups.len() - 1
        });
        groups[idx].observations.push(obs.clone());
    }

    let mut grouped = Grouped::default();
    for group in groups {
        if group.len() == 1 {
            grouped.single_observation.extend(group.observations);
        } else {
            grouped.trajectories.push(group);
        }
    }
    grouped
        .trajectories
        .par_iter_mut()
        .for_each(|t| t.observations.sort_by_key(|o| o.timestamp));

    debug!(
        "Grouped {} sightings into {} craft with routes, and {} craft with one sighting",
        observations.len().to_formatted_string(&Locale::en),
        grouped.trajectories.len().to_formatted_string(&Locale::en),
        grouped.single_observation.len().to_formatted_string(&Locale::en),
    );

    grouped
}

/// A sighting, with the time until the next sighting of the same craft
#[derive(Debug, Clone, PartialEq)]
pub struct SightingRange {
    pub entity_id: i64,
    pub notification: i64,
    pub date: NaiveDateTime,
    /// Date of the next sighting. The last sighting ends when it starts.
    pub end_date: NaiveDateTime,
    pub x: f64,
    pub y: f64,
}

impl SightingRange {
    pub fn date_range(&self) -> String {
        format!(
            "{} - {}",
            self.date.format(DATE_FORMAT),
            self.end_date.format(DATE_FORMAT)
        )
    }
}

pub fn sighting_ranges(trajectory: &Trajectory) -> impl Iterator<Item = SightingRange> + '_ {
    let obs = &trajectory.observations;
    obs.iter().enumerate().map(move |(i, o)| SightingRange {
        entity_id: o.entity_id,
        notification: o.notification,
        date: o.timestamp,
        end_date: obs.get(i + 1).map_or(o.timestamp, |next| next.timestamp),
        x: o.x,
        y: o.y,
    })
}
