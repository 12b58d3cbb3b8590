//! Sightings of craft, and reading them from CSV
use super::*;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::io::Read;

/// The entity id used in the source data for sightings which aren't a real craft
pub const DEFAULT_NOISE_ENTITY: i64 = 991100;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// One sighting of one craft
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Identifies this sighting
    pub notification: i64,
    pub entity_id: i64,
    pub timestamp: NaiveDateTime,
    pub x: f64,
    pub y: f64,
}

impl Observation {
    pub fn location(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObservationError {
    #[error("missing value for {0}")]
    MissingField(&'static str),
    #[error("{field} value {value:?} is not a number")]
    BadNumber { field: &'static str, value: String },
    #[error("unrecognised date/time {0:?}")]
    BadTimestamp(String),
    #[error("{0} coordinate is not finite")]
    NonFinite(&'static str),
    #[error("unreadable row: {0}")]
    Unreadable(String),
}

/// A row that couldn't be turned into an observation
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    /// 1-based line in the input (the header is line 1)
    pub line: u64,
    pub error: ObservationError,
}

#[derive(Debug, Clone)]
pub struct CleanseOptions {
    /// Sightings of this entity are dropped
    pub noise_entity: Option<i64>,
}

impl Default for CleanseOptions {
    fn default() -> Self {
        CleanseOptions {
            noise_entity: Some(DEFAULT_NOISE_ENTITY),
        }
    }
}

/// The result of reading the sightings. `observations` is in input order.
#[derive(Debug, Default)]
pub struct Ingested {
    pub observations: Vec<Observation>,
    pub rejected: Vec<Rejected>,
    pub num_zero_coordinate: usize,
    pub num_noise: usize,
    pub num_duplicate: usize,
}

/// Which CSV column holds each field
#[derive(Debug)]
struct Columns {
    notification: usize,
    entity_id: usize,
    timestamp: usize,
    x: usize,
    y: usize,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |aliases: &[&str]| -> Result<usize> {
            headers
                .iter()
                .position(|h| aliases.iter().any(|a| h.trim().eq_ignore_ascii_case(a)))
                .with_context(|| {
                    format!(
                        "No column called any of {:?} in the sightings file (headers: {:?})",
                        aliases, headers
                    )
                })
        };
        Ok(Columns {
            notification: find(&["notification"])?,
            entity_id: find(&["entity_id", "equipment", "craft"])?,
            timestamp: find(&["timestamp", "date"])?,
            x: find(&["x", "easting"])?,
            y: find(&["y", "northing"])?,
        })
    }

    fn parse(&self, record: &csv::StringRecord) -> Result<Observation, ObservationError> {
        let field = |idx: usize, name: &'static str| {
            record
                .get(idx)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .ok_or(ObservationError::MissingField(name))
        };
        let int = |idx: usize, name: &'static str| -> Result<i64, ObservationError> {
            let value = field(idx, name)?;
            value.parse::<i64>().map_err(|_| ObservationError::BadNumber {
                field: name,
                value: value.to_string(),
            })
        };
        let coord = |idx: usize, name: &'static str| -> Result<f64, ObservationError> {
            let value = field(idx, name)?;
            let num = value
                .parse::<f64>()
                .map_err(|_| ObservationError::BadNumber {
                    field: name,
                    value: value.to_string(),
                })?;
            if num.is_finite() {
                Ok(num)
            } else {
                Err(ObservationError::NonFinite(name))
            }
        };

        Ok(Observation {
            notification: int(self.notification, "notification")?,
            entity_id: int(self.entity_id, "entity_id")?,
            timestamp: parse_timestamp(field(self.timestamp, "timestamp")?)?,
            x: coord(self.x, "x")?,
            y: coord(self.y, "y")?,
        })
    }
}

/// Parse the date/time formats seen in sightings exports. A bare date is midnight.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, ObservationError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Ok(dt);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ObservationError::BadTimestamp(s.to_string()))
}

/// Read & cleanse sightings from CSV.
///
/// Malformed rows are returned in `rejected`. Sightings with a zero coordinate, sightings of the
/// noise entity, and exact duplicates are dropped and counted. Only a missing column or an I/O
/// error is an `Err`.
pub fn read_observations(rdr: impl Read, options: &CleanseOptions) -> Result<Ingested> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let columns = Columns::from_headers(rdr.headers().context("Reading sightings header")?)?;
    debug!("Sightings columns: {:?}", columns);

    let mut ingested = Ingested::default();
    let mut seen = HashSet::new();
    for record in rdr.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) if e.is_io_error() => {
                return Err(e).context("Reading sightings");
            }
            Err(e) => {
                ingested.rejected.push(Rejected {
                    line: e.position().map_or(0, |p| p.line()),
                    error: ObservationError::Unreadable(e.to_string()),
                });
                continue;
            }
        };
        let line = record.position().map_or(0, |p| p.line());
        let obs = match columns.parse(&record) {
            Ok(obs) => obs,
            Err(error) => {
                trace!("Rejected line {}: {}", line, error);
                ingested.rejected.push(Rejected { line, error });
                continue;
            }
        };

        if obs.x == 0. || obs.y == 0. {
            ingested.num_zero_coordinate += 1;
            continue;
        }
        if options.noise_entity == Some(obs.entity_id) {
            ingested.num_noise += 1;
            continue;
        }
        if !seen.insert((
            obs.entity_id,
            obs.notification,
            obs.timestamp,
            obs.x.to_bits(),
            obs.y.to_bits(),
        )) {
            ingested.num_duplicate += 1;
            continue;
        }
        ingested.observations.push(obs);
    }

    Ok(ingested)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn timestamps() {
        assert_eq!(
            parse_timestamp("2016-02-01 10:20:30").unwrap(),
            ts("2016-02-01 10:20:30")
        );
        assert_eq!(
            parse_timestamp("2016-02-01T10:20:30Z").unwrap(),
            ts("2016-02-01 10:20:30")
        );
        assert_eq!(
            parse_timestamp("01/02/2016 10:20").unwrap(),
            ts("2016-02-01 10:20:00")
        );
        assert_eq!(
            parse_timestamp(" 2016-02-01 ").unwrap(),
            ts("2016-02-01 00:00:00")
        );
        assert_eq!(
            parse_timestamp("yesterday"),
            Err(ObservationError::BadTimestamp("yesterday".to_string()))
        );
    }

    #[test]
    fn export_column_names() {
        let csv = "Notification,Equipment,Date,Easting,Northing\n\
                   1,42,2016-01-01 09:00:00,400000.5,300000\n";
        let res = read_observations(csv.as_bytes(), &CleanseOptions::default()).unwrap();
        assert_eq!(
            res.observations,
            vec![Observation {
                notification: 1,
                entity_id: 42,
                timestamp: ts("2016-01-01 09:00:00"),
                x: 400000.5,
                y: 300000.,
            }]
        );
        assert!(res.rejected.is_empty());
    }

    #[test]
    fn missing_column() {
        let csv = "notification,entity_id,timestamp,x\n1,1,2016-01-01,1\n";
        assert!(read_observations(csv.as_bytes(), &CleanseOptions::default()).is_err());
    }

    #[test]
    fn cleansing() {
        let csv = "notification,entity_id,timestamp,x,y\n\
                   1,1,2016-01-01,10,10\n\
                   2,1,2016-01-02,0,10\n\
                   3,1,2016-01-03,10,0\n\
                   4,991100,2016-01-04,10,10\n\
                   1,1,2016-01-01,10,10\n\
                   5,1,2016-01-05,11,11\n";
        let res = read_observations(csv.as_bytes(), &CleanseOptions::default()).unwrap();
        assert_eq!(
            res.observations
                .iter()
                .map(|o| o.notification)
                .collect::<Vec<_>>(),
            vec![1, 5]
        );
        assert_eq!(res.num_zero_coordinate, 2);
        assert_eq!(res.num_noise, 1);
        assert_eq!(res.num_duplicate, 1);

        let keep_noise = CleanseOptions { noise_entity: None };
        let res = read_observations(csv.as_bytes(), &keep_noise).unwrap();
        assert_eq!(res.observations.len(), 3);
    }

    #[test]
    fn malformed_rows_rejected() {
        let csv = "notification,entity_id,timestamp,x,y\n\
                   1,1,2016-01-01,10,10\n\
                   2,,2016-01-02,10,10\n\
                   3,1,not a date,10,10\n\
                   4,1,2016-01-04,NaN,10\n\
                   5,1,2016-01-05,ten,10\n\
                   6,1,2016-01-06,10\n";
        let res = read_observations(csv.as_bytes(), &CleanseOptions::default()).unwrap();
        assert_eq!(res.observations.len(), 1);
        assert_eq!(
            res.rejected,
            vec![
                Rejected {
                    line: 3,
                    error: ObservationError::MissingField("entity_id")
                },
                Rejected {
                    line: 4,
                    error: ObservationError::BadTimestamp("not a date".to_string())
                },
                Rejected {
                    line: 5,
                    error: ObservationError::NonFinite("x")
                },
                Rejected {
                    line: 6,
                    error: ObservationError::BadNumber {
                        field: "x",
                        value: "ten".to_string()
                    }
                },
                Rejected {
                    line: 7,
                    error: ObservationError::MissingField("y")
                },
            ]
        );
    }
}
