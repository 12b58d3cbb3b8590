use clap::Parser;
use clap_verbosity_flag::Verbosity;
use std::path::PathBuf;

use craft_density::density::DEFAULT_MIDPOINT_BUFFER;
use craft_density::fileio::DEFAULT_SEGMENT_ID_PROPERTY;
use craft_density::observation::DEFAULT_NOISE_ENTITY;
use craft_density::route::{DEFAULT_SEARCH_RADIUS, DEFAULT_SNAP_TOLERANCE};

/// Reconstruct craft routes from sightings, and count route crossings per network segment
///
/// Reads a CSV of craft sightings, and a GeoJSON of the network lines. Each pair of consecutive
/// sightings of a craft is routed along the shortest path of the network. With `--segments`
/// & `--density`, the number of routes which cross each segment is calculated.
///
/// All distances are in the units of the input coordinates (e.g. metres for British National
/// Grid).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Args {
    /// Sightings CSV. Needs columns for the notification, craft (`entity_id`/`Equipment`), date
    /// (`timestamp`/`Date`), `x`/`Easting` & `y`/`Northing`
    #[arg(short, long, value_name = "SIGHTINGS.csv")]
    pub sightings: PathBuf,

    /// Network lines, as GeoJSON (or GeoJSONSeq) LineStrings/MultiLineStrings
    #[arg(short, long, value_name = "NETWORK.geojson")]
    pub network: PathBuf,

    /// Fixed segments to count crossings on, as GeoJSON (or GeoJSONSeq)
    #[arg(long, value_name = "SEGMENTS.geojson")]
    pub segments: Option<PathBuf>,

    /// Write the routes here
    /// Filename .geojson will be GeoJSON, .geojsons will be GeoJSONSeq
    #[arg(short, long, value_name = "ROUTES.geojson[s]")]
    pub routes: Option<PathBuf>,

    /// Write the crossing count per segment here. One feature per segment.
    #[arg(long, value_name = "DENSITY.geojson[s]", requires = "segments")]
    pub density: Option<PathBuf>,

    /// Write the segments merged by crossing count here
    #[arg(long, value_name = "DISSOLVED.geojson[s]", requires = "segments")]
    pub dissolved: Option<PathBuf>,

    /// CSV of every sighting pair that couldn't be routed, craft seen only once, and rejected
    /// input rows
    #[arg(long, value_name = "DIAGNOSTICS.csv")]
    pub diagnostics: Option<PathBuf>,

    /// CSV of the routed craft's sightings, in order, with the date of the next sighting
    #[arg(long, value_name = "SIGHTINGS.csv")]
    pub sightings_output: Option<PathBuf>,

    /// If the output file(s) already exists, overwrite it. By default, exit if the output already
    /// exists
    #[arg(long)]
    pub overwrite: bool,

    /// Fail if any sightings row can't be read. By default bad rows are skipped & reported.
    #[arg(long)]
    pub strict: bool,

    /// A sighting within this distance of the end of a network line is put on that end
    #[arg(long, value_name = "DISTANCE", default_value_t = DEFAULT_SNAP_TOLERANCE)]
    pub snap_tolerance: f64,

    /// Sightings further than this from the network can't be routed
    #[arg(long, value_name = "DISTANCE", default_value_t = DEFAULT_SEARCH_RADIUS)]
    pub search_radius: f64,

    /// Network line ends closer than this are joined
    #[arg(long, value_name = "DISTANCE", default_value_t = 0.01)]
    pub node_merge_tolerance: f64,

    /// A route crosses a segment when it passes within this distance of the segment's midpoint
    #[arg(long, value_name = "DISTANCE", default_value_t = DEFAULT_MIDPOINT_BUFFER)]
    pub midpoint_buffer: f64,

    /// Sightings of this craft are ignored
    #[arg(long, value_name = "ID", default_value_t = DEFAULT_NOISE_ENTITY, conflicts_with = "no_noise_entity")]
    pub noise_entity: i64,

    /// Don't ignore any craft
    #[arg(long)]
    pub no_noise_entity: bool,

    /// Property with the segment id. The feature `id` is used if it's not set.
    #[arg(long, value_name = "KEY", default_value = DEFAULT_SEGMENT_ID_PROPERTY)]
    pub segment_id_property: String,

    /// Number of threads to use. Default: one per CPU
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    #[command(flatten)]
    pub verbose: Verbosity<clap_verbosity_flag::InfoLevel>,
}

impl Args {
    /// All the output files asked for
    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        [
            &self.routes,
            &self.density,
            &self.dissolved,
            &self.diagnostics,
            &self.sightings_output,
        ]
        .into_iter()
        .flatten()
    }
}
