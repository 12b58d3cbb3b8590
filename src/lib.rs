//! Reconstruct the routes craft took along a linear network (e.g. canals) from time-stamped
//! sightings, and count how many routes cross each fixed section of the network.
use log::{debug, trace, warn};
use rayon::prelude::*;

use num_format::{Locale, ToFormattedString};

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::collections::HashMap;

pub mod geometry;
pub mod graph;
pub mod dij;
pub mod network;

pub mod observation;
pub mod grouping;
pub mod pairs;
pub mod route;
pub mod collector;
pub mod pipeline;

pub mod segments;
pub mod density;

pub mod fileio;
pub mod formatting;
pub mod report;

pub use collector::{FailedPair, RouteCollector};
pub use density::{DensityMap, DensityOptions, DensityRecord, aggregate_density, dissolve};
pub use grouping::{Grouped, Trajectory, group_by_entity};
pub use network::{Network, RoutingNetwork};
pub use observation::{CleanseOptions, Observation, read_observations};
pub use pairs::{NotificationPair, NotificationPairs, RouteIdAllocator};
pub use pipeline::reconstruct_routes;
pub use route::{ResolveOptions, Route, RouteFailure, resolve_pair};
pub use segments::{FixedSegment, SegmentIndex};
