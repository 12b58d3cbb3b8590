use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use itertools::Itertools;
use num_format::{Locale, ToFormattedString};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use craft_density::fileio::{self, OutputGeometryType, write_geojson_features_directly};
use craft_density::formatting::{format_duration, format_percent};
use craft_density::{
    CleanseOptions, DensityOptions, Network, ResolveOptions, SegmentIndex, aggregate_density,
    dissolve, group_by_entity, read_observations, reconstruct_routes, report,
};

mod cli_args;

/// How many rejected rows to log individually
const MAX_REJECTED_LOGGED: usize = 10;

fn main() -> Result<()> {
    let args = cli_args::Args::parse();

    let logger = env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .build();
    let progress_bars = MultiProgress::new();
    LogWrapper::new(progress_bars.clone(), logger).try_init()?;
    let show_progress_bars = args.verbose.log_level_filter() >= log::Level::Info;
    if !show_progress_bars {
        progress_bars.set_draw_target(ProgressDrawTarget::hidden());
    }

    let global_start = Instant::now();
    info!(
        "Welcome to craft-density v{}. Have fun! :)",
        std::env!("CARGO_PKG_VERSION"),
    );

    if let Some(threads) = args.threads {
        anyhow::ensure!(threads > 0, "--threads must be at least 1");
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Setting up thread pool")?;
        debug!("Using {} threads", threads);
    }

    anyhow::ensure!(
        args.outputs().next().is_some(),
        "Nothing to do. You need to specify one of --routes/--density/--dissolved/--diagnostics/--sightings-output"
    );
    anyhow::ensure!(
        args.snap_tolerance >= 0. && args.search_radius > 0. && args.midpoint_buffer >= 0.,
        "Distances must be positive (snap tolerance {}, search radius {}, midpoint buffer {})",
        args.snap_tolerance,
        args.search_radius,
        args.midpoint_buffer
    );
    for output in [&args.routes, &args.density, &args.dissolved]
        .into_iter()
        .flatten()
    {
        fileio::format_for_filename(output)?;
    }
    if !args.overwrite {
        if let Some(existing) = args.outputs().find(|p| p.exists()) {
            warn!(
                "Output file {} already exists and --overwrite not used. Refusing to overwrite, and exiting early",
                existing.display()
            );
            return Ok(());
        }
    }
    info!(
        "Output(s): {}",
        args.outputs().map(|p| p.display()).join(", ")
    );

    let file_reading_style = ProgressStyle::with_template(
        "[{elapsed_precise}] {percent:>3}% done. eta {eta:>4} {bar:10.cyan/blue} {bytes:>7}/{total_bytes:7} {per_sec:>12} {msg}",
    )?;
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] {percent:>3}% done. eta {eta:>4} {bar:10.cyan/blue} {pos:>7}/{len:7} {per_sec:>12} {msg}",
    )?;

    // Sightings
    let started = Instant::now();
    let input_fp = File::open(&args.sightings)
        .with_context(|| format!("Opening sightings file {}", args.sightings.display()))?;
    let input_bar = progress_bars.add(
        ProgressBar::new(input_fp.metadata()?.len())
            .with_message("Reading sightings")
            .with_style(file_reading_style.clone()),
    );
    let cleanse = CleanseOptions {
        noise_entity: (!args.no_noise_entity).then_some(args.noise_entity),
    };
    let ingested = read_observations(input_bar.wrap_read(input_fp), &cleanse)
        .with_context(|| format!("Reading sightings file {}", args.sightings.display()))?;
    input_bar.finish_and_clear();
    progress_bars.remove(&input_bar);
    info!(
        "Read {} sightings in {}. Dropped {} with a zero coordinate, {} of the noise craft, and {} duplicates",
        ingested.observations.len().to_formatted_string(&Locale::en),
        format_duration(started.elapsed()),
        ingested.num_zero_coordinate.to_formatted_string(&Locale::en),
        ingested.num_noise.to_formatted_string(&Locale::en),
        ingested.num_duplicate.to_formatted_string(&Locale::en),
    );
    if !ingested.rejected.is_empty() {
        warn!(
            "{} row(s) in the sightings file couldn't be read",
            ingested.rejected.len().to_formatted_string(&Locale::en)
        );
        for rej in ingested.rejected.iter().take(MAX_REJECTED_LOGGED) {
            warn!("Line {}: {}", rej.line, rej.error);
        }
        if args.strict {
            anyhow::bail!(
                "{} bad row(s) in {}, and --strict is set",
                ingested.rejected.len(),
                args.sightings.display()
            );
        }
    }

    let grouped = group_by_entity(&ingested.observations);
    info!(
        "{} craft to route, with {} sighting pairs. {} craft only seen once",
        grouped.trajectories.len().to_formatted_string(&Locale::en),
        grouped.num_pairs().to_formatted_string(&Locale::en),
        grouped.single_observation.len().to_formatted_string(&Locale::en),
    );

    if let Some(ref path) = args.sightings_output {
        let num = report::write_sighting_ranges(create_output(path)?, &grouped)?;
        info!(
            "Wrote {} sightings to {}",
            num.to_formatted_string(&Locale::en),
            path.display()
        );
    }

    // Network
    let started = Instant::now();
    let lines = fileio::read_network_lines_from_path(&args.network)?;
    let network = Network::from_lines(lines, args.node_merge_tolerance)
        .with_context(|| format!("Building network from {}", args.network.display()))?;
    info!(
        "Network of {} edges & {} vertexes loaded in {}",
        network.num_edges().to_formatted_string(&Locale::en),
        network.num_vertexes().to_formatted_string(&Locale::en),
        format_duration(started.elapsed()),
    );

    // Routes
    let started = Instant::now();
    let resolve_options = ResolveOptions {
        snap_tolerance: args.snap_tolerance,
        search_radius: args.search_radius,
    };
    let route_bar = progress_bars.add(
        ProgressBar::new(grouped.num_pairs() as u64)
            .with_message("Calculating routes")
            .with_style(style.clone()),
    );
    let collector = reconstruct_routes(&network, &grouped, &resolve_options, &route_bar);
    route_bar.finish_and_clear();
    progress_bars.remove(&route_bar);
    anyhow::ensure!(
        collector.pairs_seen() == grouped.num_pairs(),
        "Only {} of {} sighting pairs were processed",
        collector.pairs_seen(),
        grouped.num_pairs()
    );
    info!(
        "Calculated {} routes ({} of pairs) in {}. {} pair(s) couldn't be routed",
        collector.routes().len().to_formatted_string(&Locale::en),
        format_percent(collector.routes().len(), collector.pairs_seen()),
        format_duration(started.elapsed()),
        collector.failures().len().to_formatted_string(&Locale::en),
    );

    if let Some(ref path) = args.routes {
        let mut f = create_output(path)?;
        let num = write_geojson_features_directly(
            collector.routes().iter().map(report::route_feature),
            &mut f,
            fileio::format_for_filename(path)?,
            OutputGeometryType::LineString,
        )?;
        f.flush()?;
        info!(
            "Wrote {} routes to {}",
            num.to_formatted_string(&Locale::en),
            path.display()
        );
    }

    if let Some(ref path) = args.diagnostics {
        let num = report::write_diagnostics(
            create_output(path)?,
            collector.failures(),
            &grouped.single_observation,
            &ingested.rejected,
        )?;
        info!(
            "Wrote {} diagnostic rows to {}",
            num.to_formatted_string(&Locale::en),
            path.display()
        );
    }

    // Density
    if let Some(ref segments_path) = args.segments {
        let started = Instant::now();
        let segments =
            fileio::read_segments_from_path(segments_path, &args.segment_id_property)?;
        anyhow::ensure!(
            !segments.is_empty(),
            "No segments in {}",
            segments_path.display()
        );
        let segments = SegmentIndex::new(segments)?;
        let density_bar = progress_bars.add(
            ProgressBar::new(collector.routes().len() as u64)
                .with_message("Counting crossings")
                .with_style(style.clone()),
        );
        let density = aggregate_density(
            collector.routes(),
            &segments,
            &DensityOptions {
                midpoint_buffer: args.midpoint_buffer,
            },
            &density_bar,
        );
        density_bar.finish_and_clear();
        progress_bars.remove(&density_bar);
        info!(
            "Counted {} crossings over {} segments in {}. {} data problem(s)",
            density.total_crossings().to_formatted_string(&Locale::en),
            density.records.len().to_formatted_string(&Locale::en),
            format_duration(started.elapsed()),
            density.issues.len().to_formatted_string(&Locale::en),
        );

        if let Some(ref path) = args.density {
            let mut f = create_output(path)?;
            let num = write_geojson_features_directly(
                report::density_features(&density, &segments),
                &mut f,
                fileio::format_for_filename(path)?,
                OutputGeometryType::LineString,
            )?;
            f.flush()?;
            info!(
                "Wrote {} segments to {}",
                num.to_formatted_string(&Locale::en),
                path.display()
            );
        }
        if let Some(ref path) = args.dissolved {
            let dissolved = dissolve(&density, &segments)?;
            let mut f = create_output(path)?;
            let num = write_geojson_features_directly(
                dissolved.iter().map(report::dissolved_feature),
                &mut f,
                fileio::format_for_filename(path)?,
                OutputGeometryType::LineString,
            )?;
            f.flush()?;
            info!(
                "Wrote {} dissolved lines to {}",
                num.to_formatted_string(&Locale::en),
                path.display()
            );
        }
    }

    info!(
        "Finished all in {}",
        format_duration(global_start.elapsed())
    );
    Ok(())
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let f = File::create(path)
        .with_context(|| format!("Creating output file {}", path.display()))?;
    Ok(BufWriter::new(f))
}
