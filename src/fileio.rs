//! Reading line features from GeoJSON, and writing GeoJSON(Seq) directly.
use super::*;
use crate::segments::FixedSegment;
use itertools::Itertools;
use serde_json::Value;
use std::io::{Read, Write};
use std::path::Path;

pub const DEFAULT_SEGMENT_ID_PROPERTY: &str = "LineID";

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum OutputFormat {
    GeoJSON,
    GeoJSONSeq,
}

/// `.geojsons` is GeoJSONSeq, `.geojson` (or `.json`) is GeoJSON
pub fn format_for_filename(filename: &Path) -> Result<OutputFormat> {
    match filename.extension().and_then(|e| e.to_str()) {
        Some("geojsons") => Ok(OutputFormat::GeoJSONSeq),
        Some("geojson") | Some("json") => Ok(OutputFormat::GeoJSON),
        _ => anyhow::bail!(
            "Unsupported output format for {}. Use .geojson or .geojsons",
            filename.display()
        ),
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum OutputGeometryType {
    MultiLineString,
    LineString,
}

impl OutputGeometryType {
    fn bytes(&self) -> &'static [u8] {
        match self {
            OutputGeometryType::MultiLineString => b"MultiLineString",
            OutputGeometryType::LineString => b"LineString",
        }
    }
}

/// Write a geojson featurecollection (or GeoJSONSeq), but manually construct it.
///
/// For `LineString` only the first line of each feature is written. A feature with no lines gets
/// a null geometry.
#[allow(clippy::type_complexity)]
pub fn write_geojson_features_directly(
    features: impl Iterator<Item = (Value, Vec<Vec<(f64, f64)>>)>,
    mut f: &mut impl Write,
    output_format: OutputFormat,
    output_geometry_type: OutputGeometryType,
) -> Result<usize> {
    let mut num_written = 0;

    if output_format == OutputFormat::GeoJSON {
        f.write_all(b"{\"type\":\"FeatureCollection\", \"features\": [\n")?;
    }
    for feature in features {
        if output_format == OutputFormat::GeoJSON && num_written > 0 {
            f.write_all(b",\n")?;
        }
        if output_format == OutputFormat::GeoJSONSeq {
            f.write_all(b"\x1E")?;
        }
        f.write_all(b"{\"properties\":")?;
        serde_json::to_writer(&mut f, &feature.0)?;
        if feature.1.iter().all(|l| l.is_empty()) {
            f.write_all(b", \"geometry\": null")?;
        } else {
            f.write_all(b", \"geometry\": {\"type\":\"")?;
            f.write_all(output_geometry_type.bytes())?;
            f.write_all(b"\", \"coordinates\": ")?;
            match output_geometry_type {
                OutputGeometryType::LineString => {
                    write_linestring_coords(
                        f,
                        feature
                            .1
                            .iter()
                            .find(|l| !l.is_empty())
                            .map(Vec::as_slice)
                            .unwrap_or_default(),
                    )?
                }
                OutputGeometryType::MultiLineString => {
                    f.write_all(b"[")?;
                    for (i, linestring) in feature.1.iter().filter(|l| !l.is_empty()).enumerate() {
                        if i != 0 {
                            f.write_all(b",")?;
                        }
                        write_linestring_coords(f, linestring)?;
                    }
                    f.write_all(b"]")?;
                }
            }
            f.write_all(b"}")?;
        }
        f.write_all(b", \"type\": \"Feature\"}")?;
        if output_format == OutputFormat::GeoJSONSeq {
            f.write_all(b"\x0A")?;
        }
        num_written += 1;
    }
    if output_format == OutputFormat::GeoJSON {
        f.write_all(b"\n]}")?;
    }

    Ok(num_written)
}

fn write_linestring_coords(f: &mut impl Write, coords: &[(f64, f64)]) -> Result<()> {
    f.write_all(b"[")?;
    for (j, c) in coords.iter().enumerate() {
        if j != 0 {
            f.write_all(b",")?;
        }
        write!(f, "[{:.3}, {:.3}]", c.0, c.1)?;
    }
    f.write_all(b"]")?;
    Ok(())
}

/// A feature from a line GeoJSON file
#[derive(Debug, Clone, PartialEq)]
pub struct LineFeature {
    /// The feature's `id` member, if any
    pub id: Option<String>,
    pub properties: serde_json::Map<String, Value>,
    /// Empty when the feature has no (line) geometry
    pub lines: Vec<Vec<(f64, f64)>>,
}

/// Read every feature from a GeoJSON FeatureCollection, a single Feature, or GeoJSONSeq.
pub fn read_line_features(mut rdr: impl Read) -> Result<Vec<LineFeature>> {
    let mut input = String::new();
    rdr.read_to_string(&mut input)?;

    let values = match serde_json::from_str::<Value>(input.trim()) {
        Ok(Value::Object(mut obj)) => match obj
            .get("type")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .as_deref()
        {
            Some("FeatureCollection") => match obj.remove("features") {
                Some(Value::Array(features)) => features,
                _ => anyhow::bail!("FeatureCollection has no features array"),
            },
            Some("Feature") => vec![Value::Object(obj)],
            other => anyhow::bail!("Expected a FeatureCollection or Feature, got {:?}", other),
        },
        Ok(_) => anyhow::bail!("Expected a GeoJSON object"),
        // GeoJSONSeq: starts with a record separator, or has several JSON lines
        Err(_) if looks_like_geojsonseq(&input) => input
            .lines()
            .map(|l| l.trim_start_matches('\x1E').trim())
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(i, l)| {
                serde_json::from_str::<Value>(l)
                    .with_context(|| format!("Parsing GeoJSONSeq feature #{}", i + 1))
            })
            .collect::<Result<Vec<_>>>()?,
        Err(e) => return Err(e).context("Invalid GeoJSON"),
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| parse_feature(v).with_context(|| format!("Feature #{}", i + 1)))
        .collect()
}

fn looks_like_geojsonseq(input: &str) -> bool {
    input.trim_start().starts_with('\x1E')
        || input
            .lines()
            .filter(|l| serde_json::from_str::<Value>(l).is_ok_and(|v| v.is_object()))
            .nth(1)
            .is_some()
}

fn parse_feature(feature: Value) -> Result<LineFeature> {
    let Value::Object(mut feature) = feature else {
        anyhow::bail!("Feature is not an object");
    };
    let id = feature.remove("id").and_then(value_to_id);
    let properties = match feature.remove("properties") {
        Some(Value::Object(p)) => p,
        _ => Default::default(),
    };
    let lines = match feature.get("geometry") {
        None | Some(Value::Null) => vec![],
        Some(geom) => parse_line_geometry(geom)?,
    };
    Ok(LineFeature {
        id,
        properties,
        lines,
    })
}

fn parse_line_geometry(geom: &Value) -> Result<Vec<Vec<(f64, f64)>>> {
    let coords = geom.get("coordinates");
    match geom.get("type").and_then(|t| t.as_str()) {
        Some("LineString") => Ok(vec![parse_linestring(coords.context("No coordinates")?)?]),
        Some("MultiLineString") => coords
            .and_then(|c| c.as_array())
            .context("MultiLineString coordinates aren't an array")?
            .iter()
            .map(parse_linestring)
            .collect(),
        other => anyhow::bail!("Only LineString & MultiLineString supported, got {:?}", other),
    }
}

fn parse_linestring(coords: &Value) -> Result<Vec<(f64, f64)>> {
    coords
        .as_array()
        .context("LineString coordinates aren't an array")?
        .iter()
        .map(|pos| {
            let x = pos.get(0).and_then(|x| x.as_f64());
            let y = pos.get(1).and_then(|y| y.as_f64());
            x.zip(y)
                .with_context(|| format!("Invalid position {}", pos))
        })
        .collect()
}

fn value_to_id(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read the network lines. Features with no geometry are skipped.
pub fn read_network_lines(rdr: impl Read) -> Result<Vec<Vec<(f64, f64)>>> {
    let features = read_line_features(rdr)?;
    let num_without = features
        .iter()
        .filter(|f| f.lines.iter().all(|l| l.len() < 2))
        .count();
    if num_without > 0 {
        warn!("{} network feature(s) had no usable geometry", num_without);
    }
    Ok(features
        .into_iter()
        .flat_map(|f| f.lines)
        .filter(|l| l.len() >= 2)
        .collect())
}

/// Read the fixed segments. The id comes from `id_property`, else the feature's `id`.
///
/// A MultiLineString segment is joined into one line. A segment with no geometry is kept, with
/// no coordinates.
pub fn read_segments(rdr: impl Read, id_property: &str) -> Result<Vec<FixedSegment>> {
    read_line_features(rdr)?
        .into_iter()
        .enumerate()
        .map(|(i, f)| {
            let segment_id = f
                .properties
                .get(id_property)
                .cloned()
                .and_then(value_to_id)
                .or(f.id)
                .with_context(|| {
                    format!("Segment #{} has no {:?} property, nor an id", i + 1, id_property)
                })?;
            let coords = f.lines.into_iter().flatten().dedup().collect::<Vec<_>>();
            Ok(FixedSegment { segment_id, coords })
        })
        .collect()
}

pub fn read_network_lines_from_path(path: &Path) -> Result<Vec<Vec<(f64, f64)>>> {
    let f = std::fs::File::open(path)
        .with_context(|| format!("Opening network file {}", path.display()))?;
    read_network_lines(std::io::BufReader::new(f))
        .with_context(|| format!("Reading network file {}", path.display()))
}

pub fn read_segments_from_path(path: &Path, id_property: &str) -> Result<Vec<FixedSegment>> {
    let f = std::fs::File::open(path)
        .with_context(|| format!("Opening segments file {}", path.display()))?;
    read_segments(std::io::BufReader::new(f), id_property)
        .with_context(|| format!("Reading segments file {}", path.display()))
}
