//! vani: flood coverage assessment from the command line.
//!
//! Thresholds segmentation probability rasters, clips them to field
//! polygons, and reports how much of each field is under water.
//!
//! - `assess`: a probability raster file, optionally clipped to a field
//! - `by-field`: find the tile covering a field in the manifests and assess it
//! - `demo`: a synthetic flood patch, no data required
//! - `fields`: list the fields in the field catalog
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin vani -- [OPTIONS] <COMMAND>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod demo;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use vani_coverage::{
    BinaryMask, CoverageConfig, CoverageError, FieldCatalog, FieldClip, FieldOutcome,
    FieldPolygon, GeoBounds, TileIndexKind, assess, assess_field,
};
use vani_export::{CoverageReport, mask_to_png};
use vani_io::{FsTileSource, GeoJsonFieldCatalog, discover_fields_file, read_probability_grid};

/// Manifest directory used by `by-field` when `--manifests` is not given,
/// relative to the project root.
const DEFAULT_MANIFEST_DIR: &str = "processed/manifests";

/// Exit status when a command ran cleanly but had nothing to assess.
const EXIT_NOT_ASSESSED: u8 = 2;

/// Flood coverage for agricultural fields.
///
/// Reads flood probability rasters, applies a threshold, and reports the
/// flooded share of the raster and of a field polygon inside it.
#[derive(Parser)]
#[command(name = "vani", version)]
struct Cli {
    /// Log verbosity. Logs go to stderr.
    #[arg(short, long, value_enum, default_value_t = LogLevel::Warn, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assess a probability raster (JSON grid or grayscale PNG).
    Assess(AssessArgs),

    /// Find the first tile overlapping a field and assess it.
    ///
    /// Exits with status 2 when no tile overlaps the field or the field has
    /// no coordinates.
    ByField(ByFieldArgs),

    /// Assess a synthetic circular flood patch.
    Demo(DemoArgs),

    /// List the fields in the field catalog.
    Fields(FieldsArgs),
}

#[derive(Args)]
struct AssessArgs {
    /// Probability raster, `.json` or `.png`.
    grid: PathBuf,

    /// Raster extent as `south,west,north,east` in degrees.
    #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
    bounds: Option<GeoBounds>,

    /// Clip the in-field percentage to this field.
    #[arg(long, requires = "bounds")]
    field_id: Option<String>,

    #[command(flatten)]
    source: FieldSource,

    #[command(flatten)]
    coverage: CoverageArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct ByFieldArgs {
    /// Field to assess.
    #[arg(long)]
    field_id: String,

    /// Directory holding the tile manifests [default: <ROOT>/processed/manifests].
    #[arg(long)]
    manifests: Option<PathBuf>,

    #[command(flatten)]
    source: FieldSource,

    #[command(flatten)]
    coverage: CoverageArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct DemoArgs {
    /// Tile edge length in pixels.
    #[arg(long, default_value_t = demo::DEFAULT_SIZE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    size: u32,

    /// Flood patch radius in pixels [default: size / 6].
    #[arg(long)]
    radius: Option<f64>,

    #[command(flatten)]
    coverage: CoverageArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct FieldsArgs {
    #[command(flatten)]
    source: FieldSource,

    /// Print the listing as JSON.
    #[arg(long)]
    json: bool,
}

/// Where the field catalog is read from.
#[derive(Args)]
struct FieldSource {
    /// Field catalog GeoJSON [default: <ROOT>/data/sample_fields.geojson,
    /// then ./data/sample_fields.geojson].
    #[arg(long)]
    fields: Option<PathBuf>,

    /// Project root that manifest tile paths are relative to.
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

/// Assessment parameters.
#[derive(Args)]
struct CoverageArgs {
    /// Probability cutoff; cells strictly above it are flooded.
    #[arg(long, default_value_t = CoverageConfig::DEFAULT_THRESHOLD, allow_hyphen_values = true)]
    threshold: f64,

    /// Tile catalog search strategy.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_INDEX)]
    tile_index: Index,

    /// Full coverage config as a JSON string.
    ///
    /// When provided, `--threshold` and `--tile-index` are ignored.
    /// The JSON must be a valid `CoverageConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Args)]
struct OutputArgs {
    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Write the flood mask as a PNG to this path.
    #[arg(long)]
    mask_out: Option<PathBuf>,
}

/// Tile catalog search strategy selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Index {
    /// Scan every record.
    Linear,
    /// Query an R*-tree over the tile extents.
    Rtree,
}

/// Maps a [`TileIndexKind`] to the local CLI [`Index`] enum.
const fn index_from_config(kind: TileIndexKind) -> Index {
    match kind {
        TileIndexKind::Linear => Index::Linear,
        TileIndexKind::RTree => Index::Rtree,
    }
}

const CLI_DEFAULT_INDEX: Index = index_from_config(CoverageConfig::DEFAULT_TILE_INDEX);

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

/// Parse `south,west,north,east`, optionally wrapped in brackets.
fn parse_bounds(s: &str) -> Result<GeoBounds, String> {
    let inner = s
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(s);
    let values = inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid coordinate {:?}: {e}", part.trim()))
        })
        .collect::<Result<Vec<f64>, String>>()?;
    let array: [f64; 4] = values
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected 4 values (south,west,north,east), got {}", v.len()))?;
    GeoBounds::try_from(array).map_err(|e| e.to_string())
}

/// Build a [`CoverageConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored. Either way the result is validated.
fn config_from_cli(args: &CoverageArgs) -> Result<CoverageConfig, String> {
    let config = if let Some(ref json) = args.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        CoverageConfig {
            threshold: args.threshold,
            tile_index: match args.tile_index {
                Index::Linear => TileIndexKind::Linear,
                Index::Rtree => TileIndexKind::RTree,
            },
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn init_logging(level: LogLevel) {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::from(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: could not install logger: {e}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let result = match &cli.command {
        Command::Assess(args) => run_assess(args),
        Command::ByField(args) => run_by_field(args),
        Command::Demo(args) => run_demo(args),
        Command::Fields(args) => run_fields(args),
    };

    match result {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

// ───────────────────────────── Commands ──────────────────────────────

fn run_assess(args: &AssessArgs) -> Result<ExitCode, String> {
    let config = config_from_cli(&args.coverage)?;
    let grid = read_probability_grid(&args.grid).map_err(|e| e.to_string())?;
    tracing::info!(
        path = %args.grid.display(),
        dimensions = %grid.dimensions(),
        "probability grid loaded"
    );

    let field = match &args.field_id {
        Some(field_id) => Some(find_field(&args.source, field_id)?),
        None => None,
    };
    let clip = field
        .as_ref()
        .zip(args.bounds)
        .map(|(field, bounds)| FieldClip { field, bounds });

    let assessment = assess(&grid, &config, clip).map_err(|e| format!("Assessment failed: {e}"))?;

    let mut report = CoverageReport::new(&assessment, config.threshold)
        .with_tile_path(args.grid.display().to_string());
    if let Some(bounds) = args.bounds {
        report = report.with_bounds(bounds);
    }
    if let Some(field_id) = &args.field_id {
        report = report.with_field_id(field_id.as_str());
    }
    emit(&report, &assessment.flood_mask, &args.output)?;
    Ok(ExitCode::SUCCESS)
}

fn run_by_field(args: &ByFieldArgs) -> Result<ExitCode, String> {
    let config = config_from_cli(&args.coverage)?;
    let fields = load_fields(&args.source)?;
    let manifest_dir = args
        .manifests
        .clone()
        .unwrap_or_else(|| args.source.root.join(DEFAULT_MANIFEST_DIR));
    let tiles = FsTileSource::new(manifest_dir).with_project_root(args.source.root.clone());

    let outcome = assess_field(&args.field_id, &config, &fields, &tiles, None)
        .map_err(|e| format!("Assessment failed: {e}"))?;

    let assessed = match outcome {
        FieldOutcome::Assessed(assessed) => assessed,
        other => {
            if args.output.json {
                let json = serde_json::to_string_pretty(&other)
                    .map_err(|e| format!("Error serializing outcome: {e}"))?;
                println!("{json}");
            } else {
                println!("{}", describe_unassessed(&args.field_id, &other));
            }
            return Ok(ExitCode::from(EXIT_NOT_ASSESSED));
        }
    };

    let tile_path = tiles
        .resolve(&assessed.tile.data_reference)
        .map_or_else(|| assessed.tile.data_reference.clone(), |p| p.display().to_string());
    tracing::info!(field_id = %assessed.field_id, tile = %tile_path, "field assessed");

    let report = CoverageReport::new(&assessed.assessment, config.threshold)
        .with_bounds(assessed.tile_bounds)
        .with_field_id(assessed.field_id.as_str())
        .with_tile_path(tile_path);
    emit(&report, &assessed.assessment.flood_mask, &args.output)?;
    Ok(ExitCode::SUCCESS)
}

fn run_demo(args: &DemoArgs) -> Result<ExitCode, String> {
    let config = config_from_cli(&args.coverage)?;
    let radius = args.radius.unwrap_or_else(|| demo::default_radius(args.size));
    let grid = demo::circular_patch(args.size, radius).map_err(|e| e.to_string())?;
    tracing::info!(size = args.size, radius, "synthetic flood patch generated");

    let assessment = assess(&grid, &config, None).map_err(|e| format!("Assessment failed: {e}"))?;
    let report = CoverageReport::new(&assessment, config.threshold);
    emit(&report, &assessment.flood_mask, &args.output)?;
    Ok(ExitCode::SUCCESS)
}

fn run_fields(args: &FieldsArgs) -> Result<ExitCode, String> {
    let catalog = load_fields(&args.source)?;

    if args.json {
        let listing: Vec<serde_json::Value> = catalog
            .fields()
            .iter()
            .map(|field| {
                serde_json::json!({
                    "field_id": field.field_id(),
                    "bounds": field
                        .extent()
                        .map(|r| [r.min().y, r.min().x, r.max().y, r.max().x]),
                    "parts": field.geometry().0.len(),
                })
            })
            .collect();
        let json = serde_json::to_string_pretty(&listing)
            .map_err(|e| format!("Error serializing field listing: {e}"))?;
        println!("{json}");
    } else {
        for field in catalog.fields() {
            match field.extent() {
                Some(r) => println!(
                    "{:<16} S {} W {} N {} E {}",
                    field.field_id(),
                    r.min().y,
                    r.min().x,
                    r.max().y,
                    r.max().x
                ),
                None => println!("{:<16} (empty geometry)", field.field_id()),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ───────────────────────────── Helpers ───────────────────────────────

fn load_fields(source: &FieldSource) -> Result<GeoJsonFieldCatalog, String> {
    let path = match &source.fields {
        Some(path) => path.clone(),
        None => discover_fields_file([source.root.as_path(), Path::new(".")])
            .map_err(|e| e.to_string())?,
    };
    let catalog = GeoJsonFieldCatalog::load(&path).map_err(|e| e.to_string())?;
    tracing::info!(path = %path.display(), fields = catalog.len(), "field catalog loaded");
    Ok(catalog)
}

fn find_field(source: &FieldSource, field_id: &str) -> Result<FieldPolygon, String> {
    load_fields(source)?
        .lookup_field(field_id)
        .ok_or_else(|| CoverageError::FieldNotFound(field_id.to_owned()).to_string())
}

fn describe_unassessed(field_id: &str, outcome: &FieldOutcome) -> String {
    match outcome {
        FieldOutcome::NoOverlappingTile {
            field_extent: [south, west, north, east],
        } => format!("no tile overlaps field {field_id} (S {south} W {west} N {north} E {east})"),
        FieldOutcome::EmptyFootprint => format!("field {field_id} has no coordinates"),
        FieldOutcome::Assessed(_) => format!("field {field_id} assessed"),
    }
}

/// Print `report` and write the mask PNG if requested.
fn emit(report: &CoverageReport, mask: &BinaryMask, output: &OutputArgs) -> Result<(), String> {
    if let Some(ref path) = output.mask_out {
        let png = mask_to_png(mask).map_err(|e| e.to_string())?;
        std::fs::write(path, &png)
            .map_err(|e| format!("Error writing mask to {}: {e}", path.display()))?;
        tracing::info!(path = %path.display(), bytes = png.len(), "flood mask written");
    }

    if output.json {
        println!("{}", report.to_json().map_err(|e| e.to_string())?);
    } else {
        println!("{report}");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn coverage_args(cli: Cli) -> CoverageArgs {
        match cli.command {
            Command::Assess(args) => args.coverage,
            Command::ByField(args) => args.coverage,
            Command::Demo(args) => args.coverage,
            Command::Fields(_) => unreachable!("fields takes no coverage flags"),
        }
    }

    // --- argument definition tests ---

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn field_id_requires_bounds() {
        let result = Cli::try_parse_from(["vani", "assess", "grid.json", "--field-id", "101"]);
        assert!(result.is_err());
    }

    #[test]
    fn negative_bounds_are_accepted() {
        let cli = Cli::try_parse_from([
            "vani",
            "assess",
            "grid.json",
            "--bounds",
            "-10,-60,-9,-59",
            "--field-id",
            "101",
        ])
        .unwrap();
        let Command::Assess(args) = cli.command else {
            unreachable!("parsed an assess command");
        };
        assert_eq!(args.bounds.unwrap().to_array(), [-10.0, -60.0, -9.0, -59.0]);
        assert_eq!(args.field_id.as_deref(), Some("101"));
    }

    #[test]
    fn log_level_is_global() {
        let cli = Cli::try_parse_from(["vani", "demo", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert_eq!(tracing::Level::from(cli.log_level), tracing::Level::DEBUG);
    }

    #[test]
    fn demo_size_must_be_positive() {
        assert!(Cli::try_parse_from(["vani", "demo", "--size", "0"]).is_err());
    }

    // --- bounds parsing tests ---

    #[test]
    fn bounds_parse_plain_and_bracketed() {
        let plain = parse_bounds("1.5, 2, 3.5, 4").unwrap();
        let bracketed = parse_bounds("[1.5,2,3.5,4]").unwrap();
        assert_eq!(plain, bracketed);
        assert_eq!(plain.to_array(), [1.5, 2.0, 3.5, 4.0]);
    }

    #[test]
    fn bounds_reject_wrong_count() {
        let err = parse_bounds("1,2,3").unwrap_err();
        assert!(err.contains("expected 4 values"), "{err}");
    }

    #[test]
    fn bounds_reject_non_numbers() {
        let err = parse_bounds("1,2,north,4").unwrap_err();
        assert!(err.contains("\"north\""), "{err}");
    }

    #[test]
    fn bounds_reject_inverted_extent() {
        assert!(parse_bounds("5,0,1,10").is_err());
    }

    // --- config tests ---

    #[test]
    fn config_from_flags() {
        let cli = Cli::try_parse_from([
            "vani",
            "demo",
            "--threshold",
            "0.7",
            "--tile-index",
            "rtree",
        ])
        .unwrap();
        let config = config_from_cli(&coverage_args(cli)).unwrap();
        assert!((config.threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.tile_index, TileIndexKind::RTree);
    }

    #[test]
    fn config_defaults_match_library() {
        let cli = Cli::try_parse_from(["vani", "demo"]).unwrap();
        assert_eq!(
            config_from_cli(&coverage_args(cli)).unwrap(),
            CoverageConfig::default()
        );
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = Cli::try_parse_from([
            "vani",
            "demo",
            "--threshold",
            "0.9",
            "--config-json",
            r#"{"threshold":0.25}"#,
        ])
        .unwrap();
        let config = config_from_cli(&coverage_args(cli)).unwrap();
        assert!((config.threshold - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.tile_index, TileIndexKind::Linear);
    }

    #[test]
    fn malformed_config_json_is_reported() {
        let cli =
            Cli::try_parse_from(["vani", "demo", "--config-json", "{threshold"]).unwrap();
        let err = config_from_cli(&coverage_args(cli)).unwrap_err();
        assert!(err.starts_with("Error parsing --config-json"), "{err}");
    }

    #[test]
    fn non_finite_threshold_is_rejected() {
        let cli = Cli::try_parse_from(["vani", "demo", "--threshold", "NaN"]).unwrap();
        assert!(config_from_cli(&coverage_args(cli)).is_err());
    }

    // --- output tests ---

    #[test]
    fn unassessed_outcomes_are_described() {
        let text = describe_unassessed(
            "remote",
            &FieldOutcome::NoOverlappingTile {
                field_extent: [50.0, 50.0, 51.0, 51.0],
            },
        );
        assert_eq!(text, "no tile overlaps field remote (S 50 W 50 N 51 E 51)");
        let flat = describe_unassessed(
            "ditch",
            &FieldOutcome::NoOverlappingTile {
                field_extent: [5.0, 20.0, 5.0, 28.0],
            },
        );
        assert_eq!(flat, "no tile overlaps field ditch (S 5 W 20 N 5 E 28)");
        assert_eq!(
            describe_unassessed("blank", &FieldOutcome::EmptyFootprint),
            "field blank has no coordinates"
        );
    }
}
