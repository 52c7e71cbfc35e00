pub mod cli;
pub mod data;
pub mod dates;
pub mod export;
pub mod io_utils;
pub mod matching;
pub mod normalize;
pub mod registry;
pub mod resolve;
pub mod rollup;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{BatchArgs, Cli, Commands, InputArgs, LatestDateArgs, OutputArgs},
    data::RawRecord,
    matching::CandidateSet,
    normalize::normalize_batch,
    registry::Registry,
};

pub use crate::{
    data::Value,
    normalize::{AggregateRole, CanonicalRow, ColumnDescriptor, NormalizedBatch, normalize},
    registry::{LogicalField, NumericPolicy, ValueKind},
    resolve::{FieldResolution, resolve},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("report_normalizer", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Resolve(args) => handle_resolve(&args),
        Commands::Normalize(args) => handle_normalize(&args),
        Commands::Columns(args) => handle_columns(&args),
        Commands::Rollup(args) => handle_rollup(&args),
        Commands::LatestDate(args) => handle_latest_date(&args),
        Commands::Registry => {
            print!("{}", Registry::builtin_yaml());
            Ok(())
        }
    }
}

fn load_registry(args: &BatchArgs) -> Result<Registry> {
    match &args.registry {
        Some(path) => Registry::load(path),
        None => Registry::builtin().context("Loading built-in registry"),
    }
}

fn read_input(args: &InputArgs) -> Result<Vec<RawRecord>> {
    let format = io_utils::resolve_input_format(&args.input, args.input_format);
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    info!(
        "Reading {:?} records from '{}' with delimiter '{}'",
        format,
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let records = io_utils::read_records(&args.input, format, delimiter)?;
    info!("Read {} record(s)", records.len());
    Ok(records)
}

fn load_batch(args: &BatchArgs) -> Result<(Registry, Vec<RawRecord>)> {
    let registry = load_registry(args)?;
    let mut records = read_input(&args.input)?;
    if let Some(raw) = &args.report_date {
        let target = dates::parse_report_date(raw).ok_or_else(|| {
            anyhow!("Invalid --report-date '{raw}': expected YYYY-MM-DD, YYYYMMDD or YYYY/MM/DD")
        })?;
        let matcher = registry
            .field(&args.date_field)
            .map(|field| field.candidates().clone())
            .unwrap_or_else(|| CandidateSet::new([args.date_field.as_str()]));
        let before = records.len();
        records = dates::filter_by_date(records, &matcher, target);
        info!(
            "Kept {} of {} record(s) dated {}",
            records.len(),
            before,
            target
        );
    }
    debug!(
        "Using registry '{}' with {} field(s)",
        registry.name(),
        registry.fields().len()
    );
    Ok((registry, records))
}

fn handle_resolve(args: &BatchArgs) -> Result<()> {
    let (registry, records) = load_batch(args)?;
    let resolution = resolve(&records, &registry);
    print!("{}", export::render_resolution(&resolution, &registry));
    let resolved = resolution.iter().filter(|r| r.key.is_some()).count();
    info!(
        "Resolved {} of {} field(s) across {} record(s)",
        resolved,
        resolution.len(),
        records.len()
    );
    Ok(())
}

fn handle_normalize(args: &OutputArgs) -> Result<()> {
    let (registry, records) = load_batch(&args.batch)?;
    let batch = normalize_batch(&records, &registry);
    let writer = io_utils::open_output(args.output.as_deref())?;
    export::write_rows(writer, &batch.rows, &batch.columns, args.format)
        .context("Writing canonical rows")?;
    info!(
        "Normalized {} row(s) across {} column(s)",
        batch.rows.len(),
        batch.columns.len()
    );
    Ok(())
}

fn handle_columns(args: &BatchArgs) -> Result<()> {
    let (registry, records) = load_batch(args)?;
    let batch = normalize_batch(&records, &registry);
    print!("{}", export::render_columns(&batch.columns));
    info!("Listed {} column(s)", batch.columns.len());
    Ok(())
}

fn handle_rollup(args: &OutputArgs) -> Result<()> {
    let (registry, records) = load_batch(&args.batch)?;
    let batch = normalize_batch(&records, &registry);
    let grouped = rollup::rollup(&batch.rows, &batch.columns);
    let writer = io_utils::open_output(args.output.as_deref())?;
    export::write_rollup(writer, &grouped, &batch.columns, args.format)
        .context("Writing rolled-up rows")?;
    info!(
        "Rolled {} row(s) up into {} group(s)",
        batch.rows.len(),
        grouped.len()
    );
    Ok(())
}

fn handle_latest_date(args: &LatestDateArgs) -> Result<()> {
    let records = read_input(&args.input)?;
    let matcher = CandidateSet::new(args.fields.iter().map(String::as_str));
    match dates::latest_date(&records, &matcher) {
        Some(date) => println!("{}", date.format("%Y-%m-%d")),
        None => info!("No report date found in {} record(s)", records.len()),
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
