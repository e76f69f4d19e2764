//! spillsort CLI: externally sort CSV files by key columns.

mod config;
mod csv_io;
mod error;

use std::cmp::Ordering;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use csv::StringRecord;
use spillsort_core::compare::{Comparator, KeyComparator, SortKey};
use spillsort_core::config::{Compression, MergeStrategy, SortConfig};
use spillsort_core::schema::Schema;
use spillsort_core::types::Record;
use spillsort_run::{BinaryCodec, JsonCodec, RecordCodec};
use spillsort_sort::ExternalSorter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::{apply_config_file, ConfigFile};
use error::CliError;

#[derive(Parser)]
#[command(name = "spillsort")]
#[command(about = "External merge sort for CSV files that do not fit in memory", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set (e.g. `info`, `spillsort_sort=debug`)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort a headered CSV file
    Sort(SortArgs),

    /// Check that a CSV file is already sorted
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct SortArgs {
    /// Input CSV (first line is the header). Repeat to merge several files
    /// that share one schema.
    #[arg(short, long, required = true)]
    input: Vec<PathBuf>,

    /// Output CSV; the header is copied from the first input
    #[arg(short, long)]
    output: PathBuf,

    /// Sort key: `name`, `-name` or `name:desc:nulls_last`. Repeat for tie-breakers.
    #[arg(short, long = "key", required = true, allow_hyphen_values = true, value_parser = parse_key)]
    keys: Vec<SortKey>,

    /// Column types as `name:type[?],...`; unlisted columns are nullable utf8
    #[arg(long)]
    schema: Option<String>,

    /// Records per run (overrides config)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Byte cap on the in-memory batch (overrides config)
    #[arg(long)]
    mem_cap: Option<usize>,

    /// Directory for run files (overrides config)
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Run file compression: none, zstd or lz4
    #[arg(long, value_parser = parse_compression)]
    compression: Option<Compression>,

    /// Merge frontier: linear or heap
    #[arg(long = "merge", value_parser = parse_merge)]
    merge: Option<MergeStrategy>,

    /// Record encoding inside run files
    #[arg(long, value_enum, default_value_t = CodecKind::Binary)]
    codec: CodecKind,

    /// YAML file with SortConfig fields
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long = "key", required = true, allow_hyphen_values = true, value_parser = parse_key)]
    keys: Vec<SortKey>,

    #[arg(long)]
    schema: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CodecKind {
    Binary,
    Json,
}

fn parse_key(s: &str) -> Result<SortKey, String> {
    s.parse().map_err(|e: spillsort_core::Error| e.to_string())
}

fn parse_compression(s: &str) -> Result<Compression, String> {
    s.parse().map_err(|e: spillsort_core::Error| e.to_string())
}

fn parse_merge(s: &str) -> Result<MergeStrategy, String> {
    s.parse().map_err(|e: spillsort_core::Error| e.to_string())
}

fn setup_tracing(level: &str) -> Result<(), CliError> {
    let directive = level
        .parse()
        .map_err(|e| CliError::Usage(format!("bad --log-level '{level}': {e}")))?;
    let filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| CliError::Usage(format!("cannot install logger: {e}")))
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = setup_tracing(&cli.log_level) {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    match cli.command {
        Commands::Sort(args) => match run_sort(&args) {
            Ok(records) => {
                tracing::info!(records, output = %args.output.display(), "sorted");
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Check(args) => match run_check(&args) {
            Ok(records) => println!("✓ {} is sorted ({} records)", args.input.display(), records),
            Err(e @ CliError::Unsorted { .. }) => {
                eprintln!("Not sorted: {}", e);
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    }
}

/// Defaults < environment < YAML file < flags.
fn resolve_config(args: &SortArgs, mut cfg: SortConfig) -> Result<SortConfig, CliError> {
    if let Some(path) = &args.config {
        let doc = ConfigFile::load(path)?;
        apply_config_file(&mut cfg, &doc);
    }
    if let Some(v) = args.batch_size {
        cfg.batch_size = v;
    }
    if let Some(v) = args.mem_cap {
        cfg.mem_cap_bytes = Some(v);
    }
    if let Some(dir) = &args.scratch_dir {
        cfg.scratch_dir = dir.clone();
    }
    if let Some(v) = args.compression {
        cfg.compression = v;
    }
    if let Some(v) = args.merge {
        cfg.merge_strategy = v;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run_sort(args: &SortArgs) -> Result<u64, CliError> {
    let cfg = resolve_config(args, SortConfig::from_env())?;

    let (headers, schema, readers) = open_inputs(&args.input, args.schema.as_deref())?;
    let cmp = KeyComparator::new(&schema, &args.keys)?;
    tracing::debug!(
        ?cfg,
        inputs = readers.len(),
        keys = args.keys.len(),
        columns = schema.len(),
        "resolved sort"
    );

    let row_schema = schema.clone();
    let rows = readers
        .into_iter()
        .flat_map(move |reader| csv_io::rows(reader, row_schema.clone()))
        .map(|row| row.map(|(_, record)| record));
    let mut out = csv::Writer::from_path(&args.output)?;
    out.write_record(&headers)?;

    let written = match args.codec {
        CodecKind::Binary => sort_into(ExternalSorter::new(BinaryCodec::new(schema), cmp), cfg, rows, &mut out)?,
        CodecKind::Json => sort_into(ExternalSorter::new(JsonCodec::new(schema), cmp), cfg, rows, &mut out)?,
    };
    out.flush()?;
    Ok(written)
}

/// Open every input and derive its schema. All inputs must be compatible
/// with the first one; its header is the one written out.
fn open_inputs(
    paths: &[PathBuf],
    types: Option<&str>,
) -> Result<(StringRecord, Schema, Vec<csv::Reader<File>>), CliError> {
    let mut first: Option<(StringRecord, Schema)> = None;
    let mut readers = Vec::with_capacity(paths.len());
    for path in paths {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let schema = csv_io::schema_for(&headers, types)?;
        match &first {
            Some((_, expected)) if !expected.is_compatible(&schema) => {
                return Err(CliError::SchemaMismatch {
                    path: path.clone(),
                    expected: expected.to_string(),
                    found: schema.to_string(),
                });
            }
            Some(_) => {}
            None => first = Some((headers, schema)),
        }
        readers.push(reader);
    }
    let (headers, schema) =
        first.ok_or_else(|| CliError::Usage("at least one --input is required".into()))?;
    Ok((headers, schema, readers))
}

fn sort_into<C, I, W>(
    sorter: ExternalSorter<C, KeyComparator>,
    cfg: SortConfig,
    rows: I,
    out: &mut csv::Writer<W>,
) -> Result<u64, CliError>
where
    C: RecordCodec<Record = Record>,
    I: IntoIterator<Item = Result<Record, CliError>>,
    W: Write,
{
    let stream = sorter.with_config(cfg).try_sort(rows)?;
    let stats = stream.stats().clone();
    let mut written = 0u64;
    for record in stream {
        csv_io::write_record(out, &record?)?;
        written += 1;
    }
    tracing::info!(
        records = written,
        runs = stats.runs,
        bytes_spilled = stats.bytes_spilled,
        "merge finished"
    );
    Ok(written)
}

fn run_check(args: &CheckArgs) -> Result<u64, CliError> {
    let mut reader = csv::Reader::from_path(&args.input)?;
    let headers = reader.headers()?.clone();
    let schema = csv_io::schema_for(&headers, args.schema.as_deref())?;
    let cmp = KeyComparator::new(&schema, &args.keys)?;

    let mut previous: Option<(u64, Record)> = None;
    let mut records = 0u64;
    for row in csv_io::rows(reader, schema) {
        let (line, record) = row?;
        if let Some((prev_line, prev)) = &previous {
            if cmp.compare(prev, &record) == Ordering::Greater {
                return Err(CliError::Unsorted {
                    line,
                    previous: *prev_line,
                });
            }
        }
        previous = Some((line, record));
        records += 1;
    }
    Ok(records)
}
