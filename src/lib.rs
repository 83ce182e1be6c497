pub mod cli;
pub mod codec;
pub mod config;
pub mod data;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod io_utils;
pub mod reconcile;
pub mod schema;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

pub use crate::{
    codec::{CategoricalCodec, CodeTable},
    config::{MissingIdentity, ReconcileConfig, RowIdentityPolicy, UnclassifiedPolicy},
    data::Value,
    envelope::{Bounds, ReferenceEnvelope},
    error::ReconcileError,
    frame::{Column, Table},
    reconcile::{RangeAndTypeReconciler, SemanticType},
    schema::{ColumnType, Schema},
};

use crate::cli::{
    Cli, Commands, ConfigOptions, CsvOptions, EncodeArgs, EnvelopeArgs, FitArgs, ProbeArgs,
    ReconcileArgs,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("synth_reconcile", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Fit(args) => handle_fit(&args),
        Commands::Encode(args) => handle_encode(&args),
        Commands::Reconcile(args) => handle_reconcile(&args),
        Commands::Envelope(args) => handle_envelope(&args),
    }
}

fn handle_probe(args: &ProbeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.csv.delimiter);
    let encoding = io_utils::resolve_encoding(args.csv.input_encoding.as_deref())?;
    info!(
        "Probing '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let schema = schema::infer_schema(&args.input, args.sample_rows, delimiter, encoding)
        .with_context(|| format!("Inferring schema from {:?}", args.input))?;
    schema
        .save(&args.schema)
        .with_context(|| format!("Writing schema to {:?}", args.schema))?;
    info!(
        "Inferred schema for {} column(s) written to {:?}",
        schema.columns.len(),
        args.schema
    );
    Ok(())
}

fn handle_fit(args: &FitArgs) -> Result<()> {
    let config = resolve_config(&args.config)?;
    let reference = load_table(&args.reference, args.schema.as_deref(), &args.csv)?;
    let codec = CategoricalCodec::fit(&config, &reference)
        .with_context(|| format!("Fitting codec on {:?}", args.reference))?;
    codec
        .save(&args.output)
        .with_context(|| format!("Writing codec to {:?}", args.output))?;
    info!(
        "Fitted {} categorical column(s) on {} row(s) -> {:?}",
        config.categorical_columns.len(),
        reference.row_count(),
        args.output
    );
    Ok(())
}

fn handle_encode(args: &EncodeArgs) -> Result<()> {
    let codec = CategoricalCodec::load(&args.codec)
        .with_context(|| format!("Loading codec from {:?}", args.codec))?;
    let input = load_table_for_codec(&args.input, args.schema.as_deref(), &args.csv, &codec)?;
    let encoded = codec
        .transform(&input)
        .with_context(|| format!("Encoding {:?}", args.input))?;
    write_output(
        &encoded,
        &args.input,
        args.output.as_deref(),
        args.output_delimiter,
        args.output_encoding.as_deref(),
        &args.csv,
    )?;
    info!("Encoded {} row(s)", encoded.row_count());
    Ok(())
}

fn handle_reconcile(args: &ReconcileArgs) -> Result<()> {
    let mut config = resolve_config(&args.config)?;
    let loaded = match &args.codec {
        Some(path) => {
            let codec = CategoricalCodec::load(path)
                .with_context(|| format!("Loading codec from {path:?}"))?;
            let fitted: Vec<String> = codec.columns().map(str::to_string).collect();
            if config.categorical_columns.is_empty() {
                config.categorical_columns = fitted;
            } else if config.categorical_columns != fitted {
                bail!(
                    "Codec {path:?} was fitted on columns [{}] but the configuration lists [{}]",
                    fitted.join(", "),
                    config.categorical_columns.join(", ")
                );
            }
            Some(codec.with_row_identity(config.row_identity.clone()))
        }
        None => None,
    };
    let reference = match &loaded {
        Some(codec) => {
            load_table_for_codec(&args.reference, args.schema.as_deref(), &args.csv, codec)?
        }
        None => load_table(&args.reference, args.schema.as_deref(), &args.csv)?,
    };
    let candidate = load_table(&args.input, args.input_schema.as_deref(), &args.csv)?;
    let codec = match loaded {
        Some(codec) => codec,
        None => CategoricalCodec::fit(&config, &reference)
            .with_context(|| format!("Fitting codec on {:?}", args.reference))?,
    };

    let encoded_reference = codec
        .transform(&reference)
        .with_context(|| format!("Encoding reference {:?}", args.reference))?;
    let reconciler = RangeAndTypeReconciler::new(&config, encoded_reference)?;
    let reconciled = reconciler
        .transform(&candidate)
        .with_context(|| format!("Reconciling {:?}", args.input))?;
    let output = if args.no_decode {
        reconciled
    } else {
        codec
            .decode(&reconciled)
            .with_context(|| format!("Decoding reconciled {:?}", args.input))?
    };

    write_output(
        &output,
        &args.input,
        args.output.as_deref(),
        args.output_delimiter,
        args.output_encoding.as_deref(),
        &args.csv,
    )?;
    info!(
        "Reconciled {} of {} row(s) across {} column(s)",
        output.row_count(),
        candidate.row_count(),
        output.columns().len()
    );
    Ok(())
}

fn handle_envelope(args: &EnvelopeArgs) -> Result<()> {
    let config = resolve_config(&args.config)?;
    let mut reference = load_table(&args.reference, args.schema.as_deref(), &args.csv)?;
    if args.encoded {
        let codec = CategoricalCodec::fit(&config, &reference)
            .with_context(|| format!("Fitting codec on {:?}", args.reference))?;
        reference = codec.transform(&reference)?;
    }
    let reconciler = RangeAndTypeReconciler::new(&config, reference)?;
    let envelope = reconciler.envelope();

    let rows: Vec<Vec<String>> = reconciler
        .classification()
        .iter()
        .map(|class| {
            let (min, max) = envelope
                .bounds(&class.name)
                .map(|b| (b.min.as_display(), b.max.as_display()))
                .unwrap_or_default();
            vec![
                class.name.clone(),
                class.datatype.to_string(),
                class.class.to_string(),
                min,
                max,
            ]
        })
        .collect();

    if args.json {
        let entries: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                serde_json::json!({
                    "column": row[0],
                    "datatype": row[1],
                    "class": row[2],
                    "min": (!row[3].is_empty()).then(|| row[3].clone()),
                    "max": (!row[4].is_empty()).then(|| row[4].clone()),
                })
            })
            .collect();
        let rendered =
            serde_json::to_string_pretty(&entries).context("Serializing envelope report")?;
        println!("{rendered}");
    } else {
        let headers = ["column", "type", "class", "min", "max"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        table::print_table(&headers, &rows);
    }
    info!("Reported envelope for {} column(s)", rows.len());
    Ok(())
}

/// Builds the reconcile configuration from `--config` or from flags, with
/// identity and unclassified flags applied on top.
fn resolve_config(options: &ConfigOptions) -> Result<ReconcileConfig> {
    let mut config = match &options.config {
        Some(path) => ReconcileConfig::load(path)?,
        None => ReconcileConfig::new(
            options
                .categorical
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty()),
        ),
    };
    if options.no_identity {
        config = config.without_row_identity();
    } else {
        if let Some(column) = &options.identity_column {
            config = config.with_row_identity(RowIdentityPolicy::drop_missing(column.trim()));
        }
        if options.keep_missing_identity
            && let Some(policy) = config.row_identity.as_mut()
        {
            policy.on_missing = MissingIdentity::Keep;
        }
    }
    if options.reject_unclassified {
        config = config.with_unclassified(UnclassifiedPolicy::Reject);
    }
    config.validate()?;
    debug!("Resolved configuration: {:?}", config);
    Ok(config)
}

fn load_table(path: &Path, schema_path: Option<&Path>, csv: &CsvOptions) -> Result<Table> {
    let schema = resolve_schema(path, schema_path, csv)?;
    read_table(path, &schema, csv)
}

/// Loads a table whose codec columns keep the types the codec was fitted on
/// when the schema is inferred rather than given.
fn load_table_for_codec(
    path: &Path,
    schema_path: Option<&Path>,
    csv: &CsvOptions,
    codec: &CategoricalCodec,
) -> Result<Table> {
    let mut schema = resolve_schema(path, schema_path, csv)?;
    if schema_path.is_none() {
        for meta in &mut schema.columns {
            if let Some(codes) = codec.code_table(&meta.name)
                && meta.datatype != codes.datatype()
            {
                debug!(
                    "Column '{}' inferred as {} but fitted as {}; using {}",
                    meta.name,
                    meta.datatype,
                    codes.datatype(),
                    codes.datatype()
                );
                meta.datatype = codes.datatype();
            }
        }
    }
    read_table(path, &schema, csv)
}

fn resolve_schema(path: &Path, schema_path: Option<&Path>, csv: &CsvOptions) -> Result<Schema> {
    let delimiter = io_utils::resolve_input_delimiter(path, csv.delimiter);
    let encoding = io_utils::resolve_encoding(csv.input_encoding.as_deref())?;
    match schema_path {
        Some(schema_path) => Schema::load(schema_path)
            .with_context(|| format!("Loading schema from {schema_path:?}")),
        None if io_utils::is_dash(path) => {
            bail!("Reading from stdin requires a schema file; run `probe` first")
        }
        None => schema::infer_schema(path, 0, delimiter, encoding)
            .with_context(|| format!("Inferring schema from {path:?}")),
    }
}

fn read_table(path: &Path, schema: &Schema, csv: &CsvOptions) -> Result<Table> {
    let delimiter = io_utils::resolve_input_delimiter(path, csv.delimiter);
    let encoding = io_utils::resolve_encoding(csv.input_encoding.as_deref())?;
    let table = Table::read_csv(path, schema, delimiter, encoding)
        .with_context(|| format!("Loading {path:?}"))?;
    debug!(
        "Loaded {} row(s) x {} column(s) from {:?}",
        table.row_count(),
        table.columns().len(),
        path
    );
    Ok(table)
}

fn write_output(
    table: &Table,
    input: &Path,
    output: Option<&Path>,
    output_delimiter: Option<u8>,
    output_encoding: Option<&str>,
    csv: &CsvOptions,
) -> Result<()> {
    let input_delimiter = io_utils::resolve_input_delimiter(input, csv.delimiter);
    let delimiter = io_utils::resolve_output_delimiter(output, output_delimiter, input_delimiter);
    let encoding = io_utils::resolve_encoding(output_encoding)?;
    table.write_csv(output, delimiter, encoding)
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
