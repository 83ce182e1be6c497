use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Encode categorical columns and reconcile generated tables against reference data",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer column types from a CSV file into a YAML schema
    Probe(ProbeArgs),
    /// Fit a categorical codec on reference data and save it
    Fit(FitArgs),
    /// Replace categorical values with their integer codes
    Encode(EncodeArgs),
    /// Clamp, re-type, and decode a generated CSV against reference data
    Reconcile(ReconcileArgs),
    /// Show the per-column type class and observed range of reference data
    Envelope(EnvelopeArgs),
}

/// Delimiter and encoding flags shared by every command that reads CSV.
#[derive(Debug, Clone, Args)]
pub struct CsvOptions {
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

/// Categorical columns and row identity rule, either from a YAML file or
/// from flags.
#[derive(Debug, Clone, Args)]
pub struct ConfigOptions {
    /// Reconcile config YAML (categorical_columns, row_identity, unclassified)
    #[arg(short = 'c', long = "config", conflicts_with = "categorical")]
    pub config: Option<PathBuf>,
    /// Comma-separated categorical columns (used when --config is omitted)
    #[arg(long = "categorical", value_delimiter = ',')]
    pub categorical: Vec<String>,
    /// Column whose missing cells cause decoded rows to be dropped
    #[arg(long = "identity-column")]
    pub identity_column: Option<String>,
    /// Keep decoded rows even when the identity column is missing
    #[arg(long = "keep-missing-identity")]
    pub keep_missing_identity: bool,
    /// Disable the row identity rule entirely
    #[arg(long = "no-identity", conflicts_with_all = ["identity_column", "keep_missing_identity"])]
    pub no_identity: bool,
    /// Fail instead of passing through boolean/date/datetime columns
    #[arg(long = "reject-unclassified")]
    pub reject_unclassified: bool,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input CSV file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination schema YAML file
    #[arg(short = 's', long = "schema")]
    pub schema: PathBuf,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long, default_value_t = 2000)]
    pub sample_rows: usize,
    #[command(flatten)]
    pub csv: CsvOptions,
}

#[derive(Debug, Args)]
pub struct FitArgs {
    /// Reference CSV file
    #[arg(short = 'r', long = "reference")]
    pub reference: PathBuf,
    /// Schema YAML for the reference file (inferred when omitted)
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
    /// Destination codec file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    #[command(flatten)]
    pub config: ConfigOptions,
    #[command(flatten)]
    pub csv: CsvOptions,
}

#[derive(Debug, Args)]
pub struct EncodeArgs {
    /// Input CSV file to encode
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Schema YAML for the input file (inferred when omitted)
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
    /// Codec file produced by `fit`
    #[arg(long = "codec")]
    pub codec: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    #[command(flatten)]
    pub csv: CsvOptions,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Generated candidate CSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Schema YAML for the candidate file (inferred when omitted)
    #[arg(long = "input-schema")]
    pub input_schema: Option<PathBuf>,
    /// Reference CSV file the candidate must conform to
    #[arg(short = 'r', long = "reference")]
    pub reference: PathBuf,
    /// Schema YAML for the reference file (inferred when omitted)
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
    /// Codec file produced by `fit` (fitted on the reference when omitted)
    #[arg(long = "codec")]
    pub codec: Option<PathBuf>,
    /// Leave categorical columns as integer codes
    #[arg(long = "no-decode")]
    pub no_decode: bool,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    #[command(flatten)]
    pub config: ConfigOptions,
    #[command(flatten)]
    pub csv: CsvOptions,
}

#[derive(Debug, Args)]
pub struct EnvelopeArgs {
    /// Reference CSV file
    #[arg(short = 'r', long = "reference")]
    pub reference: PathBuf,
    /// Schema YAML for the reference file (inferred when omitted)
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
    /// Encode categorical columns before measuring ranges
    #[arg(long = "encoded")]
    pub encoded: bool,
    /// Emit JSON instead of a table
    #[arg(long = "json")]
    pub json: bool,
    #[command(flatten)]
    pub config: ConfigOptions,
    #[command(flatten)]
    pub csv: CsvOptions,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_delimiter_accepts_names_and_chars() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
    }

    #[test]
    fn categorical_flag_splits_on_commas() {
        let cli = Cli::try_parse_from([
            "synth-reconcile",
            "fit",
            "-r",
            "ref.csv",
            "-o",
            "codec.bin",
            "--categorical",
            "device,acctsessionid",
        ])
        .unwrap();
        match cli.command {
            Commands::Fit(args) => {
                assert_eq!(args.config.categorical, vec!["device", "acctsessionid"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
