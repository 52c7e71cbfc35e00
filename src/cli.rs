use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Resolve and normalize loosely-structured report records",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show which physical key each registry field resolves to
    Resolve(BatchArgs),
    /// Emit canonical rows for a record batch
    Normalize(OutputArgs),
    /// List the column descriptors derived for a record batch
    Columns(BatchArgs),
    /// Group canonical rows by their grouping fields and aggregate the rest
    Rollup(OutputArgs),
    /// Print the latest report date found in a record batch
    LatestDate(LatestDateArgs),
    /// Print the built-in registry YAML
    Registry,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum InputFormat {
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Table,
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Record batch to read (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Input format (defaults from the file extension, otherwise json)
    #[arg(long = "input-format", value_enum)]
    pub input_format: Option<InputFormat>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Registry YAML describing the logical fields (built-in DQ registry if omitted)
    #[arg(short = 'r', long = "registry")]
    pub registry: Option<PathBuf>,
    /// Keep only records whose report date equals this date
    #[arg(long = "report-date")]
    pub report_date: Option<String>,
    /// Field whose candidates locate the report date
    #[arg(long = "date-field", default_value = "report_date")]
    pub date_field: String,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    #[command(flatten)]
    pub batch: BatchArgs,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output rendering
    #[arg(long = "format", value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct LatestDateArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Candidate field name used to locate the report date
    #[arg(long = "field", default_value = "report_date", action = clap::ArgAction::Append)]
    pub fields: Vec<String>,
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

    #[test]
    fn parse_delimiter_accepts_names_and_single_chars() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
