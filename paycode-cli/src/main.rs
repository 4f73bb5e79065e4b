//! paycode CLI entry point: inspect scanned payment codes and bitcoin amounts.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use is_terminal::IsTerminal;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use paycode_core::{
    classify, convert, convert_bitcoin_to_fiat, evaluate, format_bitcoin, format_number_groupings,
    parse_bitcoin_uri, sanitize_expression, truncate_code, value_bitcoin, AgentError, AmountError,
    AmountField, AmountSettings, BitcoinUnit, Classification, ClassifyError, ErrorCode, ExprError,
    OutputMode, PaycodeError, Satoshi, UriError,
};

const DEFAULT_LOG_FILTER: &str = "paycode=warn";
const EXIT_VALIDATION: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_IO: i32 = 3;
const EXIT_INTERNAL: i32 = 4;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Auto,
    Json,
    Human,
}

#[derive(Debug, Parser)]
#[command(name = "paycode", version)]
#[command(about = "Classify Lightning/Bitcoin payment codes and convert bitcoin amounts")]
struct Cli {
    /// Output format: auto (tty=human, pipe=agent), json (agent), human (operator).
    #[arg(long, value_enum, default_value = "auto", global = true)]
    output: OutputFormat,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Display unit (bitcoin, milliBitcoin, bit, sat, satoshi).
    #[arg(long, env = "PAYCODE_UNIT", default_value = "sat", global = true)]
    unit: String,

    /// Fiat price of one bitcoin.
    #[arg(long, env = "PAYCODE_FIAT_RATE", global = true)]
    rate: Option<f64>,

    /// Fiat currency code appended to fiat amounts.
    #[arg(long, env = "PAYCODE_FIAT_CODE", global = true)]
    currency: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify one scanned or pasted string.
    Classify { input: String },
    /// Classify every row of a CSV with a `code`, `input` or `payload` column.
    ClassifyBatch { file: PathBuf },
    /// Format a satoshi amount in the display unit.
    Format {
        #[arg(allow_hyphen_values = true)]
        sats: String,
    },
    /// Convert a value between bitcoin units.
    Convert {
        #[arg(allow_hyphen_values = true)]
        value: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Price a satoshi amount in fiat.
    Fiat {
        #[arg(allow_hyphen_values = true)]
        sats: String,
    },
    /// Evaluate a partially typed amount expression.
    Eval {
        #[arg(allow_hyphen_values = true)]
        expr: String,
        /// Value kept when the expression does not evaluate.
        #[arg(long, default_value = "0")]
        previous: String,
    },
    /// Feed text into an amount entry field and show both sides.
    Field {
        #[arg(allow_hyphen_values = true)]
        text: String,
        /// Treat the text as typed into the fiat side.
        #[arg(long)]
        fiat_side: bool,
    },
    /// Parse a BIP21 `bitcoin:` URI.
    Uri { input: String },
}

/// Input that is well-formed for clap but unusable for the command.
#[derive(Debug)]
struct InputError(String);

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InputError {}

/// Detect output mode based on CLI flags and TTY detection.
fn detect_output_mode(output: OutputFormat) -> OutputMode {
    match output {
        OutputFormat::Human => OutputMode::Human,
        OutputFormat::Json => OutputMode::Agent,
        OutputFormat::Auto => {
            if std::io::stdout().is_terminal() {
                OutputMode::Human
            } else {
                OutputMode::Agent
            }
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn human_header(title: &str) {
    println!(
        "{}",
        "╔═══════════════════════════════════════════════════════════════╗".bright_white()
    );
    println!("{}", format!("║  {:<61}║", title).bright_white());
    println!(
        "{}",
        "╚═══════════════════════════════════════════════════════════════╝".bright_white()
    );
    println!();
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn print_agent<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn settings(cli: &Cli) -> Result<AmountSettings> {
    let unit = BitcoinUnit::from_str(&cli.unit)?;
    let settings = AmountSettings::default().with_unit(unit);
    match cli.rate {
        Some(rate) => Ok(settings.with_fiat(rate, cli.currency.clone())?),
        None => Ok(settings),
    }
}

fn require_rate(settings: &AmountSettings) -> Result<f64> {
    settings.fiat_rate.ok_or_else(|| {
        InputError("a fiat rate is required: pass --rate or set PAYCODE_FIAT_RATE".to_string())
            .into()
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyReport {
    input: String,
    kind: &'static str,
    classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    well_known_url: Option<String>,
}

impl ClassifyReport {
    fn new(input: &str, classification: Classification) -> Self {
        let target = classification.lnurl_target();
        let domain = target.and_then(|t| t.domain()).map(str::to_string);
        let inline_tag = target
            .and_then(|t| t.inline_discriminant())
            .map(|tag| tag.to_string());
        let well_known_url = match &classification {
            Classification::LightningAddressRequest { address } => address
                .well_known_url()
                .map(|url| url.to_string())
                .map_err(|err| debug!(error = %err, "no well-known URL for address"))
                .ok(),
            _ => None,
        };
        Self {
            input: input.to_string(),
            kind: classification.kind(),
            classification,
            domain,
            inline_tag,
            well_known_url,
        }
    }

    fn target_text(&self) -> String {
        match &self.classification {
            Classification::Bolt11Invoice { raw } => truncate_code(raw),
            Classification::LightningAddressRequest { address } => address.to_string(),
            other => other
                .lnurl_target()
                .map(|target| target.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn cmd_classify(input: &str, mode: OutputMode) -> Result<()> {
    let report = ClassifyReport::new(input, classify(input)?);
    match mode {
        OutputMode::Agent => print_agent(&report),
        OutputMode::Human => {
            human_header("PAYCODE — Classification");
            let mut table = new_table(&["Field", "Value"]);
            table.add_row(vec![Cell::new("Input"), Cell::new(truncate_code(input))]);
            let kind = match report.classification {
                Classification::Unrecognized => report.kind.yellow().to_string(),
                _ => report.kind.green().to_string(),
            };
            table.add_row(vec![Cell::new("Kind"), Cell::new(kind)]);
            table.add_row(vec![Cell::new("Target"), Cell::new(report.target_text())]);
            if let Some(domain) = &report.domain {
                table.add_row(vec![Cell::new("Domain"), Cell::new(domain)]);
            }
            if let Some(tag) = &report.inline_tag {
                table.add_row(vec![Cell::new("Inline tag"), Cell::new(tag)]);
            }
            if let Some(url) = &report.well_known_url {
                table.add_row(vec![Cell::new("Well-known URL"), Cell::new(url)]);
            }
            println!("{table}");
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRow {
    row: usize,
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<u16>,
}

fn read_batch(path: &Path) -> Result<Vec<BatchRow>> {
    let file = File::open(path).with_context(|| format!("failed to open input file: {path:?}"))?;
    let mut rdr = csv::Reader::from_reader(file);
    let headers = rdr.headers().context("failed to read CSV header")?.clone();
    let column = headers
        .iter()
        .position(|h| matches!(h.trim().to_lowercase().as_str(), "code" | "input" | "payload"))
        .ok_or_else(|| {
            InputError("CSV needs a `code`, `input` or `payload` column".to_string())
        })?;

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let row = i + 2;
        let record = result.with_context(|| format!("csv parse error on row {row}"))?;
        let input = record.get(column).unwrap_or("").trim().to_string();
        let batch_row = match classify(&input) {
            Ok(classification) => {
                let report = ClassifyReport::new(&input, classification);
                BatchRow {
                    row,
                    kind: Some(report.kind),
                    target: Some(report.target_text()),
                    error: None,
                    code: None,
                    input,
                }
            }
            Err(err) => BatchRow {
                row,
                kind: None,
                target: None,
                error: Some(err.to_string()),
                code: Some(err.error_code().code()),
                input,
            },
        };
        rows.push(batch_row);
    }
    Ok(rows)
}

fn cmd_classify_batch(file: &Path, mode: OutputMode) -> Result<()> {
    let rows = read_batch(file)?;
    match mode {
        OutputMode::Agent => print_agent(&rows),
        OutputMode::Human => {
            human_header("PAYCODE — Batch Classification");
            let mut table = new_table(&["Row", "Code", "Kind", "Target"]);
            for row in &rows {
                let (kind, detail) = match (&row.kind, &row.error) {
                    (Some(kind), _) => (
                        format!("{} {}", "✓".green(), kind.green()),
                        row.target.clone().unwrap_or_default(),
                    ),
                    (None, error) => (
                        format!("{} {}", "✗".red(), "decode failed".red()),
                        error.clone().unwrap_or_default(),
                    ),
                };
                table.add_row(vec![
                    Cell::new(row.row),
                    Cell::new(truncate_code(&row.input)),
                    Cell::new(kind),
                    Cell::new(detail),
                ]);
            }
            println!("{table}");
            println!();
            let failed = rows.iter().filter(|row| row.error.is_some()).count();
            println!(
                "{} {}   {} {}",
                "Rows:".bright_white().bold(),
                rows.len().to_string().bright_white().bold(),
                "Failed:".bright_white().bold(),
                failed.to_string().bright_white().bold()
            );
            Ok(())
        }
    }
}

fn cmd_format(sats: &str, settings: &AmountSettings, mode: OutputMode) -> Result<()> {
    let satoshi = Satoshi::from_str(sats)?;
    let formatted = format_bitcoin(satoshi, settings.unit);
    let fiat = settings
        .fiat_rate
        .map(|rate| convert_bitcoin_to_fiat(satoshi, rate, settings.fiat_code.as_deref()))
        .transpose()?;
    match mode {
        OutputMode::Agent => print_agent(&json!({
            "satoshi": satoshi,
            "unit": settings.unit.key(),
            "value": value_bitcoin(satoshi, settings.unit),
            "formatted": formatted,
            "fiat": fiat,
        })),
        OutputMode::Human => {
            println!("{}", formatted.bright_white().bold());
            if let Some(fiat) = fiat {
                println!("{}", fiat.bright_black());
            }
            Ok(())
        }
    }
}

fn cmd_convert(value: &str, from: &str, to: &str, mode: OutputMode) -> Result<()> {
    let amount = Decimal::from_str(value.trim()).map_err(|_| AmountError::InvalidFormat {
        input: value.to_string(),
    })?;
    let from = BitcoinUnit::from_str(from)?;
    let to = BitcoinUnit::from_str(to)?;
    let result = convert(amount, from, to)?.normalize();
    match mode {
        OutputMode::Agent => print_agent(&json!({
            "value": amount.normalize().to_string(),
            "from": from.key(),
            "to": to.key(),
            "result": result.to_string(),
        })),
        OutputMode::Human => {
            println!(
                "{} {} = {} {}",
                format_number_groupings(&amount.normalize().to_string()),
                from.nice(),
                format_number_groupings(&result.to_string()).bright_white().bold(),
                to.nice()
            );
            Ok(())
        }
    }
}

fn cmd_fiat(sats: &str, settings: &AmountSettings, mode: OutputMode) -> Result<()> {
    let satoshi = Satoshi::from_str(sats)?;
    let rate = require_rate(settings)?;
    let fiat = convert_bitcoin_to_fiat(satoshi, rate, settings.fiat_code.as_deref())?;
    match mode {
        OutputMode::Agent => print_agent(&json!({
            "satoshi": satoshi,
            "rate": rate,
            "currency": settings.fiat_code,
            "fiat": fiat,
        })),
        OutputMode::Human => {
            println!("{}", fiat.bright_white().bold());
            Ok(())
        }
    }
}

fn cmd_eval(expr: &str, previous: &str, mode: OutputMode) -> Result<()> {
    let sanitized = sanitize_expression(expr);
    let evaluated = evaluate(expr);
    let (result, error) = match &evaluated {
        Ok(value) => (value.normalize().to_string(), None),
        Err(err) => (previous.to_string(), Some(err)),
    };
    match mode {
        OutputMode::Agent => print_agent(&json!({
            "expression": expr,
            "sanitized": sanitized,
            "result": result,
            "recovered": error.is_some(),
            "error": error.map(ToString::to_string),
        })),
        OutputMode::Human => {
            println!("{}", result.bright_white().bold());
            if let Some(err) = error {
                eprintln!("{} {}", "kept previous value:".yellow(), err);
            }
            Ok(())
        }
    }
}

fn cmd_field(text: &str, fiat_side: bool, settings: AmountSettings, mode: OutputMode) -> Result<()> {
    if fiat_side {
        require_rate(&settings)?;
    }
    let mut field = AmountField::new(settings);
    if fiat_side {
        field.on_change_fiat_input(text);
    } else {
        field.on_change_bitcoin_input(text);
    }
    let satoshi = field.satoshi();
    match mode {
        OutputMode::Agent => print_agent(&json!({
            "unit": field.unit().key(),
            "bitcoin": field.bitcoin_text(),
            "fiat": field.fiat_text(),
            "satoshi": satoshi,
        })),
        OutputMode::Human => {
            let mut table = new_table(&["Side", "Text"]);
            table.add_row(vec![
                Cell::new(field.unit().settings_label()),
                Cell::new(field.bitcoin_text().unwrap_or("-")),
            ]);
            let fiat_label = field
                .settings()
                .fiat_code
                .clone()
                .unwrap_or_else(|| "Fiat".to_string());
            table.add_row(vec![
                Cell::new(fiat_label),
                Cell::new(field.fiat_text().unwrap_or("-")),
            ]);
            println!("{table}");
            if let Some(satoshi) = satoshi {
                println!(
                    "{} {}",
                    "Amount:".bright_white().bold(),
                    format_bitcoin(satoshi, BitcoinUnit::Sat).bright_white().bold()
                );
            }
            Ok(())
        }
    }
}

fn cmd_uri(input: &str, mode: OutputMode) -> Result<()> {
    let uri = parse_bitcoin_uri(input)?;
    match mode {
        OutputMode::Agent => print_agent(&uri),
        OutputMode::Human => {
            human_header("PAYCODE — Bitcoin URI");
            let mut table = new_table(&["Field", "Value"]);
            table.add_row(vec![Cell::new("Address"), Cell::new(&uri.address)]);
            if let Some(amount) = uri.amount {
                table.add_row(vec![
                    Cell::new("Amount"),
                    Cell::new(format_bitcoin(amount, BitcoinUnit::Bitcoin)),
                ]);
            }
            for (name, value) in [
                ("Label", &uri.label),
                ("Message", &uri.message),
                ("Lightning", &uri.lightning),
            ] {
                if let Some(value) = value {
                    table.add_row(vec![Cell::new(name), Cell::new(truncate_code(value))]);
                }
            }
            println!("{table}");
            Ok(())
        }
    }
}

fn run(cli: &Cli, mode: OutputMode) -> Result<()> {
    match &cli.command {
        Command::Classify { input } => cmd_classify(input, mode),
        Command::ClassifyBatch { file } => cmd_classify_batch(file, mode),
        Command::Format { sats } => cmd_format(sats, &settings(cli)?, mode),
        Command::Convert { value, from, to } => cmd_convert(value, from, to, mode),
        Command::Fiat { sats } => cmd_fiat(sats, &settings(cli)?, mode),
        Command::Eval { expr, previous } => cmd_eval(expr, previous, mode),
        Command::Field { text, fiat_side } => cmd_field(text, *fiat_side, settings(cli)?, mode),
        Command::Uri { input } => cmd_uri(input, mode),
    }
}

fn core_error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<PaycodeError>() {
            Some(e.error_code())
        } else if let Some(e) = cause.downcast_ref::<ClassifyError>() {
            Some(e.error_code())
        } else if let Some(e) = cause.downcast_ref::<AmountError>() {
            Some(e.error_code())
        } else if let Some(e) = cause.downcast_ref::<ExprError>() {
            Some(e.error_code())
        } else {
            cause.downcast_ref::<UriError>().map(UriError::error_code)
        }
    })
}

fn error_label(code: ErrorCode) -> &'static str {
    match code.code() {
        1000..=1999 => "decode_failed",
        2000..=2999 => "invalid_amount",
        3000..=3999 => "invalid_expression",
        _ => "invalid_uri",
    }
}

/// Map a failure to its exit code and agent payload.
fn describe_failure(err: &anyhow::Error) -> (i32, AgentError) {
    let message = format!("{err:#}");
    if let Some(code) = core_error_code(err) {
        return (
            EXIT_VALIDATION,
            AgentError::new(error_label(code), code, message),
        );
    }

    let is_input = err.chain().any(|cause| cause.is::<InputError>());
    let is_io = err
        .chain()
        .any(|cause| cause.is::<std::io::Error>() || cause.is::<csv::Error>());
    let (exit, error, name) = if is_input {
        (EXIT_USAGE, "invalid_input", "INVALID_INPUT")
    } else if is_io {
        (EXIT_IO, "io_error", "IO_ERROR")
    } else {
        (EXIT_INTERNAL, "internal_error", "INTERNAL")
    };
    (
        exit,
        AgentError {
            error: error.to_string(),
            code: exit as u16,
            name: name.to_string(),
            message,
        },
    )
}

fn main() {
    let cli = Cli::parse();
    init_tracing();
    if cli.no_color {
        colored::control::set_override(false);
    }
    let mode = detect_output_mode(cli.output);

    if let Err(err) = run(&cli, mode) {
        let (exit, payload) = describe_failure(&err);
        match mode {
            OutputMode::Agent => match serde_json::to_string(&payload) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{}", payload.message),
            },
            OutputMode::Human => {
                eprintln!("{} {}", "✗".red(), payload.message.red());
                eprintln!("{}", format!("[{}]", payload.name).bright_black());
            }
        }
        std::process::exit(exit);
    }
}
