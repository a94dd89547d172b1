//! CLI argument definitions for Cryptofolio.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Current price and 1h/24h/7d change for coins |
//! | `history` | Weekly chart points over a trailing window |
//! | `ledger list` | Filter and sort recorded transactions |
//! | `ledger add` | Record a purchase or sale |
//! | `ledger remove` | Delete a transaction by position |
//! | `ledger summary` | Balances, realized and total profit |
//! | `ledger export` | Write the ledger as JSON |
//! | `ledger import` | Replace the ledger from a JSON file |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--ledger` | `$CRYPTOFOLIO_LEDGER` or `~/.cryptofolio/ledger.json` | Ledger file |
//! | `--timeout-ms` | `10000` | Per-attempt upstream timeout |
//! | `--log-level` | `warn` | Default log filter when `RUST_LOG` is unset |
//! | `--log-format` | `pretty` | Log line format (pretty, json) |
//!
//! # Examples
//!
//! ```bash
//! cryptofolio quote bitcoin ethereum --format table
//! cryptofolio history bitcoin --days 90 --pretty
//! cryptofolio ledger add bitcoin purchase 0.5 42000
//! cryptofolio ledger list --sort date --desc
//! cryptofolio ledger summary
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::telemetry::LogFormat;

/// Cryptofolio - crypto price report and portfolio ledger
///
/// Quotes and charts come from CoinGecko through a cached, retrying,
/// circuit-broken gateway. The ledger is a local JSON file.
#[derive(Debug, Parser)]
#[command(
    name = "cryptofolio",
    author,
    version,
    about = "Crypto price report and portfolio ledger",
    long_about = "Cryptofolio reports live crypto prices and keeps a local transaction ledger.\n\
\n\
  • Quotes with 1h/24h/7d change, served stale when the upstream is down\n\
  • 90-day history downsampled to weekly chart points\n\
  • Ledger with balances, realized profit and profit at current prices\n\
\n\
Set COINGECKO_API_KEY (or CRYPTOFOLIO_API_KEY) to authenticate upstream calls."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Ledger file path.
    #[arg(long, global = true, value_name = "PATH")]
    pub ledger: Option<PathBuf>,

    /// Per-attempt upstream timeout in milliseconds; overrides CRYPTOFOLIO_TIMEOUT_MS.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Default log filter, used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format for terminal display.
    Table,
    /// Single JSON object output.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch current quotes.
    ///
    /// Example: cryptofolio quote bitcoin ethereum
    Quote(QuoteArgs),

    /// Fetch a historical series and downsample it to chart points.
    ///
    /// Example: cryptofolio history bitcoin --days 90
    History(HistoryArgs),

    /// Manage the transaction ledger.
    Ledger(LedgerArgs),
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// CoinGecko coin ids, e.g. bitcoin ethereum.
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<String>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// CoinGecko coin id.
    pub id: String,

    /// Trailing window in days.
    #[arg(long, default_value_t = 90)]
    pub days: u32,

    /// Keep every n-th point.
    #[arg(long, default_value_t = 7)]
    pub stride: usize,

    /// Include the full series alongside the chart.
    #[arg(long, default_value_t = false)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Debug, Subcommand)]
pub enum LedgerCommand {
    /// List transactions, optionally filtered and sorted.
    ///
    /// Example: cryptofolio ledger list --asset bitcoin --sort price --desc
    List(ListArgs),

    /// Record a transaction.
    ///
    /// Example: cryptofolio ledger add ethereum sale 2 3150.5
    Add(AddArgs),

    /// Remove the transaction at INDEX (as shown by `ledger list`).
    Remove(RemoveArgs),

    /// Balances plus realized and total profit.
    Summary(SummaryArgs),

    /// Write the ledger as JSON to stdout or a file.
    Export(ExportArgs),

    /// Replace the ledger with the transactions in FILE.
    Import(ImportArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Case-insensitive substring of the asset id or type.
    #[arg(long)]
    pub search: Option<String>,

    #[arg(long)]
    pub asset: Option<String>,

    /// purchase or sale.
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: Option<String>,

    /// Calendar day, YYYY-MM-DD.
    #[arg(long)]
    pub date: Option<String>,

    /// price, date or quantity.
    #[arg(long)]
    pub sort: Option<String>,

    #[arg(long, default_value_t = false)]
    pub desc: bool,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    pub asset: String,

    /// purchase or sale.
    #[arg(value_name = "TYPE")]
    pub kind: String,

    #[arg(allow_hyphen_values = true)]
    pub quantity: f64,

    /// Price per unit in USD.
    #[arg(allow_hyphen_values = true)]
    pub price: f64,

    /// RFC3339 UTC timestamp or YYYY-MM-DD; defaults to now.
    #[arg(long)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    pub index: usize,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    /// Skip the quote lookup; total profit then counts no asset.
    #[arg(long, default_value_t = false)]
    pub offline: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    pub file: PathBuf,
}
