mod history;
mod ledger;
mod quote;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cryptofolio_core::{
    JsonFileCacheStore, JsonFileStore, MarketDataConfig, MarketDataGateway, PortfolioLedger,
    PriceCache, Provenance,
};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::Table;

const LEDGER_ENV: &str = "CRYPTOFOLIO_LEDGER";
const DEFAULT_LEDGER_FILE: &str = "cryptofolio-ledger.json";
const MARKET_CACHE_FILE: &str = "market-cache.json";

pub struct CommandResult {
    pub data: Value,
    pub table: Table,
    pub warnings: Vec<String>,
    /// Set when market data is unavailable; maps to exit code 3.
    pub degraded: bool,
}

impl CommandResult {
    pub fn ok(data: Value, table: Table) -> Self {
        Self {
            data,
            table,
            warnings: Vec::new(),
            degraded: false,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Stale data warns, unavailable data also marks the result degraded.
    pub fn with_provenance(mut self, provenance: Provenance, message: Option<&str>) -> Self {
        let detail = message.unwrap_or("no detail");
        match provenance {
            Provenance::Live => {}
            Provenance::Stale => {
                self.warnings
                    .push(format!("serving last known market data: {detail}"));
            }
            Provenance::Unavailable => {
                self.warnings
                    .push(format!("market data unavailable: {detail}"));
                self.degraded = true;
            }
        }
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Quote(args) => quote::run(args, &price_cache(cli)?).await,
        Command::History(args) => history::run(args, &price_cache(cli)?).await,
        Command::Ledger(args) => ledger::run(args, cli).await,
    }
}

pub(crate) fn price_cache(cli: &Cli) -> Result<PriceCache, CliError> {
    let mut config = MarketDataConfig::from_env()?;
    if let Some(timeout_ms) = cli.timeout_ms {
        if timeout_ms == 0 {
            return Err(CliError::Command(String::from(
                "--timeout-ms must be greater than zero",
            )));
        }
        config = config.with_request_timeout(Duration::from_millis(timeout_ms));
    }

    let cache_path = market_cache_path(&ledger_path(cli));
    tracing::debug!(path = %cache_path.display(), "using market data cache");

    let gateway = Arc::new(MarketDataGateway::new(config));
    Ok(PriceCache::new(gateway, Arc::new(JsonFileCacheStore::new(cache_path))))
}

pub(crate) async fn open_ledger(cli: &Cli) -> Result<PortfolioLedger, CliError> {
    let path = ledger_path(cli);
    tracing::debug!(path = %path.display(), "opening ledger");
    Ok(PortfolioLedger::load(Arc::new(JsonFileStore::new(path))).await?)
}

fn ledger_path(cli: &Cli) -> PathBuf {
    resolve_ledger_path(cli.ledger.clone(), |name| std::env::var_os(name))
}

/// Market data cache file, kept next to the ledger so stale quotes survive between runs.
fn market_cache_path(ledger: &Path) -> PathBuf {
    ledger.with_file_name(MARKET_CACHE_FILE)
}

/// Flag, then `CRYPTOFOLIO_LEDGER`, then `$HOME/.cryptofolio/ledger.json`,
/// then a file in the working directory.
fn resolve_ledger_path<F>(flag: Option<PathBuf>, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<std::ffi::OsString>,
{
    if let Some(path) = flag {
        return path;
    }
    if let Some(path) = lookup(LEDGER_ENV).filter(|value| !value.is_empty()) {
        return PathBuf::from(path);
    }
    match lookup("HOME").filter(|value| !value.is_empty()) {
        Some(home) => PathBuf::from(home).join(".cryptofolio").join("ledger.json"),
        None => PathBuf::from(DEFAULT_LEDGER_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn ledger_path_prefers_flag_then_env_then_home() {
        let env = |name: &str| match name {
            "CRYPTOFOLIO_LEDGER" => Some(OsString::from("/data/ledger.json")),
            "HOME" => Some(OsString::from("/home/trader")),
            _ => None,
        };
        let home_only = |name: &str| (name == "HOME").then(|| OsString::from("/home/trader"));

        assert_eq!(
            resolve_ledger_path(Some(PathBuf::from("mine.json")), env),
            PathBuf::from("mine.json")
        );
        assert_eq!(
            resolve_ledger_path(None, env),
            PathBuf::from("/data/ledger.json")
        );
        assert_eq!(
            resolve_ledger_path(None, home_only),
            PathBuf::from("/home/trader/.cryptofolio/ledger.json")
        );
        assert_eq!(
            resolve_ledger_path(None, |_| None),
            PathBuf::from(DEFAULT_LEDGER_FILE)
        );
    }

    #[test]
    fn market_cache_sits_next_to_the_ledger() {
        assert_eq!(
            market_cache_path(Path::new("/home/trader/.cryptofolio/ledger.json")),
            PathBuf::from("/home/trader/.cryptofolio/market-cache.json")
        );
        assert_eq!(
            market_cache_path(Path::new("mine.json")),
            PathBuf::from("market-cache.json")
        );
    }

    #[test]
    fn unavailable_data_degrades_the_result() {
        let stale = CommandResult::ok(Value::Null, Table::default())
            .with_provenance(Provenance::Stale, Some("timeout"));
        assert!(!stale.degraded);
        assert_eq!(stale.warnings.len(), 1);

        let missing = CommandResult::ok(Value::Null, Table::default())
            .with_provenance(Provenance::Unavailable, None);
        assert!(missing.degraded);
    }
}
