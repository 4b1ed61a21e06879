use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PoolError, Result};

pub const DEFAULT_DB_PATH: &str = "data/lotto_pool.db";
pub const DEFAULT_GLO_API_URL: &str = "https://www.glo.or.th/api/checking/getLotteryResult";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;

/// What the book does when entries arrive before any cut config was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingCutConfig {
    /// Treat every ceiling as zero and send the whole stake on.
    #[default]
    ForwardAll,
    Reject,
}

impl FromStr for MissingCutConfig {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward_all" => Ok(MissingCutConfig::ForwardAll),
            "reject" => Ok(MissingCutConfig::Reject),
            other => Err(PoolError::Config(format!(
                "LOTTO_MISSING_CUT_CONFIG must be forward_all or reject, got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub glo_api_url: String,
    pub fetch_timeout_secs: u64,
    pub missing_cut_config: MissingCutConfig,
}

impl Config {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DB_PATH.to_string(),
            glo_api_url: DEFAULT_GLO_API_URL.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            missing_cut_config: MissingCutConfig::default(),
        }
    }
}

pub fn load() -> Result<Config> {
    from_lookup(|key| env::var(key).ok())
}

fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let defaults = Config::default();

    let database_url = lookup("LOTTO_DB_PATH").unwrap_or(defaults.database_url);
    let glo_api_url = lookup("LOTTO_GLO_API_URL").unwrap_or(defaults.glo_api_url);

    let fetch_timeout_secs = match lookup("LOTTO_FETCH_TIMEOUT_SECS") {
        Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
            PoolError::Config(format!("LOTTO_FETCH_TIMEOUT_SECS {:?}: {}", raw, e))
        })?,
        None => defaults.fetch_timeout_secs,
    };

    let missing_cut_config = match lookup("LOTTO_MISSING_CUT_CONFIG") {
        Some(raw) => raw.parse()?,
        None => defaults.missing_cut_config,
    };

    Ok(Config {
        database_url,
        glo_api_url,
        fetch_timeout_secs,
        missing_cut_config,
    })
}
