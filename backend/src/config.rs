use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use lottery_shared::constants::{DAILY_DRAW_LIMIT, RATE_RECORD_RETENTION_DAYS};
use lottery_shared::shared_lottery::SPIN_DURATION_MS;
use lottery_shared::{LotterySettings, PrizeTable};

const DEFAULT_STORE_PATH: &str = "lottery_store.json";
const DEFAULT_SESSION_TTL_SECS: u64 = 600;
const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org?format=json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("Failed to read prize table {path}: {source}")]
    PrizeFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid prize table: {0}")]
    PrizeTable(#[from] lottery_shared::LotteryError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub store_path: PathBuf,
    pub settings: LotterySettings,
    pub spin_delay: Duration,
    pub session_ttl: Duration,
    pub prizes: PrizeTable,
    pub ip_echo_url: String,
    pub allowed_origin: Option<String>,
    pub static_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            settings: LotterySettings::default(),
            spin_delay: Duration::from_millis(SPIN_DURATION_MS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            prizes: PrizeTable::default(),
            ip_echo_url: DEFAULT_IP_ECHO_URL.to_string(),
            allowed_origin: None,
            static_dir: None,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Reads `LOTTERY_*` variables, falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let bind_addr = parse_var("LOTTERY_BIND_ADDR", defaults.bind_addr)?;

        let daily_limit = parse_var("LOTTERY_DAILY_LIMIT", DAILY_DRAW_LIMIT)?;
        if daily_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "LOTTERY_DAILY_LIMIT",
                value: "0".to_string(),
            });
        }

        let prizes = match optional_var("LOTTERY_PRIZE_TABLE") {
            Some(path) => {
                let path = PathBuf::from(path);
                let raw = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::PrizeFile { path, source })?;
                PrizeTable::from_json(&raw)?
            }
            None => defaults.prizes,
        };

        Ok(Self {
            bind_addr,
            store_path: optional_var("LOTTERY_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            settings: LotterySettings {
                daily_limit,
                retention_days: parse_var("LOTTERY_RETENTION_DAYS", RATE_RECORD_RETENTION_DAYS)?,
                ..LotterySettings::default()
            },
            spin_delay: Duration::from_millis(parse_var(
                "LOTTERY_SPIN_DELAY_MS",
                SPIN_DURATION_MS,
            )?),
            session_ttl: Duration::from_secs(parse_var(
                "LOTTERY_SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            )?),
            prizes,
            ip_echo_url: optional_var("LOTTERY_IP_ECHO_URL").unwrap_or(defaults.ip_echo_url),
            allowed_origin: optional_var("LOTTERY_ALLOWED_ORIGIN"),
            static_dir: optional_var("LOTTERY_STATIC_DIR").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back_and_rejects_garbage() {
        std::env::remove_var("LOTTERY_TEST_UNSET");
        assert_eq!(parse_var("LOTTERY_TEST_UNSET", 7u32).unwrap(), 7);

        std::env::set_var("LOTTERY_TEST_GARBAGE", "seven");
        assert!(matches!(
            parse_var("LOTTERY_TEST_GARBAGE", 7u32),
            Err(ConfigError::Invalid { name: "LOTTERY_TEST_GARBAGE", .. })
        ));

        std::env::set_var("LOTTERY_TEST_NUMBER", " 12 ");
        assert_eq!(parse_var("LOTTERY_TEST_NUMBER", 7u32).unwrap(), 12);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.settings.daily_limit, 3);
        assert_eq!(config.spin_delay, Duration::from_millis(4000));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
    }
}
