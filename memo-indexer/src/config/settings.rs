use std::env;
use std::str::FromStr;
use std::time::Duration;

use memo_indexer_pipeline::consumer::RpcConfig;
use memo_indexer_pipeline::orchestrator::ScannerConfig;

use crate::errors::IndexingError;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Everything the indexer reads from its environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    /// `None` when `BITCOIN_RPC_URL` is unset; commands that read the ledger
    /// fail in that case.
    pub rpc: Option<RpcConfig>,
    pub scan_start_height: u64,
    pub scan_interval: Duration,
    pub backfill_batch_size: i64,
    pub aggregator_batch_size: i64,
    pub log_format: LogFormat,
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, IndexingError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| IndexingError::InvalidEnv { name, value }),
        None => Ok(default),
    }
}

/// Like [`parse`], but zero and negative values are rejected.
fn parse_positive<T: FromStr + PartialOrd + Default>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, IndexingError> {
    let value = parse(lookup, name, default)?;
    if value <= T::default() {
        return Err(IndexingError::InvalidEnv {
            name,
            value: lookup(name).unwrap_or_default(),
        });
    }
    Ok(value)
}

impl Settings {
    /// Reads the settings from the process environment.
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the settings through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, IndexingError> {
        let rpc = match lookup("BITCOIN_RPC_URL") {
            Some(url) => Some(RpcConfig {
                url,
                user: lookup("BITCOIN_RPC_USER"),
                password: lookup("BITCOIN_RPC_PASSWORD"),
                timeout: Duration::from_secs(parse_positive(
                    &lookup,
                    "BITCOIN_RPC_TIMEOUT_SECS",
                    30,
                )?),
            }),
            None => None,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(IndexingError::InvalidEnv {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL"),
            db_max_connections: parse_positive(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            db_acquire_timeout: Duration::from_secs(parse_positive(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_SECS",
                5,
            )?),
            rpc,
            scan_start_height: parse(&lookup, "SCAN_START_HEIGHT", 0)?,
            scan_interval: Duration::from_secs(parse_positive(&lookup, "SCAN_INTERVAL_SECS", 30)?),
            backfill_batch_size: parse_positive(&lookup, "BACKFILL_BATCH_SIZE", 100)?,
            aggregator_batch_size: parse_positive(&lookup, "AGGREGATOR_BATCH_SIZE", 500)?,
            log_format,
        })
    }

    pub fn database_url(&self) -> Result<&str, IndexingError> {
        self.database_url
            .as_deref()
            .ok_or(IndexingError::MissingEnv("DATABASE_URL"))
    }

    pub fn rpc_config(&self) -> Result<&RpcConfig, IndexingError> {
        self.rpc
            .as_ref()
            .ok_or(IndexingError::MissingEnv("BITCOIN_RPC_URL"))
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            start_height: self.scan_start_height,
            backfill_batch_size: self.backfill_batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.database_url, None);
        assert_eq!(settings.db_max_connections, 20);
        assert_eq!(settings.db_acquire_timeout, Duration::from_secs(5));
        assert!(settings.rpc.is_none());
        assert_eq!(settings.scan_start_height, 0);
        assert_eq!(settings.scan_interval, Duration::from_secs(30));
        assert_eq!(settings.backfill_batch_size, 100);
        assert_eq!(settings.aggregator_batch_size, 500);
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert!(matches!(
            settings.database_url(),
            Err(IndexingError::MissingEnv("DATABASE_URL"))
        ));
        assert!(matches!(
            settings.rpc_config(),
            Err(IndexingError::MissingEnv("BITCOIN_RPC_URL"))
        ));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://memo@localhost/memo"),
            ("BITCOIN_RPC_URL", "http://127.0.0.1:8332"),
            ("BITCOIN_RPC_USER", "memo"),
            ("BITCOIN_RPC_TIMEOUT_SECS", "10"),
            ("SCAN_START_HEIGHT", "525325"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();

        let rpc = settings.rpc_config().unwrap();
        assert_eq!(rpc.url, "http://127.0.0.1:8332");
        assert_eq!(rpc.user.as_deref(), Some("memo"));
        assert_eq!(rpc.password, None);
        assert_eq!(rpc.timeout, Duration::from_secs(10));
        assert_eq!(settings.scanner_config().start_height, 525325);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.database_url().unwrap(), "postgres://memo@localhost/memo");
    }

    #[test]
    fn test_invalid_numbers_are_reported() {
        let result = Settings::from_lookup(lookup(&[("DB_MAX_CONNECTIONS", "many")]));
        assert!(matches!(
            result,
            Err(IndexingError::InvalidEnv {
                name: "DB_MAX_CONNECTIONS",
                ..
            })
        ));
        assert!(Settings::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    }

    #[test]
    fn test_zero_intervals_and_batch_sizes_are_rejected() {
        for name in [
            "SCAN_INTERVAL_SECS",
            "BACKFILL_BATCH_SIZE",
            "AGGREGATOR_BATCH_SIZE",
            "DB_MAX_CONNECTIONS",
            "DB_ACQUIRE_TIMEOUT_SECS",
        ] {
            match Settings::from_lookup(lookup(&[(name, "0")])) {
                Err(IndexingError::InvalidEnv { name: got, value }) => {
                    assert_eq!(got, name);
                    assert_eq!(value, "0");
                }
                other => panic!("{name}=0 was accepted: {other:?}"),
            }
        }

        let result = Settings::from_lookup(lookup(&[("BACKFILL_BATCH_SIZE", "-5")]));
        assert!(matches!(
            result,
            Err(IndexingError::InvalidEnv {
                name: "BACKFILL_BATCH_SIZE",
                ..
            })
        ));

        let result = Settings::from_lookup(lookup(&[
            ("BITCOIN_RPC_URL", "http://127.0.0.1:8332"),
            ("BITCOIN_RPC_TIMEOUT_SECS", "0"),
        ]));
        assert!(matches!(
            result,
            Err(IndexingError::InvalidEnv {
                name: "BITCOIN_RPC_TIMEOUT_SECS",
                ..
            })
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        unsafe {
            env::set_var("SCAN_INTERVAL_SECS", "7");
        }
        let settings = Settings::from_env().unwrap();
        unsafe {
            env::remove_var("SCAN_INTERVAL_SECS");
        }
        assert_eq!(settings.scan_interval, Duration::from_secs(7));
    }
}
