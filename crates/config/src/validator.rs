use crate::*;
use regex::Regex;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Service name is required")]
    MissingServiceName,

    #[error("{field} must be a non-zero port")]
    InvalidPort { field: String },

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("{field} must be a positive decimal")]
    InvalidPositiveDecimal { field: String },

    #[error("Storage: {message}")]
    InvalidStorage { message: String },

    #[error("Cache: {message}")]
    InvalidCache { message: String },

    #[error("Rates: {message}")]
    InvalidRates { message: String },

    #[error("Metrics: {message}")]
    InvalidMetrics { message: String },

    #[error("Environment variable placeholder left unresolved in {field}")]
    UnresolvedEnvVar { field: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

/// Longest TTL that still counts as a short-lived price cache
const MAX_RECOMMENDED_TTL_SECONDS: u64 = 300;

pub fn validate_config(config: &MasterConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_service(&config.service, &mut report);
    validate_storage(&config.storage, &mut report);
    validate_cache(&config.cache, &mut report);
    validate_rates(&config.rates, &mut report);
    validate_limits(&config.limits, &mut report);
    validate_metrics(&config.metrics, config.service.http_port, &mut report);

    report
}

fn validate_service(service: &ServiceConfig, report: &mut ValidationReport) {
    if service.name.trim().is_empty() {
        report.add_error(ValidationError::MissingServiceName);
    }
    if service.http_port == 0 {
        report.add_error(ValidationError::InvalidPort {
            field: "service.http_port".to_string(),
        });
    }
    if service.request_timeout_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "service.request_timeout_seconds".to_string(),
        });
    }
}

/// Check a connection URL's scheme and placeholders
///
/// Placeholders are errors only for the backend actually selected.
fn validate_connection_url(
    field: &str,
    url: &str,
    schemes: &[&str],
    active: bool,
    report: &mut ValidationReport,
) -> Option<String> {
    if has_unresolved_env_vars(url) {
        if active {
            report.add_error(ValidationError::UnresolvedEnvVar {
                field: field.to_string(),
            });
        } else {
            report.add_warning(field, "contains an unresolved environment variable");
        }
        return None;
    }

    match Url::parse(url) {
        Ok(parsed) if schemes.contains(&parsed.scheme()) => None,
        Ok(parsed) => Some(format!(
            "{} has scheme '{}', expected one of {:?}",
            field,
            parsed.scheme(),
            schemes
        )),
        Err(e) => Some(format!("{} is not a valid URL: {}", field, e)),
    }
}

fn validate_storage(storage: &StorageConfig, report: &mut ValidationReport) {
    let active = storage.storage_type == StorageType::Postgres;

    match &storage.postgres {
        None if active => report.add_error(ValidationError::InvalidStorage {
            message: "type is postgres but the postgres section is missing".to_string(),
        }),
        None => {}
        Some(pg) => {
            if let Some(message) = validate_connection_url(
                "storage.postgres.url",
                &pg.url,
                &["postgres", "postgresql"],
                active,
                report,
            ) {
                report.add_error(ValidationError::InvalidStorage { message });
            }
            if pg.max_connections == 0 {
                report.add_error(ValidationError::InvalidPositiveInteger {
                    field: "storage.postgres.max_connections".to_string(),
                });
            }
            if pg.connect_timeout_seconds == 0 {
                report.add_error(ValidationError::InvalidPositiveInteger {
                    field: "storage.postgres.connect_timeout_seconds".to_string(),
                });
            }
        }
    }
}

fn validate_cache(cache: &CacheConfig, report: &mut ValidationReport) {
    let active = cache.cache_type == CacheType::Redis;

    match &cache.redis {
        None if active => report.add_error(ValidationError::InvalidCache {
            message: "type is redis but the redis section is missing".to_string(),
        }),
        None => {}
        Some(redis) => {
            if let Some(message) =
                validate_connection_url("cache.redis.url", &redis.url, &["redis", "rediss"], active, report)
            {
                report.add_error(ValidationError::InvalidCache { message });
            }
        }
    }

    if cache.cache_type == CacheType::Memory {
        report.add_warning(
            "cache.type",
            "memory cache is per-process; last-known-good prices are lost on restart",
        );
    }
}

fn validate_rates(rates: &RatesConfig, report: &mut ValidationReport) {
    match Url::parse(&rates.provider_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => report.add_error(ValidationError::InvalidRates {
            message: format!("provider_url must be http(s), got scheme '{}'", url.scheme()),
        }),
        Err(e) => report.add_error(ValidationError::InvalidRates {
            message: format!("provider_url is not a valid URL: {}", e),
        }),
    }

    if rates.timeout_ms == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "rates.timeout_ms".to_string(),
        });
    }

    if rates.cache_ttl_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "rates.cache_ttl_seconds".to_string(),
        });
    } else if rates.cache_ttl_seconds > MAX_RECOMMENDED_TTL_SECONDS {
        report.add_warning(
            "rates.cache_ttl_seconds",
            "cached prices older than five minutes may be used to price orders",
        );
    }

    if rates.allowed_quotes.is_empty() {
        report.add_error(ValidationError::InvalidRates {
            message: "allowed_quotes must not be empty".to_string(),
        });
    }
    let quote_regex = Regex::new(r"^[A-Z0-9]+$").expect("quote pattern is valid");
    for quote in &rates.allowed_quotes {
        if !quote_regex.is_match(quote) {
            report.add_error(ValidationError::InvalidRates {
                message: format!("quote '{}' must be upper-case alphanumeric", quote),
            });
        }
    }

    if rates.default_price <= Decimal::ZERO {
        report.add_error(ValidationError::InvalidPositiveDecimal {
            field: "rates.default_price".to_string(),
        });
    }

    if rates.symbol_min_len == 0 || rates.symbol_min_len > rates.symbol_max_len {
        report.add_error(ValidationError::InvalidRates {
            message: format!(
                "symbol length bounds {}..={} are invalid",
                rates.symbol_min_len, rates.symbol_max_len
            ),
        });
    }
}

fn validate_limits(limits: &LimitsConfig, report: &mut ValidationReport) {
    if limits.unverified_order_max <= Decimal::ZERO {
        report.add_error(ValidationError::InvalidPositiveDecimal {
            field: "limits.unverified_order_max".to_string(),
        });
    }
    if limits.unverified_daily_volume_max <= Decimal::ZERO {
        report.add_error(ValidationError::InvalidPositiveDecimal {
            field: "limits.unverified_daily_volume_max".to_string(),
        });
    }
    if limits.unverified_order_max > limits.unverified_daily_volume_max {
        report.add_warning(
            "limits.unverified_order_max",
            "exceeds the daily ceiling; the daily check will deny first",
        );
    }
}

fn validate_metrics(metrics: &MetricsConfig, http_port: u16, report: &mut ValidationReport) {
    if !metrics.enabled {
        return;
    }
    if metrics.port == 0 {
        report.add_error(ValidationError::InvalidPort {
            field: "metrics.port".to_string(),
        });
    } else if metrics.port == http_port {
        report.add_error(ValidationError::InvalidMetrics {
            message: format!("port {} is already used by service.http_port", metrics.port),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let report = validate_config(&MasterConfig::default());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn test_postgres_without_section() {
        let mut config = MasterConfig::default();
        config.storage.storage_type = StorageType::Postgres;
        let report = validate_config(&config);
        assert!(matches!(report.errors[0], ValidationError::InvalidStorage { .. }));
    }

    #[test]
    fn test_unresolved_placeholder_in_active_backend() {
        let mut config = MasterConfig::default();
        config.storage = StorageConfig {
            storage_type: StorageType::Postgres,
            postgres: Some(PostgresConfig {
                url: "postgres://swap:${PG_PASSWORD}@db/swap".to_string(),
                max_connections: 5,
                connect_timeout_seconds: 5,
            }),
        };
        let report = validate_config(&config);
        assert!(report
            .errors
            .contains(&ValidationError::UnresolvedEnvVar { field: "storage.postgres.url".to_string() }));

        // Same URL on an inactive backend only warns
        config.storage.storage_type = StorageType::Memory;
        let report = validate_config(&config);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.field == "storage.postgres.url"));
    }

    #[test]
    fn test_redis_scheme_checked() {
        let mut config = MasterConfig::default();
        config.cache = CacheConfig {
            cache_type: CacheType::Redis,
            redis: Some(RedisConfig {
                url: "http://localhost:6379".to_string(),
                key_prefix: String::new(),
            }),
        };
        let report = validate_config(&config);
        assert!(matches!(report.errors[0], ValidationError::InvalidCache { .. }));
    }

    #[test]
    fn test_rates_rules() {
        let mut config = MasterConfig::default();
        config.rates.provider_url = "ftp://example.com".to_string();
        config.rates.allowed_quotes = vec!["usdt".to_string()];
        config.rates.default_price = dec!(0);
        config.rates.symbol_min_len = 10;
        config.rates.symbol_max_len = 6;
        let report = validate_config(&config);
        assert_eq!(report.errors.len(), 4);
    }

    #[test]
    fn test_long_ttl_warns() {
        let mut config = MasterConfig::default();
        config.rates.cache_ttl_seconds = 3600;
        let report = validate_config(&config);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.field == "rates.cache_ttl_seconds"));
    }

    #[test]
    fn test_limits_rules() {
        let mut config = MasterConfig::default();
        config.limits.unverified_order_max = dec!(800);
        let report = validate_config(&config);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.field == "limits.unverified_order_max"));

        config.limits.unverified_daily_volume_max = dec!(-1);
        assert!(!validate_config(&config).is_valid());
    }

    #[test]
    fn test_metrics_port_clash() {
        let mut config = MasterConfig::default();
        config.metrics.enabled = true;
        config.metrics.port = config.service.http_port;
        assert!(!validate_config(&config).is_valid());
    }
}
