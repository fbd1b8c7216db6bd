use rust_decimal::Decimal;

pub fn default_service_name() -> String {
    "cryptoswap".to_string()
}

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_http_port() -> u16 {
    8080
}

pub fn default_request_timeout() -> u64 {
    10
}

pub fn default_max_connections() -> u32 {
    20
}

pub fn default_connection_timeout() -> u64 {
    30
}

pub fn default_provider_url() -> String {
    "https://api.binance.com".to_string()
}

pub fn default_rate_timeout_ms() -> u64 {
    5000
}

pub fn default_rate_cache_ttl() -> u64 {
    30
}

pub fn default_allowed_quotes() -> Vec<String> {
    vec!["USDT".to_string()]
}

pub fn default_price() -> Decimal {
    Decimal::from(100)
}

pub fn default_symbol_min_len() -> usize {
    5
}

pub fn default_symbol_max_len() -> usize {
    15
}

pub fn default_unverified_order_max() -> Decimal {
    Decimal::from(100)
}

pub fn default_unverified_daily_volume_max() -> Decimal {
    Decimal::from(500)
}

pub fn default_metrics_port() -> u16 {
    9090
}
