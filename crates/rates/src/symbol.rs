//! Trading-pair symbol validation

use regex::Regex;

use crate::error::{RateError, Result};

/// Accepted shape of a pair symbol
///
/// A symbol is upper-case alphanumeric, within the length bounds, and ends in
/// one of the allowed quote currencies with a non-empty base before it.
#[derive(Debug, Clone)]
pub struct SymbolPolicy {
    pattern: Regex,
    allowed_quotes: Vec<String>,
}

impl SymbolPolicy {
    pub fn new(min_len: usize, max_len: usize, allowed_quotes: Vec<String>) -> Result<Self> {
        if min_len == 0 || min_len > max_len {
            return Err(RateError::Config(format!(
                "invalid symbol length bounds {}..={}",
                min_len, max_len
            )));
        }
        if allowed_quotes.is_empty() {
            return Err(RateError::Config("no allowed quotes".to_string()));
        }

        let pattern = Regex::new(&format!("^[A-Z0-9]{{{},{}}}$", min_len, max_len))
            .map_err(|e| RateError::Config(e.to_string()))?;

        Ok(Self {
            pattern,
            allowed_quotes: allowed_quotes.iter().map(|q| q.trim().to_uppercase()).collect(),
        })
    }

    pub fn from_config(config: &config::RatesConfig) -> Result<Self> {
        Self::new(
            config.symbol_min_len,
            config.symbol_max_len,
            config.allowed_quotes.clone(),
        )
    }

    /// Upper-case and validate a symbol
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let symbol = raw.trim().to_uppercase();

        if !self.pattern.is_match(&symbol) {
            return Err(RateError::InvalidSymbol(raw.to_string()));
        }

        let quoted = self
            .allowed_quotes
            .iter()
            .any(|q| symbol.len() > q.len() && symbol.ends_with(q.as_str()));
        if !quoted {
            return Err(RateError::InvalidSymbol(raw.to_string()));
        }

        Ok(symbol)
    }

    pub fn allowed_quotes(&self) -> &[String] {
        &self.allowed_quotes
    }

    /// Quote used to build default pair listings
    pub fn primary_quote(&self) -> &str {
        // Non-empty by construction
        self.allowed_quotes.first().map(String::as_str).unwrap_or_default()
    }
}

impl Default for SymbolPolicy {
    fn default() -> Self {
        Self {
            pattern: Regex::new("^[A-Z0-9]{5,15}$").expect("default symbol pattern is valid"),
            allowed_quotes: vec!["USDT".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_normalizes_case() {
        let policy = SymbolPolicy::default();
        assert_eq!(policy.normalize(" btcusdt ").unwrap(), "BTCUSDT");
    }

    #[test]
    fn test_rejects_bad_symbols() {
        let policy = SymbolPolicy::default();
        assert_matches!(policy.normalize("bad###"), Err(RateError::InvalidSymbol(_)));
        assert_matches!(policy.normalize("BTC"), Err(RateError::InvalidSymbol(_)));
        assert_matches!(policy.normalize("ABCDEFGHIJKLUSDT"), Err(RateError::InvalidSymbol(_)));
        // Wrong quote
        assert_matches!(policy.normalize("BTCEUR1"), Err(RateError::InvalidSymbol(_)));
    }

    #[test]
    fn test_multiple_quotes() {
        let policy = SymbolPolicy::new(5, 15, vec!["usdt".into(), "BUSD".into()]).unwrap();
        assert!(policy.normalize("ETHBUSD").is_ok());
        assert!(policy.normalize("ETHUSDT").is_ok());
        assert_eq!(policy.primary_quote(), "USDT");
    }

    #[test]
    fn test_invalid_bounds() {
        assert_matches!(SymbolPolicy::new(10, 5, vec!["USDT".into()]), Err(RateError::Config(_)));
        assert_matches!(SymbolPolicy::new(5, 15, vec![]), Err(RateError::Config(_)));
    }
}
