use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "swapd")]
#[command(about = "CryptoSwap - order settlement and accounting engine")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty", env = "SWAPD_LOG_FORMAT")]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP service with the given configuration
    Start {
        /// Path to the configuration file
        #[arg(short, long, default_value = "master_config/swap_config.yaml")]
        config: PathBuf,

        /// Override HTTP port
        #[arg(long)]
        http: Option<u16>,
    },

    /// Validate configuration without starting the service
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "master_config/swap_config.yaml")]
        config: PathBuf,
    },

    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "swap_config.yaml")]
        output: PathBuf,
    },

    /// Resolve one trading-pair price through the configured cache and source
    Rate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "master_config/swap_config.yaml")]
        config: PathBuf,

        /// Symbol such as BTCUSDT
        symbol: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable with colors
    Pretty,

    /// One JSON object per line
    Json,

    /// Single-line compact output
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_command() {
        let cli = Cli::try_parse_from(["swapd", "rate", "btcusdt", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, LogFormatArg::Json);
        match cli.command {
            Commands::Rate { config, symbol } => {
                assert_eq!(symbol, "btcusdt");
                assert_eq!(config, PathBuf::from("master_config/swap_config.yaml"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_start_overrides() {
        let cli = Cli::try_parse_from(["swapd", "start", "-c", "custom.yaml", "--http", "9000"]).unwrap();
        match cli.command {
            Commands::Start { config, http } => {
                assert_eq!(config, PathBuf::from("custom.yaml"));
                assert_eq!(http, Some(9000));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
