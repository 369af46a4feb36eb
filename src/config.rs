//! Configuration and CLI argument handling

use std::path::PathBuf;
use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "timer-manager")]
#[command(about = "Countdown timer engine with a local HTTP bridge for the browser UI")]
#[command(version)]
pub struct Config {
    /// Port to bind the UI bridge to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// File holding the persisted timer state and UI preferences
    #[arg(short, long, default_value = "timer-manager.json")]
    pub data_file: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_loopback() {
        let config = Config::try_parse_from(["timer-manager"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.data_file, PathBuf::from("timer-manager.json"));
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "timer-manager", "-p", "8080", "--data-file", "/tmp/t.json", "-v",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_file, PathBuf::from("/tmp/t.json"));
        assert_eq!(config.log_level(), "debug");
    }
}
