// src/cli.rs
use clap::Parser;

/// Certalert: Certificate Transparency alerting
///
/// Polls a set of CT logs, matches newly logged certificates against the
/// configured watcher patterns and notifies the configured destinations.
#[derive(Parser, Debug, Clone)]
#[command(name = "certalert")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short = 'c', long = "config", default_value = "config/config.yml")]
    pub config: String,

    /// Verbose logging (set log level to debug)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet logging (set log level to warn)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let cli = Cli::parse_from(["certalert"]);
        assert_eq!(cli.config, "config/config.yml");
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn test_log_level_flags() {
        let cli = Cli::parse_from(["certalert", "-v"]);
        assert_eq!(cli.log_level(), "debug");

        let cli = Cli::parse_from(["certalert", "-q"]);
        assert_eq!(cli.log_level(), "warn");
    }
}
