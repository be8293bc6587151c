//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

/// Run mode selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Daemon,
    Once,
    Status,
}

#[derive(Parser, Debug)]
#[command(
    name = "silverd",
    about = "Single-instance scheduler over an Obsidian-style vault",
    version
)]
pub struct Cli {
    /// Run continuously at the configured interval
    #[arg(short = 'd', long, group = "mode")]
    pub daemon: bool,

    /// Run one iteration and exit
    #[arg(short = 'o', long, group = "mode")]
    pub once: bool,

    /// Show scheduler and vault status (the default)
    #[arg(short = 's', long, group = "mode")]
    pub status: bool,

    /// Minutes between iterations, clamped to a minimum of 1
    #[arg(short = 'i', long, allow_negative_numbers = true)]
    pub interval: Option<i64>,

    /// Vault root directory
    #[arg(long)]
    pub vault: Option<PathBuf>,

    /// Log file path (default: <vault>/Logs/silverd.log)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Lock file path (default: <vault>/Logs/.silverd.lock)
    #[arg(long)]
    pub lock_file: Option<PathBuf>,

    /// Rotate the log once it exceeds this many megabytes
    #[arg(long)]
    pub max_log_size: Option<u64>,

    /// Emit status as JSON instead of the human report
    #[arg(long)]
    pub json: bool,

    /// Config file path
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The three modes are mutually exclusive; with none given, status wins.
    pub fn mode(&self) -> Mode {
        if self.daemon {
            Mode::Daemon
        } else if self.once {
            Mode::Once
        } else {
            Mode::Status
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_status() {
        let cli = Cli::parse_from(["silverd"]);
        assert_eq!(cli.mode(), Mode::Status);
        assert!(!cli.json);
    }

    #[test]
    fn test_daemon_mode() {
        let cli = Cli::parse_from(["silverd", "--daemon", "--interval", "10"]);
        assert_eq!(cli.mode(), Mode::Daemon);
        assert_eq!(cli.interval, Some(10));
    }

    #[test]
    fn test_once_mode_short_flag() {
        let cli = Cli::parse_from(["silverd", "-o"]);
        assert_eq!(cli.mode(), Mode::Once);
    }

    #[test]
    fn test_modes_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["silverd", "--daemon", "--once"]).is_err());
        assert!(Cli::try_parse_from(["silverd", "-d", "-s"]).is_err());
        assert!(Cli::try_parse_from(["silverd", "-o", "-s"]).is_err());
    }

    #[test]
    fn test_negative_interval_parses() {
        let cli = Cli::parse_from(["silverd", "--once", "--interval", "-3"]);
        assert_eq!(cli.interval, Some(-3));
    }

    #[test]
    fn test_status_json_and_vault_override() {
        let cli = Cli::parse_from(["silverd", "--status", "--json", "--vault", "/tmp/vault"]);
        assert_eq!(cli.mode(), Mode::Status);
        assert!(cli.json);
        assert_eq!(cli.vault, Some(PathBuf::from("/tmp/vault")));
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::parse_from(["silverd", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
