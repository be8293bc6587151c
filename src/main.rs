use clap::Parser;
use eyre::{Context, Result};

use silverd::cli::{Cli, Mode};
use silverd::config::Config;
use silverd::scheduler::{self, Scheduler};

fn setup_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
    .format_timestamp_secs()
    .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config =
        Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.apply_cli(&cli);

    let code = match cli.mode() {
        Mode::Status => scheduler::show_status(&config, cli.json),
        Mode::Once => {
            let mut scheduler = Scheduler::new(&config)?;
            scheduler.run_once().await
        }
        Mode::Daemon => {
            let mut scheduler = Scheduler::new(&config)?;
            scheduler.run_daemon().await
        }
    };

    std::process::exit(code);
}
