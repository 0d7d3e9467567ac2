use anyhow::Result;
use clap::Parser;

mod config;
mod cpu;
mod daemon;
mod network;
mod render;
mod strip;
mod types;

use config::{Args, StatusConfig};

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.quiet);

    let mut config = StatusConfig::load(args.config.as_deref())?;
    if config.merge_with_args(&args) {
        log::debug!("command line overrides applied: {:?}", config);
    }
    config.validate()?;

    // The poll loop and the signal watcher share this one thread
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if let Some(ref led_list) = args.led_test {
        let leds = daemon::parse_led_numbers(led_list)?;
        return rt.block_on(daemon::test_mode(&config, &leds));
    }

    rt.block_on(daemon::run(config))
}
