use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "WiFi connectivity and CPU usage on a Blinkt! LED strip",
    long_about = "Shows WiFi state on LED 0 (white = connected, red = disconnected) and CPU usage\n\
                  as a green-to-red bar on LEDs 1-7. Router mode is picked when the access-point\n\
                  service is enabled; otherwise the wireless interface association is checked."
)]
pub struct Args {
    /// Optional TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// LED brightness (0.0 to 1.0)
    #[arg(short, long)]
    pub brightness: Option<f64>,

    /// Poll interval in milliseconds
    #[arg(short = 'p', long)]
    pub interval: Option<u64>,

    /// Wireless interface to check in client mode
    #[arg(short = 'i', long = "int")]
    pub interface: Option<String>,

    /// Diagnostic: blink the listed LEDs red instead of showing status, e.g. "0,3-5"
    #[arg(long = "led-test", value_name = "LEDS")]
    pub led_test: Option<String>,

    /// Quiet mode
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatusConfig {
    pub brightness: f64,
    pub poll_interval_ms: u64,
    pub sleep_slice_ms: u64,
    pub query_timeout_ms: u64,
    pub interface: String,
    pub ap_service: String,
    pub systemctl: String,
    pub iw: String,
    pub proc_stat: PathBuf,
    pub data_pin: u8,
    pub clock_pin: u8,
    pub clear_on_exit: bool,
    pub write_attempts: u32,
}

impl Default for StatusConfig {
    fn default() -> Self {
        StatusConfig {
            brightness: 0.05,
            poll_interval_ms: 2000,
            sleep_slice_ms: 100,
            query_timeout_ms: 5000,
            interface: "wlan0".to_string(),
            ap_service: "hostapd".to_string(),
            systemctl: "systemctl".to_string(),
            iw: "iw".to_string(),
            proc_stat: PathBuf::from("/proc/stat"),
            data_pin: 23,
            clock_pin: 24,
            clear_on_exit: true,
            write_attempts: 3,
        }
    }
}

impl StatusConfig {
    /// Defaults, overlaid with the file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::parse(&contents).with_context(|| format!("parsing config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply command line overrides. Returns whether any were given.
    pub fn merge_with_args(&mut self, args: &Args) -> bool {
        let mut args_provided = false;

        if let Some(brightness) = args.brightness {
            self.brightness = brightness;
            args_provided = true;
        }

        if let Some(interval) = args.interval {
            self.poll_interval_ms = interval;
            args_provided = true;
        }

        if let Some(ref interface) = args.interface {
            self.interface = interface.clone();
            args_provided = true;
        }

        args_provided
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.brightness) {
            bail!("brightness should be between 0.0 and 1.0, got {}", self.brightness);
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }
        if self.sleep_slice_ms == 0 {
            bail!("sleep_slice_ms must be greater than zero");
        }
        if self.query_timeout_ms == 0 {
            bail!("query_timeout_ms must be greater than zero");
        }
        if self.write_attempts == 0 {
            bail!("write_attempts must be at least 1");
        }
        if self.data_pin == self.clock_pin {
            bail!("data_pin and clock_pin must differ (both {})", self.data_pin);
        }
        if self.interface.trim().is_empty() {
            bail!("interface must not be empty");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sleep_slice(&self) -> Duration {
        Duration::from_millis(self.sleep_slice_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}
