use anyhow::{bail, Context, Result};
use std::time::{Duration, Instant};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::config::StatusConfig;
use crate::cpu::CpuSampler;
use crate::network::NetworkCheck;
use crate::render::render;
use crate::strip::{write_frame, Blinkt, PixelStrip, StripError};
use crate::types::{LedFrame, Pixel, Rgb, Role, NUM_PIXELS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Starting,
    Running,
    Stopping,
}

/// Record SIGINT and SIGTERM on `shutdown`.
///
/// The handler task only cancels the token; the poll loop notices it at its
/// next checkpoint, so strip writes are never interrupted mid-frame. Repeated
/// signals are harmless.
pub fn install_signal_handlers(shutdown: CancellationToken) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigint.recv() => log::info!("received SIGINT"),
                _ = sigterm.recv() => log::info!("received SIGTERM"),
            }
            shutdown.cancel();
        }
    });

    Ok(())
}

/// Sleep for `total` in `slice` steps, checking `shutdown` between steps.
///
/// Returns true if shutdown was requested before the full duration elapsed.
pub async fn sleep_interruptible(
    total: Duration,
    slice: Duration,
    shutdown: &CancellationToken,
) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if shutdown.is_cancelled() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(slice.min(deadline - now)).await;
    }
}

/// Poll loop context. The role is fixed when the daemon starts.
pub struct StatusDaemon<S: PixelStrip> {
    strip: S,
    network: NetworkCheck,
    sampler: CpuSampler,
    role: Role,
    brightness: f64,
    poll_interval: Duration,
    sleep_slice: Duration,
    write_attempts: u32,
    state: Lifecycle,
}

impl<S: PixelStrip> StatusDaemon<S> {
    /// Detect the role once and prime the CPU sampler.
    pub async fn start(
        config: &StatusConfig,
        strip: S,
        network: NetworkCheck,
        mut sampler: CpuSampler,
    ) -> Self {
        let role = network.detect_role().await;
        log::info!("starting in {} mode", role);

        // first reading has no baseline
        sampler.sample();

        StatusDaemon {
            strip,
            network,
            sampler,
            role,
            brightness: config.brightness,
            poll_interval: config.poll_interval(),
            sleep_slice: config.sleep_slice(),
            write_attempts: config.write_attempts,
            state: Lifecycle::Starting,
        }
    }

    #[cfg(test)]
    pub fn role(&self) -> Role {
        self.role
    }

    #[cfg(test)]
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    #[cfg(test)]
    pub fn strip(&self) -> &S {
        &self.strip
    }

    fn transition(&mut self, next: Lifecycle) {
        if self.state != next {
            log::info!("{:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// One poll cycle without the sleep: check, sample, render, write.
    pub async fn poll_once(&mut self) -> Result<LedFrame, StripError> {
        let connected = self.network.is_connected(self.role).await;
        let cpu = self.sampler.sample();
        let frame = render(connected, cpu, self.brightness);
        log::debug!("connected={} cpu={:.1}%", connected, cpu);
        write_frame(&mut self.strip, &frame, self.write_attempts)?;
        Ok(frame)
    }

    /// Poll until `shutdown` is cancelled or the strip fails for good, then
    /// blank the strip.
    pub async fn run(&mut self, shutdown: &CancellationToken) -> Result<()> {
        self.transition(Lifecycle::Running);

        let result = loop {
            if shutdown.is_cancelled() {
                break Ok(());
            }
            if let Err(e) = self.poll_once().await {
                log::error!("giving up on strip: {}", e);
                break Err(e);
            }
            if sleep_interruptible(self.poll_interval, self.sleep_slice, shutdown).await {
                break Ok(());
            }
        };

        let stopped = self.stop();
        result?;
        stopped?;
        Ok(())
    }

    /// Blank all pixels and flush. Safe to call more than once.
    pub fn stop(&mut self) -> Result<(), StripError> {
        self.transition(Lifecycle::Stopping);
        write_frame(&mut self.strip, &LedFrame::blank(), self.write_attempts)
    }
}

/// Run the status display on the Blinkt! until SIGINT or SIGTERM.
pub async fn run(config: StatusConfig) -> Result<()> {
    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone())?;

    let mut strip = Blinkt::open(config.data_pin, config.clock_pin)
        .context("opening Blinkt! GPIO lines")?;
    strip.set_clear_on_exit(config.clear_on_exit);

    let network = NetworkCheck::from_config(&config);
    let sampler = CpuSampler::new(&config.proc_stat);

    let mut daemon = StatusDaemon::start(&config, strip, network, sampler).await;
    daemon.run(&shutdown).await?;

    log::info!("stopped");
    Ok(())
}

/// Parse a LED list like "0,3-5" into indices.
pub fn parse_led_numbers(test_str: &str) -> Result<Vec<usize>> {
    let mut leds = Vec::new();

    for part in test_str.split(',') {
        let part = part.trim();
        if let Some((start, end)) = part.split_once('-') {
            let start = start.trim().parse::<usize>()?;
            let end = end.trim().parse::<usize>()?;
            if start > end {
                bail!("invalid LED range {}", part);
            }
            leds.extend(start..=end);
        } else {
            leds.push(part.parse::<usize>()?);
        }
    }

    if let Some(&led) = leds.iter().find(|&&led| led >= NUM_PIXELS) {
        bail!("LED {} out of range 0-{}", led, NUM_PIXELS - 1);
    }

    Ok(leds)
}

fn test_frame(leds: &[usize], brightness: f64) -> LedFrame {
    let mut frame = LedFrame::blank();
    for &led in leds {
        frame.set(led, Pixel::lit(Rgb::RED, brightness));
    }
    frame
}

/// Blink `leds` red, one second on and one off, until `shutdown`.
pub async fn blink_leds<S: PixelStrip>(
    strip: &mut S,
    leds: &[usize],
    brightness: f64,
    half_cycle: Duration,
    slice: Duration,
    shutdown: &CancellationToken,
) -> Result<()> {
    let on = test_frame(leds, brightness);
    let off = LedFrame::blank();
    let mut iteration = 0u64;

    loop {
        iteration += 1;
        log::info!("iteration {}: LEDs {:?} on", iteration, leds);
        write_frame(strip, &on, 1)?;
        if sleep_interruptible(half_cycle, slice, shutdown).await {
            break;
        }

        log::info!("iteration {}: LEDs off", iteration);
        write_frame(strip, &off, 1)?;
        if sleep_interruptible(half_cycle, slice, shutdown).await {
            break;
        }
    }

    write_frame(strip, &off, 1)?;
    Ok(())
}

/// Hardware check: blink the listed LEDs on the Blinkt!.
pub async fn test_mode(config: &StatusConfig, leds: &[usize]) -> Result<()> {
    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone())?;

    let mut strip = Blinkt::open(config.data_pin, config.clock_pin)
        .context("opening Blinkt! GPIO lines")?;
    log::info!("test mode: blinking LEDs {:?}", leds);

    blink_leds(
        &mut strip,
        leds,
        config.brightness,
        Duration::from_secs(1),
        config.sleep_slice(),
        &shutdown,
    )
    .await
}
