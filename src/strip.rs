use std::fmt;
use std::thread;
use std::time::Duration;

use crate::types::{LedFrame, Rgb, NUM_PIXELS};

// APA102 framing: 32 zero clocks start a frame. The small dark-die APA102s on
// the Blinkt! need 36 trailing clocks to latch, more than the usual pixels/2.
const SOF_CLOCKS: usize = 32;
const EOF_CLOCKS: usize = 36;
const PIXEL_HEADER: u8 = 0b1110_0000;
const MAX_BRIGHTNESS: u8 = 0b1_1111;

#[derive(Debug)]
pub enum StripError {
    /// GPIO lines could not be acquired or driven.
    Gpio(String),
    PixelIndex(usize),
    Brightness(f64),
}

impl fmt::Display for StripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpio(msg) => write!(f, "gpio error: {msg}"),
            Self::PixelIndex(i) => write!(f, "pixel index {i} out of range 0-{}", NUM_PIXELS - 1),
            Self::Brightness(b) => write!(f, "brightness {b} should be between 0.0 and 1.0"),
        }
    }
}

impl std::error::Error for StripError {}

impl From<rppal::gpio::Error> for StripError {
    fn from(e: rppal::gpio::Error) -> Self {
        StripError::Gpio(e.to_string())
    }
}

/// Output sink for a strip of pixels.
///
/// `clear` and `set_pixel` only touch the in-memory buffer; `show` pushes the
/// buffer to the hardware.
pub trait PixelStrip {
    fn clear(&mut self);

    fn set_pixel(&mut self, index: usize, color: Rgb, brightness: f64) -> Result<(), StripError>;

    fn show(&mut self) -> Result<(), StripError>;
}

/// Clear the strip, load `frame` and flush it, retrying the whole write up to
/// `attempts` times before giving up.
pub fn write_frame<S: PixelStrip + ?Sized>(
    strip: &mut S,
    frame: &LedFrame,
    attempts: u32,
) -> Result<(), StripError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match load_and_show(strip, frame) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                log::warn!("strip write attempt {}/{} failed: {}", attempt, attempts, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn load_and_show<S: PixelStrip + ?Sized>(
    strip: &mut S,
    frame: &LedFrame,
) -> Result<(), StripError> {
    strip.clear();
    for (i, pixel) in frame.pixels().iter().enumerate() {
        if pixel.is_lit() {
            strip.set_pixel(i, pixel.color, pixel.brightness)?;
        }
    }
    strip.show()
}

/// The two wires of an APA102 strip.
pub trait SerialLines {
    fn set_data(&mut self, high: bool) -> Result<(), StripError>;

    fn set_clock(&mut self, high: bool) -> Result<(), StripError>;
}

/// Data and clock pins driven through the Raspberry Pi GPIO character device.
pub struct GpioLines {
    data: rppal::gpio::OutputPin,
    clock: rppal::gpio::OutputPin,
}

impl GpioLines {
    pub fn open(data_pin: u8, clock_pin: u8) -> Result<Self, StripError> {
        let gpio = rppal::gpio::Gpio::new()?;
        let data = gpio.get(data_pin)?.into_output_low();
        let clock = gpio.get(clock_pin)?.into_output_low();
        Ok(GpioLines { data, clock })
    }
}

impl SerialLines for GpioLines {
    fn set_data(&mut self, high: bool) -> Result<(), StripError> {
        if high {
            self.data.set_high();
        } else {
            self.data.set_low();
        }
        Ok(())
    }

    fn set_clock(&mut self, high: bool) -> Result<(), StripError> {
        if high {
            self.clock.set_high();
        } else {
            self.clock.set_low();
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BufferedPixel {
    r: u8,
    g: u8,
    b: u8,
    brightness: u8,
}

/// Pimoroni Blinkt!: eight APA102 pixels bit-banged over two GPIO lines.
pub struct Blinkt<L: SerialLines> {
    lines: L,
    pixels: [BufferedPixel; NUM_PIXELS],
    half_period: Duration,
    clear_on_exit: bool,
}

impl Blinkt<GpioLines> {
    /// Acquire the GPIO lines of a Blinkt! on the 40-pin header.
    pub fn open(data_pin: u8, clock_pin: u8) -> Result<Self, StripError> {
        let lines = GpioLines::open(data_pin, clock_pin)?;
        Ok(Blinkt::new(lines, Duration::from_nanos(500)))
    }
}

impl<L: SerialLines> Blinkt<L> {
    pub fn new(lines: L, half_period: Duration) -> Self {
        Blinkt {
            lines,
            pixels: [BufferedPixel {
                r: 0,
                g: 0,
                b: 0,
                brightness: MAX_BRIGHTNESS,
            }; NUM_PIXELS],
            half_period,
            clear_on_exit: true,
        }
    }

    /// Whether the strip is blanked when the driver is dropped.
    pub fn set_clear_on_exit(&mut self, value: bool) {
        self.clear_on_exit = value;
    }

    #[cfg(test)]
    pub fn lines(&self) -> &L {
        &self.lines
    }

    fn pause(&self) {
        if !self.half_period.is_zero() {
            thread::sleep(self.half_period);
        }
    }

    fn pulse(&mut self) -> Result<(), StripError> {
        self.lines.set_clock(true)?;
        self.pause();
        self.lines.set_clock(false)?;
        self.pause();
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), StripError> {
        for bit in (0..8).rev() {
            self.lines.set_data(byte & (1 << bit) != 0)?;
            self.pulse()?;
        }
        Ok(())
    }

    fn write_zero_clocks(&mut self, count: usize) -> Result<(), StripError> {
        self.lines.set_data(false)?;
        for _ in 0..count {
            self.pulse()?;
        }
        Ok(())
    }
}

/// Map a 0.0-1.0 brightness onto the APA102 5-bit global brightness field.
fn brightness_bits(brightness: f64) -> Result<u8, StripError> {
    if !(0.0..=1.0).contains(&brightness) {
        return Err(StripError::Brightness(brightness));
    }
    Ok((31.0 * brightness) as u8 & MAX_BRIGHTNESS)
}

impl<L: SerialLines> PixelStrip for Blinkt<L> {
    fn clear(&mut self) {
        for p in self.pixels.iter_mut() {
            p.r = 0;
            p.g = 0;
            p.b = 0;
        }
    }

    fn set_pixel(&mut self, index: usize, color: Rgb, brightness: f64) -> Result<(), StripError> {
        let brightness = brightness_bits(brightness)?;
        let pixel = self
            .pixels
            .get_mut(index)
            .ok_or(StripError::PixelIndex(index))?;
        *pixel = BufferedPixel {
            r: color.r,
            g: color.g,
            b: color.b,
            brightness,
        };
        Ok(())
    }

    fn show(&mut self) -> Result<(), StripError> {
        self.write_zero_clocks(SOF_CLOCKS)?;
        for i in 0..NUM_PIXELS {
            let p = self.pixels[i];
            self.write_byte(PIXEL_HEADER | p.brightness)?;
            self.write_byte(p.b)?;
            self.write_byte(p.g)?;
            self.write_byte(p.r)?;
        }
        self.write_zero_clocks(EOF_CLOCKS)
    }
}

impl<L: SerialLines> Drop for Blinkt<L> {
    fn drop(&mut self) {
        if self.clear_on_exit {
            self.clear();
            let _ = self.show();
        }
    }
}
