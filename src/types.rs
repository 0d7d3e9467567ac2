use std::fmt;

/// Number of pixels on the Blinkt! strip.
pub const NUM_PIXELS: usize = 8;

/// Number of pixels used by the CPU bar (everything right of the status pixel).
pub const BAR_PIXELS: usize = NUM_PIXELS - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const ORANGE: Rgb = Rgb::new(255, 100, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn is_black(&self) -> bool {
        *self == Rgb::BLACK
    }
}

/// One pixel of a frame: a color and the global brightness it is shown at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pixel {
    pub color: Rgb,
    pub brightness: f64,
}

impl Pixel {
    pub const OFF: Pixel = Pixel {
        color: Rgb::BLACK,
        brightness: 0.0,
    };

    pub fn lit(color: Rgb, brightness: f64) -> Self {
        Pixel { color, brightness }
    }

    pub fn is_lit(&self) -> bool {
        !self.color.is_black() && self.brightness > 0.0
    }
}

/// A complete frame for the strip, recomputed from scratch every cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct LedFrame {
    pixels: [Pixel; NUM_PIXELS],
}

impl LedFrame {
    pub fn blank() -> Self {
        LedFrame {
            pixels: [Pixel::OFF; NUM_PIXELS],
        }
    }

    pub fn set(&mut self, index: usize, pixel: Pixel) {
        self.pixels[index] = pixel;
    }

    pub fn pixels(&self) -> &[Pixel; NUM_PIXELS] {
        &self.pixels
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|p| !p.is_lit())
    }
}

impl Default for LedFrame {
    fn default() -> Self {
        LedFrame::blank()
    }
}

/// Whether this host runs the access point or joins one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Router,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Router => write!(f, "router (AP active check)"),
            Role::Client => write!(f, "client (WiFi association check)"),
        }
    }
}
