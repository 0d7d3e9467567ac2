use crate::types::{LedFrame, Pixel, Rgb, BAR_PIXELS};

// Gradient colors for the CPU bar, fixed by position (LEDs 1-7)
const CPU_COLORS: [Rgb; BAR_PIXELS] = [
    Rgb::GREEN,
    Rgb::GREEN,
    Rgb::YELLOW,
    Rgb::YELLOW,
    Rgb::ORANGE,
    Rgb::ORANGE,
    Rgb::RED,
];

/// Number of bar LEDs lit for a CPU percentage.
///
/// Readings a little outside 0-100 (sampling jitter) and NaN are clamped
/// rather than trusted.
pub fn lit_count(cpu_percent: f64) -> usize {
    if cpu_percent.is_nan() {
        return 0;
    }
    let leds = (cpu_percent / 100.0 * BAR_PIXELS as f64).round();
    leds.clamp(0.0, BAR_PIXELS as f64) as usize
}

/// Color of strip position `position` (1..=7) when it is lit.
pub fn gradient_color(position: usize) -> Option<Rgb> {
    position
        .checked_sub(1)
        .and_then(|i| CPU_COLORS.get(i))
        .copied()
}

/// Build the frame for one poll cycle.
///
/// LED 0 shows connectivity (white or red), LEDs 1-7 the CPU bar.
pub fn render(connected: bool, cpu_percent: f64, brightness: f64) -> LedFrame {
    let mut frame = LedFrame::blank();

    let status = if connected { Rgb::WHITE } else { Rgb::RED };
    frame.set(0, Pixel::lit(status, brightness));

    for position in 1..=lit_count(cpu_percent) {
        if let Some(color) = gradient_color(position) {
            frame.set(position, Pixel::lit(color, brightness));
        }
    }

    frame
}
