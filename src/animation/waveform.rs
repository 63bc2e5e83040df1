//! Voice waveform bars

use std::f64::consts::TAU;

use super::Rgb;

/// Time offset added on every frame
pub const PHASE_STEP: f64 = 0.1;
/// Per-frame multiplicative decay while idle
pub const DECAY: f64 = 0.9;
/// Idle bars never drop below this height
pub const FLOOR: f64 = 0.1;

/// Bar heights for the voice visualizer.
///
/// Active frames follow a phase-shifted sine per bar; idle frames decay each
/// bar toward [`FLOOR`].
#[derive(Debug, Clone)]
pub struct WaveformGenerator {
    heights: Vec<f64>,
    time_offset: f64,
}

impl WaveformGenerator {
    pub fn new(bars: usize) -> Self {
        Self {
            heights: vec![0.0; bars],
            time_offset: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Current heights without advancing
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// Advance one frame
    pub fn update(&mut self, active: bool) -> &[f64] {
        self.time_offset += PHASE_STEP;
        let bars = self.heights.len() as f64;

        for (i, height) in self.heights.iter_mut().enumerate() {
            *height = if active {
                let phase = i as f64 / bars * TAU + self.time_offset;
                0.3 + 0.7 * phase.sin().abs()
            } else {
                (*height * DECAY).max(FLOOR)
            };
        }

        &self.heights
    }

    /// Brighter bars for taller heights
    pub fn bar_color(&self, height: f64, base: Rgb) -> Rgb {
        bar_color(height, base)
    }
}

/// `base` scaled by `0.4 + 0.6 * height`
pub fn bar_color(height: f64, base: Rgb) -> Rgb {
    base.scaled(0.4 + 0.6 * height)
}
