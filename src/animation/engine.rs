//! Arc-reactor animation math: pulse, rotation, glow and point generation

use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use super::Rgb;

/// Degrees added to the reactor rotation per frame
pub const ROTATION_STEP_DEG: f64 = 2.0;

/// 2D point with f64 coordinates (subpixel precision)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Animation clock plus the reactor's rotation.
///
/// One per widget; the start instant is never reset.
#[derive(Debug, Clone)]
pub struct AnimationEngine {
    start: Instant,
    angle: f64,
}

impl Default for AnimationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationEngine {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    /// Engine whose clock started at `start`
    pub fn started_at(start: Instant) -> Self {
        Self { start, angle: 0.0 }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Pulse in [0, 1] for the current instant, `period` seconds per cycle
    pub fn pulse_intensity(&self, period: f64) -> f64 {
        pulse_intensity_at(self.elapsed(), period)
    }

    /// Advance the rotation by one step and return the new angle in degrees
    pub fn rotation_angle(&mut self) -> f64 {
        self.angle = (self.angle + ROTATION_STEP_DEG) % 360.0;
        self.angle
    }

    /// Current angle without advancing
    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn glow_color(&self, base: Rgb, intensity: f64) -> Rgb {
        glow_color(base, intensity)
    }
}

/// `0.5 + 0.5 * sin(2π · elapsed / period)`.
///
/// A non-positive period has no cycle, so the pulse stays at full intensity.
pub fn pulse_intensity_at(elapsed: Duration, period: f64) -> f64 {
    if period <= 0.0 || !period.is_finite() {
        return 1.0;
    }
    let phase = elapsed.as_secs_f64() / period * TAU;
    (0.5 + 0.5 * phase.sin()).clamp(0.0, 1.0)
}

/// Scale each channel of `base` by `intensity`
pub fn glow_color(base: Rgb, intensity: f64) -> Rgb {
    base.scaled(intensity)
}

/// `count` evenly spaced points on a circle, starting at angle 0
pub fn circle_points(center: Point, radius: f64, count: usize) -> Vec<Point> {
    (0..count)
        .map(|i| {
            let angle = i as f64 / count as f64 * TAU;
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

/// `count` evenly spaced points along an arc from `start_deg` toward `end_deg`.
/// The end angle itself is not included.
pub fn arc_points(
    center: Point,
    radius: f64,
    start_deg: f64,
    end_deg: f64,
    count: usize,
) -> Vec<Point> {
    let start = start_deg.to_radians();
    let end = end_deg.to_radians();

    (0..count)
        .map(|i| {
            let angle = start + i as f64 / count as f64 * (end - start);
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_pulse_in_unit_range() {
        for period in [0.1, 0.5, 2.0, 7.3] {
            for ms in (0..10_000).step_by(37) {
                let p = pulse_intensity_at(Duration::from_millis(ms), period);
                assert!((0.0..=1.0).contains(&p), "period={period} ms={ms} p={p}");
            }
        }
    }

    #[test]
    fn test_pulse_half_at_zero_crossings() {
        let period = 2.0;
        assert!((pulse_intensity_at(Duration::ZERO, period) - 0.5).abs() < EPS);
        assert!((pulse_intensity_at(Duration::from_secs(1), period) - 0.5).abs() < EPS);
        assert!((pulse_intensity_at(Duration::from_secs(2), period) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_pulse_peak_and_trough() {
        let period = 2.0;
        assert!((pulse_intensity_at(Duration::from_millis(500), period) - 1.0).abs() < EPS);
        assert!(pulse_intensity_at(Duration::from_millis(1500), period).abs() < EPS);
    }

    #[test]
    fn test_pulse_degenerate_period() {
        assert_eq!(pulse_intensity_at(Duration::from_secs(3), 0.0), 1.0);
        assert_eq!(pulse_intensity_at(Duration::from_secs(3), -1.0), 1.0);
    }

    #[test]
    fn test_rotation_wraps() {
        let mut engine = AnimationEngine::new();
        assert_eq!(engine.rotation_angle(), 2.0);
        for _ in 0..178 {
            engine.rotation_angle();
        }
        assert_eq!(engine.angle(), 358.0);
        assert_eq!(engine.rotation_angle(), 0.0);
    }

    #[test]
    fn test_elapsed_from_start() {
        let start = Instant::now() - Duration::from_secs(5);
        let engine = AnimationEngine::started_at(start);
        assert!(engine.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn test_glow_color_endpoints() {
        let base = Rgb::from_hex("#00ffff").unwrap();
        assert_eq!(glow_color(base, 1.0), base);
        assert_eq!(glow_color(base, 0.0), Rgb::BLACK);
    }

    #[test]
    fn test_circle_points_on_radius() {
        let center = Point::new(50.0, 40.0);
        let points = circle_points(center, 20.0, 100);
        assert_eq!(points.len(), 100);
        assert!(points.iter().all(|p| (p.distance(&center) - 20.0).abs() < 1e-6));
        assert!((points[0].x - 70.0).abs() < EPS);
        assert!((points[0].y - 40.0).abs() < EPS);
    }

    #[test]
    fn test_arc_points_span() {
        let center = Point::new(0.0, 0.0);
        let points = arc_points(center, 10.0, 0.0, 90.0, 2);
        assert_eq!(points.len(), 2);
        assert!((points[0].x - 10.0).abs() < EPS);
        // Second point sits at 45 degrees
        let diag = 10.0 * std::f64::consts::FRAC_1_SQRT_2;
        assert!((points[1].x - diag).abs() < 1e-6);
        assert!((points[1].y - diag).abs() < 1e-6);
    }

    #[test]
    fn test_zero_points() {
        assert!(circle_points(Point::default(), 1.0, 0).is_empty());
        assert!(arc_points(Point::default(), 1.0, 0.0, 10.0, 0).is_empty());
    }
}
