//! Animation state for the assistant window.
//!
//! Every component here is plain state stepped by the UI tick; nothing owns a
//! timer or a thread.
//!
//! - `engine` - pulse, rotation, glow color and circle/arc geometry
//! - `waveform` - voice bars with idle decay
//! - `fade` - show/hide alpha transitions
//! - `color` - `#rrggbb` parsing and intensity scaling

mod color;
mod engine;
mod fade;
mod waveform;

pub use color::{ColorParseError, Rgb};
pub use engine::{
    arc_points, circle_points, glow_color, pulse_intensity_at, AnimationEngine, Point,
    ROTATION_STEP_DEG,
};
pub use fade::{FadeController, FadeMode, DEFAULT_FADE};
pub use waveform::{bar_color, WaveformGenerator, DECAY, FLOOR, PHASE_STEP};
