//! Slaker-side event logic: the reactivity curve detector and the coarse
//! operating-mode classifier.

mod detector;
mod mode;

pub use detector::{DetectorConfig, ReactivityCategory, ReactivityCurve, ReactivityDetector, TracePoint};
pub use mode::{classify_mode, classify_mode_with_floor, OperatingMode};

/// Absolute value below which an actuator or flow signal counts as off.
pub const NOISE_FLOOR: f64 = 0.1;

/// `true` when `value` is within `floor` of zero. NaN is not zero.
pub fn is_zero(value: f64, floor: f64) -> bool {
    value.abs() < floor
}
