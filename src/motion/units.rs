// Linear distance to motor shaft degrees

use crate::config::DEGREES_PER_ROTATION;

/// Convert centimeters of wheel travel to motor degrees.
///
/// Computed as `round(cm * 360 / circumference)`. Halfway values round away
/// from zero (`f64::round`), so the result is symmetric: `-x` converts to the
/// exact negation of `x`.
///
/// `circumference_cm > 0` is a precondition; `RobotConfig::validate` enforces it.
pub fn cm_to_degrees(cm: f64, circumference_cm: f64) -> i32 {
    let degrees = cm * DEGREES_PER_ROTATION as f64 / circumference_cm;
    // Clamp to i32 range
    degrees.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

/// Whole wheel rotations to motor degrees
pub fn rotations_to_degrees(rotations: i32) -> i32 {
    rotations.saturating_mul(DEGREES_PER_ROTATION)
}
