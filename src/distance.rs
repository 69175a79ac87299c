//! Pinhole camera distance estimation.
//!
//! An object of real width `W` at distance `D` from a camera with focal length `F` (in pixels)
//! appears `P = W * F / D` pixels wide. Calibration solves this for `F` using a capture at a known
//! distance, and estimation then solves it for `D`.

/// Estimates the distance of an object of `known_width_cm` that appears `pixel_width` pixels wide.
///
/// Returns `0.0` (no estimate) if `pixel_width` is zero. No other input validation is done.
pub fn estimate_distance(known_width_cm: f64, focal_length: f64, pixel_width: u32) -> f64 {
    if pixel_width == 0 {
        return 0.0;
    }

    (known_width_cm * focal_length) / f64::from(pixel_width)
}

/// Computes the focal length (in pixels) from a calibration capture.
///
/// `pixel_width` is the measured width of an object of `known_width_cm` held at
/// `reference_distance_cm`.
pub fn focal_length(pixel_width: u32, reference_distance_cm: f64, known_width_cm: f64) -> f64 {
    (f64::from(pixel_width) * reference_distance_cm) / known_width_cm
}

/// Returns whether `distance_cm` is strictly below the warning threshold.
pub fn is_too_close(distance_cm: f64, threshold_cm: f64) -> bool {
    distance_cm < threshold_cm
}
