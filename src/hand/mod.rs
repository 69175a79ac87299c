//! Hand detection and landmark tracking.
//!
//! This uses the MediaPipe hand tracking pipeline, consisting of a palm detector that finds
//! hands in the whole frame and a landmark network that refines a region of interest around a
//! hand into 21 landmarks.

pub mod detection;
pub mod landmark;
mod ssd;
pub mod tracker;

pub use tracker::HandTracker;
