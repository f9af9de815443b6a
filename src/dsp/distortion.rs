//! Waveshaping saturation.
//!
//! A waveshaper applies a transfer function to each sample:
//!   output = f(input * drive)
//!
//! At drive 1.0 small signals stay in the near-linear region of f(). Pushing
//! drive up moves them into the curved region, which compresses peaks and
//! adds odd harmonics.
//!
//! The curve used here is the rational soft clip
//!   f(x) = x / (1 + |x|)
//! which is cheap, smooth and never exceeds ±1.

#[inline]
pub fn soft_clip(sample: f32, drive: f32) -> f32 {
    let x = sample * drive;
    x / (1.0 + x.abs())
}

/// Soft clip rescaled so that a full-scale input still peaks at full scale.
///
/// Without the rescale, raising drive from 1 to 2 would also change the
/// overall level, which makes drive sweeps hard to compare by ear.
#[inline]
pub fn saturate(sample: f32, drive: f32) -> f32 {
    let drive = drive.max(1e-3);
    soft_clip(sample, drive) / soft_clip(1.0, drive)
}
