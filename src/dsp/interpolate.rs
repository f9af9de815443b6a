/*
Polynomial Interpolation
========================

Reading a sample buffer at a fractional position means fitting a curve
through the neighbouring samples and evaluating it in between. We use the
Lagrange form: an order-N polynomial through N + 1 consecutive samples.

  order 0   nearest sample (no interpolation)
  order 1   straight line between two samples
  order 3   cubic through four samples (the usual quality/cost sweet spot)
  order 7   eight taps, for when aliasing of heavily stretched material matters

The taps are centred on the read position:

           first                      first + N
             |                            |
   ... [ s0 ][ s1 ][ s2 ][ s3 ] ...       (order 3)
                    ^
                 position

Weights for tap j at relative coordinate x:

   w_j = prod over m != j of (x - m) / (j - m)

At an integer position every weight but one contains a factor of exactly
zero and the remaining one is exactly one, so integer reads return the stored
sample bit-for-bit. Taps that fall outside the buffer read as silence.

Looped reads
------------
Inside a loop the neighbours of a position near `end` are the samples just
after `start`, not whatever follows the loop in the buffer. `lagrange_looped`
folds taps at or past `end` back into `[start, end)`, and once playback has
wrapped it folds taps before `start` forward too. Folded taps that land
between samples (fractional loop bounds) are read linearly.
*/

/// Highest supported interpolation order (eight taps).
pub const MAX_INTERPOLATION_ORDER: usize = 7;

#[inline]
fn tap(channel: &[f32], index: i64) -> f32 {
    if index < 0 {
        return 0.0;
    }
    channel.get(index as usize).copied().unwrap_or(0.0)
}

/// Read `channel` at a fractional `position` using an order-`order` polynomial.
///
/// Positions outside the buffer produce silence rather than an error.
pub fn lagrange(channel: &[f32], position: f64, order: usize) -> f32 {
    interpolate(position, order, |index| tap(channel, index))
}

/// Loop bounds for [`lagrange_looped`], in samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopBounds {
    pub start: f64,
    pub end: f64,
    /// Playback has already come round at least once.
    pub wrapped: bool,
}

impl LoopBounds {
    fn fold(&self, index: f64) -> Option<f64> {
        let past_end = index >= self.end;
        let before_start = self.wrapped && index < self.start;
        (past_end || before_start)
            .then(|| self.start + (index - self.start).rem_euclid(self.end - self.start))
    }
}

/// Like [`lagrange`], with taps outside the loop read from inside it.
pub fn lagrange_looped(channel: &[f32], position: f64, order: usize, bounds: LoopBounds) -> f32 {
    interpolate(position, order, |index| match bounds.fold(index as f64) {
        None => tap(channel, index),
        Some(folded) => {
            let whole = folded.floor();
            let frac = (folded - whole) as f32;
            let i = whole as i64;
            if frac == 0.0 {
                tap(channel, i)
            } else {
                tap(channel, i) * (1.0 - frac) + tap(channel, i + 1) * frac
            }
        }
    })
}

fn interpolate(position: f64, order: usize, tap: impl Fn(i64) -> f32) -> f32 {
    debug_assert!(order <= MAX_INTERPOLATION_ORDER);

    if order == 0 {
        return tap((position + 0.5).floor() as i64);
    }

    let base = position.floor();
    let frac = position - base;
    if frac == 0.0 {
        return tap(base as i64);
    }

    let lead = (order as i64 - 1) / 2;
    let first = base as i64 - lead;
    let x = frac + lead as f64;

    let mut acc = 0.0f64;
    for j in 0..=order {
        let sample = tap(first + j as i64);
        if sample == 0.0 {
            continue;
        }
        let mut weight = 1.0f64;
        for m in 0..=order {
            if m != j {
                weight *= (x - m as f64) / (j as f64 - m as f64);
            }
        }
        acc += weight * sample as f64;
    }
    acc as f32
}
