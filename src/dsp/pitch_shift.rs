/*
Delay-Line Pitch Shifter
========================

Changes pitch without changing duration, the way a rotating tape head does.

Audio is written into a short circular delay line. Two read taps sweep
across the line at a rate set by the pitch ratio:

   delay' = 1 - ratio   (samples of delay gained per output sample)

 - ratio > 1: the taps catch up with the write head, reading faster than
   real time, so pitch rises.
 - ratio < 1: the taps fall behind, pitch drops.

When a tap hits the end of the window it jumps back to the start, which
would click. The second tap runs half a window out of phase, and the two are
crossfaded with sin^2 / cos^2 weights (these always sum to one), so each tap
is silent at the moment it jumps.

   weight
   1 |  \     /\     /
     |   \   /  \   /      tap A
     |    \ /    \ /
     |    / \    / \       tap B
   0 |___/___\__/___\___
         jump   jump

At rest (ratio 1, phase 0) tap A sits at zero delay with zero weight and tap
B sits half a window back with full weight. The shifter is then a pure delay
of `latency()` samples, exact because the window length is even. Callers that
can read ahead feed the input `latency()` samples early and get the input
back untouched at unity, with no switch to click on when the ratio moves.

This is a simple shifter: good enough for transposing loops by a few
semitones, with the slight chorusing of tape-head designs.
*/

/// Crossfade window length in seconds.
const WINDOW_SECONDS: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct PitchShifter {
    buffer: Vec<f32>,
    write_pos: usize,
    window: f64,
    /// Position of tap A within the window, 0.0 - 1.0.
    phase: f64,
}

impl PitchShifter {
    pub fn new(sample_rate: f64) -> Self {
        let window = 2.0 * (0.5 * WINDOW_SECONDS * sample_rate).max(2.0).floor();
        Self {
            buffer: vec![0.0; window as usize + 4],
            write_pos: 0,
            window,
            phase: 0.0,
        }
    }

    /// Delay of the output at unity ratio, in samples.
    pub fn latency(&self) -> usize {
        (self.window / 2.0) as usize
    }

    /// Linearly interpolated read `delay` samples behind the write head.
    #[inline]
    fn read(&self, delay: f64) -> f32 {
        let len = self.buffer.len();
        let whole = delay.floor();
        let frac = (delay - whole) as f32;
        let i0 = (self.write_pos + len - (whole as usize % len)) % len;
        let i1 = (i0 + len - 1) % len;
        self.buffer[i0] * (1.0 - frac) + self.buffer[i1] * frac
    }

    /// Push one input sample and return one shifted output sample.
    pub fn next_sample(&mut self, input: f32, ratio: f64) -> f32 {
        self.buffer[self.write_pos] = input;

        let phase_b = (self.phase + 0.5).fract();
        let delay_a = self.phase * self.window;
        let delay_b = phase_b * self.window;

        let weight_a = (std::f64::consts::PI * self.phase).sin().powi(2) as f32;
        let weight_b = 1.0 - weight_a;
        let out = self.read(delay_a) * weight_a + self.read(delay_b) * weight_b;

        self.phase = (self.phase + (1.0 - ratio) / self.window).rem_euclid(1.0);
        self.write_pos = (self.write_pos + 1) % self.buffer.len();

        out
    }

    /// Record an input sample without producing output.
    pub fn push(&mut self, input: f32) {
        self.buffer[self.write_pos] = input;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.phase = 0.0;
    }
}
