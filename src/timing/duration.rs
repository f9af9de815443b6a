/// Musical note length as an exact fraction of a whole note.
///
/// Used to describe note and clip lengths without floating point drift until
/// the last moment, when they are turned into beats for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub numerator: u32,
    pub denominator: u32,
}

impl Duration {
    pub const WHOLE: Duration = Duration::new(1, 1);
    pub const HALF: Duration = Duration::new(1, 2);
    pub const QUARTER: Duration = Duration::new(1, 4);
    pub const EIGHTH: Duration = Duration::new(1, 8);
    pub const SIXTEENTH: Duration = Duration::new(1, 16);

    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Multiply by 3/2
    pub const fn dotted(self) -> Self {
        Self::new(self.numerator * 3, self.denominator * 2)
    }

    /// Multiply by 2/3
    pub const fn triplet(self) -> Self {
        Self::new(self.numerator * 2, self.denominator * 3)
    }

    /// `count` back-to-back copies of this duration.
    pub const fn times(self, count: u32) -> Self {
        Self::new(self.numerator * count, self.denominator)
    }

    /// Length in quarter-note beats, the unit the tempo map works in.
    pub fn beats(&self) -> f64 {
        (self.numerator as f64 * 4.0) / self.denominator as f64
    }

    /// Length in ticks at the given resolution, truncated.
    pub fn ticks(&self, ppqn: u32) -> u64 {
        (self.numerator as u64 * 4 * ppqn as u64) / self.denominator as u64
    }
}

impl From<Duration> for f64 {
    fn from(duration: Duration) -> f64 {
        duration.beats()
    }
}
