use crate::synth::instrument::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,      // Available for allocation
    Active,    // Note held, gate high
    Releasing, // Note released, gate low, release tail still sounding
}

/// One slot of the voice pool: an instrument instance plus the note it is
/// currently bound to.
pub struct Voice {
    instrument: Box<dyn Instrument>,
    note: u8,
    velocity: u8,
    state: VoiceState,
    age: u64,
    release_left: u64,
}

impl Voice {
    pub fn new(instrument: Box<dyn Instrument>) -> Self {
        Self {
            instrument,
            note: 0,
            velocity: 0,
            state: VoiceState::Idle,
            age: 0,
            release_left: 0,
        }
    }

    /// Bind to a note. A voice that was still sounding is reset first, so a
    /// stolen voice starts from silence.
    pub fn start(&mut self, note: u8, velocity: u8, age: u64) {
        if self.state != VoiceState::Idle {
            self.instrument.reset();
        }
        self.note = note;
        self.velocity = velocity;
        self.state = VoiceState::Active;
        self.age = age;
    }

    /// Gate off; the voice goes idle after `release_samples` more frames.
    pub fn release(&mut self, release_samples: u64) {
        if self.state == VoiceState::Active {
            self.state = VoiceState::Releasing;
            self.release_left = release_samples;
            if release_samples == 0 {
                self.free();
            }
        }
    }

    /// Count down one rendered frame of release.
    pub fn advance(&mut self) {
        if self.state == VoiceState::Releasing {
            self.release_left = self.release_left.saturating_sub(1);
            if self.release_left == 0 {
                self.free();
            }
        }
    }

    pub fn free(&mut self) {
        self.state = VoiceState::Idle;
        self.note = 0;
        self.velocity = 0;
        self.release_left = 0;
    }

    /// Back to idle with a silent instrument.
    pub fn reset(&mut self) {
        self.free();
        self.age = 0;
        self.instrument.reset();
    }

    pub fn instrument_mut(&mut self) -> &mut dyn Instrument {
        self.instrument.as_mut()
    }

    pub fn replace_instrument(&mut self, instrument: Box<dyn Instrument>) {
        self.instrument = instrument;
        self.free();
    }

    pub fn is_idle(&self) -> bool {
        self.state == VoiceState::Idle
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }
}
