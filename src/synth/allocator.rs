use crate::synth::voice::{Voice, VoiceState};

/// Pick the voice for a new note.
///
/// 1. the lowest-index idle voice
/// 2. otherwise the oldest releasing voice (its tail is the least audible)
/// 3. otherwise the oldest active voice
///
/// A stolen voice is cut, not faded: [`Voice::start`] resets its instrument
/// and the new note begins from silence in the same frame. The release
/// countdown only runs after a note-off.
///
/// Only returns `None` for an empty pool.
pub fn choose_voice(voices: &[Voice]) -> Option<usize> {
    if let Some(idle) = voices.iter().position(Voice::is_idle) {
        return Some(idle);
    }

    let oldest_in = |state: VoiceState| {
        voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.state() == state)
            .min_by_key(|(_, v)| v.age())
            .map(|(index, _)| index)
    };

    oldest_in(VoiceState::Releasing).or_else(|| oldest_in(VoiceState::Active))
}

/// The voice a note-off for `note` applies to: the oldest active voice
/// playing that note.
pub fn find_voice(voices: &[Voice], note: u8) -> Option<usize> {
    voices
        .iter()
        .enumerate()
        .filter(|(_, v)| v.state() == VoiceState::Active && v.note() == note)
        .min_by_key(|(_, v)| v.age())
        .map(|(index, _)| index)
}
