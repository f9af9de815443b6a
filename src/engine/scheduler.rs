use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::midi::{MidiEvent, Note};
use crate::timing::{TempoMap, TimeUnit};

/// A note event due inside the current block, `offset` frames from its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEvent {
    pub offset: usize,
    pub event: MidiEvent,
}

/// A note exactly as the caller registered it, kept so a tempo change can
/// resolve it again.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
struct QueuedNote {
    note: Note,
    unit: TimeUnit,
    seq: u64,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
struct TimedEvent {
    sample: u64,
    event: MidiEvent,
    seq: u64,
}

impl TimedEvent {
    /// Note-offs sort before note-ons at the same sample, then registration order.
    fn key(&self) -> (u64, bool, u64) {
        (self.sample, !self.event.is_note_off(), self.seq)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
struct NodeQueue {
    notes: Vec<QueuedNote>,
    events: Vec<TimedEvent>,
    cursor: usize,
}

impl NodeQueue {
    fn resolve(&mut self, tempo: &TempoMap) {
        self.events.clear();
        for queued in &self.notes {
            let (on, off) = resolve_note(&queued.note, queued.unit, tempo);
            self.events.push(TimedEvent {
                sample: on,
                event: MidiEvent::NoteOn {
                    key: queued.note.pitch,
                    velocity: queued.note.velocity,
                },
                seq: queued.seq,
            });
            self.events.push(TimedEvent {
                sample: off,
                event: MidiEvent::NoteOff {
                    key: queued.note.pitch,
                },
                seq: queued.seq,
            });
        }
        self.events.sort_by_key(TimedEvent::key);
        self.cursor = 0;
    }
}

/// Absolute note-on and note-off samples for a note.
///
/// A note-off never lands on the same sample as its note-on, so zero-length
/// notes still sound for one frame.
fn resolve_note(note: &Note, unit: TimeUnit, tempo: &TempoMap) -> (u64, u64) {
    let (on, off) = match unit {
        TimeUnit::Seconds => (
            tempo.sample_index_at_seconds(note.start),
            tempo.sample_index_at_seconds(note.end()),
        ),
        TimeUnit::Beats => (
            tempo.sample_index_at_beat(note.start),
            tempo.sample_index_at_beat(note.end()),
        ),
    };
    (on, off.max(on + 1))
}

/// Per-node, time-ordered note queues.
///
/// Notes are resolved to absolute sample timestamps when they are added and
/// again whenever the tempo changes. During a render the engine drains each
/// node's queue one block at a time.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queues: BTreeMap<String, NodeQueue>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a note for `node`. Returns the number of events scheduled,
    /// which is always two (on and off).
    pub fn enqueue(
        &mut self,
        node: &str,
        note: Note,
        unit: TimeUnit,
        tempo: &TempoMap,
    ) -> Result<usize> {
        note.validate()?;

        let seq = self.next_seq;
        self.next_seq += 1;

        let queue = self.queues.entry(node.to_string()).or_default();
        queue.notes.push(QueuedNote { note, unit, seq });
        queue.resolve(tempo);
        Ok(2)
    }

    /// Re-resolve every queued note against a new tempo map.
    pub fn retime(&mut self, tempo: &TempoMap) {
        for queue in self.queues.values_mut() {
            queue.resolve(tempo);
        }
    }

    pub fn event_count(&self, node: &str) -> usize {
        self.queues.get(node).map_or(0, |q| q.events.len())
    }

    pub fn clear(&mut self, node: &str) {
        self.queues.remove(node);
    }

    /// Start delivering every queue from the beginning again.
    pub fn rewind(&mut self) {
        for queue in self.queues.values_mut() {
            queue.cursor = 0;
        }
    }

    /// Collect `node`'s events in `start .. start + len` into `out`.
    pub fn drain_block(&mut self, node: &str, start: u64, len: usize, out: &mut Vec<BlockEvent>) {
        out.clear();
        let Some(queue) = self.queues.get_mut(node) else {
            return;
        };

        let end = start + len as u64;
        while let Some(timed) = queue.events.get(queue.cursor) {
            if timed.sample >= end {
                break;
            }
            if timed.sample >= start {
                out.push(BlockEvent {
                    offset: (timed.sample - start) as usize,
                    event: timed.event,
                });
            }
            queue.cursor += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 1_000.0;

    fn drain_all(scheduler: &mut Scheduler, node: &str, samples: u64, block: usize) -> Vec<(u64, MidiEvent)> {
        let mut out = Vec::new();
        let mut events = Vec::new();
        let mut start = 0;
        while start < samples {
            let len = block.min((samples - start) as usize);
            scheduler.drain_block(node, start, len, &mut events);
            out.extend(events.iter().map(|e| (start + e.offset as u64, e.event)));
            start += len as u64;
        }
        out
    }

    #[test]
    fn each_note_schedules_two_events() {
        let tempo = TempoMap::constant(120.0, SR).unwrap();
        let mut scheduler = Scheduler::new();

        for beat in [0.0, 2.0, 3.0] {
            let added = scheduler
                .enqueue("synth", Note::new(60, 100, beat, 1.0), TimeUnit::Beats, &tempo)
                .unwrap();
            assert_eq!(added, 2);
        }
        assert_eq!(scheduler.event_count("synth"), 6);
        assert_eq!(scheduler.event_count("other"), 0);
    }

    #[test]
    fn invalid_notes_are_rejected() {
        let tempo = TempoMap::constant(120.0, SR).unwrap();
        let mut scheduler = Scheduler::new();
        assert!(scheduler
            .enqueue("synth", Note::new(200, 100, 0.0, 1.0), TimeUnit::Seconds, &tempo)
            .is_err());
        assert_eq!(scheduler.event_count("synth"), 0);
    }

    #[test]
    fn note_off_precedes_note_on_at_same_sample() {
        let tempo = TempoMap::constant(120.0, SR).unwrap();
        let mut scheduler = Scheduler::new();
        // Second note starts exactly where the first ends.
        scheduler
            .enqueue("synth", Note::new(60, 90, 0.0, 1.0), TimeUnit::Beats, &tempo)
            .unwrap();
        scheduler
            .enqueue("synth", Note::new(62, 90, 1.0, 1.0), TimeUnit::Beats, &tempo)
            .unwrap();

        let events = drain_all(&mut scheduler, "synth", 2_000, 64);
        assert_eq!(events[1], (500, MidiEvent::NoteOff { key: 60 }));
        assert_eq!(
            events[2],
            (
                500,
                MidiEvent::NoteOn {
                    key: 62,
                    velocity: 90
                }
            )
        );
    }

    #[test]
    fn delivery_is_independent_of_block_size() {
        let tempo = TempoMap::constant(97.0, SR).unwrap();
        let mut scheduler = Scheduler::new();
        for i in 0..20 {
            scheduler
                .enqueue(
                    "synth",
                    Note::new(40 + i as u8, 100, i as f64 * 0.37, 0.5),
                    TimeUnit::Beats,
                    &tempo,
                )
                .unwrap();
        }

        let reference = drain_all(&mut scheduler, "synth", 10_000, 10_000);
        for block in [1, 3, 64, 511] {
            scheduler.rewind();
            assert_eq!(drain_all(&mut scheduler, "synth", 10_000, block), reference);
        }
        assert_eq!(reference.len(), 40);
    }

    #[test]
    fn retime_follows_tempo_for_beat_notes_only() {
        let slow = TempoMap::constant(60.0, SR).unwrap();
        let fast = TempoMap::constant(120.0, SR).unwrap();
        let mut scheduler = Scheduler::new();
        scheduler
            .enqueue("a", Note::new(60, 100, 2.0, 1.0), TimeUnit::Beats, &slow)
            .unwrap();
        scheduler
            .enqueue("b", Note::new(60, 100, 2.0, 1.0), TimeUnit::Seconds, &slow)
            .unwrap();

        scheduler.retime(&fast);
        let a = drain_all(&mut scheduler, "a", 5_000, 128);
        let b = drain_all(&mut scheduler, "b", 5_000, 128);
        assert_eq!(a[0].0, 1_000);
        assert_eq!(b[0].0, 2_000);
    }

    #[test]
    fn zero_length_note_lasts_one_sample() {
        let tempo = TempoMap::constant(120.0, SR).unwrap();
        let mut scheduler = Scheduler::new();
        scheduler
            .enqueue("synth", Note::new(60, 100, 0.25, 0.0), TimeUnit::Seconds, &tempo)
            .unwrap();
        let events = drain_all(&mut scheduler, "synth", 1_000, 32);
        assert_eq!(events[0].0, 250);
        assert_eq!(events[1].0, 251);
    }
}
