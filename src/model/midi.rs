//! Standard MIDI file rendering for note lists.

use anyhow::anyhow;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::{error::Result, model::RawNote};

/// Pulses per quarter note
pub const PPQ: u16 = 480;

/// Largest delta-time a track event can carry (28 bits).
const MAX_DELTA: u32 = (1 << 28) - 1;

/// Render notes as a single-track SMF at a constant tempo.
pub fn render_midi(notes: &[RawNote], tempo_bpm: f64) -> Result<Vec<u8>> {
    let tempo_bpm = if tempo_bpm.is_finite() && tempo_bpm > 0.0 {
        tempo_bpm
    } else {
        120.0
    };
    let tempo_uspq = (60_000_000.0 / tempo_bpm).round() as u32;
    let ticks_per_sec = PPQ as f64 * tempo_bpm / 60.0;
    let to_tick = |sec: f64| (sec.max(0.0) * ticks_per_sec).round() as u32;

    // (tick, is_note_on, key, velocity); note-offs sort before note-ons on the same tick.
    let mut timeline: Vec<(u32, bool, u8, u8)> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let start = to_tick(note.start);
        let end = to_tick(note.end).max(start.saturating_add(1));
        let key = note.pitch.min(127);
        let vel = (note.amplitude.clamp(0.0, 1.0) * 127.0).round().max(1.0) as u8;
        timeline.push((start, true, key, vel));
        timeline.push((end, false, key, 0));
    }
    timeline.sort_by_key(|&(tick, on, key, _)| (tick, on, key));

    let mut track_events = vec![TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(tempo_uspq))),
    }];

    let mut current_tick = 0u32;
    for (tick, on, key, vel) in timeline {
        let message = if on {
            MidiMessage::NoteOn {
                key: u7::from(key),
                vel: u7::from(vel),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::from(key),
                vel: u7::from(0),
            }
        };
        let delta = tick - current_tick;
        if delta > MAX_DELTA {
            return Err(anyhow!(
                "gap of {delta} ticks before tick {tick} exceeds the MIDI delta-time range"
            )
            .into());
        }
        track_events.push(TrackEvent {
            delta: u28::from(delta),
            kind: TrackEventKind::Midi {
                channel: u4::from(0),
                message,
            },
        });
        current_tick = tick;
    }

    track_events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(u15::from(PPQ)),
        },
        tracks: vec![track_events],
    };

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;
    Ok(bytes)
}
