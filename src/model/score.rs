//! MIDI to notated score conversion and MusicXML export.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use anyhow::anyhow;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::{error::Result, model::ScoreConverter};

#[derive(Clone, Debug, PartialEq)]
pub struct TempoMark {
    pub tick: u64,
    pub bpm: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoreNote {
    pub start: u64,
    pub duration: u64,
    pub key: u8,
    pub velocity: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub name: Option<String>,
    pub notes: Vec<ScoreNote>,
}

/// A parsed score. Times are in ticks; `divisions` ticks make one quarter note.
#[derive(Clone, Debug, PartialEq)]
pub struct Score {
    pub title: String,
    pub divisions: u32,
    /// (beats, beat type), e.g. (3, 4)
    pub time_signature: (u8, u8),
    pub tempos: Vec<TempoMark>,
    pub parts: Vec<Part>,
}

impl Score {
    pub fn from_smf_bytes(bytes: &[u8], title: &str) -> Result<Score> {
        let smf = Smf::parse(bytes)?;
        let divisions = match smf.header.timing {
            Timing::Metrical(t) => t.as_int() as u32,
            Timing::Timecode(..) => return Err(anyhow!("SMPTE-timed MIDI is not supported").into()),
        };
        if divisions == 0 {
            return Err(anyhow!("MIDI header declares zero ticks per quarter").into());
        }

        let mut tempos = Vec::new();
        let mut time_signature = None;
        let mut parts = Vec::new();

        for track in &smf.tracks {
            let mut tick = 0u64;
            let mut name = None;
            let mut open: HashMap<(u8, u8), (u64, u8)> = HashMap::new();
            let mut notes = Vec::new();

            for event in track {
                tick += event.delta.as_int() as u64;
                match event.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(us)) if us.as_int() > 0 => {
                        tempos.push(TempoMark {
                            tick,
                            bpm: bpm_from_uspq(us.as_int()),
                        });
                    }
                    TrackEventKind::Meta(MetaMessage::TimeSignature(num, den_pow, _, _)) => {
                        if time_signature.is_none() && num > 0 && den_pow <= 6 {
                            time_signature = Some((num, 1u8 << den_pow));
                        }
                    }
                    TrackEventKind::Meta(MetaMessage::TrackName(raw)) => {
                        let n = String::from_utf8_lossy(raw).trim().to_string();
                        if !n.is_empty() {
                            name = Some(n);
                        }
                    }
                    TrackEventKind::Midi { channel, message } => {
                        let ch = channel.as_int();
                        match message {
                            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                                let key = key.as_int();
                                // Retrigger closes the sounding note first
                                if let Some(prev) = open.remove(&(ch, key)) {
                                    close(&mut notes, key, prev, tick);
                                }
                                open.insert((ch, key), (tick, vel.as_int()));
                            }
                            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                                let key = key.as_int();
                                if let Some(prev) = open.remove(&(ch, key)) {
                                    close(&mut notes, key, prev, tick);
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }

            for ((_, key), prev) in open.drain() {
                close(&mut notes, key, prev, tick);
            }

            if !notes.is_empty() {
                notes.sort_by_key(|n| (n.start, n.key));
                parts.push(Part { name, notes });
            }
        }

        tempos.sort_by_key(|t| t.tick);

        Ok(Score {
            title: title.to_string(),
            divisions,
            time_signature: time_signature.unwrap_or((4, 4)),
            tempos,
            parts,
        })
    }

    /// Every explicit tempo marking, in BPM.
    pub fn tempo_markings(&self) -> Vec<f64> {
        self.tempos.iter().map(|t| t.bpm).collect()
    }

    pub fn measure_ticks(&self) -> u64 {
        let (beats, beat_type) = self.time_signature;
        let ticks = self.divisions as u64 * 4 * beats as u64 / beat_type.max(1) as u64;
        if ticks == 0 {
            self.divisions as u64 * 4
        } else {
            ticks
        }
    }

    pub fn to_musicxml(&self) -> String {
        let measure_ticks = self.measure_ticks();

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
        xml.push_str(
            "<!DOCTYPE score-partwise PUBLIC \"-//Recordare//DTD MusicXML 3.1 Partwise//EN\" \
             \"http://www.musicxml.org/dtds/partwise.dtd\">\n",
        );
        xml.push_str("<score-partwise version=\"3.1\">\n");
        xml.push_str(&format!(
            "  <work>\n    <work-title>{}</work-title>\n  </work>\n",
            escape(&self.title)
        ));

        let empty = [Part {
            name: None,
            notes: Vec::new(),
        }];
        let parts: &[Part] = if self.parts.is_empty() {
            &empty
        } else {
            &self.parts
        };

        xml.push_str("  <part-list>\n");
        for (i, part) in parts.iter().enumerate() {
            let name = part
                .name
                .clone()
                .unwrap_or_else(|| format!("Part {}", i + 1));
            xml.push_str(&format!(
                "    <score-part id=\"P{}\">\n      <part-name>{}</part-name>\n    </score-part>\n",
                i + 1,
                escape(&name)
            ));
        }
        xml.push_str("  </part-list>\n");

        for (i, part) in parts.iter().enumerate() {
            let tempos: &[TempoMark] = if i == 0 { &self.tempos } else { &[] };
            let measures = layout_measures(part, tempos, measure_ticks);

            xml.push_str(&format!("  <part id=\"P{}\">\n", i + 1));
            for (m, body) in measures.iter().enumerate() {
                xml.push_str(&format!("    <measure number=\"{}\">\n", m + 1));
                if m == 0 {
                    xml.push_str(&self.attributes_xml(part));
                }
                xml.push_str(body);
                xml.push_str("    </measure>\n");
            }
            xml.push_str("  </part>\n");
        }

        xml.push_str("</score-partwise>\n");
        xml
    }

    fn attributes_xml(&self, part: &Part) -> String {
        let (sign, line) = if mean_key(part) >= 60.0 {
            ("G", 2)
        } else {
            ("F", 4)
        };
        format!(
            "      <attributes>\n        <divisions>{}</divisions>\n        <key>\n          <fifths>0</fifths>\n        </key>\n        <time>\n          <beats>{}</beats>\n          <beat-type>{}</beat-type>\n        </time>\n        <clef>\n          <sign>{}</sign>\n          <line>{}</line>\n        </clef>\n      </attributes>\n",
            self.divisions, self.time_signature.0, self.time_signature.1, sign, line
        )
    }
}

/// Microseconds per quarter to BPM, rounded to 2 decimals so integer tempos
/// survive the microsecond rounding of the SMF tempo field.
fn bpm_from_uspq(uspq: u32) -> f64 {
    (60_000_000.0 / uspq as f64 * 100.0).round() / 100.0
}

fn close(notes: &mut Vec<ScoreNote>, key: u8, (start, velocity): (u64, u8), at: u64) {
    notes.push(ScoreNote {
        start,
        duration: at.saturating_sub(start).max(1),
        key,
        velocity,
    });
}

fn mean_key(part: &Part) -> f64 {
    if part.notes.is_empty() {
        return 60.0;
    }
    part.notes.iter().map(|n| n.key as f64).sum::<f64>() / part.notes.len() as f64
}

/// One voice of consecutive events: a chord (keys) or a rest (`None`).
struct Segment {
    start: u64,
    len: u64,
    keys: Option<Vec<u8>>,
    velocity: u8,
}

fn segments(part: &Part, total: u64) -> Vec<Segment> {
    let mut groups: BTreeMap<u64, Vec<&ScoreNote>> = BTreeMap::new();
    for note in &part.notes {
        groups.entry(note.start).or_default().push(note);
    }

    let starts: Vec<u64> = groups.keys().copied().collect();
    let mut out = Vec::new();
    let mut cursor = 0u64;

    for (idx, (&start, chord)) in groups.iter().enumerate() {
        if start > cursor {
            out.push(Segment {
                start: cursor,
                len: start - cursor,
                keys: None,
                velocity: 0,
            });
        }

        let mut len = chord.iter().map(|n| n.duration).max().unwrap_or(1);
        if let Some(&next) = starts.get(idx + 1) {
            // Overlaps are cut at the next onset
            len = len.min(next - start);
        }
        let len = len.max(1);

        let mut keys: Vec<u8> = chord.iter().map(|n| n.key).collect();
        keys.sort_unstable();
        keys.dedup();
        let velocity = chord.iter().map(|n| n.velocity).max().unwrap_or(64);

        out.push(Segment {
            start,
            len,
            keys: Some(keys),
            velocity,
        });
        cursor = start + len;
    }

    if cursor < total {
        out.push(Segment {
            start: cursor,
            len: total - cursor,
            keys: None,
            velocity: 0,
        });
    }
    out
}

fn layout_measures(part: &Part, tempos: &[TempoMark], measure_ticks: u64) -> Vec<String> {
    let end = part
        .notes
        .iter()
        .map(|n| n.start + n.duration)
        .max()
        .unwrap_or(0);
    let n_measures = (end.div_ceil(measure_ticks)).max(1);
    let total = n_measures * measure_ticks;

    let mut measures = vec![String::new(); n_measures as usize];

    for mark in tempos {
        let m = (mark.tick / measure_ticks).min(n_measures - 1);
        let offset = mark.tick - m * measure_ticks;
        measures[m as usize].push_str(&tempo_xml(mark.bpm, offset));
    }

    for seg in segments(part, total) {
        let mut pos = seg.start;
        let mut remaining = seg.len;
        let mut tied_from_previous = false;

        while remaining > 0 {
            let m = pos / measure_ticks;
            let room = (m + 1) * measure_ticks - pos;
            let piece = remaining.min(room);
            let tie_next = piece < remaining;

            let body = &mut measures[m as usize];
            match &seg.keys {
                None => body.push_str(&rest_xml(piece, measure_ticks)),
                Some(keys) => {
                    for (i, &key) in keys.iter().enumerate() {
                        body.push_str(&note_xml(NoteXml {
                            key,
                            duration: piece,
                            chord: i > 0,
                            tie_start: tie_next,
                            tie_stop: tied_from_previous,
                            velocity: seg.velocity,
                        }));
                    }
                }
            }

            tied_from_previous = true;
            pos += piece;
            remaining -= piece;
        }
    }

    measures
}

fn tempo_xml(bpm: f64, offset: u64) -> String {
    let per_minute = if (bpm - bpm.round()).abs() < 1e-6 {
        format!("{}", bpm.round() as i64)
    } else {
        format!("{:.2}", bpm)
    };
    let offset_xml = if offset > 0 {
        format!("        <offset>{offset}</offset>\n")
    } else {
        String::new()
    };
    format!(
        "      <direction placement=\"above\">\n        <direction-type>\n          <metronome>\n            <beat-unit>quarter</beat-unit>\n            <per-minute>{per_minute}</per-minute>\n          </metronome>\n        </direction-type>\n{offset_xml}        <sound tempo=\"{per_minute}\"/>\n      </direction>\n"
    )
}

struct NoteXml {
    key: u8,
    duration: u64,
    chord: bool,
    tie_start: bool,
    tie_stop: bool,
    velocity: u8,
}

fn note_xml(n: NoteXml) -> String {
    let (step, alter, octave) = spell(n.key);
    let mut xml = format!(
        "      <note dynamics=\"{:.2}\">\n",
        n.velocity as f64 / 90.0 * 100.0
    );
    if n.chord {
        xml.push_str("        <chord/>\n");
    }
    xml.push_str("        <pitch>\n");
    xml.push_str(&format!("          <step>{step}</step>\n"));
    if alter != 0 {
        xml.push_str(&format!("          <alter>{alter}</alter>\n"));
    }
    xml.push_str(&format!("          <octave>{octave}</octave>\n"));
    xml.push_str("        </pitch>\n");
    xml.push_str(&format!("        <duration>{}</duration>\n", n.duration));
    if n.tie_stop {
        xml.push_str("        <tie type=\"stop\"/>\n");
    }
    if n.tie_start {
        xml.push_str("        <tie type=\"start\"/>\n");
    }
    xml.push_str("        <voice>1</voice>\n");
    if n.tie_start || n.tie_stop {
        xml.push_str("        <notations>\n");
        if n.tie_stop {
            xml.push_str("          <tied type=\"stop\"/>\n");
        }
        if n.tie_start {
            xml.push_str("          <tied type=\"start\"/>\n");
        }
        xml.push_str("        </notations>\n");
    }
    xml.push_str("      </note>\n");
    xml
}

fn rest_xml(duration: u64, measure_ticks: u64) -> String {
    let measure_attr = if duration == measure_ticks {
        " measure=\"yes\""
    } else {
        ""
    };
    format!(
        "      <note>\n        <rest{measure_attr}/>\n        <duration>{duration}</duration>\n        <voice>1</voice>\n      </note>\n"
    )
}

/// Sharp spelling: (step, alter, octave) with middle C (60) in octave 4.
pub fn spell(key: u8) -> (&'static str, i8, i32) {
    const STEPS: [(&str, i8); 12] = [
        ("C", 0),
        ("C", 1),
        ("D", 0),
        ("D", 1),
        ("E", 0),
        ("F", 0),
        ("F", 1),
        ("G", 0),
        ("G", 1),
        ("A", 0),
        ("A", 1),
        ("B", 0),
    ];
    let (step, alter) = STEPS[(key % 12) as usize];
    (step, alter, key as i32 / 12 - 1)
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Native MIDI → MusicXML converter.
#[derive(Clone, Copy, Debug, Default)]
pub struct MusicXmlConverter;

impl ScoreConverter for MusicXmlConverter {
    fn parse(&self, midi: &Path) -> Result<Score> {
        let bytes = fs::read(midi)?;
        let title = midi
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("score");
        Score::from_smf_bytes(&bytes, title)
    }

    fn export_musicxml(&self, score: &Score, path: &Path) -> Result<()> {
        fs::write(path, score.to_musicxml())?;
        Ok(())
    }
}
