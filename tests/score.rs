use std::fs;
use stem_transcriber_core::{
    model::midi::PPQ, render_midi, MusicXmlConverter, RawNote, Score, ScoreConverter,
};

fn note(start: f64, end: f64, pitch: u8) -> RawNote {
    RawNote {
        start,
        end,
        pitch,
        amplitude: 0.7,
    }
}

#[test]
fn parses_rendered_midi() {
    // 120 BPM: one second is two quarters.
    let bytes = render_midi(&[note(0.0, 0.5, 60), note(0.5, 1.0, 64)], 120.0).unwrap();
    let score = Score::from_smf_bytes(&bytes, "piano").unwrap();

    assert_eq!(score.divisions, PPQ as u32);
    assert_eq!(score.tempo_markings(), vec![120.0]);
    assert_eq!(score.parts.len(), 1);

    let notes = &score.parts[0].notes;
    assert_eq!(notes.len(), 2);
    assert_eq!((notes[0].start, notes[0].duration, notes[0].key), (0, 480, 60));
    assert_eq!((notes[1].start, notes[1].duration, notes[1].key), (480, 480, 64));
}

#[test]
fn empty_note_list_still_parses() {
    let bytes = render_midi(&[], 90.0).unwrap();
    let score = Score::from_smf_bytes(&bytes, "silence").unwrap();
    assert!(score.parts.is_empty());
    assert_eq!(score.tempo_markings(), vec![90.0]);

    let xml = score.to_musicxml();
    assert!(xml.contains("<rest measure=\"yes\"/>"));
}

#[test]
fn rejects_non_midi_bytes() {
    assert!(Score::from_smf_bytes(b"RIFF....WAVE", "x").is_err());
}

#[test]
fn musicxml_spells_pitches_and_tempo() {
    let bytes = render_midi(&[note(0.0, 0.5, 61), note(0.5, 1.0, 48)], 100.0).unwrap();
    let xml = Score::from_smf_bytes(&bytes, "keys & more")
        .unwrap()
        .to_musicxml();

    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<score-partwise version=\"3.1\">"));
    assert!(xml.contains("<work-title>keys &amp; more</work-title>"));
    assert!(xml.contains("<per-minute>100</per-minute>"));
    assert!(xml.contains("<step>C</step>\n          <alter>1</alter>\n          <octave>4</octave>"));
    assert!(xml.contains("<step>C</step>\n          <octave>3</octave>"));
    assert!(xml.trim_end().ends_with("</score-partwise>"));
}

#[test]
fn notes_across_barlines_are_tied() {
    // Starts on beat 4 of bar 1 and lasts two quarters at 60 BPM.
    let bytes = render_midi(&[note(3.0, 5.0, 67)], 60.0).unwrap();
    let xml = Score::from_smf_bytes(&bytes, "tie").unwrap().to_musicxml();

    assert!(xml.contains("<measure number=\"2\">"));
    assert_eq!(xml.matches("<tie type=\"start\"/>").count(), 1);
    assert_eq!(xml.matches("<tie type=\"stop\"/>").count(), 1);
    assert_eq!(xml.matches("<step>G</step>").count(), 2);
}

#[test]
fn chords_share_one_onset() {
    let bytes = render_midi(&[note(0.0, 1.0, 60), note(0.0, 1.0, 64)], 120.0).unwrap();
    let xml = Score::from_smf_bytes(&bytes, "chord").unwrap().to_musicxml();
    assert_eq!(xml.matches("<chord/>").count(), 1);
}

#[test]
fn converter_writes_musicxml_file() {
    let tmp = tempfile::tempdir().unwrap();
    let midi = tmp.path().join("bass.mid");
    let out = tmp.path().join("bass.musicxml");
    fs::write(&midi, render_midi(&[note(0.0, 2.0, 40)], 120.0).unwrap()).unwrap();

    let converter = MusicXmlConverter;
    let score = converter.parse(&midi).unwrap();
    assert_eq!(score.title, "bass");
    converter.export_musicxml(&score, &out).unwrap();

    let xml = fs::read_to_string(&out).unwrap();
    assert!(xml.contains("<sign>F</sign>"));
}
