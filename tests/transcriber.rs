mod common;

use common::StubPitchModel;
use serde_json::Value;
use std::fs;
use stem_transcriber_core::{
    MusicXmlConverter, OutputLayout, PipelineConfig, TrackIdentity, Transcriber,
};

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn writes_all_artifacts_with_relative_paths() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("stems").join("bass.wav");
    common::write_wav(&source, &common::tonal_stem()).unwrap();

    let layout = OutputLayout::create(tmp.path().join("job")).unwrap();
    let model = StubPitchModel::new();
    let config = PipelineConfig::default();
    let transcriber = Transcriber::new(&layout, &model, &MusicXmlConverter, &config);

    let manifest = transcriber
        .transcribe(&source, &TrackIdentity::BASS)
        .unwrap();

    assert_eq!(manifest.id, "bass");
    assert_eq!(manifest.label, "Bass");
    assert_eq!(manifest.audio.as_deref(), Some("audio/bass.wav"));
    assert_eq!(manifest.midi.as_deref(), Some("midi/bass.mid"));
    assert_eq!(manifest.musicxml.as_deref(), Some("musicxml/bass.musicxml"));
    assert_eq!(manifest.notes.as_deref(), Some("notes/bass.json"));
    assert!(manifest.status.is_none());

    for rel in ["audio/bass.wav", "midi/bass.mid", "musicxml/bass.musicxml", "notes/bass.json"] {
        let path = layout.root().join(rel);
        assert!(fs::metadata(&path).unwrap().len() > 0, "empty {rel}");
    }
    // The source is copied, never moved.
    assert!(source.exists());
}

#[test]
fn note_events_are_rounded_and_named() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("vocals.wav");
    common::write_wav(&source, &common::tonal_stem()).unwrap();

    let layout = OutputLayout::create(tmp.path().join("job")).unwrap();
    let model = StubPitchModel::new();
    let config = PipelineConfig::default();
    let transcriber = Transcriber::new(&layout, &model, &MusicXmlConverter, &config);
    let manifest = transcriber
        .transcribe(&source, &TrackIdentity::VOCALS)
        .unwrap();

    let first = &manifest.note_events[0];
    assert_eq!(first.start, 0.123457);
    assert_eq!(first.duration, 0.476543);
    assert_eq!(first.pitch_midi, 60);
    assert_eq!(first.pitch_name, "C4");
    assert_eq!(first.velocity, 0.8);
    assert_eq!(manifest.note_events[1].pitch_name, "C#4");

    let summary = read_json(&layout.notes_path("vocals"));
    assert_eq!(summary["track"], "Vocals");
    assert_eq!(summary["tempo"], 100.0);
    assert_eq!(summary["notes"][0]["pitchName"], "C4");
    assert_eq!(summary["notes"][0]["start"], 0.123457);
    assert_eq!(summary["notes"].as_array().unwrap().len(), 2);
}

#[test]
fn tempo_defaults_when_score_has_no_marking() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("piano.wav");
    common::write_wav(&source, &common::tonal_stem()).unwrap();

    let layout = OutputLayout::create(tmp.path().join("job")).unwrap();
    let model = StubPitchModel::without_tempo();
    let config = PipelineConfig::default();
    let transcriber = Transcriber::new(&layout, &model, &MusicXmlConverter, &config);
    transcriber
        .transcribe(&source, &TrackIdentity::PIANO)
        .unwrap();

    assert_eq!(read_json(&layout.notes_path("piano"))["tempo"], 120.0);
}

#[test]
fn repeated_runs_overwrite_identically() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("drums.wav");
    common::write_wav(&source, &common::percussive_stem()).unwrap();

    let layout = OutputLayout::create(tmp.path().join("job")).unwrap();
    let model = StubPitchModel::new();
    let config = PipelineConfig::default();
    let transcriber = Transcriber::new(&layout, &model, &MusicXmlConverter, &config);

    let first = transcriber
        .transcribe(&source, &TrackIdentity::DRUMS)
        .unwrap();
    let notes_a = fs::read(layout.notes_path("drums")).unwrap();
    let xml_a = fs::read(layout.musicxml_path("drums")).unwrap();

    let second = transcriber
        .transcribe(&source, &TrackIdentity::DRUMS)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(layout.notes_path("drums")).unwrap(), notes_a);
    assert_eq!(fs::read(layout.musicxml_path("drums")).unwrap(), xml_a);
}

#[test]
fn source_already_in_place_is_not_copied_over_itself() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = OutputLayout::create(tmp.path()).unwrap();
    let in_place = layout.audio_path("other");
    common::write_wav(&in_place, &common::tonal_stem()).unwrap();
    let before = fs::read(&in_place).unwrap();

    let model = StubPitchModel::new();
    let config = PipelineConfig::default();
    let transcriber = Transcriber::new(&layout, &model, &MusicXmlConverter, &config);
    let manifest = transcriber
        .transcribe(&in_place, &TrackIdentity::OTHER)
        .unwrap();

    assert_eq!(manifest.audio.as_deref(), Some("audio/other.wav"));
    assert_eq!(fs::read(&in_place).unwrap(), before);
}

#[test]
fn model_failure_names_the_track() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("piano.wav");
    common::write_wav(&source, &common::tonal_stem()).unwrap();

    let layout = OutputLayout::create(tmp.path().join("job")).unwrap();
    let model = StubPitchModel::failing_on("piano");
    let config = PipelineConfig::default();
    let transcriber = Transcriber::new(&layout, &model, &MusicXmlConverter, &config);

    let err = transcriber
        .transcribe(&source, &TrackIdentity::PIANO)
        .unwrap_err();
    assert_eq!(err.slug(), Some("piano"));
    assert!(err.to_string().contains("inference failed"));
}

#[test]
fn missing_source_names_the_track() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = OutputLayout::create(tmp.path().join("job")).unwrap();
    let model = StubPitchModel::new();
    let config = PipelineConfig::default();
    let transcriber = Transcriber::new(&layout, &model, &MusicXmlConverter, &config);

    let err = transcriber
        .transcribe(&tmp.path().join("nope.wav"), &TrackIdentity::GUITAR)
        .unwrap_err();
    assert_eq!(err.slug(), Some("guitar"));
}
