use std::{fs::File, path::Path};

use hound::WavWriter;
use symphonia::core::{
    audio::SampleBuffer,
    codecs::DecoderOptions,
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::{
    error::{PipelineError, Result},
    types::AudioData,
};

pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path: &Path = path.as_ref();

    let file: File = File::open(path).map_err(|e| PipelineError::decode(path, e))?;

    let mss: MediaSourceStream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint: Hint = Hint::new();

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PipelineError::decode(path, e))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| PipelineError::decode(path, "no default track found"))?;
    let track_id = track.id;

    let mut sample_rate: u32 = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels: u16 = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PipelineError::decode(path, e))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(PipelineError::decode(path, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt frame is skipped rather than failing the whole file.
            Err(SymphoniaError::DecodeError(msg)) => {
                debug!(path = %path.display(), "skipping undecodable packet: {msg}");
                continue;
            }
            Err(e) => return Err(PipelineError::decode(path, e)),
        };
        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count() as u16;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);

        samples.extend_from_slice(buffer.samples());
    }

    debug!(
        path = %path.display(),
        sample_rate,
        channels,
        samples = samples.len(),
        "read audio"
    );

    Ok(AudioData {
        samples,
        sample_rate,
        channels: channels.max(1),
    })
}

pub fn write_audio<P: AsRef<Path>>(path: P, audio: &AudioData) -> Result<()> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec).map_err(hound_error)?;
    for sample in &audio.samples {
        let s = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s).map_err(hound_error)?;
    }

    writer.finalize().map_err(hound_error)?;
    Ok(())
}

fn hound_error(e: hound::Error) -> PipelineError {
    match e {
        hound::Error::IoError(io) => PipelineError::Io(io),
        other => PipelineError::Anyhow(anyhow::anyhow!("WAV write failed: {other}")),
    }
}

pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels as usize)
        .map(|chunk| chunk.iter().copied().sum::<f32>() / chunk.len() as f32)
        .collect()
}

/// Normalize a signal to two channels before it is written: a single channel
/// is duplicated into two identical ones, anything wider passes through.
pub fn ensure_stereo(audio: &AudioData) -> AudioData {
    if audio.channels >= 2 {
        return audio.clone();
    }

    AudioData {
        samples: audio.samples.iter().flat_map(|&s| [s, s]).collect(),
        sample_rate: audio.sample_rate,
        channels: 2,
    }
}
