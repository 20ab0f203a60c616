// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use rubato::{
    ResampleError, Resampler, ResamplerConstructionError, SincFixedIn,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

/// Errors raised while discovering and decoding clips.
#[derive(Debug, thiserror::Error)]
pub enum ClipSourceError {
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("{path}: {source}")]
    Decode {
        path: PathBuf,
        source: SymphoniaError,
    },

    #[error("{0}: no audio track found")]
    NoTrack(PathBuf),

    #[error("{0}: sample rate not specified")]
    NoSampleRate(PathBuf),

    #[error("{0}: no audio decoded")]
    Empty(PathBuf),

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("{path}: unable to resample from {from} Hz to {to} Hz: {source}")]
    ResamplerConstruction {
        path: PathBuf,
        from: u32,
        to: u32,
        source: ResamplerConstructionError,
    },

    #[error("{path}: resampling failed: {source}")]
    Resample { path: PathBuf, source: ResampleError },
}

/// Frames fed to the resampler per call.
const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Interleaved samples decoded from a file.
pub struct Decoded {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

/// Decodes an entire audio file into memory.
pub fn decode_file(path: &Path) -> Result<Decoded, ClipSourceError> {
    let decode_err = |source| ClipSourceError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source| ClipSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let detected = get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(decode_err)?;
    let mut format_reader = detected.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ClipSourceError::NoTrack(path.to_path_buf()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let mut sample_rate = params.sample_rate;

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs()
        .make(&params, &decoder_opts)
        .map_err(decode_err)?;

    let mut samples = Vec::new();
    let mut channels = params.channels.map(|c| c.count()).unwrap_or(0);
    let mut buffer: Option<SampleBuffer<f32>> = None;

    while let Some(packet) = next_packet(format_reader.as_mut(), decoder.as_mut(), track_id)
        .map_err(decode_err)?
    {
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                decoder.decode(&packet).map_err(decode_err)?
            }
            // A corrupt packet is skipped rather than failing the whole clip.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(decode_err(e)),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        sample_rate = sample_rate.or(Some(spec.rate));

        let needed = decoded.capacity() * channels;
        if buffer.as_ref().map_or(true, |buf| buf.capacity() < needed) {
            buffer = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = buffer.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| ClipSourceError::NoSampleRate(path.to_path_buf()))?;
    if samples.is_empty() || channels == 0 {
        return Err(ClipSourceError::Empty(path.to_path_buf()));
    }

    Ok(Decoded {
        samples,
        channels,
        sample_rate,
    })
}

/// Reads the next packet for the track. Returns `Ok(None)` at the end of the stream.
fn next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
) -> Result<Option<Packet>, SymphoniaError> {
    loop {
        match format_reader.next_packet() {
            Ok(packet) if packet.track_id() != track_id => continue,
            Ok(packet) => return Ok(Some(packet)),
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(None)
            }
            // Some readers report the end of the stream as a decode error.
            Err(SymphoniaError::DecodeError(_)) => return Ok(None),
            Err(e) => return Err(e),
        }
    }
}

/// Averages interleaved channels down to mono.
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resamples mono samples with a band-limited sinc resampler. The result is
/// aligned with the input, so it holds `len * target / source` frames.
pub fn resample(
    path: &Path,
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, ClipSourceError> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let construction_err = |source| ClipSourceError::ResamplerConstruction {
        path: path.to_path_buf(),
        from: source_rate,
        to: target_rate,
        source,
    };
    let resample_err = |source| ClipSourceError::Resample {
        path: path.to_path_buf(),
        source,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    if source_rate == 0 || target_rate == 0 {
        return Err(construction_err(ResamplerConstructionError::InvalidRatio(
            ratio,
        )));
    }

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, RESAMPLE_CHUNK_SIZE, 1)
            .map_err(construction_err)?;

    let delay = resampler.output_delay();
    let target_frames = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_frames + delay + RESAMPLE_CHUNK_SIZE);

    let mut position = 0;
    while samples.len() - position >= resampler.input_frames_next() {
        let frames = resampler.input_frames_next();
        let chunk = resampler
            .process(&[&samples[position..position + frames]], None)
            .map_err(resample_err)?;
        output.extend_from_slice(&chunk[0]);
        position += frames;
    }
    if position < samples.len() {
        let tail: [&[f32]; 1] = [&samples[position..]];
        let chunk = resampler
            .process_partial(Some(&tail[..]), None)
            .map_err(resample_err)?;
        output.extend_from_slice(&chunk[0]);
    }

    // Flush the filter until the delayed tail has come out.
    while output.len() < target_frames + delay {
        let chunk = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(resample_err)?;
        if chunk[0].is_empty() {
            break;
        }
        output.extend_from_slice(&chunk[0]);
    }

    output.drain(..delay.min(output.len()));
    output.resize(target_frames, 0.0);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_decode_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let tone = testutil::sine(440.0, 0.5, 44100, 4410);
        testutil::write_wav(&path, &[tone.clone()], 44100).unwrap();

        let decoded = decode_file(&path).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.samples.len(), tone.len());
        for (a, b) in decoded.samples.iter().zip(tone.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_decode_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = decode_file(&dir.path().join("missing.wav"));
        assert!(matches!(result, Err(ClipSourceError::Io { .. })));
    }

    #[test]
    fn test_decode_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(decode_file(&path).is_err());
    }

    #[test]
    fn test_downmix() {
        let stereo = vec![1.0f32, -1.0, 0.5, 0.5, 0.0, 1.0];
        assert_eq!(downmix(&stereo, 2), vec![0.0, 0.5, 0.5]);
        assert_eq!(downmix(&stereo, 1), stereo);
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_resample() {
        let path = Path::new("tone.wav");
        let source = testutil::sine(440.0, 0.5, 44100, 44100);
        let result = resample(path, &source, 44100, 48000).unwrap();
        assert_eq!(result.len(), 48000);

        // An in-band tone keeps its level once the filter has settled.
        let settled = &result[4800..43200];
        assert!((rms(settled) - 0.5 / 2f32.sqrt()).abs() < 0.01);

        assert_eq!(resample(path, &source, 44100, 44100).unwrap(), source);
    }

    #[test]
    fn test_resample_attenuates_out_of_band() {
        let path = Path::new("tone.wav");
        // 20 kHz is above the 8 kHz Nyquist limit of the target rate.
        let source = testutil::sine(20000.0, 0.5, 48000, 48000);
        let result = resample(path, &source, 48000, 16000).unwrap();
        assert_eq!(result.len(), 16000);
        assert!(rms(&result[1600..14400]) < 0.01);
    }

    #[test]
    fn test_resample_zero_rate() {
        let path = Path::new("broken.wav");
        let source = vec![0.5f32; 16];
        assert!(matches!(
            resample(path, &source, 0, 48000),
            Err(ClipSourceError::ResamplerConstruction { from: 0, .. })
        ));
        assert!(matches!(
            resample(path, &source, 48000, 0),
            Err(ClipSourceError::ResamplerConstruction { to: 0, .. })
        ));
    }
}
