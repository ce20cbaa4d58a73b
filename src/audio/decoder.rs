//! Audio decoding to mono f32 PCM
//!
//! WAV goes through hound; MP3, FLAC and OGG go through symphonia. Every path
//! down-mixes to mono by averaging channels and rescales by peak when the
//! codec hands back samples outside [-1.0, 1.0]. Analysis runs at the source
//! sample rate, so nothing is resampled here.

use crate::audio::format::detect_format;
use crate::error::{AnalysisError, ErrorCode, Result};
use crate::types::{AudioFormat, DecodeOrigin, PcmBuffer};
use std::f32::consts::PI;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace, warn};

/// Fundamental of the placeholder waveform
const PLACEHOLDER_FREQ: f32 = 220.0;

/// Decoder behaviour switches
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Synthesize a placeholder waveform when a compressed stream's container
    /// is readable but its codec yields no samples
    pub synthetic_fallback: bool,
    /// Longest placeholder, in seconds, the container header may ask for
    pub max_duration: f64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            synthetic_fallback: false,
            max_duration: 600.0,
        }
    }
}

/// Decode container bytes to a mono buffer at the source sample rate
pub fn decode(bytes: &[u8], options: &DecodeOptions) -> Result<PcmBuffer> {
    let format = detect_format(bytes);
    let buffer = match format {
        AudioFormat::Wav => decode_wav(bytes)?,
        AudioFormat::Mp3 | AudioFormat::Flac | AudioFormat::Ogg => {
            decode_compressed(bytes, format, options)?
        }
        AudioFormat::Unknown => {
            return Err(AnalysisError::unsupported_format(format.to_string()));
        }
    };

    debug!(
        "Decoded {} samples ({:.2}s @ {}Hz, {} source channels, {:?})",
        buffer.len(),
        buffer.duration,
        buffer.sample_rate,
        buffer.channels_original,
        buffer.origin
    );

    Ok(buffer)
}

/// Decode RIFF/WAVE via hound, integer or float samples
fn decode_wav(bytes: &[u8]) -> Result<PcmBuffer> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| AnalysisError::corrupted(format!("Failed to read WAV header: {}", e)))?;

    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(AnalysisError::corrupted("WAV header declares a 0 Hz sample rate"));
    }
    if spec.channels == 0 {
        return Err(AnalysisError::corrupted("WAV header declares no channels"));
    }

    debug!(
        "Decoding WAV: {}Hz, {} channels, {} bit {:?}",
        spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
    );

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| AnalysisError::decode_failed(format!("Failed to read WAV samples: {}", e)))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| {
                    AnalysisError::decode_failed(format!("Failed to read WAV samples: {}", e))
                })?
        }
    };

    let mut mono = to_mono(&interleaved, spec.channels as usize);
    if mono.is_empty() {
        return Err(AnalysisError::decode_failed("WAV file contains no samples"));
    }
    normalize_peak(&mut mono);

    Ok(PcmBuffer::new(mono, spec.sample_rate).with_source(AudioFormat::Wav, spec.channels))
}

/// Decode MP3/FLAC/OGG via symphonia
fn decode_compressed(bytes: &[u8], format: AudioFormat, options: &DecodeOptions) -> Result<PcmBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = format.extension() {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AnalysisError::corrupted(format!("Failed to probe {} container: {}", format, e)))?;

    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AnalysisError::corrupted("No audio tracks found"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2).max(1);
    let declared_rate = codec_params.sample_rate;
    let declared_frames = codec_params.n_frames;

    debug!(
        "Decoding {}: {:?}Hz, {} channels, {:?} frames declared",
        format, declared_rate, channels, declared_frames
    );

    let placeholder = || placeholder_buffer(options, format, channels as u16, declared_rate, declared_frames);

    let mut decoder = match symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default()) {
        Ok(decoder) => decoder,
        Err(e) => {
            return placeholder().unwrap_or_else(|| {
                Err(AnalysisError::decode_failed(format!("Failed to create decoder: {}", e)))
            });
        }
    };

    let mut all_samples: Vec<f32> = Vec::new();
    let mut sample_rate = declared_rate.unwrap_or(0);
    let mut skipped = 0usize;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break; // End of stream
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                if all_samples.is_empty() {
                    return Err(AnalysisError::corrupted(format!("Failed to read packet: {}", e)));
                }
                // Truncated tail: keep what decoded cleanly
                warn!("Stopping at unreadable packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                trace!("Skipping corrupted frame: {}", e);
                skipped += 1;
                continue;
            }
            Err(e) => {
                return placeholder()
                    .unwrap_or_else(|| Err(AnalysisError::decode_failed(format!("Decode error: {}", e))));
            }
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        all_samples.extend(to_mono(sample_buf.samples(), spec.channels.count().max(1)));
    }

    if skipped > 0 {
        debug!("Skipped {} corrupted packets", skipped);
    }

    if all_samples.is_empty() || sample_rate == 0 {
        return placeholder().unwrap_or_else(|| {
            Err(AnalysisError::decode_failed(format!("No samples decoded from {} stream", format)))
        });
    }

    normalize_peak(&mut all_samples);

    Ok(PcmBuffer::new(all_samples, sample_rate).with_source(format, channels as u16))
}

/// Placeholder buffer sized from the container header
///
/// `None` when the fallback is off or the header lacks a rate or frame count.
/// A declared length beyond `max_duration` is rejected before allocating.
fn placeholder_buffer(
    options: &DecodeOptions,
    format: AudioFormat,
    channels: u16,
    rate: Option<u32>,
    frames: Option<u64>,
) -> Option<Result<PcmBuffer>> {
    if !options.synthetic_fallback {
        return None;
    }
    let rate = rate.filter(|r| *r > 0)?;
    let frames = frames.filter(|f| *f > 0)?;

    let declared = frames as f64 / rate as f64;
    if declared > options.max_duration {
        return Some(Err(AnalysisError::new(
            ErrorCode::InvalidDuration,
            format!(
                "Container declares {:.1}s of audio, beyond the {:.0}s limit",
                declared, options.max_duration
            ),
        )
        .with_detail("declaredFrames", frames)
        .with_detail("sampleRate", rate)));
    }

    warn!(
        "Codec produced no samples, synthesizing {} frame placeholder at {}Hz",
        frames, rate
    );
    Some(Ok(PcmBuffer::new(synthesize_placeholder(frames as usize, rate), rate)
        .with_source(format, channels)
        .with_origin(DecodeOrigin::Synthesized)))
}

/// Convert interleaved multi-channel audio to mono
fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Divide by the peak when it exceeds full scale
fn normalize_peak(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 1.0 && peak.is_finite() {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

/// 220 Hz fundamental with 2nd and 3rd harmonics at halving amplitudes
fn synthesize_placeholder(frames: usize, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f32;
    (0..frames)
        .map(|i| {
            let t = i as f32 / rate;
            0.5 * (2.0 * PI * PLACEHOLDER_FREQ * t).sin()
                + 0.25 * (2.0 * PI * 2.0 * PLACEHOLDER_FREQ * t).sin()
                + 0.125 * (2.0 * PI * 3.0 * PLACEHOLDER_FREQ * t).sin()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes<S: hound::Sample + Copy>(spec: hound::WavSpec, samples: &[S]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_to_mono() {
        let stereo = vec![0.5, 0.3, 0.2, 0.4];
        let mono = to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.4).abs() < 0.001);
        assert!((mono[1] - 0.3).abs() < 0.001);
    }

    #[test]
    fn test_stereo_int_wav_is_mixed_down() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        // Left at half scale, right silent
        let samples: Vec<i16> = (0..400).flat_map(|_| [16384i16, 0]).collect();
        let buffer = decode(&wav_bytes(spec, &samples), &DecodeOptions::default()).unwrap();

        assert_eq!(buffer.sample_rate, 8000);
        assert_eq!(buffer.channels_original, 2);
        assert_eq!(buffer.len(), 400);
        assert_eq!(buffer.format, AudioFormat::Wav);
        assert!((buffer.samples[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_float_wav_rescaled_by_peak() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let samples: Vec<f32> = (0..200).map(|i| if i % 2 == 0 { 2.0 } else { -1.0 }).collect();
        let buffer = decode(&wav_bytes(spec, &samples), &DecodeOptions::default()).unwrap();

        assert!((buffer.peak() - 1.0).abs() < 1e-6);
        assert!((buffer.samples[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = decode(&[0x42u8; 256], &DecodeOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedFormat);
    }

    #[test]
    fn test_garbage_flac_is_format_error() {
        let mut bytes = b"fLaC".to_vec();
        bytes.resize(512, 0xAB);
        let err = decode(&bytes, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(
            err.code,
            ErrorCode::CorruptedFile | ErrorCode::DecodeFailed
        ));
    }

    #[test]
    fn test_placeholder_respects_declared_length() {
        let enabled = DecodeOptions {
            synthetic_fallback: true,
            ..DecodeOptions::default()
        };

        let ok = placeholder_buffer(&enabled, AudioFormat::Flac, 2, Some(8000), Some(8000 * 12))
            .unwrap()
            .unwrap();
        assert_eq!(ok.len(), 8000 * 12);
        assert_eq!(ok.origin, DecodeOrigin::Synthesized);

        // A STREAMINFO-sized lie (2^36 frames) fails before any allocation
        let err = placeholder_buffer(&enabled, AudioFormat::Flac, 2, Some(44100), Some(1u64 << 36))
            .unwrap()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidDuration);

        let cases = [
            (DecodeOptions::default(), Some(44100), Some(44100)),
            (enabled, None, Some(44100)),
            (enabled, Some(0), Some(44100)),
            (enabled, Some(44100), None),
            (enabled, Some(44100), Some(0)),
        ];
        for (options, rate, frames) in cases {
            assert!(placeholder_buffer(&options, AudioFormat::Mp3, 1, rate, frames).is_none());
        }
    }

    #[test]
    fn test_placeholder_shape() {
        let samples = synthesize_placeholder(44100, 44100);
        assert_eq!(samples.len(), 44100);
        let peak = samples.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(peak > 0.3 && peak <= 0.875);
    }
}
