//! Container sniffing from magic bytes

use crate::error::{AnalysisError, ErrorCode, Result};
use crate::types::AudioFormat;

/// Smallest buffer that can hold a meaningful audio header
pub const MIN_FILE_SIZE: usize = 100;

/// ID3v2 header length (and footer length when present)
const ID3_HEADER_LEN: usize = 10;

/// Detect the container format from the leading bytes
pub fn detect_format(bytes: &[u8]) -> AudioFormat {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return AudioFormat::Wav;
    }
    if bytes.starts_with(b"fLaC") {
        return AudioFormat::Flac;
    }
    if bytes.starts_with(b"OggS") {
        return AudioFormat::Ogg;
    }

    let offset = id3v2_tag_len(bytes).unwrap_or(0);
    if is_mpeg_sync(bytes.get(offset..).unwrap_or(&[])) {
        return AudioFormat::Mp3;
    }

    AudioFormat::Unknown
}

/// Validate raw input before decoding
pub fn validate(bytes: &[u8], max_size: u64) -> Result<AudioFormat> {
    if bytes.is_empty() {
        return Err(AnalysisError::new(ErrorCode::InvalidFile, "Audio buffer is empty"));
    }
    if bytes.len() < MIN_FILE_SIZE {
        return Err(AnalysisError::new(
            ErrorCode::InvalidFile,
            format!(
                "Audio buffer too small ({} bytes, minimum {})",
                bytes.len(),
                MIN_FILE_SIZE
            ),
        )
        .with_detail("sizeBytes", bytes.len() as u64));
    }
    if bytes.len() as u64 > max_size {
        return Err(AnalysisError::file_too_large(bytes.len() as u64, max_size));
    }

    match detect_format(bytes) {
        AudioFormat::Unknown => Err(AnalysisError::unsupported_format(AudioFormat::Unknown.to_string())),
        format => Ok(format),
    }
}

/// Total length of a leading ID3v2 tag, if any
///
/// The size field is four synch-safe bytes (7 bits each) and excludes the
/// 10-byte header and the optional 10-byte footer.
fn id3v2_tag_len(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < ID3_HEADER_LEN || &bytes[0..3] != b"ID3" {
        return None;
    }
    let size_bytes = &bytes[6..10];
    if size_bytes.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let size = size_bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b as usize & 0x7F));
    let footer = if bytes[5] & 0x10 != 0 { ID3_HEADER_LEN } else { 0 };
    Some(ID3_HEADER_LEN + size + footer)
}

/// MPEG audio frame sync: 11 set bits
fn is_mpeg_sync(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(prefix: &[u8]) -> Vec<u8> {
        let mut bytes = prefix.to_vec();
        bytes.resize(256, 0);
        bytes
    }

    #[test]
    fn test_detect_wav() {
        let mut bytes = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();
        bytes.resize(128, 0);
        assert_eq!(detect_format(&bytes), AudioFormat::Wav);
    }

    #[test]
    fn test_detect_flac_and_ogg() {
        assert_eq!(detect_format(&padded(b"fLaC")), AudioFormat::Flac);
        assert_eq!(detect_format(&padded(b"OggS")), AudioFormat::Ogg);
    }

    #[test]
    fn test_detect_bare_mp3_frame() {
        assert_eq!(detect_format(&padded(&[0xFF, 0xFB, 0x90, 0x64])), AudioFormat::Mp3);
        // Only 2 of the 3 high bits set: not a sync word
        assert_eq!(detect_format(&padded(&[0xFF, 0xC0])), AudioFormat::Unknown);
    }

    #[test]
    fn test_detect_mp3_after_id3_tag() {
        // ID3v2.4, no flags, synch-safe size 0x00 0x00 0x01 0x00 = 128
        let mut bytes = vec![b'I', b'D', b'3', 4, 0, 0, 0, 0, 1, 0];
        bytes.extend(std::iter::repeat(0u8).take(128));
        bytes.extend([0xFF, 0xFB, 0x90, 0x64]);
        bytes.resize(400, 0);
        assert_eq!(id3v2_tag_len(&bytes), Some(138));
        assert_eq!(detect_format(&bytes), AudioFormat::Mp3);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert_eq!(validate(&[], 1024).unwrap_err().code, ErrorCode::InvalidFile);
        assert_eq!(validate(&[0u8; 50], 1024).unwrap_err().code, ErrorCode::InvalidFile);
        assert_eq!(
            validate(&padded(b"fLaC"), 128).unwrap_err().code,
            ErrorCode::FileTooLarge
        );
        assert_eq!(
            validate(&padded(b"ABCD"), 1024).unwrap_err().code,
            ErrorCode::UnsupportedFormat
        );
        assert_eq!(validate(&padded(b"OggS"), 1024).unwrap(), AudioFormat::Ogg);
    }
}
