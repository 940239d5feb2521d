//! Minimal RIFF/WAV inspection for uploaded recordings.
//!
//! The recognition endpoint accepts WAV only; anything else is rejected
//! before it reaches the speech provider.

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Not a RIFF/WAVE file")]
    NotWave,
    #[error("Malformed WAV: {0}")]
    Malformed(&'static str),
    #[error("Unsupported WAV encoding: format tag {0}")]
    UnsupportedFormat(u16),
}

/// The parts of the `fmt ` chunk the service cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Validates the RIFF/WAVE framing and returns the format of the first
/// `fmt ` chunk. Only integer PCM (format tag 1) is accepted.
pub fn parse_wav_header(bytes: &[u8]) -> Result<WavSpec, AudioError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(AudioError::NotWave);
    }

    // Walk the chunk list looking for `fmt `.
    let mut at = 12;
    while at + 8 <= bytes.len() {
        let id = &bytes[at..at + 4];
        let size = read_u32(bytes, at + 4).ok_or(AudioError::Malformed("chunk size"))? as usize;
        let body = at + 8;
        if id == b"fmt " {
            if size < 16 || body + 16 > bytes.len() {
                return Err(AudioError::Malformed("fmt chunk too short"));
            }
            let format_tag = read_u16(bytes, body).ok_or(AudioError::Malformed("format tag"))?;
            if format_tag != 1 {
                return Err(AudioError::UnsupportedFormat(format_tag));
            }
            return Ok(WavSpec {
                channels: read_u16(bytes, body + 2).ok_or(AudioError::Malformed("channels"))?,
                sample_rate: read_u32(bytes, body + 4)
                    .ok_or(AudioError::Malformed("sample rate"))?,
                bits_per_sample: read_u16(bytes, body + 14)
                    .ok_or(AudioError::Malformed("bits per sample"))?,
            });
        }
        // Chunks are word-aligned.
        at = body + size + (size & 1);
    }
    Err(AudioError::Malformed("no fmt chunk"))
}
