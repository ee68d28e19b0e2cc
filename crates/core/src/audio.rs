use base64::Engine;

/// Sample rate of the PCM16 audio returned by the speech service.
pub const SPEECH_PCM16_SAMPLE_RATE: u32 = 24000;
/// The speech service always returns a single channel.
pub const SPEECH_PCM16_CHANNELS: u16 = 1;

/// A decoded clip of interleaved samples normalized to [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioClip {
    /// Number of frames per channel.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Averages all channels down to one.
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

/// Errors raised while turning an encoded payload into sound.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("Failed to decode base64 audio: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("PCM16 payload has an odd number of bytes ({0})")]
    OddLength(usize),
    #[error("Failed to activate the audio output: {0:#}")]
    Activation(anyhow::Error),
    #[error("Audio output failed during playback: {0:#}")]
    Output(anyhow::Error),
}

impl PlaybackError {
    pub fn is_decode_error(&self) -> bool {
        matches!(self, PlaybackError::Base64(_) | PlaybackError::OddLength(_))
    }
}

/// Decodes a base64 string of little-endian PCM16 into a clip of f32 samples.
///
/// Each sample is divided by 32768, so `i16::MIN` maps to exactly -1.0.
pub fn decode_pcm16(
    base64_fragment: &str,
    sample_rate: u32,
    channels: u16,
) -> Result<AudioClip, PlaybackError> {
    let pcm16 = base64::engine::general_purpose::STANDARD.decode(base64_fragment)?;
    if pcm16.len() % 2 != 0 {
        return Err(PlaybackError::OddLength(pcm16.len()));
    }

    let samples = pcm16
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect();

    Ok(AudioClip {
        sample_rate,
        channels,
        samples,
    })
}

/// Decodes a payload from the speech service (24 kHz mono).
pub fn decode_speech(base64_fragment: &str) -> Result<AudioClip, PlaybackError> {
    decode_pcm16(
        base64_fragment,
        SPEECH_PCM16_SAMPLE_RATE,
        SPEECH_PCM16_CHANNELS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_i16(samples: &[i16]) -> String {
        let bytes: Vec<u8> = samples
            .iter()
            .flat_map(|&sample| sample.to_le_bytes())
            .collect();
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    }

    #[test]
    fn test_decode_normalizes_by_32768() {
        let samples = [0i16, 1, -1, 16384, -16384, i16::MAX, i16::MIN];
        let clip = decode_speech(&encode_i16(&samples)).unwrap();

        assert_eq!(clip.sample_rate, 24000);
        assert_eq!(clip.channels, 1);
        assert_eq!(clip.samples.len(), samples.len());
        for (decoded, original) in clip.samples.iter().zip(samples) {
            assert!((decoded - original as f32 / 32768.0).abs() < f32::EPSILON);
        }
        assert_eq!(clip.samples[6], -1.0);
        assert!(clip.samples[5] < 1.0);
    }

    #[test]
    fn test_frame_count_divides_by_channels() {
        let clip = decode_pcm16(&encode_i16(&[1, 2, 3, 4, 5, 6]), 24000, 2).unwrap();
        assert_eq!(clip.frame_count(), 3);
        assert_eq!(clip.to_mono(), vec![1.5 / 32768.0, 3.5 / 32768.0, 5.5 / 32768.0]);

        let clip = decode_speech(&encode_i16(&[0; 24000])).unwrap();
        assert_eq!(clip.frame_count(), 24000);
        assert!((clip.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_odd_byte_count_is_an_error() {
        let payload = base64::engine::general_purpose::STANDARD.encode([0u8, 1, 2]);
        let err = decode_speech(&payload).unwrap_err();
        assert!(matches!(err, PlaybackError::OddLength(3)));
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_invalid_base64_is_an_error() {
        let err = decode_speech("this is not base64!").unwrap_err();
        assert!(matches!(err, PlaybackError::Base64(_)));
    }
}
