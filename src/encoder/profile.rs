//! The fixed browser-quality output profile.

/// Target encoding parameters for a rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioProfile {
    /// Version label reported to the status store.
    pub version: &'static str,
    /// FFmpeg audio encoder.
    pub codec: &'static str,
    /// Target bitrate.
    pub bitrate: &'static str,
    /// Output channel count.
    pub channels: u8,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// FFmpeg muxer name.
    pub container: &'static str,
    /// File extension of the output object.
    pub extension: &'static str,
    /// Content type of the output object.
    pub content_type: &'static str,
}

/// Stereo 48 kHz AAC at 256k in an MPEG-4 audio container.
pub const BROWSER_PROFILE: AudioProfile = AudioProfile {
    version: "browser",
    codec: "aac",
    bitrate: "256k",
    channels: 2,
    sample_rate: 48_000,
    // "ipod" is ffmpeg's muxer for .m4a
    container: "ipod",
    extension: "m4a",
    content_type: "audio/mp4",
};

impl AudioProfile {
    /// Returns the ffmpeg output arguments for this profile.
    pub fn output_args(&self) -> Vec<String> {
        vec![
            "-vn".to_string(),
            "-c:a".to_string(),
            self.codec.to_string(),
            "-b:a".to_string(),
            self.bitrate.to_string(),
            "-ac".to_string(),
            self.channels.to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-f".to_string(),
            self.container.to_string(),
        ]
    }
}
