use std::time::Duration;

use crate::error::{Error, Result};
use crate::media::mjpeg::payload::MIN_PAYLOAD_SIZE;
use crate::media::mjpeg::{JPEG_CLOCK_RATE, JPEG_PAYLOAD_TYPE};

/// Stream-level settings for one RTP/JPEG sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Largest RTP payload in bytes, not counting the 12-byte RTP header.
    pub max_payload_size: usize,
    /// RTP payload type. 26 is the static JPEG assignment.
    pub payload_type: u8,
    /// Fixed SSRC. When `None`, a random one is chosen per stream.
    pub ssrc: Option<u32>,
    /// Capture ticks per second.
    pub frame_rate: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 1400,
            payload_type: JPEG_PAYLOAD_TYPE,
            ssrc: None,
            frame_rate: 30,
        }
    }
}

impl StreamConfig {
    /// Reject settings no frame could be streamed with.
    ///
    /// The payload budget must hold the largest possible first-fragment
    /// headers (restart header and two 16-bit tables) plus one scan byte.
    pub fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 {
            return Err(Error::InvalidFrameRate(self.frame_rate));
        }
        if self.max_payload_size < MIN_PAYLOAD_SIZE {
            return Err(Error::PayloadTooSmall {
                size: self.max_payload_size,
                min: MIN_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }

    /// Wall-clock time between capture ticks.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }

    /// RTP timestamp step per tick on the 90 kHz clock.
    pub fn timestamp_increment(&self) -> u32 {
        JPEG_CLOCK_RATE / self.frame_rate.max(1)
    }
}
