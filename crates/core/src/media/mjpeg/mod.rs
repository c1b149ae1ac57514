//! MJPEG RTP packetizer (RFC 2435).
//!
//! Each capture tick hands one complete JPEG image to
//! [`MjpegPacketizer::packetize`]:
//!
//! 1. [`process_frame`] parses it and updates the sticky [`Geometry`] cache.
//! 2. [`payload::packetize`] splits the scan data into RFC 2435 payloads.
//! 3. Each payload gets a 12-byte RTP header; the last one carries the
//!    marker bit.
//!
//! A frame that fails to parse is dropped: the tick produces no packets,
//! the cache keeps its previous value and the RTP clock still advances so
//! the next good frame is stamped at the right time.
//!
//! Uses static payload type 26: `a=rtpmap:26 JPEG/90000`.

pub mod payload;

use tracing::{trace, warn};

use super::Packetizer;
use super::rtp::{RTP_HEADER_LEN, RtpHeader};
use crate::config::StreamConfig;
use crate::error::Result;
use crate::jpeg::{self, EXPLICIT_TABLES_Q, FrameDescriptor};

pub use payload::{Fragment, Fragments, JpegHeader, QuantizationHeader, RestartHeader};

/// Static RTP payload type for JPEG (RFC 3551 §6).
pub const JPEG_PAYLOAD_TYPE: u8 = 26;

/// RTP clock rate for video.
pub const JPEG_CLOCK_RATE: u32 = 90_000;

const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1400;

/// Last known good Q factor and dimensions.
///
/// Starts at Q 255 with zero dimensions and is only replaced by the values
/// of a frame that parsed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub q_factor: u8,
    pub width8: u8,
    pub height8: u8,
}

impl Geometry {
    pub fn of(descriptor: &FrameDescriptor) -> Self {
        Self {
            q_factor: descriptor.q_factor(),
            width8: descriptor.width8(),
            height8: descriptor.height8(),
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            q_factor: EXPLICIT_TABLES_Q,
            width8: 0,
            height8: 0,
        }
    }
}

/// Parse one captured buffer and thread the sticky cache through.
///
/// Returns the descriptor (or `None` when the frame must be dropped) and the
/// cache value for the next tick.
pub fn process_frame(buffer: &[u8], last_good: Geometry) -> (Option<FrameDescriptor>, Geometry) {
    match jpeg::parse(buffer) {
        Ok(descriptor) => {
            let geometry = Geometry::of(&descriptor);
            (Some(descriptor), geometry)
        }
        Err(e) => {
            warn!(
                error = %e,
                size = buffer.len(),
                width8 = last_good.width8,
                height8 = last_good.height8,
                "dropping frame"
            );
            (None, last_good)
        }
    }
}

/// RTP/JPEG packetizer.
///
/// Holds the RTP header state, the payload budget and the sticky
/// [`Geometry`] cache. Single-threaded: one call per capture tick.
///
/// Packets always describe the frame they carry. The cache only records the
/// geometry the stream last advertised, so it survives ticks whose frame was
/// dropped.
///
/// ## SDP attributes
///
/// - `a=rtpmap:26 JPEG/90000`
/// - `a=control:track1`
///
/// No `a=fmtp` line: width, height and tables travel in every frame.
#[derive(Debug)]
pub struct MjpegPacketizer {
    header: RtpHeader,
    max_payload_size: usize,
    last_good: Geometry,
}

impl MjpegPacketizer {
    /// Create with explicit payload type and SSRC.
    pub fn new(pt: u8, ssrc: u32) -> Self {
        Self {
            header: RtpHeader::new(pt, ssrc),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            last_good: Geometry::default(),
        }
    }

    /// Create with a random SSRC, sequence number and timestamp base
    /// (RFC 3550 §5.1).
    pub fn with_random_ssrc(pt: u8) -> Self {
        Self {
            header: RtpHeader::randomized(pt),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            last_good: Geometry::default(),
        }
    }

    /// Create from a validated stream configuration.
    pub fn from_config(config: &StreamConfig) -> Result<Self> {
        config.validate()?;
        let packetizer = match config.ssrc {
            Some(ssrc) => Self::new(config.payload_type, ssrc),
            None => Self::with_random_ssrc(config.payload_type),
        };
        Ok(packetizer.with_max_payload_size(config.max_payload_size))
    }

    /// Set the RTP payload budget (excluding the 12-byte RTP header).
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// Geometry of the most recent frame that parsed successfully.
    pub fn last_known_good(&self) -> Geometry {
        self.last_good
    }

    pub fn ssrc(&self) -> u32 {
        self.header.ssrc
    }

    fn packetize_frame(&mut self, descriptor: &FrameDescriptor, buffer: &[u8]) -> Vec<Vec<u8>> {
        let fragments = match payload::packetize(descriptor, buffer, self.max_payload_size) {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(error = %e, "dropping frame");
                return Vec::new();
            }
        };

        let scan_len = fragments.scan_len();
        let mut packets = Vec::new();
        for fragment in fragments {
            let mut packet = Vec::with_capacity(RTP_HEADER_LEN + fragment.encoded_len());
            packet.extend_from_slice(&self.header.write(fragment.is_last()));
            fragment.write_to(&mut packet);
            packets.push(packet);
        }

        trace!(
            scan_len,
            fragments = packets.len(),
            jpeg_type = descriptor.jpeg_type(),
            "packetized JPEG frame"
        );
        packets
    }
}

impl Packetizer for MjpegPacketizer {
    fn packetize(&mut self, encoded_data: &[u8], timestamp_increment: u32) -> Vec<Vec<u8>> {
        let (descriptor, geometry) = process_frame(encoded_data, self.last_good);
        self.last_good = geometry;

        let packets = match descriptor {
            Some(descriptor) => self.packetize_frame(&descriptor, encoded_data),
            None => Vec::new(),
        };

        self.header.advance_timestamp(timestamp_increment);
        packets
    }

    fn codec_name(&self) -> &'static str {
        "JPEG"
    }

    fn clock_rate(&self) -> u32 {
        JPEG_CLOCK_RATE
    }

    fn payload_type(&self) -> u8 {
        self.header.pt
    }

    fn sdp_attributes(&self) -> Vec<String> {
        vec![
            format!(
                "a=rtpmap:{} {}/{}",
                self.payload_type(),
                self.codec_name(),
                self.clock_rate()
            ),
            "a=control:track1".to_string(),
        ]
    }

    fn next_sequence(&self) -> u16 {
        self.header.sequence()
    }

    fn next_rtp_timestamp(&self) -> u32 {
        self.header.timestamp()
    }
}
