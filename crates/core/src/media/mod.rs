//! RTP packetization of JPEG frames.
//!
//! This module provides the [`Packetizer`] trait, the generic RTP fixed
//! header ([`rtp::RtpHeader`]) and the RTP/JPEG implementation
//! ([`mjpeg::MjpegPacketizer`]).
//!
//! ## Per-frame flow
//!
//! ```text
//! JPEG buffer ─► jpeg::parse ─► FrameDescriptor ─► mjpeg::payload::packetize
//!                                                        │
//!                      RtpHeader::write(marker) + payload ◄┘  (one per fragment)
//! ```
//!
//! Each frame becomes one or more RTP packets sharing a timestamp; the
//! marker bit is set on the last one.
//!
//! | Payload | Module | RFC |
//! |---------|--------|-----|
//! | JPEG    | [`mjpeg`] | [RFC 2435](https://tools.ietf.org/html/rfc2435) |

pub mod mjpeg;
pub mod rtp;

/// Codec-specific RTP packetizer.
///
/// Implementors turn one encoded frame per call into complete RTP packets
/// and describe themselves for an SDP media section. The generic RTP header
/// is handled by [`rtp::RtpHeader`]; packetizers compose it.
pub trait Packetizer: Send {
    /// Packetize one encoded frame into RTP packets.
    ///
    /// Each returned `Vec<u8>` is a complete RTP packet: 12-byte header
    /// followed by the codec-specific payload. A frame that cannot be
    /// packetized yields no packets; the stream carries on with the next
    /// call.
    ///
    /// `timestamp_increment` advances the RTP timestamp after this frame,
    /// typically `clock_rate / fps` (e.g. 3000 for 30 fps at 90 kHz).
    fn packetize(&mut self, encoded_data: &[u8], timestamp_increment: u32) -> Vec<Vec<u8>>;

    /// Codec name for the SDP `a=rtpmap` attribute (e.g. `"JPEG"`).
    fn codec_name(&self) -> &'static str;

    /// RTP clock rate in Hz. Video uses 90000.
    fn clock_rate(&self) -> u32;

    /// RTP payload type number (RFC 3551).
    fn payload_type(&self) -> u8;

    /// SDP media-level attribute lines, each including the `a=` prefix.
    fn sdp_attributes(&self) -> Vec<String>;

    /// Sequence number of the next packet.
    fn next_sequence(&self) -> u16;

    /// RTP timestamp of the next frame.
    fn next_rtp_timestamp(&self) -> u32;
}
