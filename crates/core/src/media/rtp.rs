/// Length of the RTP fixed header with no CSRCs or extensions.
pub const RTP_HEADER_LEN: usize = 12;

/// RTP fixed header state for one outbound stream (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The sequence number advances on every [`write`](Self::write); the
/// timestamp only advances when the caller moves on to the next frame, so
/// all fragments of one JPEG frame share a timestamp. For RTP/JPEG the
/// marker bit flags the last fragment of a frame (RFC 2435 §3).
#[derive(Debug, Clone)]
pub struct RtpHeader {
    /// RTP payload type (7-bit). 26 is the static JPEG type (RFC 3551).
    pub pt: u8,
    /// Synchronization source identifier.
    pub ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpHeader {
    /// Header state starting at sequence 0 and timestamp 0.
    pub fn new(pt: u8, ssrc: u32) -> Self {
        tracing::debug!(
            pt,
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP stream state created"
        );
        Self {
            pt: pt & 0x7f,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Header state with a random SSRC, initial sequence number and initial
    /// timestamp, as RFC 3550 §5.1 recommends for a new source.
    pub fn randomized(pt: u8) -> Self {
        let mut header = Self::new(pt, rand::random::<u32>());
        header.sequence = rand::random::<u16>();
        header.timestamp = rand::random::<u32>();
        header
    }

    /// Sequence number the next [`write`](Self::write) will use.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Timestamp of the frame currently being sent.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Encode the header for the next packet and advance the sequence number.
    pub fn write(&mut self, marker: bool) -> [u8; RTP_HEADER_LEN] {
        let mut out = [0u8; RTP_HEADER_LEN];
        out[0] = 2 << 6;
        out[1] = (u8::from(marker) << 7) | self.pt;
        out[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        out[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        out[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        out
    }

    /// Move the media clock forward by one frame interval. The 32-bit
    /// timestamp wraps.
    pub fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(increment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields() {
        let mut h = RtpHeader::new(26, 0xAABBCCDD);
        h.advance_timestamp(3000);
        let buf = h.write(true);
        assert_eq!(buf[0] >> 6, 2);
        assert_eq!(buf[1], 0x80 | 26);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 0);
        assert_eq!(u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]), 3000);
        assert_eq!(
            u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            0xAABBCCDD
        );
    }

    #[test]
    fn fragments_of_a_frame_share_timestamp() {
        let mut h = RtpHeader::new(26, 1);
        let a = h.write(false);
        let b = h.write(true);
        assert_eq!(a[4..8], b[4..8]);
        assert_eq!(a[1] & 0x80, 0);
        assert_eq!(u16::from_be_bytes([b[2], b[3]]), 1);
    }

    #[test]
    fn sequence_and_timestamp_wrap() {
        let mut h = RtpHeader::new(26, 1);
        h.sequence = u16::MAX;
        h.timestamp = u32::MAX - 1;
        h.write(false);
        h.advance_timestamp(3);
        assert_eq!(h.sequence(), 0);
        assert_eq!(h.timestamp(), 1);
    }

    #[test]
    fn payload_type_is_seven_bits() {
        let mut h = RtpHeader::new(0xFF, 1);
        assert_eq!(h.write(false)[1], 0x7f);
    }

    #[test]
    fn randomized_sources_differ() {
        let a = RtpHeader::randomized(26);
        let b = RtpHeader::randomized(26);
        assert_ne!(
            (a.ssrc, a.sequence(), a.timestamp()),
            (b.ssrc, b.sequence(), b.timestamp())
        );
    }
}
