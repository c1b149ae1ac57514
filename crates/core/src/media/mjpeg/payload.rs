//! RTP/JPEG payload layout (RFC 2435 §3) and scan-data fragmentation.
//!
//! Every payload starts with the 8-byte main JPEG header:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Type-specific |              Fragment Offset                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      Type     |       Q       |     Width     |     Height    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! followed by, in order:
//!
//! - a 4-byte restart marker header on every packet when `Type` has the
//!   restart bit (64) set (§3.1.7),
//! - a quantization table header plus table bytes on the first packet of a
//!   frame when `Q >= 128` (§3.1.8),
//! - a slice of the frame's scan data.

use std::iter::FusedIterator;

use super::Geometry;
use crate::error::{Error, Result};
use crate::jpeg::FrameDescriptor;
use crate::jpeg::quant::{MAX_TABLE_LEN, Precision, QuantTable};

pub const JPEG_HEADER_LEN: usize = 8;
pub const RESTART_HEADER_LEN: usize = 4;
pub const QUANT_HEADER_LEN: usize = 4;

/// Largest value the 24-bit fragment offset can carry.
pub const MAX_FRAGMENT_OFFSET: usize = 0x00FF_FFFF;

/// Smallest payload budget that fits every header of a first fragment, in
/// the worst case (restart header, two 16-bit tables), plus one scan byte.
pub const MIN_PAYLOAD_SIZE: usize =
    JPEG_HEADER_LEN + RESTART_HEADER_LEN + QUANT_HEADER_LEN + 2 * MAX_TABLE_LEN + 1;

/// Q values from 128 up signal in-band quantization tables.
const IN_BAND_TABLES_Q: u8 = 128;

/// Sent in place of a table the frame references but never defined.
static FLAT_TABLE: [u8; MAX_TABLE_LEN] = [8; MAX_TABLE_LEN];

/// Main JPEG header (RFC 2435 §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegHeader {
    pub type_specific: u8,
    /// Byte offset of this fragment within the frame's scan data (24 bits).
    pub fragment_offset: u32,
    pub jpeg_type: u8,
    pub q: u8,
    pub width8: u8,
    pub height8: u8,
}

impl JpegHeader {
    pub fn to_bytes(&self) -> [u8; JPEG_HEADER_LEN] {
        let offset = self.fragment_offset.to_be_bytes();
        [
            self.type_specific,
            offset[1],
            offset[2],
            offset[3],
            self.jpeg_type,
            self.q,
            self.width8,
            self.height8,
        ]
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let b = data.get(..JPEG_HEADER_LEN)?;
        Some(Self {
            type_specific: b[0],
            fragment_offset: u32::from_be_bytes([0, b[1], b[2], b[3]]),
            jpeg_type: b[4],
            q: b[5],
            width8: b[6],
            height8: b[7],
        })
    }
}

/// Restart marker header (RFC 2435 §3.1.7).
///
/// ```text
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |       Restart Interval        |F|L|       Restart Count       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartHeader {
    pub interval: u16,
    pub first: bool,
    pub last: bool,
    /// 14-bit restart count.
    pub count: u16,
}

impl RestartHeader {
    /// Header for fragments cut at arbitrary byte positions rather than on
    /// restart boundaries: F=1, L=1, count=0x3FFF.
    pub fn unaligned(interval: u16) -> Self {
        Self {
            interval,
            first: true,
            last: true,
            count: 0x3FFF,
        }
    }

    pub fn to_bytes(&self) -> [u8; RESTART_HEADER_LEN] {
        let flags = (u16::from(self.first) << 15) | (u16::from(self.last) << 14);
        let low = flags | (self.count & 0x3FFF);
        let [i0, i1] = self.interval.to_be_bytes();
        let [l0, l1] = low.to_be_bytes();
        [i0, i1, l0, l1]
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let b = data.get(..RESTART_HEADER_LEN)?;
        let low = u16::from_be_bytes([b[2], b[3]]);
        Some(Self {
            interval: u16::from_be_bytes([b[0], b[1]]),
            first: low & 0x8000 != 0,
            last: low & 0x4000 != 0,
            count: low & 0x3FFF,
        })
    }
}

/// Quantization table header (RFC 2435 §3.1.8) with the luma table followed
/// by the chroma table.
///
/// ```text
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      MBZ      |   Precision   |             Length            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                    Quantization Table Data                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizationHeader<'a> {
    /// Bit `i` is set when table `i` (0 = luma, 1 = chroma) is 16-bit.
    pub precision: u8,
    pub luma: &'a [u8],
    pub chroma: &'a [u8],
}

impl<'a> QuantizationHeader<'a> {
    pub fn for_frame(descriptor: &'a FrameDescriptor) -> Self {
        let tables = descriptor.q_tables();
        let luma = tables.get(descriptor.luma_table());
        let chroma = tables.get(descriptor.chroma_table());

        let sixteen = |t: Option<&QuantTable>| t.is_some_and(|t| t.precision() == Precision::Sixteen);
        let bytes = |t: Option<&'a QuantTable>| t.map_or(&FLAT_TABLE[..64], QuantTable::bytes);

        Self {
            precision: u8::from(sixteen(luma)) | (u8::from(sixteen(chroma)) << 1),
            luma: bytes(luma),
            chroma: bytes(chroma),
        }
    }

    /// Length of the table data, as carried in the `Length` field.
    pub fn table_len(&self) -> usize {
        self.luma.len() + self.chroma.len()
    }

    /// Encoded size including the 4-byte header.
    pub fn encoded_len(&self) -> usize {
        QUANT_HEADER_LEN + self.table_len()
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        // At most 2 * 128 bytes, always fits the 16-bit Length field.
        let length = self.table_len() as u16;
        out.push(0);
        out.push(self.precision);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(self.luma);
        out.extend_from_slice(self.chroma);
    }
}

/// One RTP/JPEG payload: headers plus a slice of scan data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    header: JpegHeader,
    restart: Option<RestartHeader>,
    tables: Option<QuantizationHeader<'a>>,
    data: &'a [u8],
    last: bool,
}

impl<'a> Fragment<'a> {
    pub fn header(&self) -> &JpegHeader {
        &self.header
    }

    /// Offset of [`data`](Self::data) within the frame's scan data.
    pub fn offset(&self) -> usize {
        self.header.fragment_offset as usize
    }

    pub fn restart(&self) -> Option<&RestartHeader> {
        self.restart.as_ref()
    }

    pub fn tables(&self) -> Option<&QuantizationHeader<'a>> {
        self.tables.as_ref()
    }

    /// Scan data carried by this fragment; never empty.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Whether this fragment ends the frame (RTP marker bit).
    pub fn is_last(&self) -> bool {
        self.last
    }

    /// Encoded payload size in bytes.
    pub fn encoded_len(&self) -> usize {
        JPEG_HEADER_LEN
            + self.restart.map_or(0, |_| RESTART_HEADER_LEN)
            + self.tables.map_or(0, |t| t.encoded_len())
            + self.data.len()
    }

    /// Append the encoded payload to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.reserve(self.encoded_len());
        out.extend_from_slice(&self.header.to_bytes());
        if let Some(restart) = &self.restart {
            out.extend_from_slice(&restart.to_bytes());
        }
        if let Some(tables) = &self.tables {
            tables.write_to(out);
        }
        out.extend_from_slice(self.data);
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut out);
        out
    }
}

/// Lazy, in-order sequence of the fragments of one frame.
///
/// Fragment offsets start at zero and always equal the number of scan bytes
/// already emitted; the final fragment carries whatever remains.
#[derive(Debug, Clone)]
pub struct Fragments<'a> {
    descriptor: &'a FrameDescriptor,
    scan: &'a [u8],
    geometry: Geometry,
    max_payload_size: usize,
    offset: usize,
}

impl<'a> Fragments<'a> {
    /// Use cached Q and dimensions for the main header instead of the ones
    /// from the descriptor.
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Total scan bytes this sequence covers.
    pub fn scan_len(&self) -> usize {
        self.scan.len()
    }
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.scan.len() {
            return None;
        }

        let restart = self
            .descriptor
            .has_restart_markers()
            .then(|| RestartHeader::unaligned(self.descriptor.restart_interval()));
        let tables = (self.offset == 0 && self.geometry.q_factor >= IN_BAND_TABLES_Q)
            .then(|| QuantizationHeader::for_frame(self.descriptor));

        let overhead = JPEG_HEADER_LEN
            + restart.map_or(0, |_| RESTART_HEADER_LEN)
            + tables.map_or(0, |t| t.encoded_len());
        let room = self.max_payload_size.saturating_sub(overhead);
        if room == 0 {
            return None;
        }
        let end = self.scan.len().min(self.offset + room);

        let fragment = Fragment {
            header: JpegHeader {
                type_specific: 0,
                fragment_offset: self.offset as u32,
                jpeg_type: self.descriptor.jpeg_type(),
                q: self.geometry.q_factor,
                width8: self.geometry.width8,
                height8: self.geometry.height8,
            },
            restart,
            tables,
            data: &self.scan[self.offset..end],
            last: end == self.scan.len(),
        };
        self.offset = end;
        Some(fragment)
    }
}

impl FusedIterator for Fragments<'_> {}

/// Split the scan data of one frame into payloads of at most
/// `max_payload_size` bytes.
///
/// `buffer` must be the buffer `descriptor` was parsed from. A frame with no
/// scan data yields no fragments.
pub fn packetize<'a>(
    descriptor: &'a FrameDescriptor,
    buffer: &'a [u8],
    max_payload_size: usize,
) -> Result<Fragments<'a>> {
    let first_overhead = JPEG_HEADER_LEN
        + if descriptor.has_restart_markers() {
            RESTART_HEADER_LEN
        } else {
            0
        }
        + QuantizationHeader::for_frame(descriptor).encoded_len();
    if max_payload_size <= first_overhead {
        return Err(Error::PayloadTooSmall {
            size: max_payload_size,
            min: first_overhead + 1,
        });
    }

    let scan = descriptor.scan_data(buffer);
    if scan.len() > MAX_FRAGMENT_OFFSET {
        return Err(Error::ScanTooLarge { len: scan.len() });
    }

    Ok(Fragments {
        descriptor,
        scan,
        geometry: Geometry::of(descriptor),
        max_payload_size,
        offset: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg;

    /// 64x48 type-1 JPEG with tables 0/1 and `scan_len` bytes of scan data.
    fn sample_jpeg(restart_interval: u16, scan_len: usize) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x84, 0x00];
        out.extend([1u8; 64]);
        out.push(0x01);
        out.extend([2u8; 64]);
        out.extend_from_slice(&[
            0xFF, 0xC0, 0x00, 0x11, 8, 0x00, 0x30, 0x00, 0x40, 3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11,
            1,
        ]);
        if restart_interval != 0 {
            out.extend_from_slice(&[0xFF, 0xDD, 0x00, 0x04]);
            out.extend_from_slice(&restart_interval.to_be_bytes());
        }
        out.extend_from_slice(&[
            0xFF, 0xDA, 0x00, 0x0C, 3, 1, 0x00, 2, 0x11, 3, 0x11, 0, 63, 0,
        ]);
        out.extend((0..scan_len).map(|i| (i % 251) as u8));
        out
    }

    #[test]
    fn main_header_layout() {
        let header = JpegHeader {
            type_specific: 0,
            fragment_offset: 0x123456,
            jpeg_type: 65,
            q: 255,
            width8: 80,
            height8: 60,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0, 0x12, 0x34, 0x56, 65, 255, 80, 60]);
        assert_eq!(JpegHeader::from_bytes(&bytes), Some(header));
    }

    #[test]
    fn restart_header_layout() {
        let bytes = RestartHeader::unaligned(0x0102).to_bytes();
        assert_eq!(bytes, [0x01, 0x02, 0xFF, 0xFF]);
        let parsed = RestartHeader::from_bytes(&bytes).unwrap();
        assert!(parsed.first && parsed.last);
        assert_eq!(parsed.count, 0x3FFF);
    }

    #[test]
    fn single_fragment_frame() {
        let data = sample_jpeg(0, 100);
        let desc = jpeg::parse(&data).unwrap();
        let fragments: Vec<_> = packetize(&desc, &data, 1400).unwrap().collect();
        assert_eq!(fragments.len(), 1);

        let f = &fragments[0];
        assert!(f.is_last());
        assert!(f.restart().is_none());
        let tables = f.tables().unwrap();
        assert_eq!(tables.precision, 0);
        assert_eq!(tables.luma, &[1u8; 64][..]);
        assert_eq!(tables.chroma, &[2u8; 64][..]);

        let bytes = f.to_vec();
        assert_eq!(bytes.len(), f.encoded_len());
        assert_eq!(&bytes[..8], &[0, 0, 0, 0, 1, 255, 8, 6]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 128]);
        assert_eq!(&bytes[12 + 128..], desc.scan_data(&data));
    }

    #[test]
    fn fragments_cover_scan_exactly() {
        let data = sample_jpeg(0, 5000);
        let desc = jpeg::parse(&data).unwrap();
        let fragments: Vec<_> = packetize(&desc, &data, 500).unwrap().collect();

        let mut joined = Vec::new();
        for f in &fragments {
            assert_eq!(f.offset(), joined.len());
            assert!(!f.data().is_empty());
            assert!(f.encoded_len() <= 500);
            joined.extend_from_slice(f.data());
        }
        assert_eq!(joined, desc.scan_data(&data));

        let last = fragments.last().unwrap();
        assert!(last.is_last());
        assert_eq!(last.offset() + last.data().len(), 5000);
        assert!(fragments[..fragments.len() - 1].iter().all(|f| !f.is_last()));
    }

    #[test]
    fn tables_only_on_first_fragment() {
        let data = sample_jpeg(0, 3000);
        let desc = jpeg::parse(&data).unwrap();
        let fragments: Vec<_> = packetize(&desc, &data, 1000).unwrap().collect();
        assert!(fragments[0].tables().is_some());
        assert!(fragments[1..].iter().all(|f| f.tables().is_none()));
        // Later fragments use the whole budget for scan data.
        assert_eq!(fragments[1].data().len(), 1000 - JPEG_HEADER_LEN);
    }

    #[test]
    fn restart_header_on_every_fragment() {
        let data = sample_jpeg(16, 3000);
        let desc = jpeg::parse(&data).unwrap();
        for f in packetize(&desc, &data, 700).unwrap() {
            assert_eq!(f.header().jpeg_type, 65);
            assert_eq!(f.restart().unwrap().interval, 16);
            let bytes = f.to_vec();
            assert_eq!(&bytes[8..10], &[0x00, 0x10]);
        }
    }

    #[test]
    fn small_q_omits_tables() {
        let data = sample_jpeg(0, 300);
        let desc = jpeg::parse(&data).unwrap();
        let geometry = Geometry {
            q_factor: 50,
            ..Geometry::of(&desc)
        };
        let first = packetize(&desc, &data, 1400)
            .unwrap()
            .with_geometry(geometry)
            .next()
            .unwrap();
        assert!(first.tables().is_none());
        assert_eq!(first.header().q, 50);
        assert_eq!(first.encoded_len(), JPEG_HEADER_LEN + 300);
    }

    #[test]
    fn payload_smaller_than_headers_is_rejected() {
        let data = sample_jpeg(0, 300);
        let desc = jpeg::parse(&data).unwrap();
        for size in [0, 4, JPEG_HEADER_LEN, JPEG_HEADER_LEN + QUANT_HEADER_LEN + 128] {
            assert!(matches!(
                packetize(&desc, &data, size),
                Err(Error::PayloadTooSmall { min: 141, .. })
            ));
        }
        assert!(packetize(&desc, &data, 141).is_ok());
    }

    #[test]
    fn empty_scan_yields_nothing() {
        let data = sample_jpeg(0, 0);
        let desc = jpeg::parse(&data).unwrap();
        assert_eq!(packetize(&desc, &data, 1400).unwrap().count(), 0);
    }

    #[test]
    fn missing_table_is_sent_flat() {
        // Luma references table 0, chroma table 1, but only table 0 exists.
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x43, 0x00];
        data.extend([5u8; 64]);
        data.extend_from_slice(&[
            0xFF, 0xC0, 0x00, 0x11, 8, 0x00, 0x10, 0x00, 0x10, 3, 1, 0x21, 0, 2, 0x11, 1, 3, 0x11,
            1, 0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0, 0xAA,
        ]);
        let desc = jpeg::parse(&data).unwrap();
        let header = QuantizationHeader::for_frame(&desc);
        assert_eq!(header.luma, &[5u8; 64][..]);
        assert_eq!(header.chroma, &[8u8; 64][..]);
    }
}
