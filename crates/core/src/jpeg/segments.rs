//! Readers for the individual marker segments.
//!
//! Every reader is handed the whole buffer and the offset of the segment's
//! 2-byte length field (the byte right after the marker code). Readers that
//! advance the cursor do so by the segment's declared length, so a reader
//! that ignores part of its segment still leaves the cursor on the next
//! marker.

use tracing::{debug, trace, warn};

use super::markers;
use super::quant::{Precision, QuantTableError, QuantizationTables};
use crate::error::{ParseErrorKind, Result, Unsupported};

/// Largest supported width or height, in pixels (255 blocks of 8).
pub const MAX_DIMENSION: u16 = 2040;

const JFIF_MIN_LEN: usize = 16;
/// Length field, precision, height, width and component count.
const SOF_HEADER_LEN: usize = 8;
/// Header plus three 3-byte component specifications.
const SOF_MIN_LEN: usize = 17;
const DRI_MIN_LEN: usize = 4;
/// Length field and nothing else.
const EMPTY_SEGMENT_LEN: usize = 2;
/// Length field, component count, spectral selection and approximation.
const SOS_FIXED_LEN: usize = 6;
const JFIF_ID: &[u8; 5] = b"JFIF\0";

/// Sampling byte of a 2x1 luma component (RTP/JPEG type 0).
const LUMA_2X1: u8 = 0x21;
/// Sampling byte of a 2x2 luma component (RTP/JPEG type 1).
const LUMA_2X2: u8 = 0x22;
const CHROMA_1X1: u8 = 0x11;

/// Big-endian `u16` at `offset`, if both bytes are in bounds.
pub fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Declared segment length at `offset` (includes the length field itself).
pub fn segment_length(data: &[u8], offset: usize, marker: u8) -> Result<usize> {
    read_u16(data, offset)
        .map(usize::from)
        .ok_or_else(|| ParseErrorKind::MalformedSegment { marker }.into())
}

/// Offset just past a segment whose content is not needed (COM, DHT).
///
/// The declared length must cover at least its own two bytes and end within
/// the buffer.
pub fn skip_segment(data: &[u8], offset: usize, marker: u8) -> Result<usize> {
    let len = segment_length(data, offset, marker)?;
    if len < EMPTY_SEGMENT_LEN || offset + len > data.len() {
        debug!(
            marker = format_args!("{marker:02X}"),
            len,
            offset,
            size = data.len(),
            "segment length disagrees with the buffer"
        );
        return Err(ParseErrorKind::MalformedSegment { marker }.into());
    }
    trace!(marker = format_args!("{marker:02X}"), len, "skipping segment");
    Ok(offset + len)
}

/// SOS. Returns the offset where entropy-coded data starts.
///
/// The header must hold its component selectors and fit in the buffer.
pub fn read_sos(data: &[u8], offset: usize) -> Result<usize> {
    let malformed = ParseErrorKind::MalformedSegment {
        marker: markers::SOS,
    };
    let len = segment_length(data, offset, markers::SOS)?;
    let Some(&components) = data.get(offset + 2) else {
        debug!(offset, "SOS header truncated");
        return Err(malformed.into());
    };

    let min_len = SOS_FIXED_LEN + 2 * usize::from(components);
    if len < min_len {
        debug!(len, components, min_len, "SOS segment length too small");
        return Err(malformed.into());
    }
    if offset + len > data.len() {
        debug!(len, offset, size = data.len(), "SOS header runs past the buffer");
        return Err(malformed.into());
    }

    trace!(components, "scan header");
    Ok(offset + len)
}

/// Luma chroma layout of a frame, as RTP/JPEG types 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// Luma sampled 2x1 (4:2:2-like), RTP/JPEG type 0.
    Type0,
    /// Luma sampled 2x2 (4:2:0-like), RTP/JPEG type 1.
    Type1,
}

impl Sampling {
    /// RTP/JPEG `Type` value without the restart bit.
    pub fn rtp_type(self) -> u8 {
        match self {
            Self::Type0 => 0,
            Self::Type1 => 1,
        }
    }
}

/// The parts of a baseline SOF segment the payload header needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub width8: u8,
    pub height8: u8,
    pub sampling: Sampling,
    pub luma_table: u8,
    pub chroma_table: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Component {
    id: u8,
    sampling: u8,
    table: u8,
}

/// Outcome of a DRI segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restart {
    /// Restart markers every `n` MCUs.
    Interval(u16),
    /// Interval of zero, or a DRI segment too short to hold one.
    Disabled,
}

/// APP0 / JFIF. Validates the header and advances past it; the fields are
/// only logged.
pub fn read_jfif(data: &[u8], offset: &mut usize) -> Result<()> {
    let malformed = ParseErrorKind::MalformedSegment {
        marker: markers::APP0,
    };
    let off = *offset;

    if off + JFIF_MIN_LEN > data.len() {
        debug!(offset = off, "JFIF segment truncated");
        return Err(malformed.into());
    }
    let len = segment_length(data, off, markers::APP0)?;
    if len < JFIF_MIN_LEN {
        debug!(len, "JFIF segment length too small");
        return Err(malformed.into());
    }
    *offset += len;

    let fields = &data[off + 2..off + JFIF_MIN_LEN];
    if &fields[..5] != JFIF_ID {
        debug!(id = ?&fields[..5], "APP0 identifier is not JFIF");
        return Err(malformed.into());
    }

    trace!(
        version = format_args!("{}.{:02}", fields[5], fields[6]),
        units = fields[7],
        x_density = u16::from_be_bytes([fields[8], fields[9]]),
        y_density = u16::from_be_bytes([fields[10], fields[11]]),
        x_thumbnail = fields[12],
        y_thumbnail = fields[13],
        "JFIF header"
    );
    Ok(())
}

/// SOF0. Validates the baseline 3-component profile and advances past the
/// segment.
pub fn read_sof(data: &[u8], offset: &mut usize) -> Result<FrameHeader> {
    let malformed = ParseErrorKind::MalformedSegment {
        marker: markers::SOF0,
    };
    let off = *offset;

    let len = segment_length(data, off, markers::SOF0)?;
    if len < SOF_HEADER_LEN || off + SOF_HEADER_LEN > data.len() {
        debug!(len, offset = off, "SOF segment truncated");
        return Err(malformed.into());
    }
    *offset += len;

    let seg = &data[off + 2..off + SOF_HEADER_LEN];

    if seg[0] != 8 {
        debug!(precision = seg[0], "unsupported sample precision");
        return unsupported(Unsupported::SamplePrecision(seg[0]));
    }

    // Height precedes width in the SOF layout.
    let height = u16::from_be_bytes([seg[1], seg[2]]);
    let width = u16::from_be_bytes([seg[3], seg[4]]);
    if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
        debug!(width, height, "unsupported dimensions");
        return unsupported(Unsupported::Dimensions { width, height });
    }

    if seg[5] != 3 {
        debug!(components = seg[5], "only 3-component images are supported");
        return unsupported(Unsupported::ComponentCount(seg[5]));
    }

    if len < SOF_MIN_LEN || off + SOF_MIN_LEN > data.len() {
        debug!(len, offset = off, "SOF component list truncated");
        return Err(malformed.into());
    }
    let seg = &data[off + SOF_HEADER_LEN..off + SOF_MIN_LEN];

    let mut components = [0usize, 1, 2].map(|i| Component {
        id: seg[i * 3],
        sampling: seg[i * 3 + 1],
        table: seg[i * 3 + 2],
    });
    // Slot 0 must end up as luma regardless of the order in the stream.
    components.sort_by_key(|c| c.id);
    let [luma, cb, cr] = components;

    let sampling = match luma.sampling {
        LUMA_2X1 => Sampling::Type0,
        LUMA_2X2 => Sampling::Type1,
        other => {
            debug!(sampling = format_args!("{other:02x}"), "unsupported luma sampling");
            return unsupported(Unsupported::LumaSampling(other));
        }
    };
    for chroma in [cb, cr] {
        if chroma.sampling != CHROMA_1X1 {
            debug!(
                component = chroma.id,
                sampling = format_args!("{:02x}", chroma.sampling),
                "unsupported chroma sampling"
            );
            return unsupported(Unsupported::ChromaSampling(chroma.sampling));
        }
    }
    if cb.table != cr.table {
        debug!(cb = cb.table, cr = cr.table, "chroma components use different tables");
        return unsupported(Unsupported::ChromaTables {
            cb: cb.table,
            cr: cr.table,
        });
    }

    debug!(width, height, ?sampling, "frame header");
    Ok(FrameHeader {
        // Both fit in a u8: MAX_DIMENSION / 8 == 255.
        width8: (width / 8) as u8,
        height8: (height / 8) as u8,
        sampling,
        luma_table: luma.table,
        chroma_table: cb.table,
    })
}

fn unsupported<T>(reason: Unsupported) -> Result<T> {
    Err(ParseErrorKind::UnsupportedImage(reason).into())
}

/// DQT. Copies every complete table into `tables` and returns the offset of
/// the byte following the segment.
///
/// Never fails: a truncated segment, a reserved table id or a short trailing
/// table stops consumption and whatever was read so far is kept.
pub fn read_dqt(data: &[u8], offset: usize, tables: &mut QuantizationTables) -> usize {
    let size = data.len();
    let Some(declared) = read_u16(data, offset).map(usize::from) else {
        warn!(offset, "DQT segment too small");
        return size;
    };
    if declared < 2 {
        warn!(declared, "DQT segment length too small");
        return size;
    }

    let mut remaining = declared.min(size - offset) - 2;
    let mut offset = offset + 2;

    while remaining > 0 {
        let pq_tq = data[offset];
        let id = pq_tq & 0x0f;
        let precision = Precision::from_nibble(pq_tq >> 4);
        let table_len = precision.table_len();

        if remaining < table_len + 1 {
            debug!(id, remaining, "trailing quantization table is incomplete");
            break;
        }
        match tables.insert(id, precision, &data[offset + 1..offset + 1 + table_len]) {
            Ok(()) => trace!(id, ?precision, "quantization table"),
            Err(err @ QuantTableError::InvalidId(_)) => {
                warn!(%err, "stopping DQT segment");
                break;
            }
            Err(err) => warn!(%err, "quantization table ignored"),
        }

        remaining -= table_len + 1;
        offset += table_len + 1;
    }

    offset + remaining
}

/// DRI. A zero interval, or a segment too short to hold one, disables
/// restart markers without failing the parse.
pub fn read_dri(data: &[u8], offset: &mut usize) -> Restart {
    let off = *offset;
    if off + DRI_MIN_LEN > data.len() {
        debug!(offset = off, "DRI segment truncated");
        return Restart::Disabled;
    }
    let len = usize::from(read_u16(data, off).unwrap_or_default());
    *offset += len;
    if len < DRI_MIN_LEN {
        debug!(len, "DRI segment length too small");
        return Restart::Disabled;
    }

    match read_u16(data, off + 2).unwrap_or_default() {
        0 => Restart::Disabled,
        interval => {
            debug!(interval, "restart interval");
            Restart::Interval(interval)
        }
    }
}
