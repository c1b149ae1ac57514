//! Baseline JPEG frame analysis for RTP/JPEG.
//!
//! [`parse`] walks a complete JPEG image marker by marker, in a single
//! forward pass, and produces a [`FrameDescriptor`]: everything the RFC 2435
//! payload header needs, without decoding any pixels.
//!
//! ```text
//! FF D8                SOI   ignored
//! FF E0 <len> JFIF\0…  APP0  validated, fields logged
//! FF DB <len> …        DQT   tables copied into QuantizationTables
//! FF C0 <len> …        SOF0  geometry, sampling type, table ids
//! FF C4 / FF FE        DHT / COM skipped
//! FF DD <len> <ri>     DRI   restart interval
//! FF DA <len> …        SOS   end of the walk; scan data follows
//! ```
//!
//! Scan data is opaque: it may contain `FF` bytes that are not markers, so
//! the walk stops at SOS and the descriptor records the rest of the buffer
//! as scan data.
//!
//! Only the profile RTP/JPEG types 0 and 1 can describe is accepted:
//! 8-bit samples, three components, luma sampled 2x1 or 2x2, both chroma
//! components sampled 1x1 and sharing one quantization table.

pub mod quant;
pub mod segments;

use std::ops::Range;

use tracing::{debug, trace, warn};

use crate::error::{ParseErrorKind, Result};
pub use quant::{Precision, QuantTable, QuantizationTables};
pub use segments::{FrameHeader, Restart, Sampling};

/// JPEG marker codes (the byte following `0xFF`).
pub mod markers {
    pub const PREFIX: u8 = 0xFF;
    pub const SOF0: u8 = 0xC0;
    pub const DHT: u8 = 0xC4;
    pub const SOI: u8 = 0xD8;
    pub const EOI: u8 = 0xD9;
    pub const SOS: u8 = 0xDA;
    pub const DQT: u8 = 0xDB;
    pub const DRI: u8 = 0xDD;
    pub const APP0: u8 = 0xE0;
    pub const COM: u8 = 0xFE;
}

/// Q value meaning "quantization tables travel in-band" (RFC 2435 §4.2).
/// The parser never derives Q from table contents.
pub const EXPLICIT_TABLES_Q: u8 = 255;

/// Bit added to the RTP/JPEG type when restart markers are present.
pub const RESTART_TYPE_FLAG: u8 = 64;

/// Structural description of one baseline JPEG frame.
///
/// Produced by [`parse`] and immutable afterwards. Scan data is kept as a
/// byte range into the buffer that was parsed; use
/// [`scan_data`](Self::scan_data) with that same buffer to view it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptor {
    width8: u8,
    height8: u8,
    sampling: Sampling,
    restart_interval: u16,
    q_factor: u8,
    luma_table: u8,
    chroma_table: u8,
    q_tables: QuantizationTables,
    scan: Range<usize>,
}

impl FrameDescriptor {
    /// Width in 8-pixel blocks, `1..=255`.
    pub fn width8(&self) -> u8 {
        self.width8
    }

    /// Height in 8-pixel blocks, `1..=255`.
    pub fn height8(&self) -> u8 {
        self.height8
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// RTP/JPEG `Type` field: 0 or 1, plus [`RESTART_TYPE_FLAG`] when the
    /// scan uses restart markers.
    pub fn jpeg_type(&self) -> u8 {
        let base = self.sampling.rtp_type();
        if self.has_restart_markers() {
            base + RESTART_TYPE_FLAG
        } else {
            base
        }
    }

    /// 1 if any stored quantization table has 16-bit coefficients, else 0.
    pub fn precision(&self) -> u8 {
        u8::from(self.q_tables.has_sixteen_bit())
    }

    pub fn q_factor(&self) -> u8 {
        self.q_factor
    }

    /// MCUs between restart markers; 0 when disabled.
    pub fn restart_interval(&self) -> u16 {
        self.restart_interval
    }

    pub fn has_restart_markers(&self) -> bool {
        self.restart_interval != 0
    }

    /// Quantization table id referenced by the luma component.
    pub fn luma_table(&self) -> u8 {
        self.luma_table
    }

    /// Quantization table id shared by both chroma components.
    pub fn chroma_table(&self) -> u8 {
        self.chroma_table
    }

    pub fn q_tables(&self) -> &QuantizationTables {
        &self.q_tables
    }

    /// Byte range of the entropy-coded data within the parsed buffer.
    pub fn scan_range(&self) -> Range<usize> {
        self.scan.clone()
    }

    /// Entropy-coded data, from the end of the SOS header to the end of
    /// `buffer`. Returns an empty slice if `buffer` is shorter than the one
    /// that was parsed.
    pub fn scan_data<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        buffer.get(self.scan.clone()).unwrap_or_default()
    }
}

/// Advance past the next `0xFF` and return the marker code after it.
///
/// Running out of data, or a second `0xFF`, reads as EOI.
fn next_marker(data: &[u8], offset: &mut usize) -> u8 {
    loop {
        let Some(&byte) = data.get(*offset) else {
            return markers::EOI;
        };
        *offset += 1;
        if byte == markers::PREFIX {
            break;
        }
    }

    match data.get(*offset) {
        Some(&markers::PREFIX) | None => {
            *offset += 1;
            markers::EOI
        }
        Some(&marker) => {
            *offset += 1;
            marker
        }
    }
}

/// Describe a baseline JPEG image held entirely in `data`.
///
/// Fails with:
/// - [`MalformedSegment`](ParseErrorKind::MalformedSegment) when a JFIF, SOF,
///   COM, DHT or SOS length disagrees with the buffer or is shorter than the
///   segment's fixed fields,
/// - [`UnsupportedImage`](ParseErrorKind::UnsupportedImage) when SOF is
///   outside the RTP/JPEG profile,
/// - [`MissingRequiredSegment`](ParseErrorKind::MissingRequiredSegment) when
///   DQT, SOF or SOS never appears,
/// - [`ZeroDimension`](ParseErrorKind::ZeroDimension) when the image is
///   narrower or shorter than 8 pixels.
///
/// Trailing or incomplete DQT entries and broken DRI segments are tolerated.
pub fn parse(data: &[u8]) -> Result<FrameDescriptor> {
    let mut offset = 0usize;
    let mut q_tables = QuantizationTables::new();
    let mut dqt_found = false;
    let mut frame: Option<FrameHeader> = None;
    let mut restart_interval = 0u16;
    let mut scan_start: Option<usize> = None;

    while scan_start.is_none() && offset < data.len() {
        let marker = next_marker(data, &mut offset);
        match marker {
            markers::APP0 => segments::read_jfif(data, &mut offset)?,
            markers::COM | markers::DHT => {
                offset = segments::skip_segment(data, offset, marker)?;
            }
            markers::SOF0 => frame = Some(segments::read_sof(data, &mut offset)?),
            markers::DQT => {
                offset = segments::read_dqt(data, offset, &mut q_tables);
                dqt_found = true;
            }
            markers::DRI => {
                restart_interval = match segments::read_dri(data, &mut offset) {
                    Restart::Interval(interval) => interval,
                    Restart::Disabled => 0,
                }
            }
            markers::SOS => scan_start = Some(segments::read_sos(data, offset)?),
            markers::SOI => trace!("SOI"),
            markers::EOI => debug!(offset, "EOI reached before SOS"),
            _ => {}
        }
    }

    if !dqt_found {
        warn!("no quantization table in frame");
        return Err(ParseErrorKind::MissingRequiredSegment {
            marker: markers::DQT,
        }
        .into());
    }
    let Some(frame) = frame else {
        warn!("no frame header in frame");
        return Err(ParseErrorKind::MissingRequiredSegment {
            marker: markers::SOF0,
        }
        .into());
    };
    if frame.width8 == 0 || frame.height8 == 0 {
        return Err(ParseErrorKind::ZeroDimension.into());
    }
    let Some(scan_start) = scan_start else {
        warn!("no scan header in frame");
        return Err(ParseErrorKind::MissingRequiredSegment {
            marker: markers::SOS,
        }
        .into());
    };

    Ok(FrameDescriptor {
        width8: frame.width8,
        height8: frame.height8,
        sampling: frame.sampling,
        restart_interval,
        q_factor: EXPLICIT_TABLES_Q,
        luma_table: frame.luma_table,
        chroma_table: frame.chroma_table,
        q_tables,
        scan: scan_start..data.len(),
    })
}
