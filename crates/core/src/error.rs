//! Error types for the JPEG analyzer and RTP/JPEG packetizer.

use std::fmt;

/// Errors that can occur while analyzing or packetizing a frame.
///
/// Variants map to specific failure modes across the pipeline:
///
/// - **Frame**: [`Parse`](Self::Parse): the current JPEG buffer could not be
///   described. Callers drop the frame and keep going with the next tick.
/// - **Configuration**: [`PayloadTooSmall`](Self::PayloadTooSmall),
///   [`InvalidFrameRate`](Self::InvalidFrameRate).
/// - **Packetization**: [`ScanTooLarge`](Self::ScanTooLarge).
/// - **Edges**: [`Io`](Self::Io): file or socket failures in sources and
///   transports.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The JPEG buffer for the current frame could not be parsed.
    #[error("JPEG parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// The maximum payload size cannot hold the RFC 2435 headers plus at
    /// least one byte of scan data.
    #[error("max payload size {size} is too small (need at least {min} bytes)")]
    PayloadTooSmall { size: usize, min: usize },

    /// Scan data is longer than the 24-bit fragment offset can address.
    #[error("scan data of {len} bytes exceeds the 24-bit fragment offset range")]
    ScanTooLarge { len: usize },

    /// Frame rate must be at least one frame per second.
    #[error("invalid frame rate: {0}")]
    InvalidFrameRate(u32),
}

impl Error {
    /// The parse failure kind, if this error came from the frame parser.
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match self {
            Self::Parse { kind } => Some(*kind),
            _ => None,
        }
    }
}

impl From<ParseErrorKind> for Error {
    fn from(kind: ParseErrorKind) -> Self {
        Self::Parse { kind }
    }
}

/// Specific kind of JPEG parse failure.
///
/// All kinds are local to one frame. A missing or zero restart interval is
/// not represented here: it never fails a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A segment's declared length disagrees with the bytes available or
    /// with the minimum the segment needs.
    MalformedSegment { marker: u8 },
    /// Well-formed JPEG outside the supported baseline 3-component profile.
    UnsupportedImage(Unsupported),
    /// No quantization table, frame header or scan header was found.
    MissingRequiredSegment { marker: u8 },
    /// Width or height is smaller than one 8-pixel block.
    ZeroDimension,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedSegment { marker } => write!(f, "malformed FF {marker:02X} segment"),
            Self::UnsupportedImage(reason) => write!(f, "unsupported image: {reason}"),
            Self::MissingRequiredSegment { marker } => {
                write!(f, "missing required FF {marker:02X} segment")
            }
            Self::ZeroDimension => write!(f, "zero image dimension"),
        }
    }
}

/// The constraint an [`UnsupportedImage`](ParseErrorKind::UnsupportedImage)
/// frame violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    /// Sample precision other than 8 bits.
    SamplePrecision(u8),
    /// Width or height outside `1..=2040` pixels.
    Dimensions { width: u16, height: u16 },
    /// Component count other than 3.
    ComponentCount(u8),
    /// Luma sampling byte other than `0x21` or `0x22`.
    LumaSampling(u8),
    /// Chroma sampling byte other than `0x11`.
    ChromaSampling(u8),
    /// Cb and Cr reference different quantization tables.
    ChromaTables { cb: u8, cr: u8 },
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SamplePrecision(p) => write!(f, "{p}-bit samples"),
            Self::Dimensions { width, height } => write!(f, "dimensions {width}x{height}"),
            Self::ComponentCount(n) => write!(f, "{n} components"),
            Self::LumaSampling(s) => write!(f, "luma sampling factor {s:02x}"),
            Self::ChromaSampling(s) => write!(f, "chroma sampling factor {s:02x}"),
            Self::ChromaTables { cb, cr } => {
                write!(f, "chroma quantization tables differ ({cb} vs {cr})")
            }
        }
    }
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kind_roundtrips_through_error() {
        let err: Error = ParseErrorKind::ZeroDimension.into();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::ZeroDimension));
    }

    #[test]
    fn non_parse_errors_have_no_kind() {
        let err = Error::InvalidFrameRate(0);
        assert_eq!(err.parse_kind(), None);
    }

    #[test]
    fn display_names_the_constraint() {
        let err: Error =
            ParseErrorKind::UnsupportedImage(Unsupported::ChromaTables { cb: 1, cr: 2 }).into();
        assert_eq!(
            err.to_string(),
            "JPEG parse error: unsupported image: chroma quantization tables differ (1 vs 2)"
        );
    }

    #[test]
    fn display_marker_in_hex() {
        let kind = ParseErrorKind::MalformedSegment { marker: 0xC0 };
        assert_eq!(kind.to_string(), "malformed FF C0 segment");
    }
}
