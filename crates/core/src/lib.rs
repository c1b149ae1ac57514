pub mod config;
pub mod error;
pub mod jpeg;
pub mod media;
pub mod source;
pub mod transport;

pub use config::StreamConfig;
pub use error::{Error, ParseErrorKind, Result};
pub use jpeg::{FrameDescriptor, parse};
pub use media::Packetizer;
pub use media::mjpeg::{Geometry, MjpegPacketizer, process_frame};
pub use source::{FrameSource, ReplaySource, StillImageSource};
pub use transport::UdpTransport;
