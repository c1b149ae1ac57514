//! Frame sources: where each capture tick's JPEG buffer comes from.
//!
//! A source hands out one complete JPEG image per call. Buffers are
//! borrowed from the source and stay valid until the next call, so a
//! source can reuse its storage from tick to tick.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::Result;

/// Producer of one JPEG buffer per capture tick.
pub trait FrameSource {
    /// The next frame, or `None` when the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<&[u8]>>;
}

/// Delivers the same still image on every tick.
#[derive(Debug, Clone)]
pub struct StillImageSource {
    image: Vec<u8>,
}

impl StillImageSource {
    pub fn new(image: Vec<u8>) -> Self {
        Self { image }
    }

    /// Load the image from a JPEG file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = fs::read(path)?;
        info!(path = %path.display(), size = image.len(), "loaded still image");
        Ok(Self::new(image))
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<Option<&[u8]>> {
        Ok(Some(&self.image))
    }
}

/// Cycles through a fixed list of frames.
///
/// With `looping` disabled the source ends after the last frame.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    frames: Vec<Vec<u8>>,
    position: usize,
    looping: bool,
}

impl ReplaySource {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames,
            position: 0,
            looping: true,
        }
    }

    pub fn once(frames: Vec<Vec<u8>>) -> Self {
        Self {
            looping: false,
            ..Self::new(frames)
        }
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<&[u8]>> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        if self.position == self.frames.len() {
            if !self.looping {
                return Ok(None);
            }
            debug!(frames = self.frames.len(), "replay wrapped");
            self.position = 0;
        }
        let index = self.position;
        self.position += 1;
        Ok(Some(&self.frames[index]))
    }
}
