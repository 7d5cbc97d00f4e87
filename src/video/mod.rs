//! Frame sources.
//!
//! The recognizer reads frames through the [`FrameSource`] trait. [`webcam::Webcam`] captures from
//! a V4L2 camera, [`Stills`] replays a fixed sequence of images.

pub mod webcam;

use std::{collections::VecDeque, path::Path};

use anyhow::anyhow;

use crate::image::Image;
use crate::timer::Timer;

/// A source of successive video frames.
pub trait FrameSource {
    /// Reads the next frame, blocking until one is available.
    ///
    /// Returns `None` once the source has no more frames. An error means that the source failed.
    fn read_frame(&mut self) -> anyhow::Result<Option<Image>>;

    /// Returns profiling timers for frame capture.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// A [`FrameSource`] yielding a fixed list of images.
#[derive(Debug, Default)]
pub struct Stills {
    frames: VecDeque<Image>,
}

impl Stills {
    pub fn new<I: IntoIterator<Item = Image>>(frames: I) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// Loads every image from a list of paths.
    pub fn load<P: AsRef<Path>, I: IntoIterator<Item = P>>(paths: I) -> anyhow::Result<Self> {
        let frames = paths
            .into_iter()
            .map(|path| {
                let path = path.as_ref();
                Image::load(path)
                    .map_err(|e| anyhow!("failed to load image '{}': {e}", path.display()))
            })
            .collect::<anyhow::Result<_>>()?;
        Ok(Self { frames })
    }

    /// Returns the number of frames left.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for Stills {
    fn read_frame(&mut self) -> anyhow::Result<Option<Image>> {
        Ok(self.frames.pop_front())
    }
}
