//! Real-time hand sign recognition.
//!
//! Every camera frame passes through the same five stages:
//!
//! 1. [`hand`]: locate hands and estimate their landmarks.
//! 2. [`region`]: compute a margin-expanded bounding box around each hand and crop it.
//! 3. [`preprocess`]: turn the crop into a normalized, thresholded 32x32 grayscale tensor.
//! 4. [`classify`] and [`labels`]: run the letter classifier and map its output to a symbol.
//! 5. [`render`]: draw the result onto the frame and show it in a [`gui`] window.
//!
//! [`pipeline::Pipeline`] ties the stages together. Nothing is retained between frames.
//!
//! # Environment Variables
//!
//! Configuration is read from the environment by [`config::Config::from_env`]. All variables are
//! optional and prefixed with `HANDSIGN_`; see the [`config`] module for the full list. `RUST_LOG`
//! controls logging as usual (see [`init_logger!`]).

use log::LevelFilter;

pub mod classify;
pub mod config;
pub mod detection;
pub mod gui;
pub mod hand;
pub mod image;
pub mod iter;
pub mod labels;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod pipeline;
pub mod preprocess;
pub mod rect;
pub mod region;
pub mod render;
pub mod termination;
pub mod timer;
pub mod video;

pub use gui::run;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and this library will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// `wgpu` will always log at *warn* level. `RUST_LOG` is applied on top of these defaults.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
