//! V4L2 webcam capture.
//!
//! Only capture devices that can stream JPEG or Motion JPEG frames are used.

use anyhow::{bail, Context};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::{Image, JpegBackend, Resolution};
use crate::timer::Timer;

use super::FrameSource;

/// Which webcam to open and how to capture from it.
#[derive(Debug, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    max_resolution: Resolution,
    jpeg_backend: JpegBackend,
}

impl Default for WebcamOptions {
    fn default() -> Self {
        Self {
            name: None,
            max_resolution: Resolution::new(640, 480),
            jpeg_backend: JpegBackend::default(),
        }
    }
}

impl WebcamOptions {
    /// Only opens the device with this name (as reported by the driver).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the largest frame size to capture at, 640x480 by default.
    pub fn max_resolution(mut self, res: Resolution) -> Self {
        self.max_resolution = res;
        self
    }

    pub fn jpeg_backend(mut self, jpeg_backend: JpegBackend) -> Self {
        self.jpeg_backend = jpeg_backend;
        self
    }
}

/// A frame size and rate a device can capture at.
#[derive(Clone, Copy)]
struct CaptureMode {
    resolution: Resolution,
    interval: Fract,
}

impl CaptureMode {
    fn fps(&self) -> f32 {
        1.0 / self.interval.as_f32()
    }
}

/// Picks the largest mode that fits in `max`, breaking ties by frame rate.
///
/// If every mode is too large, the smallest one is used instead.
fn choose_mode(modes: &[CaptureMode], max: Resolution) -> Option<CaptureMode> {
    let fits = |m: &&CaptureMode| {
        m.resolution.width() <= max.width() && m.resolution.height() <= max.height()
    };
    let by_size_then_fps = |a: &&CaptureMode, b: &&CaptureMode| {
        a.resolution
            .num_pixels()
            .cmp(&b.resolution.num_pixels())
            .then(a.fps().total_cmp(&b.fps()))
    };

    match modes.iter().filter(fits).max_by(by_size_then_fps) {
        Some(mode) => Some(*mode),
        None => modes
            .iter()
            .min_by(|a, b| by_size_then_fps(a, b).then(b.fps().total_cmp(&a.fps())))
            .copied(),
    }
}

/// Lists the discrete capture modes of `device` for `format`.
fn capture_modes(device: &Device, format: Pixelformat) -> anyhow::Result<Vec<CaptureMode>> {
    let FrameSizes::Discrete(sizes) = device.frame_sizes(format)? else {
        bail!("device only reports stepwise or continuous frame sizes");
    };

    let mut modes = Vec::new();
    for size in sizes {
        let (width, height) = (size.width(), size.height());
        match device.frame_intervals(format, width, height)? {
            FrameIntervals::Discrete(intervals) => {
                modes.extend(intervals.iter().map(|rate| CaptureMode {
                    resolution: Resolution::new(width, height),
                    interval: *rate.fract(),
                }));
            }
            _ => log::debug!("skipping {width}x{height}: frame rates are not discrete"),
        }
    }
    Ok(modes)
}

fn jpeg_format(device: &Device) -> anyhow::Result<Option<Pixelformat>> {
    for desc in device.formats(BufType::VIDEO_CAPTURE) {
        let format = desc?.pixelformat();
        if format == Pixelformat::MJPG || format == Pixelformat::JPEG {
            return Ok(Some(format));
        }
    }
    Ok(None)
}

/// A V4L2 camera delivering decoded [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
    jpeg_backend: JpegBackend,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first usable device matching `options`.
    ///
    /// Blocks while the camera starts up, which can take a few hundred milliseconds.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        for device in linuxvideo::list()? {
            let device = match device {
                Ok(device) => device,
                Err(e) => {
                    log::warn!("cannot enumerate video device: {e}");
                    continue;
                }
            };
            match Self::try_open(device, &options) {
                Ok(Some(webcam)) => return Ok(webcam),
                Ok(None) => {}
                Err(e) => log::debug!("skipping video device: {e:#}"),
            }
        }

        match &options.name {
            Some(name) => bail!("no webcam named '{name}' with JPEG capture support found"),
            None => bail!("no webcam with JPEG capture support found"),
        }
    }

    fn try_open(device: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = device.capabilities()?;
        let card = caps.card();
        if options.name.as_deref().map_or(false, |name| name != card) {
            return Ok(None);
        }
        if !caps
            .device_capabilities()
            .contains(CapabilityFlags::VIDEO_CAPTURE)
        {
            log::debug!("'{card}' is not a capture device");
            return Ok(None);
        }
        let Some(format) = jpeg_format(&device)? else {
            log::debug!("'{card}' cannot capture JPEG frames");
            return Ok(None);
        };

        let modes = capture_modes(&device, format).with_context(|| format!("device '{card}'"))?;
        let Some(mode) = choose_mode(&modes, options.max_resolution) else {
            bail!("device '{card}' reports no capture modes");
        };

        let (w, h) = (mode.resolution.width(), mode.resolution.height());
        let capture = device.video_capture(PixFormat::new(w, h, format))?;
        let actual = capture.format();
        let resolution = Resolution::new(actual.width(), actual.height());
        let interval = capture.set_frame_interval(mode.interval)?;

        log::info!(
            "capturing from '{card}' at {resolution}, {:.1} fps ({} decoder)",
            1.0 / interval.as_f32(),
            options.jpeg_backend,
        );

        Ok(Some(Self {
            stream: capture.into_stream(2)?,
            resolution,
            jpeg_backend: options.jpeg_backend,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

impl FrameSource for Webcam {
    /// Blocks until the camera delivers the next frame.
    ///
    /// Frames that fail to decode come out blank instead of failing the stream.
    fn read_frame(&mut self) -> anyhow::Result<Option<Image>> {
        let Self {
            stream,
            resolution,
            jpeg_backend,
            t_dequeue,
            t_decode,
        } = self;

        let waiting = t_dequeue.start();
        let frame = stream.dequeue(|jpeg| {
            drop(waiting);
            let image = t_decode
                .time(|| Image::decode_jpeg_with(&jpeg, *jpeg_backend))
                .unwrap_or_else(|e| {
                    log::error!("dropping corrupt webcam frame: {e}");
                    Image::new(resolution.width(), resolution.height())
                });
            Ok(image)
        })?;
        Ok(Some(frame))
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(w: u32, h: u32, fps: u32) -> CaptureMode {
        CaptureMode {
            resolution: Resolution::new(w, h),
            interval: Fract::new(1, fps),
        }
    }

    fn describe(mode: Option<CaptureMode>) -> Option<(Resolution, u32)> {
        mode.map(|m| (m.resolution, m.fps().round() as u32))
    }

    #[test]
    fn largest_mode_that_fits() {
        let modes = [
            mode(320, 240, 30),
            mode(640, 480, 15),
            mode(640, 480, 30),
            mode(1280, 720, 60),
        ];
        assert_eq!(
            describe(choose_mode(&modes, Resolution::new(640, 480))),
            Some((Resolution::new(640, 480), 30)),
        );
        assert_eq!(
            describe(choose_mode(&modes, Resolution::new(1920, 1080))),
            Some((Resolution::new(1280, 720), 60)),
        );
    }

    #[test]
    fn smallest_mode_when_nothing_fits() {
        let modes = [mode(1280, 720, 30), mode(800, 600, 15), mode(800, 600, 30)];
        assert_eq!(
            describe(choose_mode(&modes, Resolution::new(640, 480))),
            Some((Resolution::new(800, 600), 30)),
        );
    }

    #[test]
    fn no_modes() {
        assert!(choose_mode(&[], Resolution::new(640, 480)).is_none());
    }

    #[test]
    fn options() {
        let options = WebcamOptions::default()
            .name("Integrated Camera")
            .max_resolution(Resolution::new(320, 240))
            .jpeg_backend(JpegBackend::JpegDecoder);
        assert_eq!(options.name.as_deref(), Some("Integrated Camera"));
        assert_eq!(options.max_resolution, Resolution::new(320, 240));
        assert_eq!(options.jpeg_backend, JpegBackend::JpegDecoder);
    }
}
