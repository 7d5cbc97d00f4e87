//! Landmark estimation inside a region of a frame.

use anyhow::anyhow;

use crate::image::{AsImageView, ImageView, Resolution};
use crate::nn::{Cnn, Outputs};
use crate::rect::RotatedRect;
use crate::timer::Timer;

/// A fixed number of 3D landmark positions.
#[derive(Debug, Clone)]
pub struct Landmarks {
    positions: Box<[[f32; 3]]>,
}

impl Landmarks {
    /// Creates `len` landmarks at the origin.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0; 3]; len].into(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + '_ {
        self.positions.iter().map(|&pos| Landmark(pos))
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [[f32; 3]] {
        &mut self.positions
    }

    fn map_positions(&mut self, mut f: impl FnMut([f32; 3]) -> [f32; 3]) {
        for pos in self.positions.iter_mut() {
            *pos = f(*pos);
        }
    }
}

/// A single landmark position.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Landmark([f32; 3]);

impl Landmark {
    #[inline]
    pub fn x(&self) -> f32 {
        self.0[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.0[1]
    }
}

/// The decoded output of a landmark [`Network`].
pub trait Estimate: Send + Sync + 'static {
    fn landmarks(&self) -> &Landmarks;

    fn landmarks_mut(&mut self) -> &mut Landmarks;

    /// Likelihood (`0.0..=1.0`) that the object is actually in the region.
    fn presence(&self) -> f32;
}

/// A network estimating landmarks on an image.
pub trait Network: Send + Sync + 'static {
    type Output: Estimate;

    fn cnn(&self) -> &Cnn;

    /// Decodes `outputs` into `estimate`, with positions in network input coordinates.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) -> anyhow::Result<()>;
}

/// Names of the [`Estimator`] stage timers.
pub(crate) const TIMER_NAMES: [&str; 2] = ["landmark infer", "landmark extract"];

/// Runs a landmark [`Network`], reusing one output buffer of type `E`.
pub struct Estimator<E: Estimate> {
    network: Box<dyn Network<Output = E>>,
    estimate: E,
    t_infer: Timer,
    t_extract: Timer,
}

impl<E: Estimate + Default> Estimator<E> {
    pub fn new<N: Network<Output = E>>(network: N) -> Self {
        let [t_infer, t_extract] = TIMER_NAMES.map(Timer::new);
        Self {
            network: Box::new(network),
            estimate: E::default(),
            t_infer,
            t_extract,
        }
    }
}

impl<E: Estimate> Estimator<E> {
    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    /// Estimates landmarks in the region `roi` of `frame`.
    ///
    /// The region is grown to the network's aspect ratio first. Pixels it covers outside of the
    /// frame read as transparent black. The returned positions are in `frame` coordinates.
    pub fn estimate_in<V: AsImageView>(
        &mut self,
        frame: &V,
        roi: RotatedRect,
    ) -> anyhow::Result<&mut E> {
        let input_res = self.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .ok_or_else(|| anyhow!("landmark network has empty input {input_res}"))?;
        let region = roi.map(|rect| rect.grow_to_fit_aspect(aspect));

        let frame = frame.as_view();
        self.run(frame.view(region))?;

        self.estimate.landmarks_mut().map_positions(|[x, y, z]| {
            let [x, y] = region.transform_out(x, y);
            [x, y, z]
        });
        Ok(&mut self.estimate)
    }

    /// Runs the network on `view`, leaving positions in `view` coordinates.
    fn run(&mut self, view: ImageView<'_>) -> anyhow::Result<()> {
        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let outputs = self.t_infer.time(|| cnn.estimate(&view))?;
        self.t_extract
            .time(|| self.network.extract(&outputs, &mut self.estimate))?;

        let scale = view.width() as f32 / input_res.width() as f32;
        self.estimate
            .landmarks_mut()
            .map_positions(|pos| pos.map(|t| t * scale));
        Ok(())
    }
}
