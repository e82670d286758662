//! Particle dissolve: an image is broken into single-pixel points that fade
//! out and drift away column by column, producing a wave across the image.

mod decompose;

pub use decompose::{decompose, Column, Decomposition, PixelSample};

use image::RgbaImage;

use crate::{
    comments::Rgb,
    config::{ParticleConfig, StaggerConfig},
    render::{RenderBackend, VisualHandle, VisualSpec},
    scene::{Transform, Vec2},
    timeline::Phase,
};

/// One animated point of the dissolve.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticlePoint {
    /// Position relative to the image center, y pointing up.
    pub position: Vec2,
    pub color: Rgb,
    pub opacity: f32,
    /// Show time after which the point starts fading.
    pub delay_ms: f64,
    home: Vec2,
    base_opacity: f32,
    show_time_ms: f64,
    phase: Phase,
    visual: Option<VisualHandle>,
}

impl ParticlePoint {
    fn new(sample: &PixelSample, width: u32, height: u32, delay_ms: f64) -> Self {
        let home = Vec2::new(
            sample.x as f32 - (width / 2) as f32,
            (height / 2) as f32 - sample.y as f32,
        );
        Self {
            position: home,
            color: sample.color,
            opacity: sample.opacity,
            delay_ms,
            home,
            base_opacity: sample.opacity,
            show_time_ms: 0.0,
            phase: Phase::Pending,
            visual: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn visual(&self) -> Option<VisualHandle> {
        self.visual
    }

    fn rewind(&mut self, delay_ms: f64) {
        self.position = self.home;
        self.opacity = self.base_opacity;
        self.delay_ms = delay_ms;
        self.show_time_ms = 0.0;
        self.phase = Phase::Pending;
        self.visual = None;
    }
}

/// The animated particle field of one image.
#[derive(Debug)]
pub struct ParticleField {
    width: u32,
    height: u32,
    config: ParticleConfig,
    rng: fastrand::Rng,
    left: Vec<Vec<ParticlePoint>>,
    right: Vec<Vec<ParticlePoint>>,
    backdrop: Option<VisualHandle>,
    /// Set once the backdrop was requested; restarts bring it back.
    show_backdrop: bool,
}

impl ParticleField {
    pub fn new(decomposition: &Decomposition, config: ParticleConfig) -> Self {
        let mut rng = fastrand::Rng::with_seed(config.seed as u64);
        let (width, height) = (decomposition.width, decomposition.height);
        let mut build = |columns: &[Column], stagger: &StaggerConfig| -> Vec<Vec<ParticlePoint>> {
            columns
                .iter()
                .enumerate()
                .map(|(column, samples)| {
                    samples
                        .iter()
                        .enumerate()
                        .map(|(index, sample)| {
                            let delay = stagger_delay(stagger, column, index, &mut rng);
                            ParticlePoint::new(sample, width, height, delay)
                        })
                        .collect()
                })
                .collect()
        };

        let left = build(decomposition.left.as_slice(), &config.left);
        let right = build(decomposition.right.as_slice(), &config.right);
        tracing::info!(
            width,
            height,
            left_columns = left.len(),
            right_columns = right.len(),
            "built particle field"
        );

        Self {
            width,
            height,
            config,
            rng,
            left,
            right,
            backdrop: None,
            show_backdrop: false,
        }
    }

    pub fn from_image(image: &RgbaImage, config: ParticleConfig) -> Self {
        let decomposition = decompose(image, config.left.scan, config.right.scan);
        Self::new(&decomposition, config)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn left(&self) -> &[Vec<ParticlePoint>] {
        &self.left
    }

    pub fn right(&self) -> &[Vec<ParticlePoint>] {
        &self.right
    }

    pub fn points(&self) -> impl Iterator<Item = &ParticlePoint> {
        self.right.iter().chain(&self.left).flatten()
    }

    pub fn point_count(&self) -> usize {
        self.points().count()
    }

    pub fn live_count(&self) -> usize {
        self.points().filter(|point| point.visual.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.points().all(|point| point.phase == Phase::Finished)
    }

    /// Show time at which the last point has faded out.
    pub fn total_duration_ms(&self) -> f64 {
        self.points()
            .map(|point| point.delay_ms + self.config.duration_ms)
            .fold(0.0, f64::max)
    }

    /// Adds the faint full-size copy of the image behind the points.
    pub fn spawn_backdrop(&mut self, backend: &mut dyn RenderBackend) -> crate::Result<()> {
        self.show_backdrop = true;
        if self.backdrop.is_some() {
            return Ok(());
        }
        let spec = VisualSpec::Backdrop {
            width: self.width,
            height: self.height,
            opacity: self.config.backdrop_opacity,
        };
        let handle = backend.create_visual(&spec)?;
        backend.update_transform(
            handle,
            &Transform::new(Vec2::ZERO, [0.0; 3], self.config.backdrop_opacity),
        );
        self.backdrop = Some(handle);
        Ok(())
    }

    /// Moves every point forward by `elapsed_ms`. Points inside their fade
    /// window lose opacity and jitter; points past it release their visual
    /// and are never touched again.
    pub fn animate(&mut self, elapsed_ms: f64, backend: &mut dyn RenderBackend) {
        let elapsed_ms = elapsed_ms.max(0.0);
        let config = &self.config;
        let rng = &mut self.rng;

        for point in self.right.iter_mut().chain(self.left.iter_mut()).flatten() {
            if point.phase == Phase::Finished {
                continue;
            }

            point.show_time_ms += elapsed_ms;
            let fade_end = point.delay_ms + config.duration_ms;

            if point.show_time_ms > fade_end {
                point.phase = Phase::Finished;
                if let Some(handle) = point.visual.take() {
                    backend.destroy_visual(handle);
                }
                continue;
            }
            if point.show_time_ms < point.delay_ms {
                continue;
            }

            if point.visual.is_none() {
                match backend.create_visual(&VisualSpec::Point { color: point.color }) {
                    Ok(handle) => point.visual = Some(handle),
                    Err(err) => {
                        tracing::warn!(%err, "point visual unavailable this frame");
                        continue;
                    }
                }
                point.phase = Phase::Active;
            }

            let fade_rate = point.base_opacity as f64 / config.duration_ms.max(f64::EPSILON);
            point.opacity -= (fade_rate * elapsed_ms) as f32;
            point.position.x += (rng.f64() * elapsed_ms / config.drift_x_divisor) as f32;
            let vertical = (rng.f64() * elapsed_ms / config.drift_y_divisor) as f32;
            if rng.bool() {
                point.position.y -= vertical;
            } else {
                point.position.y += vertical;
            }

            if let Some(handle) = point.visual {
                backend.update_transform(
                    handle,
                    &Transform::new(point.position, [0.0; 3], point.opacity),
                );
            }
        }
    }

    /// Restarts the dissolve from the beginning with freshly rolled delays.
    /// The backend scene is cleared; a previously spawned backdrop is rebuilt.
    pub fn restart(&mut self, backend: &mut dyn RenderBackend) {
        backend.clear_scene();
        self.backdrop = None;

        let rng = &mut self.rng;
        for (columns, stagger) in [
            (&mut self.left, &self.config.left),
            (&mut self.right, &self.config.right),
        ] {
            for (column, points) in columns.iter_mut().enumerate() {
                for (index, point) in points.iter_mut().enumerate() {
                    point.rewind(stagger_delay(stagger, column, index, rng));
                }
            }
        }
        if self.show_backdrop {
            if let Err(err) = self.spawn_backdrop(backend) {
                tracing::warn!(%err, "backdrop could not be restored");
            }
        }
        tracing::debug!(points = self.point_count(), "particle field restarted");
    }

    /// Destroys the visuals of every live point, keeping their state.
    pub fn release_visuals(&mut self, backend: &mut dyn RenderBackend) {
        for point in self.right.iter_mut().chain(self.left.iter_mut()).flatten() {
            if let Some(handle) = point.visual.take() {
                backend.destroy_visual(handle);
            }
        }
        if let Some(handle) = self.backdrop.take() {
            backend.destroy_visual(handle);
        }
    }
}

fn stagger_delay(
    stagger: &StaggerConfig,
    column: usize,
    index: usize,
    rng: &mut fastrand::Rng,
) -> f64 {
    stagger.offset_ms
        + column as f64 * stagger.column_step_ms
        + index as f64 * rng.f64() * stagger.jitter_ms
}
