//! Frame driver tying the media clock, an animator and a render backend
//! together.
//!
//! The host calls [`Player::frame`] once per display refresh and keeps doing
//! so while it returns [`FrameOutcome::Continue`]. Seeking is synchronous:
//! [`Player::seek`] rebuilds the overlay and renders once before returning,
//! so no frame ever observes a half-reset timeline.

use crate::{
    assets::AssetStore,
    clock::{MediaClock, MediaEvent, MediaSource},
    particles::ParticleField,
    render::RenderBackend,
    timeline::AnimationScheduler,
    Result,
};

/// A collection of visuals that can be moved forward frame by frame and
/// rebuilt for an arbitrary media position.
pub trait Animator {
    fn advance(&mut self, clock_time: f64, elapsed_ms: f64, backend: &mut dyn RenderBackend);

    /// Rebuilds state for the media position `clock_time`. Implementations
    /// clear the backend scene first.
    fn reset(&mut self, clock_time: f64, backend: &mut dyn RenderBackend);

    /// Destroys every visual without touching animation state.
    fn release_visuals(&mut self, backend: &mut dyn RenderBackend);

    fn is_complete(&self) -> bool;

    /// Whether the state is a function of the media position. Animators that
    /// are not keep their state when the media ends.
    fn follows_media(&self) -> bool {
        true
    }
}

impl Animator for AnimationScheduler {
    fn advance(&mut self, clock_time: f64, elapsed_ms: f64, backend: &mut dyn RenderBackend) {
        AnimationScheduler::advance(self, clock_time, elapsed_ms, backend);
    }

    fn reset(&mut self, clock_time: f64, backend: &mut dyn RenderBackend) {
        AnimationScheduler::reset(self, clock_time, backend);
    }

    fn release_visuals(&mut self, backend: &mut dyn RenderBackend) {
        AnimationScheduler::release_visuals(self, backend);
    }

    fn is_complete(&self) -> bool {
        self.finished_count() == self.len()
    }
}

/// The dissolve is not tied to media time: a reset restarts it.
impl Animator for ParticleField {
    fn advance(&mut self, _clock_time: f64, elapsed_ms: f64, backend: &mut dyn RenderBackend) {
        self.animate(elapsed_ms, backend);
    }

    fn reset(&mut self, _clock_time: f64, backend: &mut dyn RenderBackend) {
        self.restart(backend);
    }

    fn release_visuals(&mut self, backend: &mut dyn RenderBackend) {
        ParticleField::release_visuals(self, backend);
    }

    fn is_complete(&self) -> bool {
        ParticleField::is_complete(self)
    }

    fn follows_media(&self) -> bool {
        false
    }
}

/// Whether the host should schedule another frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Stopped,
}

/// Startup gate: items can be loaded long before the shared assets they
/// render with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    AwaitingAssets,
    Ready,
}

/// Read-only view of the playback position for progress displays.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub current: String,
    pub duration: String,
    /// Zero to one hundred.
    pub progress_percent: f64,
    pub playing: bool,
}

impl PlaybackStatus {
    pub fn new(current_time: f64, duration: f64, playing: bool) -> Self {
        let progress_percent = if duration.is_finite() && duration > 0.0 {
            (current_time / duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            current: format_timestamp(current_time),
            duration: format_timestamp(duration),
            progress_percent,
            playing,
        }
    }
}

/// Formats seconds as zero-padded `mm:ss`. Minutes wrap at one hour.
pub fn format_timestamp(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "00:00".to_string();
    }
    let minutes = (seconds / 60.0).floor() as u64 % 60;
    let seconds = (seconds % 60.0).floor() as u64;
    format!("{minutes:02}:{seconds:02}")
}

pub struct Player<M, A, B> {
    clock: MediaClock<M>,
    animator: A,
    backend: B,
    assets: AssetStore,
    overlay_visible: bool,
    startup: Startup,
}

impl<M, A, B> Player<M, A, B>
where
    M: MediaSource,
    A: Animator,
    B: RenderBackend,
{
    pub fn new(clock: MediaClock<M>, animator: A, backend: B, assets: AssetStore) -> Self {
        let startup = if assets.is_ready() {
            Startup::Ready
        } else {
            tracing::info!(pending = ?assets.pending(), "waiting for assets");
            Startup::AwaitingAssets
        };
        Self {
            clock,
            animator,
            backend,
            assets,
            overlay_visible: true,
            startup,
        }
    }

    pub fn startup(&self) -> Startup {
        self.startup
    }

    /// Records a finished asset load. When it was the last one the overlay is
    /// rebuilt for the current position and animation begins.
    pub fn asset_loaded(&mut self, name: &str) -> Result<()> {
        self.assets.mark_loaded(name)?;
        self.check_ready()
    }

    /// Loads an asset from its registered path; see [`Player::asset_loaded`].
    pub fn load_asset(&mut self, name: &str) -> Result<()> {
        self.assets.load_from_disk(name)?;
        self.check_ready()
    }

    fn check_ready(&mut self) -> Result<()> {
        if self.startup == Startup::Ready || !self.assets.is_ready() {
            return Ok(());
        }
        self.startup = Startup::Ready;
        let position = self.clock.current_time();
        tracing::info!(position, "assets ready, starting animation");
        if self.overlay_visible {
            self.animator.reset(position, &mut self.backend);
            self.backend.render_frame()?;
        }
        self.clock.invalidate();
        Ok(())
    }

    /// One display refresh: clock tick, animation step, render.
    pub fn frame(&mut self) -> Result<FrameOutcome> {
        self.handle_media_events()?;

        let elapsed_ms = self.clock.tick();
        if self.startup == Startup::Ready && self.overlay_visible {
            self.animator
                .advance(self.clock.current_time(), elapsed_ms, &mut self.backend);
        }
        self.backend.render_frame()?;

        if self.clock.is_playing() {
            Ok(FrameOutcome::Continue)
        } else {
            self.clock.invalidate();
            Ok(FrameOutcome::Stopped)
        }
    }

    pub fn play(&mut self) {
        self.clock.play();
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    /// Returns whether the media is playing afterwards.
    pub fn toggle_play(&mut self) -> bool {
        if self.clock.is_playing() {
            self.pause();
        } else {
            self.play();
        }
        self.clock.is_playing()
    }

    /// Jumps to `seconds`, resuming playback if paused, and rebuilds the
    /// overlay for the new position before returning.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.clock.seek(seconds);
        if !self.clock.is_playing() {
            self.clock.play();
        }
        tracing::info!(position = self.clock.current_time(), "seek");
        self.rebuild()
    }

    /// Shows or hides the overlay. Returns whether it is visible afterwards.
    pub fn toggle_overlay(&mut self) -> Result<bool> {
        self.overlay_visible = !self.overlay_visible;
        if self.overlay_visible {
            self.rebuild()?;
        } else {
            self.animator.release_visuals(&mut self.backend);
            self.backend.render_frame()?;
        }
        Ok(self.overlay_visible)
    }

    fn rebuild(&mut self) -> Result<()> {
        if self.startup == Startup::Ready && self.overlay_visible {
            self.animator
                .reset(self.clock.current_time(), &mut self.backend);
            self.backend.render_frame()?;
        }
        self.clock.invalidate();
        Ok(())
    }

    fn handle_media_events(&mut self) -> Result<()> {
        for event in self.clock.drain_events() {
            match event {
                MediaEvent::CanPlay => {
                    tracing::debug!(duration = self.clock.duration(), "media can play");
                }
                MediaEvent::TimeUpdate => {}
                MediaEvent::Ended => {
                    tracing::info!("media ended, rewinding");
                    self.clock.pause();
                    self.clock.seek(0.0);
                    if self.animator.follows_media() {
                        self.rebuild()?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus::new(
            self.clock.current_time(),
            self.clock.duration(),
            self.clock.is_playing(),
        )
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn clock(&self) -> &MediaClock<M> {
        &self.clock
    }

    pub fn animator(&self) -> &A {
        &self.animator
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }
}
