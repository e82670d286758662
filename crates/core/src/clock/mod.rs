use std::{cell::Cell, fmt, rc::Rc, time::Instant};

/// Notifications a media element raises as playback progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    /// Enough data is available to start playing; the duration is known.
    CanPlay,
    TimeUpdate,
    Ended,
}

/// The authoritative playback position, typically a video element.
pub trait MediaSource {
    /// Playback position in seconds.
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn paused(&self) -> bool;
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    /// Events raised since the previous call.
    fn drain_events(&mut self) -> Vec<MediaEvent>;
}

/// Monotonic wall clock in milliseconds, sampled once per display refresh.
pub trait FrameTimer {
    fn now_ms(&self) -> f64;
}

/// [`FrameTimer`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct InstantTimer {
    origin: Instant,
}

impl InstantTimer {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for InstantTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer for InstantTimer {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven timer. Clones share the same reading, so one copy can be
/// handed to the clock while the driver keeps another to move time forward.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ms: Rc<Cell<f64>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: f64) {
        self.now_ms.set(self.now_ms.get() + ms.max(0.0));
    }

    pub fn set(&self, ms: f64) {
        self.now_ms.set(ms);
    }
}

impl FrameTimer for ManualTimer {
    fn now_ms(&self) -> f64 {
        self.now_ms.get()
    }
}

/// Headless media element whose position follows a [`FrameTimer`] while
/// playing. It stops by itself at the end of the media, like a video element.
pub struct SimulatedMedia {
    timer: Box<dyn FrameTimer>,
    duration: f64,
    /// Position at the moment playback last started, paused or seeked.
    anchor_position: f64,
    /// Timer reading at that moment while playing; `None` while paused.
    anchor_ms: Option<f64>,
    last_reported: Option<f64>,
    can_play_sent: bool,
    ended_sent: bool,
}

impl SimulatedMedia {
    pub fn new(duration: f64, timer: impl FrameTimer + 'static) -> Self {
        Self {
            timer: Box::new(timer),
            duration: duration.max(0.0),
            anchor_position: 0.0,
            anchor_ms: None,
            last_reported: None,
            can_play_sent: false,
            ended_sent: false,
        }
    }

    fn at_end(&self) -> bool {
        self.current_time() >= self.duration
    }
}

impl MediaSource for SimulatedMedia {
    fn current_time(&self) -> f64 {
        match self.anchor_ms {
            Some(anchor) => {
                let played = (self.timer.now_ms() - anchor).max(0.0) / 1000.0;
                (self.anchor_position + played).min(self.duration)
            }
            None => self.anchor_position,
        }
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn paused(&self) -> bool {
        self.anchor_ms.is_none() || self.at_end()
    }

    fn play(&mut self) {
        if self.at_end() {
            self.anchor_position = 0.0;
            self.anchor_ms = None;
            self.ended_sent = false;
        }
        if self.anchor_ms.is_none() {
            self.anchor_ms = Some(self.timer.now_ms());
        }
    }

    fn pause(&mut self) {
        self.anchor_position = self.current_time();
        self.anchor_ms = None;
    }

    fn seek(&mut self, seconds: f64) {
        self.anchor_position = seconds.clamp(0.0, self.duration);
        if self.anchor_ms.is_some() {
            self.anchor_ms = Some(self.timer.now_ms());
        }
        self.ended_sent = false;
    }

    fn drain_events(&mut self) -> Vec<MediaEvent> {
        let mut events = Vec::new();
        if !self.can_play_sent {
            self.can_play_sent = true;
            events.push(MediaEvent::CanPlay);
        }

        let position = self.current_time();
        if self.last_reported != Some(position) {
            self.last_reported = Some(position);
            events.push(MediaEvent::TimeUpdate);
        }

        if self.at_end() && !self.ended_sent {
            self.ended_sent = true;
            self.anchor_position = self.duration;
            self.anchor_ms = None;
            events.push(MediaEvent::Ended);
        }
        events
    }
}

impl fmt::Debug for SimulatedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedMedia")
            .field("duration", &self.duration)
            .field("position", &self.current_time())
            .field("playing", &self.anchor_ms.is_some())
            .finish()
    }
}

/// Wraps a [`MediaSource`] and measures wall time between animation frames.
pub struct MediaClock<M> {
    media: M,
    timer: Box<dyn FrameTimer>,
    last_frame_ms: Option<f64>,
}

impl<M: MediaSource> MediaClock<M> {
    pub fn new(media: M) -> Self {
        Self::with_timer(media, InstantTimer::new())
    }

    pub fn with_timer(media: M, timer: impl FrameTimer + 'static) -> Self {
        Self {
            media,
            timer: Box::new(timer),
            last_frame_ms: None,
        }
    }

    /// Milliseconds since the previous tick. The first tick after a pause,
    /// seek or [`MediaClock::invalidate`] reports zero, so resuming never
    /// produces a jump.
    pub fn tick(&mut self) -> f64 {
        if !self.is_playing() {
            self.last_frame_ms = None;
            return 0.0;
        }

        let now = self.timer.now_ms();
        match self.last_frame_ms.replace(now) {
            Some(previous) => (now - previous).max(0.0),
            None => 0.0,
        }
    }

    /// Forgets the previous frame timestamp.
    pub fn invalidate(&mut self) {
        self.last_frame_ms = None;
    }

    pub fn current_time(&self) -> f64 {
        self.media.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.media.duration()
    }

    pub fn is_playing(&self) -> bool {
        !self.media.paused()
    }

    pub fn play(&mut self) {
        self.media.play();
    }

    pub fn pause(&mut self) {
        self.media.pause();
        self.invalidate();
    }

    pub fn seek(&mut self, seconds: f64) {
        self.media.seek(seconds);
        self.invalidate();
    }

    pub fn drain_events(&mut self) -> Vec<MediaEvent> {
        self.media.drain_events()
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }
}

impl<M: fmt::Debug> fmt::Debug for MediaClock<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaClock")
            .field("media", &self.media)
            .field("last_frame_ms", &self.last_frame_ms)
            .finish()
    }
}
