use serde::{Deserialize, Serialize};

use crate::{
    comments::{Comment, Rgb},
    render::{PixelRect, VisualHandle, VisualSpec},
    scene::{Rotation, TextLayout, Vec2},
};

/// Payload-specific content of an item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemContent {
    Text {
        text: String,
        font_size: f32,
        color: Rgb,
        family: Option<String>,
    },
    Image {
        region: PixelRect,
    },
}

/// Where an item is in its life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Not due yet, or rewound to before its activation time.
    #[default]
    Pending,
    Active,
    Finished,
}

/// Where inside `[delay, delay + move_duration]` an item currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionWindow {
    Before,
    Moving,
    Settled,
}

/// Runtime state of an item. Only the scheduler mutates it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    pub phase: Phase,
    /// Unclamped; may drift past `end_opacity` and below zero.
    pub opacity: f32,
    pub position: Vec2,
    pub elapsed_shown_ms: f64,
}

/// One schedulable visual on the media timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineItem {
    /// Seconds from media start at which the item becomes eligible to render.
    pub activation_time: f64,
    /// Seconds the item stays alive once activated.
    pub total_duration: f64,
    /// Seconds after activation before the item starts moving.
    pub delay: f64,
    /// Seconds the movement lasts.
    pub move_duration: f64,
    pub start_pos: Vec2,
    pub end_pos: Vec2,
    pub start_opacity: f32,
    pub end_opacity: f32,
    pub rotation: Rotation,
    pub content: ItemContent,
    pub(crate) state: ItemState,
    pub(crate) visual: Option<VisualHandle>,
}

impl TimelineItem {
    /// A static, fully opaque item at the origin.
    pub fn new(activation_time: f64, total_duration: f64, content: ItemContent) -> Self {
        Self {
            activation_time,
            total_duration: total_duration.max(0.0),
            delay: 0.0,
            move_duration: 0.0,
            start_pos: Vec2::ZERO,
            end_pos: Vec2::ZERO,
            start_opacity: 1.0,
            end_opacity: 1.0,
            rotation: Rotation::default(),
            content,
            state: ItemState::default(),
            visual: None,
        }
    }

    pub fn text(activation_time: f64, total_duration: f64, text: impl Into<String>) -> Self {
        Self::new(
            activation_time,
            total_duration,
            ItemContent::Text {
                text: text.into(),
                font_size: 25.0,
                color: Rgb::WHITE,
                family: None,
            },
        )
    }

    /// An item showing `region` of a shared source image.
    pub fn image(activation_time: f64, total_duration: f64, region: PixelRect) -> Self {
        Self::new(activation_time, total_duration, ItemContent::Image { region })
    }

    pub fn from_comment(comment: &Comment) -> Self {
        let motion = &comment.motion;
        Self::new(
            comment.play_time,
            motion.duration,
            ItemContent::Text {
                text: motion.text.clone(),
                font_size: comment.font_size as f32,
                color: comment.color,
                family: motion.family.clone(),
            },
        )
        .with_motion(
            motion.start,
            motion.end,
            motion.delay_ms / 1000.0,
            motion.move_duration_ms / 1000.0,
        )
        .with_opacity(motion.start_opacity, motion.end_opacity)
        .with_rotation(motion.rotation)
    }

    pub fn with_motion(mut self, start: Vec2, end: Vec2, delay: f64, move_duration: f64) -> Self {
        self.start_pos = start;
        self.end_pos = end;
        self.delay = delay.max(0.0);
        self.move_duration = move_duration.max(0.0);
        self
    }

    pub fn with_opacity(mut self, start: f32, end: f32) -> Self {
        self.start_opacity = start;
        self.end_opacity = end;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn state(&self) -> &ItemState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Whether the item has been picked up by the scheduler at least once
    /// since the last rewind.
    pub fn is_initialized(&self) -> bool {
        self.state.phase != Phase::Pending
    }

    pub fn is_finished(&self) -> bool {
        self.state.phase == Phase::Finished
    }

    pub fn visual(&self) -> Option<VisualHandle> {
        self.visual
    }

    pub fn deactivation_time(&self) -> f64 {
        self.activation_time + self.total_duration
    }

    /// Opacity lost per second of display. Zero-length items never fade.
    pub fn opacity_speed(&self) -> f32 {
        if self.total_duration > 0.0 {
            ((self.start_opacity - self.end_opacity) as f64 / self.total_duration) as f32
        } else {
            0.0
        }
    }

    pub fn opacity_at(&self, elapsed_sec: f64) -> f32 {
        self.start_opacity - self.opacity_speed() * elapsed_sec as f32
    }

    pub fn motion_window(&self, elapsed_sec: f64) -> MotionWindow {
        if elapsed_sec < self.delay {
            MotionWindow::Before
        } else if elapsed_sec <= self.delay + self.move_duration && self.move_duration > 0.0 {
            MotionWindow::Moving
        } else {
            MotionWindow::Settled
        }
    }

    /// Fraction of the movement completed after `elapsed_sec` on screen.
    /// A zero-length movement snaps to the end the moment the delay expires.
    pub fn motion_progress(&self, elapsed_sec: f64) -> f32 {
        match self.motion_window(elapsed_sec) {
            MotionWindow::Before => 0.0,
            MotionWindow::Moving => ((elapsed_sec - self.delay) / self.move_duration) as f32,
            MotionWindow::Settled => 1.0,
        }
    }

    pub fn position_at(&self, elapsed_sec: f64) -> Vec2 {
        self.start_pos
            .lerp(self.end_pos, self.motion_progress(elapsed_sec))
    }

    pub(crate) fn visual_spec(&self, line_height_scale: f32) -> VisualSpec {
        match &self.content {
            ItemContent::Text {
                text,
                font_size,
                color,
                family,
            } => VisualSpec::Text {
                layout: TextLayout::new(text, *font_size, line_height_scale),
                font_size: *font_size,
                fill: *color,
                outline: color.outline(),
                family: family.clone(),
            },
            ItemContent::Image { region } => VisualSpec::Sprite { region: *region },
        }
    }
}
