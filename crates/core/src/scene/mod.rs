use serde::{Deserialize, Serialize};

use crate::config::ViewportConfig;

/// A point or displacement in two dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Linear interpolation, `t == 0` yields `self` and `t == 1` yields `other`
    /// exactly.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        if t >= 1.0 {
            return other;
        }
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

/// Static rotation in degrees as authored in the comment stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub y: f32,
    pub z: f32,
}

impl Rotation {
    pub const fn new(y: f32, z: f32) -> Self {
        Self { y, z }
    }

    /// Scene rotation in radians, XZY order. Authored angles turn the
    /// opposite way from the scene's axes, hence the negation.
    pub fn to_scene_radians(self) -> [f32; 3] {
        [0.0, -self.y.to_radians(), -self.z.to_radians()]
    }
}

/// Everything the render backend learns about a visual on a given frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Scene coordinates, origin at the center, y pointing up.
    pub position: Vec2,
    /// Euler angles in radians, applied in XZY order.
    pub rotation: [f32; 3],
    /// Always within `[0, 1]`.
    pub opacity: f32,
}

impl Transform {
    pub fn new(position: Vec2, rotation: [f32; 3], opacity: f32) -> Self {
        Self {
            position,
            rotation,
            opacity: clamp_opacity(opacity),
        }
    }
}

/// Opacity values drift below zero when items overshoot their lifetime. The
/// render boundary is the only place they get clamped.
pub fn clamp_opacity(opacity: f32) -> f32 {
    if opacity.is_nan() {
        0.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

/// Maps authored item coordinates (origin top-left, y down) into the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn to_scene(&self, point: Vec2) -> Vec2 {
        Vec2 {
            x: -self.width / 2.0 + point.x,
            y: self.height / 2.0 - point.y,
        }
    }
}

impl From<&ViewportConfig> for Viewport {
    fn from(config: &ViewportConfig) -> Self {
        Self::new(config.width, config.height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::from(&ViewportConfig::default())
    }
}

/// One laid out line of a text visual.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Offset from the visual's anchor; lines stack downwards.
    pub offset_y: f32,
}

/// Stacks the lines of a comment one below the other.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<TextLine>,
    pub line_height: f32,
}

impl TextLayout {
    pub fn new(text: &str, font_size: f32, line_height_scale: f32) -> Self {
        let line_height = font_size * line_height_scale;
        let lines = text
            .split(crate::comments::LINE_BREAK)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(index, line)| TextLine {
                text: line.to_string(),
                offset_y: -line_height * (index as f32 + 1.0),
            })
            .collect();

        Self { lines, line_height }
    }

    pub fn height(&self) -> f32 {
        self.line_height * self.lines.len() as f32
    }
}
