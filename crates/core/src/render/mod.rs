use std::collections::BTreeMap;

use crate::{comments::Rgb, scene::TextLayout, scene::Transform, OverlayError, Result};

/// Opaque reference to a visual owned by a [`RenderBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VisualHandle(u64);

impl VisualHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Rectangle inside a source image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Description of the geometry and material a backend must build.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualSpec {
    Text {
        layout: TextLayout,
        font_size: f32,
        fill: Rgb,
        outline: Rgb,
        family: Option<String>,
    },
    Sprite {
        region: PixelRect,
    },
    Point {
        color: Rgb,
    },
    Backdrop {
        width: u32,
        height: u32,
        opacity: f32,
    },
}

impl VisualSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Sprite { .. } => "sprite",
            Self::Point { .. } => "point",
            Self::Backdrop { .. } => "backdrop",
        }
    }
}

/// Capability the animation core drives every frame.
///
/// Visuals are owned exclusively by whoever created them and must be
/// destroyed exactly once, either through [`RenderBackend::destroy_visual`]
/// or implicitly by [`RenderBackend::clear_scene`].
pub trait RenderBackend {
    /// Builds the resources for a visual and adds it to the scene.
    ///
    /// Returns [`OverlayError::MissingAsset`] when a shared resource is not
    /// available yet; callers retry on a later frame.
    fn create_visual(&mut self, spec: &VisualSpec) -> Result<VisualHandle>;

    fn update_transform(&mut self, handle: VisualHandle, transform: &Transform);

    /// Removes a visual from the scene and releases its resources.
    fn destroy_visual(&mut self, handle: VisualHandle);

    /// Drops every visual at once. Outstanding handles become invalid.
    fn clear_scene(&mut self);

    fn render_frame(&mut self) -> Result<()>;
}

/// A visual tracked by [`HeadlessBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct LiveVisual {
    pub spec: VisualSpec,
    pub transform: Option<Transform>,
}

/// Frame and resource counters reported by [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub created: usize,
    pub destroyed: usize,
    pub cleared: usize,
    pub frames: usize,
    /// Calls that referenced a handle the backend no longer knows about.
    pub stale_calls: usize,
}

/// In-memory backend used for headless playback and tests. It keeps every
/// live visual with its most recent transform.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_handle: u64,
    visuals: BTreeMap<VisualHandle, LiveVisual>,
    stats: BackendStats,
    fonts_pending: bool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose text visuals fail with [`OverlayError::MissingAsset`]
    /// until [`HeadlessBackend::set_fonts_ready`] is called.
    pub fn with_pending_fonts() -> Self {
        Self {
            fonts_pending: true,
            ..Self::default()
        }
    }

    pub fn set_fonts_ready(&mut self, ready: bool) {
        self.fonts_pending = !ready;
    }

    pub fn visual(&self, handle: VisualHandle) -> Option<&LiveVisual> {
        self.visuals.get(&handle)
    }

    pub fn visuals(&self) -> impl Iterator<Item = (VisualHandle, &LiveVisual)> {
        self.visuals.iter().map(|(handle, visual)| (*handle, visual))
    }

    pub fn live_count(&self) -> usize {
        self.visuals.len()
    }

    pub fn stats(&self) -> BackendStats {
        self.stats
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_visual(&mut self, spec: &VisualSpec) -> Result<VisualHandle> {
        if self.fonts_pending && matches!(spec, VisualSpec::Text { .. }) {
            return Err(OverlayError::MissingAsset("font".to_string()));
        }

        self.next_handle += 1;
        let handle = VisualHandle::new(self.next_handle);
        self.visuals.insert(
            handle,
            LiveVisual {
                spec: spec.clone(),
                transform: None,
            },
        );
        self.stats.created += 1;
        Ok(handle)
    }

    fn update_transform(&mut self, handle: VisualHandle, transform: &Transform) {
        match self.visuals.get_mut(&handle) {
            Some(visual) => visual.transform = Some(*transform),
            None => {
                tracing::warn!(handle = handle.id(), "transform for unknown visual");
                self.stats.stale_calls += 1;
            }
        }
    }

    fn destroy_visual(&mut self, handle: VisualHandle) {
        if self.visuals.remove(&handle).is_some() {
            self.stats.destroyed += 1;
        } else {
            tracing::warn!(handle = handle.id(), "destroying unknown visual");
            self.stats.stale_calls += 1;
        }
    }

    fn clear_scene(&mut self) {
        self.stats.destroyed += self.visuals.len();
        self.stats.cleared += 1;
        self.visuals.clear();
    }

    fn render_frame(&mut self) -> Result<()> {
        self.stats.frames += 1;
        tracing::trace!(live = self.visuals.len(), "rendered frame");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Vec2;

    fn point() -> VisualSpec {
        VisualSpec::Point { color: Rgb::WHITE }
    }

    #[test]
    fn tracks_visual_lifecycle() {
        let mut backend = HeadlessBackend::new();
        let a = backend.create_visual(&point()).unwrap();
        let b = backend.create_visual(&point()).unwrap();
        assert_ne!(a, b);

        let transform = Transform::new(Vec2::new(1.0, 2.0), [0.0; 3], 0.5);
        backend.update_transform(a, &transform);
        assert_eq!(backend.visual(a).unwrap().transform, Some(transform));

        backend.destroy_visual(a);
        backend.destroy_visual(a);
        let stats = backend.stats();
        assert_eq!(backend.live_count(), 1);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.destroyed, 1);
        assert_eq!(stats.stale_calls, 1);
    }

    #[test]
    fn clearing_counts_every_live_visual() {
        let mut backend = HeadlessBackend::new();
        for _ in 0..3 {
            backend.create_visual(&point()).unwrap();
        }
        backend.clear_scene();
        backend.render_frame().unwrap();

        let stats = backend.stats();
        assert_eq!(backend.live_count(), 0);
        assert_eq!(stats.destroyed, 3);
        assert_eq!(stats.frames, 1);
    }

    #[test]
    fn text_waits_for_fonts() {
        let mut backend = HeadlessBackend::with_pending_fonts();
        let text = VisualSpec::Text {
            layout: TextLayout::new("hi", 12.0, 1.0),
            font_size: 12.0,
            fill: Rgb::WHITE,
            outline: Rgb::BLACK,
            family: None,
        };

        let err = backend.create_visual(&text).unwrap_err();
        assert!(err.is_retryable());
        assert!(backend.create_visual(&point()).is_ok());

        backend.set_fonts_ready(true);
        assert!(backend.create_visual(&text).is_ok());
    }
}
