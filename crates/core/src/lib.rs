//! Core library for the Danmaku Overlay player.
//!
//! The crate turns a stream of advanced danmaku comments, or a still image,
//! into per-frame transforms for a rendering backend. Each module owns one
//! concern: comment ingestion, the media clock, the timeline scheduler, the
//! particle dissolve, and the frame driver that ties them together. Rendering
//! itself stays behind the [`RenderBackend`] trait.

pub mod assets;
pub mod clock;
pub mod comments;
pub mod config;
pub mod error;
pub mod particles;
pub mod playback;
pub mod render;
pub mod scene;
pub mod timeline;

pub use assets::{AssetStore, DEFAULT_FONT};
pub use clock::{FrameTimer, InstantTimer, ManualTimer, MediaClock, MediaEvent, MediaSource, SimulatedMedia};
pub use comments::{load_comments, parse_document, parse_records, Comment, RawComment, Rgb};
pub use config::{AppConfig, ParticleConfig, ViewportConfig};
pub use error::{OverlayError, Result};
pub use particles::{decompose, Decomposition, ParticleField, ParticlePoint};
pub use playback::{format_timestamp, Animator, FrameOutcome, PlaybackStatus, Player, Startup};
pub use render::{HeadlessBackend, PixelRect, RenderBackend, VisualHandle, VisualSpec};
pub use scene::{Rotation, Transform, Vec2, Viewport};
pub use timeline::{AnimationScheduler, Phase, TimelineItem};
