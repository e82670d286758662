//! Timeline items and the scheduler that animates them against the media
//! clock.

mod item;
mod scheduler;

pub use item::{ItemContent, ItemState, MotionWindow, Phase, TimelineItem};
pub use scheduler::AnimationScheduler;
