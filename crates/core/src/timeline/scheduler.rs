use crate::{
    comments::Comment,
    config::ViewportConfig,
    render::RenderBackend,
    scene::{Transform, Viewport},
};

use super::{ItemState, Phase, TimelineItem};

/// Drives every [`TimelineItem`] against the media clock.
///
/// The scheduler is the only owner of item state. Backends receive derived
/// transforms and never look into the item collection.
#[derive(Debug)]
pub struct AnimationScheduler {
    items: Vec<TimelineItem>,
    viewport: Viewport,
    line_height_scale: f32,
}

impl AnimationScheduler {
    pub fn new(mut items: Vec<TimelineItem>, viewport: Viewport) -> Self {
        items.sort_by(|a, b| a.activation_time.total_cmp(&b.activation_time));
        Self {
            items,
            viewport,
            line_height_scale: 1.0,
        }
    }

    pub fn from_comments(comments: &[Comment], viewport: &ViewportConfig) -> Self {
        let items = comments.iter().map(TimelineItem::from_comment).collect();
        Self::new(items, Viewport::from(viewport)).with_line_height_scale(viewport.line_height_scale)
    }

    pub fn with_line_height_scale(mut self, scale: f32) -> Self {
        self.line_height_scale = scale;
        self
    }

    pub fn items(&self) -> &[TimelineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.count(Phase::Active)
    }

    pub fn finished_count(&self) -> usize {
        self.count(Phase::Finished)
    }

    /// Media time after which no item will ever be visible again.
    pub fn end_time(&self) -> f64 {
        self.items
            .iter()
            .map(TimelineItem::deactivation_time)
            .fold(0.0, f64::max)
    }

    /// Moves every due item forward by `elapsed_ms` of display time.
    ///
    /// `clock_time` is the media position in seconds and decides which items
    /// are due; `elapsed_ms` is the wall time since the previous frame.
    pub fn advance(&mut self, clock_time: f64, elapsed_ms: f64, backend: &mut dyn RenderBackend) {
        let elapsed_ms = elapsed_ms.max(0.0);

        for index in 0..self.items.len() {
            let item = &mut self.items[index];
            if item.is_finished() || clock_time < item.activation_time {
                continue;
            }

            if item.state.phase == Phase::Pending {
                item.state = ItemState {
                    phase: Phase::Active,
                    opacity: item.start_opacity,
                    position: item.start_pos,
                    elapsed_shown_ms: 0.0,
                };
                tracing::debug!(index, activation = item.activation_time, "item activated");
            }

            item.state.opacity -= item.opacity_speed() * (elapsed_ms / 1000.0) as f32;
            item.state.elapsed_shown_ms += elapsed_ms;
            let elapsed_sec = item.state.elapsed_shown_ms / 1000.0;

            if elapsed_sec >= item.total_duration {
                finish(item, backend);
                tracing::debug!(index, "item finished");
                continue;
            }

            // Derived from the shown time rather than accumulated, so the
            // settled position is exactly `end_pos` and never drifts.
            item.state.position = item.position_at(elapsed_sec);
            self.present(index, backend);
        }
    }

    /// Rebuilds every item from the absolute media position, for use after a
    /// seek. The backend scene is cleared first; items still on screen at
    /// `current_time` get fresh visuals.
    ///
    /// The resulting item state depends only on `current_time`.
    pub fn reset(&mut self, current_time: f64, backend: &mut dyn RenderBackend) {
        backend.clear_scene();

        for index in 0..self.items.len() {
            let item = &mut self.items[index];
            item.visual = None;

            if current_time < item.activation_time {
                item.state = ItemState::default();
            } else if current_time <= item.deactivation_time() {
                let elapsed_sec = current_time - item.activation_time;
                item.state = ItemState {
                    phase: Phase::Active,
                    opacity: item.opacity_at(elapsed_sec),
                    position: item.position_at(elapsed_sec),
                    elapsed_shown_ms: elapsed_sec * 1000.0,
                };
                self.present(index, backend);
            } else {
                item.state = ItemState {
                    phase: Phase::Finished,
                    opacity: item.opacity_at(item.total_duration),
                    position: item.end_pos,
                    elapsed_shown_ms: item.total_duration * 1000.0,
                };
            }
        }

        tracing::info!(
            current_time,
            active = self.active_count(),
            finished = self.finished_count(),
            "timeline reset"
        );
    }

    /// Destroys every visual while keeping item state, e.g. when the overlay
    /// is hidden. Active items rebuild their visuals on the next frame.
    pub fn release_visuals(&mut self, backend: &mut dyn RenderBackend) {
        for item in &mut self.items {
            if let Some(handle) = item.visual.take() {
                backend.destroy_visual(handle);
            }
        }
    }

    /// Pushes the item's current state to the backend, creating its visual
    /// first when it has none. A missing shared asset only costs this frame.
    fn present(&mut self, index: usize, backend: &mut dyn RenderBackend) {
        let scale = self.line_height_scale;
        let item = &mut self.items[index];

        let handle = match item.visual {
            Some(handle) => handle,
            None => match backend.create_visual(&item.visual_spec(scale)) {
                Ok(handle) => *item.visual.insert(handle),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(index, %err, "deferring item until its assets load");
                    return;
                }
                Err(err) => {
                    tracing::error!(index, %err, "dropping item that cannot be rendered");
                    item.state.phase = Phase::Finished;
                    return;
                }
            },
        };

        let transform = Transform::new(
            self.viewport.to_scene(item.state.position),
            item.rotation.to_scene_radians(),
            item.state.opacity,
        );
        backend.update_transform(handle, &transform);
    }

    fn count(&self, phase: Phase) -> usize {
        self.items.iter().filter(|item| item.phase() == phase).count()
    }
}

fn finish(item: &mut TimelineItem, backend: &mut dyn RenderBackend) {
    item.state.phase = Phase::Finished;
    item.state.elapsed_shown_ms = item.total_duration * 1000.0;
    if let Some(handle) = item.visual.take() {
        backend.destroy_visual(handle);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        render::{HeadlessBackend, PixelRect, VisualSpec},
        scene::{Rotation, Vec2},
    };

    fn scenario_item() -> TimelineItem {
        TimelineItem::text(2.0, 4.0, "scenario").with_motion(
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
            0.0,
            1.0,
        )
    }

    fn scheduler(items: Vec<TimelineItem>) -> AnimationScheduler {
        AnimationScheduler::new(items, Viewport::new(800.0, 600.0))
    }

    fn states(scheduler: &AnimationScheduler) -> Vec<ItemState> {
        scheduler.items().iter().map(|item| *item.state()).collect()
    }

    fn mixed_items() -> Vec<TimelineItem> {
        vec![
            scenario_item().with_opacity(1.0, 0.0),
            TimelineItem::text(0.5, 1.0, "early").with_opacity(0.8, 0.1),
            TimelineItem::text(5.0, 3.0, "late")
                .with_motion(Vec2::new(10.0, 10.0), Vec2::new(-30.0, 40.0), 0.7, 1.3)
                .with_rotation(Rotation::new(15.0, -30.0)),
            TimelineItem::text(3.0, 0.0, "blink"),
        ]
    }

    #[test]
    fn reset_interpolates_inside_motion_window() {
        let mut scheduler = scheduler(vec![scenario_item()]);
        let mut backend = HeadlessBackend::new();

        scheduler.reset(2.5, &mut backend);
        let item = &scheduler.items()[0];
        assert_eq!(item.phase(), Phase::Active);
        assert_eq!(item.state().position.x, 50.0);
        assert_eq!(item.state().elapsed_shown_ms, 500.0);

        scheduler.reset(3.5, &mut backend);
        assert_eq!(scheduler.items()[0].state().position.x, 100.0);
        assert_eq!(backend.live_count(), 1);
    }

    #[test]
    fn advance_interpolates_and_then_snaps() {
        let mut scheduler = scheduler(vec![scenario_item()]);
        let mut backend = HeadlessBackend::new();

        scheduler.advance(1.9, 100.0, &mut backend);
        assert_eq!(scheduler.items()[0].phase(), Phase::Pending);
        assert_eq!(backend.live_count(), 0);

        scheduler.advance(2.0, 0.0, &mut backend);
        scheduler.advance(2.25, 250.0, &mut backend);
        scheduler.advance(2.5, 250.0, &mut backend);
        assert_eq!(scheduler.items()[0].state().position.x, 50.0);

        scheduler.advance(3.5, 1000.0, &mut backend);
        assert_eq!(scheduler.items()[0].state().position.x, 100.0);
        scheduler.advance(3.6, 100.0, &mut backend);
        assert_eq!(scheduler.items()[0].state().position.x, 100.0);

        let handle = scheduler.items()[0].visual().unwrap();
        let transform = backend.visual(handle).unwrap().transform.unwrap();
        // 800x600 viewport: item x 100 maps to -400 + 100.
        assert_eq!(transform.position, Vec2::new(-300.0, 300.0));
    }

    #[test]
    fn finishing_releases_the_visual_once() {
        let mut scheduler = scheduler(vec![scenario_item()]);
        let mut backend = HeadlessBackend::new();

        scheduler.advance(2.0, 0.0, &mut backend);
        assert_eq!(backend.live_count(), 1);
        scheduler.advance(6.0, 4000.0, &mut backend);
        scheduler.advance(6.5, 500.0, &mut backend);

        let item = &scheduler.items()[0];
        assert!(item.is_finished());
        assert!(item.visual().is_none());
        assert_eq!(item.state().elapsed_shown_ms, 4000.0);
        let stats = backend.stats();
        assert_eq!((stats.created, stats.destroyed, stats.stale_calls), (1, 1, 0));
    }

    #[test]
    fn zero_duration_item_finishes_on_activation_tick() {
        let mut scheduler = scheduler(vec![TimelineItem::text(1.0, 0.0, "blink")]);
        let mut backend = HeadlessBackend::new();

        scheduler.advance(1.0, 16.0, &mut backend);
        assert!(scheduler.items()[0].is_finished());
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn opacity_is_not_clamped_by_the_scheduler() {
        let item = TimelineItem::text(0.0, 1.0, "fade").with_opacity(0.2, -0.4);
        let mut scheduler = scheduler(vec![item]);
        let mut backend = HeadlessBackend::new();

        scheduler.advance(0.0, 0.0, &mut backend);
        scheduler.advance(0.9, 900.0, &mut backend);
        let opacity = scheduler.items()[0].state().opacity;
        assert!((opacity + 0.34).abs() < 1e-5);

        let handle = scheduler.items()[0].visual().unwrap();
        let rendered = backend.visual(handle).unwrap().transform.unwrap().opacity;
        assert_eq!(rendered, 0.0);
    }

    #[test]
    fn reset_classifies_items_by_absolute_time() {
        let mut scheduler = scheduler(mixed_items());
        let mut backend = HeadlessBackend::new();

        scheduler.reset(4.0, &mut backend);
        let phases: Vec<Phase> = scheduler.items().iter().map(TimelineItem::phase).collect();
        // Sorted by activation: early(0.5), scenario(2.0), blink(3.0), late(5.0).
        assert_eq!(
            phases,
            vec![Phase::Finished, Phase::Active, Phase::Finished, Phase::Pending]
        );
        assert_eq!(backend.live_count(), 1);
        assert_eq!(scheduler.items()[0].state().elapsed_shown_ms, 1000.0);
    }

    #[test]
    fn reset_is_idempotent_and_history_free() {
        let mut scheduler = scheduler(mixed_items());
        let mut backend = HeadlessBackend::new();

        scheduler.reset(2.3, &mut backend);
        let first = states(&scheduler);
        scheduler.reset(2.3, &mut backend);
        assert_eq!(states(&scheduler), first);

        scheduler.advance(3.0, 700.0, &mut backend);
        scheduler.reset(7.1, &mut backend);
        scheduler.reset(2.3, &mut backend);
        assert_eq!(states(&scheduler), first);
        assert_eq!(backend.live_count(), scheduler.active_count());
    }

    #[test]
    fn deferred_visual_is_created_once_assets_load() {
        let mut scheduler = scheduler(vec![scenario_item()]);
        let mut backend = HeadlessBackend::with_pending_fonts();

        scheduler.advance(2.0, 0.0, &mut backend);
        scheduler.advance(2.1, 100.0, &mut backend);
        assert!(scheduler.items()[0].visual().is_none());
        assert_eq!(scheduler.items()[0].phase(), Phase::Active);

        backend.set_fonts_ready(true);
        scheduler.advance(2.2, 100.0, &mut backend);
        assert!(scheduler.items()[0].visual().is_some());
        assert_eq!(scheduler.items()[0].state().elapsed_shown_ms, 200.0);
    }

    #[test]
    fn released_visuals_are_rebuilt_on_next_frame() {
        let mut scheduler = scheduler(vec![scenario_item()]);
        let mut backend = HeadlessBackend::new();

        scheduler.advance(2.0, 0.0, &mut backend);
        scheduler.release_visuals(&mut backend);
        assert_eq!(backend.live_count(), 0);

        scheduler.advance(2.1, 100.0, &mut backend);
        assert_eq!(backend.live_count(), 1);
        assert_eq!(backend.stats().stale_calls, 0);
    }

    #[test]
    fn image_items_render_as_sprites() {
        let region = PixelRect::new(16, 8, 32, 32);
        let item = TimelineItem::image(1.0, 2.0, region)
            .with_motion(Vec2::new(0.0, 0.0), Vec2::new(40.0, 20.0), 0.0, 1.0)
            .with_opacity(1.0, 0.0);
        let mut scheduler = scheduler(vec![item]);
        let mut backend = HeadlessBackend::new();

        scheduler.advance(1.0, 0.0, &mut backend);
        scheduler.advance(1.5, 500.0, &mut backend);
        let handle = scheduler.items()[0].visual().unwrap();
        let visual = backend.visual(handle).unwrap();
        assert_eq!(visual.spec, VisualSpec::Sprite { region });
        let transform = visual.transform.unwrap();
        assert_eq!(transform.position, Vec2::new(-380.0, 290.0));
        assert!((transform.opacity - 0.75).abs() < 1e-6);

        scheduler.advance(3.0, 1500.0, &mut backend);
        assert!(scheduler.items()[0].is_finished());
        assert_eq!(backend.live_count(), 0);
        assert_eq!(backend.stats().destroyed, 1);
    }

    proptest! {
        #[test]
        fn opacity_converges_regardless_of_tick_size(
            total_ms in 1.0f64..3500.0,
            coarse in 1usize..8,
            fine in 8usize..200,
        ) {
            let item = || {
                TimelineItem::text(0.0, 4.0, "fade").with_opacity(1.0, 0.0)
            };
            let mut backend = HeadlessBackend::new();

            let run = |ticks: usize, backend: &mut HeadlessBackend| {
                let mut scheduler = scheduler(vec![item()]);
                scheduler.advance(0.0, 0.0, backend);
                let step = total_ms / ticks as f64;
                for tick in 1..=ticks {
                    scheduler.advance(step * tick as f64 / 1000.0, step, backend);
                }
                scheduler.items()[0].state().opacity
            };

            let coarse_opacity = run(coarse, &mut backend);
            let fine_opacity = run(fine, &mut backend);
            let expected = item().opacity_at(total_ms / 1000.0);
            prop_assert!((coarse_opacity - fine_opacity).abs() < 1e-4);
            prop_assert!((coarse_opacity - expected).abs() < 1e-4);
        }

        #[test]
        fn reset_depends_only_on_target_time(
            first in 0.0f64..10.0,
            detour in 0.0f64..10.0,
        ) {
            let mut scheduler = scheduler(mixed_items());
            let mut backend = HeadlessBackend::new();

            scheduler.reset(first, &mut backend);
            let expected = states(&scheduler);
            scheduler.reset(detour, &mut backend);
            scheduler.reset(first, &mut backend);
            prop_assert_eq!(states(&scheduler), expected);

            for item in scheduler.items() {
                if item.activation_time > first {
                    prop_assert_eq!(item.phase(), Phase::Pending);
                }
                if first > item.deactivation_time() {
                    prop_assert!(item.is_finished());
                }
            }
        }
    }
}
