//! Incremental chapter windowing for the continuous-scroll reader.
//!
//! The window decides how many leading chapters are rendered and which one
//! is centered in the viewport. It never touches a clock or a view itself:
//! callers pass the current `Instant` in, apply the returned effects, and
//! call [`ChapterWindow::poll`] once [`ChapterWindow::next_deadline`] passes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Chapters rendered when a book is loaded.
    pub initial_chapters: usize,
    /// Remaining scroll distance below which one more chapter is loaded.
    pub prefetch_distance: f64,
    pub growth_delay_ms: u64,
    /// Wait after a jump before scrolling, so layout can settle.
    pub jump_settle_ms: u64,
    /// Fraction of the viewport excluded at the top and at the bottom when
    /// deciding which chapter is visible.
    pub central_band_margin: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            initial_chapters: 3,
            prefetch_distance: 800.0,
            growth_delay_ms: 300,
            jump_settle_ms: 100,
            central_band_margin: 0.2,
        }
    }
}

impl WindowConfig {
    pub fn growth_delay(&self) -> Duration {
        Duration::from_millis(self.growth_delay_ms)
    }

    pub fn jump_settle(&self) -> Duration {
        Duration::from_millis(self.jump_settle_ms)
    }
}

/// Scroll position of the reader container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn distance_to_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }
}

/// A rendered chapter container's vertical extent relative to the viewport
/// top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChapterBounds {
    pub index: usize,
    pub top: f64,
    pub bottom: f64,
}

/// Work the view layer has to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEffect {
    /// Render chapters `0..count`.
    LoadedCountChanged(usize),
    VisibleChapterChanged(usize),
    /// Smooth-scroll the chapter's container so its top meets the viewport
    /// top.
    ScrollToChapter(usize),
}

#[derive(Debug, Clone)]
pub struct ChapterWindow {
    config: WindowConfig,
    total: usize,
    loaded: usize,
    visible: usize,
    /// Chapters whose containers are mounted and observed.
    mounted: BTreeSet<usize>,
    growth_due: Option<Instant>,
    jump_due: Option<(usize, Instant)>,
}

impl ChapterWindow {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            total: 0,
            loaded: 0,
            visible: 0,
            mounted: BTreeSet::new(),
            growth_due: None,
            jump_due: None,
        }
    }

    /// Reset for a newly opened book with `total` chapters.
    pub fn load_content(&mut self, total: usize) -> Vec<WindowEffect> {
        self.teardown();
        self.total = total;
        self.loaded = self.config.initial_chapters.min(total);
        self.visible = 0;
        info!(total, loaded = self.loaded, "Loaded chapter window");
        vec![
            WindowEffect::LoadedCountChanged(self.loaded),
            WindowEffect::VisibleChapterChanged(0),
        ]
    }

    /// Schedule one more chapter when the viewport nears the end of the
    /// rendered content. Ignored while a growth step is already pending.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, now: Instant) {
        if self.growth_due.is_some() {
            return;
        }
        if metrics.distance_to_bottom() < self.config.prefetch_distance && self.loaded < self.total {
            let due = now + self.config.growth_delay();
            self.growth_due = Some(due);
            debug!(
                loaded = self.loaded,
                remaining = metrics.distance_to_bottom(),
                "Scheduled chapter growth"
            );
        }
    }

    /// Fire every scheduled step whose deadline is at or before `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<WindowEffect> {
        let mut effects = Vec::new();

        if let Some(due) = self.growth_due {
            if due <= now {
                self.growth_due = None;
                let next = (self.loaded + 1).min(self.total);
                if next != self.loaded {
                    self.loaded = next;
                    debug!(loaded = next, "Grew chapter window");
                    effects.push(WindowEffect::LoadedCountChanged(next));
                }
            }
        }

        if let Some((index, due)) = self.jump_due {
            if due <= now {
                self.jump_due = None;
                if self.mounted.contains(&index) {
                    effects.push(WindowEffect::ScrollToChapter(index));
                } else {
                    warn!(chapter = index, "Jump target has no mounted view");
                }
            }
        }

        effects
    }

    /// Update the visible chapter from the containers currently intersecting
    /// the viewport of height `viewport_height`.
    ///
    /// Only the central band counts. When several chapters qualify the lowest
    /// index wins.
    pub fn on_intersections(&mut self, entries: &[ChapterBounds], viewport_height: f64) -> Option<WindowEffect> {
        let margin = viewport_height * self.config.central_band_margin;
        let band_top = margin;
        let band_bottom = viewport_height - margin;

        let hit = entries
            .iter()
            .filter(|entry| entry.index < self.loaded)
            .filter(|entry| entry.bottom > band_top && entry.top < band_bottom)
            .map(|entry| entry.index)
            .min()?;

        if hit == self.visible {
            return None;
        }
        self.visible = hit;
        debug!(chapter = hit, "Visible chapter changed");
        Some(WindowEffect::VisibleChapterChanged(hit))
    }

    /// Render through `target` immediately and scroll to it once layout has
    /// settled. Out-of-range targets and empty books are ignored.
    pub fn jump_to(&mut self, target: usize, now: Instant) -> Vec<WindowEffect> {
        if self.total == 0 || target >= self.total {
            debug!(target, total = self.total, "Ignoring jump");
            return Vec::new();
        }

        let mut effects = Vec::new();
        if target >= self.loaded {
            self.loaded = target + 1;
            effects.push(WindowEffect::LoadedCountChanged(self.loaded));
        }
        self.jump_due = Some((target, now + self.config.jump_settle()));
        info!(target, loaded = self.loaded, "Jumping to chapter");
        effects
    }

    pub fn register_chapter_view(&mut self, index: usize) {
        if index < self.loaded {
            self.mounted.insert(index);
        }
    }

    /// Disarm pending timers and forget mounted views.
    pub fn teardown(&mut self) {
        self.growth_due = None;
        self.jump_due = None;
        self.mounted.clear();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let jump = self.jump_due.map(|(_, due)| due);
        match (self.growth_due, jump) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn total_chapters(&self) -> usize {
        self.total
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded
    }

    pub fn visible_chapter(&self) -> usize {
        self.visible
    }

    pub fn is_growth_pending(&self) -> bool {
        self.growth_due.is_some()
    }

    /// Every chapter is rendered.
    pub fn is_complete(&self) -> bool {
        self.loaded >= self.total
    }

    /// Fill fraction for the progress bar.
    pub fn progress_fraction(&self) -> f64 {
        (self.visible + 1) as f64 / self.total.max(1) as f64
    }

    pub fn indicator_label(&self) -> String {
        format!("Chapter {} / {}", self.visible + 1, self.total)
    }

    /// Shown next to the indicator until the whole book is rendered.
    pub fn loaded_hint(&self) -> Option<String> {
        (!self.is_complete()).then(|| format!("{} chapters loaded", self.loaded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_window(total: usize) -> ChapterWindow {
        let mut window = ChapterWindow::new(WindowConfig::default());
        window.load_content(total);
        window
    }

    fn near_bottom() -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: 4_500.0,
            scroll_height: 6_000.0,
            client_height: 1_000.0,
        }
    }

    #[test]
    fn test_initial_window() {
        assert_eq!(open_window(10).loaded_count(), 3);
        assert_eq!(open_window(2).loaded_count(), 2);
        assert_eq!(open_window(0).loaded_count(), 0);
        assert_eq!(open_window(10).visible_chapter(), 0);
    }

    #[test]
    fn test_jump_loads_through_target_without_growth() {
        let now = Instant::now();
        let mut window = open_window(10);

        let effects = window.jump_to(7, now);

        assert_eq!(effects, vec![WindowEffect::LoadedCountChanged(8)]);
        assert_eq!(window.loaded_count(), 8);
        assert!(!window.is_growth_pending());
    }

    #[test]
    fn test_jump_scrolls_after_settle() {
        let now = Instant::now();
        let mut window = open_window(10);
        window.jump_to(5, now);
        window.register_chapter_view(5);

        assert!(window.poll(now + Duration::from_millis(50)).is_empty());
        assert_eq!(
            window.poll(now + Duration::from_millis(100)),
            vec![WindowEffect::ScrollToChapter(5)]
        );
        assert_eq!(window.next_deadline(), None);
    }

    #[test]
    fn test_jump_within_loaded_keeps_count() {
        let now = Instant::now();
        let mut window = open_window(10);
        assert!(window.jump_to(1, now).is_empty());
        assert_eq!(window.loaded_count(), 3);
        assert!(window.next_deadline().is_some());
    }

    #[test]
    fn test_out_of_range_jump_is_ignored() {
        let now = Instant::now();
        let mut window = open_window(4);
        assert!(window.jump_to(4, now).is_empty());
        assert_eq!(window.loaded_count(), 3);
        assert_eq!(window.next_deadline(), None);

        let mut empty = open_window(0);
        assert!(empty.jump_to(0, now).is_empty());
    }

    #[test]
    fn test_scroll_growth_is_single_step_and_debounced() {
        let now = Instant::now();
        let mut window = open_window(10);

        window.on_scroll(near_bottom(), now);
        window.on_scroll(near_bottom(), now + Duration::from_millis(10));
        assert!(window.is_growth_pending());
        assert_eq!(window.next_deadline(), Some(now + Duration::from_millis(300)));

        assert!(window.poll(now + Duration::from_millis(299)).is_empty());
        assert_eq!(
            window.poll(now + Duration::from_millis(300)),
            vec![WindowEffect::LoadedCountChanged(4)]
        );
        assert!(!window.is_growth_pending());
    }

    #[test]
    fn test_no_growth_far_from_bottom_or_when_complete() {
        let now = Instant::now();
        let mut window = open_window(10);
        window.on_scroll(
            ScrollMetrics {
                scroll_top: 0.0,
                scroll_height: 6_000.0,
                client_height: 1_000.0,
            },
            now,
        );
        assert!(!window.is_growth_pending());

        let mut short = open_window(3);
        short.on_scroll(near_bottom(), now);
        assert!(!short.is_growth_pending());
        assert!(short.is_complete());
    }

    #[test]
    fn test_visibility_uses_central_band_and_lowest_index() {
        let mut window = open_window(10);
        let entries = [
            // Only inside the excluded top 20%.
            ChapterBounds { index: 0, top: -500.0, bottom: 150.0 },
            ChapterBounds { index: 2, top: 600.0, bottom: 1_400.0 },
            ChapterBounds { index: 1, top: 150.0, bottom: 600.0 },
        ];

        let effect = window.on_intersections(&entries, 1_000.0);

        assert_eq!(effect, Some(WindowEffect::VisibleChapterChanged(1)));
        assert_eq!(window.on_intersections(&entries, 1_000.0), None);
        assert_eq!(window.indicator_label(), "Chapter 2 / 10");
        assert!((window.progress_fraction() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unloaded_chapters_do_not_become_visible() {
        let mut window = open_window(10);
        let entries = [ChapterBounds { index: 6, top: 0.0, bottom: 1_000.0 }];
        assert_eq!(window.on_intersections(&entries, 1_000.0), None);
        assert_eq!(window.visible_chapter(), 0);
    }

    #[test]
    fn test_load_content_resets_state() {
        let now = Instant::now();
        let mut window = open_window(10);
        window.jump_to(8, now);
        window.register_chapter_view(8);
        window.on_scroll(near_bottom(), now);

        window.load_content(5);

        assert_eq!(window.loaded_count(), 3);
        assert_eq!(window.visible_chapter(), 0);
        assert_eq!(window.next_deadline(), None);
        assert!(window.poll(now + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_teardown_disarms_timers() {
        let now = Instant::now();
        let mut window = open_window(10);
        window.on_scroll(near_bottom(), now);
        window.teardown();
        assert!(window.poll(now + Duration::from_secs(1)).is_empty());
        assert_eq!(window.loaded_count(), 3);
    }

    #[test]
    fn test_loaded_hint() {
        let now = Instant::now();
        let mut window = open_window(4);
        assert_eq!(window.loaded_hint().as_deref(), Some("3 chapters loaded"));
        window.jump_to(3, now);
        assert_eq!(window.loaded_hint(), None);
    }
}
