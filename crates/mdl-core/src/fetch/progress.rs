//! Image-weighted, monotonic progress across the chapters of one invocation.
//!
//! Overall progress is settled images over expected images. A chapter's
//! expected count is known once its image list is discovered; until then it
//! weighs as the mean of the known counts (1 when none is known). A chapter
//! that settles before discovery counts as fully settled at that weight.
//!
//! The reported value never decreases, and the callback runs under the same
//! lock that computes it, so concurrent chapters cannot publish out of order.

use std::sync::Mutex;

use super::options::ProgressFn;

pub(crate) struct ProgressTracker {
    progress: ProgressFn,
    state: Mutex<TrackerState>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChapterProgress {
    expected: Option<usize>,
    settled: usize,
    done: bool,
}

struct TrackerState {
    chapters: Vec<ChapterProgress>,
    last: f32,
}

impl TrackerState {
    fn overall(&self) -> f32 {
        let known: Vec<usize> = self.chapters.iter().filter_map(|c| c.expected).collect();
        let placeholder = if known.is_empty() {
            1.0
        } else {
            known.iter().sum::<usize>() as f32 / known.len() as f32
        };

        let mut expected = 0.0f32;
        let mut settled = 0.0f32;
        for c in &self.chapters {
            let (weight, got) = match c.expected {
                Some(n) if c.done => (n as f32, n as f32),
                Some(n) => (n as f32, c.settled.min(n) as f32),
                None if c.done => (placeholder, placeholder),
                None => (placeholder, 0.0),
            };
            expected += weight;
            settled += got;
        }
        if expected <= 0.0 {
            return 0.0;
        }
        (settled / expected).clamp(0.0, 1.0)
    }
}

impl ProgressTracker {
    pub(crate) fn new(chapters: usize, progress: ProgressFn) -> Self {
        Self {
            progress,
            state: Mutex::new(TrackerState {
                chapters: vec![ChapterProgress::default(); chapters],
                last: 0.0,
            }),
        }
    }

    /// Chapter `idx` discovered `images` distinct images. Does not publish.
    pub(crate) fn set_expected(&self, idx: usize, images: usize) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(c) = state.chapters.get_mut(idx) {
            c.expected = Some(images);
        }
    }

    /// One image of chapter `idx` settled (saved, skipped or given up on).
    pub(crate) fn image_settled(&self, idx: usize, status: String) -> f32 {
        self.update(idx, status, |c| c.settled += 1)
    }

    /// Chapter `idx` is done (success or failure).
    pub(crate) fn settle(&self, idx: usize, status: String) -> f32 {
        self.update(idx, status, |c| c.done = true)
    }

    fn update(&self, idx: usize, status: String, f: impl FnOnce(&mut ChapterProgress)) -> f32 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(c) = state.chapters.get_mut(idx) {
            f(c);
        }
        let overall = state.overall();
        state.last = state.last.max(overall);
        let value = state.last;
        (self.progress)(value, status);
        value
    }
}
