use crate::types::{FsEvent, FsEventKind};
use ahash::AHashMap;
use std::path::PathBuf;

/// Deterministic coalescing of raw watch events.
///
/// One window opens per path at the first raw event and closes `window_ms`
/// later; every raw event for that path inside the window folds into it.
/// Resolution on close: create then delete cancels to nothing; any sequence
/// ending in delete reports delete; delete then recreate reports modify;
/// otherwise the first observed kind wins. Repeats of one kind collapse to a
/// single event.
///
/// The machine never reads a clock. Callers pass `now_ms` (wall clock in the
/// watch runtime, a plain counter in tests), so coalescing is testable
/// without real filesystem timing.
pub struct EventDebouncer {
    window_ms: u64,
    pending: AHashMap<PathBuf, Window>,
    ready: Vec<(u64, FsEvent)>,
}

struct Window {
    first: FsEventKind,
    last: FsEventKind,
    is_dir: bool,
    opened_ms: u64,
    last_seen_ms: u64,
}

impl Window {
    fn open(kind: FsEventKind, is_dir: bool, now_ms: u64) -> Self {
        Window {
            first: kind,
            last: kind,
            is_dir,
            opened_ms: now_ms,
            last_seen_ms: now_ms,
        }
    }

    fn expired(&self, window_ms: u64, now_ms: u64) -> bool {
        now_ms >= self.opened_ms + window_ms
    }

    fn resolve(self, path: PathBuf) -> Option<(u64, FsEvent)> {
        let kind = match (self.first, self.last) {
            (FsEventKind::Create, FsEventKind::Delete) => return None,
            (_, FsEventKind::Delete) => FsEventKind::Delete,
            (FsEventKind::Delete, _) => FsEventKind::Modify,
            (first, _) => first,
        };
        Some((
            self.opened_ms,
            FsEvent {
                kind,
                path,
                is_dir: self.is_dir,
                timestamp_ms: self.last_seen_ms,
            },
        ))
    }
}

impl EventDebouncer {
    pub fn new(window_ms: u64) -> Self {
        EventDebouncer {
            window_ms,
            pending: AHashMap::new(),
            ready: Vec::new(),
        }
    }

    /// Folds one raw event in at `now_ms`. An expired window for the same
    /// path is resolved first, then a fresh one opens.
    pub fn record(&mut self, path: PathBuf, kind: FsEventKind, is_dir: bool, now_ms: u64) {
        match self.pending.get_mut(&path) {
            Some(window) if window.expired(self.window_ms, now_ms) => {
                let closed = std::mem::replace(window, Window::open(kind, is_dir, now_ms));
                if let Some(resolved) = closed.resolve(path) {
                    self.ready.push(resolved);
                }
            }
            Some(window) => {
                window.last = kind;
                window.is_dir |= is_dir;
                window.last_seen_ms = now_ms;
            }
            None => {
                self.pending.insert(path, Window::open(kind, is_dir, now_ms));
            }
        }
    }

    /// Resolves every window closed by `now_ms` and returns the events in
    /// FIFO order of window opening.
    pub fn drain_ready(&mut self, now_ms: u64) -> Vec<FsEvent> {
        let window_ms = self.window_ms;
        let expired: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, w)| w.expired(window_ms, now_ms))
            .map(|(p, _)| p.clone())
            .collect();
        for path in expired {
            if let Some(window) = self.pending.remove(&path)
                && let Some(resolved) = window.resolve(path)
            {
                self.ready.push(resolved);
            }
        }

        self.ready.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.path.cmp(&b.1.path)));
        std::mem::take(&mut self.ready)
            .into_iter()
            .map(|(_, event)| event)
            .collect()
    }
}
