use crate::debounce::EventDebouncer;
use crate::error::{Error, Result};
use crate::index::WorkspaceIndex;
use crate::path_utils::canonicalize;
use crate::types::{FsEvent, FsEventKind, WatchConfig, WatchHandle, WatchId};
use ahash::AHashMap;
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Process-wide so ids stay unique even across registries.
static NEXT_WATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Owns every active watch. Starting registers an OS watch plus a background
/// drain task; polling hands out debounced events; stopping tears the task
/// down before returning. Optionally keeps a `WorkspaceIndex` patched from
/// the same event stream.
pub struct WatchRegistry {
    watches: Mutex<AHashMap<WatchId, WatchEntry>>,
    index: Option<Arc<WorkspaceIndex>>,
}

struct WatchEntry {
    handle: WatchHandle,
    runtime: ChangeWatcher,
}

/// Per-handle runtime: the OS watcher and the thread that turns its raw
/// stream into debounced events. The buffer is shared with pollers; the
/// thread is the only writer.
struct ChangeWatcher {
    watcher: Option<RecommendedWatcher>,
    thread: Option<JoinHandle<()>>,
    buffer: Arc<Mutex<Vec<FsEvent>>>,
}

impl ChangeWatcher {
    /// Drops the OS watcher, which disconnects the event channel; the drain
    /// thread exits on its next tick and is joined before this returns.
    fn shutdown(&mut self) {
        self.watcher.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.buffer.lock().clear();
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchRegistry {
    pub fn new() -> Self {
        WatchRegistry {
            watches: Mutex::new(AHashMap::new()),
            index: None,
        }
    }

    /// A registry that also applies every debounced event to `index`.
    pub fn with_index(index: Arc<WorkspaceIndex>) -> Self {
        WatchRegistry {
            watches: Mutex::new(AHashMap::new()),
            index: Some(index),
        }
    }

    /// Starts watching `path`. Fails with `NotFound` when the path does not
    /// exist and `ResourceExhausted` when the OS watch-descriptor limit is
    /// hit; existing watches are unaffected by either.
    pub fn start_watching(&self, path: &Path, config: WatchConfig) -> Result<WatchHandle> {
        let path = canonicalize(path).map_err(|_| Error::NotFound(path.to_path_buf()))?;
        let ignore = build_ignore_set(&config.ignore_globs);

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |result| {
                let _ = tx.send(result);
            },
            notify::Config::default(),
        )?;
        let mode = if config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&path, mode)?;

        let id = WatchId(NEXT_WATCH_ID.fetch_add(1, Ordering::Relaxed));
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let thread = {
            let buffer = Arc::clone(&buffer);
            let index = self.index.clone();
            let config = config.clone();
            std::thread::spawn(move || run_watch_loop(rx, buffer, index, ignore, config, id))
        };

        let handle = WatchHandle {
            id,
            path: path.clone(),
            recursive: config.recursive,
        };
        self.watches.lock().insert(
            id,
            WatchEntry {
                handle: handle.clone(),
                runtime: ChangeWatcher {
                    watcher: Some(watcher),
                    thread: Some(thread),
                    buffer,
                },
            },
        );
        info!(
            watch_id = %id,
            path = %path.display(),
            recursive = config.recursive,
            debounce_ms = config.debounce_ms,
            "watch started"
        );
        Ok(handle)
    }

    /// Drains the handle's buffered events in arrival order and clears the
    /// buffer. Unknown ids yield an empty vector, not a fault.
    pub fn get_watch_events(&self, id: WatchId) -> Vec<FsEvent> {
        let watches = self.watches.lock();
        match watches.get(&id) {
            Some(entry) => std::mem::take(&mut *entry.runtime.buffer.lock()),
            None => Vec::new(),
        }
    }

    /// Stops the watch, releasing its OS descriptors and discarding buffered
    /// events before returning. False when the id was already stopped or
    /// never existed.
    pub fn stop_watching(&self, id: WatchId) -> bool {
        let entry = self.watches.lock().remove(&id);
        match entry {
            Some(mut entry) => {
                entry.runtime.shutdown();
                info!(watch_id = %id, path = %entry.handle.path.display(), "watch stopped");
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.watches.lock().len()
    }

    /// Stops every active watch. Also runs on drop.
    pub fn stop_all(&self) {
        let entries: Vec<WatchEntry> = {
            let mut watches = self.watches.lock();
            watches.drain().map(|(_, entry)| entry).collect()
        };
        for mut entry in entries {
            entry.runtime.shutdown();
            debug!(watch_id = %entry.handle.id, "watch stopped");
        }
    }
}

impl Drop for WatchRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn run_watch_loop(
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
    buffer: Arc<Mutex<Vec<FsEvent>>>,
    index: Option<Arc<WorkspaceIndex>>,
    ignore: GlobSet,
    config: WatchConfig,
    id: WatchId,
) {
    let mut debouncer = EventDebouncer::new(config.debounce_ms);
    // Tick often enough to flush windows promptly and to notice shutdown.
    let tick = Duration::from_millis(config.debounce_ms.clamp(10, 100));

    loop {
        match rx.recv_timeout(tick) {
            Ok(Ok(event)) => {
                if let Some(kind) = normalize_kind(&event.kind) {
                    let now = epoch_ms();
                    for path in event.paths {
                        if !ignore.is_empty() && ignore.is_match(&path) {
                            continue;
                        }
                        let is_dir = path.is_dir();
                        debouncer.record(path, kind, is_dir, now);
                    }
                }
            }
            Ok(Err(err)) => {
                warn!(watch_id = %id, error = %err, "watch backend error");
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        let ready = debouncer.drain_ready(epoch_ms());
        if ready.is_empty() {
            continue;
        }
        if let Some(index) = &index {
            for event in &ready {
                index.apply_event(event);
            }
        }

        let mut buf = buffer.lock();
        let mut dropped = 0usize;
        for event in ready {
            if buf.len() < config.max_buffer {
                buf.push(event);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!(
                watch_id = %id,
                dropped,
                capacity = config.max_buffer,
                "event buffer full, dropping newest events"
            );
        }
    }
    debug!(watch_id = %id, "watch loop terminated");
}

/// Access and unclassified events carry nothing a consumer can act on;
/// name-kind modifications are renames.
fn normalize_kind(kind: &EventKind) -> Option<FsEventKind> {
    match kind {
        EventKind::Create(_) => Some(FsEventKind::Create),
        EventKind::Remove(_) => Some(FsEventKind::Delete),
        EventKind::Modify(ModifyKind::Name(_)) => Some(FsEventKind::Rename),
        EventKind::Modify(_) => Some(FsEventKind::Modify),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

fn build_ignore_set(globs: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in globs {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => {
                warn!(glob = %pattern, error = %err, "skipping invalid watch ignore glob");
            }
        }
    }
    builder.build().unwrap_or_else(|err| {
        warn!(error = %err, "watch ignore globs failed to build, ignoring them");
        GlobSet::empty()
    })
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};

    #[test]
    fn unknown_ids_are_no_ops() {
        let registry = WatchRegistry::new();
        assert!(!registry.stop_watching(WatchId(42)));
        assert!(registry.get_watch_events(WatchId(42)).is_empty());
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = WatchRegistry::new();
        let err = registry
            .start_watching(&dir.path().join("absent"), WatchConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn kind_normalization() {
        assert_eq!(
            normalize_kind(&EventKind::Create(CreateKind::File)),
            Some(FsEventKind::Create)
        );
        assert_eq!(
            normalize_kind(&EventKind::Remove(RemoveKind::Folder)),
            Some(FsEventKind::Delete)
        );
        assert_eq!(
            normalize_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(FsEventKind::Modify)
        );
        assert_eq!(
            normalize_kind(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))),
            Some(FsEventKind::Modify)
        );
        assert_eq!(
            normalize_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::Any))),
            Some(FsEventKind::Rename)
        );
        assert_eq!(normalize_kind(&EventKind::Access(AccessKind::Any)), None);
        assert_eq!(normalize_kind(&EventKind::Any), None);
    }

    #[test]
    fn ignore_set_skips_invalid_globs() {
        let set = build_ignore_set(&["[".into(), "*.log".into()]);
        assert!(set.is_match("/w/app.log"));
        assert!(!set.is_match("/w/app.rs"));
    }

    #[test]
    fn epoch_clock_advances() {
        let a = epoch_ms();
        assert!(a > 1_500_000_000_000, "epoch clock looks wrong: {a}");
    }
}
