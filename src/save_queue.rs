// Save queue: per-path FIFO write lanes with debounced autosave
//
// Each path gets one worker task draining an unbounded channel, so at most
// one write per path is in flight and writes land in submission order.
// Different paths have no ordering between them.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{StoreError, StoreResult};
use crate::events::{Notifier, WorkspaceEvent};
use crate::paths;
use crate::store::DocumentStore;

// ===== STATUS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveTrigger {
    Autosave,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Pending,
    Saving {
        trigger: SaveTrigger,
    },
    Saved {
        trigger: SaveTrigger,
        at: i64,
    },
    Failed {
        trigger: SaveTrigger,
        message: String,
    },
}

/// Per-path statuses, shared by the queue and its lane workers
struct StatusBoard {
    statuses: RwLock<HashMap<PathBuf, SaveStatus>>,
    notifier: Notifier,
}

impl StatusBoard {
    fn get(&self, path: &Path) -> SaveStatus {
        self.statuses.read().get(path).cloned().unwrap_or_default()
    }

    fn set(&self, path: &Path, status: SaveStatus) {
        self.statuses
            .write()
            .insert(path.to_path_buf(), status.clone());
        self.notifier.publish(WorkspaceEvent::SaveStatus {
            path: path.to_path_buf(),
            status,
        });
    }

    fn forget(&self, path: &Path) {
        if self.statuses.write().remove(path).is_some() {
            self.notifier.publish(WorkspaceEvent::SaveStatus {
                path: path.to_path_buf(),
                status: SaveStatus::Idle,
            });
        }
    }
}

// ===== LANES =====

struct WriteJob {
    content: String,
    trigger: SaveTrigger,
    done: Option<oneshot::Sender<StoreResult<()>>>,
}

enum LaneJob {
    Write(WriteJob),
    /// Resolves once every job queued before it has finished
    Barrier(oneshot::Sender<()>),
}

struct PendingAutosave {
    id: u64,
    content: String,
    timer: JoinHandle<()>,
}

struct Lane {
    tx: mpsc::UnboundedSender<LaneJob>,
    /// Jobs sent but not yet finished by the worker
    queued: Arc<AtomicUsize>,
    pending: Option<PendingAutosave>,
}

impl Lane {
    fn send(&self, job: LaneJob) -> bool {
        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    fn is_idle(&self) -> bool {
        self.pending.is_none() && self.queued.load(Ordering::SeqCst) == 0
    }

    /// Cancel the debounce timer and hand back its content.
    fn take_pending(&mut self) -> Option<String> {
        self.pending.take().map(|pending| {
            pending.timer.abort();
            pending.content
        })
    }

    fn barrier(&self) -> Option<oneshot::Receiver<()>> {
        let (tx, rx) = oneshot::channel();
        self.send(LaneJob::Barrier(tx)).then_some(rx)
    }
}

async fn run_lane(
    path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<LaneJob>,
    queued: Arc<AtomicUsize>,
    store: Arc<dyn DocumentStore>,
    board: Arc<StatusBoard>,
) {
    while let Some(job) = rx.recv().await {
        let job = match job {
            LaneJob::Write(job) => job,
            LaneJob::Barrier(done) => {
                queued.fetch_sub(1, Ordering::SeqCst);
                let _ = done.send(());
                continue;
            }
        };

        board.set(&path, SaveStatus::Saving { trigger: job.trigger });
        let result = store.write_file(&path, &job.content).await;

        match &result {
            Ok(()) => {
                tracing::debug!(path = %path.display(), trigger = ?job.trigger, bytes = job.content.len(), "saved");
                board.set(
                    &path,
                    SaveStatus::Saved {
                        trigger: job.trigger,
                        at: chrono::Utc::now().timestamp_millis(),
                    },
                );
            }
            Err(err) => {
                match job.trigger {
                    SaveTrigger::Autosave => {
                        tracing::warn!(path = %path.display(), error = %err, "autosave failed")
                    }
                    SaveTrigger::Manual => {
                        tracing::error!(path = %path.display(), error = %err, "save failed")
                    }
                }
                board.set(
                    &path,
                    SaveStatus::Failed {
                        trigger: job.trigger,
                        message: err.to_string(),
                    },
                );
            }
        }

        queued.fetch_sub(1, Ordering::SeqCst);
        if let Some(done) = job.done {
            let _ = done.send(result);
        }
    }
    tracing::trace!(path = %path.display(), "save lane retired");
}

fn lane_closed(path: &Path) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source: io::Error::other("save lane closed"),
    }
}

// ===== QUEUE =====

struct Inner {
    store: Arc<dyn DocumentStore>,
    debounce: Duration,
    lanes: Mutex<HashMap<PathBuf, Lane>>,
    board: Arc<StatusBoard>,
    next_id: AtomicU64,
}

impl Inner {
    /// Lane for `path`, spawning its worker on first use.
    fn lane<'a>(&self, lanes: &'a mut HashMap<PathBuf, Lane>, path: &Path) -> &'a mut Lane {
        lanes.entry(path.to_path_buf()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            let queued = Arc::new(AtomicUsize::new(0));
            tokio::spawn(run_lane(
                path.to_path_buf(),
                rx,
                Arc::clone(&queued),
                Arc::clone(&self.store),
                Arc::clone(&self.board),
            ));
            Lane {
                tx,
                queued,
                pending: None,
            }
        })
    }

    /// Debounce timer expiry. Ignored when the autosave it was armed for
    /// has since been replaced, fired or cancelled.
    fn fire(&self, path: &Path, id: u64, content: String) {
        let mut lanes = self.lanes.lock();
        let Some(lane) = lanes.get_mut(path) else {
            return;
        };
        if lane.pending.as_ref().map(|p| p.id) != Some(id) {
            return;
        }
        lane.pending = None;
        let job = WriteJob {
            content,
            trigger: SaveTrigger::Autosave,
            done: None,
        };
        if !lane.send(LaneJob::Write(job)) {
            tracing::warn!(path = %path.display(), "autosave dropped: lane closed");
        }
    }
}

#[derive(Clone)]
pub struct SaveQueue {
    inner: Arc<Inner>,
}

impl SaveQueue {
    pub fn new(store: Arc<dyn DocumentStore>, debounce: Duration, notifier: Notifier) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                debounce,
                lanes: Mutex::new(HashMap::new()),
                board: Arc::new(StatusBoard {
                    statuses: RwLock::new(HashMap::new()),
                    notifier,
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    pub fn status(&self, path: &Path) -> SaveStatus {
        self.inner.board.get(path)
    }

    /// Schedule an autosave of `content` to `path`, replacing any autosave
    /// still waiting out its debounce window for the same path.
    pub fn enqueue_save(&self, path: &Path, content: impl Into<String>) {
        let content = content.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let timer = {
            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            let path = path.to_path_buf();
            let content = content.clone();
            let debounce = self.inner.debounce;
            tokio::spawn(async move {
                tokio::time::sleep(debounce).await;
                if let Some(inner) = weak.upgrade() {
                    inner.fire(&path, id, content);
                }
            })
        };

        {
            let mut lanes = self.inner.lanes.lock();
            let lane = self.inner.lane(&mut lanes, path);
            if let Some(previous) = lane.pending.replace(PendingAutosave { id, content, timer }) {
                previous.timer.abort();
            }
        }
        self.inner.board.set(path, SaveStatus::Pending);
    }

    /// Manual save: cancels the pending autosave, waits behind writes
    /// already queued for `path`, then writes `content`.
    pub async fn flush_and_save(&self, path: &Path, content: impl Into<String>) -> StoreResult<()> {
        let (tx, rx) = oneshot::channel();
        {
            let mut lanes = self.inner.lanes.lock();
            let lane = self.inner.lane(&mut lanes, path);
            if lane.take_pending().is_some() {
                tracing::debug!(path = %path.display(), "pending autosave superseded by manual save");
            }
            let job = WriteJob {
                content: content.into(),
                trigger: SaveTrigger::Manual,
                done: Some(tx),
            };
            if !lane.send(LaneJob::Write(job)) {
                return Err(lane_closed(path));
            }
        }
        rx.await.map_err(|_| lane_closed(path))?
    }

    /// Fire the pending autosave for `path` now and wait for the lane to
    /// drain.
    pub async fn flush_pending(&self, path: &Path) {
        let barrier = {
            let mut lanes = self.inner.lanes.lock();
            let Some(lane) = lanes.get_mut(path) else {
                return;
            };
            if let Some(content) = lane.take_pending() {
                let job = WriteJob {
                    content,
                    trigger: SaveTrigger::Autosave,
                    done: None,
                };
                lane.send(LaneJob::Write(job));
            }
            lane.barrier()
        };
        if let Some(barrier) = barrier {
            let _ = barrier.await;
        }
    }

    /// Wait until every write already queued for `path` has finished.
    pub async fn settle(&self, path: &Path) {
        let barrier = self.inner.lanes.lock().get(path).and_then(Lane::barrier);
        if let Some(barrier) = barrier {
            let _ = barrier.await;
        }
    }

    /// Cancel the pending autosave for `path` and wait for queued writes to
    /// finish. Returns the cancelled content so the caller can put it back.
    pub async fn hold(&self, path: &Path) -> Option<String> {
        let (held, barrier) = {
            let mut lanes = self.inner.lanes.lock();
            let lane = lanes.get_mut(path)?;
            (lane.take_pending(), lane.barrier())
        };
        if let Some(barrier) = barrier {
            let _ = barrier.await;
        }
        held
    }

    /// Write out the pending autosave for `path`, then drop its lane if
    /// nothing new arrived meanwhile. A failed status is kept.
    pub async fn retire(&self, path: &Path) {
        self.flush_pending(path).await;
        let retired = {
            let mut lanes = self.inner.lanes.lock();
            if lanes.get(path).is_some_and(Lane::is_idle) {
                lanes.remove(path);
                true
            } else {
                false
            }
        };
        if retired && !matches!(self.status(path), SaveStatus::Failed { .. }) {
            self.inner.board.forget(path);
        }
        if retired {
            tracing::trace!(path = %path.display(), "idle save lane retired");
        }
    }

    /// Drop the pending autosave for `path`, let in-flight writes drain and
    /// retire the lane.
    pub async fn discard(&self, path: &Path) {
        let barrier = {
            let Some(mut lane) = self.inner.lanes.lock().remove(path) else {
                return;
            };
            if lane.take_pending().is_some() {
                tracing::debug!(path = %path.display(), "pending autosave discarded");
            }
            lane.barrier()
        };
        if let Some(barrier) = barrier {
            let _ = barrier.await;
        }
        self.inner.board.forget(path);
    }

    /// Paths with a lane at or below `path`.
    pub fn lanes_within(&self, path: &Path) -> Vec<PathBuf> {
        self.inner
            .lanes
            .lock()
            .keys()
            .filter(|p| paths::is_within(p, path))
            .cloned()
            .collect()
    }

    pub fn has_pending(&self, path: &Path) -> bool {
        self.inner
            .lanes
            .lock()
            .get(path)
            .is_some_and(|lane| lane.pending.is_some())
    }

    /// Fire every pending autosave and wait for all lanes to drain.
    pub async fn flush_all(&self) {
        let paths: Vec<PathBuf> = self.inner.lanes.lock().keys().cloned().collect();
        tracing::info!(lanes = paths.len(), "flushing all saves");
        futures::future::join_all(paths.iter().map(|path| self.flush_pending(path))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use tokio::time::{Instant, sleep};

    const DEBOUNCE: Duration = Duration::from_millis(3000);

    fn queue_with(store: &Arc<MemoryStore>) -> (SaveQueue, Notifier) {
        let notifier = Notifier::new();
        let queue = SaveQueue::new(store.clone(), DEBOUNCE, notifier.clone());
        (queue, notifier)
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new().with_dir("/notes"))
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_autosaves_coalesce_into_last_content() {
        let store = store();
        let (queue, _) = queue_with(&store);
        let path = Path::new("/notes/a.md");

        queue.enqueue_save(path, "v1");
        sleep(Duration::from_millis(1000)).await;
        queue.enqueue_save(path, "v2");
        assert_eq!(queue.status(path), SaveStatus::Pending);

        sleep(Duration::from_millis(2900)).await;
        assert!(store.writes().is_empty(), "window restarts on every edit");

        sleep(Duration::from_millis(200)).await;
        queue.settle(path).await;
        assert_eq!(store.writes(), vec![(path.to_path_buf(), "v2".to_string())]);
        assert!(matches!(
            queue.status(path),
            SaveStatus::Saved { trigger: SaveTrigger::Autosave, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_save_cancels_pending_autosave() {
        let store = store();
        let (queue, _) = queue_with(&store);
        let path = Path::new("/notes/a.md");

        queue.enqueue_save(path, "draft");
        queue.flush_and_save(path, "final").await.unwrap();
        assert!(!queue.has_pending(path));

        sleep(DEBOUNCE * 2).await;
        queue.settle(path).await;
        assert_eq!(store.writes(), vec![(path.to_path_buf(), "final".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_land_in_submission_order_one_at_a_time() {
        let store = store();
        store.set_write_delay(Duration::from_millis(100));
        let (queue, _) = queue_with(&store);
        let path = Path::new("/notes/a.md");

        let (first, second, third) = tokio::join!(
            queue.flush_and_save(path, "one"),
            queue.flush_and_save(path, "two"),
            queue.flush_and_save(path, "three"),
        );
        first.unwrap();
        second.unwrap();
        third.unwrap();

        let contents: Vec<String> = store.writes().into_iter().map(|(_, c)| c).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(store.contents(path).as_deref(), Some("three"));
    }

    #[tokio::test(start_paused = true)]
    async fn paths_do_not_wait_for_each_other() {
        let store = store();
        store.set_write_delay(Duration::from_millis(500));
        let (queue, _) = queue_with(&store);
        let a = Path::new("/notes/a.md");
        let b = Path::new("/notes/b.md");

        let started = Instant::now();
        let (ra, rb) = tokio::join!(queue.flush_and_save(a, "a"), queue.flush_and_save(b, "b"));
        ra.unwrap();
        rb.unwrap();
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_is_reported_and_lane_advances() {
        let store = store();
        let (queue, _) = queue_with(&store);
        let path = Path::new("/notes/a.md");
        store.fail_writes_to(path);

        let err = queue.flush_and_save(path, "lost").await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(matches!(
            queue.status(path),
            SaveStatus::Failed { trigger: SaveTrigger::Manual, .. }
        ));

        store.heal_writes();
        queue.flush_and_save(path, "kept").await.unwrap();
        assert_eq!(store.contents(path).as_deref(), Some("kept"));
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_failure_is_published_with_its_trigger() {
        let store = store();
        let (queue, notifier) = queue_with(&store);
        let mut events = notifier.subscribe();
        let path = Path::new("/notes/a.md");
        store.fail_writes_to(path);

        queue.enqueue_save(path, "x");
        sleep(DEBOUNCE + Duration::from_millis(10)).await;
        queue.settle(path).await;

        let mut seen = Vec::new();
        while let Ok(WorkspaceEvent::SaveStatus { status, .. }) = events.try_recv() {
            seen.push(status);
        }
        assert_eq!(seen[0], SaveStatus::Pending);
        assert_eq!(seen[1], SaveStatus::Saving { trigger: SaveTrigger::Autosave });
        assert!(matches!(
            &seen[2],
            SaveStatus::Failed { trigger: SaveTrigger::Autosave, message } if message.contains("injected")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_pending_writes_without_waiting_for_the_timer() {
        let store = store();
        let (queue, _) = queue_with(&store);
        let path = Path::new("/notes/a.md");
        let started = Instant::now();

        queue.enqueue_save(path, "now");
        queue.flush_pending(path).await;

        assert!(started.elapsed() < DEBOUNCE);
        assert_eq!(store.contents(path).as_deref(), Some("now"));

        sleep(DEBOUNCE * 2).await;
        assert_eq!(store.writes().len(), 1, "timer must not fire a second write");
    }

    #[tokio::test(start_paused = true)]
    async fn discard_drops_pending_autosave() {
        let store = store();
        let (queue, _) = queue_with(&store);
        let path = Path::new("/notes/a.md");

        queue.enqueue_save(path, "never");
        queue.discard(path).await;
        sleep(DEBOUNCE * 2).await;

        assert!(store.writes().is_empty());
        assert_eq!(queue.status(path), SaveStatus::Idle);
        assert!(queue.lanes_within(Path::new("/notes")).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hold_hands_back_pending_content_without_writing() {
        let store = store();
        store.set_write_delay(Duration::from_millis(100));
        let (queue, _) = queue_with(&store);
        let path = Path::new("/notes/a.md");

        queue.flush_and_save(path, "saved").await.unwrap();
        queue.enqueue_save(path, "held");
        assert_eq!(queue.hold(path).await.as_deref(), Some("held"));
        assert!(!queue.has_pending(path));
        assert_eq!(queue.hold(Path::new("/notes/none.md")).await, None);

        sleep(DEBOUNCE * 2).await;
        assert_eq!(store.writes(), vec![(path.to_path_buf(), "saved".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn retire_writes_pending_and_drops_the_lane() {
        let store = store();
        let (queue, _) = queue_with(&store);
        let a = Path::new("/notes/a.md");
        let b = Path::new("/notes/b.md");

        queue.enqueue_save(a, "last words");
        queue.retire(a).await;
        assert_eq!(store.contents(a).as_deref(), Some("last words"));
        assert!(queue.lanes_within(a).is_empty());
        assert_eq!(queue.status(a), SaveStatus::Idle);

        store.fail_writes_to(b);
        queue.enqueue_save(b, "x");
        queue.retire(b).await;
        assert!(queue.lanes_within(b).is_empty());
        assert!(matches!(queue.status(b), SaveStatus::Failed { .. }));

        store.heal_writes();
        queue.flush_and_save(a, "again").await.unwrap();
        assert_eq!(store.contents(a).as_deref(), Some("again"));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_all_drains_every_lane() {
        let store = store();
        let (queue, _) = queue_with(&store);
        queue.enqueue_save(Path::new("/notes/a.md"), "a");
        queue.enqueue_save(Path::new("/notes/sub/b.md"), "b");

        queue.flush_all().await;

        assert_eq!(store.contents("/notes/a.md").as_deref(), Some("a"));
        assert_eq!(store.contents("/notes/sub/b.md").as_deref(), Some("b"));
        let mut lanes = queue.lanes_within(Path::new("/notes/sub"));
        lanes.sort();
        assert_eq!(lanes, vec![PathBuf::from("/notes/sub/b.md")]);
    }
}
