//! Published post snapshot and the background loop that keeps it in sync with the store.
//!
//! Readers call [`ContentRepository::all`], [`ContentRepository::get`] or
//! [`ContentRepository::adjacent`] and never block: the snapshot is an
//! immutable value swapped in whole. The refresh loop probes the store, reloads
//! when the probe moved, diffs the new snapshot against the published one by
//! fingerprint, publishes, and only then fans out change callbacks.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use metrics::{counter, gauge, histogram};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    application::repos::{PostStore, RepoError, StoreProbe},
    cache::lock,
    domain::{
        front_matter,
        posts::{Post, PostId, UserId},
    },
};

const SOURCE: &str = "application::content";

/// Invoked once per changed or added post after a refresh publishes.
pub type ChangeCallback = Arc<dyn Fn(PostId) + Send + Sync>;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content repository is already initialized")]
    AlreadyInitialized,
    #[error("initial content load failed: {0}")]
    InitialLoad(#[source] RepoError),
}

/// Immutable view of every post, newest modification first.
#[derive(Debug, Default)]
pub struct Snapshot {
    ordered: Vec<Arc<Post>>,
    positions: HashMap<PostId, usize>,
}

impl Snapshot {
    /// Build a snapshot from store output. Ordering is by `modified_at`
    /// descending; ties keep store order. Later duplicates of an id are dropped.
    pub fn build(mut posts: Vec<Post>) -> Self {
        posts.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));

        let mut ordered = Vec::with_capacity(posts.len());
        let mut positions = HashMap::with_capacity(posts.len());
        for post in posts {
            if positions.contains_key(&post.id) {
                warn!(
                    target = "the_archive::content",
                    post_id = %post.id,
                    "store returned duplicate post id; keeping the most recent"
                );
                continue;
            }
            positions.insert(post.id.clone(), ordered.len());
            ordered.push(Arc::new(post));
        }

        Self { ordered, positions }
    }

    pub fn posts(&self) -> &[Arc<Post>] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Post>> {
        self.positions.get(id).map(|&idx| &self.ordered[idx])
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Neighbours of `id` in snapshot order: `(previous, next)`.
    pub fn adjacent(&self, id: &str) -> (Option<Arc<Post>>, Option<Arc<Post>>) {
        let Some(idx) = self.position(id) else {
            return (None, None);
        };
        let previous = idx
            .checked_sub(1)
            .and_then(|p| self.ordered.get(p))
            .cloned();
        let next = self.ordered.get(idx + 1).cloned();
        (previous, next)
    }
}

/// Per-item differences between two snapshots, keyed by id and fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub changed: Vec<PostId>,
    pub added: Vec<PostId>,
    pub removed: Vec<PostId>,
}

impl SnapshotDiff {
    pub fn between(previous: &Snapshot, next: &Snapshot) -> Self {
        let mut diff = Self::default();

        for post in next.posts() {
            match previous.get(post.id.as_str()) {
                Some(old) if old.fingerprint != post.fingerprint => {
                    diff.changed.push(post.id.clone())
                }
                Some(_) => {}
                None => diff.added.push(post.id.clone()),
            }
        }

        for post in previous.posts() {
            if next.get(post.id.as_str()).is_none() {
                diff.removed.push(post.id.clone());
            }
        }

        diff
    }

    /// Whether anything at all differs, removals included.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    /// Ids that subscribers are told about. Removed posts are not announced.
    pub fn announced(&self) -> impl Iterator<Item = &PostId> {
        self.changed.iter().chain(self.added.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The store probe matched the last load; nothing was fetched.
    Unchanged,
    /// A full load ran and a new snapshot was published.
    Reloaded(SnapshotDiff),
}

pub struct ContentRepository {
    store: Arc<dyn PostStore>,
    snapshot: ArcSwap<Snapshot>,
    last_probe: Mutex<Option<StoreProbe>>,
    refresh_gate: tokio::sync::Mutex<()>,
    initialized: AtomicBool,
    refresh_interval_ms: AtomicU64,
    on_change: RwLock<Option<ChangeCallback>>,
}

impl ContentRepository {
    pub fn new(store: Arc<dyn PostStore>, refresh_interval: Duration) -> Self {
        Self {
            store,
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            last_probe: Mutex::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
            initialized: AtomicBool::new(false),
            refresh_interval_ms: AtomicU64::new(interval_millis(refresh_interval)),
            on_change: RwLock::new(None),
        }
    }

    /// Perform the first full load. Fails if called twice.
    pub async fn init(&self) -> Result<(), ContentError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(ContentError::AlreadyInitialized);
        }

        if let Err(err) = self.reload().await {
            self.initialized.store(false, Ordering::SeqCst);
            return Err(ContentError::InitialLoad(err));
        }

        info!(
            target = "the_archive::content",
            store = self.store.kind(),
            posts = self.snapshot.load().len(),
            "content repository initialized"
        );
        Ok(())
    }

    /// [`ContentRepository::init`] followed by [`ContentRepository::spawn_refresh_loop`].
    pub async fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, ContentError> {
        self.init().await?;
        Ok(self.spawn_refresh_loop())
    }

    /// Run refresh ticks forever on the current runtime. Abort the handle to stop.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let repo = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(repo.refresh_interval()).await;
                if let Err(err) = repo.refresh_now().await {
                    counter!("archive_content_reload_failed_total").increment(1);
                    warn!(
                        target = "the_archive::content",
                        store = repo.store.kind(),
                        error = %err,
                        "content refresh failed; keeping previous snapshot"
                    );
                }
            }
        })
    }

    pub fn all(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Post>> {
        self.snapshot.load().get(id).cloned()
    }

    pub fn adjacent(&self, id: &str) -> (Option<Arc<Post>>, Option<Arc<Post>>) {
        self.snapshot.load().adjacent(id)
    }

    pub fn set_change_callback<F>(&self, callback: F)
    where
        F: Fn(PostId) + Send + Sync + 'static,
    {
        *lock::write(&self.on_change, SOURCE, "set_change_callback") = Some(Arc::new(callback));
    }

    /// Takes effect from the next sleep of the refresh loop.
    pub fn set_refresh_interval(&self, interval: Duration) {
        self.refresh_interval_ms
            .store(interval_millis(interval), Ordering::Relaxed);
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.load(Ordering::Relaxed))
    }

    /// One refresh tick: probe, reload if needed, publish, then notify.
    pub async fn refresh_now(&self) -> Result<RefreshOutcome, RepoError> {
        let _gate = self.refresh_gate.lock().await;

        let probe = self.store.probe().await?;
        if probe.is_some() && self.recorded_probe() == probe {
            counter!("archive_content_probe_skip_total").increment(1);
            debug!(
                target = "the_archive::content",
                store = self.store.kind(),
                "store probe unchanged; skipping reload"
            );
            return Ok(RefreshOutcome::Unchanged);
        }

        let started = Instant::now();
        let posts = self.store.list_all().await?;
        let next = Snapshot::build(posts);
        let previous = self.snapshot.load_full();
        let diff = SnapshotDiff::between(&previous, &next);
        let count = next.len();

        self.snapshot.store(Arc::new(next));
        *lock::exclusive(&self.last_probe, SOURCE, "refresh_now.record") = probe;

        counter!("archive_content_reload_total").increment(1);
        gauge!("archive_content_posts").set(count as f64);
        histogram!("archive_content_reload_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        if !diff.is_empty() {
            info!(
                target = "the_archive::content",
                store = self.store.kind(),
                changed = diff.changed.len(),
                added = diff.added.len(),
                removed = diff.removed.len(),
                posts = count,
                "content snapshot refreshed"
            );
        }

        self.dispatch(&diff);
        Ok(RefreshOutcome::Reloaded(diff))
    }

    /// A blank post owned by `owner`. Nothing is written until it is saved.
    pub fn create_new(&self, owner: UserId) -> Post {
        Post::blank(owner)
    }

    /// Write a new post through to the store. The snapshot picks it up on the
    /// next refresh.
    ///
    /// Timestamps are stored as given so imported posts keep their dates.
    pub async fn save_new(&self, mut post: Post) -> Result<Post, RepoError> {
        if let Some(title) = front_matter::declared_title(&post.markdown) {
            post.title = title;
        } else if post.title.trim().is_empty() {
            post.title = post.untitled_label();
        }
        post.refresh_fingerprint();

        self.store.insert(&post).await?;
        debug!(
            target = "the_archive::content",
            post_id = %post.id,
            fingerprint = %post.fingerprint,
            "post saved"
        );
        Ok(post)
    }

    /// Write new content for an existing post through to the store.
    pub async fn update_content(&self, mut post: Post) -> Result<Post, RepoError> {
        if let Some(title) = front_matter::declared_title(&post.markdown) {
            post.title = title;
        }
        post.refresh_fingerprint();
        post.modified_at = OffsetDateTime::now_utc();

        self.store.update_content(&post).await?;
        debug!(
            target = "the_archive::content",
            post_id = %post.id,
            fingerprint = %post.fingerprint,
            "post content updated"
        );
        Ok(post)
    }

    async fn reload(&self) -> Result<(), RepoError> {
        let _gate = self.refresh_gate.lock().await;

        // Probe before listing: a write landing in between makes the next
        // probe differ instead of being missed.
        let probe = self.store.probe().await?;
        let posts = self.store.list_all().await?;
        let next = Snapshot::build(posts);
        gauge!("archive_content_posts").set(next.len() as f64);

        self.snapshot.store(Arc::new(next));
        *lock::exclusive(&self.last_probe, SOURCE, "reload.record") = probe;
        Ok(())
    }

    fn recorded_probe(&self) -> Option<StoreProbe> {
        *lock::exclusive(&self.last_probe, SOURCE, "recorded_probe")
    }

    fn dispatch(&self, diff: &SnapshotDiff) {
        let Some(callback) = lock::read(&self.on_change, SOURCE, "dispatch").clone() else {
            return;
        };

        for id in diff.announced() {
            let callback = Arc::clone(&callback);
            let id = id.clone();
            tokio::spawn(async move { callback(id) });
        }
    }
}

fn interval_millis(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX).max(1)
}
