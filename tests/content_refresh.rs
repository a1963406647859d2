use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use the_archive::application::content::{ContentError, ContentRepository, RefreshOutcome};
use the_archive::application::notify::{ChangeNotifier, RELOAD_MESSAGE};
use the_archive::application::repos::{PostStore, RepoError, StoreProbe};
use the_archive::domain::fingerprint::Fingerprint;
use the_archive::domain::posts::{Post, PostId, UserId};
use the_archive::infra::memory::MemoryPostStore;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn post_at(id: &str, body: &str, minute: i64) -> Post {
    let at = datetime!(2024-06-01 12:00 UTC) + time::Duration::minutes(minute);
    Post {
        id: PostId::new(id),
        title: id.to_string(),
        markdown: body.to_string(),
        fingerprint: Fingerprint::of(body),
        created_at: at,
        modified_at: at,
        owner: UserId::new("author"),
    }
}

fn repository(store: Arc<dyn PostStore>) -> Arc<ContentRepository> {
    Arc::new(ContentRepository::new(store, Duration::from_secs(60)))
}

fn record_changes(repo: &ContentRepository) -> mpsc::UnboundedReceiver<PostId> {
    let (tx, rx) = mpsc::unbounded_channel();
    repo.set_change_callback(move |id| {
        let _ = tx.send(id);
    });
    rx
}

async fn drain(rx: &mut mpsc::UnboundedReceiver<PostId>, expected: usize) -> HashSet<String> {
    let mut seen = HashSet::new();
    for _ in 0..expected {
        let id = timeout(WAIT, rx.recv())
            .await
            .expect("notification within deadline")
            .expect("callback channel open");
        seen.insert(id.to_string());
    }
    seen
}

#[tokio::test]
async fn only_changed_and_added_posts_are_announced() {
    let store = Arc::new(MemoryPostStore::with_posts([
        post_at("A", "h1", 0),
        post_at("B", "h2", 1),
    ]));
    let repo = repository(store.clone());
    repo.init().await.expect("initial load");
    let mut changes = record_changes(&repo);

    store.upsert(post_at("B", "h3", 5)).await;
    store.upsert(post_at("C", "h4", 6)).await;

    let outcome = repo.refresh_now().await.expect("refresh");
    let RefreshOutcome::Reloaded(diff) = outcome else {
        panic!("store moved, reload expected");
    };
    assert_eq!(diff.changed, vec![PostId::new("B")]);
    assert_eq!(diff.added, vec![PostId::new("C")]);
    assert!(diff.removed.is_empty());

    let seen = drain(&mut changes, 2).await;
    assert_eq!(seen, HashSet::from(["B".to_string(), "C".to_string()]));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(changes.try_recv().is_err(), "A must not be announced");
}

#[tokio::test]
async fn subscriber_sees_new_content_after_reload_message() {
    let store = Arc::new(MemoryPostStore::with_posts([post_at("p1", "first", 0)]));
    let repo = repository(store.clone());
    let notifier = Arc::new(ChangeNotifier::default());
    {
        let notifier = Arc::clone(&notifier);
        repo.set_change_callback(move |id| {
            notifier.notify(&id, RELOAD_MESSAGE);
        });
    }
    repo.init().await.expect("initial load");

    let mut subscription = notifier.subscribe(PostId::new("p1"));
    let mut other = notifier.subscribe(PostId::new("p2"));

    let mut edited = (*repo.get("p1").expect("p1 loaded")).clone();
    edited.markdown = "second".to_string();
    repo.update_content(edited).await.expect("write through");

    assert_eq!(
        repo.get("p1").map(|p| p.markdown.clone()).as_deref(),
        Some("first"),
        "writes are not visible before the next refresh"
    );

    repo.refresh_now().await.expect("refresh");

    let message = timeout(WAIT, subscription.recv())
        .await
        .expect("reload within deadline");
    assert_eq!(message.as_deref(), Some(RELOAD_MESSAGE));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(subscription.try_recv(), None, "exactly one reload per change");

    let current = repo.get("p1").expect("p1 still present");
    assert_eq!(current.markdown, "second");
    assert_eq!(current.fingerprint, Fingerprint::of("second"));
    assert_eq!(other.try_recv(), None);
}

#[tokio::test]
async fn edit_with_an_old_timestamp_waits_for_a_later_write() {
    let store = Arc::new(MemoryPostStore::with_posts([
        post_at("A", "h1", 0),
        post_at("B", "h2", 5),
    ]));
    let repo = repository(store.clone());
    repo.init().await.expect("initial load");

    // Newest timestamp and count are unchanged.
    store.upsert(post_at("A", "edited", 0)).await;
    assert_eq!(
        repo.refresh_now().await.expect("refresh"),
        RefreshOutcome::Unchanged
    );
    assert_eq!(repo.get("A").map(|p| p.markdown.clone()).as_deref(), Some("h1"));

    store.upsert(post_at("B", "h2", 6)).await;
    assert!(matches!(
        repo.refresh_now().await.expect("refresh"),
        RefreshOutcome::Reloaded(_)
    ));
    assert_eq!(
        repo.get("A").map(|p| p.markdown.clone()).as_deref(),
        Some("edited")
    );
}

#[tokio::test]
async fn unchanged_probe_skips_the_reload() {
    let store = Arc::new(MemoryPostStore::with_posts([post_at("A", "h1", 0)]));
    let repo = repository(store.clone());
    repo.init().await.expect("initial load");

    assert_eq!(
        repo.refresh_now().await.expect("refresh"),
        RefreshOutcome::Unchanged
    );

    store.upsert(post_at("A", "h2", 1)).await;
    assert!(matches!(
        repo.refresh_now().await.expect("refresh"),
        RefreshOutcome::Reloaded(_)
    ));
    assert_eq!(repo.get("A").map(|p| p.markdown.clone()).as_deref(), Some("h2"));
}

#[tokio::test]
async fn removals_reload_without_announcements() {
    let store = Arc::new(MemoryPostStore::with_posts([
        post_at("A", "a", 0),
        post_at("B", "b", 1),
    ]));
    let repo = repository(store.clone());
    repo.init().await.expect("initial load");
    let mut changes = record_changes(&repo);

    store.remove("B").await;
    let RefreshOutcome::Reloaded(diff) = repo.refresh_now().await.expect("refresh") else {
        panic!("count shrank, reload expected");
    };
    assert_eq!(diff.removed, vec![PostId::new("B")]);
    assert!(repo.get("B").is_none());
    assert_eq!(repo.adjacent("A"), (None, None));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(changes.try_recv().is_err());
}

#[tokio::test]
async fn saved_posts_appear_after_refresh() {
    let store = Arc::new(MemoryPostStore::new());
    let repo = repository(store.clone());
    repo.init().await.expect("initial load");

    let mut draft = repo.create_new(UserId::new("author"));
    draft.markdown = "%%%\ntitle = \"From Front Matter\"\n%%%\nbody".to_string();
    let saved = repo.save_new(draft).await.expect("saved");

    assert_eq!(saved.title, "From Front Matter");
    assert!(!saved.fingerprint.is_empty());
    assert!(repo.get(saved.id.as_str()).is_none());

    repo.refresh_now().await.expect("refresh");
    let loaded = repo.get(saved.id.as_str()).expect("visible after refresh");
    assert_eq!(loaded.title, "From Front Matter");
}

#[tokio::test]
async fn untitled_posts_get_a_dated_label() {
    let store = Arc::new(MemoryPostStore::new());
    let repo = repository(store);

    let mut draft = repo.create_new(UserId::new("author"));
    draft.markdown = "no front matter".to_string();
    let saved = repo.save_new(draft).await.expect("saved");
    assert!(saved.title.starts_with("Untitled - "), "{}", saved.title);
}

#[tokio::test]
async fn duplicate_and_missing_writes_are_reported() {
    let existing = post_at("A", "a", 0);
    let store = Arc::new(MemoryPostStore::with_posts([existing.clone()]));
    let repo = repository(store);

    assert!(matches!(
        repo.save_new(existing).await,
        Err(RepoError::Duplicate { .. })
    ));
    assert!(matches!(
        repo.update_content(post_at("ghost", "x", 0)).await,
        Err(RepoError::NotFound { .. })
    ));
}

#[tokio::test]
async fn init_twice_is_rejected() {
    let repo = repository(Arc::new(MemoryPostStore::new()));
    repo.init().await.expect("first init");
    assert!(matches!(
        repo.init().await,
        Err(ContentError::AlreadyInitialized)
    ));
}

/// Store that fails on demand.
struct FlakyStore {
    inner: MemoryPostStore,
    failing: AtomicBool,
}

impl FlakyStore {
    fn new(posts: impl IntoIterator<Item = Post>) -> Self {
        Self {
            inner: MemoryPostStore::with_posts(posts),
            failing: AtomicBool::new(false),
        }
    }

    fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("store offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl PostStore for FlakyStore {
    fn kind(&self) -> &'static str {
        "flaky"
    }

    async fn list_all(&self) -> Result<Vec<Post>, RepoError> {
        self.check()?;
        self.inner.list_all().await
    }

    async fn insert(&self, post: &Post) -> Result<(), RepoError> {
        self.check()?;
        self.inner.insert(post).await
    }

    async fn update_content(&self, post: &Post) -> Result<(), RepoError> {
        self.check()?;
        self.inner.update_content(post).await
    }
}

#[tokio::test]
async fn failed_refresh_keeps_the_last_good_snapshot() {
    let store = Arc::new(FlakyStore::new([post_at("A", "a", 0)]));
    let repo = repository(store.clone());
    repo.init().await.expect("initial load");

    store.fail(true);
    assert!(repo.refresh_now().await.is_err());
    assert_eq!(repo.all().len(), 1);
    assert!(repo.get("A").is_some());

    store.fail(false);
    assert!(repo.refresh_now().await.is_ok());
}

#[tokio::test]
async fn failed_initial_load_can_be_retried() {
    let store = Arc::new(FlakyStore::new([post_at("A", "a", 0)]));
    store.fail(true);
    let repo = repository(store.clone());

    assert!(matches!(
        repo.init().await,
        Err(ContentError::InitialLoad(_))
    ));

    store.fail(false);
    repo.init().await.expect("retry after failure");
    assert!(repo.get("A").is_some());
}

#[tokio::test]
async fn refresh_loop_publishes_on_its_own() {
    let store = Arc::new(MemoryPostStore::with_posts([post_at("A", "a", 0)]));
    let repo = repository(store.clone());
    repo.set_refresh_interval(Duration::from_millis(20));
    let mut changes = record_changes(&repo);
    let handle = repo.start().await.expect("start");

    store.upsert(post_at("B", "b", 1)).await;
    let seen = drain(&mut changes, 1).await;
    assert!(seen.contains("B"));
    assert!(repo.get("B").is_some());

    handle.abort();
}

/// Every listing is one consistent generation of the same fifty posts.
struct GenerationStore {
    generation: AtomicU64,
}

#[async_trait]
impl PostStore for GenerationStore {
    fn kind(&self) -> &'static str {
        "generations"
    }

    async fn list_all(&self) -> Result<Vec<Post>, RepoError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let body = format!("generation {generation}");
        tokio::task::yield_now().await;
        Ok((0..50)
            .map(|i| {
                let mut post = post_at(&format!("post-{i}"), &body, i);
                post.modified_at = OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(i);
                post
            })
            .collect())
    }

    async fn probe(&self) -> Result<Option<StoreProbe>, RepoError> {
        Ok(None)
    }

    async fn insert(&self, _post: &Post) -> Result<(), RepoError> {
        Ok(())
    }

    async fn update_content(&self, _post: &Post) -> Result<(), RepoError> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_a_mixed_snapshot() {
    let repo = repository(Arc::new(GenerationStore {
        generation: AtomicU64::new(0),
    }));
    repo.init().await.expect("initial load");

    let writer = {
        let repo = Arc::clone(&repo);
        tokio::spawn(async move {
            for _ in 0..100 {
                repo.refresh_now().await.expect("refresh");
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                for _ in 0..500 {
                    let snapshot = repo.all();
                    assert_eq!(snapshot.len(), 50);
                    let first = &snapshot.posts()[0].markdown;
                    assert!(snapshot.posts().iter().all(|p| &p.markdown == first));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.expect("writer finished");
    for reader in readers {
        reader.await.expect("reader finished");
    }
}
