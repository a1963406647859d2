use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::DebuggingRecorder;
use the_archive::application::content::ContentRepository;
use the_archive::application::notify::{ChangeNotifier, RELOAD_MESSAGE};
use the_archive::application::render::{ComrakRenderService, DEFAULT_THEME};
use the_archive::cache::RenderCache;
use the_archive::domain::fingerprint::Fingerprint;
use the_archive::domain::posts::{Post, PostId, UserId};
use the_archive::infra::cache_warmer::CacheWarmer;
use the_archive::infra::memory::MemoryPostStore;

fn post(id: &str, body: &str) -> Post {
    let mut post = Post::blank(UserId::new("author"));
    post.id = PostId::new(id);
    post.markdown = body.to_string();
    post.refresh_fingerprint();
    post
}

#[tokio::test]
async fn sync_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let store = Arc::new(MemoryPostStore::with_posts([post("a", "# A")]));
    let content = Arc::new(ContentRepository::new(store.clone(), Duration::from_secs(60)));
    content.init().await.expect("init");
    content.refresh_now().await.expect("unchanged refresh");
    store.upsert(post("b", "# B")).await;
    content.refresh_now().await.expect("reload");

    let renders = Arc::new(RenderCache::new(Arc::new(ComrakRenderService::new())));
    let fingerprint = Fingerprint::of("# A");
    renders
        .render_cached("# A", &fingerprint, DEFAULT_THEME)
        .expect("miss");
    renders
        .render_cached("# A", &fingerprint, DEFAULT_THEME)
        .expect("hit");
    renders
        .render_cached("# A", &Fingerprint::empty(), DEFAULT_THEME)
        .expect("bypass");

    CacheWarmer::new(Arc::clone(&content), Arc::clone(&renders))
        .warm_snapshot(DEFAULT_THEME)
        .await
        .expect("warm");

    let notifier = ChangeNotifier::new(1);
    let _stalled = notifier.subscribe(PostId::new("a"));
    notifier.notify(&PostId::new("a"), RELOAD_MESSAGE);
    notifier.notify(&PostId::new("a"), RELOAD_MESSAGE);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "archive_render_cache_hit_total",
        "archive_render_cache_miss_total",
        "archive_render_bypass_total",
        "archive_content_reload_total",
        "archive_content_probe_skip_total",
        "archive_content_reload_ms",
        "archive_content_posts",
        "archive_live_delivered_total",
        "archive_live_dropped_total",
        "archive_cache_warm_ms",
    ];
    for name in expected {
        assert!(names.contains(name), "missing metric `{name}`");
    }
}
