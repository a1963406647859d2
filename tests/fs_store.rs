use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use the_archive::application::content::{ContentRepository, RefreshOutcome};
use the_archive::application::import::import_directory;
use the_archive::application::repos::{PostStore, RepoError};
use the_archive::domain::fingerprint::Fingerprint;
use the_archive::domain::posts::UserId;
use the_archive::infra::fs::FsPostStore;
use the_archive::infra::memory::MemoryPostStore;
use time::macros::datetime;

#[tokio::test]
async fn lists_markdown_files_by_stem() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("hello.md"),
        "%%%\ntitle = \"Hello There\"\n%%%\nbody",
    )
    .expect("write");
    fs::write(dir.path().join("plain.md"), "no title block").expect("write");
    fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

    let store = FsPostStore::open(dir.path()).await.expect("open");
    let mut posts = store.list_all().await.expect("list");
    posts.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].id.as_str(), "hello");
    assert_eq!(posts[0].title, "Hello There");
    assert_eq!(posts[1].title, "plain");
    assert_eq!(posts[1].fingerprint, Fingerprint::of("no title block"));
    assert_eq!(store.probe().await.expect("probe"), None);
}

#[tokio::test]
async fn open_creates_a_missing_directory() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().join("nested").join("posts");
    let store = FsPostStore::open(&root).await.expect("open");
    assert!(root.is_dir());
    assert!(store.list_all().await.expect("list").is_empty());
}

#[tokio::test]
async fn writes_go_through_to_files() {
    let dir = TempDir::new().expect("tempdir");
    let store = Arc::new(FsPostStore::open(dir.path()).await.expect("open"));
    let repo = ContentRepository::new(store.clone(), Duration::from_secs(60));
    repo.init().await.expect("init");

    let mut post = repo.create_new(UserId::new("author"));
    post.markdown = "first".to_string();
    let saved = repo.save_new(post).await.expect("save");

    let path = dir.path().join(format!("{}.md", saved.id));
    assert_eq!(fs::read_to_string(&path).expect("file written"), "first");

    assert!(matches!(
        store.insert(&saved).await,
        Err(RepoError::Duplicate { .. })
    ));

    let mut edited = saved.clone();
    edited.markdown = "second".to_string();
    repo.update_content(edited).await.expect("update");
    assert_eq!(fs::read_to_string(&path).expect("file rewritten"), "second");

    repo.refresh_now().await.expect("refresh");
    let loaded = repo.get(saved.id.as_str()).expect("visible after refresh");
    assert_eq!(loaded.fingerprint, Fingerprint::of("second"));
}

#[tokio::test]
async fn unreadable_file_fails_the_refresh_and_keeps_the_snapshot() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("p.md");
    fs::write(&path, "stays").expect("write");

    let store = Arc::new(FsPostStore::open(dir.path()).await.expect("open"));
    let repo = ContentRepository::new(store.clone(), Duration::from_secs(60));
    repo.init().await.expect("init");

    // A directory under a post's file name cannot be read as a file.
    fs::remove_file(&path).expect("remove");
    fs::create_dir(&path).expect("mkdir");

    assert!(matches!(
        store.list_all().await,
        Err(RepoError::Persistence(_))
    ));
    assert!(repo.refresh_now().await.is_err());
    let kept = repo.get("p").expect("last good snapshot still published");
    assert_eq!(kept.markdown, "stays");

    fs::remove_dir(&path).expect("rmdir");
    fs::write(&path, "stays").expect("restore");

    match repo.refresh_now().await.expect("refresh after recovery") {
        RefreshOutcome::Reloaded(diff) => {
            assert!(diff.added.is_empty(), "recovered post is not new: {diff:?}");
            assert!(diff.removed.is_empty());
            assert!(diff.changed.is_empty());
        }
        RefreshOutcome::Unchanged => panic!("filesystem store always reloads"),
    }
}

#[tokio::test]
async fn ids_that_escape_the_directory_are_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let store = FsPostStore::open(dir.path()).await.expect("open");
    let mut post = the_archive::domain::posts::Post::blank(UserId::new("a"));
    post.id = "../outside".into();

    assert!(matches!(
        store.insert(&post).await,
        Err(RepoError::InvalidInput { .. })
    ));
}

#[tokio::test]
async fn import_keeps_titles_and_declared_dates() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("dated.md"),
        "%%%\ntitle = \"Dated\"\ndate = 2021-02-03T04:05:06Z\n%%%\nbody",
    )
    .expect("write");
    fs::write(dir.path().join("from-stem.md"), "just text").expect("write");
    fs::write(dir.path().join("broken.md"), [0xff, 0xfe, 0x00]).expect("write");
    fs::create_dir(dir.path().join("nested.md")).expect("mkdir");

    let store = Arc::new(MemoryPostStore::new());
    let repo = ContentRepository::new(store.clone(), Duration::from_secs(60));
    let report = import_directory(&repo, dir.path(), &UserId::new("importer"))
        .await
        .expect("import");

    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped.len(), 1);

    let posts = store.list_all().await.expect("list");
    let dated = posts.iter().find(|p| p.title == "Dated").expect("dated post");
    assert_eq!(dated.created_at, datetime!(2021-02-03 04:05:06 UTC));
    assert_eq!(dated.owner, UserId::new("importer"));
    assert!(posts.iter().any(|p| p.title == "from-stem"));
}

#[tokio::test]
async fn import_of_a_missing_directory_fails() {
    let dir = TempDir::new().expect("tempdir");
    let repo = ContentRepository::new(Arc::new(MemoryPostStore::new()), Duration::from_secs(60));
    assert!(
        import_directory(&repo, &dir.path().join("absent"), &UserId::new("x"))
            .await
            .is_err()
    );
}
