//! Directory of `<id>.md` files as a post store.
//!
//! The file stem is the post id, the front-matter title (or the stem) is the
//! title, and the file modification time stands in for both timestamps. There
//! is no cheap probe, so every refresh lists the directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};
use tracing::warn;

use crate::{
    application::repos::{PostStore, RepoError},
    domain::{
        fingerprint::Fingerprint,
        front_matter,
        posts::{Post, PostId, UserId},
    },
    infra::error::InfraError,
};

const EXTENSION: &str = "md";

pub struct FsPostStore {
    root: PathBuf,
    owner: UserId,
}

impl FsPostStore {
    /// Open `root`, creating it when missing.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, InfraError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|err| InfraError::content_directory(&root, err.to_string()))?;
        let metadata = fs::metadata(&root)
            .await
            .map_err(|err| InfraError::content_directory(&root, err.to_string()))?;
        if !metadata.is_dir() {
            return Err(InfraError::content_directory(&root, "not a directory"));
        }
        Ok(Self {
            root,
            owner: UserId::default(),
        })
    }

    /// Owner reported for every listed post; files carry no owner of their own.
    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = owner;
        self
    }

    fn path_for(&self, id: &PostId) -> Result<PathBuf, RepoError> {
        let raw = id.as_str();
        let usable = !raw.is_empty()
            && raw != "."
            && raw != ".."
            && !raw.contains(['/', '\\', '\0']);
        if !usable {
            return Err(RepoError::invalid_input(format!(
                "`{raw}` cannot be used as a file name"
            )));
        }
        Ok(self.root.join(format!("{raw}.{EXTENSION}")))
    }

    async fn read_post(&self, path: &Path) -> Result<Option<Post>, std::io::Error> {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return Ok(None);
        };
        let bytes = fs::read(path).await?;
        let modified = fs::metadata(path)
            .await?
            .modified()
            .map(OffsetDateTime::from)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());

        let fingerprint = Fingerprint::of(&bytes);
        let markdown = String::from_utf8_lossy(&bytes).into_owned();
        let title = front_matter::declared_title(&markdown).unwrap_or_else(|| stem.to_string());

        Ok(Some(Post {
            id: PostId::new(stem),
            title,
            markdown,
            fingerprint,
            created_at: modified,
            modified_at: modified,
            owner: self.owner.clone(),
        }))
    }
}

#[async_trait]
impl PostStore for FsPostStore {
    fn kind(&self) -> &'static str {
        "filesystem"
    }

    async fn list_all(&self) -> Result<Vec<Post>, RepoError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(RepoError::from_persistence)?;

        let mut posts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(RepoError::from_persistence)?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != EXTENSION) {
                continue;
            }
            match self.read_post(&path).await {
                Ok(Some(post)) => posts.push(post),
                Ok(None) => {}
                // Removed between `read_dir` and the read.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => warn!(
                    target = "the_archive::store::fs",
                    file = %path.display(),
                    "post file vanished during listing"
                ),
                Err(err) => {
                    return Err(RepoError::from_persistence(format!(
                        "{}: {err}",
                        path.display()
                    )));
                }
            }
        }
        Ok(posts)
    }

    async fn insert(&self, post: &Post) -> Result<(), RepoError> {
        let path = self.path_for(&post.id)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::AlreadyExists => RepoError::duplicate(&post.id),
                _ => RepoError::from_persistence(err),
            })?;
        file.write_all(post.markdown.as_bytes())
            .await
            .map_err(RepoError::from_persistence)?;
        file.flush().await.map_err(RepoError::from_persistence)
    }

    async fn update_content(&self, post: &Post) -> Result<(), RepoError> {
        let path = self.path_for(&post.id)?;
        if !fs::try_exists(&path)
            .await
            .map_err(RepoError::from_persistence)?
        {
            return Err(RepoError::not_found(&post.id));
        }
        fs::write(&path, post.markdown.as_bytes())
            .await
            .map_err(RepoError::from_persistence)
    }
}
