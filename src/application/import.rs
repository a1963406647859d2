//! Bulk import of a directory of markdown files into the configured store.

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;
use tokio::fs;
use tracing::{info, warn};

use crate::{
    application::{content::ContentRepository, repos::RepoError},
    domain::{
        front_matter,
        posts::{Post, UserId},
    },
};

const MARKDOWN_EXTENSION: &str = "md";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read import directory `{path}`: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
enum FileError {
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),
    #[error("file is not valid UTF-8")]
    Encoding,
    #[error(transparent)]
    Store(#[from] RepoError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: Vec<PathBuf>,
}

/// Save every `*.md` file directly inside `dir` as a new post owned by `owner`.
///
/// Titles come from the front matter, else the file stem. `created_at` uses the
/// front-matter date when it parses, else the file's modification time, which
/// is also used for `modified_at`. A failing file is logged and skipped.
pub async fn import_directory(
    content: &ContentRepository,
    dir: &Path,
    owner: &UserId,
) -> Result<ImportReport, ImportError> {
    let directory_error = |source| ImportError::Directory {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir).await.map_err(directory_error)?;
    while let Some(entry) = entries.next_entry().await.map_err(directory_error)? {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|kind| kind.is_file())
            .unwrap_or(false);
        if is_file && path.extension().is_some_and(|ext| ext == MARKDOWN_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();

    let mut report = ImportReport::default();
    for path in files {
        match import_file(content, &path, owner).await {
            Ok(post) => {
                info!(
                    target = "the_archive::import",
                    file = %path.display(),
                    post_id = %post.id,
                    title = %post.title,
                    "imported post"
                );
                report.imported += 1;
            }
            Err(err) => {
                warn!(
                    target = "the_archive::import",
                    file = %path.display(),
                    error = %err,
                    "skipping file"
                );
                report.skipped.push(path);
            }
        }
    }

    info!(
        target = "the_archive::import",
        directory = %dir.display(),
        imported = report.imported,
        skipped = report.skipped.len(),
        "import finished"
    );
    Ok(report)
}

async fn import_file(
    content: &ContentRepository,
    path: &Path,
    owner: &UserId,
) -> Result<Post, FileError> {
    let bytes = fs::read(path).await?;
    let markdown = String::from_utf8(bytes).map_err(|_| FileError::Encoding)?;
    let modified = fs::metadata(path)
        .await?
        .modified()
        .map(OffsetDateTime::from)
        .unwrap_or_else(|_| OffsetDateTime::now_utc());

    let declared = front_matter::split(&markdown).ok().flatten();
    let title = declared
        .as_ref()
        .and_then(|split| split.front_matter.title())
        .map(str::to_string)
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_default();
    let created = declared
        .as_ref()
        .and_then(|split| split.front_matter.timestamp())
        .unwrap_or(modified);

    let mut post = content.create_new(owner.clone());
    post.title = title;
    post.markdown = markdown;
    post.created_at = created;
    post.modified_at = modified;

    Ok(content.save_new(post).await?)
}
