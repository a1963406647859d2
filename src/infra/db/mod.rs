//! Postgres-backed post store.

mod rows;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::{
    application::repos::{PostStore, RepoError, StoreProbe},
    domain::posts::Post,
    infra::error::InfraError,
};

use rows::{PostRow, ProbeRow};

#[derive(Clone)]
pub struct PostgresPostStore {
    pool: Arc<PgPool>,
}

impl PostgresPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, InfraError> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(InfraError::database)
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), InfraError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(InfraError::migration)
    }
}

#[async_trait]
impl PostStore for PostgresPostStore {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn list_all(&self) -> Result<Vec<Post>, RepoError> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, title, markdown, fingerprint, owner_id, created_at, modified_at
            FROM posts
            ORDER BY modified_at DESC, id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(RepoError::from_persistence)?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn probe(&self) -> Result<Option<StoreProbe>, RepoError> {
        let row = sqlx::query_as::<_, ProbeRow>(
            "SELECT MAX(modified_at) AS latest_modified, COUNT(*) AS total FROM posts",
        )
        .fetch_one(self.pool())
        .await
        .map_err(RepoError::from_persistence)?;

        Ok(Some(StoreProbe {
            latest_modified: row.latest_modified,
            count: util::convert_count(row.total)?,
        }))
    }

    async fn insert(&self, post: &Post) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, title, markdown, fingerprint, owner_id, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(post.id.as_str())
        .bind(&post.title)
        .bind(&post.markdown)
        .bind(post.fingerprint.as_str())
        .bind(post.owner.as_str())
        .bind(post.created_at)
        .bind(post.modified_at)
        .execute(self.pool())
        .await
        .map_err(|err| map_sqlx_error(err, post.id.as_str()))?;
        Ok(())
    }

    async fn update_content(&self, post: &Post) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = $2, markdown = $3, fingerprint = $4, modified_at = $5
            WHERE id = $1
            "#,
        )
        .bind(post.id.as_str())
        .bind(&post.title)
        .bind(&post.markdown)
        .bind(post.fingerprint.as_str())
        .bind(post.modified_at)
        .execute(self.pool())
        .await
        .map_err(|err| map_sqlx_error(err, post.id.as_str()))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::not_found(&post.id));
        }
        Ok(())
    }
}
