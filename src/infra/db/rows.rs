use time::OffsetDateTime;

use crate::domain::{
    fingerprint::Fingerprint,
    posts::{Post, PostId, UserId},
};

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) markdown: String,
    pub(crate) fingerprint: String,
    pub(crate) owner_id: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) modified_at: OffsetDateTime,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: PostId::from(row.id),
            title: row.title,
            markdown: row.markdown,
            fingerprint: Fingerprint::from_hex(row.fingerprint),
            created_at: row.created_at,
            modified_at: row.modified_at,
            owner: UserId::new(row.owner_id),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ProbeRow {
    pub(crate) latest_modified: Option<OffsetDateTime>,
    pub(crate) total: i64,
}
