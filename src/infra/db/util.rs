use crate::application::repos::RepoError;

/// Map a driver error onto the store taxonomy. `id` names the post involved
/// for duplicate and missing-row reports.
pub fn map_sqlx_error(err: sqlx::Error, id: &str) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound { id: id.to_string() },
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Duplicate {
            id: id.to_string(),
        },
        sqlx::Error::Database(db)
            if db.is_check_violation() || db.message().contains("invalid input syntax") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        other => RepoError::from_persistence(other),
    }
}

pub fn convert_count(value: i64) -> Result<u64, RepoError> {
    value
        .try_into()
        .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
}
