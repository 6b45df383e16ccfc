//! Media blob persistence

use apollo_common::db::MediaBlob;
use apollo_common::Result;
use sqlx::{Executor, Sqlite, SqlitePool};

/// Store a media payload; returns its id
pub async fn insert_media<'e, E>(
    executor: E,
    owner_id: i64,
    file_type: &str,
    file_name: &str,
    file_data: &[u8],
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO media_storage (owner_id, file_type, file_name, file_data) VALUES (?, ?, ?, ?)",
    )
    .bind(owner_id)
    .bind(file_type)
    .bind(file_name)
    .bind(file_data)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_media(pool: &SqlitePool, media_id: i64) -> Result<Option<MediaBlob>> {
    let blob = sqlx::query_as(
        "SELECT media_id, owner_id, file_data, file_type, file_name FROM media_storage WHERE media_id = ?",
    )
    .bind(media_id)
    .fetch_optional(pool)
    .await?;

    Ok(blob)
}
