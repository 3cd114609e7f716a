use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use inkwell_common::{
    BODY_FIELD_NAME, CONTENT_TABLE_NAME, CREATED_FIELD_NAME, ContentId,
    DELIVERY_INTENT_FIELD_NAME, EXCERPT_FIELD_NAME, ID_FIELD_NAME, KIND_FIELD_NAME,
    PUBLISHED_FIELD_NAME, SCHEDULED_FIELD_NAME, STATUS_FIELD_NAME, TITLE_FIELD_NAME,
    UPDATED_FIELD_NAME, VERSION_FIELD_NAME, VISIBILITY_FIELD_NAME,
    content::{ContentRecord, ContentStatus, ContentTitle},
    database::Database,
    error::TransitionError,
};
use sqlx::{Row, postgres::PgRow, types::Uuid};

use crate::domain::repository::{ContentRepository, RepositoryError};

/// Common columns, in bind order for inserts and updates
const COLUMNS: [&str; 13] = [
    ID_FIELD_NAME,
    KIND_FIELD_NAME,
    TITLE_FIELD_NAME,
    BODY_FIELD_NAME,
    EXCERPT_FIELD_NAME,
    STATUS_FIELD_NAME,
    SCHEDULED_FIELD_NAME,
    PUBLISHED_FIELD_NAME,
    VISIBILITY_FIELD_NAME,
    DELIVERY_INTENT_FIELD_NAME,
    CREATED_FIELD_NAME,
    UPDATED_FIELD_NAME,
    VERSION_FIELD_NAME,
];

static SELECT_SQL: LazyLock<String> = LazyLock::new(|| {
    format!("SELECT {} FROM {}", COLUMNS.join(", "), CONTENT_TABLE_NAME)
});

static INSERT_SQL: LazyLock<String> = LazyLock::new(|| {
    let placeholders = (1..=COLUMNS.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        CONTENT_TABLE_NAME,
        COLUMNS.join(", "),
        placeholders
    )
});

/// Insert or replace everything but the id
static UPSERT_SQL: LazyLock<String> = LazyLock::new(|| {
    let updates = COLUMNS[1..]
        .iter()
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} ON CONFLICT ({}) DO UPDATE SET {}", *INSERT_SQL, ID_FIELD_NAME, updates)
});

/// Insert that hands back the row as stored
static CREATE_SQL: LazyLock<String> =
    LazyLock::new(|| format!("{} RETURNING {}", *INSERT_SQL, COLUMNS.join(", ")));

/// Rewrite of a locked row, guarded by the version read under the lock.
/// Returns the row as stored, so timestamps come back at column precision.
static UPDATE_SQL: LazyLock<String> = LazyLock::new(|| {
    let assignments = COLUMNS[1..]
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{c} = ${}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE {} = $1 AND {} = ${} RETURNING {}",
        CONTENT_TABLE_NAME,
        assignments,
        ID_FIELD_NAME,
        VERSION_FIELD_NAME,
        COLUMNS.len() + 1,
        COLUMNS.join(", ")
    )
});

#[derive(Clone)]
pub struct PostgresContentRepository {
    database: &'static Database,
}

impl PostgresContentRepository {
    pub fn new(database: &'static Database) -> Self {
        Self { database }
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

/// Binds all columns of `record` in `COLUMNS` order
fn bind_record<'q>(query: PgQuery<'q>, record: &'q ContentRecord) -> PgQuery<'q> {
    query
        .bind(record.id.0)
        .bind(record.kind.as_str())
        .bind(record.title.as_ref())
        .bind(record.body.as_str())
        .bind(record.excerpt.as_deref())
        .bind(record.status.as_str())
        .bind(record.scheduled_at)
        .bind(record.published_at)
        .bind(record.visibility.as_str())
        .bind(record.delivery_intent.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.version)
}

fn row_to_record(row: &PgRow) -> Result<ContentRecord, RepositoryError> {
    let text = |name: &str| row.try_get::<String, _>(name).map_err(db_error);

    let id: Uuid = row.try_get(ID_FIELD_NAME).map_err(db_error)?;
    let title = ContentTitle::try_new(text(TITLE_FIELD_NAME)?).map_err(corrupt)?;

    Ok(ContentRecord {
        id: ContentId(id),
        kind: text(KIND_FIELD_NAME)?.parse().map_err(corrupt)?,
        title,
        body: text(BODY_FIELD_NAME)?,
        excerpt: row.try_get(EXCERPT_FIELD_NAME).map_err(db_error)?,
        status: text(STATUS_FIELD_NAME)?.parse().map_err(corrupt)?,
        scheduled_at: row
            .try_get::<Option<DateTime<Utc>>, _>(SCHEDULED_FIELD_NAME)
            .map_err(db_error)?,
        published_at: row
            .try_get::<Option<DateTime<Utc>>, _>(PUBLISHED_FIELD_NAME)
            .map_err(db_error)?,
        visibility: text(VISIBILITY_FIELD_NAME)?.parse().map_err(corrupt)?,
        delivery_intent: text(DELIVERY_INTENT_FIELD_NAME)?.parse().map_err(corrupt)?,
        created_at: row.try_get(CREATED_FIELD_NAME).map_err(db_error)?,
        updated_at: row.try_get(UPDATED_FIELD_NAME).map_err(db_error)?,
        version: row.try_get(VERSION_FIELD_NAME).map_err(db_error)?,
    })
}

fn db_error(e: sqlx::Error) -> RepositoryError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return RepositoryError::Conflict;
        }
    }
    RepositoryError::DatabaseError(e.to_string())
}

fn corrupt(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DatabaseError(format!("malformed content row: {}", e))
}

impl ContentRepository for PostgresContentRepository {
    async fn find_by_id(&self, id: ContentId) -> Result<Option<ContentRecord>, RepositoryError> {
        let sql = format!("{} WHERE {} = $1", *SELECT_SQL, ID_FIELD_NAME);
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(self.database.database_pool())
            .await
            .map_err(db_error)?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn create(&self, record: ContentRecord) -> Result<ContentRecord, RepositoryError> {
        let row = bind_record(sqlx::query(&CREATE_SQL), &record)
            .fetch_one(self.database.database_pool())
            .await
            .map_err(db_error)?;
        row_to_record(&row)
    }

    async fn put(&self, record: ContentRecord) -> Result<(), RepositoryError> {
        bind_record(sqlx::query(&UPSERT_SQL), &record)
            .execute(self.database.database_pool())
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn cas_update<F>(
        &self,
        id: ContentId,
        expected: ContentStatus,
        mutator: F,
    ) -> Result<ContentRecord, RepositoryError>
    where
        F: FnOnce(&mut ContentRecord) -> Result<(), TransitionError> + Send,
    {
        let mut transaction = self
            .database
            .database_pool()
            .begin()
            .await
            .map_err(db_error)?;

        let sql = format!("{} WHERE {} = $1 FOR UPDATE", *SELECT_SQL, ID_FIELD_NAME);
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&mut *transaction)
            .await
            .map_err(db_error)?
            .ok_or(RepositoryError::NotFound)?;
        let current = row_to_record(&row)?;

        if current.status != expected {
            return Err(RepositoryError::Conflict);
        }

        let mut next = current.clone();
        mutator(&mut next)?;
        next.version = current.version + 1;
        next.updated_at = Utc::now();

        let row = bind_record(sqlx::query(&UPDATE_SQL), &next)
            .bind(current.version)
            .fetch_optional(&mut *transaction)
            .await
            .map_err(db_error)?
            .ok_or(RepositoryError::Conflict)?;
        let stored = row_to_record(&row)?;

        transaction.commit().await.map_err(db_error)?;
        Ok(stored)
    }

    async fn list_by_status(
        &self,
        status: ContentStatus,
    ) -> Result<Vec<ContentRecord>, RepositoryError> {
        let sql = format!("{} WHERE {} = $1", *SELECT_SQL, STATUS_FIELD_NAME);
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(self.database.database_pool())
            .await
            .map_err(db_error)?;

        rows.iter().map(row_to_record).collect()
    }

    async fn delete(&self, id: ContentId) -> Result<(), RepositoryError> {
        let sql = format!("DELETE FROM {} WHERE {} = $1", CONTENT_TABLE_NAME, ID_FIELD_NAME);
        let deleted = sqlx::query(&sql)
            .bind(id.0)
            .execute(self.database.database_pool())
            .await
            .map_err(db_error)?;

        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_sql_is_guarded_by_version() {
        assert!(UPDATE_SQL.starts_with("UPDATE content_records SET kind = $2, title = $3"));
        assert!(UPDATE_SQL.contains("WHERE id = $1 AND version = $14 RETURNING id, kind"));
    }

    #[test]
    fn test_writes_read_back_the_stored_row() {
        let returning = format!("RETURNING {}", COLUMNS.join(", "));
        assert!(CREATE_SQL.starts_with("INSERT INTO content_records (id, kind"));
        assert!(CREATE_SQL.ends_with(&returning));
        assert!(UPDATE_SQL.ends_with(&returning));
        assert!(!UPSERT_SQL.contains("RETURNING"));
    }

    #[test]
    fn test_upsert_sql_keeps_id() {
        assert!(UPSERT_SQL.contains("VALUES ($1, $2, $3"));
        assert!(UPSERT_SQL.contains("ON CONFLICT (id) DO UPDATE SET kind = EXCLUDED.kind"));
        assert!(!UPSERT_SQL.contains("id = EXCLUDED.id"));
    }
}
