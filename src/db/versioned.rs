//! Append-only versioned entity storage.
//!
//! Every entity is one row in a head table (columns fixed at creation) plus one
//! immutable row per version in a versions table keyed by `(entity_id, version)`.
//! The current state is always the row with the highest version number; nothing
//! here ever updates or deletes a version row.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{QueryBuilder, Row, SqliteConnection, SqlitePool};

use crate::errors::AppError;
use crate::models::Page;

/// A prepared SQLite statement with owned bind values.
pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Table layout and row mapping of one kind of versioned entity.
pub trait EntityKind: Clone + std::fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Human readable name used in error messages and logs.
    const LABEL: &'static str;
    /// Table with the `id` primary key and the fixed columns.
    const HEAD_TABLE: &'static str;
    /// Table with one row per version, keyed by `(entity_id, version)`.
    const VERSION_TABLE: &'static str;
    /// Fixed columns, in the order `bind_head` binds them.
    const HEAD_COLUMNS: &'static [&'static str];
    /// Versioned columns, in the order `bind_content` binds them.
    const CONTENT_COLUMNS: &'static [&'static str];
    /// Versioned column lists are ordered by.
    const SORT_COLUMN: &'static str = "name";

    type Head: Clone + std::fmt::Debug + PartialEq + Send + Sync;
    type Content: Clone + std::fmt::Debug + PartialEq + Send + Sync;

    fn bind_head<'q>(query: SqliteQuery<'q>, head: &Self::Head) -> SqliteQuery<'q>;
    fn bind_content<'q>(query: SqliteQuery<'q>, content: &Self::Content) -> SqliteQuery<'q>;
    fn head_from_row(row: &SqliteRow) -> Result<Self::Head, AppError>;
    fn content_from_row(row: &SqliteRow) -> Result<Self::Content, AppError>;
}

/// One immutable snapshot of an entity, composed with its fixed columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<K: EntityKind> {
    pub id: String,
    pub head: K::Head,
    pub content: K::Content,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl<K: EntityKind> Versioned<K> {
    /// The same content re-published as the given version.
    pub fn as_version(&self, version: i64) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }
}

/// Generic store over one entity kind.
pub struct VersionStore<K: EntityKind> {
    pool: SqlitePool,
    _kind: PhantomData<K>,
}

impl<K: EntityKind> Clone for VersionStore<K> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

impl<K: EntityKind> VersionStore<K> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _kind: PhantomData,
        }
    }

    /// Allocate a new entity id, write the fixed columns once and append version 1.
    pub async fn create(
        &self,
        head: K::Head,
        content: K::Content,
    ) -> Result<Versioned<K>, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let head_sql = format!(
            "INSERT INTO {} (id, {}) VALUES (?{})",
            K::HEAD_TABLE,
            K::HEAD_COLUMNS.join(", "),
            ", ?".repeat(K::HEAD_COLUMNS.len())
        );
        let version_sql = format!(
            "INSERT INTO {} (entity_id, version, {}, created_at) VALUES (?, 1{}, ?)",
            K::VERSION_TABLE,
            K::CONTENT_COLUMNS.join(", "),
            ", ?".repeat(K::CONTENT_COLUMNS.len())
        );

        // Use a transaction so a head row never exists without its first version
        let mut tx = self.pool.begin().await?;

        K::bind_head(sqlx::query(&head_sql).bind(id.clone()), &head)
            .execute(&mut *tx)
            .await?;
        K::bind_content(sqlx::query(&version_sql).bind(id.clone()), &content)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let created = fetch_exact::<K>(&mut tx, &id, 1)
            .await?
            .ok_or_else(|| not_found::<K>(&id))?;

        tx.commit().await?;

        tracing::info!("Created {} {} at version 1", K::LABEL, id);
        Ok(created)
    }

    /// Get the latest version of an entity.
    pub async fn get_latest(&self, id: &str) -> Result<Versioned<K>, AppError> {
        let sql = format!(
            "{} WHERE h.id = ? AND v.version = (SELECT MAX(version) FROM {} WHERE entity_id = h.id)",
            select_from::<K>(),
            K::VERSION_TABLE
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => from_row::<K>(&row),
            None => Err(not_found::<K>(id)),
        }
    }

    /// Get one exact version of an entity.
    pub async fn get_version(&self, id: &str, version: i64) -> Result<Versioned<K>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_exact::<K>(&mut conn, id, version)
            .await?
            .ok_or_else(|| {
                AppError::ResourceNotFound(format!("{} {} has no version {}", K::LABEL, id, version))
            })
    }

    /// Get the highest version number written for an entity.
    pub async fn get_latest_version_number(&self, id: &str) -> Result<i64, AppError> {
        let sql = format!(
            "SELECT MAX(version) AS latest FROM {} WHERE entity_id = ?",
            K::VERSION_TABLE
        );
        let latest: Option<i64> = sqlx::query(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?
            .try_get("latest")?;

        latest.ok_or_else(|| not_found::<K>(id))
    }

    /// Append `entity` as a brand-new version row.
    ///
    /// The caller computes `entity.version`; it must be exactly one above the
    /// current latest version. The check and the insert are one statement, so two
    /// writers racing for the same number cannot both succeed: the loser gets a
    /// `Conflict` carrying the version that won.
    pub async fn append_version(&self, entity: &Versioned<K>) -> Result<Versioned<K>, AppError> {
        let sql = format!(
            "INSERT INTO {table} (entity_id, version, {columns}, created_at) \
             SELECT ?, ?{placeholders}, ? \
             WHERE (SELECT COALESCE(MAX(version), 0) FROM {table} WHERE entity_id = ?) = ?",
            table = K::VERSION_TABLE,
            columns = K::CONTENT_COLUMNS.join(", "),
            placeholders = ", ?".repeat(K::CONTENT_COLUMNS.len()),
        );

        let query = sqlx::query(&sql)
            .bind(entity.id.clone())
            .bind(entity.version);
        let result = K::bind_content(query, &entity.content)
            .bind(Utc::now())
            .bind(entity.id.clone())
            .bind(entity.version - 1)
            .execute(&self.pool)
            .await;

        let latest_on_conflict = |current_version| AppError::Conflict {
            message: format!(
                "{} {} is at version {}, cannot append version {}",
                K::LABEL,
                entity.id,
                current_version,
                entity.version
            ),
            current_version,
        };

        match result {
            Ok(done) if done.rows_affected() == 1 => {}
            Ok(_) => {
                // Either the entity does not exist or another writer got there first
                let current = self.get_latest_version_number(&entity.id).await?;
                return Err(latest_on_conflict(current));
            }
            Err(err) => {
                return match AppError::from(err) {
                    AppError::Conflict { .. } => {
                        let current = self.get_latest_version_number(&entity.id).await?;
                        Err(latest_on_conflict(current))
                    }
                    other => Err(other),
                };
            }
        }

        tracing::info!(
            "Appended {} {} version {}",
            K::LABEL,
            entity.id,
            entity.version
        );
        self.get_version(&entity.id, entity.version).await
    }

    /// List the latest version of every entity matching `filter`, sorted by name
    /// and paginated.
    ///
    /// `filter` appends ` AND ...` conditions over the aliases `h` (head table)
    /// and `v` (latest version row).
    pub async fn list_latest<F>(&self, page: Page, filter: F) -> Result<Vec<Versioned<K>>, AppError>
    where
        F: FnOnce(&mut QueryBuilder<'static, Sqlite>),
    {
        let mut builder = QueryBuilder::new(format!(
            "{} JOIN (SELECT entity_id, MAX(version) AS latest FROM {} GROUP BY entity_id) AS lv \
             ON lv.entity_id = v.entity_id AND lv.latest = v.version WHERE 1 = 1",
            select_from::<K>(),
            K::VERSION_TABLE
        ));

        filter(&mut builder);

        builder
            .push(format!(" ORDER BY v.{} ASC, h.id ASC LIMIT ", K::SORT_COLUMN))
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(from_row::<K>).collect()
    }
}

fn not_found<K: EntityKind>(id: &str) -> AppError {
    AppError::ResourceNotFound(format!("{} {} not found", K::LABEL, id))
}

/// `SELECT ... FROM head AS h JOIN versions AS v` with every column aliased to its
/// bare name.
fn select_from<K: EntityKind>() -> String {
    let mut columns = vec!["h.id AS id".to_string()];
    columns.extend(K::HEAD_COLUMNS.iter().map(|c| format!("h.{c} AS {c}")));
    columns.push("v.version AS version".to_string());
    columns.push("v.created_at AS created_at".to_string());
    columns.extend(K::CONTENT_COLUMNS.iter().map(|c| format!("v.{c} AS {c}")));

    format!(
        "SELECT {} FROM {} AS h JOIN {} AS v ON v.entity_id = h.id",
        columns.join(", "),
        K::HEAD_TABLE,
        K::VERSION_TABLE
    )
}

async fn fetch_exact<K: EntityKind>(
    conn: &mut SqliteConnection,
    id: &str,
    version: i64,
) -> Result<Option<Versioned<K>>, AppError> {
    let sql = format!("{} WHERE h.id = ? AND v.version = ?", select_from::<K>());
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(version)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(from_row::<K>).transpose()
}

fn from_row<K: EntityKind>(row: &SqliteRow) -> Result<Versioned<K>, AppError> {
    Ok(Versioned {
        id: row.try_get("id")?,
        head: K::head_from_row(row)?,
        content: K::content_from_row(row)?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
    })
}
