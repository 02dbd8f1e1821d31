//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data. Tenders and bids are
//! stored append-only: a head row per entity and one immutable row per version.

mod feedback;
mod identity;
mod kinds;
mod versioned;

#[cfg(test)]
pub(crate) mod fixtures;

pub use feedback::FeedbackStore;
pub use identity::IdentityResolver;
pub use kinds::{Bid, BidStore, Tender, TenderStore};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Identity tables are owned by the directory service; we only read them
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employee (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            first_name TEXT,
            last_name TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organization (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organization_responsible (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL REFERENCES organization(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES employee(id) ON DELETE CASCADE
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tenders (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            creator_username TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tender_versions (
            entity_id TEXT NOT NULL REFERENCES tenders(id),
            version INTEGER NOT NULL CHECK (version >= 1),
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            service_type TEXT NOT NULL
                CHECK (service_type IN ('Construction', 'Delivery', 'Manufacture')),
            status TEXT NOT NULL CHECK (status IN ('CREATED', 'PUBLISHED', 'CLOSED')),
            created_at TEXT NOT NULL,
            PRIMARY KEY (entity_id, version)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bids (
            id TEXT PRIMARY KEY,
            tender_id TEXT NOT NULL REFERENCES tenders(id),
            author_type TEXT NOT NULL CHECK (author_type IN ('Organization', 'User')),
            author_id TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bid_versions (
            entity_id TEXT NOT NULL REFERENCES bids(id),
            version INTEGER NOT NULL CHECK (version >= 1),
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('CREATED', 'PUBLISHED', 'CANCELED')),
            created_at TEXT NOT NULL,
            PRIMARY KEY (entity_id, version)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedbacks (
            id TEXT PRIMARY KEY,
            bid_id TEXT NOT NULL REFERENCES bids(id),
            user_id TEXT NOT NULL REFERENCES employee(id),
            body TEXT NOT NULL CHECK (length(body) <= 1000),
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_responsible_user ON organization_responsible(user_id);
        CREATE INDEX IF NOT EXISTS idx_tenders_creator ON tenders(creator_username);
        CREATE INDEX IF NOT EXISTS idx_bids_tender ON bids(tender_id);
        CREATE INDEX IF NOT EXISTS idx_bids_author ON bids(author_type, author_id);
        CREATE INDEX IF NOT EXISTS idx_feedbacks_bid ON feedbacks(bid_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
