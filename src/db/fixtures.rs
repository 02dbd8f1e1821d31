//! Scratch databases seeded with directory data for tests.

use sqlx::SqlitePool;
use tempfile::TempDir;

use super::init_database;

pub(crate) struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite"), 5)
            .await
            .unwrap();
        Self { pool, _dir: dir }
    }

    /// Insert an employee and return its id.
    pub async fn employee(&self, username: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO employee (id, username, first_name, last_name) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(username)
            .bind(username)
            .bind("Tester")
            .execute(&self.pool)
            .await
            .unwrap();
        id
    }

    /// Insert an organization and return its id.
    pub async fn organization(&self, name: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO organization (id, name, description) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(name)
            .bind(format!("{name} Ltd"))
            .execute(&self.pool)
            .await
            .unwrap();
        id
    }

    /// Make an employee responsible for an organization.
    pub async fn responsible(&self, organization_id: &str, employee_id: &str) {
        sqlx::query(
            "INSERT INTO organization_responsible (id, organization_id, user_id) VALUES (?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(organization_id)
        .bind(employee_id)
        .execute(&self.pool)
        .await
        .unwrap();
    }
}
