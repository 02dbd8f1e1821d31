//! Read-only lookups into the employee and organization directory.

use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::guard::Requester;
use crate::models::BidAuthor;

/// Maps usernames to employees and employees to the organizations they act for.
#[derive(Clone)]
pub struct IdentityResolver {
    pool: SqlitePool,
}

impl IdentityResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve a username to an employee id.
    pub async fn resolve_user(&self, username: &str) -> Result<String, AppError> {
        let row = sqlx::query("SELECT id FROM employee WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("id")?),
            None => Err(AppError::IdentityNotFound(format!(
                "user {} does not exist",
                username
            ))),
        }
    }

    /// Resolve a username into a requester carrying all of its organizations.
    pub async fn requester(&self, username: &str) -> Result<Requester, AppError> {
        let employee_id = self.resolve_user(username).await?;
        let organizations = self.orgs_for_employee(&employee_id).await?;

        Ok(Requester {
            username: username.to_string(),
            employee_id,
            organizations,
        })
    }

    /// First organization an employee is responsible for, in link order.
    pub async fn org_for_employee(&self, employee_id: &str) -> Result<String, AppError> {
        let row = sqlx::query(
            "SELECT organization_id FROM organization_responsible WHERE user_id = ? ORDER BY rowid LIMIT 1",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get("organization_id")?),
            None => Err(AppError::OrganizationNotFound(format!(
                "employee {} is not responsible for any organization",
                employee_id
            ))),
        }
    }

    async fn orgs_for_employee(&self, employee_id: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT organization_id FROM organization_responsible WHERE user_id = ? ORDER BY rowid",
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("organization_id").map_err(AppError::from))
            .collect()
    }

    pub async fn is_responsible_for(
        &self,
        employee_id: &str,
        organization_id: &str,
    ) -> Result<bool, AppError> {
        let row = sqlx::query(
            "SELECT 1 FROM organization_responsible WHERE user_id = ? AND organization_id = ?",
        )
        .bind(employee_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    pub async fn employee_exists(&self, employee_id: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM employee WHERE id = ?")
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn organization_exists(&self, organization_id: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM organization WHERE id = ?")
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

impl BidAuthor {
    /// The organization a bid acts for.
    ///
    /// Organization authors act for themselves. User authors act for the first
    /// organization they are responsible for, so the answer can change when the
    /// directory changes.
    pub async fn effective_org(&self, resolver: &IdentityResolver) -> Result<String, AppError> {
        match self {
            BidAuthor::Organization(org_id) => Ok(org_id.clone()),
            BidAuthor::User(employee_id) => resolver.org_for_employee(employee_id).await,
        }
    }
}
