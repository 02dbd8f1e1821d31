//! Feedback persistence. Feedback rows are written once and never changed.

use chrono::Utc;
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{QueryBuilder, Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{BidAuthor, Feedback, Page};

#[derive(Clone)]
pub struct FeedbackStore {
    pool: SqlitePool,
}

impl FeedbackStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record feedback left by `user_id` on a bid.
    pub async fn add(&self, bid_id: &str, user_id: &str, body: &str) -> Result<Feedback, AppError> {
        let feedback = Feedback {
            id: uuid::Uuid::new_v4().to_string(),
            body: body.to_string(),
            bid_id: bid_id.to_string(),
            author_user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO feedbacks (id, bid_id, user_id, body, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&feedback.id)
        .bind(&feedback.bid_id)
        .bind(&feedback.author_user_id)
        .bind(&feedback.body)
        .bind(feedback.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Stored feedback {} on bid {}", feedback.id, bid_id);
        Ok(feedback)
    }

    /// Feedback on a tender's bids authored by an employee, either personally or
    /// through one of `organizations`, ordered by text.
    pub async fn list_for_author(
        &self,
        tender_id: &str,
        employee_id: &str,
        organizations: &[String],
        page: Page,
    ) -> Result<Vec<Feedback>, AppError> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT f.id, f.bid_id, f.user_id, f.body, f.created_at \
             FROM feedbacks AS f JOIN bids AS b ON b.id = f.bid_id WHERE b.tender_id = ",
        );
        builder
            .push_bind(tender_id)
            .push(" AND ((b.author_type = ")
            .push_bind(BidAuthor::USER)
            .push(" AND b.author_id = ")
            .push_bind(employee_id)
            .push(")");

        if !organizations.is_empty() {
            builder
                .push(" OR (b.author_type = ")
                .push_bind(BidAuthor::ORGANIZATION)
                .push(" AND b.author_id IN (");
            let mut separated = builder.separated(", ");
            for org in organizations {
                separated.push_bind(org.as_str());
            }
            separated.push_unseparated("))");
        }

        builder
            .push(") ORDER BY f.body ASC, f.created_at ASC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(feedback_from_row).collect()
    }
}

fn feedback_from_row(row: &SqliteRow) -> Result<Feedback, AppError> {
    Ok(Feedback {
        id: row.try_get("id")?,
        body: row.try_get("body")?,
        bid_id: row.try_get("bid_id")?,
        author_user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
    })
}
