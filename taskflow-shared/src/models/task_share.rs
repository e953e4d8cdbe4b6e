/// Task sharing
///
/// A share grants one user read and update access to another user's task.
/// The `(task_id, user_id)` primary key (`task_shares_pkey`) makes duplicate
/// shares impossible, and shares disappear with their task.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Name of the primary key constraint, reported on duplicate inserts
pub const TASK_SHARES_PKEY: &str = "task_shares_pkey";

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TaskShare {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl TaskShare {
    /// Shares a task with a user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on [`TASK_SHARES_PKEY`] if the task is
    /// already shared with that user
    pub async fn create(pool: &PgPool, task_id: Uuid, user_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskShare>(
            r#"
            INSERT INTO task_shares (task_id, user_id)
            VALUES ($1, $2)
            RETURNING task_id, user_id, created_at
            "#,
        )
        .bind(task_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Users a task is shared with, oldest share first
    pub async fn list_user_ids(pool: &PgPool, task_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM task_shares WHERE task_id = $1 ORDER BY created_at, user_id",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }
}
