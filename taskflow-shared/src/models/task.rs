/// Task model and database operations
///
/// A task belongs to the user who created it and may be shared with other
/// users (see [`crate::models::task_share`]). Every query that reads or
/// mutates a task on behalf of a user carries the visibility rule:
///
/// ```text
/// t.created_by = $me OR EXISTS (share of t for $me)
/// ```
///
/// Owners and shared users may read and update a task. Only the owner may
/// delete or share it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
/// CREATE TYPE task_status AS ENUM ('pending', 'in-progress', 'completed');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(200) NOT NULL,
///     description TEXT,
///     priority task_priority NOT NULL DEFAULT 'medium',
///     status task_status NOT NULL DEFAULT 'pending',
///     due_date TIMESTAMPTZ,
///     created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::models::task::{NewTask, Task, TaskStatus, UpdateTask};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner: Uuid) -> Result<(), sqlx::Error> {
/// let task = Task::create(&pool, NewTask::titled("Write report", owner)).await?;
///
/// let update = UpdateTask {
///     status: Some(TaskStatus::InProgress),
///     ..Default::default()
/// };
/// Task::update_visible(&pool, task.id, owner, update).await?;
///
/// let details = Task::find_visible(&pool, task.id, owner).await?;
/// assert!(details.is_some());
/// # Ok(())
/// # }
/// ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::UserSummary;

/// Maximum title length in characters
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum description length in characters
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Columns for [`TaskRow`]: the task joined with its creator
pub(crate) const TASK_SELECT: &str = "SELECT t.id, t.title, t.description, t.priority, t.status, \
     t.due_date, t.created_by, t.created_at, t.updated_at, \
     u.name AS creator_name, u.email AS creator_email, u.avatar_url AS creator_avatar_url \
     FROM tasks t JOIN users u ON u.id = t.created_by";

/// Error returned when parsing an unknown enum value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Task priority, ordered low < medium < high
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskPriority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            })
    }
}

/// Task progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    #[sqlx(rename = "in-progress")]
    #[serde(rename = "in-progress")]
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError {
                kind: "status",
                value: s.to_string(),
            })
    }
}

/// Task row as stored
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    /// Owner
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task joined with its creator, before shares are attached
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator_name: String,
    pub creator_email: String,
    pub creator_avatar_url: Option<String>,
}

/// Populated task, as returned by the API and carried in live events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDetails {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: UserSummary,
    pub shared_with: Vec<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskDetails {
    pub fn from_row(row: TaskRow, shared_with: Vec<UserSummary>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            priority: row.priority,
            status: row.status,
            due_date: row.due_date,
            created_by: UserSummary {
                id: row.created_by,
                name: row.creator_name,
                email: row.creator_email,
                avatar_url: row.creator_avatar_url,
            },
            shared_with,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub fn owner_id(&self) -> Uuid {
        self.created_by.id
    }

    /// Users who can see this task: the owner and everyone it is shared with
    ///
    /// Sorted and free of duplicates.
    pub fn audience(&self) -> Vec<Uuid> {
        std::iter::once(self.created_by.id)
            .chain(self.shared_with.iter().map(|u| u.id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn is_shared_with(&self, user_id: Uuid) -> bool {
        self.shared_with.iter().any(|u| u.id == user_id)
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
}

impl NewTask {
    /// Task with only a title and defaults everywhere else
    pub fn titled(title: impl Into<String>, created_by: Uuid) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: TaskPriority::default(),
            status: TaskStatus::default(),
            due_date: None,
            created_by,
        }
    }
}

/// Partial update
///
/// `None` leaves a field unchanged; for the nullable fields `Some(None)`
/// clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        *self == UpdateTask::default()
    }
}

#[derive(sqlx::FromRow)]
struct ShareRow {
    task_id: Uuid,
    id: Uuid,
    name: String,
    email: String,
    avatar_url: Option<String>,
}

impl Task {
    pub async fn create(pool: &PgPool, data: NewTask) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (title, description, priority, status, due_date, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, description, priority, status, due_date, created_by,
                      created_at, updated_at
            "#,
        )
        .bind(data.title.trim())
        .bind(data.description)
        .bind(data.priority)
        .bind(data.status)
        .bind(data.due_date)
        .bind(data.created_by)
        .fetch_one(pool)
        .await
    }

    /// Loads the populated task regardless of who is asking
    ///
    /// Callers must have checked visibility already.
    pub async fn details(pool: &PgPool, id: Uuid) -> Result<Option<TaskDetails>, sqlx::Error> {
        let sql = format!("{TASK_SELECT} WHERE t.id = $1");
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => Ok(Self::populate(pool, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Loads the populated task if `user_id` may see it
    pub async fn find_visible(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TaskDetails>, sqlx::Error> {
        let sql = format!(
            "{TASK_SELECT} WHERE t.id = $1 AND (t.created_by = $2 OR EXISTS (
                SELECT 1 FROM task_shares s WHERE s.task_id = t.id AND s.user_id = $2))"
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => Ok(Self::populate(pool, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Attaches shared users to task rows, keeping row order
    pub async fn populate(pool: &PgPool, rows: Vec<TaskRow>) -> Result<Vec<TaskDetails>, sqlx::Error> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let shares = sqlx::query_as::<_, ShareRow>(
            r#"
            SELECT s.task_id, u.id, u.name, u.email, u.avatar_url
            FROM task_shares s
            JOIN users u ON u.id = s.user_id
            WHERE s.task_id = ANY($1)
            ORDER BY s.created_at, u.id
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        let mut by_task: HashMap<Uuid, Vec<UserSummary>> = HashMap::new();
        for share in shares {
            by_task.entry(share.task_id).or_default().push(UserSummary {
                id: share.id,
                name: share.name,
                email: share.email,
                avatar_url: share.avatar_url,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let shared_with = by_task.remove(&row.id).unwrap_or_default();
                TaskDetails::from_row(row, shared_with)
            })
            .collect())
    }

    /// Applies a partial update if `user_id` owns the task or it is shared with them
    ///
    /// Returns `None` when the task does not exist or is not visible.
    pub async fn update_visible(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let (set_description, description) = split_nullable(data.description);
        let (set_due_date, due_date) = split_nullable(data.due_date);

        sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks t
            SET title = COALESCE($3, t.title),
                description = CASE WHEN $4 THEN $5 ELSE t.description END,
                priority = COALESCE($6, t.priority),
                status = COALESCE($7, t.status),
                due_date = CASE WHEN $8 THEN $9 ELSE t.due_date END,
                updated_at = NOW()
            WHERE t.id = $1
              AND (t.created_by = $2 OR EXISTS (
                  SELECT 1 FROM task_shares s WHERE s.task_id = t.id AND s.user_id = $2))
            RETURNING t.id, t.title, t.description, t.priority, t.status, t.due_date,
                      t.created_by, t.created_at, t.updated_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(data.title.map(|t| t.trim().to_string()))
        .bind(set_description)
        .bind(description)
        .bind(data.priority)
        .bind(data.status)
        .bind(set_due_date)
        .bind(due_date)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a task owned by `owner`; shares go with it
    ///
    /// Returns whether a row was deleted.
    pub async fn delete_owned(pool: &PgPool, id: Uuid, owner: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND created_by = $2")
            .bind(id)
            .bind(owner)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn split_nullable<T>(value: Option<Option<T>>) -> (bool, Option<T>) {
    match value {
        Some(inner) => (true, inner),
        None => (false, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str) -> UserSummary {
        UserSummary {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            avatar_url: None,
        }
    }

    fn details(owner: UserSummary, shared_with: Vec<UserSummary>) -> TaskDetails {
        TaskDetails {
            id: Uuid::new_v4(),
            title: "Write report".into(),
            description: None,
            priority: TaskPriority::High,
            status: TaskStatus::InProgress,
            due_date: None,
            created_by: owner,
            shared_with,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"in-progress\"");
        assert_eq!("In-Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::default(), TaskStatus::Pending);

        let err = "done".parse::<TaskStatus>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid status 'done'");
    }

    #[test]
    fn test_priority_order_and_names() {
        assert!(TaskPriority::Low < TaskPriority::Medium);
        assert!(TaskPriority::Medium < TaskPriority::High);
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
        assert_eq!(" high ".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_audience_includes_owner_and_shares_once() {
        let owner = summary("Owner");
        let friend = summary("Friend");
        let task = details(owner.clone(), vec![friend.clone(), friend.clone(), owner.clone()]);

        let audience = task.audience();
        assert_eq!(audience.len(), 2);
        assert!(audience.contains(&owner.id));
        assert!(audience.contains(&friend.id));
        assert!(task.is_shared_with(friend.id));
        assert_eq!(task.owner_id(), owner.id);
    }

    #[test]
    fn test_details_json_shape() {
        let task = details(summary("Owner"), vec![summary("Friend")]);
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["status"], "in-progress");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["created_by"]["name"], "Owner");
        assert_eq!(json["shared_with"][0]["email"], "friend@example.com");
        assert!(json["due_date"].is_null());
    }

    #[test]
    fn test_update_task_is_empty() {
        assert!(UpdateTask::default().is_empty());
        let clear = UpdateTask {
            due_date: Some(None),
            ..Default::default()
        };
        assert!(!clear.is_empty());
        assert_eq!(split_nullable(clear.due_date), (true, None));
        assert_eq!(split_nullable::<String>(None), (false, None));
    }
}
