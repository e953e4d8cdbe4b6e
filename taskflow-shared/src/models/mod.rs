/// Database models for TaskFlow
///
/// - `user`: accounts, OAuth identities and the profile DTOs
/// - `task`: tasks, their enums and the populated [`task::TaskDetails`]
/// - `task_share`: who a task is shared with
/// - `task_query`: list filters, sorting, pagination and stats
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::models::task::{NewTask, Task};
/// use taskflow_shared::models::task_query::{TaskListQuery, TaskStats};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, me: Uuid) -> Result<(), sqlx::Error> {
/// Task::create(&pool, NewTask::titled("Plan sprint", me)).await?;
///
/// let page = TaskListQuery::run(&pool, me, &TaskListQuery::default()).await?;
/// let stats = TaskStats::for_user(&pool, me).await?;
/// assert_eq!(page.pagination.total_tasks, stats.total);
/// # Ok(())
/// # }
/// ```

pub mod task;
pub mod task_query;
pub mod task_share;
pub mod user;
