/// Listing, filtering, sorting and statistics over visible tasks
///
/// List queries are assembled with [`sqlx::QueryBuilder`]; every value is a
/// bound parameter and the sort column comes from the [`SortField`]
/// whitelist.
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::models::task::TaskStatus;
/// use taskflow_shared::models::task_query::{PageRequest, SortField, SortOrder, TaskFilter, TaskListQuery};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, me: Uuid) -> Result<(), sqlx::Error> {
/// let query = TaskListQuery {
///     filter: TaskFilter {
///         status: Some(TaskStatus::Pending),
///         ..Default::default()
///     },
///     sort: SortField::DueDate,
///     order: SortOrder::Asc,
///     page: PageRequest::new(Some(1), Some(20)),
/// };
///
/// let page = TaskListQuery::run(&pool, me, &query).await?;
/// println!("{} of {} tasks", page.tasks.len(), page.pagination.total_tasks);
/// # Ok(())
/// # }
/// ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::task::{Task, TaskDetails, TaskPriority, TaskRow, TaskStatus, TASK_SELECT};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Error returned for an unknown sort key, order or scope
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind} '{value}'")]
pub struct ParseQueryError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseQueryError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Sortable columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Title,
    Priority,
    Status,
}

impl SortField {
    fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "t.created_at",
            SortField::UpdatedAt => "t.updated_at",
            SortField::DueDate => "t.due_date",
            SortField::Title => "LOWER(t.title)",
            SortField::Priority => "t.priority",
            SortField::Status => "t.status",
        }
    }
}

impl FromStr for SortField {
    type Err = ParseQueryError;

    /// Accepts snake_case and camelCase keys
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "created_at" | "createdAt" => Ok(SortField::CreatedAt),
            "updated_at" | "updatedAt" => Ok(SortField::UpdatedAt),
            "due_date" | "dueDate" => Ok(SortField::DueDate),
            "title" => Ok(SortField::Title),
            "priority" => Ok(SortField::Priority),
            "status" => Ok(SortField::Status),
            other => Err(ParseQueryError::new("sort field", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ParseQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(ParseQueryError::new("sort order", s)),
        }
    }
}

/// Which side of the visibility rule to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskScope {
    /// Owned and shared tasks
    #[default]
    All,
    Owned,
    /// Shared with the caller by someone else
    Shared,
}

impl FromStr for TaskScope {
    type Err = ParseQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(TaskScope::All),
            "owned" => Ok(TaskScope::Owned),
            "shared" => Ok(TaskScope::Shared),
            _ => Err(ParseQueryError::new("scope", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Case-insensitive substring of title or description
    pub search: Option<String>,
    pub scope: TaskScope,
}

/// 1-based page number and page size, already clamped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Page defaults to 1 (minimum 1); limit defaults to 10 and is clamped to 1..=100
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_SIZE as i64)
            .clamp(1, MAX_PAGE_SIZE as i64) as u32;

        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

/// Pagination block of a list response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_tasks: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let limit = request.limit as i64;
        let total = total.max(0);

        Self {
            current_page: request.page,
            total_pages: ((total + limit - 1) / limit) as u32,
            total_tasks: total,
            has_next: (request.page as i64) * limit < total,
            has_prev: request.page > 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<TaskDetails>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    pub filter: TaskFilter,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: PageRequest,
}

/// Escapes LIKE metacharacters and wraps the term for substring matching
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Appends the visibility rule and filters (without a leading `WHERE`)
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, filter: &TaskFilter) {
    match filter.scope {
        TaskScope::All => {
            qb.push("(t.created_by = ")
                .push_bind(user_id)
                .push(" OR EXISTS (SELECT 1 FROM task_shares s WHERE s.task_id = t.id AND s.user_id = ")
                .push_bind(user_id)
                .push("))");
        }
        TaskScope::Owned => {
            qb.push("t.created_by = ").push_bind(user_id);
        }
        TaskScope::Shared => {
            qb.push("EXISTS (SELECT 1 FROM task_shares s WHERE s.task_id = t.id AND s.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
    }

    if let Some(status) = filter.status {
        qb.push(" AND t.status = ").push_bind(status);
    }

    if let Some(priority) = filter.priority {
        qb.push(" AND t.priority = ").push_bind(priority);
    }

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = like_pattern(term);
        qb.push(" AND (t.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl TaskListQuery {
    /// Builds the page query: visible tasks with their creator, sorted and limited
    pub fn build_select(&self, user_id: Uuid) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(TASK_SELECT);
        qb.push(" WHERE ");
        push_filters(&mut qb, user_id, &self.filter);

        let order = self.order.sql();
        qb.push(" ORDER BY ").push(self.sort.column()).push(" ").push(order);
        if self.sort == SortField::DueDate {
            qb.push(" NULLS LAST");
        }
        // Stable paging across equal sort keys.
        qb.push(", t.id ").push(order);

        qb.push(" LIMIT ")
            .push_bind(self.page.limit as i64)
            .push(" OFFSET ")
            .push_bind(self.page.offset());
        qb
    }

    /// Builds the matching `COUNT(*)` query
    pub fn build_count(&self, user_id: Uuid) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM tasks t WHERE ");
        push_filters(&mut qb, user_id, &self.filter);
        qb
    }

    /// Runs the list and count queries and populates the page
    pub async fn run(pool: &PgPool, user_id: Uuid, query: &TaskListQuery) -> Result<TaskPage, sqlx::Error> {
        let rows = query
            .build_select(user_id)
            .build_query_as::<TaskRow>()
            .fetch_all(pool)
            .await?;

        let total: i64 = query
            .build_count(user_id)
            .build_query_scalar()
            .fetch_one(pool)
            .await?;

        Ok(TaskPage {
            tasks: Task::populate(pool, rows).await?,
            pagination: Pagination::new(query.page, total),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: i64,
    #[serde(rename = "in-progress")]
    pub in_progress: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
}

/// Dashboard counts over the tasks a user can see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: i64,
    pub by_status: StatusCounts,
    pub by_priority: PriorityCounts,
    /// Past due and not completed
    pub overdue: i64,
    pub owned: i64,
    pub shared_with_me: i64,
    /// Completed share of all tasks, in percent with one decimal
    pub completion_rate: f64,
}

#[derive(Debug, Default, sqlx::FromRow)]
struct StatsRow {
    total: i64,
    pending: i64,
    in_progress: i64,
    completed: i64,
    low: i64,
    medium: i64,
    high: i64,
    overdue: i64,
    owned: i64,
}

impl From<StatsRow> for TaskStats {
    fn from(row: StatsRow) -> Self {
        let completion_rate = if row.total > 0 {
            (row.completed as f64 * 1000.0 / row.total as f64).round() / 10.0
        } else {
            0.0
        };

        Self {
            total: row.total,
            by_status: StatusCounts {
                pending: row.pending,
                in_progress: row.in_progress,
                completed: row.completed,
            },
            by_priority: PriorityCounts {
                low: row.low,
                medium: row.medium,
                high: row.high,
            },
            overdue: row.overdue,
            owned: row.owned,
            shared_with_me: row.total - row.owned,
            completion_rate,
        }
    }
}

impl TaskStats {
    pub async fn for_user(pool: &PgPool, user_id: Uuid) -> Result<Self, sqlx::Error> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE t.status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE t.status = 'in-progress') AS in_progress,
                   COUNT(*) FILTER (WHERE t.status = 'completed') AS completed,
                   COUNT(*) FILTER (WHERE t.priority = 'low') AS low,
                   COUNT(*) FILTER (WHERE t.priority = 'medium') AS medium,
                   COUNT(*) FILTER (WHERE t.priority = 'high') AS high,
                   COUNT(*) FILTER (WHERE t.due_date < NOW() AND t.status <> 'completed') AS overdue,
                   COUNT(*) FILTER (WHERE t.created_by = $1) AS owned
            FROM tasks t
            WHERE t.created_by = $1
               OR EXISTS (SELECT 1 FROM task_shares s WHERE s.task_id = t.id AND s.user_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_field_aliases() {
        assert_eq!("createdAt".parse::<SortField>().unwrap(), SortField::CreatedAt);
        assert_eq!("due_date".parse::<SortField>().unwrap(), SortField::DueDate);
        assert_eq!("dueDate".parse::<SortField>().unwrap(), SortField::DueDate);
        assert!("password_hash".parse::<SortField>().is_err());
        assert!("t.id; DROP TABLE tasks".parse::<SortField>().is_err());
    }

    #[test]
    fn test_sort_order_and_scope() {
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!(SortOrder::default(), SortOrder::Desc);
        assert!("sideways".parse::<SortOrder>().is_err());
        assert_eq!("shared".parse::<TaskScope>().unwrap(), TaskScope::Shared);
        assert!("mine".parse::<TaskScope>().is_err());
    }

    #[test]
    fn test_page_request_clamping() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, limit: 10 });
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(-4), Some(500)), PageRequest { page: 1, limit: 100 });
        assert_eq!(PageRequest::new(Some(3), Some(25)).offset(), 50);
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(PageRequest::new(Some(1), Some(10)), 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let last = Pagination::new(PageRequest::new(Some(3), Some(10)), 25);
        assert!(!last.has_next);
        assert!(last.has_prev);

        let exact = Pagination::new(PageRequest::new(Some(2), Some(10)), 20);
        assert_eq!(exact.total_pages, 2);
        assert!(!exact.has_next);

        let empty = Pagination::new(PageRequest::default(), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("report"), "%report%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_select_sql_shape() {
        let user = Uuid::new_v4();
        let query = TaskListQuery {
            filter: TaskFilter {
                status: Some(TaskStatus::Completed),
                priority: Some(TaskPriority::High),
                search: Some("  report ".into()),
                scope: TaskScope::All,
            },
            sort: SortField::DueDate,
            order: SortOrder::Asc,
            page: PageRequest::new(Some(2), Some(5)),
        };

        let mut select = query.build_select(user);
        let sql = select.sql();
        assert!(sql.contains("t.created_by = $1 OR EXISTS"));
        assert!(sql.contains("AND t.status = $3"));
        assert!(sql.contains("AND t.priority = $4"));
        assert!(sql.contains("t.title ILIKE $5 OR t.description ILIKE $6"));
        assert!(sql.contains("ORDER BY t.due_date ASC NULLS LAST, t.id ASC"));
        assert!(sql.ends_with("LIMIT $7 OFFSET $8"));
        let _ = select.build();

        let count = query.build_count(user);
        assert!(count.sql().starts_with("SELECT COUNT(*) FROM tasks t WHERE (t.created_by = $1"));
        assert!(!count.sql().contains("LIMIT"));
    }

    #[test]
    fn test_scope_filters() {
        let user = Uuid::new_v4();
        let mut query = TaskListQuery::default();

        query.filter.scope = TaskScope::Owned;
        assert!(!query.build_count(user).sql().contains("task_shares"));

        query.filter.scope = TaskScope::Shared;
        let sql = query.build_count(user).sql().to_string();
        assert!(sql.contains("EXISTS (SELECT 1 FROM task_shares"));
        assert!(!sql.contains("t.created_by ="));

        query.filter.search = Some("   ".into());
        assert!(!query.build_count(user).sql().contains("ILIKE"));
    }

    #[test]
    fn test_stats_from_row() {
        let stats = TaskStats::from(StatsRow {
            total: 3,
            completed: 1,
            pending: 2,
            owned: 2,
            ..Default::default()
        });
        assert_eq!(stats.shared_with_me, 1);
        assert_eq!(stats.completion_rate, 33.3);

        let empty = TaskStats::from(StatsRow::default());
        assert_eq!(empty.completion_rate, 0.0);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["by_status"]["in-progress"], 0);
    }
}
