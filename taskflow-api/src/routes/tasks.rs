/// Task endpoints
///
/// All routes require a JWT. A task is visible to its owner and to the users
/// it is shared with; anything else answers 404 exactly like a missing task.
///
/// # Endpoints
///
/// - `POST /api/tasks` - Create a task
/// - `GET /api/tasks` - List visible tasks (paginated, filtered, sorted)
/// - `GET /api/tasks/stats` - Counts over visible tasks
/// - `GET /api/tasks/:id` - Get a task
/// - `PUT /api/tasks/:id` - Update a task (owner or shared user)
/// - `DELETE /api/tasks/:id` - Delete a task (owner)
/// - `POST /api/tasks/:id/share` - Share a task by email (owner)
///
/// Every mutation publishes a live event to everyone who can see the task.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::deserialize_some,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use taskflow_shared::{
    auth::middleware::AuthContext,
    events::TaskEvent,
    models::{
        task::{
            NewTask, Task, TaskDetails, TaskPriority, TaskStatus, UpdateTask, MAX_DESCRIPTION_LENGTH,
            MAX_TITLE_LENGTH,
        },
        task_query::{PageRequest, SortField, SortOrder, TaskFilter, TaskListQuery, TaskPage, TaskScope, TaskStats},
        task_share::TaskShare,
        user::User,
    },
};
use uuid::Uuid;

const NOT_FOUND_OR_FORBIDDEN: &str = "Task not found or not authorized";

#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "dueDate")]
    pub due_date: Option<String>,
}

/// Partial update; `null` clears `description` and `due_date`
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    pub priority: Option<String>,
    pub status: Option<String>,
    #[serde(default, alias = "dueDate", deserialize_with = "deserialize_some")]
    pub due_date: Option<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShareTaskRequest {
    pub email: Option<String>,
}

/// Query string of `GET /api/tasks`
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(alias = "q")]
    pub search: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Parses the `:id` path segment
pub fn parse_task_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest("Invalid task id".to_string()))
}

/// Trimmed value, or `None` when absent or blank
fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Like [`present`], also treating `all` as "no filter"
fn filter_value(value: Option<String>) -> Option<String> {
    present(value).filter(|v| !v.eq_ignore_ascii_case("all"))
}

fn parse_number(name: &str, value: Option<String>) -> ApiResult<Option<i64>> {
    present(value)
        .map(|raw| {
            raw.parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("Invalid {} '{}'", name, raw)))
        })
        .transpose()
}

fn parse_title(raw: &str) -> ApiResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Title cannot exceed {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

/// Blank descriptions are stored as NULL
fn parse_description(raw: &str) -> ApiResult<Option<String>> {
    let description = raw.trim();
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Description cannot exceed {} characters",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(Some(description.to_string()).filter(|d| !d.is_empty()))
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC)
fn parse_due_date(raw: &str) -> ApiResult<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(timestamp.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| Some(Utc.from_utc_datetime(&midnight)))
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid due date '{}'", raw)))
}

fn parse_enum<T>(value: Option<String>) -> ApiResult<Option<T>>
where
    T: FromStr,
    ApiError: From<T::Err>,
{
    Ok(present(value).map(|v| v.parse::<T>()).transpose()?)
}

impl CreateTaskRequest {
    pub fn into_new_task(self, owner: Uuid) -> ApiResult<NewTask> {
        let title = parse_title(self.title.as_deref().unwrap_or_default())?;

        Ok(NewTask {
            title,
            description: match self.description {
                Some(raw) => parse_description(&raw)?,
                None => None,
            },
            priority: parse_enum::<TaskPriority>(self.priority)?.unwrap_or_default(),
            status: parse_enum::<TaskStatus>(self.status)?.unwrap_or_default(),
            due_date: match self.due_date {
                Some(raw) => parse_due_date(&raw)?,
                None => None,
            },
            created_by: owner,
        })
    }
}

impl UpdateTaskRequest {
    pub fn into_update(self) -> ApiResult<UpdateTask> {
        let title = match self.title {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ApiError::BadRequest("Title cannot be empty".to_string()))
            }
            Some(raw) => Some(parse_title(&raw)?),
            None => None,
        };

        let description = match self.description {
            Some(Some(raw)) => Some(parse_description(&raw)?),
            Some(None) => Some(None),
            None => None,
        };

        let due_date = match self.due_date {
            Some(Some(raw)) => Some(parse_due_date(&raw)?),
            Some(None) => Some(None),
            None => None,
        };

        Ok(UpdateTask {
            title,
            description,
            priority: parse_enum(self.priority)?,
            status: parse_enum(self.status)?,
            due_date,
        })
    }
}

impl ListTasksParams {
    pub fn into_query(self) -> ApiResult<TaskListQuery> {
        let page = PageRequest::new(
            parse_number("page", self.page)?,
            parse_number("limit", self.limit)?,
        );

        Ok(TaskListQuery {
            filter: TaskFilter {
                status: parse_enum(filter_value(self.status))?,
                priority: parse_enum(filter_value(self.priority))?,
                search: present(self.search),
                scope: parse_enum::<TaskScope>(self.scope)?.unwrap_or_default(),
            },
            sort: parse_enum::<SortField>(self.sort_by)?.unwrap_or_default(),
            order: parse_enum::<SortOrder>(self.order)?.unwrap_or_default(),
            page,
        })
    }
}

async fn load_details(state: &AppState, id: Uuid) -> ApiResult<TaskDetails> {
    Task::details(&state.db, id)
        .await?
        .ok_or_else(ApiError::task_not_found)
}

/// Create a task owned by the caller
///
/// # Errors
///
/// - `400 Bad Request`: Missing or blank title, or an invalid field
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskDetails>)> {
    let new_task = req.into_new_task(auth.user_id)?;
    let task = Task::create(&state.db, new_task).await?;
    let details = load_details(&state, task.id).await?;

    tracing::info!(task_id = %task.id, user_id = %auth.user_id, "Task created");
    state
        .hub
        .publish(&[auth.user_id], TaskEvent::TaskCreated(details.clone()));

    Ok((StatusCode::CREATED, Json(details)))
}

/// List tasks visible to the caller
///
/// # Query
///
/// `page`, `limit`, `sort_by` (or `sortBy`), `order`, `status`, `priority`,
/// `search` (or `q`), `scope`
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ListTasksParams>,
) -> ApiResult<Json<TaskPage>> {
    let query = params.into_query()?;
    let page = TaskListQuery::run(&state.db, auth.user_id, &query).await?;
    Ok(Json(page))
}

pub async fn task_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<TaskStats>> {
    Ok(Json(TaskStats::for_user(&state.db, auth.user_id).await?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskDetails>> {
    let id = parse_task_id(&id)?;

    let task = Task::find_visible(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(ApiError::task_not_found)?;

    Ok(Json(task))
}

/// Update a task the caller owns or that is shared with them
///
/// # Errors
///
/// - `400 Bad Request`: Invalid id or field
/// - `404 Not Found`: Task missing or not visible
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<TaskDetails>> {
    let id = parse_task_id(&id)?;
    let update = req.into_update()?;

    if update.is_empty() {
        let task = Task::find_visible(&state.db, id, auth.user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(NOT_FOUND_OR_FORBIDDEN.to_string()))?;
        return Ok(Json(task));
    }

    Task::update_visible(&state.db, id, auth.user_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND_OR_FORBIDDEN.to_string()))?;

    let details = load_details(&state, id).await?;

    tracing::info!(task_id = %id, user_id = %auth.user_id, "Task updated");
    state
        .hub
        .publish(&details.audience(), TaskEvent::TaskUpdated(details.clone()));

    Ok(Json(details))
}

/// Delete a task the caller owns
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_task_id(&id)?;

    // Shares cascade away with the task; remember who could see it.
    let shared_with = TaskShare::list_user_ids(&state.db, id).await?;

    if !Task::delete_owned(&state.db, id, auth.user_id).await? {
        return Err(ApiError::NotFound(NOT_FOUND_OR_FORBIDDEN.to_string()));
    }

    let mut audience = shared_with;
    audience.push(auth.user_id);
    audience.sort();
    audience.dedup();

    tracing::info!(task_id = %id, user_id = %auth.user_id, "Task deleted");
    state.hub.publish(&audience, TaskEvent::TaskDeleted { task_id: id });

    Ok(Json(MessageResponse {
        message: "Task deleted successfully".to_string(),
    }))
}

/// Share a task the caller owns with another user, by email
///
/// # Errors
///
/// - `400 Bad Request`: Missing email, sharing with yourself, or already shared
/// - `404 Not Found`: Unknown user, or task missing or not owned
pub async fn share_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ShareTaskRequest>,
) -> ApiResult<Json<TaskDetails>> {
    let id = parse_task_id(&id)?;
    let email = present(req.email).ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;

    let recipient = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let task = Task::find_visible(&state.db, id, auth.user_id)
        .await?
        .filter(|task| task.owner_id() == auth.user_id)
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND_OR_FORBIDDEN.to_string()))?;

    if recipient.id == auth.user_id {
        return Err(ApiError::BadRequest("You cannot share a task with yourself".to_string()));
    }

    if task.is_shared_with(recipient.id) {
        return Err(ApiError::BadRequest("Task already shared with this user".to_string()));
    }

    TaskShare::create(&state.db, id, recipient.id).await?;
    let details = load_details(&state, id).await?;

    tracing::info!(task_id = %id, user_id = %auth.user_id, shared_with = %recipient.id, "Task shared");

    let audience = details.audience();
    state
        .hub
        .publish(&audience, TaskEvent::TaskUpdated(details.clone()));
    state.hub.publish(
        &audience,
        TaskEvent::TaskShared {
            task: details.clone(),
            email: recipient.email,
        },
    );

    Ok(Json(details))
}
