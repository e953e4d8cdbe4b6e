/// Live task events
///
/// Mutations publish a [`TaskEvent`] to every user who can see the task.
/// On the wire an event is a JSON text frame:
///
/// ```json
/// {"event": "task-updated", "data": { ...populated task... }}
/// ```
///
/// Delivery goes through the in-process [`hub::EventHub`].

pub mod hub;

pub use hub::EventHub;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::task::TaskDetails;

/// Event pushed to connected clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum TaskEvent {
    TaskCreated(TaskDetails),
    TaskUpdated(TaskDetails),
    TaskDeleted {
        task_id: Uuid,
    },
    /// Sent alongside `task-updated` when a task gains a shared user
    TaskShared {
        task: TaskDetails,
        /// Email of the user the task was shared with
        email: String,
    },
}

impl TaskEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            TaskEvent::TaskCreated(_) => "task-created",
            TaskEvent::TaskUpdated(_) => "task-updated",
            TaskEvent::TaskDeleted { .. } => "task-deleted",
            TaskEvent::TaskShared { .. } => "task-shared",
        }
    }

    pub fn task_id(&self) -> Uuid {
        match self {
            TaskEvent::TaskCreated(task) | TaskEvent::TaskUpdated(task) => task.id,
            TaskEvent::TaskDeleted { task_id } => *task_id,
            TaskEvent::TaskShared { task, .. } => task.id,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{TaskPriority, TaskStatus};
    use crate::models::user::UserSummary;
    use chrono::Utc;

    fn task() -> TaskDetails {
        TaskDetails {
            id: Uuid::new_v4(),
            title: "Ship it".into(),
            description: Some("before friday".into()),
            priority: TaskPriority::Medium,
            status: TaskStatus::Pending,
            due_date: None,
            created_by: UserSummary {
                id: Uuid::new_v4(),
                name: "Owner".into(),
                email: "owner@example.com".into(),
                avatar_url: None,
            },
            shared_with: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_envelope() {
        let t = task();
        let json: serde_json::Value =
            serde_json::from_str(&TaskEvent::TaskCreated(t.clone()).to_json().unwrap()).unwrap();

        assert_eq!(json["event"], "task-created");
        assert_eq!(json["data"]["title"], "Ship it");
        assert_eq!(json["data"]["id"], t.id.to_string());
    }

    #[test]
    fn test_deleted_and_shared_payloads() {
        let id = Uuid::new_v4();
        let deleted = serde_json::to_value(TaskEvent::TaskDeleted { task_id: id }).unwrap();
        assert_eq!(deleted, serde_json::json!({"event": "task-deleted", "data": {"task_id": id}}));

        let shared = TaskEvent::TaskShared {
            task: task(),
            email: "friend@example.com".into(),
        };
        let value = serde_json::to_value(&shared).unwrap();
        assert_eq!(value["event"], "task-shared");
        assert_eq!(value["data"]["email"], "friend@example.com");
        assert_eq!(value["data"]["task"]["title"], "Ship it");
    }

    #[test]
    fn test_names_match_wire_tags() {
        let t = task();
        let events = [
            TaskEvent::TaskCreated(t.clone()),
            TaskEvent::TaskUpdated(t.clone()),
            TaskEvent::TaskDeleted { task_id: t.id },
            TaskEvent::TaskShared { task: t.clone(), email: "a@b.c".into() },
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.name());
            assert_eq!(event.task_id(), t.id);

            let back: TaskEvent = serde_json::from_value(value).unwrap();
            assert_eq!(back, event);
        }
    }
}
