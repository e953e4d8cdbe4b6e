/// Per-user broadcast rooms
///
/// Every connected socket subscribes to the room of its user. A room is a
/// `tokio::sync::broadcast` channel, created on first subscribe and pruned
/// once its last receiver is gone. Publishing is fire-and-forget: users
/// without a connection simply receive nothing, and a slow receiver that
/// falls more than `capacity` events behind loses the oldest ones.
///
/// # Example
///
/// ```
/// use taskflow_shared::events::{EventHub, TaskEvent};
/// use uuid::Uuid;
///
/// # #[tokio::main]
/// # async fn main() {
/// let hub = EventHub::default();
/// let user = Uuid::new_v4();
///
/// let mut rx = hub.subscribe(user);
/// let task_id = Uuid::new_v4();
/// hub.publish(&[user], TaskEvent::TaskDeleted { task_id });
///
/// assert_eq!(rx.recv().await.unwrap().task_id(), task_id);
/// # }
/// ```

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::TaskEvent;

/// Events buffered per room before slow receivers start lagging
pub const DEFAULT_ROOM_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct EventHub {
    rooms: DashMap<Uuid, broadcast::Sender<TaskEvent>>,
    capacity: usize,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Joins the room of `user_id`, creating it if needed
    pub fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<TaskEvent> {
        self.rooms
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Sends `event` to each recipient's room
    ///
    /// Returns the number of live receivers reached. Recipients without a
    /// room are skipped.
    pub fn publish(&self, recipients: &[Uuid], event: TaskEvent) -> usize {
        let mut delivered = 0;

        for user_id in recipients {
            let Some(room) = self.rooms.get(user_id) else {
                continue;
            };

            match room.send(event.clone()) {
                Ok(receivers) => delivered += receivers,
                Err(_) => {
                    // Every receiver is gone; drop the room after releasing the guard.
                    drop(room);
                    self.prune(*user_id);
                }
            }
        }

        tracing::debug!(
            event = event.name(),
            task_id = %event.task_id(),
            recipients = recipients.len(),
            delivered,
            "Published task event"
        );

        delivered
    }

    /// Removes the room of `user_id` if nobody listens to it any more
    pub fn prune(&self, user_id: Uuid) {
        self.rooms
            .remove_if(&user_id, |_, sender| sender.receiver_count() == 0);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Open subscriptions for a user
    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.rooms
            .get(&user_id)
            .map(|room| room.receiver_count())
            .unwrap_or(0)
    }
}
