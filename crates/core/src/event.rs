//! Structural change notifications
//!
//! Every create, modify or delete of a persisted object produces one
//! [`UpdateEvent`]. Events are queued in an [`UpdateEventPublisher`] and only
//! reach subscribers when the transaction that produced them commits.

use crate::types::{ObjectId, ObjectKind};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What happened to the object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateEventOperation {
    /// Object was created
    Create,
    /// Object was modified
    Modify,
    /// Object was deleted
    Delete,
}

impl fmt::Display for UpdateEventOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateEventOperation::Create => "create",
            UpdateEventOperation::Modify => "modify",
            UpdateEventOperation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// One structural change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    /// Kind of the changed object
    pub kind: ObjectKind,
    /// Operation performed
    pub operation: UpdateEventOperation,
    /// Internal id of the object, when it has one
    pub id: Option<ObjectId>,
    /// Optional human-readable comment
    pub comment: Option<String>,
    /// When the event was produced
    pub timestamp: DateTime<Utc>,
}

impl UpdateEvent {
    /// New event without comment
    pub fn new(kind: ObjectKind, operation: UpdateEventOperation, id: Option<ObjectId>) -> Self {
        Self {
            kind,
            operation,
            id,
            comment: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

impl fmt::Display for UpdateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.kind)?;
        if let Some(id) = self.id {
            write!(f, " {}", id)?;
        }
        if let Some(comment) = &self.comment {
            write!(f, " ({})", comment)?;
        }
        Ok(())
    }
}

/// Receives released events
pub trait UpdateEventSubscriber: Send + Sync {
    /// Called once per released event of a subscribed kind
    fn notify(&self, event: &UpdateEvent);
}

/// Buffers events until the enclosing transaction ends
pub trait UpdateEventPublisher: Send + Sync {
    /// Queue an event
    fn publish(&self, event: UpdateEvent);

    /// Deliver all queued events to subscribers, returning how many were queued
    fn release(&self) -> usize;

    /// Drop all queued events without delivering them
    fn clear(&self) -> usize;

    /// Register a subscriber for some kinds (all kinds when `kinds` is empty)
    fn subscribe(&self, kinds: &[ObjectKind], subscriber: Arc<dyn UpdateEventSubscriber>);

    /// Number of queued events
    fn pending(&self) -> usize;
}

struct Subscription {
    kinds: Vec<ObjectKind>,
    subscriber: Arc<dyn UpdateEventSubscriber>,
}

impl Subscription {
    fn wants(&self, kind: ObjectKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

/// In-process publisher with a plain queue
#[derive(Default)]
pub struct BufferedPublisher {
    queue: Mutex<Vec<UpdateEvent>>,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl BufferedPublisher {
    /// Create a publisher without subscribers
    pub fn new() -> Self {
        Self::default()
    }
}

impl UpdateEventPublisher for BufferedPublisher {
    fn publish(&self, event: UpdateEvent) {
        self.queue.lock().push(event);
    }

    fn release(&self) -> usize {
        // Subscribers run outside the queue lock so they may publish again.
        let events = std::mem::take(&mut *self.queue.lock());
        let subscriptions = self.subscriptions.read();
        for event in &events {
            for subscription in subscriptions.iter().filter(|s| s.wants(event.kind)) {
                subscription.subscriber.notify(event);
            }
        }
        events.len()
    }

    fn clear(&self) -> usize {
        let mut queue = self.queue.lock();
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    fn subscribe(&self, kinds: &[ObjectKind], subscriber: Arc<dyn UpdateEventSubscriber>) {
        self.subscriptions.write().push(Subscription {
            kinds: kinds.to_vec(),
            subscriber,
        });
    }

    fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}
