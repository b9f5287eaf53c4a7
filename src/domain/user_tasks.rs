//! Per-user task list projection.

use super::Event;
use crate::types::{TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read model: the tasks currently assigned to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTasks {
    pub id: UserId,
    pub tasks: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl UserTasks {
    pub fn tasks_count(&self) -> usize {
        self.tasks.len()
    }

    /// More than one task assigned.
    pub fn is_overloaded(&self) -> bool {
        self.tasks_count() > 1
    }
}

pub struct UserTasksProjection {
    state: UserTasks,
}

impl UserTasksProjection {
    pub fn new(id: UserId) -> Self {
        Self {
            state: UserTasks {
                id,
                tasks: Vec::new(),
                last_updated: None,
            },
        }
    }

    pub fn id(&self) -> &UserId {
        &self.state.id
    }

    pub fn state(&self) -> &UserTasks {
        &self.state
    }

    /// Fold a routed event; returns whether the state changed.
    pub fn apply(&mut self, event: &Event) -> bool {
        let before = self.state.clone();
        match event {
            Event::TaskCreated {
                id,
                assignee: Some(assignee),
                when,
                ..
            } => {
                self.state.id = assignee.clone();
                self.state.tasks.push(id.clone());
                self.state.last_updated = Some(*when);
            }
            Event::TaskReassigned { id, from, to, when } => {
                // Reassigning to the current assignee leaves the list alone.
                let moved = from.as_ref() != Some(to);
                if moved && from.as_ref() == Some(self.id()) {
                    self.state.tasks.retain(|task| task != id);
                } else if moved && to == self.id() {
                    self.state.tasks.push(id.clone());
                }
                self.state.last_updated = Some(*when);
            }
            _ => {}
        }
        self.state != before
    }
}
