//! Task aggregate.

use super::{Command, Event};
use crate::error::ApiError;
use crate::types::{ProjectId, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate state of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub assignee: Option<UserId>,
    pub project: Option<ProjectId>,
    pub when_created: DateTime<Utc>,
    pub completed: bool,
}

/// Handles task commands and applies task events.
#[derive(Debug, Clone)]
pub struct TaskAggregate {
    id: TaskId,
    state: Option<Task>,
    version: u64,
}

impl TaskAggregate {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            state: None,
            version: 0,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Current state, `None` until `TaskCreated` has been applied.
    pub fn state(&self) -> Option<&Task> {
        self.state.as_ref()
    }

    /// Number of events applied so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Decide the event a command produces, without changing state.
    pub fn handle(&self, command: &Command, now: DateTime<Utc>) -> Result<Event, ApiError> {
        match command {
            Command::CreateTask {
                id,
                name,
                description,
                assignee,
                project,
            } => {
                if self.state.is_some() {
                    return Err(ApiError::CommandRejected(format!(
                        "Task {} already exists",
                        id
                    )));
                }
                Ok(Event::TaskCreated {
                    id: id.clone(),
                    name: name.clone(),
                    description: description.clone(),
                    assignee: assignee.clone(),
                    project: project.clone(),
                    when: now,
                })
            }
            Command::RenameTask { id, name } => {
                self.existing()?;
                Ok(Event::TaskRenamed {
                    id: id.clone(),
                    name: name.clone(),
                    when: now,
                })
            }
            Command::ReassignTask { id, new_assignee } => {
                let task = self.existing()?;
                Ok(Event::TaskReassigned {
                    id: id.clone(),
                    from: task.assignee.clone(),
                    to: new_assignee.clone(),
                    when: now,
                })
            }
            Command::CompleteTask { id } => {
                let task = self.existing()?;
                if task.completed {
                    return Err(ApiError::CommandRejected(format!(
                        "Task {} is already completed",
                        id
                    )));
                }
                Ok(Event::TaskCompleted {
                    id: id.clone(),
                    project: task.project.clone(),
                    when: now,
                })
            }
            Command::CreateProject { .. } => Err(ApiError::CommandRejected(format!(
                "{} is not a task command",
                command.type_name()
            ))),
        }
    }

    /// Fold an event into the aggregate state.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::TaskCreated {
                id,
                name,
                description,
                assignee,
                project,
                when,
            } => {
                self.state = Some(Task {
                    id: id.clone(),
                    name: name.clone(),
                    description: description.clone(),
                    assignee: assignee.clone(),
                    project: project.clone(),
                    when_created: *when,
                    completed: false,
                });
            }
            Event::TaskRenamed { name, .. } => {
                if let Some(task) = self.state.as_mut() {
                    task.name = name.clone();
                }
            }
            Event::TaskReassigned { to, .. } => {
                if let Some(task) = self.state.as_mut() {
                    task.assignee = Some(to.clone());
                }
            }
            Event::TaskCompleted { .. } => {
                if let Some(task) = self.state.as_mut() {
                    task.completed = true;
                }
            }
            Event::ProjectCreated { .. } => return,
        }
        self.version += 1;
    }

    fn existing(&self) -> Result<&Task, ApiError> {
        self.state
            .as_ref()
            .ok_or_else(|| ApiError::CommandRejected(format!("Task {} does not exist", self.id)))
    }
}
