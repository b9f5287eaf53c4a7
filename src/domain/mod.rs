//! Domain Fixtures
//!
//! Commands, events and the aggregates and projections of the task-tracking
//! model the harness exercises. Aggregates turn commands into events and fold
//! events into their own state; projections fold routed events into read
//! models.

pub mod project;
pub mod project_progress;
pub mod routing;
pub mod task;
pub mod user_tasks;

pub use project::{Project, ProjectAggregate};
pub use project_progress::{ProgressStatus, ProjectProgress, ProjectProgressProjection};
pub use task::{Task, TaskAggregate};
pub use user_tasks::{UserTasks, UserTasksProjection};

use crate::types::{CommandId, ProjectId, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Command messages accepted by the bounded context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    CreateTask {
        id: TaskId,
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee: Option<UserId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<ProjectId>,
    },
    RenameTask {
        id: TaskId,
        name: String,
    },
    ReassignTask {
        id: TaskId,
        new_assignee: UserId,
    },
    CompleteTask {
        id: TaskId,
    },
    CreateProject {
        id: ProjectId,
        name: String,
    },
}

/// Aggregate a command is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTarget {
    Task(TaskId),
    Project(ProjectId),
}

impl Command {
    pub fn target(&self) -> CommandTarget {
        match self {
            Command::CreateTask { id, .. }
            | Command::RenameTask { id, .. }
            | Command::ReassignTask { id, .. }
            | Command::CompleteTask { id } => CommandTarget::Task(id.clone()),
            Command::CreateProject { id, .. } => CommandTarget::Project(id.clone()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Command::CreateTask { .. } => "CreateTask",
            Command::RenameTask { .. } => "RenameTask",
            Command::ReassignTask { .. } => "ReassignTask",
            Command::CompleteTask { .. } => "CompleteTask",
            Command::CreateProject { .. } => "CreateProject",
        }
    }
}

/// A command together with the identifier its acknowledgement refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    #[serde(default = "CommandId::generate")]
    pub id: CommandId,
    pub message: Command,
}

impl CommandEnvelope {
    pub fn new(message: Command) -> Self {
        Self {
            id: CommandId::generate(),
            message,
        }
    }
}

/// Events emitted by the aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TaskCreated {
        id: TaskId,
        name: String,
        description: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee: Option<UserId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<ProjectId>,
        when: DateTime<Utc>,
    },
    TaskRenamed {
        id: TaskId,
        name: String,
        when: DateTime<Utc>,
    },
    TaskReassigned {
        id: TaskId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<UserId>,
        to: UserId,
        when: DateTime<Utc>,
    },
    TaskCompleted {
        id: TaskId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<ProjectId>,
        when: DateTime<Utc>,
    },
    ProjectCreated {
        id: ProjectId,
        name: String,
        when: DateTime<Utc>,
    },
}

impl Event {
    pub fn when(&self) -> DateTime<Utc> {
        match self {
            Event::TaskCreated { when, .. }
            | Event::TaskRenamed { when, .. }
            | Event::TaskReassigned { when, .. }
            | Event::TaskCompleted { when, .. }
            | Event::ProjectCreated { when, .. } => *when,
        }
    }
}

/// Outcome of posting a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AckStatus {
    Ok,
    Rejected { reason: String },
}

/// Acknowledgement returned for every posted command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub command_id: CommandId,
    pub status: AckStatus,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl Ack {
    pub fn ok(command_id: CommandId, events: Vec<Event>) -> Self {
        Self {
            command_id,
            status: AckStatus::Ok,
            events,
        }
    }

    pub fn rejected(command_id: CommandId, reason: String) -> Self {
        Self {
            command_id,
            status: AckStatus::Rejected { reason },
            events: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AckStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_envelope_from_json() {
        let raw = json!({
            "id": "c1",
            "message": {"type": "CreateTask", "id": "t1", "name": "write docs", "assignee": "ann"}
        });
        let envelope: CommandEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.id, CommandId::new("c1"));
        assert_eq!(envelope.message.target(), CommandTarget::Task(TaskId::new("t1")));
        match envelope.message {
            Command::CreateTask {
                description,
                assignee,
                project,
                ..
            } => {
                assert_eq!(description, "");
                assert_eq!(assignee, Some(UserId::new("ann")));
                assert_eq!(project, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_envelope_id_defaults_when_missing() {
        let raw = json!({"message": {"type": "CompleteTask", "id": "t1"}});
        let envelope: CommandEnvelope = serde_json::from_value(raw).unwrap();
        assert!(!envelope.id.as_str().is_empty());
    }

    #[test]
    fn test_rejected_ack_shape() {
        let ack = Ack::rejected(CommandId::new("c1"), "no such task".to_string());
        let value = serde_json::to_value(&ack).unwrap();
        assert_eq!(value["status"]["kind"], "rejected");
        assert_eq!(value["status"]["reason"], "no such task");
        assert!(!ack.is_ok());
    }
}
