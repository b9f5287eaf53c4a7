//! Project aggregate.

use super::{Command, Event};
use crate::error::ApiError;
use crate::types::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub when_created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProjectAggregate {
    id: ProjectId,
    state: Option<Project>,
}

impl ProjectAggregate {
    pub fn new(id: ProjectId) -> Self {
        Self { id, state: None }
    }

    pub fn state(&self) -> Option<&Project> {
        self.state.as_ref()
    }

    pub fn handle(&self, command: &Command, now: DateTime<Utc>) -> Result<Event, ApiError> {
        match command {
            Command::CreateProject { id, name } => {
                if self.state.is_some() {
                    return Err(ApiError::CommandRejected(format!(
                        "Project {} already exists",
                        self.id
                    )));
                }
                Ok(Event::ProjectCreated {
                    id: id.clone(),
                    name: name.clone(),
                    when: now,
                })
            }
            other => Err(ApiError::CommandRejected(format!(
                "{} is not a project command",
                other.type_name()
            ))),
        }
    }

    pub fn apply(&mut self, event: &Event) {
        if let Event::ProjectCreated { id, name, when } = event {
            self.state = Some(Project {
                id: id.clone(),
                name: name.clone(),
                when_created: *when,
            });
        }
    }
}
