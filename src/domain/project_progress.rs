//! Project progress projection.

use super::Event;
use crate::types::ProjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// Read model: task counts and status of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectProgress {
    pub id: ProjectId,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub status: ProgressStatus,
}

pub struct ProjectProgressProjection {
    state: ProjectProgress,
}

impl ProjectProgressProjection {
    pub fn new(id: ProjectId) -> Self {
        Self {
            state: ProjectProgress {
                id,
                total_tasks: 0,
                completed_tasks: 0,
                status: ProgressStatus::NotStarted,
            },
        }
    }

    pub fn state(&self) -> &ProjectProgress {
        &self.state
    }

    /// Fold a routed event; returns whether the state changed.
    pub fn apply(&mut self, event: &Event) -> bool {
        let before = self.state.clone();
        match event {
            Event::ProjectCreated { .. } => {
                self.state.total_tasks = 0;
                self.state.completed_tasks = 0;
                self.state.status = ProgressStatus::NotStarted;
            }
            Event::TaskCreated { .. } => {
                self.state.total_tasks += 1;
                self.state.status = ProgressStatus::InProgress;
            }
            Event::TaskCompleted { .. } => {
                self.state.completed_tasks += 1;
                self.state.status = if self.state.completed_tasks == self.state.total_tasks {
                    ProgressStatus::Completed
                } else {
                    ProgressStatus::InProgress
                };
            }
            _ => {}
        }
        self.state != before
    }
}
