//! Event routing: which projection instances an event reaches.

use super::Event;
use crate::types::{ProjectId, UserId};
use std::collections::BTreeSet;

/// `UserTasks` projections targeted by an event.
///
/// A created task goes to its assignee, if any. A reassigned task goes to both
/// the previous and the new assignee.
pub fn user_tasks_targets(event: &Event) -> BTreeSet<UserId> {
    let mut targets = BTreeSet::new();
    match event {
        Event::TaskCreated {
            assignee: Some(assignee),
            ..
        } => {
            targets.insert(assignee.clone());
        }
        Event::TaskReassigned { from, to, .. } => {
            if let Some(from) = from {
                targets.insert(from.clone());
            }
            targets.insert(to.clone());
        }
        _ => {}
    }
    targets
}

/// `ProjectProgress` projections targeted by an event.
pub fn project_progress_targets(event: &Event) -> BTreeSet<ProjectId> {
    let mut targets = BTreeSet::new();
    match event {
        Event::ProjectCreated { id, .. } => {
            targets.insert(id.clone());
        }
        Event::TaskCreated {
            project: Some(project),
            ..
        }
        | Event::TaskCompleted {
            project: Some(project),
            ..
        } => {
            targets.insert(project.clone());
        }
        _ => {}
    }
    targets
}
