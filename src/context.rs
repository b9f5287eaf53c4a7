//! Bounded Context
//!
//! Composes the domain fixtures into the three facades the delivery layer
//! uses: posting commands, querying read models and subscribing to entity
//! changes. Aggregates and projections live in memory behind `RwLock`s;
//! subscriber callbacks always run after every repository lock is released.
//! Posts are serialized, so projections and subscribers see events in the
//! order the aggregates produced them.

use crate::domain::routing::{project_progress_targets, user_tasks_targets};
use crate::domain::{
    Ack, Command, CommandEnvelope, CommandTarget, Event, ProjectAggregate,
    ProjectProgressProjection, TaskAggregate, UserTasksProjection,
};
use crate::error::ApiError;
use crate::types::{ProjectId, SubscriptionId, TaskId, UserId};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Entity type a query or subscription is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Task,
    UserTasks,
    ProjectProgress,
}

/// Column of the `UserTasks` read model usable in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    TasksCount,
    IsOverloaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Gt,
    Lt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: Column,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub target: Target,
    /// Restrict to these entity ids; all entities when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<ColumnFilter>,
}

impl Query {
    pub fn all(target: Target) -> Self {
        Self {
            target,
            ids: None,
            filters: Vec::new(),
        }
    }
}

/// One entity in a query result or subscription update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: String,
    pub state: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub target: Target,
    pub entities: Vec<EntityState>,
}

/// What a subscriber is interested in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub target: Target,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
}

impl Topic {
    fn matches(&self, target: Target, id: &str) -> bool {
        self.target == target
            && self
                .ids
                .as_ref()
                .map_or(true, |ids| ids.iter().any(|wanted| wanted == id))
    }
}

impl From<&Topic> for Query {
    fn from(topic: &Topic) -> Self {
        Self {
            target: topic.target,
            ids: topic.ids.clone(),
            filters: Vec::new(),
        }
    }
}

/// New state of an entity, delivered to matching subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate {
    pub target: Target,
    pub entity: EntityState,
}

pub type Subscriber = Arc<dyn Fn(EntityUpdate) + Send + Sync>;

/// In-memory bounded context hosting the task-tracking model.
pub struct BoundedContext {
    name: String,
    tasks: RwLock<BTreeMap<TaskId, TaskAggregate>>,
    projects: RwLock<BTreeMap<ProjectId, ProjectAggregate>>,
    user_tasks: RwLock<BTreeMap<UserId, UserTasksProjection>>,
    progress: RwLock<BTreeMap<ProjectId, ProjectProgressProjection>>,
    subscribers: RwLock<HashMap<SubscriptionId, (Topic, Subscriber)>>,
    // Held from handling a command until its updates are handed to subscribers.
    posting: Mutex<()>,
}

impl BoundedContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: RwLock::new(BTreeMap::new()),
            projects: RwLock::new(BTreeMap::new()),
            user_tasks: RwLock::new(BTreeMap::new()),
            progress: RwLock::new(BTreeMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            posting: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle a command and propagate the resulting event.
    ///
    /// Rejections are reported in the returned `Ack`, never as an error.
    pub fn post(&self, envelope: CommandEnvelope) -> Ack {
        let CommandEnvelope { id, message } = envelope;
        let _posting = self.posting.lock();
        let event = match self.handle(&message) {
            Ok(event) => event,
            Err(e) => {
                debug!(
                    command = message.type_name(),
                    command_id = %id,
                    error = %e,
                    "Command rejected"
                );
                return Ack::rejected(id, e.to_string());
            }
        };

        let updates = match self.dispatch(&event) {
            Ok(updates) => updates,
            Err(e) => return Ack::rejected(id, e.to_string()),
        };
        self.notify(updates);
        debug!(command = message.type_name(), command_id = %id, "Command handled");
        Ack::ok(id, vec![event])
    }

    fn handle(&self, command: &Command) -> Result<Event, ApiError> {
        let now = Utc::now();
        match command.target() {
            CommandTarget::Task(id) => {
                let mut tasks = self.tasks.write();
                let aggregate = tasks
                    .entry(id.clone())
                    .or_insert_with(|| TaskAggregate::new(id.clone()));
                match aggregate.handle(command, now) {
                    Ok(event) => {
                        aggregate.apply(&event);
                        Ok(event)
                    }
                    Err(e) => {
                        if aggregate.state().is_none() {
                            tasks.remove(&id);
                        }
                        Err(e)
                    }
                }
            }
            CommandTarget::Project(id) => {
                let mut projects = self.projects.write();
                let aggregate = projects
                    .entry(id.clone())
                    .or_insert_with(|| ProjectAggregate::new(id.clone()));
                match aggregate.handle(command, now) {
                    Ok(event) => {
                        aggregate.apply(&event);
                        Ok(event)
                    }
                    Err(e) => {
                        if aggregate.state().is_none() {
                            projects.remove(&id);
                        }
                        Err(e)
                    }
                }
            }
        }
    }

    /// Route an event to the projections and collect changed entities.
    fn dispatch(&self, event: &Event) -> Result<Vec<EntityUpdate>, ApiError> {
        let mut updates = Vec::new();

        if let Some(task_id) = task_of(event) {
            if let Some(task) = self.tasks.read().get(task_id).and_then(|a| a.state()) {
                updates.push(EntityUpdate {
                    target: Target::Task,
                    entity: EntityState {
                        id: task_id.to_string(),
                        state: serde_json::to_value(task)?,
                    },
                });
            }
        }

        {
            let mut user_tasks = self.user_tasks.write();
            for user in user_tasks_targets(event) {
                let projection = user_tasks
                    .entry(user.clone())
                    .or_insert_with(|| UserTasksProjection::new(user.clone()));
                if projection.apply(event) {
                    updates.push(EntityUpdate {
                        target: Target::UserTasks,
                        entity: EntityState {
                            id: user.to_string(),
                            state: serde_json::to_value(projection.state())?,
                        },
                    });
                }
            }
        }

        {
            let mut progress = self.progress.write();
            for project in project_progress_targets(event) {
                let projection = progress
                    .entry(project.clone())
                    .or_insert_with(|| ProjectProgressProjection::new(project.clone()));
                if projection.apply(event) {
                    updates.push(EntityUpdate {
                        target: Target::ProjectProgress,
                        entity: EntityState {
                            id: project.to_string(),
                            state: serde_json::to_value(projection.state())?,
                        },
                    });
                }
            }
        }

        Ok(updates)
    }

    fn notify(&self, updates: Vec<EntityUpdate>) {
        for update in updates {
            let matching: Vec<Subscriber> = self
                .subscribers
                .read()
                .values()
                .filter(|(topic, _)| topic.matches(update.target, &update.entity.id))
                .map(|(_, subscriber)| Arc::clone(subscriber))
                .collect();
            for subscriber in matching {
                subscriber(update.clone());
            }
        }
    }

    /// Read the current state of the entities a query selects, ordered by id.
    pub fn query(&self, query: &Query) -> Result<QueryResult, ApiError> {
        let wanted = |id: &str| {
            query
                .ids
                .as_ref()
                .map_or(true, |ids| ids.iter().any(|wanted| wanted == id))
        };
        if query.target != Target::UserTasks && !query.filters.is_empty() {
            return Err(ApiError::InvalidMessage(format!(
                "{:?} has no filterable columns",
                query.target
            )));
        }

        let mut entities = Vec::new();
        match query.target {
            Target::Task => {
                for (id, aggregate) in self.tasks.read().iter() {
                    if let Some(task) = aggregate.state().filter(|_| wanted(id.as_str())) {
                        entities.push(EntityState {
                            id: id.to_string(),
                            state: serde_json::to_value(task)?,
                        });
                    }
                }
            }
            Target::UserTasks => {
                for (id, projection) in self.user_tasks.read().iter() {
                    if !wanted(id.as_str()) {
                        continue;
                    }
                    let state = projection.state();
                    let mut keep = true;
                    for filter in &query.filters {
                        keep &= column_matches(filter, state.tasks_count(), state.is_overloaded())?;
                    }
                    if keep {
                        entities.push(EntityState {
                            id: id.to_string(),
                            state: serde_json::to_value(state)?,
                        });
                    }
                }
            }
            Target::ProjectProgress => {
                for (id, projection) in self.progress.read().iter() {
                    if wanted(id.as_str()) {
                        entities.push(EntityState {
                            id: id.to_string(),
                            state: serde_json::to_value(projection.state())?,
                        });
                    }
                }
            }
        }

        Ok(QueryResult {
            target: query.target,
            entities,
        })
    }

    /// Register `subscriber` for updates matching `topic`.
    ///
    /// Callbacks run while a post is in progress; they must not block or post
    /// commands themselves.
    pub fn subscribe(&self, topic: Topic, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId::generate();
        info!(subscription = %id, target = ?topic.target, "Subscription created");
        self.subscribers
            .write()
            .insert(id.clone(), (topic, subscriber));
        id
    }

    /// Drop a subscription; returns whether it existed.
    pub fn cancel(&self, id: &SubscriptionId) -> bool {
        let existed = self.subscribers.write().remove(id).is_some();
        if existed {
            info!(subscription = %id, "Subscription cancelled");
        }
        existed
    }
}

fn task_of(event: &Event) -> Option<&TaskId> {
    match event {
        Event::TaskCreated { id, .. }
        | Event::TaskRenamed { id, .. }
        | Event::TaskReassigned { id, .. }
        | Event::TaskCompleted { id, .. } => Some(id),
        Event::ProjectCreated { .. } => None,
    }
}

fn column_matches(
    filter: &ColumnFilter,
    tasks_count: usize,
    overloaded: bool,
) -> Result<bool, ApiError> {
    match filter.column {
        Column::TasksCount => {
            let expected = filter.value.as_u64().ok_or_else(|| {
                ApiError::InvalidMessage("tasks_count filter needs a non-negative integer".into())
            })?;
            let actual = tasks_count as u64;
            Ok(match filter.op {
                FilterOp::Eq => actual == expected,
                FilterOp::Gt => actual > expected,
                FilterOp::Lt => actual < expected,
            })
        }
        Column::IsOverloaded => {
            let expected = filter.value.as_bool().ok_or_else(|| {
                ApiError::InvalidMessage("is_overloaded filter needs a boolean".into())
            })?;
            match filter.op {
                FilterOp::Eq => Ok(overloaded == expected),
                op => Err(ApiError::InvalidMessage(format!(
                    "is_overloaded does not support {:?}",
                    op
                ))),
            }
        }
    }
}
