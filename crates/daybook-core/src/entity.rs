use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::datemask;

pub type EntityId = i64;

pub const UNSAVED_ID: EntityId = 0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Debt,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Task => "task",
            EntityKind::Debt => "debt",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Task => "Task",
            EntityKind::Debt => "Debt",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("title exceeds {max} characters")]
    TitleTooLong { max: usize },

    #[error("description must not be empty")]
    EmptyDescription,

    #[error("subtask text must not be empty")]
    EmptySubtask,

    #[error("subtask text exceeds {max} characters")]
    SubtaskTooLong { max: usize },

    #[error("no subtask at position {index} (list has {len})")]
    SubtaskIndex { index: usize, len: usize },

    #[error("deadline must be a complete DD-MM-YYYY date")]
    BadDeadline,

    #[error("entity has not been saved yet")]
    Unsaved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subtask {
    pub text: String,

    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    #[serde(default)]
    pub id: EntityId,

    #[serde(default)]
    pub owner: Option<UserId>,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start: Option<DateTime<Utc>>,

    #[serde(default)]
    pub deadline: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Debt {
    #[serde(default)]
    pub id: EntityId,

    #[serde(default)]
    pub owner: Option<UserId>,

    pub title: String,

    #[serde(default)]
    pub currency: String,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start: Option<DateTime<Utc>>,

    #[serde(default)]
    pub deadline: String,

    #[serde(default)]
    pub paid: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebtPatch {
    pub title: Option<String>,
    pub currency: Option<String>,
    pub deadline: Option<String>,
    pub paid: Option<bool>,
}

pub trait Entity:
    fmt::Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntityKind;
    const TITLE_MAX: usize;

    type Patch;

    fn blank() -> Self;

    fn id(&self) -> EntityId;
    fn set_id(&mut self, id: EntityId);

    fn owner(&self) -> Option<UserId>;
    fn set_owner(&mut self, owner: UserId);

    fn start(&self) -> Option<DateTime<Utc>>;
    fn set_start(&mut self, start: DateTime<Utc>);

    fn title(&self) -> &str;
    fn set_title(&mut self, title: String);

    fn deadline(&self) -> &str;
    fn set_deadline(&mut self, deadline: String);

    fn completed(&self) -> bool;
    fn set_completed(&mut self, completed: bool);

    fn apply(&mut self, patch: Self::Patch);
    fn validate(&self) -> Result<(), ValidationError>;

    fn is_persisted(&self) -> bool {
        self.id() != UNSAVED_ID
    }
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;
    const TITLE_MAX: usize = 40;

    type Patch = TaskPatch;

    fn blank() -> Self {
        Self {
            id: UNSAVED_ID,
            owner: None,
            title: String::new(),
            description: String::new(),
            start: None,
            deadline: datemask::DEADLINE_PLACEHOLDER.to_string(),
            completed: false,
            subtasks: vec![],
        }
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn owner(&self) -> Option<UserId> {
        self.owner
    }

    fn set_owner(&mut self, owner: UserId) {
        self.owner = Some(owner);
    }

    fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    fn set_start(&mut self, start: DateTime<Utc>) {
        self.start = Some(start);
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn set_title(&mut self, title: String) {
        self.title = title;
    }

    fn deadline(&self) -> &str {
        &self.deadline
    }

    fn set_deadline(&mut self, deadline: String) {
        self.deadline = deadline;
    }

    fn completed(&self) -> bool {
        self.completed
    }

    fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
    }

    fn apply(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title, Self::TITLE_MAX)?;
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        datemask::validate_deadline(&self.deadline)
    }
}

impl Entity for Debt {
    const KIND: EntityKind = EntityKind::Debt;
    const TITLE_MAX: usize = 75;

    type Patch = DebtPatch;

    fn blank() -> Self {
        Self {
            id: UNSAVED_ID,
            owner: None,
            title: String::new(),
            currency: String::new(),
            start: None,
            deadline: datemask::DEADLINE_PLACEHOLDER.to_string(),
            paid: false,
        }
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn owner(&self) -> Option<UserId> {
        self.owner
    }

    fn set_owner(&mut self, owner: UserId) {
        self.owner = Some(owner);
    }

    fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    fn set_start(&mut self, start: DateTime<Utc>) {
        self.start = Some(start);
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn set_title(&mut self, title: String) {
        self.title = title;
    }

    fn deadline(&self) -> &str {
        &self.deadline
    }

    fn set_deadline(&mut self, deadline: String) {
        self.deadline = deadline;
    }

    fn completed(&self) -> bool {
        self.paid
    }

    fn set_completed(&mut self, completed: bool) {
        self.paid = completed;
    }

    fn apply(&mut self, patch: DebtPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(currency) = patch.currency {
            self.currency = currency;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
        if let Some(paid) = patch.paid {
            self.paid = paid;
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title, Self::TITLE_MAX)?;
        datemask::validate_deadline(&self.deadline)
    }
}

fn validate_title(title: &str, max: usize) -> Result<(), ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TitleTooLong { max });
    }
    Ok(())
}
