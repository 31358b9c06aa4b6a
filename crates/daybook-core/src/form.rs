use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::backend::PersistenceError;
use crate::cascade::{self, CascadeAction};
use crate::entity::{Entity, Task, ValidationError};
use crate::subtasks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Idle,
    Saving,
    Deleting,
    Completing,
}

impl FormPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, FormPhase::Idle)
    }
}

impl fmt::Display for FormPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormPhase::Idle => "idle",
            FormPhase::Saving => "saving",
            FormPhase::Deleting => "deleting",
            FormPhase::Completing => "completing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("no changes to save")]
    Clean,

    #[error("a {0} operation is still settling")]
    Busy(FormPhase),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormFlags {
    pub dirty: bool,
    pub busy: bool,
    pub edit_mode: bool,
}

#[derive(Debug, Clone)]
pub struct Selection<E> {
    current: Option<E>,
}

impl<E: Entity> Selection<E> {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn set(&mut self, entity: E) {
        self.current = Some(entity);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn get(&self) -> Option<&E> {
        self.current.as_ref()
    }
}

impl<E: Entity> Default for Selection<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct Form<E: Entity> {
    draft: E,
    baseline: E,
    phase: FormPhase,
}

impl<E: Entity> Form<E> {
    pub fn create() -> Self {
        Self {
            draft: E::blank(),
            baseline: E::blank(),
            phase: FormPhase::Idle,
        }
    }

    pub fn edit(entity: E) -> Self {
        Self {
            draft: entity.clone(),
            baseline: entity,
            phase: FormPhase::Idle,
        }
    }

    pub fn open(selection: &Selection<E>) -> Self {
        match selection.get() {
            Some(entity) => Self::edit(entity.clone()),
            None => Self::create(),
        }
    }

    pub fn draft(&self) -> &E {
        &self.draft
    }

    pub fn baseline(&self) -> &E {
        &self.baseline
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.baseline
    }

    pub fn is_busy(&self) -> bool {
        !self.phase.is_idle()
    }

    pub fn is_edit_mode(&self) -> bool {
        self.draft.is_persisted()
    }

    pub fn flags(&self) -> FormFlags {
        FormFlags {
            dirty: self.is_dirty(),
            busy: self.is_busy(),
            edit_mode: self.is_edit_mode(),
        }
    }

    pub fn apply(&mut self, patch: E::Patch) {
        self.draft.apply(patch);
    }

    pub fn reset(&mut self) -> Result<(), FormError> {
        self.ensure_idle()?;
        self.draft = self.baseline.clone();
        Ok(())
    }

    pub fn clear(&mut self, selection: &mut Selection<E>) -> Result<(), FormError> {
        self.ensure_idle()?;
        self.draft = E::blank();
        self.baseline = E::blank();
        selection.clear();
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), FormError> {
        if self.phase.is_idle() {
            Ok(())
        } else {
            Err(FormError::Busy(self.phase))
        }
    }

    pub(crate) fn begin(&mut self, phase: FormPhase) -> Result<(), FormError> {
        self.ensure_idle()?;
        debug!(phase = %phase, "form operation started");
        self.phase = phase;
        Ok(())
    }

    pub(crate) fn finish(&mut self) {
        debug!(phase = %self.phase, "form operation settled");
        self.phase = FormPhase::Idle;
    }

    pub(crate) fn draft_mut(&mut self) -> &mut E {
        &mut self.draft
    }

    pub(crate) fn commit(&mut self, snapshot: E) {
        self.draft = snapshot.clone();
        self.baseline = snapshot;
    }

    pub(crate) fn rollback(&mut self) {
        self.draft = self.baseline.clone();
    }
}

impl Form<Task> {
    pub fn add_subtask(&mut self, text: &str) -> Result<CascadeAction, FormError> {
        let next = subtasks::append(&self.draft, text)?;
        Ok(self.accept_cascaded(next))
    }

    pub fn edit_subtask(&mut self, index: usize, text: &str) -> Result<CascadeAction, FormError> {
        let next = subtasks::edit(&self.draft, index, text)?;
        Ok(self.accept_cascaded(next))
    }

    pub fn toggle_subtask(&mut self, index: usize) -> Result<CascadeAction, FormError> {
        let next = subtasks::toggle(&self.draft, index)?;
        Ok(self.accept_cascaded(next))
    }

    pub fn remove_subtask(&mut self, index: usize) -> Result<CascadeAction, FormError> {
        let next = subtasks::remove(&self.draft, index)?;
        Ok(self.accept_cascaded(next))
    }

    fn accept_cascaded(&mut self, next: Task) -> CascadeAction {
        let (settled, action) = cascade::cascade(&next);
        self.draft = settled;
        action
    }
}
