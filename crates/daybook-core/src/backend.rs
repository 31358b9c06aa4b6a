use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::entity::{Entity, EntityId, EntityKind, UserId};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Backend<E: Entity>: Send + Sync {
    async fn create(&self, entity: &E) -> Result<(), PersistenceError>;
    async fn update(&self, entity: &E) -> Result<(), PersistenceError>;
    async fn delete(&self, entity: &E) -> Result<(), PersistenceError>;
    async fn list(&self, owner: UserId) -> Result<Vec<E>, PersistenceError>;
}

#[derive(Debug)]
pub struct MemoryBackend<E> {
    rows: RwLock<Vec<E>>,
    failure: RwLock<Option<String>>,
}

impl<E: Entity> MemoryBackend<E> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
        }
    }

    pub async fn fail_next(&self, reason: &str) {
        *self.failure.write().await = Some(reason.to_string());
    }

    pub async fn rows(&self) -> Vec<E> {
        self.rows.read().await.clone()
    }

    async fn take_failure(&self) -> Result<(), PersistenceError> {
        if let Some(reason) = self.failure.write().await.take() {
            return Err(PersistenceError::Unavailable(reason));
        }
        Ok(())
    }
}

impl<E: Entity> Default for MemoryBackend<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> Backend<E> for MemoryBackend<E> {
    async fn create(&self, entity: &E) -> Result<(), PersistenceError> {
        self.take_failure().await?;
        self.rows.write().await.push(entity.clone());
        Ok(())
    }

    async fn update(&self, entity: &E) -> Result<(), PersistenceError> {
        self.take_failure().await?;
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|row| row.id() == entity.id())
            .ok_or(PersistenceError::NotFound {
                kind: E::KIND,
                id: entity.id(),
            })?;
        *row = entity.clone();
        Ok(())
    }

    async fn delete(&self, entity: &E) -> Result<(), PersistenceError> {
        self.take_failure().await?;
        let mut rows = self.rows.write().await;
        let idx = rows
            .iter()
            .position(|row| row.id() == entity.id())
            .ok_or(PersistenceError::NotFound {
                kind: E::KIND,
                id: entity.id(),
            })?;
        rows.remove(idx);
        Ok(())
    }

    async fn list(&self, owner: UserId) -> Result<Vec<E>, PersistenceError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|row| row.owner() == Some(owner))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Task;

    fn saved_task(id: EntityId, owner: UserId, title: &str) -> Task {
        let mut task = Task::blank();
        task.id = id;
        task.owner = Some(owner);
        task.title = title.to_string();
        task.description = "details".to_string();
        task
    }

    #[tokio::test]
    async fn create_update_delete_round_trip() {
        let backend = MemoryBackend::new();
        let owner = UserId::generate();
        let task = saved_task(1, owner, "First");

        backend.create(&task).await.expect("create");
        assert_eq!(backend.rows().await.len(), 1);

        let mut changed = task.clone();
        changed.title = "First, renamed".to_string();
        backend.update(&changed).await.expect("update");
        assert_eq!(backend.rows().await[0].title, "First, renamed");

        backend.delete(&changed).await.expect("delete");
        assert!(backend.rows().await.is_empty());
    }

    #[tokio::test]
    async fn update_of_a_missing_row_is_not_found() {
        let backend = MemoryBackend::new();
        let task = saved_task(42, UserId::generate(), "Ghost");

        let err = backend.update(&task).await.expect_err("missing row");
        assert!(matches!(
            err,
            PersistenceError::NotFound {
                kind: EntityKind::Task,
                id: 42
            }
        ));
    }

    #[tokio::test]
    async fn list_filters_by_owner() {
        let backend = MemoryBackend::new();
        let alice = UserId::generate();
        let bert = UserId::generate();

        backend.create(&saved_task(1, alice, "Hers")).await.expect("create");
        backend.create(&saved_task(2, bert, "Theirs")).await.expect("create");

        let rows = backend.list(alice).await.expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Hers");
    }

    #[tokio::test]
    async fn injected_failure_fires_exactly_once() {
        let backend = MemoryBackend::new();
        let task = saved_task(1, UserId::generate(), "Flaky");

        backend.fail_next("socket closed").await;
        let err = backend.create(&task).await.expect_err("injected failure");
        assert!(matches!(err, PersistenceError::Unavailable(reason) if reason == "socket closed"));
        assert!(backend.rows().await.is_empty());

        backend.create(&task).await.expect("second attempt");
        assert_eq!(backend.rows().await.len(), 1);
    }
}
