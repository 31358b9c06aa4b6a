use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::backend::{Backend, PersistenceError};
use crate::entity::{Entity, EntityKind, UserId};

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub debts_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        let debts_path = data_dir.join("debts.data");

        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }
        if !debts_path.exists() {
            fs::write(&debts_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            debts = %debts_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            debts_path,
        })
    }

    fn path_for(&self, kind: EntityKind) -> &Path {
        match kind {
            EntityKind::Task => &self.tasks_path,
            EntityKind::Debt => &self.debts_path,
        }
    }

    fn load_rows<E: Entity>(&self) -> Result<Vec<E>, PersistenceError> {
        load_jsonl(self.path_for(E::KIND)).map_err(backend_error)
    }

    fn save_rows<E: Entity>(&self, rows: &[E]) -> Result<(), PersistenceError> {
        save_jsonl_atomic(self.path_for(E::KIND), rows).map_err(backend_error)
    }
}

#[async_trait]
impl<E: Entity> Backend<E> for DataStore {
    async fn create(&self, entity: &E) -> Result<(), PersistenceError> {
        let mut rows: Vec<E> = self.load_rows()?;
        rows.push(entity.clone());
        rows.sort_by_key(Entity::id);
        self.save_rows(&rows)
    }

    async fn update(&self, entity: &E) -> Result<(), PersistenceError> {
        let mut rows: Vec<E> = self.load_rows()?;
        let row = rows
            .iter_mut()
            .find(|row| row.id() == entity.id())
            .ok_or(PersistenceError::NotFound {
                kind: E::KIND,
                id: entity.id(),
            })?;
        *row = entity.clone();
        self.save_rows(&rows)
    }

    async fn delete(&self, entity: &E) -> Result<(), PersistenceError> {
        let mut rows: Vec<E> = self.load_rows()?;
        let idx = rows
            .iter()
            .position(|row| row.id() == entity.id())
            .ok_or(PersistenceError::NotFound {
                kind: E::KIND,
                id: entity.id(),
            })?;
        rows.remove(idx);
        self.save_rows(&rows)
    }

    async fn list(&self, owner: UserId) -> Result<Vec<E>, PersistenceError> {
        let mut rows: Vec<E> = self.load_rows()?;
        rows.retain(|row| row.owner() == Some(owner));
        rows.sort_by_key(Entity::id);
        Ok(rows)
    }
}

fn backend_error(err: anyhow::Error) -> PersistenceError {
    PersistenceError::Backend(format!("{err:#}"))
}

#[tracing::instrument(skip(path))]
fn load_jsonl<E: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<E>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let row: E = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(row);
    }

    debug!(count = out.len(), "loaded rows from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, rows))]
fn save_jsonl_atomic<E: Serialize>(path: &Path, rows: &[E]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = rows.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for row in rows {
        let serialized = serde_json::to_string(row)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
