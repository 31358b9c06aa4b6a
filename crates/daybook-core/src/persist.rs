use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::backend::Backend;
use crate::datemask;
use crate::entity::{Entity, UserId, ValidationError};
use crate::form::{Form, FormError, FormPhase, Selection};
use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct PersistPolicy {
    pub rollback_on_failure: bool,
}

#[instrument(skip_all, fields(kind = %E::KIND, id = form.draft().id()))]
pub async fn save<E: Entity, B: Backend<E>>(
    form: &mut Form<E>,
    backend: &B,
    notifier: &Notifier,
    policy: PersistPolicy,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<(), FormError> {
    form.draft().validate()?;
    if !form.is_dirty() {
        return Err(FormError::Clean);
    }
    form.begin(FormPhase::Saving)?;

    let creating = !form.draft().is_persisted();
    let mut outgoing = form.draft().clone();
    let title = outgoing.title().trim().to_string();
    outgoing.set_title(title);
    let deadline = datemask::normalize(outgoing.deadline()).to_string();
    outgoing.set_deadline(deadline);
    if creating {
        let millis = now.timestamp_millis();
        outgoing.set_id(millis);
        outgoing.set_start(DateTime::from_timestamp_millis(millis).unwrap_or(now));
        outgoing.set_owner(user);
    }

    let result = if creating {
        backend.create(&outgoing).await
    } else {
        backend.update(&outgoing).await
    };
    form.finish();

    match result {
        Ok(()) => {
            let verb = if creating { "created" } else { "updated" };
            info!(id = outgoing.id(), verb, "save settled");
            form.commit(outgoing);
            notifier.success(format!("{} {verb} successfully", E::KIND.label()));
            Ok(())
        }
        Err(err) => {
            info!(error = %err, "save failed");
            if policy.rollback_on_failure {
                form.rollback();
            }
            notifier.error(format!("{} save failed", E::KIND.label()));
            Err(err.into())
        }
    }
}

#[instrument(skip_all, fields(kind = %E::KIND, id = form.draft().id()))]
pub async fn delete<E: Entity, B: Backend<E>>(
    form: &mut Form<E>,
    selection: &mut Selection<E>,
    backend: &B,
    notifier: &Notifier,
) -> Result<(), FormError> {
    if !form.draft().is_persisted() {
        return Err(ValidationError::Unsaved.into());
    }
    form.begin(FormPhase::Deleting)?;

    let target = form.draft().clone();
    let result = backend.delete(&target).await;
    form.finish();

    match result {
        Ok(()) => {
            info!(id = target.id(), "delete settled");
            form.clear(selection)?;
            notifier.success(format!("{} deleted successfully", E::KIND.label()));
            Ok(())
        }
        Err(err) => {
            info!(error = %err, "delete failed");
            notifier.error(format!("{} delete failed", E::KIND.label()));
            Err(err.into())
        }
    }
}

#[instrument(skip_all, fields(kind = %E::KIND, id = form.draft().id(), completed))]
pub async fn complete<E: Entity, B: Backend<E>>(
    form: &mut Form<E>,
    selection: &mut Selection<E>,
    backend: &B,
    notifier: &Notifier,
    policy: PersistPolicy,
    completed: bool,
) -> Result<(), FormError> {
    if !form.draft().is_persisted() {
        return Err(ValidationError::Unsaved.into());
    }
    form.begin(FormPhase::Completing)?;

    let mut outgoing = form.draft().clone();
    outgoing.set_completed(completed);
    *form.draft_mut() = outgoing.clone();

    let result = backend.update(&outgoing).await;
    form.finish();

    match result {
        Ok(()) => {
            info!(id = outgoing.id(), completed, "completion settled");
            form.commit(outgoing.clone());
            selection.set(outgoing);
            if completed {
                notifier.success(format!("{} completed", E::KIND.label()));
            } else {
                notifier.error(format!("{} returned", E::KIND.label()));
            }
            Ok(())
        }
        Err(err) => {
            info!(error = %err, "completion failed");
            if policy.rollback_on_failure {
                form.rollback();
            }
            notifier.error(format!("{} completion failed", E::KIND.label()));
            Err(err.into())
        }
    }
}
