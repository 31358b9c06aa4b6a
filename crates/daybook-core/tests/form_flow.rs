use chrono::Utc;
use daybook_core::backend::{Backend, MemoryBackend};
use daybook_core::cascade::CascadeAction;
use daybook_core::datastore::DataStore;
use daybook_core::entity::{
    Debt, DebtPatch, Entity, Subtask, Task, TaskPatch, UNSAVED_ID, UserId, ValidationError,
};
use daybook_core::form::{Form, FormError, Selection};
use daybook_core::notify::{NoticeLevel, Notifier};
use daybook_core::persist::{self, PersistPolicy};
use tempfile::tempdir;

fn drafted_task(title: &str) -> Form<Task> {
    let mut form = Form::create();
    form.apply(TaskPatch {
        title: Some(title.to_string()),
        description: Some("details".to_string()),
        ..Default::default()
    });
    form
}

fn persisted_task(id: i64, owner: UserId, title: &str) -> Task {
    let mut task = Task::blank();
    task.id = id;
    task.owner = Some(owner);
    task.start = Some(Utc::now());
    task.title = title.to_string();
    task.description = "details".to_string();
    task.deadline = String::new();
    task
}

#[tokio::test]
async fn first_save_assigns_identity_owner_and_start() {
    let backend = MemoryBackend::new();
    let (notifier, mut notices) = Notifier::channel();
    let user = UserId::generate();
    let now = Utc::now();

    let mut form = drafted_task("Buy milk");
    persist::save(
        &mut form,
        &backend,
        &notifier,
        PersistPolicy::default(),
        user,
        now,
    )
    .await
    .expect("save");

    let saved = form.draft();
    assert_eq!(saved.id, now.timestamp_millis());
    assert_eq!(saved.owner, Some(user));
    assert_eq!(
        saved.start.map(|ts| ts.timestamp_millis()),
        Some(now.timestamp_millis())
    );
    assert!(!saved.completed);
    assert_eq!(saved.deadline, "");
    assert!(!form.is_dirty());
    assert!(form.is_edit_mode());

    let rows = backend.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], *form.draft());

    let notice = notices.try_recv().expect("success notice");
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.message, "Task created successfully");
}

#[tokio::test]
async fn second_save_updates_in_place() {
    let backend = MemoryBackend::new();
    let (notifier, mut notices) = Notifier::channel();
    let user = UserId::generate();

    let task = persisted_task(42, user, "Original");
    backend.create(&task).await.expect("seed");

    let mut selection = Selection::new();
    selection.set(task);
    let mut form = Form::open(&selection);
    form.apply(TaskPatch {
        title: Some("  Renamed  ".to_string()),
        ..Default::default()
    });
    assert!(form.is_dirty());

    persist::save(
        &mut form,
        &backend,
        &notifier,
        PersistPolicy::default(),
        user,
        Utc::now(),
    )
    .await
    .expect("save");

    assert_eq!(form.draft().id, 42);
    assert_eq!(form.draft().title, "Renamed");
    assert!(!form.is_dirty());

    let rows = backend.rows().await;
    assert_eq!(rows[0].title, "Renamed");

    let notice = notices.try_recv().expect("success notice");
    assert_eq!(notice.message, "Task updated successfully");
}

#[tokio::test]
async fn save_on_a_clean_form_is_refused() {
    let backend = MemoryBackend::new();
    let (notifier, mut notices) = Notifier::channel();
    let user = UserId::generate();

    let task = persisted_task(42, user, "Original");
    backend.create(&task).await.expect("seed");

    let mut selection = Selection::new();
    selection.set(task);
    let mut form = Form::open(&selection);
    assert!(!form.is_dirty());

    backend.fail_next("service offline").await;
    let err = persist::save(
        &mut form,
        &backend,
        &notifier,
        PersistPolicy::default(),
        user,
        Utc::now(),
    )
    .await
    .expect_err("clean form must not save");
    assert!(matches!(err, FormError::Clean));

    assert!(form.phase().is_idle());
    assert_eq!(backend.rows().await[0].title, "Original");
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn update_never_reassigns_the_owner() {
    let backend = MemoryBackend::new();
    let (notifier, _notices) = Notifier::channel();
    let owner = UserId::generate();
    let editor = UserId::generate();

    let task = persisted_task(42, owner, "Original");
    backend.create(&task).await.expect("seed");

    let mut selection = Selection::new();
    selection.set(task);
    let mut form = Form::open(&selection);
    form.apply(TaskPatch {
        title: Some("Renamed".to_string()),
        ..Default::default()
    });

    persist::save(
        &mut form,
        &backend,
        &notifier,
        PersistPolicy::default(),
        editor,
        Utc::now(),
    )
    .await
    .expect("save");

    assert_eq!(form.draft().owner, Some(owner));
    assert_eq!(backend.rows().await[0].owner, Some(owner));
}

#[tokio::test]
async fn unsaved_subtask_completion_stays_local() {
    let backend: MemoryBackend<Task> = MemoryBackend::new();

    let mut form = drafted_task("Pack boxes");
    form.add_subtask("tape").expect("add subtask");

    let action = form.toggle_subtask(0).expect("toggle");
    assert_eq!(action, CascadeAction::None);
    assert!(form.draft().completed);

    let action = form.toggle_subtask(0).expect("toggle back");
    assert_eq!(action, CascadeAction::None);
    assert!(!form.draft().completed);

    assert!(backend.rows().await.is_empty());
}

#[tokio::test]
async fn persisted_subtask_completion_goes_through_the_backend() {
    let backend = MemoryBackend::new();
    let (notifier, mut notices) = Notifier::channel();
    let user = UserId::generate();

    let mut task = persisted_task(42, user, "Ship release");
    task.subtasks.push(Subtask {
        text: "tag the build".to_string(),
        completed: false,
    });
    backend.create(&task).await.expect("seed");

    let mut selection = Selection::new();
    selection.set(task);
    let mut form = Form::open(&selection);

    let action = form.toggle_subtask(0).expect("toggle");
    assert_eq!(action, CascadeAction::Complete(true));
    assert!(!form.draft().completed, "cascade defers to the coordinator");

    persist::complete(
        &mut form,
        &mut selection,
        &backend,
        &notifier,
        PersistPolicy::default(),
        true,
    )
    .await
    .expect("complete");

    assert!(form.draft().completed);
    assert!(!form.is_dirty());
    assert_eq!(selection.get().map(|task| task.completed), Some(true));
    assert!(backend.rows().await[0].completed);

    let notice = notices.try_recv().expect("completion notice");
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.message, "Task completed");

    let action = form.toggle_subtask(0).expect("toggle back");
    assert_eq!(action, CascadeAction::Complete(false));

    persist::complete(
        &mut form,
        &mut selection,
        &backend,
        &notifier,
        PersistPolicy::default(),
        false,
    )
    .await
    .expect("return");

    assert!(!form.draft().completed);
    assert_eq!(selection.get().map(|task| task.completed), Some(false));

    let notice = notices.try_recv().expect("return notice");
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "Task returned");
}

#[tokio::test]
async fn failed_save_keeps_local_edits_and_no_identity() {
    let backend = MemoryBackend::new();
    let (notifier, mut notices) = Notifier::channel();
    let user = UserId::generate();

    backend.fail_next("service offline").await;

    let mut form = drafted_task("Buy milk");
    let err = persist::save(
        &mut form,
        &backend,
        &notifier,
        PersistPolicy::default(),
        user,
        Utc::now(),
    )
    .await
    .expect_err("save should fail");
    assert!(matches!(err, FormError::Persistence(_)));

    assert!(form.phase().is_idle());
    assert_eq!(form.draft().id, UNSAVED_ID);
    assert_eq!(form.draft().title, "Buy milk");
    assert_eq!(form.baseline(), &Task::blank());
    assert!(form.is_dirty());
    assert!(backend.rows().await.is_empty());

    let notice = notices.try_recv().expect("failure notice");
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "Task save failed");
}

#[tokio::test]
async fn rollback_policy_restores_the_baseline_on_failure() {
    let backend = MemoryBackend::new();
    let (notifier, _notices) = Notifier::channel();
    let user = UserId::generate();

    let task = persisted_task(42, user, "Original");
    backend.create(&task).await.expect("seed");

    let mut selection = Selection::new();
    selection.set(task);
    let mut form = Form::open(&selection);
    form.apply(TaskPatch {
        title: Some("Changed".to_string()),
        ..Default::default()
    });

    backend.fail_next("service offline").await;
    let err = persist::save(
        &mut form,
        &backend,
        &notifier,
        PersistPolicy {
            rollback_on_failure: true,
        },
        user,
        Utc::now(),
    )
    .await
    .expect_err("save should fail");
    assert!(matches!(err, FormError::Persistence(_)));

    assert!(!form.is_dirty());
    assert_eq!(form.draft().title, "Original");
}

#[tokio::test]
async fn validation_stops_a_save_before_dispatch() {
    let backend: MemoryBackend<Task> = MemoryBackend::new();
    let (notifier, mut notices) = Notifier::channel();
    let user = UserId::generate();

    let mut form: Form<Task> = Form::create();
    let err = persist::save(
        &mut form,
        &backend,
        &notifier,
        PersistPolicy::default(),
        user,
        Utc::now(),
    )
    .await
    .expect_err("blank draft must not save");
    assert!(matches!(
        err,
        FormError::Invalid(ValidationError::EmptyTitle)
    ));

    assert!(form.phase().is_idle());
    assert!(backend.rows().await.is_empty());
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn delete_requires_a_saved_entity() {
    let backend: MemoryBackend<Task> = MemoryBackend::new();
    let (notifier, _notices) = Notifier::channel();

    let mut selection = Selection::new();
    let mut form = drafted_task("Unsaved");
    let err = persist::delete(&mut form, &mut selection, &backend, &notifier)
        .await
        .expect_err("unsaved draft cannot be deleted");
    assert!(matches!(err, FormError::Invalid(ValidationError::Unsaved)));
}

#[tokio::test]
async fn delete_clears_form_selection_and_backend() {
    let backend = MemoryBackend::new();
    let (notifier, mut notices) = Notifier::channel();
    let user = UserId::generate();

    let task = persisted_task(42, user, "Old entry");
    backend.create(&task).await.expect("seed");

    let mut selection = Selection::new();
    selection.set(task);
    let mut form = Form::open(&selection);

    persist::delete(&mut form, &mut selection, &backend, &notifier)
        .await
        .expect("delete");

    assert_eq!(form.draft(), &Task::blank());
    assert!(!form.is_edit_mode());
    assert!(selection.get().is_none());
    assert!(backend.rows().await.is_empty());

    let notice = notices.try_recv().expect("delete notice");
    assert_eq!(notice.message, "Task deleted successfully");
}

#[tokio::test]
async fn datastore_round_trips_tasks_and_debts() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let (notifier, _notices) = Notifier::channel();
    let user = UserId::generate();

    let mut form = drafted_task("Water plants");
    form.apply(TaskPatch {
        deadline: Some("31-12-2026".to_string()),
        ..Default::default()
    });
    persist::save(
        &mut form,
        &store,
        &notifier,
        PersistPolicy::default(),
        user,
        Utc::now(),
    )
    .await
    .expect("save task");
    let task_id = form.draft().id;

    let mut debt_form: Form<Debt> = Form::create();
    debt_form.apply(DebtPatch {
        title: Some("Alice".to_string()),
        currency: Some("EUR".to_string()),
        ..Default::default()
    });
    persist::save(
        &mut debt_form,
        &store,
        &notifier,
        PersistPolicy::default(),
        user,
        Utc::now(),
    )
    .await
    .expect("save debt");

    let reopened = DataStore::open(temp.path()).expect("reopen datastore");

    let tasks: Vec<Task> = reopened.list(user).await.expect("list tasks");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, task_id);
    assert_eq!(tasks[0].deadline, "31-12-2026");

    let debts: Vec<Debt> = reopened.list(user).await.expect("list debts");
    assert_eq!(debts.len(), 1);
    assert_eq!(debts[0].title, "Alice");
    assert_eq!(debts[0].currency, "EUR");

    let mut selection = Selection::new();
    selection.set(tasks[0].clone());
    let mut form = Form::open(&selection);
    persist::complete(
        &mut form,
        &mut selection,
        &reopened,
        &notifier,
        PersistPolicy::default(),
        true,
    )
    .await
    .expect("complete");

    let tasks: Vec<Task> = reopened.list(user).await.expect("list tasks again");
    assert!(tasks[0].completed);
}
