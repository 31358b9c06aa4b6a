use crate::entity::{Entity, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeAction {
    None,
    Complete(bool),
}

pub fn cascade(task: &Task) -> (Task, CascadeAction) {
    if task.subtasks.is_empty() {
        return (task.clone(), CascadeAction::None);
    }

    let all_done = task.subtasks.iter().all(|subtask| subtask.completed);
    if all_done == task.completed {
        return (task.clone(), CascadeAction::None);
    }

    if task.is_persisted() {
        (task.clone(), CascadeAction::Complete(all_done))
    } else {
        let mut next = task.clone();
        next.completed = all_done;
        (next, CascadeAction::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtasks;

    fn draft_with_subtasks(done: &[bool]) -> Task {
        let mut task = Task::blank();
        for (idx, flag) in done.iter().enumerate() {
            task = subtasks::append(&task, &format!("step {idx}")).expect("append");
            if *flag {
                task = subtasks::toggle(&task, idx).expect("toggle");
            }
        }
        task
    }

    #[test]
    fn no_subtasks_means_no_cascade() {
        let mut task = Task::blank();
        task.completed = true;

        let (next, action) = cascade(&task);
        assert_eq!(action, CascadeAction::None);
        assert!(next.completed);
    }

    #[test]
    fn draft_completes_locally_when_all_subtasks_done() {
        let task = draft_with_subtasks(&[true, true]);
        let (next, action) = cascade(&task);
        assert_eq!(action, CascadeAction::None);
        assert!(next.completed);
    }

    #[test]
    fn draft_reopens_locally_when_a_subtask_reopens() {
        let mut task = draft_with_subtasks(&[true, false]);
        task.completed = true;

        let (next, action) = cascade(&task);
        assert_eq!(action, CascadeAction::None);
        assert!(!next.completed);
    }

    #[test]
    fn settled_state_is_left_alone() {
        let task = draft_with_subtasks(&[true, false]);
        let (next, action) = cascade(&task);
        assert_eq!(action, CascadeAction::None);
        assert_eq!(next, task);
    }

    #[test]
    fn persisted_task_defers_to_remote_completion() {
        let mut task = draft_with_subtasks(&[true, true]);
        task.completed = false;
        task.id = 1_755_870_000_000;

        let (next, action) = cascade(&task);
        assert_eq!(action, CascadeAction::Complete(true));
        assert!(!next.completed, "draft stays untouched until the call settles");
    }

    #[test]
    fn persisted_task_defers_reopening_too() {
        let mut task = draft_with_subtasks(&[true, false]);
        task.completed = true;
        task.id = 1_755_870_000_000;

        let (next, action) = cascade(&task);
        assert_eq!(action, CascadeAction::Complete(false));
        assert!(next.completed);
    }
}
