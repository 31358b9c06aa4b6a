use crate::entity::{Subtask, Task, ValidationError};

pub const SUBTASK_TEXT_MAX: usize = 160;

pub fn append(task: &Task, text: &str) -> Result<Task, ValidationError> {
    validate_text(text)?;
    let mut next = task.clone();
    next.subtasks.push(Subtask {
        text: text.to_string(),
        completed: false,
    });
    Ok(next)
}

pub fn edit(task: &Task, index: usize, text: &str) -> Result<Task, ValidationError> {
    validate_text(text)?;
    let mut next = task.clone();
    let len = next.subtasks.len();
    let slot = next
        .subtasks
        .get_mut(index)
        .ok_or(ValidationError::SubtaskIndex { index, len })?;
    slot.text = text.to_string();
    Ok(next)
}

pub fn toggle(task: &Task, index: usize) -> Result<Task, ValidationError> {
    let mut next = task.clone();
    let len = next.subtasks.len();
    let slot = next
        .subtasks
        .get_mut(index)
        .ok_or(ValidationError::SubtaskIndex { index, len })?;
    slot.completed = !slot.completed;
    Ok(next)
}

pub fn remove(task: &Task, index: usize) -> Result<Task, ValidationError> {
    let mut next = task.clone();
    let len = next.subtasks.len();
    if index >= len {
        return Err(ValidationError::SubtaskIndex { index, len });
    }
    next.subtasks.remove(index);
    Ok(next)
}

fn validate_text(text: &str) -> Result<(), ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptySubtask);
    }
    if trimmed.chars().count() > SUBTASK_TEXT_MAX {
        return Err(ValidationError::SubtaskTooLong {
            max: SUBTASK_TEXT_MAX,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with(texts: &[&str]) -> Task {
        use crate::entity::Entity;

        let mut task = Task::blank();
        for text in texts {
            task = append(&task, text).expect("append subtask");
        }
        task
    }

    #[test]
    fn append_keeps_original_order_and_whitespace() {
        let task = task_with(&["first", " second "]);
        assert_eq!(task.subtasks.len(), 2);
        assert_eq!(task.subtasks[0].text, "first");
        assert_eq!(task.subtasks[1].text, " second ");
        assert!(!task.subtasks[1].completed);
    }

    #[test]
    fn blank_text_is_rejected() {
        let task = task_with(&[]);
        assert_eq!(append(&task, "   "), Err(ValidationError::EmptySubtask));
        assert_eq!(append(&task, ""), Err(ValidationError::EmptySubtask));
    }

    #[test]
    fn length_limit_applies_to_trimmed_text() {
        let task = task_with(&[]);
        let exact = "a".repeat(160);
        assert!(append(&task, &exact).is_ok());
        assert!(append(&task, &format!("  {exact}  ")).is_ok());

        let over = "a".repeat(161);
        assert_eq!(
            append(&task, &over),
            Err(ValidationError::SubtaskTooLong { max: 160 })
        );
    }

    #[test]
    fn edit_replaces_text_but_not_completion() {
        let mut task = task_with(&["draft wording"]);
        task.subtasks[0].completed = true;

        let task = edit(&task, 0, "final wording").expect("edit subtask");
        assert_eq!(task.subtasks[0].text, "final wording");
        assert!(task.subtasks[0].completed);
    }

    #[test]
    fn toggle_flips_one_entry() {
        let task = task_with(&["a", "b"]);
        let task = toggle(&task, 1).expect("toggle subtask");
        assert!(!task.subtasks[0].completed);
        assert!(task.subtasks[1].completed);

        let task = toggle(&task, 1).expect("toggle back");
        assert!(!task.subtasks[1].completed);
    }

    #[test]
    fn remove_shrinks_the_list() {
        let task = task_with(&["a", "b", "c"]);
        let task = remove(&task, 1).expect("remove subtask");
        assert_eq!(task.subtasks.len(), 2);
        assert_eq!(task.subtasks[0].text, "a");
        assert_eq!(task.subtasks[1].text, "c");
    }

    #[test]
    fn out_of_range_index_reports_list_length() {
        let task = task_with(&["only"]);
        let err = ValidationError::SubtaskIndex { index: 3, len: 1 };
        assert_eq!(toggle(&task, 3), Err(err.clone()));
        assert_eq!(remove(&task, 3), Err(err.clone()));
        assert_eq!(edit(&task, 3, "text"), Err(err));
    }

    #[test]
    fn source_task_is_never_mutated() {
        let original = task_with(&["a"]);
        let _ = toggle(&original, 0).expect("toggle");
        assert!(!original.subtasks[0].completed);
    }
}
