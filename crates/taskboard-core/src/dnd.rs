//! Interpretation of a finished drag against the current task list.
//!
//! A drag result carries where the card started, where it was dropped (if
//! anywhere) and the id of the dragged task. Interpretation is pure; the
//! board executes the resulting action.

use tracing::debug;

use crate::task::{Status, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropLocation {
    pub status: Status,
    pub index: usize,
}

impl DropLocation {
    pub fn new(status: Status, index: usize) -> Self {
        Self { status, index }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragResult {
    pub task_id: TaskId,
    pub source: DropLocation,
    pub destination: Option<DropLocation>,
}

impl DragResult {
    /// Builds a drag for `task_id` starting from its current column position.
    /// Returns `None` when the task is not in `tasks`.
    pub fn locate(
        tasks: &[Task],
        task_id: &TaskId,
        destination: Option<DropLocation>,
    ) -> Option<Self> {
        let task = tasks.iter().find(|task| &task.id == task_id)?;
        let index = tasks
            .iter()
            .filter(|candidate| candidate.status == task.status)
            .position(|candidate| &candidate.id == task_id)?;

        Some(Self {
            task_id: task_id.clone(),
            source: DropLocation::new(task.status, index),
            destination,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoDestination,
    Unmoved,
    UnknownTask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropAction {
    Ignore(IgnoreReason),
    ChangeStatus {
        task_id: TaskId,
        title: String,
        status: Status,
    },
    Reorder {
        task_id: TaskId,
        status: Status,
        index: usize,
    },
}

pub fn interpret(tasks: &[Task], drag: &DragResult) -> DropAction {
    let Some(destination) = drag.destination else {
        return DropAction::Ignore(IgnoreReason::NoDestination);
    };

    if destination == drag.source {
        return DropAction::Ignore(IgnoreReason::Unmoved);
    }

    let Some(task) = tasks.iter().find(|task| task.id == drag.task_id) else {
        // The list changed under the drag; nothing to do until the next load.
        debug!(task_id = %drag.task_id, "drop ignored because task is not in current list");
        return DropAction::Ignore(IgnoreReason::UnknownTask);
    };

    if destination.status != task.status {
        DropAction::ChangeStatus {
            task_id: task.id.clone(),
            title: task.title.clone(),
            status: destination.status,
        }
    } else {
        DropAction::Reorder {
            task_id: task.id.clone(),
            status: destination.status,
            index: destination.index,
        }
    }
}
