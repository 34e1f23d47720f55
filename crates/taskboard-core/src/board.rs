use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{ApiError, RemoteApi};
use crate::dnd::{self, DragResult, DropAction};
use crate::notify::Notifier;
use crate::task::{DraftTask, Status, Task, TaskId, TaskPatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub status: Status,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Default)]
struct BoardState {
    tasks: Vec<Task>,
    loading: bool,
    session_expired: bool,
}

/// Local, possibly stale copy of the remote task list.
///
/// Every mutation goes to the API first and only the API's answer is merged
/// back, so a failed call never leaves the list in an assumed state. The
/// lock is never held across an await, which lets calls on different tasks
/// be in flight together.
pub struct Board {
    api: Arc<dyn RemoteApi>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<BoardState>,
}

impl Board {
    pub fn new(api: Arc<dyn RemoteApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            state: Mutex::new(BoardState::default()),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().tasks.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn find(&self, task_id: &TaskId) -> Option<Task> {
        self.state
            .lock()
            .tasks
            .iter()
            .find(|task| &task.id == task_id)
            .cloned()
    }

    pub fn column(&self, status: Status) -> Vec<Task> {
        self.state
            .lock()
            .tasks
            .iter()
            .filter(|task| task.status == status)
            .cloned()
            .collect()
    }

    pub fn columns(&self) -> [Column; 3] {
        Status::ALL.map(|status| Column {
            status,
            tasks: self.column(status),
        })
    }

    /// Exact id, or an id prefix that matches exactly one task.
    pub fn resolve(&self, raw: &str) -> Option<TaskId> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let state = self.state.lock();
        if let Some(task) = state.tasks.iter().find(|task| task.id.as_str() == raw) {
            return Some(task.id.clone());
        }

        let mut matches = state
            .tasks
            .iter()
            .filter(|task| task.id.as_str().starts_with(raw));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Some(task.id.clone()),
            _ => None,
        }
    }

    /// True once if a call was refused with 401 since the last check.
    pub fn take_session_expired(&self) -> bool {
        std::mem::take(&mut self.state.lock().session_expired)
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.tasks.clear();
        state.loading = false;
    }

    #[instrument(skip(self))]
    pub async fn load_all(&self) -> bool {
        self.state.lock().loading = true;
        let result = self.api.list_tasks().await;

        let loaded = match result {
            Ok(tasks) => {
                info!(count = tasks.len(), "tasks loaded");
                self.state.lock().tasks = tasks;
                true
            }
            Err(err) => {
                self.report("Fetching tasks", &err);
                false
            }
        };

        self.state.lock().loading = false;
        loaded
    }

    #[instrument(skip(self, draft), fields(status = %draft.status))]
    pub async fn create(&self, draft: DraftTask) -> Option<Task> {
        match self.api.create_task(&draft).await {
            Ok(task) => {
                info!(task_id = %task.id, "task created");
                self.state.lock().tasks.push(task.clone());
                self.notifier.success("Task created");
                Some(task)
            }
            Err(err) => {
                self.report("Creating task", &err);
                None
            }
        }
    }

    #[instrument(skip(self), fields(task_id = %task_id, status = %status))]
    pub async fn change_status(&self, task_id: &TaskId, status: Status) -> Option<Task> {
        let patch = TaskPatch::status(status);
        match self.api.update_task(task_id, &patch).await {
            Ok(updated) => {
                if !self.replace(task_id, updated.clone()) {
                    warn!("updated task is no longer in the local list");
                }
                self.notifier.success("Task updated");
                Some(updated)
            }
            Err(err) => {
                self.report("Updating task", &err);
                None
            }
        }
    }

    /// Moves a task one step along todo, in-progress, done.
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn advance(&self, task_id: &TaskId) -> Option<Task> {
        let Some(task) = self.find(task_id) else {
            debug!("advance ignored because task is not in current list");
            return None;
        };
        let Some(next) = task.status.next() else {
            debug!(status = %task.status, "advance ignored for finished task");
            return None;
        };

        self.change_status(task_id, next).await
    }

    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn delete(&self, task_id: &TaskId) -> bool {
        match self.api.delete_task(task_id).await {
            Ok(()) => {
                self.state.lock().tasks.retain(|task| &task.id != task_id);
                info!("task deleted");
                self.notifier.success("Task deleted");
                true
            }
            Err(err) => {
                self.report("Deleting task", &err);
                false
            }
        }
    }

    /// Moves a task within its own column. Local only: the API has no
    /// ordering field, so the order lasts until the next load.
    #[instrument(skip(self), fields(task_id = %task_id, status = %status))]
    pub fn reorder(&self, task_id: &TaskId, new_index: usize, status: Status) -> bool {
        let mut state = self.state.lock();

        let Some(current) = state
            .tasks
            .iter()
            .find(|task| &task.id == task_id)
            .map(|task| task.status)
        else {
            debug!("reorder ignored because task is not in current list");
            return false;
        };
        if current != status {
            debug!(current = %current, "reorder ignored because task is in another column");
            return false;
        }

        let mut column: Vec<Task> = state
            .tasks
            .iter()
            .filter(|task| task.status == status)
            .cloned()
            .collect();
        let Some(from) = column.iter().position(|task| &task.id == task_id) else {
            return false;
        };
        let moved = column.remove(from);
        let to = new_index.min(column.len());
        column.insert(to, moved);

        let mut ordered = column.into_iter();
        for slot in state.tasks.iter_mut().filter(|task| task.status == status) {
            if let Some(next) = ordered.next() {
                *slot = next;
            }
        }

        debug!(from, to, "task reordered");
        true
    }

    #[instrument(skip(self, drag), fields(task_id = %drag.task_id))]
    pub async fn apply_drop(&self, drag: &DragResult) -> DropAction {
        let action = dnd::interpret(&self.tasks(), drag);

        match &action {
            DropAction::Ignore(reason) => {
                debug!(?reason, "drop ignored");
            }
            DropAction::ChangeStatus {
                task_id,
                title,
                status,
            } => {
                if self.change_status(task_id, *status).await.is_some() {
                    self.notifier
                        .success(&format!("Moved \"{title}\" to {}", status.title()));
                }
            }
            DropAction::Reorder {
                task_id,
                status,
                index,
            } => {
                self.reorder(task_id, *index, *status);
            }
        }

        action
    }

    fn replace(&self, task_id: &TaskId, task: Task) -> bool {
        let mut state = self.state.lock();
        match state.tasks.iter_mut().find(|slot| &slot.id == task_id) {
            Some(slot) => {
                *slot = task;
                true
            }
            None => false,
        }
    }

    fn report(&self, action: &str, err: &ApiError) {
        error!(action, error = %err, "task API call failed");
        if err.is_unauthorized() {
            self.state.lock().session_expired = true;
        }
        self.notifier
            .error(&format!("{action} failed: {}", err.user_message()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use async_trait::async_trait;
    use crate::task::Credentials;

    struct Offline;

    #[async_trait]
    impl RemoteApi for Offline {
        async fn whoami(&self) -> Result<(), ApiError> {
            Err(ApiError::Network("offline".to_string()))
        }
        async fn login(&self, _: &Credentials) -> Result<(), ApiError> {
            Err(ApiError::Network("offline".to_string()))
        }
        async fn logout(&self) -> Result<(), ApiError> {
            Err(ApiError::Network("offline".to_string()))
        }
        async fn register(&self, _: &Credentials) -> Result<(), ApiError> {
            Err(ApiError::Network("offline".to_string()))
        }
        async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
            Err(ApiError::Network("offline".to_string()))
        }
        async fn create_task(&self, _: &DraftTask) -> Result<Task, ApiError> {
            Err(ApiError::Network("offline".to_string()))
        }
        async fn update_task(&self, _: &TaskId, _: &TaskPatch) -> Result<Task, ApiError> {
            Err(ApiError::Network("offline".to_string()))
        }
        async fn delete_task(&self, _: &TaskId) -> Result<(), ApiError> {
            Err(ApiError::Network("offline".to_string()))
        }
    }

    fn board_with(tasks: Vec<Task>) -> Board {
        let board = Board::new(Arc::new(Offline), Arc::new(MemoryNotifier::new()));
        board.state.lock().tasks = tasks;
        board
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn reorder_moves_within_the_column_only() {
        let board = board_with(vec![
            Task::new("a", "A", Status::Todo),
            Task::new("x", "X", Status::Done),
            Task::new("b", "B", Status::Todo),
            Task::new("c", "C", Status::Todo),
        ]);

        assert!(board.reorder(&TaskId::from("c"), 0, Status::Todo));
        assert_eq!(ids(&board.tasks()), vec!["c", "x", "a", "b"]);

        assert!(board.reorder(&TaskId::from("c"), 99, Status::Todo));
        assert_eq!(ids(&board.column(Status::Todo)), vec!["a", "b", "c"]);
        assert_eq!(ids(&board.column(Status::Done)), vec!["x"]);
    }

    #[test]
    fn reorder_rejects_unknown_or_foreign_tasks() {
        let board = board_with(vec![
            Task::new("a", "A", Status::Todo),
            Task::new("b", "B", Status::Todo),
        ]);

        assert!(!board.reorder(&TaskId::from("zz"), 0, Status::Todo));
        assert!(!board.reorder(&TaskId::from("a"), 1, Status::Done));
        assert_eq!(ids(&board.tasks()), vec!["a", "b"]);
    }

    #[test]
    fn resolve_accepts_unique_prefixes() {
        let board = board_with(vec![
            Task::new("65f1aa", "A", Status::Todo),
            Task::new("65f1ab", "B", Status::Todo),
            Task::new("77", "C", Status::Done),
        ]);

        assert_eq!(board.resolve("7"), Some(TaskId::from("77")));
        assert_eq!(board.resolve("65f1ab"), Some(TaskId::from("65f1ab")));
        assert_eq!(board.resolve("65f1"), None);
        assert_eq!(board.resolve(""), None);
    }

    #[test]
    fn columns_partition_by_status() {
        let board = board_with(vec![
            Task::new("1", "A", Status::Done),
            Task::new("2", "B", Status::Todo),
            Task::new("3", "C", Status::Done),
        ]);

        let columns = board.columns();
        assert_eq!(columns[0].status, Status::Todo);
        assert_eq!(ids(&columns[0].tasks), vec!["2"]);
        assert!(columns[1].tasks.is_empty());
        assert_eq!(ids(&columns[2].tasks), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn advance_on_a_finished_task_makes_no_call() {
        let board = board_with(vec![Task::new("1", "A", Status::Done)]);
        assert!(board.advance(&TaskId::from("1")).await.is_none());
        assert!(board.advance(&TaskId::from("missing")).await.is_none());
        assert_eq!(board.tasks()[0].status, Status::Done);
    }
}
