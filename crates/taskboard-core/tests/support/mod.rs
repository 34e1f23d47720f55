#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use taskboard_core::api::{ApiError, RemoteApi};
use taskboard_core::board::Board;
use taskboard_core::notify::MemoryNotifier;
use taskboard_core::task::{Credentials, DraftTask, Status, Task, TaskId, TaskPatch};

pub const PASSWORD: &str = "correct horse";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Whoami,
    Login(String),
    Logout,
    Register(String),
    List,
    Create(DraftTask),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Whoami,
    Login,
    Logout,
    Register,
    List,
    Create,
    Update,
    Delete,
}

/// In-memory stand-in for the remote API. Holds the canonical task list,
/// records every call and can be told to fail a given operation.
#[derive(Default)]
pub struct FakeApi {
    tasks: Mutex<Vec<Task>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<Op, ApiError>>,
    logged_in: Mutex<bool>,
    next_id: Mutex<u64>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Arc<Self> {
        let api = Self::default();
        *api.tasks.lock() = tasks;
        Arc::new(api)
    }

    pub fn fail(&self, op: Op, err: ApiError) {
        self.failures.lock().insert(op, err);
    }

    pub fn recover(&self, op: Op) {
        self.failures.lock().remove(&op);
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        *self.logged_in.lock() = logged_in;
    }

    /// Makes every following call wait for one `notify_one` on the returned
    /// handle before it is answered.
    pub fn gate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn ungate(&self) {
        *self.gate.lock() = None;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn remote_tasks(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    /// Changes the canonical record behind the client's back.
    pub fn edit_remote(&self, id: &str, edit: impl FnOnce(&mut Task)) {
        if let Some(task) = self.tasks.lock().iter_mut().find(|t| t.id.as_str() == id) {
            edit(task);
        }
    }

    async fn record(&self, call: Call, op: Op) -> Result<(), ApiError> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.calls.lock().push(call);
        match self.failures.lock().get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

pub fn not_found() -> ApiError {
    ApiError::Rejected {
        status: 404,
        message: Some("Task not found".to_string()),
    }
}

pub fn network_down() -> ApiError {
    ApiError::Network("connection refused".to_string())
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn whoami(&self) -> Result<(), ApiError> {
        self.record(Call::Whoami, Op::Whoami).await?;
        if *self.logged_in.lock() {
            Ok(())
        } else {
            Err(ApiError::Unauthorized { message: None })
        }
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        self.record(Call::Login(credentials.email.clone()), Op::Login).await?;
        if credentials.password == PASSWORD {
            self.set_logged_in(true);
            Ok(())
        } else {
            Err(ApiError::Unauthorized {
                message: Some("Invalid credentials".to_string()),
            })
        }
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.record(Call::Logout, Op::Logout).await?;
        self.set_logged_in(false);
        Ok(())
    }

    async fn register(&self, credentials: &Credentials) -> Result<(), ApiError> {
        self.record(Call::Register(credentials.email.clone()), Op::Register).await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.record(Call::List, Op::List).await?;
        Ok(self.tasks.lock().clone())
    }

    async fn create_task(&self, draft: &DraftTask) -> Result<Task, ApiError> {
        self.record(Call::Create(draft.clone()), Op::Create).await?;
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            format!("srv-{}", *next)
        };
        let mut task = Task::new(id, draft.title.clone(), draft.status);
        task.description = Some(draft.description.clone());
        self.tasks.lock().push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        self.record(Call::Update(id.clone(), patch.clone()), Op::Update).await?;
        let mut tasks = self.tasks.lock();
        let task = tasks.iter_mut().find(|t| &t.id == id).ok_or_else(not_found)?;
        if let Some(status) = patch.status {
            task.status = status;
        }
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), ApiError> {
        self.record(Call::Delete(id.clone()), Op::Delete).await?;
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        if tasks.len() == before {
            return Err(not_found());
        }
        Ok(())
    }
}

pub fn task(id: &str, status: Status) -> Task {
    Task::new(id, format!("Task {id}"), status)
}

/// A board already loaded from `api`, with the call log cleared.
pub async fn loaded_board(api: &Arc<FakeApi>) -> (Board, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::new());
    let board = Board::new(api.clone(), notifier.clone());
    assert!(board.load_all().await, "initial load should succeed");
    api.clear_calls();
    notifier.take();
    (board, notifier)
}

pub fn ids(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|t| t.id.to_string()).collect()
}
