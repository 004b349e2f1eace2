//! In-memory task store.
//!
//! Tasks live for one timeout window (default 120 s). Expiry is lazy: any
//! read of a processing task past its window flips it to expired first, so
//! no sweeper is needed for correctness. `cleanup_expired` is housekeeping
//! only - it drops tasks old enough (3x timeout) that no client can still
//! be polling them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{RequestType, Task, TaskStatus};
use crate::solver::answer::Answer;
use crate::util::short_id;

pub struct TaskStore {
    tasks: RwLock<HashMap<String, Task>>,
    timeout_secs: f64,
    clock: Arc<dyn Clock>,
}

impl TaskStore {
    pub fn new(timeout_secs: f64, clock: Arc<dyn Clock>) -> Self {
        Self { tasks: RwLock::new(HashMap::new()), timeout_secs, clock }
    }

    pub fn timeout_secs(&self) -> f64 {
        self.timeout_secs
    }

    /// Create a processing task and return its id.
    #[instrument(level = "debug", skip_all, fields(%request_type))]
    pub async fn create_task(
        &self,
        client_key: String,
        request_type: RequestType,
        question: String,
        body: String,
        examples: Vec<String>,
    ) -> String {
        let task_id = Uuid::new_v4().to_string();
        let task = Task {
            task_id: task_id.clone(),
            client_key,
            request_type,
            question,
            body,
            examples,
            status: TaskStatus::Processing,
            answer: None,
            created_at: self.clock.now_unix(),
            solved_at: None,
        };
        self.tasks.write().await.insert(task_id.clone(), task);
        debug!(target: "task", task = short_id(&task_id), "Task stored");
        task_id
    }

    /// Fetch a task, lazily expiring it when its window has passed.
    pub async fn get_task(&self, task_id: &str) -> Option<Task> {
        let now = self.clock.now_unix();
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(task_id)?;
        if task.status == TaskStatus::Processing && now - task.created_at > self.timeout_secs {
            task.status = TaskStatus::Expired;
            debug!(target: "task", task = short_id(task_id), "Task expired on read");
        }
        Some(task.clone())
    }

    /// Record the answer for a still-processing, still-live task.
    /// Returns false when the task is missing, already resolved, or past
    /// its window (which also flips it to expired).
    #[instrument(level = "debug", skip(self, answer), fields(task = short_id(task_id)))]
    pub async fn submit_answer(&self, task_id: &str, answer: Answer) -> bool {
        let now = self.clock.now_unix();
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(task_id) else { return false };
        if task.status != TaskStatus::Processing {
            return false;
        }
        if now - task.created_at > self.timeout_secs {
            task.status = TaskStatus::Expired;
            return false;
        }
        task.answer = Some(answer);
        task.status = TaskStatus::Ready;
        task.solved_at = Some(now);
        true
    }

    /// Tasks still waiting for a solver (expiring stale ones on the way).
    pub async fn pending_tasks(&self) -> Vec<Task> {
        let now = self.clock.now_unix();
        let mut tasks = self.tasks.write().await;
        let mut pending = Vec::new();
        for task in tasks.values_mut() {
            if task.status == TaskStatus::Processing {
                if now - task.created_at > self.timeout_secs {
                    task.status = TaskStatus::Expired;
                } else {
                    pending.push(task.clone());
                }
            }
        }
        pending
    }

    /// Drop tasks older than 3x the timeout. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_unix();
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, t| now - t.created_at <= self.timeout_secs * 3.0);
        let removed = before - tasks.len();
        if removed > 0 {
            info!(target: "task", removed, "Cleaned up old tasks");
        }
        removed
    }
}
