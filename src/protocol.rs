//! Public protocol structs for the HTTP API and the solver WebSocket.
//! Keep this small and stable: API clients and solve surfaces evolve
//! independently of the backend.

use serde::{Deserialize, Serialize};

use crate::domain::{RequestType, Task};
use crate::solver::answer::Answer;
use crate::solver::geometry::Extent;

//
// createTask
//

/// Body of `POST /createTask`. The task payload arrives loosely typed, the
/// way API clients actually send it; missing fields default.
#[derive(Debug, Deserialize)]
pub struct CreateTaskIn {
    #[serde(rename = "clientKey", default)]
    pub client_key: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub task: TaskPayload,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TaskPayload {
    #[serde(default)]
    pub request_type: RequestType,
    #[serde(default)]
    pub question: String,
    /// Base64 challenge image.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateTaskOut {
    #[serde(rename = "errorId")]
    pub error_id: u8,
    #[serde(rename = "taskId")]
    pub task_id: String,
}

/// Error envelope shared by the API endpoints.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(rename = "errorId")]
    pub error_id: u8,
    #[serde(rename = "errorCode")]
    pub error_code: &'static str,
}

impl ApiError {
    pub fn wrong_user_key() -> Self {
        Self { error_id: 1, error_code: "ERROR_WRONG_USER_KEY" }
    }

    pub fn wrong_captcha_id() -> Self {
        Self { error_id: 1, error_code: "WRONG_CAPTCHA_ID" }
    }

    pub fn unsolvable() -> Self {
        Self { error_id: 1, error_code: "ERROR_CAPTCHA_UNSOLVABLE" }
    }
}

//
// getTaskResult
//

#[derive(Debug, Deserialize)]
pub struct GetTaskResultIn {
    #[serde(rename = "clientKey", default)]
    pub client_key: String,
    #[serde(rename = "taskId", default)]
    pub task_id: String,
}

/// Poll response. `answers`/`spent_time`/`cost` only appear once ready.
#[derive(Debug, Serialize)]
pub struct TaskResultOut {
    #[serde(rename = "errorId")]
    pub error_id: u8,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Answer>,
    #[serde(rename = "spentTime", skip_serializing_if = "Option::is_none")]
    pub spent_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl TaskResultOut {
    pub fn processing() -> Self {
        Self { error_id: 0, status: "processing", answers: None, spent_time: None, cost: None }
    }

    pub fn ready(answers: Answer, spent_time: f64) -> Self {
        Self {
            error_id: 0,
            status: "ready",
            answers: Some(answers),
            spent_time: Some(spent_time),
            cost: Some(0.0),
        }
    }
}

//
// Solve surface
//

/// Everything the solve surface needs to present a challenge: the image
/// body, its sniffed native extent (when the body allows it), and the
/// countdown anchor.
#[derive(Debug, Serialize)]
pub struct SolveView {
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(rename = "requestType")]
    pub request_type: RequestType,
    pub question: String,
    pub body: String,
    pub examples: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: f64,
    #[serde(rename = "remainingSecs")]
    pub remaining_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Extent>,
}

/// Body of `POST /solve/:task_id/submit`. Answers stay raw JSON here; the
/// handler validates them against the task's request type.
#[derive(Debug, Deserialize)]
pub struct SubmitIn {
    #[serde(default)]
    pub answers: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct SubmitOut {
    pub ok: bool,
}

//
// Solver WebSocket
//

/// Messages pushed to connected solve surfaces.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolverNotice {
    NewTask {
        task_id: String,
        request_type: RequestType,
        question: String,
        solve_url: String,
    },
}

pub fn solve_view(task: &Task, remaining_secs: u64, native: Option<Extent>) -> SolveView {
    SolveView {
        task_id: task.task_id.clone(),
        request_type: task.request_type,
        question: task.question.clone(),
        body: task.body.clone(),
        examples: task.examples.clone(),
        created_at: task.created_at,
        remaining_secs,
        native,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_task_accepts_sparse_bodies() {
        let parsed: CreateTaskIn =
            serde_json::from_str(r#"{"clientKey":"k","task":{"question":"q"}}"#).expect("parse");
        assert_eq!(parsed.client_key, "k");
        assert_eq!(parsed.task.request_type, RequestType::Grid); // default
        assert_eq!(parsed.task.question, "q");

        let parsed: CreateTaskIn = serde_json::from_str("{}").expect("parse");
        assert!(parsed.client_key.is_empty());
    }

    #[test]
    fn task_result_omits_answer_fields_until_ready() {
        let json = serde_json::to_value(TaskResultOut::processing()).expect("ser");
        assert_eq!(json, serde_json::json!({ "errorId": 0, "status": "processing" }));

        let json = serde_json::to_value(TaskResultOut::ready(Answer::Tiles(vec![1, 4]), 12.3))
            .expect("ser");
        assert_eq!(
            json,
            serde_json::json!({
                "errorId": 0,
                "status": "ready",
                "answers": [1, 4],
                "spentTime": 12.3,
                "cost": 0.0,
            })
        );
    }

    #[test]
    fn solver_notice_is_tagged() {
        let notice = SolverNotice::NewTask {
            task_id: "t".into(),
            request_type: RequestType::Drag,
            question: "connect".into(),
            solve_url: "http://x/solve/t".into(),
        };
        let json = serde_json::to_value(&notice).expect("ser");
        assert_eq!(json["type"], "new_task");
        assert_eq!(json["request_type"], "Drag");
    }
}
