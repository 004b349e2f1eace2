//! Discord webhook notifications (optional).
//!
//! Fire-and-forget: every failure is logged and swallowed, a webhook outage
//! must never affect task handling. New-task notices share a cooldown
//! window so a burst of createTask calls doesn't spam the channel.
//!
//! We never log the webhook URL; it embeds a secret token.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::util::short_id;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
const COLOR_NEW_TASK: u32 = 16_750_848;
const COLOR_STARTUP: u32 = 5_814_783;

#[derive(Clone)]
pub struct Notifier {
  client: reqwest::Client,
  webhook: String,
  cooldown_secs: f64,
  last_task_notify: Arc<Mutex<f64>>,
  clock: Arc<dyn Clock>,
}

impl Notifier {
  /// Returns None when no webhook is configured.
  pub fn new(webhook: &str, cooldown_secs: f64, clock: Arc<dyn Clock>) -> Option<Self> {
    if webhook.is_empty() {
      return None;
    }
    let client = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build().ok()?;
    Some(Self {
      client,
      webhook: webhook.to_string(),
      cooldown_secs,
      last_task_notify: Arc::new(Mutex::new(0.0)),
      clock,
    })
  }

  /// Announce a new task with its solve link, respecting the cooldown.
  #[instrument(level = "debug", skip_all, fields(task = short_id(task_id)))]
  pub async fn notify_new_task(
    &self,
    task_id: &str,
    request_type: &str,
    question: &str,
    solve_url: &str,
  ) {
    {
      let mut last = self.last_task_notify.lock().await;
      let now = self.clock.now_unix();
      if now - *last < self.cooldown_secs {
        info!(target: "relay_backend", cooldown = self.cooldown_secs, "Skipping webhook notification (cooldown)");
        return;
      }
      *last = now;
    }

    let question_short: String = question.chars().take(200).collect();
    let message = serde_json::json!({
      "embeds": [{
        "title": "New Captcha Task",
        "color": COLOR_NEW_TASK,
        "fields": [
          { "name": "Type", "value": request_type, "inline": true },
          { "name": "Question", "value": question_short, "inline": false },
          { "name": "Solve", "value": format!("[Click to solve]({solve_url})"), "inline": false },
        ],
        "footer": { "text": format!("Task {}", short_id(task_id)) },
      }]
    });

    match self.post(&message).await {
      Ok(()) => info!(target: "relay_backend", "Task notification sent"),
      Err(e) => warn!(target: "relay_backend", error = %e, "Task notification failed"),
    }
  }

  /// Announce that the relay is up and listening.
  #[instrument(level = "debug", skip_all)]
  pub async fn notify_startup(&self, public_url: &str, startup_secs: u64) {
    let message = serde_json::json!({
      "embeds": [{
        "title": "Captcha Relay - Ready!",
        "description": "The captcha relay is now online.",
        "color": COLOR_STARTUP,
        "fields": [
          { "name": "Public URL", "value": format!("[{public_url}]({public_url})"), "inline": false },
          { "name": "Startup Time", "value": format!("{}m {}s", startup_secs / 60, startup_secs % 60), "inline": true },
          { "name": "Status", "value": "Online", "inline": true },
        ],
        "footer": { "text": "Waiting for captcha tasks..." },
      }]
    });

    match self.post(&message).await {
      Ok(()) => info!(target: "relay_backend", "Startup notification sent"),
      Err(e) => warn!(target: "relay_backend", error = %e, "Startup notification failed"),
    }
  }

  /// Discord answers 204 on success.
  async fn post(&self, message: &serde_json::Value) -> Result<(), String> {
    let resp = self
      .client
      .post(&self.webhook)
      .json(message)
      .send()
      .await
      .map_err(|e| e.to_string())?;
    let status = resp.status();
    if status.as_u16() == 204 || status.is_success() {
      Ok(())
    } else {
      Err(format!("webhook answered {status}"))
    }
  }
}
