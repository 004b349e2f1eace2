//! Captcha Relay Backend
//!
//! - Axum HTTP + WebSocket API: clients create tasks, humans solve them
//! - The answer-capture engine behind the solve surface lives in [`solver`]
//! - Optional Discord webhook notifications
//! - Static assets served from ./static
//!
//! Important env variables:
//!   API_KEY           : client key for /createTask and /getTaskResult
//!   SERVER_HOST       : bind host (default "0.0.0.0")
//!   PORT              : u16 (default 7777)
//!   TASK_TIMEOUT      : task lifetime seconds (default 120)
//!   DISCORD_WEBHOOK   : enables webhook notifications if present
//!   PUBLIC_URL        : external base URL used in solve links
//!   RELAY_CONFIG_PATH : path to TOML config overlay
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

pub mod clock;
pub mod config;
pub mod domain;
pub mod imagemeta;
pub mod notifier;
pub mod protocol;
pub mod routes;
pub mod solver;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod util;
