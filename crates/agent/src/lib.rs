//! The Pincer agent: turn-loop, sessions, prompt assembly, and schedulers.
//!
//! The turn-loop is the heart of the system — everything else feeds it.
//! `SessionManager` hands out one `Agent` per conversation; the prompt
//! assembler rebuilds the system prompt from workspace files every turn;
//! the heartbeat and cron services drive turns on a schedule.

pub mod prompt;
pub mod scheduler;
pub mod session;
pub mod turn;

pub use prompt::{PromptAssembler, ensure_identity_files};
pub use scheduler::{CronJob, CronService, HeartbeatService};
pub use session::SessionManager;
pub use turn::{Agent, MAX_ITERATIONS_REACHED};
