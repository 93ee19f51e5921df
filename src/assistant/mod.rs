//! Assistant panel engine for Canonical Nexus
//!
//! This module owns the conversation behind the dashboard's assistant panel:
//! a transcript seeded with a greeting, canned replies chosen by substring
//! command matching, and unsolicited insights emitted while the panel is open.
//!
//! # Architecture
//!
//! - `session` - `AssistantSession`, the stateful engine and its builder
//! - `commands` - ordered trigger table and match policy
//! - `insights` - insight pool and injectable random picker
//! - `scheduler` - deferred and repeating jobs (tokio or virtual time)
//! - `presets` - built-in greeting, commands and insights
//!
//! # Usage
//!
//! ```rust
//! use nexus::assistant::{AssistantSession, ManualScheduler};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let scheduler = Arc::new(ManualScheduler::default());
//! let session = AssistantSession::builder(scheduler.clone()).build();
//! session.set_pending_input("system status?");
//! session.submit();
//! scheduler.advance(Duration::from_millis(800));
//! assert_eq!(session.state().transcript.len(), 3);
//! ```

mod commands;
mod insights;
pub mod presets;
mod scheduler;
mod session;

// Re-export main types
pub use commands::{Command, CommandTable, MatchPolicy, Resolution};
pub use insights::{InsightPicker, InsightPool, RngPicker};
pub use scheduler::{
    Job, ManualScheduler, RepeatingJob, Scheduler, SchedulerError, TimerId, TokioScheduler,
};
pub use session::{AssistantSession, SessionBuilder, SessionSnapshot};
