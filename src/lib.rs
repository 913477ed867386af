// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod store;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use crate::config::AppConfig;
pub use crate::ingest::scheduler::{Cycle, IntervalScheduler, IntervalSchedulerCfg};
pub use crate::notify::{NotificationEvent, NotifierMux};
pub use crate::pipeline::{CycleSummary, Pipeline};
