pub mod action;
pub mod clock;
pub mod scheduler;

pub use action::{ManualUpdateRequest, RefreshMetrics};
pub use scheduler::{RefreshTask, SchedulerStatus, TaskPhase};
