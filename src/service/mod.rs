pub mod contributions;
pub mod hub;
pub mod rate_limiter;
pub mod scheduler;
pub mod stats;
pub mod sync;

pub use hub::{Connection, HubHandle};
pub use rate_limiter::SlidingWindowLimiter;
pub use scheduler::{BatchScheduler, SchedulerHandle};
pub use stats::StatsService;
pub use sync::{SyncOutcome, SyncReport, SyncService};
