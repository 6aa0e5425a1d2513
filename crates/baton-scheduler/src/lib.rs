//! baton-scheduler: exclusive, time-boxed control arbitration.
//!
//! Decides, at any instant, which single client may send control commands
//! to the shared resource, how long it may keep the slot, and who gets it
//! next. Everyone else waits in a two-tier queue.
//!
//! # Architecture
//!
//! ```text
//! Scheduler (one mutex)
//!   ├── SessionStore (identity → role, tier, timing)
//!   ├── PriorityQueue (elevated lane, standard lane, FIFO each)
//!   ├── Clock (injected; ManualClock in tests)
//!   └── Notifier (told about every hand-off, outside the lock)
//!
//! Evictor
//!   └── periodic Scheduler::tick() → expire / reclaim / promote
//! ```
//!
//! # Fairness
//!
//! A granted slot is never preempted: an elevated arrival waits for the
//! current holder to release, run out of budget, or go silent. Elevated
//! waiters are then served before standard ones.

pub mod clock;
pub mod error;
pub mod evictor;
pub mod notifier;
pub mod queue;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SchedulerError, SchedulerResult};
pub use evictor::{Evictor, EvictorHandle};
pub use notifier::{ChangeReason, ControlChange, NoopNotifier, Notifier, WatchNotifier};
pub use queue::{Enqueued, PriorityQueue, QueueEntry};
pub use scheduler::{
    ActiveView, GrantId, HeartbeatOutcome, Overview, ReleaseOutcome, RequestOutcome, Scheduler,
    SchedulerConfig, Status, TickReport, WaitingView,
};
pub use stats::SchedulerStats;
pub use store::{Session, SessionStore};
