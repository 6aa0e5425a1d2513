//! Transition counters.

use serde::Serialize;

/// Point-in-time counters and gauges for one scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Sessions that became active (direct claims and promotions).
    pub grants: u64,
    pub releases: u64,
    /// Active sessions ended because their budget ran out.
    pub expirations: u64,
    /// Active sessions ended because heartbeats stopped.
    pub liveness_evictions: u64,
    /// Queued sessions dropped for silence.
    pub queue_collections: u64,
    /// 1 while someone holds control.
    pub active: u64,
    pub queued: u64,
}
