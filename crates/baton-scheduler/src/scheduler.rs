//! Scheduler: decides who controls the resource right now.
//!
//! The `Scheduler` is the single point of truth for control:
//! - Grants control to the first requester when the resource is idle
//! - Queues everyone else, elevated tier first, FIFO within a tier
//! - Promotes the queue head on release, budget expiry, or liveness loss
//! - Garbage-collects queued clients that stopped heartbeating
//!
//! Every mutation runs under one mutex covering the session store, the
//! queue, and the current grant together. Each mutation first sweeps
//! overdue state, so a lagging eviction timer never lets an expired
//! session keep acting. Notifications and transition logs are emitted
//! after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use baton_core::{ClientIdentity, Role, Tier, Timings};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{SchedulerError, SchedulerResult};
use crate::notifier::{ChangeReason, ControlChange, NoopNotifier, Notifier};
use crate::queue::{Enqueued, PriorityQueue};
use crate::stats::SchedulerStats;
use crate::store::{Session, SessionStore};

/// Timing parameters, supplied by whoever loads configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub standard_budget: Duration,
    pub elevated_budget: Duration,
    /// Maximum silence tolerated before a session is presumed gone.
    pub liveness_timeout: Duration,
}

impl SchedulerConfig {
    pub fn budget_for(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Standard => self.standard_budget,
            Tier::Elevated => self.elevated_budget,
        }
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        for tier in [Tier::Standard, Tier::Elevated] {
            let budget = self.budget_for(tier);
            if budget.is_zero() {
                return Err(SchedulerError::ZeroBudget { tier: tier.label() });
            }
            if self.liveness_timeout >= budget {
                return Err(SchedulerError::LivenessNotShorter {
                    tier: tier.label(),
                    liveness: self.liveness_timeout,
                    budget,
                });
            }
        }
        if self.liveness_timeout.is_zero() {
            return Err(SchedulerError::ZeroLiveness);
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            standard_budget: Duration::from_secs(100),
            elevated_budget: Duration::from_secs(600),
            liveness_timeout: Duration::from_secs(15),
        }
    }
}

impl From<Timings> for SchedulerConfig {
    fn from(t: Timings) -> Self {
        Self {
            standard_budget: t.standard_budget,
            elevated_budget: t.elevated_budget,
            liveness_timeout: t.liveness_timeout,
        }
    }
}

/// Identifies one tenure of the active slot.
///
/// Increases with every grant, so a stale observer can tell that the slot
/// it looked at has since been handed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrantId(pub(crate) u64);

impl GrantId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Result of [`Scheduler::request_control`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Active { remaining: Duration },
    Queued { position: usize },
}

impl RequestOutcome {
    pub fn role(&self) -> Role {
        match self {
            RequestOutcome::Active { .. } => Role::Active,
            RequestOutcome::Queued { .. } => Role::Queued,
        }
    }
}

/// Result of [`Scheduler::release_control`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Control was released; `promoted` took over, if anyone was waiting.
    /// `promoted_name` is its display name, read under the same lock.
    Released {
        promoted: Option<ClientIdentity>,
        promoted_name: Option<String>,
    },
    /// The caller was not the active session. Nothing changed.
    NotActive,
}

/// Result of [`Scheduler::heartbeat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Recorded { role: Role },
    /// No session for this identity (never joined, or already evicted).
    Unknown,
}

/// Read-only view returned by [`Scheduler::query_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Active { remaining: Duration, tier: Tier },
    Queued { position: usize, tier: Tier },
    /// Not participating.
    Idle,
}

/// What a [`Scheduler::tick`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The active session that was ended, and why.
    pub evicted: Option<(ClientIdentity, ChangeReason)>,
    pub promoted: Option<ClientIdentity>,
    /// Queued sessions dropped for silence.
    pub collected: Vec<ClientIdentity>,
}

impl TickReport {
    pub fn is_quiet(&self) -> bool {
        self.evicted.is_none() && self.promoted.is_none() && self.collected.is_empty()
    }
}

/// The current holder, as shown on a waiting page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveView {
    pub identity: ClientIdentity,
    pub display_name: Option<String>,
    pub tier: Tier,
    pub grant: GrantId,
    pub remaining: Duration,
    pub budget: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingView {
    pub identity: ClientIdentity,
    pub display_name: Option<String>,
    pub tier: Tier,
    pub position: usize,
}

/// Who holds control and who is waiting, in serving order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overview {
    pub active: Option<ActiveView>,
    pub waiting: Vec<WaitingView>,
}

#[derive(Debug, Clone)]
struct ActiveGrant {
    identity: ClientIdentity,
    grant: GrantId,
}

/// Everything guarded by the scheduler lock.
#[derive(Debug, Default)]
struct Inner {
    store: SessionStore,
    queue: PriorityQueue,
    active: Option<ActiveGrant>,
    next_grant: u64,
    stats: SchedulerStats,
}

/// Arbitrates exclusive, time-boxed control of one resource.
///
/// Safe to share as `Arc<Scheduler>` between request handlers and the
/// eviction timer. No method blocks beyond the brief internal lock.
pub struct Scheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    inner: Mutex<Inner>,
}

impl Scheduler {
    /// Create a scheduler. Rejects zero budgets and liveness windows that
    /// are not shorter than both budgets.
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            notifier: Arc::new(NoopNotifier),
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Set the notifier told about every change of the active session.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Ask for control.
    ///
    /// Grants immediately when nobody holds control, otherwise queues the
    /// caller. Never preempts a running session, whatever the caller's
    /// tier. A repeat request from the active client only counts as a
    /// heartbeat; it does not reset the budget.
    pub fn request_control(&self, identity: &ClientIdentity, tier: Tier) -> RequestOutcome {
        self.request_control_named(identity, tier, None)
    }

    /// [`request_control`](Self::request_control) with a display name shown
    /// to other clients on the waiting page.
    pub fn request_control_named(
        &self,
        identity: &ClientIdentity,
        tier: Tier,
        display_name: Option<String>,
    ) -> RequestOutcome {
        let now = self.clock.now();
        let mut changes = Vec::new();

        let outcome = {
            let mut inner = self.lock();
            self.sweep(&mut inner, now, &mut changes);

            let outcome = if inner.holds(identity) {
                let remaining = inner
                    .store
                    .get_mut(identity)
                    .and_then(|session| {
                        session.last_heartbeat_at = now;
                        if display_name.is_some() {
                            session.display_name = display_name;
                        }
                        session.remaining(now)
                    })
                    .unwrap_or_default();
                debug!(client = %identity, "control re-requested by active client");
                RequestOutcome::Active { remaining }
            } else if inner.active.is_none() {
                inner.queue.remove(identity);
                let grant = self.grant(&mut inner, identity, tier, display_name, now);
                changes.push(ControlChange {
                    previous: None,
                    current: Some(identity.clone()),
                    grant: Some(grant),
                    reason: ChangeReason::Claimed,
                    at: now,
                });
                RequestOutcome::Active {
                    remaining: self.config.budget_for(tier),
                }
            } else {
                self.enqueue(&mut inner, identity, tier, display_name, now)
            };

            check_invariants(&inner);
            outcome
        };

        self.publish(&changes);
        outcome
    }

    /// Record a liveness signal. Never extends the control budget.
    pub fn heartbeat(&self, identity: &ClientIdentity) -> HeartbeatOutcome {
        let now = self.clock.now();
        let mut changes = Vec::new();

        let outcome = {
            let mut inner = self.lock();
            self.sweep(&mut inner, now, &mut changes);

            let outcome = if inner.store.touch(identity, now) {
                let role = inner.store.get(identity).map_or(Role::Queued, |s| s.role);
                HeartbeatOutcome::Recorded { role }
            } else {
                HeartbeatOutcome::Unknown
            };
            check_invariants(&inner);
            outcome
        };

        if outcome == HeartbeatOutcome::Unknown {
            debug!(client = %identity, "heartbeat from untracked client");
        }
        self.publish(&changes);
        outcome
    }

    /// Give up control and hand it to the queue head.
    ///
    /// Only the active client can release. Anyone else gets
    /// [`ReleaseOutcome::NotActive`], which is also what a second release
    /// returns.
    pub fn release_control(&self, identity: &ClientIdentity) -> ReleaseOutcome {
        let now = self.clock.now();
        let mut changes = Vec::new();

        let outcome = {
            let mut inner = self.lock();
            self.sweep(&mut inner, now, &mut changes);

            let outcome = match inner.active.as_ref().map(|a| a.grant) {
                Some(grant) if inner.holds(identity) => {
                    let change = self.end_active(&mut inner, grant, ChangeReason::Released, now);
                    let promoted = change.as_ref().and_then(|c| c.current.clone());
                    let promoted_name = promoted
                        .as_ref()
                        .and_then(|p| inner.store.get(p))
                        .and_then(|s| s.display_name.clone());
                    changes.extend(change);
                    ReleaseOutcome::Released {
                        promoted,
                        promoted_name,
                    }
                }
                _ => ReleaseOutcome::NotActive,
            };
            check_invariants(&inner);
            outcome
        };

        if outcome == ReleaseOutcome::NotActive {
            debug!(client = %identity, "release ignored, client does not hold control");
        }
        self.publish(&changes);
        outcome
    }

    /// Withdraw from the queue without ever taking control.
    ///
    /// Returns false if the caller was not queued. The active client must
    /// use [`release_control`](Self::release_control) instead.
    pub fn leave_queue(&self, identity: &ClientIdentity) -> bool {
        let now = self.clock.now();
        let mut changes = Vec::new();

        let left = {
            let mut inner = self.lock();
            self.sweep(&mut inner, now, &mut changes);

            let left = inner.queue.remove(identity).is_some();
            if left {
                inner.store.remove(identity);
            }
            check_invariants(&inner);
            left
        };

        if left {
            info!(client = %identity, "client left the queue");
        }
        self.publish(&changes);
        left
    }

    /// Where the caller stands. Never mutates state.
    pub fn query_status(&self, identity: &ClientIdentity) -> Status {
        let now = self.clock.now();
        let inner = self.lock();

        match inner.store.get(identity) {
            Some(session) if session.role == Role::Active => Status::Active {
                remaining: session.remaining(now).unwrap_or_default(),
                tier: session.tier,
            },
            Some(session) => match inner.queue.position_of(identity) {
                Some(position) => Status::Queued {
                    position,
                    tier: session.tier,
                },
                None => Status::Idle,
            },
            None => Status::Idle,
        }
    }

    /// Whether `identity` may issue a control command at this instant.
    ///
    /// Stricter than [`query_status`](Self::query_status): a session whose
    /// deadline or liveness window has passed is refused even if the
    /// eviction timer has not run yet.
    pub fn is_active(&self, identity: &ClientIdentity) -> bool {
        let now = self.clock.now();
        let inner = self.lock();

        if !inner.holds(identity) {
            return false;
        }
        inner.store.get(identity).is_some_and(|s| {
            !s.budget_expired(now) && !s.is_silent(now, self.config.liveness_timeout)
        })
    }

    /// Expire overdue state and promote. Called by the eviction timer.
    ///
    /// Idempotent: calling it again at the same instant changes nothing.
    pub fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let mut changes = Vec::new();

        let report = {
            let mut inner = self.lock();
            let report = self.sweep(&mut inner, now, &mut changes);
            check_invariants(&inner);
            report
        };

        self.publish(&changes);
        report
    }

    /// The grant that should be ended now, if any.
    ///
    /// Pair with [`evict_overdue`](Self::evict_overdue) to evaluate and act
    /// in two steps.
    pub fn overdue(&self) -> Option<GrantId> {
        let now = self.clock.now();
        let inner = self.lock();
        self.overdue_reason(&inner, now).map(|(grant, _)| grant)
    }

    /// End `grant` if it is still the active one and still overdue.
    ///
    /// Returns false when the slot has moved on in the meantime (released,
    /// already expired, or re-granted), so a late eviction is harmless.
    pub fn evict_overdue(&self, grant: GrantId) -> bool {
        let now = self.clock.now();
        let mut changes = Vec::new();

        let evicted = {
            let mut inner = self.lock();
            let evicted = match self.overdue_reason(&inner, now) {
                Some((current, reason)) if current == grant => {
                    let change = self.end_active(&mut inner, grant, reason, now);
                    changes.extend(change);
                    true
                }
                _ => false,
            };
            check_invariants(&inner);
            evicted
        };

        if !evicted {
            debug!(grant = grant.as_u64(), "stale eviction ignored");
        }
        self.publish(&changes);
        evicted
    }

    /// The current holder and the waiting list.
    pub fn overview(&self) -> Overview {
        let now = self.clock.now();
        let inner = self.lock();

        let active = inner.active.as_ref().and_then(|a| {
            let session = inner.store.get(&a.identity)?;
            Some(ActiveView {
                identity: a.identity.clone(),
                display_name: session.display_name.clone(),
                tier: session.tier,
                grant: a.grant,
                remaining: session.remaining(now).unwrap_or_default(),
                budget: session.budget,
            })
        });

        let waiting = inner
            .queue
            .iter()
            .enumerate()
            .map(|(i, entry)| WaitingView {
                identity: entry.identity.clone(),
                display_name: inner
                    .store
                    .get(&entry.identity)
                    .and_then(|s| s.display_name.clone()),
                tier: entry.tier,
                position: i + 1,
            })
            .collect();

        Overview { active, waiting }
    }

    pub fn stats(&self) -> SchedulerStats {
        let inner = self.lock();
        SchedulerStats {
            active: u64::from(inner.active.is_some()),
            queued: inner.queue.len() as u64,
            ..inner.stats
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock means an invariant check already failed.
        self.inner
            .lock()
            .expect("scheduler state poisoned by an earlier panic")
    }

    fn enqueue(
        &self,
        inner: &mut Inner,
        identity: &ClientIdentity,
        tier: Tier,
        display_name: Option<String>,
        now: Instant,
    ) -> RequestOutcome {
        let budget = self.config.budget_for(tier);
        match inner.store.get_mut(identity) {
            Some(session) => {
                session.last_heartbeat_at = now;
                session.tier = tier;
                session.budget = budget;
                if display_name.is_some() {
                    session.display_name = display_name;
                }
            }
            None => {
                inner
                    .store
                    .insert(Session::queued(identity.clone(), tier, budget, display_name, now));
            }
        }

        match inner.queue.enqueue(identity.clone(), tier, now) {
            Enqueued::Added => info!(client = %identity, %tier, "client queued"),
            Enqueued::Moved { from } => {
                info!(client = %identity, %from, to = %tier, "queued client changed tier")
            }
            Enqueued::Unchanged => {}
        }

        RequestOutcome::Queued {
            position: inner.queue.position_of(identity).unwrap_or(inner.queue.len()),
        }
    }

    /// Make `identity` the active session with a fresh budget and liveness
    /// window.
    fn grant(
        &self,
        inner: &mut Inner,
        identity: &ClientIdentity,
        tier: Tier,
        display_name: Option<String>,
        now: Instant,
    ) -> GrantId {
        let grant = GrantId(inner.next_grant);
        inner.next_grant += 1;

        let budget = self.config.budget_for(tier);
        let mut session = match inner.store.remove(identity) {
            Some(existing) => existing,
            None => Session::queued(identity.clone(), tier, budget, None, now),
        };
        session.role = Role::Active;
        session.tier = tier;
        session.budget = budget;
        session.granted_at = Some(now);
        session.last_heartbeat_at = now;
        if display_name.is_some() {
            session.display_name = display_name;
        }
        inner.store.insert(session);

        inner.active = Some(ActiveGrant {
            identity: identity.clone(),
            grant,
        });
        inner.stats.grants += 1;
        grant
    }

    /// End the active tenure `grant` and promote the queue head.
    ///
    /// Does nothing if `grant` is no longer the active one.
    fn end_active(
        &self,
        inner: &mut Inner,
        grant: GrantId,
        reason: ChangeReason,
        now: Instant,
    ) -> Option<ControlChange> {
        let previous = match &inner.active {
            Some(active) if active.grant == grant => active.identity.clone(),
            _ => return None,
        };

        inner.active = None;
        inner.store.remove(&previous);
        match reason {
            ChangeReason::Released => inner.stats.releases += 1,
            ChangeReason::Expired => inner.stats.expirations += 1,
            ChangeReason::LivenessLapsed => inner.stats.liveness_evictions += 1,
            ChangeReason::Claimed => {}
        }

        let next = self.promote_next(inner, now);
        Some(ControlChange {
            previous: Some(previous),
            current: next.as_ref().map(|(id, _)| id.clone()),
            grant: next.map(|(_, grant)| grant),
            reason,
            at: now,
        })
    }

    /// Pop the queue head into the active slot, or leave the resource idle.
    fn promote_next(&self, inner: &mut Inner, now: Instant) -> Option<(ClientIdentity, GrantId)> {
        let entry = inner.queue.peek_and_pop()?;
        let grant = self.grant(inner, &entry.identity, entry.tier, None, now);
        Some((entry.identity, grant))
    }

    /// Why the active grant must end at `now`, if it must.
    fn overdue_reason(&self, inner: &Inner, now: Instant) -> Option<(GrantId, ChangeReason)> {
        let active = inner.active.as_ref()?;
        let session = inner.store.get(&active.identity)?;
        if session.budget_expired(now) {
            Some((active.grant, ChangeReason::Expired))
        } else if session.is_silent(now, self.config.liveness_timeout) {
            Some((active.grant, ChangeReason::LivenessLapsed))
        } else {
            None
        }
    }

    /// Drop silent queued sessions, then end an overdue active session.
    ///
    /// Queued sessions go first so a departed client is never promoted.
    fn sweep(&self, inner: &mut Inner, now: Instant, changes: &mut Vec<ControlChange>) -> TickReport {
        let mut report = TickReport::default();

        for identity in inner.store.silent_queued(now, self.config.liveness_timeout) {
            inner.queue.remove(&identity);
            inner.store.remove(&identity);
            inner.stats.queue_collections += 1;
            report.collected.push(identity);
        }

        if let Some((grant, reason)) = self.overdue_reason(inner, now) {
            if let Some(change) = self.end_active(inner, grant, reason, now) {
                report.evicted = change.previous.clone().map(|id| (id, reason));
                report.promoted = change.current.clone();
                changes.push(change);
            }
        }

        if !report.collected.is_empty() {
            debug!(count = report.collected.len(), "dropped silent queued clients");
        }
        report
    }

    fn publish(&self, changes: &[ControlChange]) {
        for change in changes {
            let previous = change.previous.as_ref().map(ClientIdentity::as_str);
            let current = change.current.as_ref().map(ClientIdentity::as_str);
            match change.reason {
                ChangeReason::LivenessLapsed => {
                    warn!(?previous, ?current, "active client went silent, control reassigned")
                }
                reason => {
                    info!(?previous, ?current, reason = reason.label(), "control changed hands")
                }
            }
            self.notifier.control_changed(change);
        }
    }
}

impl Inner {
    fn holds(&self, identity: &ClientIdentity) -> bool {
        self.active.as_ref().is_some_and(|a| &a.identity == identity)
    }
}

/// Panics if the store, queue, and grant disagree.
///
/// These states cannot arise through the public API; reaching one means
/// two clients could believe they hold control, which must not be papered
/// over.
fn check_invariants(inner: &Inner) {
    let active_sessions = inner.store.active_count();
    assert!(
        active_sessions <= 1,
        "invariant violated: {active_sessions} active sessions"
    );

    match &inner.active {
        Some(active) => {
            let recorded = inner.store.get(&active.identity);
            assert!(
                recorded.is_some_and(|s| s.role == Role::Active),
                "invariant violated: active grant {} has no active session",
                active.identity
            );
            assert!(
                !inner.queue.contains(&active.identity),
                "invariant violated: active client {} is also queued",
                active.identity
            );
        }
        None => assert_eq!(
            active_sessions, 0,
            "invariant violated: active session without a grant"
        ),
    }

    assert_eq!(
        inner.queue.len() + active_sessions,
        inner.store.len(),
        "invariant violated: queue and session store diverged"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn id(s: &str) -> ClientIdentity {
        ClientIdentity::new(s).unwrap()
    }

    fn handed_to(next: Option<&str>) -> ReleaseOutcome {
        ReleaseOutcome::Released {
            promoted: next.map(id),
            promoted_name: None,
        }
    }

    fn test_scheduler() -> (Scheduler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Scheduler::new(SchedulerConfig::default(), clock.clone()).unwrap();
        (scheduler, clock)
    }

    /// Advance to `to` (seconds past origin) in 5s steps, heartbeating
    /// `alive` along the way.
    fn advance_alive(scheduler: &Scheduler, clock: &ManualClock, to: u64, alive: &[&str]) {
        while clock.elapsed() + secs(5) <= secs(to) {
            clock.advance(secs(5));
            for name in alive {
                scheduler.heartbeat(&id(name));
            }
        }
        clock.set(secs(to));
    }

    fn recording(scheduler: Scheduler) -> (Scheduler, Arc<Mutex<Vec<ControlChange>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let scheduler = scheduler.with_notifier(Arc::new(move |c: &ControlChange| {
            sink.lock().unwrap().push(c.clone());
        }));
        (scheduler, seen)
    }

    #[test]
    fn config_validation() {
        assert!(SchedulerConfig::default().validate().is_ok());

        let zero = SchedulerConfig {
            standard_budget: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        assert!(matches!(zero.validate(), Err(SchedulerError::ZeroBudget { tier: "standard" })));

        let long_liveness = SchedulerConfig {
            liveness_timeout: secs(100),
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            long_liveness.validate(),
            Err(SchedulerError::LivenessNotShorter { .. })
        ));

        let no_liveness = SchedulerConfig {
            liveness_timeout: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        assert!(matches!(no_liveness.validate(), Err(SchedulerError::ZeroLiveness)));

        let clock = Arc::new(ManualClock::new());
        assert!(Scheduler::new(long_liveness, clock).is_err());
    }

    #[test]
    fn idle_request_is_granted_immediately() {
        let (s, _clock) = test_scheduler();
        let outcome = s.request_control(&id("c"), Tier::Standard);
        assert_eq!(outcome, RequestOutcome::Active { remaining: secs(100) });
        assert_eq!(outcome.role(), Role::Active);

        assert_eq!(
            s.query_status(&id("c")),
            Status::Active {
                remaining: secs(100),
                tier: Tier::Standard
            }
        );
        assert!(s.is_active(&id("c")));
    }

    #[test]
    fn full_handoff_scenario() {
        let (s, clock) = test_scheduler();
        let (a, b) = (id("a"), id("b"));

        // t=0: A claims the idle resource.
        assert_eq!(s.request_control(&a, Tier::Standard), RequestOutcome::Active { remaining: secs(100) });

        // t=10: B (elevated) waits behind A.
        advance_alive(&s, &clock, 10, &["a"]);
        assert_eq!(s.request_control(&b, Tier::Elevated), RequestOutcome::Queued { position: 1 });

        // t=30: A releases, B takes over with the elevated budget.
        advance_alive(&s, &clock, 30, &["a", "b"]);
        assert_eq!(
            s.release_control(&a),
            handed_to(Some("b"))
        );
        assert_eq!(
            s.query_status(&b),
            Status::Active {
                remaining: secs(600),
                tier: Tier::Elevated
            }
        );
        assert_eq!(s.query_status(&a), Status::Idle);

        // t=650: B's budget ended at t=630; the tick evicts it.
        advance_alive(&s, &clock, 620, &["b"]);
        assert_eq!(
            s.query_status(&b),
            Status::Active {
                remaining: secs(10),
                tier: Tier::Elevated
            }
        );
        clock.set(secs(650));
        let report = s.tick();
        assert_eq!(report.evicted, Some((b.clone(), ChangeReason::Expired)));
        assert_eq!(report.promoted, None);
        assert_eq!(s.query_status(&b), Status::Idle);
        assert!(s.overview().active.is_none());
    }

    #[test]
    fn elevated_is_promoted_before_earlier_standard() {
        let (s, _clock) = test_scheduler();
        s.request_control(&id("holder"), Tier::Standard);
        s.request_control(&id("q1"), Tier::Standard);
        s.request_control(&id("e1"), Tier::Elevated);

        assert_eq!(
            s.query_status(&id("e1")),
            Status::Queued {
                position: 1,
                tier: Tier::Elevated
            }
        );
        assert_eq!(
            s.release_control(&id("holder")),
            handed_to(Some("e1"))
        );
        assert_eq!(
            s.release_control(&id("e1")),
            handed_to(Some("q1"))
        );
    }

    #[test]
    fn fifo_within_standard_tier() {
        let (s, _clock) = test_scheduler();
        s.request_control(&id("holder"), Tier::Standard);
        s.request_control(&id("a"), Tier::Standard);
        s.request_control(&id("b"), Tier::Standard);

        let first = s.release_control(&id("holder"));
        assert_eq!(first, handed_to(Some("a")));
        let second = s.release_control(&id("a"));
        assert_eq!(second, handed_to(Some("b")));
    }

    #[test]
    fn elevated_request_never_preempts() {
        let (s, clock) = test_scheduler();
        s.request_control(&id("a"), Tier::Standard);
        s.request_control(&id("vip"), Tier::Elevated);

        // Others cannot release on A's behalf.
        assert_eq!(s.release_control(&id("vip")), ReleaseOutcome::NotActive);
        assert_eq!(s.release_control(&id("stranger")), ReleaseOutcome::NotActive);

        advance_alive(&s, &clock, 95, &["a", "vip"]);
        assert!(s.tick().is_quiet());
        assert!(s.is_active(&id("a")));
        assert!(!s.is_active(&id("vip")));
    }

    #[test]
    fn release_is_idempotent() {
        let (s, _clock) = test_scheduler();
        s.request_control(&id("a"), Tier::Standard);

        assert_eq!(s.release_control(&id("a")), handed_to(None));
        assert_eq!(s.release_control(&id("a")), ReleaseOutcome::NotActive);
        assert_eq!(s.stats().releases, 1);
    }

    #[test]
    fn liveness_lapse_evicts_before_budget() {
        let (s, clock) = test_scheduler();
        s.request_control(&id("x"), Tier::Standard);
        s.request_control(&id("next"), Tier::Standard);

        // X goes quiet, NEXT keeps heartbeating.
        advance_alive(&s, &clock, 15, &["next"]);
        clock.advance(secs(1));

        assert!(!s.is_active(&id("x")), "silent holder must not be allowed to act");
        let report = s.tick();
        assert_eq!(report.evicted, Some((id("x"), ChangeReason::LivenessLapsed)));
        assert_eq!(report.promoted, Some(id("next")));
        assert_eq!(s.stats().liveness_evictions, 1);
        assert_eq!(
            s.query_status(&id("next")),
            Status::Active {
                remaining: secs(100),
                tier: Tier::Standard
            }
        );
    }

    #[test]
    fn silent_queued_clients_are_collected() {
        let (s, clock) = test_scheduler();
        s.request_control(&id("a"), Tier::Standard);
        s.request_control(&id("ghost"), Tier::Standard);
        s.request_control(&id("waiter"), Tier::Standard);

        advance_alive(&s, &clock, 15, &["a", "waiter"]);
        clock.advance(secs(1));
        let report = s.tick();
        assert_eq!(report.collected, vec![id("ghost")]);
        assert!(report.evicted.is_none());

        assert_eq!(s.query_status(&id("ghost")), Status::Idle);
        assert_eq!(
            s.query_status(&id("waiter")),
            Status::Queued {
                position: 1,
                tier: Tier::Standard
            }
        );
        assert_eq!(s.heartbeat(&id("ghost")), HeartbeatOutcome::Unknown);
    }

    #[test]
    fn heartbeat_does_not_extend_budget() {
        let (s, clock) = test_scheduler();
        s.request_control(&id("a"), Tier::Standard);

        advance_alive(&s, &clock, 60, &["a"]);
        assert_eq!(
            s.heartbeat(&id("a")),
            HeartbeatOutcome::Recorded { role: Role::Active }
        );
        assert_eq!(
            s.query_status(&id("a")),
            Status::Active {
                remaining: secs(40),
                tier: Tier::Standard
            }
        );
    }

    #[test]
    fn re_request_by_active_is_not_a_budget_reset() {
        let (s, clock) = test_scheduler();
        s.request_control(&id("a"), Tier::Standard);
        advance_alive(&s, &clock, 50, &["a"]);

        let again = s.request_control(&id("a"), Tier::Elevated);
        assert_eq!(again, RequestOutcome::Active { remaining: secs(50) });
        assert_eq!(s.stats().grants, 1);
        assert_eq!(
            s.query_status(&id("a")),
            Status::Active {
                remaining: secs(50),
                tier: Tier::Standard
            }
        );
    }

    #[test]
    fn repeat_queue_request_is_idempotent() {
        let (s, _clock) = test_scheduler();
        s.request_control(&id("holder"), Tier::Standard);
        s.request_control(&id("a"), Tier::Standard);
        s.request_control(&id("b"), Tier::Standard);

        assert_eq!(
            s.request_control(&id("a"), Tier::Standard),
            RequestOutcome::Queued { position: 1 }
        );
        assert_eq!(s.overview().waiting.len(), 2);
    }

    #[test]
    fn tier_upgrade_goes_to_back_of_new_tier() {
        let (s, _clock) = test_scheduler();
        s.request_control(&id("holder"), Tier::Standard);
        s.request_control(&id("e1"), Tier::Elevated);
        s.request_control(&id("s1"), Tier::Standard);
        s.request_control(&id("e2"), Tier::Elevated);

        assert_eq!(
            s.request_control(&id("s1"), Tier::Elevated),
            RequestOutcome::Queued { position: 3 }
        );

        let order: Vec<_> = s
            .overview()
            .waiting
            .into_iter()
            .map(|w| w.identity.to_string())
            .collect();
        assert_eq!(order, ["e1", "e2", "s1"]);

        // Promoted with the budget of the tier it waited in.
        s.release_control(&id("holder"));
        s.release_control(&id("e1"));
        s.release_control(&id("e2"));
        assert_eq!(
            s.query_status(&id("s1")),
            Status::Active {
                remaining: secs(600),
                tier: Tier::Elevated
            }
        );
    }

    #[test]
    fn queued_client_can_leave() {
        let (s, _clock) = test_scheduler();
        s.request_control(&id("holder"), Tier::Standard);
        s.request_control(&id("a"), Tier::Standard);
        s.request_control(&id("b"), Tier::Standard);

        assert!(s.leave_queue(&id("a")));
        assert!(!s.leave_queue(&id("a")));
        assert!(!s.leave_queue(&id("holder")));
        assert_eq!(
            s.query_status(&id("b")),
            Status::Queued {
                position: 1,
                tier: Tier::Standard
            }
        );
    }

    #[test]
    fn tick_is_idempotent() {
        let (s, clock) = test_scheduler();
        s.request_control(&id("a"), Tier::Standard);
        clock.set(secs(101));

        assert!(s.tick().evicted.is_some());
        assert!(s.tick().is_quiet());
        assert!(s.tick().is_quiet());
        assert_eq!(s.stats().expirations, 1);
    }

    #[test]
    fn stale_eviction_after_release_does_nothing() {
        let (s, clock) = test_scheduler();
        s.request_control(&id("a"), Tier::Standard);
        s.request_control(&id("b"), Tier::Standard);

        advance_alive(&s, &clock, 95, &["a", "b"]);
        clock.set(secs(100));
        let observed = s.overdue().expect("a's budget is spent");

        // A manual release lands between evaluation and eviction. The
        // release path ends the overdue grant itself, so A gets NotActive,
        // B is promoted exactly once, and the late eviction is a no-op.
        assert_eq!(s.release_control(&id("a")), ReleaseOutcome::NotActive);
        assert!(!s.evict_overdue(observed));

        assert!(s.is_active(&id("b")));
        assert_eq!(s.stats().grants, 2);
    }

    #[test]
    fn evict_overdue_ignores_replaced_grant() {
        let (s, clock) = test_scheduler();
        s.request_control(&id("a"), Tier::Standard);
        clock.set(secs(100));
        let stale = s.overdue().unwrap();
        assert!(s.evict_overdue(stale));

        // B claims the now idle resource and later overruns too; the old
        // grant id must not end B's tenure.
        s.request_control(&id("b"), Tier::Standard);
        clock.set(secs(250));
        assert!(!s.evict_overdue(stale));
        let fresh = s.overdue().unwrap();
        assert_ne!(fresh, stale);
        assert!(s.evict_overdue(fresh));
    }

    #[test]
    fn query_status_does_not_mutate() {
        let (s, clock) = test_scheduler();
        s.request_control(&id("a"), Tier::Standard);
        clock.set(secs(500));

        // Overdue but not yet swept: still reported, with nothing left.
        assert_eq!(
            s.query_status(&id("a")),
            Status::Active {
                remaining: Duration::ZERO,
                tier: Tier::Standard
            }
        );
        assert_eq!(s.stats().expirations, 0);
        assert!(s.overdue().is_some());
        assert_eq!(s.query_status(&id("nobody")), Status::Idle);
    }

    #[test]
    fn notifier_sees_every_handoff() {
        let (s, clock) = test_scheduler();
        let (s, seen) = recording(s);

        s.request_control(&id("a"), Tier::Standard);
        s.request_control(&id("b"), Tier::Standard);
        s.heartbeat(&id("b"));
        s.release_control(&id("a"));
        clock.set(secs(101));
        s.tick();

        let seen = seen.lock().unwrap();
        let summary: Vec<_> = seen
            .iter()
            .map(|c| {
                (
                    c.previous.as_ref().map(|p| p.to_string()),
                    c.current.as_ref().map(|p| p.to_string()),
                    c.reason,
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                (None, Some("a".to_string()), ChangeReason::Claimed),
                (Some("a".to_string()), Some("b".to_string()), ChangeReason::Released),
                (Some("b".to_string()), None, ChangeReason::Expired),
            ]
        );
        assert_eq!(seen[0].grant.map(|g| g.as_u64()), Some(0));
        assert_eq!(seen[1].grant.map(|g| g.as_u64()), Some(1));
        assert_eq!(seen[2].grant, None);
    }

    #[test]
    fn overview_lists_owner_and_waiting_names() {
        let (s, clock) = test_scheduler();
        s.request_control_named(&id("a"), Tier::Standard, Some("alice".to_string()));
        s.request_control_named(&id("b"), Tier::Standard, Some("bob".to_string()));
        s.request_control(&id("c"), Tier::Elevated);
        clock.set(secs(10));

        let overview = s.overview();
        let active = overview.active.unwrap();
        assert_eq!(active.display_name.as_deref(), Some("alice"));
        assert_eq!(active.remaining, secs(90));
        assert_eq!(active.budget, secs(100));

        let names: Vec<_> = overview
            .waiting
            .iter()
            .map(|w| (w.position, w.display_name.clone()))
            .collect();
        assert_eq!(names, vec![(1, None), (2, Some("bob".to_string()))]);
    }

    #[test]
    fn release_names_the_promoted_client() {
        let (s, _clock) = test_scheduler();
        s.request_control_named(&id("a"), Tier::Standard, Some("alice".to_string()));
        s.request_control_named(&id("b"), Tier::Standard, Some("bob".to_string()));

        assert_eq!(
            s.release_control(&id("a")),
            ReleaseOutcome::Released {
                promoted: Some(id("b")),
                promoted_name: Some("bob".to_string()),
            }
        );
        assert_eq!(s.release_control(&id("b")), handed_to(None));
    }

    #[test]
    fn concurrent_requests_grant_exactly_one() {
        let (s, _clock) = test_scheduler();
        let s = Arc::new(s);

        let outcomes: Vec<RequestOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..32)
                .map(|i| {
                    let s = Arc::clone(&s);
                    let tier = if i % 3 == 0 { Tier::Elevated } else { Tier::Standard };
                    scope.spawn(move || s.request_control(&id(&format!("client-{i}")), tier))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let active = outcomes.iter().filter(|o| o.role() == Role::Active).count();
        assert_eq!(active, 1);

        let mut positions: Vec<_> = outcomes
            .iter()
            .filter_map(|o| match o {
                RequestOutcome::Queued { position } => Some(*position),
                _ => None,
            })
            .collect();
        positions.sort_unstable();
        assert_eq!(positions.len(), 31);

        let stats = s.stats();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.queued, 31);
    }

    #[test]
    fn concurrent_release_and_tick_promote_once() {
        for _ in 0..50 {
            let (s, clock) = test_scheduler();
            let s = Arc::new(s);
            s.request_control(&id("a"), Tier::Standard);
            s.request_control(&id("b"), Tier::Standard);
            s.request_control(&id("c"), Tier::Standard);
            clock.set(secs(10));
            s.heartbeat(&id("b"));
            s.heartbeat(&id("c"));
            // A has now been silent past the liveness window.
            clock.set(secs(16));

            std::thread::scope(|scope| {
                let releaser = Arc::clone(&s);
                let ticker = Arc::clone(&s);
                scope.spawn(move || releaser.release_control(&id("a")));
                scope.spawn(move || ticker.tick());
            });

            // A leaves exactly once and only B is promoted.
            assert!(s.is_active(&id("b")));
            assert_eq!(
                s.query_status(&id("c")),
                Status::Queued {
                    position: 1,
                    tier: Tier::Standard
                }
            );
            assert_eq!(s.stats().grants, 2);
        }
    }
}
