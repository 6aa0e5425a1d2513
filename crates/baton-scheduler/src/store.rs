//! Session store: the table of tracked clients.
//!
//! Owned by the scheduler and only ever touched under its lock. Queue
//! position is not stored here; it is derived from the priority queue.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use baton_core::{ClientIdentity, Role, Tier};

/// One client's relationship to the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: ClientIdentity,
    pub display_name: Option<String>,
    pub role: Role,
    pub tier: Tier,
    /// Set when the session becomes active; `None` while queued.
    pub granted_at: Option<Instant>,
    /// Time allotted once active.
    pub budget: Duration,
    pub last_heartbeat_at: Instant,
}

impl Session {
    pub fn queued(
        identity: ClientIdentity,
        tier: Tier,
        budget: Duration,
        display_name: Option<String>,
        now: Instant,
    ) -> Self {
        Self {
            identity,
            display_name,
            role: Role::Queued,
            tier,
            granted_at: None,
            budget,
            last_heartbeat_at: now,
        }
    }

    /// Hard deadline of an active session.
    pub fn deadline(&self) -> Option<Instant> {
        self.granted_at.map(|at| at + self.budget)
    }

    /// Budget left at `now`, floored at zero. `None` while queued.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn budget_expired(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// True once no heartbeat has arrived for longer than `window`.
    pub fn is_silent(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.last_heartbeat_at) > window
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<ClientIdentity, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &ClientIdentity) -> Option<&Session> {
        self.sessions.get(identity)
    }

    pub fn get_mut(&mut self, identity: &ClientIdentity) -> Option<&mut Session> {
        self.sessions.get_mut(identity)
    }

    /// Insert a new session, replacing any previous one for the identity.
    pub fn insert(&mut self, session: Session) -> Option<Session> {
        self.sessions.insert(session.identity.clone(), session)
    }

    pub fn remove(&mut self, identity: &ClientIdentity) -> Option<Session> {
        self.sessions.remove(identity)
    }

    /// Record a liveness signal. Returns false for unknown identities.
    pub fn touch(&mut self, identity: &ClientIdentity, now: Instant) -> bool {
        match self.sessions.get_mut(identity) {
            Some(session) => {
                if now > session.last_heartbeat_at {
                    session.last_heartbeat_at = now;
                }
                true
            }
            None => false,
        }
    }

    /// Identities of queued sessions silent for longer than `window`.
    pub fn silent_queued(&self, now: Instant, window: Duration) -> Vec<ClientIdentity> {
        self.sessions
            .values()
            .filter(|s| s.role == Role::Queued && s.is_silent(now, window))
            .map(|s| s.identity.clone())
            .collect()
    }

    /// Number of sessions currently marked active.
    pub fn active_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.role == Role::Active)
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }
}
