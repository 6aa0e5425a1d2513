//! Two-tier priority queue.
//!
//! Serving order is every elevated entry (oldest first) followed by every
//! standard entry (oldest first). Each tier is a `BTreeMap` keyed by a
//! monotonically increasing insertion sequence, so arrival order within a
//! tier is exact even when two entries share an `enqueued_at` instant. An
//! identity index gives O(log n) removal by identity.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use baton_core::{ClientIdentity, Tier};

/// A waiting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub identity: ClientIdentity,
    pub tier: Tier,
    pub enqueued_at: Instant,
    seq: u64,
}

/// What [`PriorityQueue::enqueue`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The identity was not queued before.
    Added,
    /// Already queued in the same tier; position kept.
    Unchanged,
    /// Already queued in another tier; moved to the back of the new tier.
    Moved { from: Tier },
}

#[derive(Debug, Default)]
pub struct PriorityQueue {
    elevated: BTreeMap<u64, QueueEntry>,
    standard: BTreeMap<u64, QueueEntry>,
    index: HashMap<ClientIdentity, (Tier, u64)>,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `identity` to the back of its tier.
    ///
    /// Repeating the call with the same tier is a no-op. A tier change
    /// re-queues at the back of the new tier rather than keeping the old
    /// arrival time.
    pub fn enqueue(&mut self, identity: ClientIdentity, tier: Tier, now: Instant) -> Enqueued {
        let outcome = match self.index.get(&identity) {
            Some((current, _)) if *current == tier => return Enqueued::Unchanged,
            Some((current, _)) => {
                let from = *current;
                self.remove(&identity);
                Enqueued::Moved { from }
            }
            None => Enqueued::Added,
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(identity.clone(), (tier, seq));
        self.lane_mut(tier).insert(
            seq,
            QueueEntry {
                identity,
                tier,
                enqueued_at: now,
                seq,
            },
        );
        outcome
    }

    /// Remove `identity` wherever it is queued.
    pub fn remove(&mut self, identity: &ClientIdentity) -> Option<QueueEntry> {
        let (tier, seq) = self.index.remove(identity)?;
        self.lane_mut(tier).remove(&seq)
    }

    /// The entry that would be served next.
    pub fn peek(&self) -> Option<&QueueEntry> {
        self.elevated
            .values()
            .next()
            .or_else(|| self.standard.values().next())
    }

    /// Remove and return the entry that should be served next.
    pub fn peek_and_pop(&mut self) -> Option<QueueEntry> {
        let entry = match self.elevated.pop_first() {
            Some((_, entry)) => entry,
            None => self.standard.pop_first()?.1,
        };
        self.index.remove(&entry.identity);
        Some(entry)
    }

    /// 1-based rank of `identity` in serving order.
    pub fn position_of(&self, identity: &ClientIdentity) -> Option<usize> {
        let (tier, seq) = self.index.get(identity)?;
        let ahead = match tier {
            Tier::Elevated => self.elevated.range(..*seq).count(),
            Tier::Standard => self.elevated.len() + self.standard.range(..*seq).count(),
        };
        Some(ahead + 1)
    }

    pub fn tier_of(&self, identity: &ClientIdentity) -> Option<Tier> {
        self.index.get(identity).map(|(tier, _)| *tier)
    }

    pub fn contains(&self, identity: &ClientIdentity) -> bool {
        self.index.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of entries waiting in one tier.
    pub fn tier_len(&self, tier: Tier) -> usize {
        match tier {
            Tier::Elevated => self.elevated.len(),
            Tier::Standard => self.standard.len(),
        }
    }

    /// Entries in serving order.
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.elevated.values().chain(self.standard.values())
    }

    fn lane_mut(&mut self, tier: Tier) -> &mut BTreeMap<u64, QueueEntry> {
        match tier {
            Tier::Elevated => &mut self.elevated,
            Tier::Standard => &mut self.standard,
        }
    }
}
