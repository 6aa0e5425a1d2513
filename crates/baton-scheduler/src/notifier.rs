//! Outward notification of control hand-offs.
//!
//! The scheduler reports every change of the active session as a
//! [`ControlChange`]. Delivery happens after the scheduler lock is
//! released, so a notifier may be slow without stalling admission, but it
//! must not call back into the scheduler synchronously expecting to see a
//! state older than the change it was handed.

use std::time::Instant;

use baton_core::ClientIdentity;
use tokio::sync::watch;

use crate::scheduler::GrantId;

/// Why the active session changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// An idle resource was claimed directly by a request.
    Claimed,
    /// The active client released control.
    Released,
    /// The active client's budget ran out.
    Expired,
    /// The active client stopped heartbeating.
    LivenessLapsed,
}

impl ChangeReason {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeReason::Claimed => "claimed",
            ChangeReason::Released => "released",
            ChangeReason::Expired => "expired",
            ChangeReason::LivenessLapsed => "liveness_lapsed",
        }
    }
}

/// A discrete, timestamped transition of the active slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlChange {
    pub previous: Option<ClientIdentity>,
    /// The new active identity, `None` when the resource went idle.
    pub current: Option<ClientIdentity>,
    /// Grant held by `current`.
    pub grant: Option<GrantId>,
    pub reason: ChangeReason,
    pub at: Instant,
}

/// Receives control hand-offs.
pub trait Notifier: Send + Sync {
    fn control_changed(&self, change: &ControlChange);
}

impl<F> Notifier for F
where
    F: Fn(&ControlChange) + Send + Sync,
{
    fn control_changed(&self, change: &ControlChange) {
        self(change)
    }
}

/// Discards every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn control_changed(&self, _change: &ControlChange) {}
}

/// Publishes the latest change on a `tokio::sync::watch` channel.
///
/// Lets a push transport (SSE, websocket) await hand-offs instead of
/// polling. Slow subscribers only ever see the most recent change.
#[derive(Debug)]
pub struct WatchNotifier {
    tx: watch::Sender<Option<ControlChange>>,
}

impl WatchNotifier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ControlChange>> {
        self.tx.subscribe()
    }
}

impl Default for WatchNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for WatchNotifier {
    fn control_changed(&self, change: &ControlChange) {
        self.tx.send_replace(Some(change.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn change(current: Option<&str>, reason: ChangeReason) -> ControlChange {
        ControlChange {
            previous: None,
            current: current.map(|c| ClientIdentity::new(c).unwrap()),
            grant: current.map(|_| GrantId(1)),
            reason,
            at: Instant::now(),
        }
    }

    #[test]
    fn closures_are_notifiers() {
        let seen = Mutex::new(Vec::new());
        let notifier = |c: &ControlChange| seen.lock().unwrap().push(c.reason);

        notifier.control_changed(&change(Some("a"), ChangeReason::Claimed));
        notifier.control_changed(&change(None, ChangeReason::Released));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ChangeReason::Claimed, ChangeReason::Released]
        );
    }

    #[tokio::test]
    async fn watch_notifier_delivers_latest() {
        let notifier = WatchNotifier::new();
        let mut rx = notifier.subscribe();
        assert!(rx.borrow().is_none());

        notifier.control_changed(&change(Some("a"), ChangeReason::Claimed));
        notifier.control_changed(&change(Some("b"), ChangeReason::Expired));

        rx.changed().await.unwrap();
        let latest = rx.borrow_and_update().clone().unwrap();
        assert_eq!(latest.current.unwrap().as_str(), "b");
        assert_eq!(latest.reason, ChangeReason::Expired);
    }

    #[test]
    fn watch_notifier_without_subscribers_does_not_fail() {
        let notifier = WatchNotifier::default();
        notifier.control_changed(&change(None, ChangeReason::LivenessLapsed));
        assert_eq!(ChangeReason::LivenessLapsed.label(), "liveness_lapsed");
    }
}
