use crate::domain_model::SessionEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

/// Broadcasts session lifecycle events.
///
/// `Expired` is latched: it fires at most once until the latch is re-armed by a
/// login or a successful refresh, no matter how many requests observe the
/// failed session.
#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
    expiry_armed: Arc<AtomicBool>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tx,
            expiry_armed: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn arm(&self) {
        self.expiry_armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.expiry_armed.store(false, Ordering::SeqCst);
    }

    /// Publish `Expired` if the latch is armed. Returns whether it fired.
    pub fn expire(&self) -> bool {
        if self.expiry_armed.swap(false, Ordering::SeqCst) {
            self.publish(SessionEvent::Expired);
            true
        } else {
            false
        }
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_fires_once_until_rearmed() {
        let events = SessionEvents::new();
        let mut rx = events.subscribe();

        assert!(events.expire());
        assert!(!events.expire());
        events.arm();
        assert!(events.expire());

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::Expired);
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::Expired);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disarmed_latch_stays_quiet() {
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        events.disarm();
        events.publish(SessionEvent::LoggedOut);

        assert!(!events.expire());
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::LoggedOut);
        assert!(rx.try_recv().is_err());
    }
}
