use crate::domain_model::AccessToken;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("no refresh token stored")]
    MissingRefreshToken,
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16 },
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("malformed refresh response: {0}")]
    MalformedResponse(String),
    #[error("invalid refresh request: {0}")]
    InvalidRequest(String),
    #[error("credential store error: {0}")]
    Store(String),
    #[error("refresh task did not finish: {0}")]
    Interrupted(String),
    #[error("session was replaced while refreshing")]
    Superseded,
}

pub type RefreshOutcome = Result<AccessToken, RefreshFailure>;
pub type RefreshHandle = Shared<BoxFuture<'static, RefreshOutcome>>;

enum Slot {
    Idle { last_issued: Option<AccessToken> },
    InFlight { cycle: u64, handle: RefreshHandle },
}

/// Coalesces concurrent refresh attempts into one in-flight cycle.
///
/// The first caller starts the cycle and publishes its shared handle; callers
/// arriving while it runs await the same handle. The cycle runs as its own
/// task and settles the slot itself, so dropping every waiter neither cancels
/// it nor leaves the slot occupied. The slot lock is never held across an
/// await.
pub struct RefreshCoordinator {
    slot: Arc<Mutex<Slot>>,
    cycles: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Idle { last_issued: None })),
            cycles: AtomicU64::new(0),
        }
    }

    /// Number of cycles started so far.
    pub fn cycles_started(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Get a fresh access token for a request that was rejected while carrying
    /// `stale`.
    ///
    /// If a cycle already completed and issued a different token than `stale`,
    /// that token is returned without contacting the backend.
    pub async fn refresh<F>(&self, stale: Option<&AccessToken>, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let handle = {
            let mut slot = lock(&self.slot);

            // A finished cycle whose task never settled (it panicked).
            let unsettled = match &*slot {
                Slot::InFlight { handle, .. } => handle
                    .peek()
                    .map(|outcome| outcome.as_ref().ok().cloned()),
                Slot::Idle { .. } => None,
            };
            if let Some(last_issued) = unsettled {
                *slot = Slot::Idle { last_issued };
            }

            if let Slot::InFlight { cycle, handle } = &*slot {
                tracing::debug!(cycle, "joining in-flight refresh");
                handle.clone()
            } else {
                if let Slot::Idle {
                    last_issued: Some(last),
                } = &*slot
                {
                    if stale != Some(last) {
                        tracing::debug!("token already replaced by an earlier refresh");
                        return Ok(last.clone());
                    }
                }
                let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!(cycle, "starting refresh");
                let handle = detach(self.slot.clone(), cycle, start());
                *slot = Slot::InFlight {
                    cycle,
                    handle: handle.clone(),
                };
                handle
            }
        };

        handle.await
    }

    /// Forget the last issued token and stop handing out the in-flight cycle,
    /// e.g. after a login or logout replaced the stored credentials. Requests
    /// already waiting on that cycle still get its outcome.
    pub fn reset(&self) {
        *lock(&self.slot) = Slot::Idle { last_issued: None };
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // The slot is always left in a consistent state, so a poisoned lock is
    // still usable.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Return the slot to `Idle` if it still belongs to `cycle`.
fn settle(slot: &Mutex<Slot>, cycle: u64, outcome: &RefreshOutcome) {
    let mut slot = lock(slot);
    let current = matches!(&*slot, Slot::InFlight { cycle: running, .. } if *running == cycle);
    if current {
        *slot = Slot::Idle {
            last_issued: outcome.as_ref().ok().cloned(),
        };
    }
}

/// Spawn `work` as its own task, settling the slot when it finishes.
fn detach(
    slot: Arc<Mutex<Slot>>,
    cycle: u64,
    work: BoxFuture<'static, RefreshOutcome>,
) -> RefreshHandle {
    let task = tokio::spawn(async move {
        let outcome = work.await;
        settle(&slot, cycle, &outcome);
        outcome
    });
    async move {
        task.await
            .unwrap_or_else(|e| Err(RefreshFailure::Interrupted(e.to_string())))
    }
    .boxed()
    .shared()
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn issuing(
        calls: Arc<AtomicUsize>,
        outcome: RefreshOutcome,
    ) -> impl FnOnce() -> BoxFuture<'static, RefreshOutcome> {
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                outcome
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_cycle() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let stale = AccessToken::new("T1");

        let waiters = (0..5).map(|_| {
            coordinator.refresh(
                Some(&stale),
                issuing(calls.clone(), Ok(AccessToken::new("T2"))),
            )
        });
        let outcomes = join_all(waiters).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.cycles_started(), 1);
        for outcome in outcomes {
            assert_eq!(outcome, Ok(AccessToken::new("T2")));
        }
    }

    #[tokio::test]
    async fn late_caller_with_replaced_token_skips_refresh() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let t1 = AccessToken::new("T1");

        coordinator
            .refresh(Some(&t1), issuing(calls.clone(), Ok(AccessToken::new("T2"))))
            .await
            .unwrap();

        let outcome = coordinator
            .refresh(Some(&t1), issuing(calls.clone(), Ok(AccessToken::new("T3"))))
            .await;
        assert_eq!(outcome, Ok(AccessToken::new("T2")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The freshly issued token being rejected is a new expiry.
        let t2 = AccessToken::new("T2");
        let outcome = coordinator
            .refresh(Some(&t2), issuing(calls.clone(), Ok(AccessToken::new("T3"))))
            .await;
        assert_eq!(outcome, Ok(AccessToken::new("T3")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_cycle_is_not_reused() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let t1 = AccessToken::new("T1");

        let outcome = coordinator
            .refresh(
                Some(&t1),
                issuing(calls.clone(), Err(RefreshFailure::Rejected { status: 400 })),
            )
            .await;
        assert_eq!(outcome, Err(RefreshFailure::Rejected { status: 400 }));

        let outcome = coordinator
            .refresh(Some(&t1), issuing(calls.clone(), Ok(AccessToken::new("T2"))))
            .await;
        assert_eq!(outcome, Ok(AccessToken::new("T2")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reset_forgets_last_issued_token() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        coordinator
            .refresh(None, issuing(calls.clone(), Ok(AccessToken::new("T2"))))
            .await
            .unwrap();
        coordinator.reset();

        let login_token = AccessToken::new("L1");
        coordinator
            .refresh(
                Some(&login_token),
                issuing(calls.clone(), Ok(AccessToken::new("L2"))),
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cycle_settles_after_every_waiter_is_dropped() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let t1 = AccessToken::new("T1");

        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            coordinator.refresh(
                Some(&t1),
                issuing(calls.clone(), Err(RefreshFailure::Rejected { status: 400 })),
            ),
        )
        .await;
        assert!(abandoned.is_err());
        tokio::time::sleep(Duration::from_millis(60)).await;

        let outcome = coordinator
            .refresh(Some(&t1), issuing(calls.clone(), Ok(AccessToken::new("T2"))))
            .await;
        assert_eq!(outcome, Ok(AccessToken::new("T2")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reset_detaches_the_in_flight_cycle() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let t1 = AccessToken::new("T1");

        let first = coordinator.refresh(
            Some(&t1),
            issuing(calls.clone(), Err(RefreshFailure::Rejected { status: 400 })),
        );
        let second = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            coordinator.reset();
            coordinator
                .refresh(Some(&t1), issuing(calls.clone(), Ok(AccessToken::new("L2"))))
                .await
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first, Err(RefreshFailure::Rejected { status: 400 }));
        assert_eq!(second, Ok(AccessToken::new("L2")));
        assert_eq!(coordinator.cycles_started(), 2);
    }
}
