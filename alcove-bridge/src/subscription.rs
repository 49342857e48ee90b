// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::error::Result;

/// Managed state for one logical piece of background state.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionState<T> {
    pub state: T,
    pub is_loading: bool,
    /// Set when the initial fetch or the push registration failed; the
    /// last known `state` is left in place.
    pub error: Option<String>,
}

/// Callback handed to a push registrar; invoked with every subsequent
/// update for the subscribed domain.
pub type PushCallback<T> = Box<dyn Fn(T) + Send + Sync>;

/// Handle to one mounted state subscription.
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe))
/// cancels it: pushes delivered afterwards are ignored, so a torn-down
/// consumer can never observe a stale update.
pub struct Subscription<T> {
    rx: watch::Receiver<SubscriptionState<T>>,
    active: Arc<AtomicBool>,
}

impl<T: Clone> Subscription<T> {
    /// The current state snapshot.
    pub fn current(&self) -> SubscriptionState<T> {
        self.rx.borrow().clone()
    }

    /// Waits for the next state change. Returns `false` once no further
    /// changes can arrive.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// A watch receiver for consumers that integrate with `select!` loops.
    pub fn watch(&self) -> watch::Receiver<SubscriptionState<T>> {
        self.rx.clone()
    }

    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Mounts one state subscription: publishes `initial` with `is_loading`
/// set, awaits the one-shot getter, then registers the push callback that
/// replaces the state wholesale on every update.
///
/// Each call creates exactly one background-side subscription; the returned
/// handle is the single-subscription-per-consumer guard. A failed initial
/// fetch surfaces in [`SubscriptionState::error`] instead of propagating.
pub async fn subscribe<T, G, GFut, S, SFut>(
    initial: T,
    get_initial: G,
    register_push: S,
) -> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
    G: FnOnce() -> GFut,
    GFut: Future<Output = Result<T>>,
    S: FnOnce(PushCallback<T>) -> SFut,
    SFut: Future<Output = Result<()>>,
{
    let (tx, rx) = mount(initial, get_initial).await;
    let active = Arc::new(AtomicBool::new(true));

    let push_tx = Arc::clone(&tx);
    let push_active = Arc::clone(&active);
    let callback: PushCallback<T> = Box::new(move |update| {
        if !push_active.load(Ordering::SeqCst) {
            return;
        }
        push_tx.send_modify(|current| {
            *current = SubscriptionState {
                state: update,
                is_loading: false,
                error: None,
            };
        });
    });
    if let Err(e) = register_push(callback).await {
        warn!(error = %e, "push subscription failed; state will not refresh");
        tx.send_modify(|current| current.error = Some(e.to_string()));
    }

    Subscription { rx, active }
}

/// One-shot variant: fetches once and never refreshes.
pub async fn subscribe_once<T, G, GFut>(initial: T, get_initial: G) -> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
    G: FnOnce() -> GFut,
    GFut: Future<Output = Result<T>>,
{
    let (_tx, rx) = mount(initial, get_initial).await;
    Subscription {
        rx,
        active: Arc::new(AtomicBool::new(true)),
    }
}

async fn mount<T, G, GFut>(
    initial: T,
    get_initial: G,
) -> (Arc<watch::Sender<SubscriptionState<T>>>, watch::Receiver<SubscriptionState<T>>)
where
    T: Clone + Send + Sync + 'static,
    G: FnOnce() -> GFut,
    GFut: Future<Output = Result<T>>,
{
    let (tx, _loading) = watch::channel(SubscriptionState {
        state: initial,
        is_loading: true,
        error: None,
    });
    let tx = Arc::new(tx);

    match get_initial().await {
        Ok(state) => tx.send_modify(|current| {
            *current = SubscriptionState {
                state,
                is_loading: false,
                error: None,
            };
        }),
        Err(e) => {
            warn!(error = %e, "initial state fetch failed");
            tx.send_modify(|current| {
                current.is_loading = false;
                current.error = Some(e.to_string());
            });
        }
    }

    // Subscribe after the initial fetch so `changed` only wakes for pushes.
    let rx = tx.subscribe();
    (tx, rx)
}
