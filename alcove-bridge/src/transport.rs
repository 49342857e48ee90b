// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::{BridgeError, Result, WireError};
use crate::protocol::{self, RequestEnvelope, RequestKind, ResponseEnvelope, CLOSE_WINDOW_SIGNAL};

/// Error-text fragment the background emits when the underlying port has
/// gone away.
pub const DISCONNECTED_PORT_PATTERN: &str = "disconnected port";

/// Callback invoked for every push update delivered to a live subscription.
pub type PushFn = Arc<dyn Fn(Value) + Send + Sync>;

/// One freshly-opened duplex channel to the background process.
pub struct Channel {
    pub tx: mpsc::UnboundedSender<RequestEnvelope>,
    pub rx: mpsc::UnboundedReceiver<ResponseEnvelope>,
}

/// Opens channels to the background process. The host shell supplies the
/// real implementation; tests use in-process fakes.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> Result<Channel>;

    /// Readiness probe polled by [`Transport::initialize`] before the first
    /// open.
    fn is_ready(&self) -> bool {
        true
    }
}

impl<C: Connector + ?Sized> Connector for Arc<C> {
    fn connect(&self) -> Result<Channel> {
        (**self).connect()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Out-of-band instruction from the background process, delivered on a
/// reserved response id instead of a correlation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    CloseWindow,
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub ready_poll_interval: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_attempts: u32,
    pub disconnect_patterns: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ready_poll_interval: Duration::from_millis(100),
            reconnect_base_delay: Duration::from_millis(200),
            reconnect_max_attempts: 5,
            disconnect_patterns: vec![DISCONNECTED_PORT_PATTERN.to_string()],
        }
    }
}

impl TransportConfig {
    pub fn with_ready_poll_interval(mut self, interval: Duration) -> Self {
        self.ready_poll_interval = interval;
        self
    }

    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    pub fn with_reconnect_max_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_max_attempts = attempts;
        self
    }

    pub fn with_disconnect_pattern(mut self, pattern: &str) -> Self {
        self.disconnect_patterns.push(pattern.to_string());
        self
    }

    fn matches_disconnect(&self, message: &str) -> bool {
        self.disconnect_patterns
            .iter()
            .any(|pattern| message.contains(pattern))
    }
}

/// One outstanding request. `resolve` settles the caller's future exactly
/// once; entries with `on_push` stay registered for the channel's lifetime.
struct PendingCorrelation {
    resolve: Option<oneshot::Sender<Result<Value>>>,
    on_push: Option<PushFn>,
}

struct Inner {
    connector: Box<dyn Connector>,
    config: TransportConfig,
    pending: Mutex<HashMap<String, PendingCorrelation>>,
    sender: Mutex<Option<mpsc::UnboundedSender<RequestEnvelope>>>,
    connected: AtomicBool,
    reconnecting: AtomicBool,
    /// Channel generation; bumped on every teardown and open so a
    /// superseded reader can never route stale responses.
    epoch: AtomicU64,
    call_counter: AtomicU64,
    control_tx: broadcast::Sender<ControlSignal>,
}

/// The single owned channel to the privileged background process.
///
/// Owns the correlation map and the connected/reconnecting flags; the
/// process entry point constructs one `Transport` and hands out an
/// `Arc<Transport>` to everything that talks to the background.
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    pub fn new<C: Connector>(connector: C) -> Self {
        Self::with_config(connector, TransportConfig::default())
    }

    pub fn with_config<C: Connector>(connector: C, config: TransportConfig) -> Self {
        let (control_tx, _) = broadcast::channel(8);
        Self {
            inner: Arc::new(Inner {
                connector: Box::new(connector),
                config,
                pending: Mutex::new(HashMap::new()),
                sender: Mutex::new(None),
                connected: AtomicBool::new(false),
                reconnecting: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                call_counter: AtomicU64::new(0),
                control_tx,
            }),
        }
    }

    /// Polls the connector's readiness probe at the configured interval,
    /// then opens the channel exactly once.
    pub async fn initialize(&self) -> Result<()> {
        while !self.inner.connector.is_ready() {
            tokio::time::sleep(self.inner.config.ready_poll_interval).await;
        }
        self.open()
    }

    /// Establishes the channel and starts routing responses. A no-op when
    /// already connected or while a reconnect is in flight.
    pub fn open(&self) -> Result<()> {
        if self.inner.reconnecting.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.inner.connected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match open_channel(&self.inner) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.inner.connected.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Tears the channel down; outstanding requests fail with
    /// [`BridgeError::Disconnected`].
    pub fn close(&self) {
        teardown(&self.inner, false);
    }

    /// Tears the channel down and recreates it with capped backoff.
    /// Concurrent triggers share a single in-flight attempt.
    pub fn reconnect(&self) {
        spawn_reconnect(&self.inner);
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn control_signals(&self) -> broadcast::Receiver<ControlSignal> {
        self.inner.control_tx.subscribe()
    }

    /// Sends one request. Without `on_push` the returned future settles
    /// exactly once. With `on_push` it settles once with the subscription
    /// acknowledgment, after which `on_push` fires for every subsequent
    /// push until the channel is torn down.
    pub async fn send(
        &self,
        message: RequestKind,
        payload: Option<Value>,
        on_push: Option<PushFn>,
    ) -> Result<Value> {
        let inner = &self.inner;
        let id = protocol::request_id(inner.call_counter.fetch_add(1, Ordering::Relaxed));
        let (resolve_tx, resolve_rx) = oneshot::channel();
        inner.pending.lock().insert(
            id.clone(),
            PendingCorrelation {
                resolve: Some(resolve_tx),
                on_push,
            },
        );

        let envelope = RequestEnvelope {
            id: id.clone(),
            message,
            request: payload.unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        };
        let delivered = inner
            .sender
            .lock()
            .as_ref()
            .is_some_and(|sender| sender.send(envelope).is_ok());
        if !delivered {
            inner.pending.lock().remove(&id);
            return Err(BridgeError::NotConnected);
        }

        match resolve_rx.await {
            Ok(outcome) => outcome,
            // The correlation map died with its channel before a response
            // arrived.
            Err(_) => Err(BridgeError::Reconnecting),
        }
    }
}

fn open_channel(inner: &Arc<Inner>) -> Result<()> {
    let channel = inner.connector.connect()?;
    let epoch = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
    *inner.sender.lock() = Some(channel.tx);

    let reader = Arc::clone(inner);
    let mut rx = channel.rx;
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            if reader.epoch.load(Ordering::SeqCst) != epoch {
                break;
            }
            route(&reader, envelope);
        }
        debug!(epoch, "channel reader stopped");
    });
    Ok(())
}

fn route(inner: &Arc<Inner>, envelope: ResponseEnvelope) {
    if let Some(raw) = envelope.error.as_deref() {
        let entry = inner.pending.lock().remove(&envelope.id);
        let Some(mut entry) = entry else {
            debug!(id = %envelope.id, "dropping unroutable error response");
            return;
        };
        let err = WireError::decode(raw);
        if inner.config.matches_disconnect(&err.message) {
            warn!(reason = %err.message, "channel disconnection detected, recreating");
            if let Some(resolve) = entry.resolve.take() {
                let _ = resolve.send(Err(BridgeError::Reconnecting));
            }
            spawn_reconnect(inner);
        } else if let Some(resolve) = entry.resolve.take() {
            let _ = resolve.send(Err(err.into_error()));
        }
        return;
    }

    let mut pending = inner.pending.lock();
    match pending.get_mut(&envelope.id) {
        None => {
            drop(pending);
            if envelope.id == CLOSE_WINDOW_SIGNAL {
                let _ = inner.control_tx.send(ControlSignal::CloseWindow);
            } else {
                debug!(id = %envelope.id, "dropping unroutable response");
            }
        }
        Some(entry) => {
            if let (Some(push), Some(update)) = (entry.on_push.clone(), envelope.subscription) {
                // Live subscription update; the correlation stays registered.
                drop(pending);
                push(update);
                return;
            }
            // One-shot response, or a subscription acknowledgment (which
            // resolves the original future once without unregistering).
            if let Some(resolve) = entry.resolve.take() {
                let _ = resolve.send(Ok(envelope.response.unwrap_or(Value::Null)));
            }
            if entry.on_push.is_none() {
                pending.remove(&envelope.id);
            }
        }
    }
}

fn spawn_reconnect(inner: &Arc<Inner>) {
    if inner
        .reconnecting
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        // An attempt is already in flight; concurrent failures share it.
        return;
    }
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        reconnect_loop(&inner).await;
        inner.reconnecting.store(false, Ordering::SeqCst);
    });
}

async fn reconnect_loop(inner: &Arc<Inner>) {
    teardown(inner, true);
    let mut attempt: u32 = 0;
    loop {
        match open_channel(inner) {
            Ok(()) => {
                inner.connected.store(true, Ordering::SeqCst);
                info!(attempt, "channel recreated");
                return;
            }
            Err(e) if attempt < inner.config.reconnect_max_attempts => {
                let delay = inner
                    .config
                    .reconnect_base_delay
                    .saturating_mul(1u32 << attempt.min(10));
                warn!(
                    error = %e,
                    attempt,
                    "channel reopen failed, retrying in {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(error = %e, "giving up on channel recovery after {attempt} attempts");
                return;
            }
        }
    }
}

fn teardown(inner: &Arc<Inner>, reconnecting: bool) {
    inner.connected.store(false, Ordering::SeqCst);
    *inner.sender.lock() = None;
    // Stop the superseded reader before draining; stale responses must
    // never route into the next channel's correlation map.
    inner.epoch.fetch_add(1, Ordering::SeqCst);

    // The correlation map lives and dies with its channel. Push
    // subscriptions are not resurrected; one-shots fail as retryable.
    let drained: Vec<PendingCorrelation> = {
        let mut pending = inner.pending.lock();
        pending.drain().map(|(_, entry)| entry).collect()
    };
    for mut entry in drained {
        if let Some(resolve) = entry.resolve.take() {
            let _ = resolve.send(Err(if reconnecting {
                BridgeError::Reconnecting
            } else {
                BridgeError::Disconnected
            }));
        }
    }
}
