// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Alcove Bridge - the wallet UI's side of the background-process channel
//!
//! This crate provides the client-side synchronization core of the Alcove
//! browser-extension wallet:
//! - One owned duplex channel to the privileged background process, with
//!   request/response correlation, disconnection detection and single-flight
//!   channel recreation
//! - A typed dispatcher over the background's collaborator surface, one
//!   get/subscribe pair per state domain
//! - Push subscriptions published through `watch` channels, with explicit
//!   loading and error state and cancellation on teardown
//! - The popup's immutable site-session context
//!
//! Signing, storage and rendering are owned elsewhere; nothing in this crate
//! touches key material.

#![forbid(unsafe_code)]

pub mod client;
pub mod error;
pub mod protocol;
pub mod session;
pub mod subscription;
pub mod transport;

pub use client::{BackgroundClient, ExchangeRates, GasPrices};
pub use error::{BridgeError, Result, WireError};
pub use protocol::{RequestEnvelope, RequestKind, ResponseEnvelope, CLOSE_WINDOW_SIGNAL};
pub use session::{Session, TabInfo, TabProvider};
pub use subscription::{subscribe, subscribe_once, PushCallback, Subscription, SubscriptionState};
pub use transport::{
    Channel, Connector, ControlSignal, PushFn, Transport, TransportConfig,
    DISCONNECTED_PORT_PATTERN,
};
