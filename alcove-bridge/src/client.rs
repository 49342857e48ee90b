// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use alcove_activity::{ActivityList, Amount};

use crate::error::Result;
use crate::protocol::RequestKind;
use crate::subscription::{subscribe, PushCallback, Subscription};
use crate::transport::{PushFn, Transport};

/// Current gas price levels on the active network.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPrices {
    pub slow: Amount,
    pub average: Amount,
    pub fast: Amount,
}

/// Fiat exchange rates keyed by currency symbol.
pub type ExchangeRates = HashMap<String, f64>;

/// Typed surface over the background process: one `get`/`subscribe` pair
/// per state domain, each independently loadable.
///
/// The full aggregated snapshot stays untyped (`serde_json::Value`); its
/// shape is owned by the background and consumed wholesale by the store.
#[derive(Clone)]
pub struct BackgroundClient {
    transport: Arc<Transport>,
}

impl BackgroundClient {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub async fn state(&self) -> Result<Value> {
        self.transport.send(RequestKind::GetState, None, None).await
    }

    pub async fn subscribe_state<F>(&self, on_update: F) -> Result<()>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.subscribe_kind(RequestKind::SubscribeState, on_update)
            .await
    }

    pub async fn gas_prices(&self) -> Result<GasPrices> {
        self.fetch(RequestKind::GetGasPrices).await
    }

    pub async fn subscribe_gas_prices<F>(&self, on_update: F) -> Result<()>
    where
        F: Fn(GasPrices) + Send + Sync + 'static,
    {
        self.subscribe_kind(RequestKind::SubscribeGasPrices, on_update)
            .await
    }

    pub async fn exchange_rates(&self) -> Result<ExchangeRates> {
        self.fetch(RequestKind::GetExchangeRates).await
    }

    pub async fn subscribe_exchange_rates<F>(&self, on_update: F) -> Result<()>
    where
        F: Fn(ExchangeRates) + Send + Sync + 'static,
    {
        self.subscribe_kind(RequestKind::SubscribeExchangeRates, on_update)
            .await
    }

    pub async fn activity_list(&self) -> Result<ActivityList> {
        self.fetch(RequestKind::GetActivityList).await
    }

    pub async fn subscribe_activity_list<F>(&self, on_update: F) -> Result<()>
    where
        F: Fn(ActivityList) + Send + Sync + 'static,
    {
        self.subscribe_kind(RequestKind::SubscribeActivityList, on_update)
            .await
    }

    /// Mounts the full-snapshot subscription.
    pub async fn state_feed(&self) -> Subscription<Value> {
        let fetch = self.clone();
        let push = self.clone();
        subscribe(
            Value::Null,
            move || async move { fetch.state().await },
            move |cb: PushCallback<Value>| async move { push.subscribe_state(cb).await },
        )
        .await
    }

    pub async fn gas_price_feed(&self) -> Subscription<GasPrices> {
        let fetch = self.clone();
        let push = self.clone();
        subscribe(
            GasPrices::default(),
            move || async move { fetch.gas_prices().await },
            move |cb: PushCallback<GasPrices>| async move { push.subscribe_gas_prices(cb).await },
        )
        .await
    }

    pub async fn exchange_rate_feed(&self) -> Subscription<ExchangeRates> {
        let fetch = self.clone();
        let push = self.clone();
        subscribe(
            ExchangeRates::default(),
            move || async move { fetch.exchange_rates().await },
            move |cb: PushCallback<ExchangeRates>| async move {
                push.subscribe_exchange_rates(cb).await
            },
        )
        .await
    }

    /// Mounts the raw activity-list subscription; callers reconcile each
    /// snapshot with [`alcove_activity::reconcile`] on render.
    pub async fn activity_feed(&self) -> Subscription<ActivityList> {
        let fetch = self.clone();
        let push = self.clone();
        subscribe(
            ActivityList::default(),
            move || async move { fetch.activity_list().await },
            move |cb: PushCallback<ActivityList>| async move {
                push.subscribe_activity_list(cb).await
            },
        )
        .await
    }

    async fn fetch<T: DeserializeOwned>(&self, kind: RequestKind) -> Result<T> {
        let value = self.transport.send(kind, None, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn subscribe_kind<T, F>(&self, kind: RequestKind, on_update: F) -> Result<()>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let push: PushFn = Arc::new(move |value: Value| {
            match serde_json::from_value::<T>(value) {
                Ok(update) => on_update(update),
                // Never let one malformed push poison the subscription.
                Err(e) => warn!(error = %e, kind = ?kind, "dropping malformed subscription update"),
            }
        });
        self.transport.send(kind, None, Some(push)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_prices_wire_shape() {
        let prices: GasPrices = serde_json::from_str(
            r#"{"slow":"0x3b9aca00","average":"0x77359400","fast":"0xb2d05e00"}"#,
        )
        .unwrap();
        assert_eq!(prices.slow, Amount(1_000_000_000));
        assert_eq!(prices.average, Amount(2_000_000_000));
        assert_eq!(prices.fast, Amount(3_000_000_000));
    }
}
