#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;

use alcove_activity::{
    reconcile, ActivityList, Amount, MetaType, NativeCurrency, TransactionMeta, TransactionParams,
    TransactionStatus,
};
use alcove_bridge::{
    BackgroundClient, Channel, Connector, GasPrices, RequestEnvelope, RequestKind,
    ResponseEnvelope, Transport,
};

/// In-process stand-in for the privileged background process: answers the
/// collaborator surface and can push fresh snapshots to live subscribers.
#[derive(Default)]
struct FakeBackground {
    gas: Mutex<GasPrices>,
    activity: Mutex<ActivityList>,
    gas_subs: Mutex<Vec<(String, mpsc::UnboundedSender<ResponseEnvelope>)>>,
    activity_subs: Mutex<Vec<(String, mpsc::UnboundedSender<ResponseEnvelope>)>>,
}

impl FakeBackground {
    fn push_gas(&self, prices: GasPrices) {
        *self.gas.lock() = prices.clone();
        let update = serde_json::to_value(prices).unwrap();
        for (id, tx) in self.gas_subs.lock().iter() {
            let _ = tx.send(ResponseEnvelope::push(id.clone(), update.clone()));
        }
    }

    fn push_activity(&self, snapshot: ActivityList) {
        *self.activity.lock() = snapshot.clone();
        let update = serde_json::to_value(snapshot).unwrap();
        for (id, tx) in self.activity_subs.lock().iter() {
            let _ = tx.send(ResponseEnvelope::push(id.clone(), update.clone()));
        }
    }

    fn handle(
        &self,
        request: RequestEnvelope,
        resp_tx: &mpsc::UnboundedSender<ResponseEnvelope>,
    ) {
        let response = match request.message {
            RequestKind::GetState => json!({"locked": false}),
            RequestKind::SubscribeState => json!(true),
            RequestKind::GetGasPrices => serde_json::to_value(self.gas.lock().clone()).unwrap(),
            RequestKind::SubscribeGasPrices => {
                self.gas_subs
                    .lock()
                    .push((request.id.clone(), resp_tx.clone()));
                json!(true)
            }
            RequestKind::GetExchangeRates => json!({"USD": 1.0}),
            RequestKind::SubscribeExchangeRates => json!(true),
            RequestKind::GetActivityList => {
                serde_json::to_value(self.activity.lock().clone()).unwrap()
            }
            RequestKind::SubscribeActivityList => {
                self.activity_subs
                    .lock()
                    .push((request.id.clone(), resp_tx.clone()));
                json!(true)
            }
        };
        let _ = resp_tx.send(ResponseEnvelope::ok(request.id, response));
    }
}

struct BackgroundConnector {
    state: Arc<FakeBackground>,
}

impl Connector for BackgroundConnector {
    fn connect(&self) -> alcove_bridge::Result<Channel> {
        let (req_tx, mut req_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();
        let background = Arc::clone(&self.state);
        tokio::spawn(async move {
            while let Some(request) = req_rx.recv().await {
                background.handle(request, &resp_tx);
            }
        });
        Ok(Channel {
            tx: req_tx,
            rx: resp_rx,
        })
    }
}

fn native() -> NativeCurrency {
    NativeCurrency {
        symbol: "ETH".into(),
        decimals: 18,
        logo: None,
    }
}

fn tx(id: &str, meta_type: MetaType, status: TransactionStatus) -> TransactionMeta {
    TransactionMeta {
        id: id.into(),
        status,
        meta_type,
        replaced_by: None,
        transaction_params: TransactionParams::default(),
        transfer_type: None,
        transaction_category: None,
    }
}

async fn connect_client(background: &Arc<FakeBackground>) -> BackgroundClient {
    let connector = BackgroundConnector {
        state: Arc::clone(background),
    };
    let transport = Arc::new(Transport::new(connector));
    transport.initialize().await.unwrap();
    BackgroundClient::new(transport)
}

#[tokio::test]
async fn test_activity_feed_reconciles_pushed_snapshots() {
    let background = Arc::new(FakeBackground::default());

    // Snapshot 1: a fee-bumped transfer still in flight, a queued transfer
    // behind it, one settled transfer.
    let mut original = tx(
        "orig",
        MetaType::RegularSpeedingUp,
        TransactionStatus::Submitted,
    );
    original.replaced_by = Some("bump".into());
    original.transaction_params.hash = Some("0xold".into());
    original.transaction_params.from = Some("0xaaa".into());
    original.transaction_params.nonce = Some(1);

    let mut bump = tx("bump", MetaType::SpeedUp, TransactionStatus::Submitted);
    bump.transaction_params.hash = Some("0xabc".into());

    let mut waiting = tx("waiting", MetaType::Regular, TransactionStatus::Submitted);
    waiting.transaction_params.from = Some("0xAAA".into());
    waiting.transaction_params.nonce = Some(2);

    let settled = tx("settled", MetaType::Regular, TransactionStatus::Confirmed);

    background.push_activity(ActivityList {
        pending: vec![original.clone(), bump.clone(), waiting.clone()],
        confirmed: vec![settled.clone()],
    });

    let client = connect_client(&background).await;
    let mut feed = client.activity_feed().await;

    let state = feed.current();
    assert!(!state.is_loading);
    assert!(state.error.is_none());

    let entries = reconcile(&state.state.pending, &state.state.confirmed, &native());
    let ids: Vec<&str> = entries.iter().map(|e| e.meta.id.as_str()).collect();
    assert_eq!(ids, vec!["orig", "waiting", "settled"]);
    assert_eq!(entries[0].hash(), Some("0xabc"), "bump hash is displayed");
    assert!(entries[1].queued, "nonce 2 waits behind nonce 1");

    // Snapshot 2: the bump confirmed; the background moved it to the
    // confirmed sequence.
    bump.status = TransactionStatus::Confirmed;
    background.push_activity(ActivityList {
        pending: vec![original, waiting],
        confirmed: vec![bump, settled],
    });

    assert!(feed.changed().await);
    let state = feed.current();
    let entries = reconcile(&state.state.pending, &state.state.confirmed, &native());
    let ids: Vec<&str> = entries.iter().map(|e| e.meta.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["waiting", "bump", "settled"],
        "the superseded original never coexists with its confirmed bump"
    );
    assert!(
        !entries[0].queued,
        "nonce 1 settled, nonce 2 is plain pending now"
    );
}

#[tokio::test]
async fn test_domain_feeds_load_independently() {
    let background = Arc::new(FakeBackground::default());
    background.push_gas(GasPrices {
        slow: Amount(1),
        average: Amount(2),
        fast: Amount(3),
    });

    let client = connect_client(&background).await;

    let gas = client.gas_price_feed().await;
    let rates = client.exchange_rate_feed().await;

    assert_eq!(gas.current().state.fast, Amount(3));
    assert_eq!(rates.current().state.get("USD"), Some(&1.0));
    assert!(!gas.current().is_loading);
    assert!(!rates.current().is_loading);
}

#[tokio::test]
async fn test_gas_feed_applies_pushes_in_order() {
    let background = Arc::new(FakeBackground::default());
    let client = connect_client(&background).await;

    let mut feed = client.gas_price_feed().await;
    assert_eq!(feed.current().state, GasPrices::default());

    for fast in 1..=3u128 {
        background.push_gas(GasPrices {
            slow: Amount(1),
            average: Amount(2),
            fast: Amount(fast),
        });
    }

    // Pushes apply in emission order; the watch collapses to the newest.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(feed.current().state.fast, Amount(3));
    assert!(feed.changed().await, "at least one change must be observed");
}

#[tokio::test]
async fn test_unsubscribed_feed_ignores_pushes() {
    let background = Arc::new(FakeBackground::default());
    let client = connect_client(&background).await;

    let feed = client.gas_price_feed().await;
    feed.unsubscribe();

    background.push_gas(GasPrices {
        slow: Amount(9),
        average: Amount(9),
        fast: Amount(9),
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(feed.current().state, GasPrices::default());
}
