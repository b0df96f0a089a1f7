//! In-memory stand-ins for the relay and upstream APIs.

use super::publisher::{RelayTransport, TransportError};
use crate::entities::{CurrencyCode, FeedSpec, RateSnapshot};
use crate::sources::{FetchError, RateSource};
use async_trait::async_trait;
use ratepub_sdk::client::ClientError;
use ratepub_sdk::objects::SignedEvent;
use ratepub_sdk::signature::Keys;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;

pub(crate) fn test_keys() -> Keys {
    Keys::from_hex("0000000000000000000000000000000000000000000000000000000000000003").unwrap()
}

pub(crate) enum RelayBehaviour {
    AckAfter(Duration),
    Hang,
    Reject(String),
}

pub(crate) struct FakeRelay {
    behaviour: RelayBehaviour,
    sent: Mutex<Vec<SignedEvent>>,
    delivered: AtomicUsize,
    close_calls: AtomicUsize,
    closed: AtomicBool,
}

impl FakeRelay {
    pub(crate) fn new(behaviour: RelayBehaviour) -> Self {
        Self {
            behaviour,
            sent: Mutex::new(Vec::new()),
            delivered: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn acking() -> Self {
        Self::new(RelayBehaviour::AckAfter(Duration::from_millis(20)))
    }

    pub(crate) fn sent(&self) -> Vec<SignedEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn sent_ids(&self) -> Vec<String> {
        self.sent().into_iter().map(|e| e.id).collect()
    }

    pub(crate) fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayTransport for FakeRelay {
    async fn send(&self, event: &SignedEvent) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(event.clone());
        match &self.behaviour {
            RelayBehaviour::AckAfter(delay) => {
                tokio::time::sleep(*delay).await;
                self.delivered.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            RelayBehaviour::Hang => std::future::pending().await,
            RelayBehaviour::Reject(message) => {
                Err(ClientError::Rejected(message.clone()).into())
            }
        }
    }

    async fn close(&self) -> bool {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        !self.closed.swap(true, Ordering::SeqCst)
    }

    fn relay_url(&self) -> &str {
        "wss://relay.test"
    }
}

/// Names of feeds in the order their sources were asked to fetch.
pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) struct StaticSource {
    snapshot: RateSnapshot,
    calls: CallLog,
}

impl StaticSource {
    pub(crate) fn new(snapshot: RateSnapshot, calls: &CallLog) -> Self {
        Self {
            snapshot,
            calls: calls.clone(),
        }
    }
}

#[async_trait]
impl RateSource for StaticSource {
    async fn fetch(&self, feed: &FeedSpec) -> Result<RateSnapshot, FetchError> {
        self.calls.lock().unwrap().push(feed.name.clone());
        Ok(self.snapshot.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

pub(crate) struct FailingSource {
    calls: CallLog,
}

impl FailingSource {
    pub(crate) fn new(calls: &CallLog) -> Self {
        Self {
            calls: calls.clone(),
        }
    }
}

#[async_trait]
impl RateSource for FailingSource {
    async fn fetch(&self, feed: &FeedSpec) -> Result<RateSnapshot, FetchError> {
        self.calls.lock().unwrap().push(feed.name.clone());
        Err(FetchError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

fn rates(pairs: &[(&str, &str)]) -> BTreeMap<CurrencyCode, Decimal> {
    pairs
        .iter()
        .map(|(code, rate)| (CurrencyCode::from(*code), Decimal::from_str(rate).unwrap()))
        .collect()
}

pub(crate) fn fiat_snapshot() -> RateSnapshot {
    RateSnapshot::new(
        "USD",
        rates(&[
            ("CAD", "1.3711"),
            ("CNY", "7.2374"),
            ("EUR", "0.93545"),
            ("GBP", "0.79963"),
            ("JPY", "157.52"),
            ("MXN", "17.0425"),
        ]),
        OffsetDateTime::UNIX_EPOCH,
    )
}

pub(crate) fn btc_snapshot() -> RateSnapshot {
    RateSnapshot::new("BTC", rates(&[("USD", "67012.5")]), OffsetDateTime::UNIX_EPOCH)
}
