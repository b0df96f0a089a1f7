//! Orchestrator.
//!
//! The Orchestrator is responsible for:
//! - Owning the feeds, the publisher and the scheduler for the process
//! - Running each feed's fetch, build and publish pipeline
//! - The cold start: one immediate run of every feed before scheduling
//! - Closing the relay connection exactly once on shutdown
//!
//! A feed failure is logged and dropped. It never affects another feed, a
//! later tick, or the scheduler.

use super::cadence_scheduler::{CadenceScheduler, Registration, ScheduleError, Tick, TickHandler};
use super::publisher::{PublishError, Publisher};
use crate::entities::FeedSpec;
use crate::events::{BuildError, SignedEvent, build_event};
use crate::sources::{FetchError, RateSource};
use crate::utils::clock::Clock;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// A feed and the upstream that serves it.
pub struct Feed {
    pub spec: FeedSpec,
    pub source: Box<dyn RateSource>,
}

impl Feed {
    pub fn new(spec: FeedSpec, source: Box<dyn RateSource>) -> Self {
        Self { spec, source }
    }
}

/// Why one run of one feed produced no event.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("no feed registered under index {0}")]
    UnknownFeed(usize),
}

/// Result of running every feed once.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub published: Vec<String>,
    pub failed: Vec<String>,
}

impl RunSummary {
    pub fn all_published(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Orchestrator {
    /// Sorted finest cadence first; indices are the scheduler's feed handles.
    feeds: Vec<Feed>,
    publisher: Publisher,
    scheduler: CadenceScheduler,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
}

impl Orchestrator {
    /// Create a new Orchestrator.
    ///
    /// Fails if the feeds' cadences cannot share one fine-grained timer.
    pub fn new(
        mut feeds: Vec<Feed>,
        publisher: Publisher,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ScheduleError> {
        feeds.sort_by_key(|feed| feed.spec.cadence);

        let registrations = feeds
            .iter()
            .enumerate()
            .map(|(index, feed)| Registration {
                feed: index,
                name: feed.spec.name.clone(),
                cadence: feed.spec.cadence,
            })
            .collect();
        let scheduler = CadenceScheduler::new(registrations, clock.clone())?;

        Ok(Self {
            feeds,
            publisher,
            scheduler,
            clock,
            closed: AtomicBool::new(false),
        })
    }

    pub fn scheduler(&self) -> &CadenceScheduler {
        &self.scheduler
    }

    /// Fetch, build and publish feed `index` once.
    pub async fn run_feed(&self, index: usize) -> Result<SignedEvent, FeedError> {
        let feed = self.feeds.get(index).ok_or(FeedError::UnknownFeed(index))?;

        let snapshot = feed.source.fetch(&feed.spec).await?;
        let event = build_event(&feed.spec, &snapshot, self.clock.now())?;
        Ok(self.publisher.publish(event).await?)
    }

    /// [`run_feed`](Self::run_feed), with the outcome logged instead of
    /// returned. Returns whether an event was published.
    pub async fn run_feed_logged(&self, index: usize) -> bool {
        let Some(feed) = self.feeds.get(index) else {
            error!(index, "No feed registered under this index");
            return false;
        };
        let name = feed.spec.name.as_str();

        info!(feed = name, source = feed.source.name(), "Starting rate update");
        match self.run_feed(index).await {
            Ok(event) => {
                info!(
                    feed = name,
                    event_id = %event.id,
                    d = %feed.spec.replaceable_tag,
                    "Rates published"
                );
                true
            }
            Err(e) => {
                error!(feed = name, error = %e, "Rate update failed");
                false
            }
        }
    }

    /// Run every feed once, finest cadence first.
    pub async fn run_once(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for (index, feed) in self.feeds.iter().enumerate() {
            if self.run_feed_logged(index).await {
                summary.published.push(feed.spec.name.clone());
            } else {
                summary.failed.push(feed.spec.name.clone());
            }
        }
        summary
    }

    /// The immediate run at startup. Does not touch the scheduler's tick
    /// bookkeeping.
    pub async fn cold_start(&self) -> RunSummary {
        info!(feeds = self.feeds.len(), "Running cold start");
        let summary = self.run_once().await;
        if !summary.all_published() {
            warn!(failed = ?summary.failed, "Cold start finished with failed feeds");
        }
        summary
    }

    /// Cold start, then schedule until shutdown is signaled, then close the
    /// relay connection.
    pub async fn run(&self, shutdown_rx: watch::Receiver<bool>) {
        info!(
            relay = %self.publisher.relay_url(),
            pubkey = %self.publisher.public_key_hex(),
            feeds = self.feeds.len(),
            "Orchestrator started"
        );
        if !*shutdown_rx.borrow() {
            self.cold_start().await;
            self.log_next_runs();
        }

        self.scheduler.run(self, shutdown_rx).await;
        self.shutdown().await;
    }

    /// Close the relay connection. Only the first call does anything.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.publisher.close().await;
        info!(relay = %self.publisher.relay_url(), "Relay connection closed");
    }

    fn log_next_runs(&self) {
        let now = self.clock.now();
        for (index, feed) in self.feeds.iter().enumerate() {
            if let Some(next) = self.scheduler.next_run_of(index, now) {
                let minutes = (next - now).whole_minutes();
                info!(
                    feed = %feed.spec.name,
                    cadence = %feed.spec.cadence,
                    next_run = %next,
                    "Next update in {minutes} minutes"
                );
            }
        }
    }
}

#[async_trait]
impl TickHandler for Orchestrator {
    async fn on_tick(&self, feed: usize, tick: Tick) {
        if let Some(f) = self.feeds.get(feed) {
            info!(feed = %f.spec.name, tick = %tick.scheduled_at, "Scheduled update");
        }
        self.run_feed_logged(feed).await;
    }
}
