//! CadenceScheduler processor.
//!
//! The CadenceScheduler is responsible for:
//! - Validating that the registered cadences nest inside each other
//! - Sleeping until the next wall-clock boundary of the finest cadence
//! - Working out, from the wall clock on waking, which tick just arrived
//!   and which feeds are due on it
//! - Invoking the due feeds one after another, finest cadence first
//!
//! There is one timer for all feeds. Coarser feeds never get their own
//! timer; they are due on every k-th fine tick, where k is the ratio of
//! their cadence to the finest one. Ticks missed while the process was
//! suspended are not replayed.

use crate::entities::Cadence;
use crate::utils::alignment::{boundary_at, is_due, next_boundary, tick_index};
use crate::utils::clock::Clock;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const MINUTES_PER_HOUR: u32 = 60;

/// A wake-up further than this from the nearest boundary is not a tick.
const MAX_TICK_SKEW: time::Duration = time::Duration::minutes(1);

/// Errors in the set of registered cadences. Fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("no feeds registered")]
    NoFeeds,

    #[error("finest cadence {0} does not divide an hour evenly")]
    FinestNotHourDivisor(Cadence),

    #[error("feed {feed}: cadence {cadence} is not a multiple of the finest cadence {finest}")]
    NotMultipleOfFinest {
        feed: String,
        cadence: Cadence,
        finest: Cadence,
    },
}

/// One feed as the scheduler sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Caller's handle for the feed, passed back in [`TickHandler::on_tick`].
    pub feed: usize,
    pub name: String,
    pub cadence: Cadence,
}

/// A tick of the finest cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Boundary number, counted from the Unix epoch.
    pub index: i64,
    /// The boundary instant this tick stands for.
    pub scheduled_at: OffsetDateTime,
    /// When the scheduler actually woke.
    pub fired_at: OffsetDateTime,
}

/// Receives due feeds from the scheduler.
#[async_trait]
pub trait TickHandler: Send + Sync {
    /// Run one feed for `tick`. Failures stay inside the handler.
    async fn on_tick(&self, feed: usize, tick: Tick);
}

pub struct CadenceScheduler {
    /// Sorted finest cadence first, registration order within a cadence.
    registrations: Vec<Registration>,
    finest: Cadence,
    clock: Arc<dyn Clock>,
}

impl CadenceScheduler {
    /// Validate `registrations` and build a scheduler reading time from
    /// `clock`.
    pub fn new(
        mut registrations: Vec<Registration>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ScheduleError> {
        let finest = registrations
            .iter()
            .map(|r| r.cadence)
            .min()
            .ok_or(ScheduleError::NoFeeds)?;

        if MINUTES_PER_HOUR % finest.minutes() != 0 {
            return Err(ScheduleError::FinestNotHourDivisor(finest));
        }
        if let Some(r) = registrations
            .iter()
            .find(|r| r.cadence.minutes() % finest.minutes() != 0)
        {
            return Err(ScheduleError::NotMultipleOfFinest {
                feed: r.name.clone(),
                cadence: r.cadence,
                finest,
            });
        }

        registrations.sort_by_key(|r| r.cadence);

        Ok(Self {
            registrations,
            finest,
            clock,
        })
    }

    pub fn finest(&self) -> Cadence {
        self.finest
    }

    /// Feeds due on tick `index`, in invocation order.
    pub fn due_at(&self, index: i64) -> impl Iterator<Item = &Registration> {
        self.registrations
            .iter()
            .filter(move |r| is_due(index, r.cadence, self.finest))
    }

    /// The next boundary at or after `now` on which `feed` is due.
    pub fn next_run_of(&self, feed: usize, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let registration = self.registrations.iter().find(|r| r.feed == feed)?;
        Some(next_boundary(now, registration.cadence))
    }

    /// Run the scheduler until shutdown is signaled.
    ///
    /// Each iteration arms a single sleep for the next fine boundary
    /// strictly after the last fired tick, then on waking re-derives the
    /// tick from the wall clock. A boundary that has already been fired is
    /// never fired again, even if the clock was stepped backwards.
    ///
    /// Shutdown is observed while sleeping and between ticks. A tick that
    /// is already dispatching its feeds finishes first.
    pub async fn run<H>(&self, handler: &H, mut shutdown_rx: watch::Receiver<bool>)
    where
        H: TickHandler + ?Sized,
    {
        info!(
            finest = %self.finest,
            feeds = self.registrations.len(),
            "CadenceScheduler started"
        );

        let mut last_fired: Option<i64> = None;

        loop {
            if *shutdown_rx.borrow() {
                info!("CadenceScheduler received shutdown signal");
                break;
            }

            let now = self.clock.now();
            let mut target = next_boundary(now, self.finest);
            if let Some(last) = last_fired {
                target = target.max(boundary_at(last + 1, self.finest));
            }
            let delay = if target > now {
                (target - now).unsigned_abs()
            } else {
                std::time::Duration::ZERO
            };

            debug!(%now, next_tick = %target, ?delay, "Arming tick timer");

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("CadenceScheduler received shutdown signal");
                        break;
                    }
                    continue;
                }

                _ = tokio::time::sleep(delay) => {}
            }

            let fired_at = self.clock.now();
            let index = tick_index(fired_at, self.finest);
            let scheduled_at = boundary_at(index, self.finest);

            if last_fired.is_some_and(|last| index <= last) {
                debug!(index, %fired_at, "Tick already fired, re-arming");
                continue;
            }
            if (fired_at - scheduled_at).abs() > MAX_TICK_SKEW {
                warn!(
                    %fired_at,
                    expected = %target,
                    "Woke far from any boundary, skipping to the next one"
                );
                continue;
            }
            last_fired = Some(index);

            let tick = Tick {
                index,
                scheduled_at,
                fired_at,
            };
            debug!(index, %scheduled_at, "Tick");

            for registration in self.due_at(index) {
                handler.on_tick(registration.feed, tick).await;
            }
        }

        info!("CadenceScheduler shutdown complete");
    }
}
