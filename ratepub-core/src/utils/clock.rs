use time::OffsetDateTime;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// The real UTC clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A wall clock that advances with tokio's (pausable) timer, starting at a
/// chosen instant. Lets tests drive whole days of scheduling with
/// `start_paused = true`. [`step`](TokioClock::step) jumps the wall clock
/// without moving tokio's timer, like a suspend or an NTP correction.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct TokioClock {
    origin: OffsetDateTime,
    started: tokio::time::Instant,
    offset: std::sync::Mutex<time::Duration>,
}

#[cfg(test)]
impl TokioClock {
    pub(crate) fn starting_at(origin: OffsetDateTime) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
            offset: std::sync::Mutex::new(time::Duration::ZERO),
        }
    }

    pub(crate) fn step(&self, by: time::Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

#[cfg(test)]
impl Clock for TokioClock {
    fn now(&self) -> OffsetDateTime {
        let elapsed = tokio::time::Instant::now() - self.started;
        self.origin + elapsed + *self.offset.lock().unwrap()
    }
}
