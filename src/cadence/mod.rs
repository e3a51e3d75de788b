//! Scheduling cadence.
//!
//! Decides when a new scheduling cycle may start and how long the scheduling
//! loop sleeps afterwards. Wake-ups are anchored on the cycle start, so the
//! cadence does not drift with compute time; an overrunning cycle is followed
//! immediately by the next one instead of queuing a backlog.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CadenceState {
    /// Waiting for the next permitted cycle
    Idle,
    /// A cycle is in progress
    Scheduling,
}

/// True once at least `interval_ms` has passed since the last schedule.
///
/// A `last_ms` in the future means the wall clock stepped back; the cycle is
/// allowed and its schedule timestamp becomes the new marker.
pub fn should_start_cycle(now_ms: i64, last_ms: i64, interval_ms: i64) -> bool {
    now_ms < last_ms || now_ms - last_ms >= interval_ms
}

/// Time left until `cycle_start + interval`, or `None` if the cycle overran.
pub fn sleep_duration(cycle_start: Instant, now: Instant, interval: Duration) -> Option<Duration> {
    (cycle_start + interval)
        .checked_duration_since(now)
        .filter(|remaining| !remaining.is_zero())
}

/// Cadence controller state machine
#[derive(Clone, Debug)]
pub struct Cadence {
    interval: Duration,
    last_schedule: i64,
    state: CadenceState,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_schedule: 0,
            state: CadenceState::Idle,
        }
    }

    fn interval_ms(&self) -> i64 {
        i64::try_from(self.interval.as_millis()).unwrap_or(i64::MAX)
    }

    /// Timestamp of the last completed schedule (epoch ms, 0 before the first)
    pub fn last_schedule(&self) -> i64 {
        self.last_schedule
    }

    pub fn state(&self) -> CadenceState {
        self.state
    }

    /// Idle and the interval since the last schedule has elapsed
    pub fn ready(&self, now_ms: i64) -> bool {
        self.state == CadenceState::Idle
            && should_start_cycle(now_ms, self.last_schedule, self.interval_ms())
    }

    /// Idle → Scheduling
    pub fn begin(&mut self) {
        self.state = CadenceState::Scheduling;
    }

    /// Scheduling → Idle, recording the produced schedule's timestamp
    pub fn complete(&mut self, schedule_timestamp: i64) {
        self.last_schedule = schedule_timestamp;
        self.state = CadenceState::Idle;
    }

    /// Absolute wake-up target for a cycle that started at `cycle_start`
    pub fn next_wake(&self, cycle_start: Instant) -> Instant {
        cycle_start + self.interval
    }

    /// How long an idle loop should wait before asking again
    pub fn time_until_ready(&self, now_ms: i64) -> Duration {
        if now_ms < self.last_schedule {
            return Duration::ZERO;
        }
        let elapsed = now_ms - self.last_schedule;
        let remaining = self.interval_ms().saturating_sub(elapsed).max(1);
        Duration::from_millis(remaining as u64)
    }
}
