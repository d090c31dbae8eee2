//! Simulated time of day.

use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::ClockError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    now: NaiveTime,
    step_secs: i64,
    end_time: Option<NaiveTime>,
}

impl Clock {
    pub fn new(start: NaiveTime, step_secs: i64) -> Self {
        Self {
            now: start,
            step_secs,
            end_time: None,
        }
    }

    pub fn with_end_time(mut self, end: Option<NaiveTime>) -> Self {
        self.end_time = end;
        self
    }

    pub fn now(&self) -> NaiveTime {
        self.now
    }

    pub fn step(&self) -> TimeDelta {
        TimeDelta::seconds(self.step_secs)
    }

    pub fn step_secs(&self) -> i64 {
        self.step_secs
    }

    pub fn set_step_secs(&mut self, step_secs: i64) {
        self.step_secs = step_secs;
    }

    /// End of the window `[now, now + step)`; `None` if it crosses midnight.
    pub fn window_end(&self) -> Option<NaiveTime> {
        let (end, wrapped) = self.now.overflowing_add_signed(self.step());
        (wrapped == 0).then_some(end)
    }

    /// Advance by one step. Crossing midnight or the configured end time
    /// ends the day and leaves the clock where it was.
    pub fn tick(&mut self) -> Result<NaiveTime, ClockError> {
        let (next, wrapped) = self.now.overflowing_add_signed(self.step());
        if wrapped != 0 || self.end_time.is_some_and(|end| next > end) {
            return Err(ClockError::EndOfDay(self.now));
        }
        self.now = next;
        Ok(next)
    }
}
