//! Calendar source for day partitioning

use chrono::{Days, Local, NaiveDate};
use parking_lot::Mutex;

/// Supplies "today" in the store's local day boundary
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock, local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Hand-driven clock for tests and replays
#[derive(Debug)]
pub struct ManualClock {
    day: Mutex<NaiveDate>,
}

impl ManualClock {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day: Mutex::new(day),
        }
    }

    pub fn set(&self, day: NaiveDate) {
        *self.day.lock() = day;
    }

    /// Move forward by `days`; saturates at the end of the calendar
    pub fn advance_days(&self, days: u64) {
        let mut day = self.day.lock();
        if let Some(next) = day.checked_add_days(Days::new(days)) {
            *day = next;
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.day.lock()
    }
}
