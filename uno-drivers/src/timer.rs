//! Millisecond bookkeeping for Timer0 in CTC mode
//!
//! Timer0 counts at `cpu / prescaler` and fires compare match A every
//! `OCR0A + 1` counts, the interrupt handler calls [`MillisCounter::tick`].

/// cs0 prescaler for the millisecond tick
pub const MILLIS_PRESCALER: u32 = 64;

/// OCR0A value giving `tick_hz` interrupts per second, `None` if it
/// doesn't fit the 8 bit compare register
pub fn compare_value(cpu_hz: u32, prescaler: u32, tick_hz: u32) -> Option<u8> {
    if prescaler == 0 || tick_hz == 0 {
        return None;
    }
    let counts = cpu_hz / prescaler / tick_hz;
    if counts == 0 || counts > 256 {
        None
    } else {
        Some((counts - 1) as u8)
    }
}

/// Wrapping millisecond count
pub struct MillisCounter(u32);

impl MillisCounter {
    pub const fn new() -> MillisCounter {
        MillisCounter(0)
    }

    pub fn tick(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    pub fn now(&self) -> u32 {
        self.0
    }
}

impl Default for MillisCounter {
    fn default() -> Self {
        MillisCounter::new()
    }
}

/// Milliseconds from `since` to `now`, correct across the wrap
pub fn elapsed(since: u32, now: u32) -> u32 {
    now.wrapping_sub(since)
}

/// Fires once per `period` milliseconds
pub struct Interval {
    period: u32,
    last: u32,
}

impl Interval {
    pub fn new(period: u32, now: u32) -> Interval {
        Interval { period, last: now }
    }

    /// true if the period has passed, the next period starts at the
    /// scheduled time so the interval does not drift
    pub fn poll(&mut self, now: u32) -> bool {
        if elapsed(self.last, now) >= self.period {
            self.last = self.last.wrapping_add(self.period);
            if elapsed(self.last, now) >= self.period {
                // fell behind by more than a period, skip the backlog
                self.last = now;
            }
            true
        } else {
            false
        }
    }

    /// restart the period at `now`
    pub fn reset(&mut self, now: u32) {
        self.last = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_compare_value_at_16mhz() {
        assert_eq!(compare_value(16_000_000, MILLIS_PRESCALER, 1000), Some(249));
        assert_eq!(compare_value(8_000_000, MILLIS_PRESCALER, 1000), Some(124));
        assert_eq!(compare_value(16_000_000, 8, 1000), None);
        assert_eq!(compare_value(16_000_000, 0, 1000), None);
    }

    #[test]
    fn counter_wraps() {
        let mut counter = MillisCounter(u32::max_value());
        let start = counter.now();
        counter.tick();
        counter.tick();
        assert_eq!(counter.now(), 1);
        assert_eq!(elapsed(start, counter.now()), 2);
    }

    #[test]
    fn interval_fires_once_per_period() {
        let mut interval = Interval::new(1000, 0);
        assert!(!interval.poll(999));
        assert!(interval.poll(1000));
        assert!(!interval.poll(1500));
        assert!(interval.poll(2003));
        assert!(!interval.poll(2999));
        assert!(interval.poll(3000));
    }

    #[test]
    fn interval_skips_backlog() {
        let mut interval = Interval::new(100, 0);
        assert!(interval.poll(1050));
        assert!(!interval.poll(1100));
        assert!(interval.poll(1150));
    }

    #[test]
    fn interval_across_wrap() {
        let start = u32::max_value() - 10;
        let mut interval = Interval::new(100, start);
        assert!(!interval.poll(start.wrapping_add(50)));
        assert!(interval.poll(start.wrapping_add(100)));
    }
}
