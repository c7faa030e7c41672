//! Source of "current time" for timestamp checks
//!
//! Block validation never reads the wall clock directly so that timestamp
//! bounds are deterministic under test.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeSourceError {
    #[error("time source unavailable: {0}")]
    Unavailable(String),
}

/// Provider of network-adjusted time in Unix seconds
pub trait TimeSource: Send + Sync {
    fn adjusted_time(&self) -> Result<i64, TimeSourceError>;
}

/// Wall clock plus a fixed offset, e.g. the median peer offset
#[derive(Debug, Default)]
pub struct SystemTimeSource {
    offset_secs: AtomicI64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offset(&self, offset_secs: i64) {
        self.offset_secs.store(offset_secs, Ordering::Relaxed);
    }
}

impl TimeSource for SystemTimeSource {
    fn adjusted_time(&self) -> Result<i64, TimeSourceError> {
        Ok(Utc::now().timestamp() + self.offset_secs.load(Ordering::Relaxed))
    }
}

/// Manually driven clock
#[derive(Debug)]
pub struct FixedTimeSource {
    now: AtomicI64,
}

impl FixedTimeSource {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::Relaxed);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::Relaxed);
    }
}

impl TimeSource for FixedTimeSource {
    fn adjusted_time(&self) -> Result<i64, TimeSourceError> {
        Ok(self.now.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_time_source_is_manual() {
        let time = FixedTimeSource::new(100);
        assert_eq!(time.adjusted_time(), Ok(100));
        time.advance(5);
        assert_eq!(time.adjusted_time(), Ok(105));
        time.set(7);
        assert_eq!(time.adjusted_time(), Ok(7));
    }

    #[test]
    fn system_time_source_applies_offset() {
        let time = SystemTimeSource::new();
        let base = time.adjusted_time().unwrap();
        time.set_offset(3600);
        assert!(time.adjusted_time().unwrap() >= base + 3600);
    }
}
