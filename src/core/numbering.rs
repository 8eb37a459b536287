use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::error::FacturaError;
use super::types::DocumentNumber;

/// Authorized numbering range as granted by the numbering resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingConfig {
    /// Document prefix, e.g. "SETP".
    pub prefix: String,
    /// Resolution (authorization) number.
    pub authorization: String,
    /// First authorized number (inclusive).
    pub from: u64,
    /// Last authorized number (inclusive).
    pub to: u64,
}

/// Thread-safe issuer of document numbers from an authorized range.
///
/// Every call to [`next_number`](Self::next_number) hands out a distinct
/// number, also across threads. Exhausting the range is a hard failure:
/// the range never wraps and never reissues a number.
#[derive(Debug)]
pub struct NumberingRange {
    config: NumberingConfig,
    next: AtomicU64,
}

impl NumberingRange {
    /// Create a range starting at its lower bound.
    pub fn new(config: NumberingConfig) -> Result<Self, FacturaError> {
        let start = config.from;
        Self::starting_at(config, start)
    }

    /// Create a range continuing from a given number (e.g. after a restart).
    pub fn starting_at(config: NumberingConfig, next: u64) -> Result<Self, FacturaError> {
        if config.prefix.trim().is_empty() {
            return Err(FacturaError::Builder(
                "numbering prefix must not be empty".into(),
            ));
        }
        if config.from > config.to {
            return Err(FacturaError::Builder(format!(
                "numbering range lower bound {} exceeds upper bound {}",
                config.from, config.to
            )));
        }
        if config.to == u64::MAX {
            return Err(FacturaError::Builder(
                "numbering range upper bound out of range".into(),
            ));
        }
        if next < config.from {
            return Err(FacturaError::Builder(format!(
                "next number {next} lies below the authorized range starting at {}",
                config.from
            )));
        }
        Ok(Self {
            config,
            next: AtomicU64::new(next),
        })
    }

    pub fn config(&self) -> &NumberingConfig {
        &self.config
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    /// Consume the next number of the range.
    pub fn next_number(&self) -> Result<DocumentNumber, FacturaError> {
        let upper = self.config.to;
        let sequence = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n <= upper).then(|| n + 1)
            })
            .map_err(|_| FacturaError::NumberRangeExhausted {
                prefix: self.config.prefix.clone(),
                upper,
            })?;

        tracing::info!(prefix = %self.config.prefix, sequence, "document number assigned");
        Ok(DocumentNumber::new(self.config.prefix.clone(), sequence))
    }

    /// Preview the next number without consuming it.
    pub fn peek(&self) -> Option<DocumentNumber> {
        let n = self.next.load(Ordering::Acquire);
        (n <= self.config.to).then(|| DocumentNumber::new(self.config.prefix.clone(), n))
    }

    /// How many numbers are still available.
    pub fn remaining(&self) -> u64 {
        let n = self.next.load(Ordering::Acquire);
        if n > self.config.to {
            0
        } else {
            self.config.to - n + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(from: u64, to: u64) -> NumberingConfig {
        NumberingConfig {
            prefix: "SETP".into(),
            authorization: "18760000001".into(),
            from,
            to,
        }
    }

    #[test]
    fn sequential_numbering() {
        let range = NumberingRange::new(config(990000000, 995000000)).unwrap();
        assert_eq!(range.next_number().unwrap().to_string(), "SETP990000000");
        assert_eq!(range.next_number().unwrap().to_string(), "SETP990000001");
        assert_eq!(range.next_number().unwrap().to_string(), "SETP990000002");
    }

    #[test]
    fn peek_does_not_consume() {
        let range = NumberingRange::new(config(1, 10)).unwrap();
        assert_eq!(range.peek().unwrap().sequence, 1);
        assert_eq!(range.peek().unwrap().sequence, 1);
        assert_eq!(range.next_number().unwrap().sequence, 1);
        assert_eq!(range.peek().unwrap().sequence, 2);
    }

    #[test]
    fn starting_at() {
        let range = NumberingRange::starting_at(config(1, 100), 42).unwrap();
        assert_eq!(range.next_number().unwrap().sequence, 42);
        assert_eq!(range.remaining(), 58);
    }

    #[test]
    fn exhaustion_is_permanent() {
        let range = NumberingRange::new(config(5, 6)).unwrap();
        range.next_number().unwrap();
        range.next_number().unwrap();
        assert_eq!(range.remaining(), 0);
        assert!(range.peek().is_none());
        for _ in 0..3 {
            assert!(matches!(
                range.next_number(),
                Err(FacturaError::NumberRangeExhausted { upper: 6, .. })
            ));
        }
    }

    #[test]
    fn rejects_unbounded_upper_limit() {
        assert!(NumberingRange::new(config(0, u64::MAX)).is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(NumberingRange::new(config(10, 9)).is_err());
        assert!(NumberingRange::starting_at(config(10, 20), 9).is_err());
    }
}
