//! Splits staked amounts into a locally kept share and a share sent to the dealer.
//!
//! Each (number, pattern) pair owns a bucket that fills up to the pattern's
//! ceiling from the cut config. Amounts are applied in recorded order and the
//! bucket is never drained, so earlier stakes fill the ceiling first.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::error;

use crate::error::{PoolError, Result};
use crate::types::{
    AmountDetail, Allocation, CutConfig, Entry, NewEntry, Pattern, Stake, checked_add,
};

pub struct Allocator {
    limits: CutConfig,
    retained: HashMap<(String, Pattern), Decimal>,
}

impl Allocator {
    pub fn new(limits: CutConfig) -> Self {
        Self {
            limits,
            retained: HashMap::new(),
        }
    }

    /// Allocator whose buckets already hold the kept amounts of `history`.
    pub fn with_history(limits: CutConfig, history: &[Entry]) -> Result<Self> {
        let mut allocator = Self::new(limits);
        allocator.seed(history)?;
        Ok(allocator)
    }

    pub fn seed(&mut self, history: &[Entry]) -> Result<()> {
        for entry in history {
            for (pattern, amount) in entry.wager.legs() {
                let bucket = self
                    .retained
                    .entry((entry.number.clone(), pattern))
                    .or_insert(Decimal::ZERO);
                *bucket = checked_add(*bucket, amount.kept)?;
                if bucket.is_sign_negative() && !bucket.is_zero() {
                    return Err(invariant(format!(
                        "negative retained total for {} {}",
                        entry.number, pattern
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn retained(&self, number: &str, pattern: Pattern) -> Decimal {
        self.retained
            .get(&(number.to_string(), pattern))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn allocate_leg(
        &mut self,
        number: &str,
        pattern: Pattern,
        stake: Decimal,
    ) -> Result<AmountDetail> {
        if stake.is_sign_negative() && !stake.is_zero() {
            return Err(PoolError::validation(format!(
                "negative stake {} on {} {}",
                stake, number, pattern
            )));
        }

        let ceiling = self.limits.ceiling(pattern).max(Decimal::ZERO);
        let bucket = self
            .retained
            .entry((number.to_string(), pattern))
            .or_insert(Decimal::ZERO);

        let room = (ceiling - *bucket).max(Decimal::ZERO);
        let kept = room.min(stake);
        let sent = stake - kept;
        *bucket += kept;

        if *bucket > ceiling && !kept.is_zero() {
            return Err(invariant(format!(
                "retained {} exceeds ceiling {} for {} {}",
                bucket, ceiling, number, pattern
            )));
        }
        AmountDetail::new(stake, kept, sent).inspect_err(|e| error!("{}", e))
    }

    pub fn allocate_stake(&mut self, number: &str, stake: &Stake) -> Result<Allocation> {
        stake
            .clone()
            .try_map(|pattern, amount| self.allocate_leg(number, pattern, amount))
    }
}

fn invariant(message: String) -> PoolError {
    error!("allocation invariant violated: {}", message);
    PoolError::ComputationInvariant(message)
}

/// Allocates `entries` in the given order against empty buckets.
pub fn allocate(entries: &[NewEntry], limits: &CutConfig) -> Result<Vec<Allocation>> {
    let mut allocator = Allocator::new(*limits);
    entries
        .iter()
        .map(|entry| allocator.allocate_stake(&entry.number, &entry.stake))
        .collect()
}
