//! Matches recorded entries against an official draw and prices the winners.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{
    AmountDetail, DrawResult, Entry, MatchedLeg, Payout, Pattern, WinnerItem, checked_mul,
};

fn sorted_digits(number: &str) -> Vec<u8> {
    let mut digits = number.as_bytes().to_vec();
    digits.sort_unstable();
    digits
}

/// True when `a` and `b` hold the same digits in any order.
pub fn is_permutation(a: &str, b: &str) -> bool {
    a.len() == b.len() && sorted_digits(a) == sorted_digits(b)
}

/// Whether `number` wins on `pattern` for this draw.
pub fn matches(draw: &DrawResult, number: &str, pattern: Pattern) -> bool {
    let data = &draw.data;
    match pattern {
        Pattern::ThreeDigitTop => number == draw.first_prize_tail(3),
        Pattern::ThreeDigitTod => data
            .three_digit_front
            .iter()
            .chain(&data.three_digit_back)
            .any(|round| is_permutation(number, &round.value)),
        Pattern::ThreeDigitBottom => data.three_digit_back.iter().any(|r| r.value == number),
        Pattern::TwoDigitTop => number == draw.first_prize_tail(2),
        Pattern::TwoDigitBottom => number == data.last_two_digits,
    }
}

pub fn payout(pattern: Pattern, amount: &AmountDetail) -> Result<Payout> {
    let rate = pattern.rate();
    Ok(Payout {
        kept: checked_mul(amount.kept, rate)?,
        sent: checked_mul(amount.sent, rate)?,
    })
}

/// Winners grouped by (buyer, number). Legs of several entries for the same
/// pair and pattern are summed before pricing.
pub fn match_winners(entries: &[Entry], draw: &DrawResult) -> Result<Vec<WinnerItem>> {
    draw.validate()?;

    let mut grouped: BTreeMap<(i64, String), (String, BTreeMap<Pattern, AmountDetail>)> =
        BTreeMap::new();

    for entry in entries {
        for (pattern, amount) in entry.wager.legs() {
            if !matches(draw, &entry.number, pattern) {
                continue;
            }
            debug!(
                "entry {} number {} matched {}",
                entry.id, entry.number, pattern
            );
            let (_, legs) = grouped
                .entry((entry.buyer_id, entry.number.clone()))
                .or_insert_with(|| (entry.buyer_name.clone(), BTreeMap::new()));
            let slot = legs.entry(pattern).or_default();
            *slot = slot.checked_add(amount)?;
        }
    }

    grouped
        .into_iter()
        .map(|((buyer_id, number), (buyer_name, legs))| {
            let matched = legs
                .into_iter()
                .map(|(pattern, amount)| {
                    Ok(MatchedLeg {
                        pattern,
                        label: pattern.label(),
                        amount,
                        rate: pattern.rate(),
                        payout: payout(pattern, &amount)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(WinnerItem {
                buyer_id,
                buyer_name,
                number,
                matched,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementTotals {
    /// Stakes the operator kept and therefore collected.
    pub kept_stakes: Decimal,
    /// Payout owed by the operator on kept shares.
    pub operator_payout: Decimal,
    /// Payout owed by the dealer on sent shares.
    pub dealer_payout: Decimal,
    pub operator_net: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub draw: DrawResult,
    pub winners: Vec<WinnerItem>,
    pub totals: SettlementTotals,
}

pub fn settle(entries: &[Entry], draw: &DrawResult) -> Result<Settlement> {
    let winners = match_winners(entries, draw)?;
    let totals = crate::reports::settlement_totals(entries, &winners)?;
    info!(
        "settled draw {}: {} winners, operator payout {}, dealer payout {}",
        draw.date.key(),
        winners.len(),
        totals.operator_payout,
        totals.dealer_payout
    );
    Ok(Settlement {
        draw: draw.clone(),
        winners,
        totals,
    })
}
