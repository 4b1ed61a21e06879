//! Summaries over entries and winners. Every report page sums through here.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{PoolError, Result};
use crate::settlement::SettlementTotals;
use crate::types::{AmountDetail, Entry, NumberLength, Pattern, Source, WinnerItem, checked_add};

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub entry_count: usize,
    pub by_pattern: BTreeMap<Pattern, AmountDetail>,
    pub grand_total: AmountDetail,
}

impl Summary {
    pub fn pattern(&self, pattern: Pattern) -> AmountDetail {
        self.by_pattern.get(&pattern).copied().unwrap_or_default()
    }

    /// Sum for one accounting side across all patterns.
    pub fn source_total(&self, source: Source) -> Decimal {
        self.grand_total.for_source(source)
    }
}

pub fn summarize<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Result<Summary> {
    let mut summary = Summary::default();
    for entry in entries {
        summary.entry_count += 1;
        for (pattern, amount) in entry.wager.legs() {
            let slot = summary.by_pattern.entry(pattern).or_default();
            *slot = slot.checked_add(amount)?;
        }
    }
    summary.grand_total = AmountDetail::checked_sum(summary.by_pattern.values())?;
    Ok(summary)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerSummary {
    pub buyer_id: i64,
    pub buyer_name: String,
    pub summary: Summary,
}

pub fn summarize_by_buyer(entries: &[Entry]) -> Result<Vec<BuyerSummary>> {
    let mut by_buyer: BTreeMap<i64, (String, Vec<&Entry>)> = BTreeMap::new();
    for entry in entries {
        by_buyer
            .entry(entry.buyer_id)
            .or_insert_with(|| (entry.buyer_name.clone(), Vec::new()))
            .1
            .push(entry);
    }
    by_buyer
        .into_iter()
        .map(|(buyer_id, (buyer_name, entries))| {
            Ok(BuyerSummary {
                buyer_id,
                buyer_name,
                summary: summarize(entries)?,
            })
        })
        .collect()
}

/// Two-digit and three-digit summary pages look at one digit class each.
pub fn summarize_length(entries: &[Entry], length: NumberLength) -> Result<Summary> {
    summarize(entries.iter().filter(|e| e.wager.length() == length))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRow {
    pub entry_id: i64,
    pub buyer_name: String,
    pub number: String,
    pub amounts: BTreeMap<Pattern, Decimal>,
    pub created_at_thai: String,
}

/// One accounting side of every entry: kept amounts for `self`, sent for `dealer`.
/// Entries with nothing on that side are left out.
pub fn source_view(entries: &[Entry], source: Source) -> Vec<SourceRow> {
    entries
        .iter()
        .filter_map(|entry| {
            let amounts: BTreeMap<Pattern, Decimal> = entry
                .wager
                .legs()
                .into_iter()
                .map(|(pattern, amount)| (pattern, amount.for_source(source)))
                .filter(|(_, value)| !value.is_zero())
                .collect();
            (!amounts.is_empty()).then(|| SourceRow {
                entry_id: entry.id,
                buyer_name: entry.buyer_name.clone(),
                number: entry.number.clone(),
                amounts,
                created_at_thai: entry.created_at_thai.clone(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealerSheetRow {
    pub number: String,
    pub sent: BTreeMap<Pattern, Decimal>,
    pub total: Decimal,
}

/// What goes to the dealer, one row per number, optionally for a single digit class.
pub fn dealer_sheet(
    entries: &[Entry],
    length: Option<NumberLength>,
) -> Result<Vec<DealerSheetRow>> {
    let mut rows: BTreeMap<String, BTreeMap<Pattern, Decimal>> = BTreeMap::new();
    for entry in entries {
        if length.is_some_and(|l| entry.wager.length() != l) {
            continue;
        }
        for (pattern, amount) in entry.wager.legs() {
            if amount.sent.is_zero() {
                continue;
            }
            let slot = rows
                .entry(entry.number.clone())
                .or_default()
                .entry(pattern)
                .or_default();
            *slot = checked_add(*slot, amount.sent)?;
        }
    }
    rows.into_iter()
        .map(|(number, sent)| {
            let total = sent
                .values()
                .try_fold(Decimal::ZERO, |acc, value| checked_add(acc, *value))?;
            Ok(DealerSheetRow {
                number,
                sent,
                total,
            })
        })
        .collect()
}

pub fn settlement_totals(entries: &[Entry], winners: &[WinnerItem]) -> Result<SettlementTotals> {
    let kept_stakes = summarize(entries)?.grand_total.kept;
    let (operator_payout, dealer_payout) = winners
        .iter()
        .flat_map(|w| &w.matched)
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(kept, sent), leg| {
            Ok::<_, PoolError>((
                checked_add(kept, leg.payout.kept)?,
                checked_add(sent, leg.payout.sent)?,
            ))
        })?;
    let operator_net = kept_stakes.checked_sub(operator_payout).ok_or_else(|| {
        PoolError::ComputationInvariant(format!(
            "net of {} less {} overflowed",
            kept_stakes, operator_payout
        ))
    })?;
    Ok(SettlementTotals {
        kept_stakes,
        operator_payout,
        dealer_payout,
        operator_net,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Allocation, MatchedLeg, Payout, Wager};
    use chrono::Utc;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn amount(total: &str, kept: &str) -> AmountDetail {
        AmountDetail::new(d(total), d(kept), d(total) - d(kept)).unwrap()
    }

    fn entry(id: i64, buyer_id: i64, number: &str, wager: Allocation) -> Entry {
        Entry {
            id,
            buyer_id,
            buyer_name: format!("buyer-{}", buyer_id),
            number: number.to_string(),
            wager,
            cut_version: Some(1),
            created_at: Utc::now(),
            created_at_thai: String::new(),
        }
    }

    fn sample() -> Vec<Entry> {
        vec![
            entry(
                1,
                1,
                "45",
                Wager::TwoDigit {
                    top: Some(amount("100", "100")),
                    bottom: Some(amount("40", "0")),
                },
            ),
            entry(
                2,
                2,
                "45",
                Wager::TwoDigit {
                    top: Some(amount("100", "50")),
                    bottom: None,
                },
            ),
            entry(
                3,
                1,
                "123",
                Wager::ThreeDigit {
                    top: Some(amount("20", "20")),
                    tod: Some(amount("30", "10")),
                    bottom: None,
                },
            ),
        ]
    }

    #[test]
    fn test_summary_by_pattern_and_grand_total() {
        let summary = summarize(&sample()).unwrap();
        assert_eq!(summary.entry_count, 3);
        assert_eq!(summary.pattern(Pattern::TwoDigitTop), amount("200", "150"));
        assert_eq!(summary.pattern(Pattern::TwoDigitBottom), amount("40", "0"));
        assert_eq!(summary.pattern(Pattern::ThreeDigitBottom), AmountDetail::default());
        assert_eq!(summary.grand_total, amount("290", "180"));
        assert_eq!(summary.source_total(Source::Own), d("180"));
        assert_eq!(summary.source_total(Source::Dealer), d("110"));
    }

    #[test]
    fn test_sum_of_parts_equals_whole() {
        let entries = sample();
        let whole = summarize(&entries).unwrap();

        let buyers = summarize_by_buyer(&entries).unwrap();
        let by_buyer =
            AmountDetail::checked_sum(buyers.iter().map(|b| &b.summary.grand_total)).unwrap();
        assert_eq!(by_buyer, whole.grand_total);

        let two = summarize_length(&entries, NumberLength::Two).unwrap();
        let three = summarize_length(&entries, NumberLength::Three).unwrap();
        let by_length = two.grand_total.checked_add(&three.grand_total).unwrap();
        assert_eq!(by_length, whole.grand_total);

        let mut reversed = entries.clone();
        reversed.reverse();
        assert_eq!(summarize(&reversed).unwrap(), whole);
        assert_eq!(summarize(&entries).unwrap(), whole);
    }

    #[test]
    fn test_source_view_splits_sides() {
        let entries = sample();
        let own = source_view(&entries, Source::Own);
        assert_eq!(own.len(), 3);
        assert_eq!(own[0].amounts.get(&Pattern::TwoDigitBottom), None);

        let dealer = source_view(&entries, Source::Dealer);
        // entry 1 still forwards its bottom leg
        assert_eq!(dealer.len(), 3);
        assert_eq!(dealer[0].amounts[&Pattern::TwoDigitBottom], d("40"));
        assert_eq!(dealer[1].amounts[&Pattern::TwoDigitTop], d("50"));
        assert_eq!(dealer[2].amounts.get(&Pattern::ThreeDigitTop), None);
    }

    #[test]
    fn test_dealer_sheet_merges_numbers() {
        let sheet = dealer_sheet(&sample(), None).unwrap();
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet[0].number, "123");
        assert_eq!(sheet[0].total, d("20"));
        assert_eq!(sheet[1].number, "45");
        assert_eq!(sheet[1].sent[&Pattern::TwoDigitTop], d("50"));
        assert_eq!(sheet[1].sent[&Pattern::TwoDigitBottom], d("40"));
        assert_eq!(sheet[1].total, d("90"));

        let three_only = dealer_sheet(&sample(), Some(NumberLength::Three)).unwrap();
        assert_eq!(three_only.len(), 1);
    }

    #[test]
    fn test_settlement_totals_only_count_kept_payout_for_operator() {
        let entries = sample();
        let winners = vec![WinnerItem {
            buyer_id: 2,
            buyer_name: "buyer-2".into(),
            number: "45".into(),
            matched: vec![MatchedLeg {
                pattern: Pattern::TwoDigitTop,
                label: Pattern::TwoDigitTop.label(),
                amount: amount("100", "50"),
                rate: Pattern::TwoDigitTop.rate(),
                payout: Payout {
                    kept: d("3250"),
                    sent: d("3250"),
                },
            }],
        }];
        let totals = settlement_totals(&entries, &winners).unwrap();
        assert_eq!(totals.kept_stakes, d("180"));
        assert_eq!(totals.operator_payout, d("3250"));
        assert_eq!(totals.dealer_payout, d("3250"));
        assert_eq!(totals.operator_net, d("-3070"));
    }

    #[test]
    fn test_oversized_amounts_fail_instead_of_panicking() {
        let huge = Decimal::MAX - Decimal::ONE;
        let big = AmountDetail::new(huge, huge, Decimal::ZERO).unwrap();
        let sent = AmountDetail::new(huge, Decimal::ZERO, huge).unwrap();
        let entries = vec![
            entry(1, 1, "45", Wager::TwoDigit { top: Some(big), bottom: None }),
            entry(2, 2, "45", Wager::TwoDigit { top: Some(sent), bottom: None }),
            entry(3, 2, "45", Wager::TwoDigit { top: Some(big), bottom: None }),
        ];

        assert!(matches!(summarize(&entries), Err(PoolError::ComputationInvariant(_))));
        assert!(summarize_by_buyer(&entries).is_err());
        assert!(summarize_length(&entries, NumberLength::Two).is_err());
        assert!(matches!(
            dealer_sheet(&[entries[1].clone(), entries[1].clone()], None),
            Err(PoolError::ComputationInvariant(_))
        ));
        assert!(matches!(
            settlement_totals(&entries, &[]),
            Err(PoolError::ComputationInvariant(_))
        ));
    }
}
