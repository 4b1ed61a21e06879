//! Number-length classification and stake-field validation for entry input.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{PoolError, Result};
use crate::types::{EntryInput, NewEntry, NumberLength, Pattern, Stake, Wager};
use crate::utils::parse_amount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub number: String,
    pub length: NumberLength,
    pub allowed: Vec<Pattern>,
}

/// Determines the digit class of a typed number and the patterns it may carry.
pub fn classify(number: &str) -> Result<Classification> {
    let number = number.trim();
    if !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PoolError::validation(format!(
            "กรุณากรอกเลขให้ถูกต้อง 2 หรือ 3 หลัก: {:?} contains non-digits",
            number
        )));
    }
    let length = match number.len() {
        2 => NumberLength::Two,
        3 => NumberLength::Three,
        _ => {
            return Err(PoolError::validation(format!(
                "กรุณากรอกเลขให้ถูกต้อง 2 หรือ 3 หลัก: {:?}",
                number
            )));
        }
    };
    Ok(Classification {
        number: number.to_string(),
        length,
        allowed: length.patterns().to_vec(),
    })
}

fn populated(raw: &Option<String>) -> bool {
    raw.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn positive(amount: Decimal) -> Option<Decimal> {
    (amount > Decimal::ZERO).then_some(amount)
}

impl Classification {
    /// Checks the stake fields of `input` against this number's digit class.
    pub fn check(&self, input: &EntryInput) -> Result<Stake> {
        let stake = match self.length {
            NumberLength::Three => {
                if populated(&input.bottom2) {
                    return Err(PoolError::validation("เลข 3 ตัวห้ามกรอกช่อง 2 ตัวล่าง"));
                }
                Wager::ThreeDigit {
                    top: positive(parse_amount("top", input.top.as_deref())?),
                    tod: positive(parse_amount("tod", input.tod.as_deref())?),
                    bottom: positive(parse_amount("bottom3", input.bottom3.as_deref())?),
                }
            }
            NumberLength::Two => {
                if populated(&input.tod) {
                    return Err(PoolError::validation("เลข 2 ตัวห้ามกรอกช่อง โต๊ด"));
                }
                if populated(&input.bottom3) {
                    return Err(PoolError::validation("เลข 2 ตัวห้ามกรอกช่อง 3 ตัวล่าง"));
                }
                Wager::TwoDigit {
                    top: positive(parse_amount("top", input.top.as_deref())?),
                    bottom: positive(parse_amount("bottom2", input.bottom2.as_deref())?),
                }
            }
        };

        if stake.legs().is_empty() {
            return Err(PoolError::validation(format!(
                "no amount staked on {}",
                self.number
            )));
        }
        Ok(stake)
    }
}

/// Full entry-time validation, minus the blacklist check which needs storage.
pub fn validate_entry(input: &EntryInput) -> Result<NewEntry> {
    let classification = classify(&input.number)?;
    let stake = classification.check(input)?;
    Ok(NewEntry {
        buyer_id: input.buyer_id,
        number: classification.number,
        stake,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(number: &str) -> EntryInput {
        EntryInput {
            buyer_id: 1,
            number: number.to_string(),
            ..Default::default()
        }
    }

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_classify_lengths() {
        let two = classify("45").unwrap();
        assert_eq!(two.length, NumberLength::Two);
        assert_eq!(two.allowed, vec![Pattern::TwoDigitTop, Pattern::TwoDigitBottom]);

        let three = classify(" 123 ").unwrap();
        assert_eq!(three.number, "123");
        assert_eq!(three.length, NumberLength::Three);
        assert_eq!(three.allowed.len(), 3);
    }

    #[test]
    fn test_classify_rejects_bad_lengths_and_non_digits() {
        for bad in ["", "1", "1234", "12a", "4 5"] {
            assert!(
                matches!(classify(bad), Err(PoolError::Validation(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_three_digit_number_cannot_carry_bottom2() {
        let mut entry = input("123");
        entry.top = Some("10".into());
        entry.bottom2 = Some("5".into());
        assert!(matches!(validate_entry(&entry), Err(PoolError::Validation(_))));
    }

    #[test]
    fn test_two_digit_number_cannot_carry_tod() {
        let mut entry = input("45");
        entry.top = Some("10".into());
        entry.tod = Some("5".into());
        assert!(matches!(validate_entry(&entry), Err(PoolError::Validation(_))));
    }

    #[test]
    fn test_blank_fields_do_not_count_as_populated() {
        let mut entry = input("45");
        entry.bottom2 = Some("20".into());
        entry.tod = Some("  ".into());
        let validated = validate_entry(&entry).unwrap();
        assert_eq!(
            validated.stake,
            Wager::TwoDigit {
                top: None,
                bottom: Some(d("20")),
            }
        );
    }

    #[test]
    fn test_bet_without_money_is_rejected() {
        let mut entry = input("123");
        entry.top = Some("0".into());
        entry.tod = Some("".into());
        assert!(matches!(validate_entry(&entry), Err(PoolError::Validation(_))));
        assert!(matches!(validate_entry(&input("45")), Err(PoolError::Validation(_))));
    }

    #[test]
    fn test_negative_stake_is_rejected_not_clamped() {
        let mut entry = input("123");
        entry.top = Some("-50".into());
        entry.tod = Some("10".into());
        assert!(matches!(validate_entry(&entry), Err(PoolError::Validation(_))));
    }

    #[test]
    fn test_three_digit_entry_keeps_all_three_legs() {
        let mut entry = input("123");
        entry.top = Some("100".into());
        entry.tod = Some("50".into());
        entry.bottom3 = Some("20".into());
        let validated = validate_entry(&entry).unwrap();
        assert_eq!(validated.number, "123");
        assert_eq!(
            validated.stake.legs(),
            vec![
                (Pattern::ThreeDigitTop, &d("100")),
                (Pattern::ThreeDigitTod, &d("50")),
                (Pattern::ThreeDigitBottom, &d("20")),
            ]
        );
    }
}
