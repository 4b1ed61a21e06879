use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PoolError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pattern {
    ThreeDigitTop,
    ThreeDigitTod,
    ThreeDigitBottom,
    TwoDigitTop,
    TwoDigitBottom,
}

impl Pattern {
    pub const ALL: [Pattern; 5] = [
        Pattern::ThreeDigitTop,
        Pattern::ThreeDigitTod,
        Pattern::ThreeDigitBottom,
        Pattern::TwoDigitTop,
        Pattern::TwoDigitBottom,
    ];

    /// Payout multiple applied to the staked amount on a winning leg.
    pub fn rate(self) -> Decimal {
        let multiple: u32 = match self {
            Pattern::ThreeDigitTop => 450,
            Pattern::ThreeDigitTod => 95,
            Pattern::ThreeDigitBottom => 95,
            Pattern::TwoDigitTop => 65,
            Pattern::TwoDigitBottom => 65,
        };
        Decimal::from(multiple)
    }

    pub fn label(self) -> &'static str {
        match self {
            Pattern::ThreeDigitTop => "3 ตัวบน",
            Pattern::ThreeDigitTod => "โต๊ด",
            Pattern::ThreeDigitBottom => "3 ตัวล่าง",
            Pattern::TwoDigitTop => "2 ตัวบน",
            Pattern::TwoDigitBottom => "2 ตัวล่าง",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Pattern::ThreeDigitTop => "threeDigitTop",
            Pattern::ThreeDigitTod => "threeDigitTod",
            Pattern::ThreeDigitBottom => "threeDigitBottom",
            Pattern::TwoDigitTop => "twoDigitTop",
            Pattern::TwoDigitBottom => "twoDigitBottom",
        }
    }

    pub fn length(self) -> NumberLength {
        match self {
            Pattern::ThreeDigitTop | Pattern::ThreeDigitTod | Pattern::ThreeDigitBottom => {
                NumberLength::Three
            }
            Pattern::TwoDigitTop | Pattern::TwoDigitBottom => NumberLength::Two,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Pattern {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        Pattern::ALL
            .into_iter()
            .find(|p| p.key() == s)
            .ok_or_else(|| PoolError::validation(format!("unknown pattern: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NumberLength {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
}

impl NumberLength {
    pub fn digits(self) -> usize {
        match self {
            NumberLength::Two => 2,
            NumberLength::Three => 3,
        }
    }

    pub fn patterns(self) -> &'static [Pattern] {
        match self {
            NumberLength::Two => &[Pattern::TwoDigitTop, Pattern::TwoDigitBottom],
            NumberLength::Three => &[
                Pattern::ThreeDigitTop,
                Pattern::ThreeDigitTod,
                Pattern::ThreeDigitBottom,
            ],
        }
    }
}

/// Accounting side of an entry: `self` reads the kept share, `dealer` the sent share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "self")]
    Own,
    #[serde(rename = "dealer")]
    Dealer,
}

impl FromStr for Source {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "self" => Ok(Source::Own),
            "dealer" => Ok(Source::Dealer),
            other => Err(PoolError::validation(format!("unknown source: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmountDetail {
    pub total: Decimal,
    pub kept: Decimal,
    pub sent: Decimal,
}

impl AmountDetail {
    pub fn new(total: Decimal, kept: Decimal, sent: Decimal) -> Result<Self> {
        if kept.is_sign_negative() || sent.is_sign_negative() || total.is_sign_negative() {
            return Err(PoolError::ComputationInvariant(format!(
                "negative amount in total={} kept={} sent={}",
                total, kept, sent
            )));
        }
        if kept.checked_add(sent) != Some(total) {
            return Err(PoolError::ComputationInvariant(format!(
                "kept {} + sent {} != total {}",
                kept, sent, total
            )));
        }
        Ok(Self { total, kept, sent })
    }

    pub fn for_source(&self, source: Source) -> Decimal {
        match source {
            Source::Own => self.kept,
            Source::Dealer => self.sent,
        }
    }
}

fn overflow(what: &str, a: Decimal, b: Decimal) -> PoolError {
    PoolError::ComputationInvariant(format!("{} overflowed: {} and {}", what, a, b))
}

/// Adds two money amounts, reporting overflow instead of panicking.
pub fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(|| overflow("sum", a, b))
}

/// Multiplies two money amounts, reporting overflow instead of panicking.
pub fn checked_mul(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b).ok_or_else(|| overflow("product", a, b))
}

impl AmountDetail {
    pub fn checked_add(&self, rhs: &AmountDetail) -> Result<AmountDetail> {
        Ok(AmountDetail {
            total: checked_add(self.total, rhs.total)?,
            kept: checked_add(self.kept, rhs.kept)?,
            sent: checked_add(self.sent, rhs.sent)?,
        })
    }

    pub fn checked_sum<'a>(amounts: impl IntoIterator<Item = &'a AmountDetail>) -> Result<Self> {
        amounts
            .into_iter()
            .try_fold(AmountDetail::default(), |acc, amount| acc.checked_add(amount))
    }
}

/// Per-pattern values for one number. The variant is fixed by the number's
/// digit count, so a two-digit wager can never carry a tod leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "digits")]
pub enum Wager<T> {
    #[serde(rename = "3")]
    ThreeDigit {
        top: Option<T>,
        tod: Option<T>,
        bottom: Option<T>,
    },
    #[serde(rename = "2")]
    TwoDigit { top: Option<T>, bottom: Option<T> },
}

pub type Stake = Wager<Decimal>;
pub type Allocation = Wager<AmountDetail>;

impl<T> Wager<T> {
    pub fn empty(length: NumberLength) -> Self {
        match length {
            NumberLength::Two => Wager::TwoDigit {
                top: None,
                bottom: None,
            },
            NumberLength::Three => Wager::ThreeDigit {
                top: None,
                tod: None,
                bottom: None,
            },
        }
    }

    pub fn length(&self) -> NumberLength {
        match self {
            Wager::ThreeDigit { .. } => NumberLength::Three,
            Wager::TwoDigit { .. } => NumberLength::Two,
        }
    }

    pub fn get(&self, pattern: Pattern) -> Option<&T> {
        match (self, pattern) {
            (Wager::ThreeDigit { top, .. }, Pattern::ThreeDigitTop) => top.as_ref(),
            (Wager::ThreeDigit { tod, .. }, Pattern::ThreeDigitTod) => tod.as_ref(),
            (Wager::ThreeDigit { bottom, .. }, Pattern::ThreeDigitBottom) => bottom.as_ref(),
            (Wager::TwoDigit { top, .. }, Pattern::TwoDigitTop) => top.as_ref(),
            (Wager::TwoDigit { bottom, .. }, Pattern::TwoDigitBottom) => bottom.as_ref(),
            _ => None,
        }
    }

    /// Populated legs in pattern order.
    pub fn legs(&self) -> Vec<(Pattern, &T)> {
        self.length()
            .patterns()
            .iter()
            .filter_map(|&p| self.get(p).map(|v| (p, v)))
            .collect()
    }

    pub fn try_map<U, E>(
        self,
        mut f: impl FnMut(Pattern, T) -> Result<U, E>,
    ) -> Result<Wager<U>, E> {
        Ok(match self {
            Wager::ThreeDigit { top, tod, bottom } => Wager::ThreeDigit {
                top: top.map(|v| f(Pattern::ThreeDigitTop, v)).transpose()?,
                tod: tod.map(|v| f(Pattern::ThreeDigitTod, v)).transpose()?,
                bottom: bottom.map(|v| f(Pattern::ThreeDigitBottom, v)).transpose()?,
            },
            Wager::TwoDigit { top, bottom } => Wager::TwoDigit {
                top: top.map(|v| f(Pattern::TwoDigitTop, v)).transpose()?,
                bottom: bottom.map(|v| f(Pattern::TwoDigitBottom, v)).transpose()?,
            },
        })
    }

    /// Sets the leg for `pattern`; fails when the pattern belongs to the other digit class.
    pub fn set(&mut self, pattern: Pattern, value: T) -> Result<()> {
        let slot = match (self, pattern) {
            (Wager::ThreeDigit { top, .. }, Pattern::ThreeDigitTop) => top,
            (Wager::ThreeDigit { tod, .. }, Pattern::ThreeDigitTod) => tod,
            (Wager::ThreeDigit { bottom, .. }, Pattern::ThreeDigitBottom) => bottom,
            (Wager::TwoDigit { top, .. }, Pattern::TwoDigitTop) => top,
            (Wager::TwoDigit { bottom, .. }, Pattern::TwoDigitBottom) => bottom,
            (_, pattern) => {
                return Err(PoolError::validation(format!(
                    "{} does not apply to this number length",
                    pattern
                )));
            }
        };
        *slot = Some(value);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistedNumber {
    pub id: i64,
    pub number: String,
}

/// Per-pattern ceiling on the cumulative amount kept for any single number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutConfig {
    pub three_digit_top: Decimal,
    pub three_digit_tod: Decimal,
    pub three_digit_bottom: Decimal,
    pub two_digit_top: Decimal,
    pub two_digit_bottom: Decimal,
}

impl CutConfig {
    /// Every ceiling zero: all stakes go to the dealer.
    pub fn forward_all() -> Self {
        Self::default()
    }

    pub fn ceiling(&self, pattern: Pattern) -> Decimal {
        match pattern {
            Pattern::ThreeDigitTop => self.three_digit_top,
            Pattern::ThreeDigitTod => self.three_digit_tod,
            Pattern::ThreeDigitBottom => self.three_digit_bottom,
            Pattern::TwoDigitTop => self.two_digit_top,
            Pattern::TwoDigitBottom => self.two_digit_bottom,
        }
    }

    /// Builds a config from form strings; blank fields mean zero.
    pub fn parse(input: &CutConfigInput) -> Result<Self> {
        let field = |pattern: Pattern, raw: &Option<String>| {
            crate::utils::parse_amount(pattern.key(), raw.as_deref())
        };
        Ok(Self {
            three_digit_top: field(Pattern::ThreeDigitTop, &input.three_digit_top)?,
            three_digit_tod: field(Pattern::ThreeDigitTod, &input.three_digit_tod)?,
            three_digit_bottom: field(Pattern::ThreeDigitBottom, &input.three_digit_bottom)?,
            two_digit_top: field(Pattern::TwoDigitTop, &input.two_digit_top)?,
            two_digit_bottom: field(Pattern::TwoDigitBottom, &input.two_digit_bottom)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutConfigInput {
    pub three_digit_top: Option<String>,
    pub three_digit_tod: Option<String>,
    pub three_digit_bottom: Option<String>,
    pub two_digit_top: Option<String>,
    pub two_digit_bottom: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedCutConfig {
    pub version: i64,
    pub saved_at: DateTime<Utc>,
    #[serde(flatten)]
    pub limits: CutConfig,
}

/// One line as typed at the entry form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInput {
    pub buyer_id: i64,
    pub number: String,
    pub top: Option<String>,
    pub tod: Option<String>,
    pub bottom2: Option<String>,
    pub bottom3: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub buyer_id: i64,
    pub number: String,
    pub stake: Stake,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: i64,
    pub buyer_id: i64,
    pub buyer_name: String,
    pub number: String,
    pub wager: Allocation,
    pub cut_version: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub created_at_thai: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawDate {
    pub date: String,
    pub month: String,
    pub year: String,
}

impl DrawDate {
    /// `YYYY-MM-DD`, the key the GLO API and the result cache use.
    pub fn key(&self) -> String {
        crate::utils::format_date_for_api(&self.date, &self.month, &self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeRound {
    pub round: i32,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawNumbers {
    pub first_prize: String,
    pub last_two_digits: String,
    pub three_digit_front: Vec<PrizeRound>,
    pub three_digit_back: Vec<PrizeRound>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub date: DrawDate,
    pub data: DrawNumbers,
}

fn all_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

impl DrawResult {
    /// A result we cannot trust is treated the same as one we could not fetch.
    pub fn validate(&self) -> Result<()> {
        let data = &self.data;
        if !all_digits(&data.first_prize, 6) {
            return Err(PoolError::UpstreamFetch(format!(
                "first prize is not 6 digits: {:?}",
                data.first_prize
            )));
        }
        if !all_digits(&data.last_two_digits, 2) {
            return Err(PoolError::UpstreamFetch(format!(
                "last two digits malformed: {:?}",
                data.last_two_digits
            )));
        }
        for round in data.three_digit_front.iter().chain(&data.three_digit_back) {
            if !all_digits(&round.value, 3) {
                return Err(PoolError::UpstreamFetch(format!(
                    "three digit prize malformed: {:?}",
                    round.value
                )));
            }
        }
        Ok(())
    }

    pub fn first_prize_tail(&self, digits: usize) -> &str {
        let prize = &self.data.first_prize;
        &prize[prize.len().saturating_sub(digits)..]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Payout {
    pub kept: Decimal,
    pub sent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedLeg {
    pub pattern: Pattern,
    pub label: &'static str,
    pub amount: AmountDetail,
    pub rate: Decimal,
    pub payout: Payout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerItem {
    pub buyer_id: i64,
    pub buyer_name: String,
    pub number: String,
    pub matched: Vec<MatchedLeg>,
}

// GLO checking API wire types.

#[derive(Serialize)]
pub struct LotteryRequest {
    pub date: String,
    pub month: String,
    pub year: String,
}

#[derive(Deserialize, Debug)]
pub struct LotteryResponse {
    #[serde(rename = "statusMessage")]
    pub status_message: String,
    #[serde(rename = "statusCode")]
    pub status_code: i32,
    pub status: bool,
    pub response: Option<ResponseData>,
}

#[derive(Deserialize, Debug)]
pub struct ResponseData {
    pub result: Option<LotteryResult>,
}

#[derive(Deserialize, Debug)]
pub struct LotteryResult {
    pub date: String,
    pub data: LotteryData,
}

#[derive(Deserialize, Debug)]
pub struct LotteryData {
    pub first: PrizeCategory,
    pub last2: PrizeCategory,
    pub last3f: PrizeCategory,
    pub last3b: PrizeCategory,
}

#[derive(Deserialize, Debug)]
pub struct PrizeCategory {
    pub price: String,
    pub number: Vec<PrizeNumber>,
}

#[derive(Deserialize, Debug)]
pub struct PrizeNumber {
    pub round: i32,
    pub value: String,
}

impl TryFrom<LotteryResult> for DrawResult {
    type Error = PoolError;

    fn try_from(result: LotteryResult) -> Result<Self> {
        let mut parts = result.date.splitn(3, '-');
        let (year, month, date) = match (parts.next(), parts.next(), parts.next()) {
            (Some(y), Some(m), Some(d)) => (y.to_string(), m.to_string(), d.to_string()),
            _ => {
                return Err(PoolError::UpstreamFetch(format!(
                    "unexpected draw date: {}",
                    result.date
                )));
            }
        };

        let single = |category: &PrizeCategory, name: &str| {
            category
                .number
                .first()
                .map(|n| n.value.clone())
                .ok_or_else(|| PoolError::UpstreamFetch(format!("no {} prize number", name)))
        };
        let rounds = |category: PrizeCategory| {
            category
                .number
                .into_iter()
                .map(|n| PrizeRound {
                    round: n.round,
                    value: n.value,
                })
                .collect::<Vec<_>>()
        };

        let first_prize = single(&result.data.first, "first")?;
        let last_two_digits = single(&result.data.last2, "last2")?;

        let draw = DrawResult {
            date: DrawDate { date, month, year },
            data: DrawNumbers {
                first_prize,
                last_two_digits,
                three_digit_front: rounds(result.data.last3f),
                three_digit_back: rounds(result.data.last3b),
            },
        };
        draw.validate()?;
        Ok(draw)
    }
}
