use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use rust_decimal::Decimal;

use crate::error::{PoolError, Result};

const THAI_MONTHS: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

const BANGKOK_OFFSET_SECS: i64 = 7 * 3600;
const BUDDHIST_ERA_OFFSET: i32 = 543;

/// Largest amount accepted in any money field, stakes and ceilings alike.
/// Keeps every sum and payout well inside `Decimal` range.
pub const MAX_AMOUNT: i64 = 1_000_000_000;

pub fn format_date_for_api(date: &str, month: &str, year: &str) -> String {
    format!("{}-{:0>2}-{:0>2}", year, month, date)
}

/// Draws happen on the 1st and 16th of every month.
pub fn generate_lottery_dates(year: i32) -> Vec<(String, String, String)> {
    let mut dates_to_fetch = Vec::new();

    for month in 1..=12 {
        for day in [1, 16] {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                dates_to_fetch.push(split_date(date));
            }
        }
    }

    dates_to_fetch
}

/// Calendar date in Bangkok at `now`; draw days follow Thai time.
pub fn bangkok_date(now: &DateTime<Utc>) -> NaiveDate {
    (now.naive_utc() + Duration::seconds(BANGKOK_OFFSET_SECS)).date()
}

/// Most recent draw day on or before `today`.
pub fn latest_draw_date(today: NaiveDate) -> NaiveDate {
    let day = if today.day() >= 16 { 16 } else { 1 };
    today.with_day(day).unwrap_or(today)
}

/// `(date, month, year)` as the GLO API expects them.
pub fn split_date(date: NaiveDate) -> (String, String, String) {
    (
        format!("{:02}", date.day()),
        format!("{:02}", date.month()),
        date.year().to_string(),
    )
}

pub fn parse_api_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| PoolError::validation(format!("date {:?} is not YYYY-MM-DD: {}", raw, e)))
}

/// e.g. `16 ตุลาคม 2569 เวลา 14:05 น.` in Bangkok time.
pub fn format_thai_datetime(at: &DateTime<Utc>) -> String {
    let local = at.naive_utc() + Duration::seconds(BANGKOK_OFFSET_SECS);
    format!(
        "{} {} {} เวลา {:02}:{:02} น.",
        local.day(),
        THAI_MONTHS[local.month0() as usize],
        local.year() + BUDDHIST_ERA_OFFSET,
        local.hour(),
        local.minute()
    )
}

/// Parses a money field from a form. Blank means zero; negatives are refused.
pub fn parse_amount(field: &str, raw: Option<&str>) -> Result<Decimal> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Decimal::ZERO),
        Some(raw) => raw,
    };
    let amount: Decimal = raw
        .parse()
        .map_err(|_| PoolError::validation(format!("{} is not a number: {:?}", field, raw)))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PoolError::validation(format!(
            "{} must not be negative: {}",
            field, amount
        )));
    }
    if amount > Decimal::from(MAX_AMOUNT) {
        return Err(PoolError::validation(format!(
            "{} must not exceed {}: {}",
            field, MAX_AMOUNT, amount
        )));
    }
    Ok(amount.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_date_for_api_pads() {
        assert_eq!(format_date_for_api("1", "2", "2025"), "2025-02-01");
        assert_eq!(format_date_for_api("16", "12", "2024"), "2024-12-16");
    }

    #[test]
    fn test_generate_lottery_dates_covers_two_draws_a_month() {
        let dates = generate_lottery_dates(2025);
        assert_eq!(dates.len(), 24);
        assert_eq!(dates[0], ("01".to_string(), "01".to_string(), "2025".to_string()));
        assert_eq!(dates[23], ("16".to_string(), "12".to_string(), "2025".to_string()));
    }

    #[test]
    fn test_latest_draw_date() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(latest_draw_date(d(2026, 10, 18)), d(2026, 10, 16));
        assert_eq!(latest_draw_date(d(2026, 10, 16)), d(2026, 10, 16));
        assert_eq!(latest_draw_date(d(2026, 10, 15)), d(2026, 10, 1));
        assert_eq!(latest_draw_date(d(2026, 11, 1)), d(2026, 11, 1));
    }

    #[test]
    fn test_bangkok_date_rolls_over_before_utc() {
        // 01:30 on the 16th in Bangkok is still the 15th in UTC
        let at = Utc.with_ymd_and_hms(2026, 10, 15, 18, 30, 0).unwrap();
        let today = bangkok_date(&at);
        assert_eq!(today, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        assert_eq!(latest_draw_date(today), today);

        let at = Utc.with_ymd_and_hms(2026, 10, 15, 16, 59, 0).unwrap();
        assert_eq!(bangkok_date(&at), NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
    }

    #[test]
    fn test_format_thai_datetime_uses_bangkok_time_and_buddhist_year() {
        // 07:05 UTC is 14:05 in Bangkok
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 7, 5, 0).unwrap();
        assert_eq!(format_thai_datetime(&at), "16 ตุลาคม 2569 เวลา 14:05 น.");

        // late UTC evening rolls over to the next Thai day
        let at = Utc.with_ymd_and_hms(2025, 12, 31, 20, 0, 0).unwrap();
        assert_eq!(format_thai_datetime(&at), "1 มกราคม 2569 เวลา 03:00 น.");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("top", None).unwrap(), Decimal::ZERO);
        assert_eq!(parse_amount("top", Some("  ")).unwrap(), Decimal::ZERO);
        assert_eq!(parse_amount("top", Some("100")).unwrap(), Decimal::from(100));
        assert_eq!(
            parse_amount("top", Some("12.50")).unwrap(),
            "12.5".parse::<Decimal>().unwrap()
        );
        assert!(matches!(
            parse_amount("top", Some("-10")),
            Err(PoolError::Validation(_))
        ));
        assert!(matches!(
            parse_amount("top", Some("ten")),
            Err(PoolError::Validation(_))
        ));
        assert_eq!(
            parse_amount("top", Some("1000000000")).unwrap(),
            Decimal::from(MAX_AMOUNT)
        );
        assert!(matches!(
            parse_amount("top", Some("1000000000.01")),
            Err(PoolError::Validation(_))
        ));
        assert!(matches!(
            parse_amount("top", Some("50000000000000000000000000000")),
            Err(PoolError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_api_date() {
        assert_eq!(
            parse_api_date("2025-01-16").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 16).unwrap()
        );
        assert!(parse_api_date("16/01/2025").is_err());
    }
}
