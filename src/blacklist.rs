use std::collections::HashSet;

use crate::error::{PoolError, Result};
use crate::types::BlacklistedNumber;

/// Trimmed exact match against the refused-number set.
pub fn is_blocked(number: &str, blacklist: &HashSet<String>) -> bool {
    blacklist.contains(number.trim())
}

pub fn blacklist_set(rows: &[BlacklistedNumber]) -> HashSet<String> {
    rows.iter().map(|row| row.number.trim().to_string()).collect()
}

pub fn ensure_allowed(number: &str, blacklist: &HashSet<String>) -> Result<()> {
    if is_blocked(number, blacklist) {
        return Err(PoolError::BlockedNumber(number.trim().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(numbers: &[&str]) -> Vec<BlacklistedNumber> {
        numbers
            .iter()
            .enumerate()
            .map(|(i, n)| BlacklistedNumber {
                id: i as i64 + 1,
                number: n.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_is_blocked_trims_and_matches_exactly() {
        let set = blacklist_set(&rows(&[" 123", "45 "]));
        assert!(is_blocked("123", &set));
        assert!(is_blocked(" 45", &set));
        assert!(!is_blocked("12", &set));
        assert!(!is_blocked("231", &set));
        assert!(!is_blocked("045", &set));
    }

    #[test]
    fn test_duplicate_blacklist_rows_do_not_change_outcome() {
        let once = blacklist_set(&rows(&["99"]));
        let twice = blacklist_set(&rows(&["99", "99"]));
        assert_eq!(once, twice);
        assert_eq!(is_blocked("99", &once), is_blocked("99", &twice));
    }

    #[test]
    fn test_ensure_allowed_reports_blocked_number() {
        let set = blacklist_set(&rows(&["777"]));
        assert!(ensure_allowed("778", &set).is_ok());
        match ensure_allowed(" 777", &set) {
            Err(PoolError::BlockedNumber(n)) => assert_eq!(n, "777"),
            other => panic!("expected blocked number, got {:?}", other),
        }
    }
}
