use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{PoolError, Result};
use crate::types::{
    Allocation, AmountDetail, BlacklistedNumber, Buyer, CutConfig, DrawResult, Entry,
    NumberLength, Pattern, VersionedCutConfig, Wager,
};
use crate::utils::{format_date_for_api, format_thai_datetime};

pub fn open_database(database_url: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(database_url).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                PoolError::Config(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
    }
    let conn = Connection::open(database_url)?;
    create_database_with_connection(&conn)?;
    info!("📁 Opened book database at {}", database_url);
    Ok(conn)
}

pub fn create_database_with_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS buyers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            phone TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS blacklist (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            number TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS cut_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            three_digit_top TEXT NOT NULL,
            three_digit_tod TEXT NOT NULL,
            three_digit_bottom TEXT NOT NULL,
            two_digit_top TEXT NOT NULL,
            two_digit_bottom TEXT NOT NULL,
            saved_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            buyer_id INTEGER NOT NULL,
            number TEXT NOT NULL,
            digits INTEGER NOT NULL,
            cut_version INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY (buyer_id) REFERENCES buyers (id)
        );

        CREATE INDEX IF NOT EXISTS idx_entries_order ON entries (created_at, id);

        CREATE TABLE IF NOT EXISTS entry_legs (
            entry_id INTEGER NOT NULL,
            pattern TEXT NOT NULL,
            total TEXT NOT NULL,
            kept TEXT NOT NULL,
            sent TEXT NOT NULL,
            PRIMARY KEY (entry_id, pattern),
            FOREIGN KEY (entry_id) REFERENCES entries (id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS draw_results (
            draw_date TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            fetched_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );",
    )?;
    Ok(())
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_decimal(idx: usize, raw: &str) -> rusqlite::Result<Decimal> {
    raw.parse::<Decimal>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// buyers

pub fn add_buyer(conn: &Connection, name: &str, phone: Option<&str>) -> Result<Buyer> {
    conn.execute(
        "INSERT INTO buyers (name, phone) VALUES (?1, ?2)",
        params![name, phone],
    )?;
    Ok(Buyer {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        phone: phone.map(str::to_string),
    })
}

pub fn get_buyers(conn: &Connection) -> Result<Vec<Buyer>> {
    let mut stmt = conn.prepare("SELECT id, name, phone FROM buyers ORDER BY name, id")?;
    let buyer_iter = stmt.query_map([], |row| {
        Ok(Buyer {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
        })
    })?;

    let mut results = Vec::new();
    for buyer in buyer_iter {
        results.push(buyer?);
    }
    Ok(results)
}

pub fn get_buyer(conn: &Connection, id: i64) -> Result<Option<Buyer>> {
    let buyer = conn
        .query_row(
            "SELECT id, name, phone FROM buyers WHERE id = ?1",
            [id],
            |row| {
                Ok(Buyer {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    phone: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(buyer)
}

pub fn delete_buyer(conn: &Connection, id: i64) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM buyers WHERE id = ?1", [id])?;
    Ok(deleted > 0)
}

pub fn count_entries_for_buyer(conn: &Connection, buyer_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM entries WHERE buyer_id = ?1",
        [buyer_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// blacklist

pub fn get_blacklist(conn: &Connection) -> Result<Vec<BlacklistedNumber>> {
    let mut stmt = conn.prepare("SELECT id, number FROM blacklist ORDER BY number, id")?;
    let rows = stmt.query_map([], |row| {
        Ok(BlacklistedNumber {
            id: row.get(0)?,
            number: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn add_blacklist(conn: &Connection, number: &str) -> Result<BlacklistedNumber> {
    conn.execute("INSERT INTO blacklist (number) VALUES (?1)", [number])?;
    Ok(BlacklistedNumber {
        id: conn.last_insert_rowid(),
        number: number.to_string(),
    })
}

pub fn update_blacklist(
    conn: &Connection,
    id: i64,
    number: &str,
) -> Result<Option<BlacklistedNumber>> {
    let updated = conn.execute(
        "UPDATE blacklist SET number = ?1 WHERE id = ?2",
        params![number, id],
    )?;
    Ok((updated > 0).then(|| BlacklistedNumber {
        id,
        number: number.to_string(),
    }))
}

pub fn delete_blacklist(conn: &Connection, id: i64) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM blacklist WHERE id = ?1", [id])?;
    Ok(deleted > 0)
}

// cut config

/// Overwrites the live config and bumps its version.
pub fn save_cut_config(
    conn: &Connection,
    limits: &CutConfig,
    saved_at: &DateTime<Utc>,
) -> Result<VersionedCutConfig> {
    conn.execute(
        "INSERT INTO cut_config (
            id, version, three_digit_top, three_digit_tod, three_digit_bottom,
            two_digit_top, two_digit_bottom, saved_at
        ) VALUES (1, 1, ?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT (id) DO UPDATE SET
            version = version + 1,
            three_digit_top = excluded.three_digit_top,
            three_digit_tod = excluded.three_digit_tod,
            three_digit_bottom = excluded.three_digit_bottom,
            two_digit_top = excluded.two_digit_top,
            two_digit_bottom = excluded.two_digit_bottom,
            saved_at = excluded.saved_at",
        params![
            limits.three_digit_top.to_string(),
            limits.three_digit_tod.to_string(),
            limits.three_digit_bottom.to_string(),
            limits.two_digit_top.to_string(),
            limits.two_digit_bottom.to_string(),
            timestamp(saved_at),
        ],
    )?;
    get_cut_config(conn)?.ok_or_else(|| {
        PoolError::ComputationInvariant("cut config missing right after save".to_string())
    })
}

pub fn get_cut_config(conn: &Connection) -> Result<Option<VersionedCutConfig>> {
    let config = conn
        .query_row(
            "SELECT version, three_digit_top, three_digit_tod, three_digit_bottom,
                    two_digit_top, two_digit_bottom, saved_at
             FROM cut_config WHERE id = 1",
            [],
            |row| {
                let decimal = |idx: usize| -> rusqlite::Result<Decimal> {
                    parse_decimal(idx, &row.get::<_, String>(idx)?)
                };
                Ok(VersionedCutConfig {
                    version: row.get(0)?,
                    limits: CutConfig {
                        three_digit_top: decimal(1)?,
                        three_digit_tod: decimal(2)?,
                        three_digit_bottom: decimal(3)?,
                        two_digit_top: decimal(4)?,
                        two_digit_bottom: decimal(5)?,
                    },
                    saved_at: parse_timestamp(6, &row.get::<_, String>(6)?)?,
                })
            },
        )
        .optional()?;
    Ok(config)
}

// entries

pub fn insert_entry(
    conn: &Connection,
    buyer_id: i64,
    number: &str,
    wager: &Allocation,
    cut_version: Option<i64>,
    created_at: &DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO entries (buyer_id, number, digits, cut_version, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            buyer_id,
            number,
            wager.length().digits() as i64,
            cut_version,
            timestamp(created_at)
        ],
    )?;
    let entry_id = conn.last_insert_rowid();

    let mut stmt = conn.prepare(
        "INSERT INTO entry_legs (entry_id, pattern, total, kept, sent)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (pattern, amount) in wager.legs() {
        stmt.execute(params![
            entry_id,
            pattern.key(),
            amount.total.to_string(),
            amount.kept.to_string(),
            amount.sent.to_string(),
        ])?;
    }
    Ok(entry_id)
}

struct LegRow {
    entry_id: i64,
    buyer_id: i64,
    buyer_name: String,
    number: String,
    digits: i64,
    cut_version: Option<i64>,
    created_at: DateTime<Utc>,
    pattern: String,
    amount: AmountDetail,
}

const ENTRY_SELECT: &str = "SELECT e.id, e.buyer_id, b.name, e.number, e.digits, e.cut_version,
            e.created_at, l.pattern, l.total, l.kept, l.sent
     FROM entries e
     JOIN buyers b ON b.id = e.buyer_id
     JOIN entry_legs l ON l.entry_id = e.id";

fn query_entries(
    conn: &Connection,
    filter: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Entry>> {
    let sql = format!(
        "{} {} ORDER BY e.created_at, e.id, l.pattern",
        ENTRY_SELECT, filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(args, |row| {
        let total = parse_decimal(8, &row.get::<_, String>(8)?)?;
        let kept = parse_decimal(9, &row.get::<_, String>(9)?)?;
        let sent = parse_decimal(10, &row.get::<_, String>(10)?)?;
        Ok(LegRow {
            entry_id: row.get(0)?,
            buyer_id: row.get(1)?,
            buyer_name: row.get(2)?,
            number: row.get(3)?,
            digits: row.get(4)?,
            cut_version: row.get(5)?,
            created_at: parse_timestamp(6, &row.get::<_, String>(6)?)?,
            pattern: row.get(7)?,
            amount: AmountDetail { total, kept, sent },
        })
    })?;

    let mut entries: Vec<Entry> = Vec::new();
    for row in rows {
        let row = row?;
        let pattern: Pattern = row.pattern.parse()?;
        // stored legs must still satisfy the split invariant
        let amount = AmountDetail::new(row.amount.total, row.amount.kept, row.amount.sent)?;

        let is_new = entries.last().is_none_or(|e| e.id != row.entry_id);
        if is_new {
            let length = match row.digits {
                2 => NumberLength::Two,
                3 => NumberLength::Three,
                other => {
                    return Err(PoolError::ComputationInvariant(format!(
                        "entry {} stored with {} digits",
                        row.entry_id, other
                    )));
                }
            };
            entries.push(Entry {
                id: row.entry_id,
                buyer_id: row.buyer_id,
                buyer_name: row.buyer_name,
                number: row.number,
                wager: Wager::empty(length),
                cut_version: row.cut_version,
                created_at_thai: format_thai_datetime(&row.created_at),
                created_at: row.created_at,
            });
        }
        if let Some(entry) = entries.last_mut() {
            entry.wager.set(pattern, amount)?;
        }
    }
    Ok(entries)
}

/// Every entry in allocation order (creation time, then id).
pub fn get_all_entries(conn: &Connection) -> Result<Vec<Entry>> {
    query_entries(conn, "", params![])
}

pub fn get_entries_by_buyer(conn: &Connection, buyer_id: i64) -> Result<Vec<Entry>> {
    query_entries(conn, "WHERE e.buyer_id = ?1", params![buyer_id])
}

/// Removes every entry of a buyer for one number, both accounting sides at once.
/// Legs go with their entries through `ON DELETE CASCADE`.
pub fn delete_entry_pair(conn: &Connection, buyer_id: i64, number: &str) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM entries WHERE buyer_id = ?1 AND number = ?2",
        params![buyer_id, number],
    )?;
    Ok(deleted)
}

pub fn delete_all_entries(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM entries", [])?;
    Ok(deleted)
}

// draw results

/// Results are immutable once stored; a second save for the same date is ignored.
pub fn save_draw_result(conn: &Connection, draw: &DrawResult) -> Result<bool> {
    let payload = serde_json::to_string(draw)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO draw_results (draw_date, payload) VALUES (?1, ?2)",
        (draw.date.key(), payload),
    )?;
    Ok(inserted > 0)
}

pub fn get_draw_result(conn: &Connection, draw_date: &str) -> Result<Option<DrawResult>> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM draw_results WHERE draw_date = ?1",
            [draw_date],
            |row| row.get(0),
        )
        .optional()?;
    payload
        .map(|p| serde_json::from_str(&p).map_err(PoolError::from))
        .transpose()
}

pub fn draw_result_exists(conn: &Connection, draw_date: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM draw_results WHERE draw_date = ?1",
        [draw_date],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn check_existing_dates(
    conn: &Connection,
    dates: &[(String, String, String)],
) -> Result<(Vec<(String, String, String)>, Vec<String>)> {
    let mut dates_to_fetch = Vec::new();
    let mut existing_dates = Vec::new();

    for (date, month, year) in dates {
        let formatted_date = format_date_for_api(date, month, year);
        if draw_result_exists(conn, &formatted_date)? {
            existing_dates.push(formatted_date);
        } else {
            dates_to_fetch.push((date.clone(), month.clone(), year.clone()));
        }
    }

    Ok((dates_to_fetch, existing_dates))
}
