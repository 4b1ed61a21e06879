//! The pool's book: buyers, refused numbers, cut limits and recorded entries,
//! all behind one SQLite connection.

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::allocator::Allocator;
use crate::blacklist::{blacklist_set, ensure_allowed};
use crate::classifier::{classify, validate_entry};
use crate::config::{Config, MissingCutConfig};
use crate::database;
use crate::error::{PoolError, Result};
use crate::reports::{self, BuyerSummary, DealerSheetRow, SourceRow, Summary};
use crate::settlement::{self, Settlement};
use crate::types::{
    BlacklistedNumber, Buyer, CutConfig, CutConfigInput, DrawResult, Entry, EntryInput,
    NumberLength, Source, VersionedCutConfig,
};
use crate::utils::format_thai_datetime;

pub struct Book {
    connection: Mutex<Connection>,
    missing_cut_config: MissingCutConfig,
}

impl Book {
    pub fn new(connection: Connection, missing_cut_config: MissingCutConfig) -> Result<Self> {
        database::create_database_with_connection(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            missing_cut_config,
        })
    }

    pub fn open(config: &Config) -> Result<Self> {
        let connection = database::open_database(&config.database_url)?;
        Self::new(connection, config.missing_cut_config)
    }

    pub fn in_memory(missing_cut_config: MissingCutConfig) -> Result<Self> {
        Self::new(Connection::open_in_memory()?, missing_cut_config)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| PoolError::ComputationInvariant("book connection poisoned".to_string()))
    }

    // buyers

    pub fn add_buyer(&self, name: &str, phone: Option<&str>) -> Result<Buyer> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PoolError::validation("buyer name must not be blank"));
        }
        let phone = phone.map(str::trim).filter(|p| !p.is_empty());
        let buyer = database::add_buyer(&*self.conn()?, name, phone)?;
        info!("👤 Added buyer {} ({})", buyer.name, buyer.id);
        Ok(buyer)
    }

    pub fn buyers(&self) -> Result<Vec<Buyer>> {
        database::get_buyers(&*self.conn()?)
    }

    /// Refuses to delete a buyer whose entries are still on the book.
    pub fn delete_buyer(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let open_entries = database::count_entries_for_buyer(&conn, id)?;
        if open_entries > 0 {
            return Err(PoolError::validation(format!(
                "buyer {} still has {} entries",
                id, open_entries
            )));
        }
        if !database::delete_buyer(&conn, id)? {
            return Err(PoolError::validation(format!("no buyer with id {}", id)));
        }
        info!("🗑️ Deleted buyer {}", id);
        Ok(())
    }

    // blacklist

    pub fn blacklist(&self) -> Result<Vec<BlacklistedNumber>> {
        database::get_blacklist(&*self.conn()?)
    }

    pub fn add_blacklist(&self, number: &str) -> Result<BlacklistedNumber> {
        let number = classify(number)?.number;
        let row = database::add_blacklist(&*self.conn()?, &number)?;
        info!("🚫 Blacklisted {}", row.number);
        Ok(row)
    }

    pub fn update_blacklist(&self, id: i64, number: &str) -> Result<BlacklistedNumber> {
        let number = classify(number)?.number;
        database::update_blacklist(&*self.conn()?, id, &number)?
            .ok_or_else(|| PoolError::validation(format!("no blacklist row with id {}", id)))
    }

    pub fn delete_blacklist(&self, id: i64) -> Result<()> {
        if !database::delete_blacklist(&*self.conn()?, id)? {
            return Err(PoolError::validation(format!("no blacklist row with id {}", id)));
        }
        Ok(())
    }

    // cut config

    pub fn cut_config(&self) -> Result<Option<VersionedCutConfig>> {
        database::get_cut_config(&*self.conn()?)
    }

    pub fn save_cut_config(&self, input: &CutConfigInput) -> Result<VersionedCutConfig> {
        let limits = CutConfig::parse(input)?;
        let saved = database::save_cut_config(&*self.conn()?, &limits, &Utc::now())?;
        info!("✂️ Saved cut config version {}", saved.version);
        Ok(saved)
    }

    fn limits_for_recording(
        &self,
        stored: Option<VersionedCutConfig>,
    ) -> Result<(CutConfig, Option<i64>)> {
        match (stored, self.missing_cut_config) {
            (Some(config), _) => Ok((config.limits, Some(config.version))),
            (None, MissingCutConfig::ForwardAll) => {
                warn!("no cut config saved; forwarding every stake to the dealer");
                Ok((CutConfig::forward_all(), None))
            }
            (None, MissingCutConfig::Reject) => Err(PoolError::ConfigMissing),
        }
    }

    // entries

    /// Validates, splits and stores a batch of entry lines. Either every line is
    /// recorded or none is.
    pub fn record_entries(&self, inputs: &[EntryInput]) -> Result<Vec<Entry>> {
        if inputs.is_empty() {
            return Err(PoolError::validation("no entries submitted"));
        }
        let new_entries = inputs
            .iter()
            .map(validate_entry)
            .collect::<Result<Vec<_>>>()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let blacklist = blacklist_set(&database::get_blacklist(&tx)?);
        for entry in &new_entries {
            ensure_allowed(&entry.number, &blacklist)?;
        }

        let (limits, cut_version) = self.limits_for_recording(database::get_cut_config(&tx)?)?;
        let mut allocator = Allocator::with_history(limits, &database::get_all_entries(&tx)?)?;

        let created_at = Utc::now();
        let mut recorded = Vec::with_capacity(new_entries.len());
        for entry in new_entries {
            let buyer = database::get_buyer(&tx, entry.buyer_id)?.ok_or_else(|| {
                PoolError::validation(format!("no buyer with id {}", entry.buyer_id))
            })?;
            let wager = allocator.allocate_stake(&entry.number, &entry.stake)?;
            let id = database::insert_entry(
                &tx,
                buyer.id,
                &entry.number,
                &wager,
                cut_version,
                &created_at,
            )?;
            recorded.push(Entry {
                id,
                buyer_id: buyer.id,
                buyer_name: buyer.name,
                number: entry.number,
                wager,
                cut_version,
                created_at,
                created_at_thai: format_thai_datetime(&created_at),
            });
        }
        tx.commit()?;

        info!("📝 Recorded {} entries", recorded.len());
        Ok(recorded)
    }

    pub fn entries(&self) -> Result<Vec<Entry>> {
        database::get_all_entries(&*self.conn()?)
    }

    pub fn entries_by_buyer(&self, buyer_id: i64) -> Result<Vec<Entry>> {
        database::get_entries_by_buyer(&*self.conn()?, buyer_id)
    }

    pub fn source_view(&self, source: Source) -> Result<Vec<SourceRow>> {
        Ok(reports::source_view(&self.entries()?, source))
    }

    /// Deletes a buyer's entries on one number from both the kept and sent views.
    pub fn delete_pair(&self, buyer_id: i64, number: &str) -> Result<usize> {
        let number = classify(number)?.number;
        let deleted = database::delete_entry_pair(&*self.conn()?, buyer_id, &number)?;
        info!("🗑️ Deleted {} entries for buyer {} number {}", deleted, buyer_id, number);
        Ok(deleted)
    }

    pub fn reset(&self) -> Result<usize> {
        let deleted = database::delete_all_entries(&*self.conn()?)?;
        warn!("♻️ Reset book, {} entries removed", deleted);
        Ok(deleted)
    }

    // reports

    pub fn summary(&self, length: Option<NumberLength>) -> Result<Summary> {
        let entries = self.entries()?;
        match length {
            Some(length) => reports::summarize_length(&entries, length),
            None => reports::summarize(&entries),
        }
    }

    pub fn summary_by_buyer(&self) -> Result<Vec<BuyerSummary>> {
        reports::summarize_by_buyer(&self.entries()?)
    }

    pub fn dealer_sheet(&self, length: Option<NumberLength>) -> Result<Vec<DealerSheetRow>> {
        reports::dealer_sheet(&self.entries()?, length)
    }

    // draws

    pub fn cached_draw(&self, draw_date: &str) -> Result<Option<DrawResult>> {
        database::get_draw_result(&*self.conn()?, draw_date)
    }

    pub fn cache_draw(&self, draw: &DrawResult) -> Result<()> {
        draw.validate()?;
        if database::save_draw_result(&*self.conn()?, draw)? {
            info!("💾 Cached draw result {}", draw.date.key());
        }
        Ok(())
    }

    /// Splits `dates` into those still missing from the cache and the keys already stored.
    pub fn missing_draw_dates(
        &self,
        dates: &[(String, String, String)],
    ) -> Result<(Vec<(String, String, String)>, Vec<String>)> {
        database::check_existing_dates(&*self.conn()?, dates)
    }

    pub fn settle(&self, draw: &DrawResult) -> Result<Settlement> {
        settlement::settle(&self.entries()?, draw)
    }
}
