use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use lotto_pool::blacklist::{blacklist_set, is_blocked};
use lotto_pool::utils::{bangkok_date, generate_lottery_dates, latest_draw_date, parse_api_date};
use lotto_pool::{Book, CutConfigInput, DrawClient, EntryInput, NumberLength, Source, classify};

const AMOUNT_FIELDS: [&str; 9] = [
    "top",
    "tod",
    "bottom2",
    "bottom3",
    "threeDigitTop",
    "threeDigitTod",
    "threeDigitBottom",
    "twoDigitTop",
    "twoDigitBottom",
];

fn str_arg<'a>(arguments: &'a HashMap<String, Value>, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing {} parameter", key))
}

fn i64_arg(arguments: &HashMap<String, Value>, key: &str) -> Result<i64> {
    arguments
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow::anyhow!("Missing {} parameter", key))
}

fn digits_arg(arguments: &HashMap<String, Value>) -> Result<Option<NumberLength>> {
    match arguments.get("digits").and_then(|v| v.as_i64()) {
        None => Ok(None),
        Some(2) => Ok(Some(NumberLength::Two)),
        Some(3) => Ok(Some(NumberLength::Three)),
        Some(other) => Err(anyhow::anyhow!("digits must be 2 or 3, got {}", other)),
    }
}

/// Forms send money either as strings or as JSON numbers; the engine parses strings.
fn amounts_as_strings(mut value: Value) -> Value {
    if let Some(object) = value.as_object_mut() {
        for field in AMOUNT_FIELDS {
            if let Some(Value::Number(n)) = object.get(field) {
                let text = n.to_string();
                object.insert(field.to_string(), Value::String(text));
            }
        }
    }
    value
}

pub struct BookUseCase {
    book: Arc<Book>,
}

impl BookUseCase {
    pub fn new(book: Arc<Book>) -> Self {
        Self { book }
    }

    pub async fn add_buyer(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let name = str_arg(arguments, "name")?;
        let phone = arguments.get("phone").and_then(|v| v.as_str());
        let buyer = self.book.add_buyer(name, phone)?;

        Ok(json!({
            "success": true,
            "buyer": buyer
        })
        .to_string())
    }

    pub async fn list_buyers(&self, _arguments: &HashMap<String, Value>) -> Result<String> {
        let buyers = self.book.buyers()?;

        Ok(json!({
            "success": true,
            "buyers": buyers
        })
        .to_string())
    }

    pub async fn delete_buyer(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let id = i64_arg(arguments, "id")?;
        self.book.delete_buyer(id)?;

        Ok(json!({
            "success": true,
            "message": format!("Deleted buyer {}", id)
        })
        .to_string())
    }

    pub async fn list_blacklist(&self, _arguments: &HashMap<String, Value>) -> Result<String> {
        let numbers = self.book.blacklist()?;

        Ok(json!({
            "success": true,
            "blacklist": numbers
        })
        .to_string())
    }

    pub async fn add_blacklist(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let number = str_arg(arguments, "number")?;
        let row = self.book.add_blacklist(number)?;

        Ok(json!({
            "success": true,
            "entry": row
        })
        .to_string())
    }

    pub async fn update_blacklist(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let id = i64_arg(arguments, "id")?;
        let number = str_arg(arguments, "number")?;
        let row = self.book.update_blacklist(id, number)?;

        Ok(json!({
            "success": true,
            "entry": row
        })
        .to_string())
    }

    pub async fn delete_blacklist(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let id = i64_arg(arguments, "id")?;
        self.book.delete_blacklist(id)?;

        Ok(json!({
            "success": true,
            "message": format!("Deleted blacklist entry {}", id)
        })
        .to_string())
    }

    pub async fn get_cut_config(&self, _arguments: &HashMap<String, Value>) -> Result<String> {
        let config = self.book.cut_config()?;

        Ok(json!({
            "success": true,
            "cutConfig": config
        })
        .to_string())
    }

    pub async fn save_cut_config(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let object = Value::Object(arguments.clone().into_iter().collect());
        let input: CutConfigInput = serde_json::from_value(amounts_as_strings(object))?;
        let saved = self.book.save_cut_config(&input)?;

        Ok(json!({
            "success": true,
            "cutConfig": saved
        })
        .to_string())
    }

    pub async fn classify_number(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let number = str_arg(arguments, "number")?;
        let classification = classify(number)?;
        let blocked = is_blocked(&classification.number, &blacklist_set(&self.book.blacklist()?));

        Ok(json!({
            "success": true,
            "classification": classification,
            "blocked": blocked
        })
        .to_string())
    }

    pub async fn record_entries(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let raw = arguments
            .get("entries")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("Missing entries parameter"))?;

        let inputs = raw
            .iter()
            .cloned()
            .map(|v| serde_json::from_value::<EntryInput>(amounts_as_strings(v)))
            .collect::<Result<Vec<_>, _>>()?;
        let recorded = self.book.record_entries(&inputs)?;

        Ok(json!({
            "success": true,
            "recorded_count": recorded.len(),
            "entries": recorded
        })
        .to_string())
    }

    pub async fn list_entries(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        if let Some(source) = arguments.get("source").and_then(|v| v.as_str()) {
            let source: Source = source.parse()?;
            let rows = self.book.source_view(source)?;
            return Ok(json!({
                "success": true,
                "source": source,
                "rows": rows
            })
            .to_string());
        }

        let entries = match arguments.get("buyer_id").and_then(|v| v.as_i64()) {
            Some(buyer_id) => self.book.entries_by_buyer(buyer_id)?,
            None => self.book.entries()?,
        };

        Ok(json!({
            "success": true,
            "entries": entries
        })
        .to_string())
    }

    pub async fn delete_entry_pair(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let buyer_id = i64_arg(arguments, "buyer_id")?;
        let number = str_arg(arguments, "number")?;
        let deleted = self.book.delete_pair(buyer_id, number)?;

        Ok(json!({
            "success": true,
            "deleted": deleted
        })
        .to_string())
    }

    pub async fn reset_entries(&self, _arguments: &HashMap<String, Value>) -> Result<String> {
        let deleted = self.book.reset()?;

        Ok(json!({
            "success": true,
            "deleted": deleted
        })
        .to_string())
    }
}

pub struct DrawUseCase {
    book: Arc<Book>,
    client: DrawClient,
}

impl DrawUseCase {
    pub fn new(book: Arc<Book>, client: DrawClient) -> Self {
        Self { book, client }
    }

    fn draw_day(arguments: &HashMap<String, Value>) -> Result<NaiveDate> {
        Ok(match arguments.get("date").and_then(|v| v.as_str()) {
            Some(raw) => parse_api_date(raw)?,
            None => latest_draw_date(bangkok_date(&Utc::now())),
        })
    }

    pub async fn fetch_draw_result(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let day = Self::draw_day(arguments)?;
        let draw = self.client.fetch_and_cache(&self.book, day).await?;

        Ok(json!({
            "success": true,
            "result": draw
        })
        .to_string())
    }

    pub async fn backfill_draw_results(
        &self,
        arguments: &HashMap<String, Value>,
    ) -> Result<String> {
        let year = i64_arg(arguments, "year")?;
        let year = i32::try_from(year).map_err(|_| anyhow::anyhow!("year out of range: {}", year))?;
        let today = bangkok_date(&Utc::now());
        let dates: Vec<_> = generate_lottery_dates(year)
            .into_iter()
            .filter(|(date, month, year)| {
                parse_api_date(&format!("{}-{}-{}", year, month, date)).is_ok_and(|d| d <= today)
            })
            .collect();

        let results = self
            .client
            .fetch_and_save_multiple_results(&self.book, &dates)
            .await?;

        Ok(json!({
            "success": true,
            "results_count": results.len(),
            "results": results
        })
        .to_string())
    }

    pub async fn check_winners(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let day = Self::draw_day(arguments)?;
        let draw = self.client.fetch_and_cache(&self.book, day).await?;
        let settlement = self.book.settle(&draw)?;

        Ok(json!({
            "success": true,
            "settlement": settlement
        })
        .to_string())
    }
}

pub struct ReportUseCase {
    book: Arc<Book>,
}

impl ReportUseCase {
    pub fn new(book: Arc<Book>) -> Self {
        Self { book }
    }

    pub async fn summary(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let length = digits_arg(arguments)?;
        let by_buyer = arguments
            .get("by_buyer")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if by_buyer {
            let buyers = self.book.summary_by_buyer()?;
            return Ok(json!({
                "success": true,
                "buyers": buyers
            })
            .to_string());
        }

        let summary = self.book.summary(length)?;
        Ok(json!({
            "success": true,
            "summary": summary
        })
        .to_string())
    }

    pub async fn dealer_sheet(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let length = digits_arg(arguments)?;
        let rows = self.book.dealer_sheet(length)?;

        Ok(json!({
            "success": true,
            "rows": rows
        })
        .to_string())
    }
}
