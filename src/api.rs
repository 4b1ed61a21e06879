use chrono::NaiveDate;
use reqwest::Client;
use tracing::{info, warn};

use crate::book::Book;
use crate::config::Config;
use crate::error::{PoolError, Result};
use crate::types::{DrawResult, LotteryRequest, LotteryResponse};
use crate::utils::{format_date_for_api, split_date};

/// Client for the GLO result-checking endpoint.
pub struct DrawClient {
    client: Client,
    url: String,
}

impl DrawClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.fetch_timeout()).build()?;
        Ok(Self {
            client,
            url: config.glo_api_url.clone(),
        })
    }

    pub async fn fetch_lottery_result(
        &self,
        date: &str,
        month: &str,
        year: &str,
    ) -> Result<LotteryResponse> {
        let request_body = LotteryRequest {
            date: date.to_string(),
            month: month.to_string(),
            year: year.to_string(),
        };

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;

        let lottery_response: LotteryResponse = response.json().await?;
        Ok(lottery_response)
    }

    pub async fn fetch_draw(&self, date: &str, month: &str, year: &str) -> Result<DrawResult> {
        info!("Fetching lottery results for {}/{}/{}", date, month, year);
        let response = self.fetch_lottery_result(date, month, year).await?;
        draw_from_response(response).inspect_err(|e| {
            warn!("✗ No usable result for {}/{}/{}: {}", date, month, year, e);
        })
    }

    /// Returns the cached result for `day` or fetches and caches it.
    pub async fn fetch_and_cache(&self, book: &Book, day: NaiveDate) -> Result<DrawResult> {
        let (date, month, year) = split_date(day);
        let key = format_date_for_api(&date, &month, &year);
        if let Some(cached) = book.cached_draw(&key)? {
            info!("✓ {} (already exists)", key);
            return Ok(cached);
        }

        let draw = self.fetch_draw(&date, &month, &year).await?;
        book.cache_draw(&draw)?;
        Ok(draw)
    }

    /// Fetches every date not yet cached. Failed dates are logged and skipped.
    pub async fn fetch_and_save_multiple_results(
        &self,
        book: &Book,
        dates: &[(String, String, String)],
    ) -> Result<Vec<DrawResult>> {
        info!("🔍 Checking existing draw results...");
        let (dates_to_fetch, existing_dates) = book.missing_draw_dates(dates)?;

        if !existing_dates.is_empty() {
            info!("📋 Found {} cached dates", existing_dates.len());
        }
        if dates_to_fetch.is_empty() {
            info!("🎯 All requested dates already cached. No fetching needed!");
            return Ok(Vec::new());
        }

        let mut all_results = Vec::new();
        for (date, month, year) in dates_to_fetch {
            match self.fetch_draw(&date, &month, &year).await {
                Ok(draw) => {
                    book.cache_draw(&draw)?;
                    all_results.push(draw);
                }
                Err(e) if e.is_retryable() => continue,
                Err(e) => return Err(e),
            }
        }

        info!("🎯 Saved {} new draw results", all_results.len());
        Ok(all_results)
    }
}

pub fn draw_from_response(response: LotteryResponse) -> Result<DrawResult> {
    if !response.status || response.status_code != 200 {
        return Err(PoolError::UpstreamFetch(format!(
            "API error: {} ({})",
            response.status_message, response.status_code
        )));
    }
    let result = response
        .response
        .and_then(|data| data.result)
        .ok_or_else(|| PoolError::UpstreamFetch("no lottery result in response".to_string()))?;
    DrawResult::try_from(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "statusMessage": "Success",
        "statusCode": 200,
        "status": true,
        "response": {
            "result": {
                "date": "2026-10-16",
                "data": {
                    "first": {"price": "6000000", "number": [{"round": 1, "value": "820866"}]},
                    "last2": {"price": "2000", "number": [{"round": 1, "value": "99"}]},
                    "last3f": {"price": "4000", "number": [
                        {"round": 1, "value": "231"}, {"round": 2, "value": "508"}
                    ]},
                    "last3b": {"price": "4000", "number": [
                        {"round": 1, "value": "017"}, {"round": 2, "value": "773"}
                    ]}
                }
            }
        }
    }"#;

    #[test]
    fn test_response_maps_to_draw_result() {
        let response: LotteryResponse = serde_json::from_str(SAMPLE).unwrap();
        let draw = draw_from_response(response).unwrap();
        assert_eq!(draw.date.key(), "2026-10-16");
        assert_eq!(draw.data.first_prize, "820866");
        assert_eq!(draw.data.last_two_digits, "99");
        assert_eq!(draw.data.three_digit_front.len(), 2);
        assert_eq!(draw.data.three_digit_back[1].value, "773");
    }

    #[test]
    fn test_api_error_status_is_upstream_failure() {
        let response: LotteryResponse = serde_json::from_str(
            r#"{
                "statusMessage": "Not found",
                "statusCode": 404,
                "status": false,
                "response": null
            }"#,
        )
        .unwrap();
        let err = draw_from_response(response).unwrap_err();
        assert!(matches!(err, PoolError::UpstreamFetch(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_malformed_prize_is_rejected() {
        let broken = SAMPLE.replace("820866", "82086");
        let response: LotteryResponse = serde_json::from_str(&broken).unwrap();
        assert!(matches!(
            draw_from_response(response),
            Err(PoolError::UpstreamFetch(_))
        ));
    }

    #[tokio::test]
    async fn test_cached_draw_skips_network() {
        let book = Book::in_memory(Default::default()).unwrap();
        let response: LotteryResponse = serde_json::from_str(SAMPLE).unwrap();
        book.cache_draw(&draw_from_response(response).unwrap()).unwrap();

        let client = DrawClient::new(&Config {
            glo_api_url: "http://127.0.0.1:9/unreachable".to_string(),
            fetch_timeout_secs: 1,
            ..Config::default()
        })
        .unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let draw = client.fetch_and_cache(&book, day).await.unwrap();
        assert_eq!(draw.data.first_prize, "820866");

        let fetched = client
            .fetch_and_save_multiple_results(&book, &[split_date(day)])
            .await
            .unwrap();
        assert!(fetched.is_empty());
    }
}
