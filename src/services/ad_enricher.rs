use std::time::Duration;

use fake_user_agent::get_rua;
use reqwest::header::{CACHE_CONTROL, USER_AGENT};
use serde_json::Value;

use crate::configuration::Settings;
use crate::domain::{AdCreative, CreativeFormat};
use crate::error::EnrichmentError;

use super::{extract_security_token, random_proxy, session_client, with_retries};

const ADS_LIBRARY_URL: &str = "https://www.facebook.com/ads/library/";
const ADS_SEARCH_URL: &str = "https://www.facebook.com/ads/library/async/search_ads/";
const RATE_LIMIT_MARKER: &str = "\"error\":3252001";

/// Stage 5: queries the ads library for a page id and extracts active
/// creatives. The most rate-limited surface in the pipeline.
pub struct AdEnricher {
    proxies: Vec<String>,
    timeout: Duration,
    max_attempts: u32,
    max_ad_groups: usize,
}

impl AdEnricher {
    pub fn new(settings: &Settings) -> Self {
        AdEnricher {
            proxies: settings.http.proxies.clone(),
            timeout: settings.http.request_timeout(),
            max_attempts: settings.pipeline.max_attempts,
            max_ad_groups: settings.pipeline.max_ad_groups,
        }
    }

    /// An empty result is a successful outcome: the page runs no eligible
    /// ads, and retrying would not change that.
    pub async fn enrich(&self, page_id: &str) -> Result<Vec<AdCreative>, EnrichmentError> {
        with_retries(self.max_attempts, || self.enrich_once(page_id)).await
    }

    async fn enrich_once(&self, page_id: &str) -> Result<Vec<AdCreative>, EnrichmentError> {
        let session = session_client(random_proxy(&self.proxies), self.timeout)?;
        let landing = [
            ("active_status", "all"),
            ("ad_type", "all"),
            ("country", "ALL"),
            ("view_all_page_id", page_id),
            ("search_type", "page"),
            ("media_type", "all"),
        ];
        let response = session
            .get(ADS_LIBRARY_URL)
            .query(&landing)
            .header(USER_AGENT, get_rua())
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(EnrichmentError::Status(response.status()));
        }
        let body = response.text().await?;
        let token = extract_security_token(&body).ok_or(EnrichmentError::TokenMissing)?;

        let search = [
            ("count", "30"),
            ("active_status", "all"),
            ("ad_type", "all"),
            ("countries[0]", "ALL"),
            ("view_all_page_id", page_id),
            ("media_type", "all"),
            ("search_type", "page"),
        ];
        let form = [("__a", "1"), ("lsd", token.as_str())];
        let response = session
            .post(ADS_SEARCH_URL)
            .query(&search)
            .header("X-Fb-Lsd", &token)
            .form(&form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(EnrichmentError::Status(response.status()));
        }
        let body = response.text().await?;
        if body.contains(RATE_LIMIT_MARKER) {
            return Err(EnrichmentError::RateLimited);
        }

        let results = parse_search_payload(&body)?;
        Ok(extract_creatives(&results, self.max_ad_groups))
    }
}

/// Strips the anti-JSON guard and digs out `payload.results`. A null result
/// list means the page simply has no ads.
pub fn parse_search_payload(body: &str) -> Result<Value, EnrichmentError> {
    let (_, raw) = body
        .split_once("(;;);")
        .ok_or_else(|| EnrichmentError::Payload("missing response guard".to_string()))?;
    let envelope: Value = serde_json::from_str(raw.trim())
        .map_err(|e| EnrichmentError::Payload(format!("bad search payload: {}", e)))?;
    Ok(envelope["payload"]["results"].clone())
}

/// Walks the ad groups, keeping the first active ad with a recognized
/// creative format from each group.
pub fn extract_creatives(results: &Value, max_groups: usize) -> Vec<AdCreative> {
    let Some(groups) = results.as_array() else {
        return Vec::new();
    };

    let mut creatives = Vec::new();
    for group in groups.iter().take(max_groups) {
        let Some(entries) = group.as_array() else {
            continue;
        };
        for entry in entries {
            if !entry["isActive"].as_bool().unwrap_or(false) {
                continue;
            }
            let snapshot = &entry["snapshot"];
            let Some(format) = CreativeFormat::from_snapshot(snapshot) else {
                continue;
            };
            if let Some(creative) = format.extract(snapshot) {
                creatives.push(creative);
                break;
            }
        }
    }
    creatives
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::error::EnrichmentError;

    use super::{extract_creatives, parse_search_payload};

    fn image_ad(active: bool, copy: &str) -> Value {
        json!({
            "isActive": active,
            "snapshot": {
                "display_format": "image",
                "body": { "markup": { "__html": copy } },
                "images": [{ "original_image_url": "https://cdn.example.com/ad.jpg" }],
                "title": "Shop now",
                "link_url": "https://example.com/shop"
            }
        })
    }

    #[test]
    fn first_active_recognized_ad_per_group() {
        let results = json!([[image_ad(false, "old"), image_ad(true, "current"), image_ad(true, "extra")]]);
        let creatives = extract_creatives(&results, 20);

        assert_eq!(creatives.len(), 1);
        assert_eq!(creatives[0].copy_text, "current");
    }

    #[test]
    fn unrecognized_formats_are_skipped_within_a_group() {
        let dco = json!({
            "isActive": true,
            "snapshot": { "display_format": "dco" }
        });
        let results = json!([[dco, image_ad(true, "fallback")]]);
        let creatives = extract_creatives(&results, 20);

        assert_eq!(creatives.len(), 1);
        assert_eq!(creatives[0].copy_text, "fallback");
    }

    #[test]
    fn group_scan_is_capped() {
        let groups: Vec<Value> = (0..25)
            .map(|i| json!([image_ad(true, &format!("ad {}", i))]))
            .collect();
        let creatives = extract_creatives(&json!(groups), 20);
        assert_eq!(creatives.len(), 20);
    }

    #[test]
    fn null_results_mean_no_ads() {
        assert!(extract_creatives(&Value::Null, 20).is_empty());
        assert!(extract_creatives(&json!([]), 20).is_empty());
    }

    #[test]
    fn search_payload_sits_behind_the_guard() {
        let body = format!(
            "for (;;);{}",
            json!({ "payload": { "results": [[image_ad(true, "hi")]] } })
        );
        let results = parse_search_payload(&body).unwrap();
        assert_eq!(extract_creatives(&results, 20).len(), 1);
    }

    #[test]
    fn guardless_body_is_a_payload_error() {
        assert!(matches!(
            parse_search_payload("<html>login wall</html>"),
            Err(EnrichmentError::Payload(_))
        ));
    }
}
