use std::future::Future;
use std::time::Duration;

use fake_user_agent::get_rua;
use reqwest::header::USER_AGENT;
use serde_json::Value;
use url::Url;

use crate::configuration::Settings;
use crate::domain::{Coordinate, Listing, WorkingSet};
use crate::error::DiscoveryPageError;

use super::with_retries;

const MAP_RESULTS_URL: &str = "https://www.google.com/search";

/// Opaque protocol-buffer parameter the map results endpoint expects. Only
/// the viewport coordinates and the result offset vary between requests.
const PAGE_REQUEST_TEMPLATE: &str = "!4m12!1m3!1d0!2d{lat}!3d{lng}!2m3!1f0!2f0!3f0!3m2!1i1920!2i953!4f13.1!7i20!8i{offset}!10b1!12m31!1m1!18b1!2m3!5m1!6e2!20e3!6m12!4b1!49b1!63m0!73m0!74i150000!75b1!85b1!89b1!91b1!110m0!114b1!149b1!10b1!12b1!13b1!14b1!16b1!17m1!3e1!20m4!5e2!6b1!8b1!14b1!19m4!2m3!1i360!2i120!4i8!20m57!2m2!1i203!2i100!3m2!2i4!5b1!6m6!1m2!1i86!2i86!1m2!1i408!2i240!7m42!1m3!1e1!2b0!3e3!1m3!1e2!2b1!3e2!1m3!1e2!2b0!3e3!1m3!1e8!2b0!3e3!1m3!1e10!2b0!3e3!1m3!1e10!2b1!3e2!1m3!1e9!2b1!3e2!1m3!1e10!2b0!3e3!1m3!1e10!2b1!3e2!1m3!1e10!2b0!3e4!2b1!4b1!9b0!22m2!1stest!7e81!24m78!1m26!13m9!2b1!3b1!4b1!6i1!8b1!9b1!14b1!20b1!25b1!18m15!3b1!4b1!5b1!6b1!13b1!14b1!15b1!17b1!21b1!22b0!25b1!27m1!1b0!28b0!30b0!2b1!5m5!2b1!5b1!6b1!7b1!10b1!10m1!8e3!11m1!3e1!14m1!3b1!17b1!20m2!1e3!1e6!24b1!25b1!26b1!29b1!30m1!2b1!36b1!39m3!2m2!2i1!3i1!43b1!52b1!54m1!1b1!55b1!56m2!1b1!3b1!65m5!3m4!1m3!1m2!1i224!2i298!71b1!72m4!1m2!3b1!5b1!4b1!89b1!103b1!113b1!26m4!2m3!1i80!2i92!4i8!30m28!1m6!1m2!1i0!2i0!2m2!1i530!2i953!1m6!1m2!1i1870!2i0!2m2!1i1920!2i953!1m6!1m2!1i0!2i0!2m2!1i1920!2i20!1m6!1m2!1i0!2i933!2m2!1i1920!2i953!34m19!2b1!3b1!4b1!6b1!7b1!8m6!1b1!3b1!4b1!5b1!6b1!7b1!9b1!12b1!14b1!20b1!23b1!25b1!26b1!37m1!1e81!42b1!46m1!1e1!47m0!49m6!3b1!6m2!1b1!2b1!7m1!1e3!50m25!1m21!2m7!1u3!4stest!5e1!9stest!10m2!3m1!1e1!2m7!1u2!4stest!5e1!9stest!10m2!2m1!1e1!3m1!1u3!3m1!1u2!4BIAE!2e2!3m1!3b1!59BQ2dBd0Fn!67m3!7b1!10b1!14b0!69i653";

/// Stage 2: paginates the map results endpoint around an origin and builds
/// the initial working set.
pub struct ListingDiscoverer {
    client: reqwest::Client,
    timeout: Duration,
    max_pages: u32,
    page_size: u32,
    max_attempts: u32,
}

/// One raw result off a map page, before the radius/dedup filter.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPlace {
    pub name: String,
    pub link: Option<String>,
    pub address: Option<String>,
    pub location: Coordinate,
}

impl ListingDiscoverer {
    pub fn new(settings: &Settings) -> Result<Self, reqwest::Error> {
        Ok(ListingDiscoverer {
            client: reqwest::Client::builder().build()?,
            timeout: settings.http.page_timeout(),
            max_pages: settings.pipeline.max_pages,
            page_size: settings.pipeline.page_size,
            max_attempts: settings.pipeline.max_attempts,
        })
    }

    pub async fn discover(
        &self,
        query: &str,
        radius_miles: f64,
        origin: Coordinate,
    ) -> WorkingSet {
        self.paginate(radius_miles, origin, |page_index| {
            self.fetch_page(query, origin, page_index)
        })
        .await
    }

    async fn paginate<F, Fut>(&self, radius_miles: f64, origin: Coordinate, mut fetch: F) -> WorkingSet
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Vec<DiscoveredPlace>, DiscoveryPageError>>,
    {
        let mut listings = WorkingSet::new();
        for page_index in 0..self.max_pages {
            let places = match fetch(page_index).await {
                Ok(places) => places,
                Err(e) => {
                    // A skipped page does not count toward early termination.
                    log::error!("skipping results page {}: {}", page_index + 1, e);
                    continue;
                }
            };

            let added = admit_places(&mut listings, places, origin, radius_miles);
            log::info!(
                "results page {} added {} listings ({} total)",
                page_index + 1,
                added,
                listings.len()
            );
            if added == 0 {
                break;
            }
        }
        listings
    }

    async fn fetch_page(
        &self,
        query: &str,
        origin: Coordinate,
        page_index: u32,
    ) -> Result<Vec<DiscoveredPlace>, DiscoveryPageError> {
        with_retries(self.max_attempts, || {
            self.fetch_page_once(query, origin, page_index)
        })
        .await
    }

    async fn fetch_page_once(
        &self,
        query: &str,
        origin: Coordinate,
        page_index: u32,
    ) -> Result<Vec<DiscoveredPlace>, DiscoveryPageError> {
        let params = [
            ("tbm", "map".to_string()),
            ("authuser", "0".to_string()),
            ("hl", "en".to_string()),
            ("pb", build_page_request(origin, self.page_size * page_index)),
            ("q", query.to_string()),
            ("tch", "1".to_string()),
            ("ech", (page_index + 1).to_string()),
        ];
        let response = self
            .client
            .get(MAP_RESULTS_URL)
            .query(&params)
            .header(USER_AGENT, get_rua())
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DiscoveryPageError::Status(response.status()));
        }
        let body = response.text().await?;
        parse_listing_batch(&body)
    }
}

/// Applies the keep rules to one page of results: unseen name, resolvable
/// link, strictly inside the radius. Returns how many listings were added.
fn admit_places(
    listings: &mut WorkingSet,
    places: Vec<DiscoveredPlace>,
    origin: Coordinate,
    radius_miles: f64,
) -> usize {
    let mut added = 0;
    for place in places {
        if listings.contains(&place.name) {
            continue;
        }
        let distance = origin.distance_miles(&place.location);
        if distance >= radius_miles {
            continue;
        }
        let Some(website) = place.link.as_deref().and_then(site_origin) else {
            continue;
        };
        if listings.insert(Listing::new(place.name, website, place.address, distance)) {
            added += 1;
        }
    }
    added
}

/// Reduces a raw result link to its `scheme://host` origin.
pub fn site_origin(raw: &str) -> Option<String> {
    let raw = raw.strip_prefix("/url?q=").unwrap_or(raw);
    let parsed = Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{}", parsed.scheme(), host))
}

fn build_page_request(origin: Coordinate, offset: u32) -> String {
    PAGE_REQUEST_TEMPLATE
        .replace("{lat}", &origin.lat.to_string())
        .replace("{lng}", &origin.lng.to_string())
        .replace("{offset}", &offset.to_string())
}

/// The results endpoint double-encodes its payload: an anti-JSON guard, an
/// envelope object, and the actual result list as a JSON string in `d`.
pub fn parse_listing_batch(body: &str) -> Result<Vec<DiscoveredPlace>, DiscoveryPageError> {
    let cleaned = body.replace("/*\"\"*/", "").replace(")]}'", "");
    let envelope: Value = serde_json::from_str(cleaned.trim())
        .map_err(|e| DiscoveryPageError::Payload(format!("bad envelope: {}", e)))?;
    let inner = envelope["d"]
        .as_str()
        .ok_or_else(|| DiscoveryPageError::Payload("missing d member".to_string()))?;
    let results: Value = serde_json::from_str(inner)
        .map_err(|e| DiscoveryPageError::Payload(format!("bad result payload: {}", e)))?;
    let entries = results[0][1]
        .as_array()
        .ok_or_else(|| DiscoveryPageError::Payload("missing result list".to_string()))?;

    // The first entry is pagination metadata, not a place.
    Ok(entries.iter().skip(1).filter_map(parse_place).collect())
}

fn parse_place(entry: &Value) -> Option<DiscoveredPlace> {
    let record = entry.as_array()?.last()?;
    let name = record[11].as_str()?.to_string();
    let coords = record[9].as_array()?;
    let (lat, lng) = match coords.as_slice() {
        [_, _, lat, lng, ..] => (lat.as_f64()?, lng.as_f64()?),
        _ => return None,
    };
    let link = record[7][0].as_str().map(|s| s.to_string());
    let address = record[2].as_array().map(|lines| {
        lines
            .iter()
            .filter_map(|line| line.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    });

    Some(DiscoveredPlace {
        name,
        link,
        address,
        location: Coordinate { lat, lng },
    })
}
