use std::time::Duration;

use regex::Regex;

use crate::configuration::Settings;
use crate::error::IdentityResolutionError;

use super::{extract_security_token, random_proxy, session_client, with_retries};

const ROUTE_DEFINITION_URL: &str = "https://www.facebook.com/ajax/bulk-route-definitions/";

/// Stage 4: resolves a social page link to its stable numeric page id via
/// the token-authenticated route-definition call.
pub struct IdentityResolver {
    proxies: Vec<String>,
    timeout: Duration,
    max_attempts: u32,
}

impl IdentityResolver {
    pub fn new(settings: &Settings) -> Self {
        IdentityResolver {
            proxies: settings.http.proxies.clone(),
            timeout: settings.http.request_timeout(),
            max_attempts: settings.pipeline.max_attempts,
        }
    }

    pub async fn resolve(&self, social_link: &str) -> Result<String, IdentityResolutionError> {
        // A bare-domain link leaves no sub-route to resolve; retrying cannot
        // change that.
        let route = sub_route(social_link).ok_or(IdentityResolutionError::NoSubRoute)?;
        with_retries(self.max_attempts, || self.resolve_once(social_link, &route)).await
    }

    async fn resolve_once(
        &self,
        social_link: &str,
        route: &str,
    ) -> Result<String, IdentityResolutionError> {
        // Fresh cookie session per attempt; the token is tied to it.
        let session = session_client(random_proxy(&self.proxies), self.timeout)?;
        let response = session.get(social_link).send().await?;
        if !response.status().is_success() {
            return Err(IdentityResolutionError::Status(response.status()));
        }
        let body = response.text().await?;
        let token = extract_security_token(&body).ok_or(IdentityResolutionError::TokenMissing)?;
        let comet_req = extract_comet_req(&body);

        let form = [
            ("route_urls[10]", format!("{}/videos", route)),
            ("__a", "1".to_string()),
            ("lsd", token.clone()),
            ("__comet_req", comet_req),
        ];
        let response = session
            .post(ROUTE_DEFINITION_URL)
            .header("X-Fb-Lsd", &token)
            .form(&form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IdentityResolutionError::Status(response.status()));
        }
        let body = response.text().await?;
        extract_page_id(&body).ok_or(IdentityResolutionError::PageIdMissing)
    }
}

/// Percent-encoded path of the page URL, without its trailing slash. `None`
/// when the link points at the bare domain.
pub fn sub_route(link: &str) -> Option<String> {
    let (_, path) = link.split_once(".com")?;
    let path = path.trim_end_matches('/');
    if path.trim().is_empty() {
        return None;
    }
    Some(path.replace('/', "%2F"))
}

fn extract_comet_req(body: &str) -> String {
    let pattern = Regex::new(r"__comet_req=(\d+)").unwrap();
    pattern
        .captures(body)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "15".to_string())
}

pub fn extract_page_id(body: &str) -> Option<String> {
    let pattern = Regex::new(r#""pageID":"(.*?)""#).unwrap();
    pattern.captures(body).map(|caps| caps[1].to_string())
}
