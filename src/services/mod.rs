use std::future::Future;
use std::time::Duration;

use rand::seq::SliceRandom;
use regex::Regex;

pub mod ad_enricher;
pub mod geo_resolver;
pub mod identity_resolver;
pub mod listing_discoverer;
pub mod social_link_resolver;

pub use ad_enricher::*;
pub use geo_resolver::*;
pub use identity_resolver::*;
pub use listing_discoverer::*;
pub use social_link_resolver::*;

/// Runs `operation` until it succeeds, up to `max_attempts` times with no
/// delay between attempts. Returns the last error on exhaustion.
pub async fn with_retries<T, E, F, Fut>(max_attempts: u32, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(_) if attempt < max_attempts => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

pub(crate) fn random_proxy(proxies: &[String]) -> Option<&str> {
    proxies.choose(&mut rand::thread_rng()).map(String::as_str)
}

/// Cookie-store client for the token-authenticated calls, optionally routed
/// through an upstream proxy.
pub(crate) fn session_client(
    proxy: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().cookie_store(true).timeout(timeout);
    if let Some(proxy_url) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }
    builder.build()
}

/// Short-lived LSD security token embedded in page markup. Both the social
/// pages and the ads library carry it in the same shape.
pub fn extract_security_token(body: &str) -> Option<String> {
    let pattern = Regex::new(r#""LSD",\[\],\{"token":"(.*?)""#).unwrap();
    pattern.captures(body).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::{extract_security_token, with_retries};

    #[tokio::test]
    async fn with_retries_stops_after_first_success() {
        let calls = Cell::new(0u32);
        let result: Result<u32, &str> = with_retries(3, || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt < 2 {
                    Err("boom")
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn with_retries_returns_last_error_on_exhaustion() {
        let calls = Cell::new(0u32);
        let result: Result<(), String> = with_retries(3, || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move { Err(format!("attempt {}", attempt)) }
        })
        .await;

        assert_eq!(result, Err("attempt 3".to_string()));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn security_token_is_extracted_from_markup() {
        let body = r#"..."LSD",[],{"token":"AVrkPzzB6i4"},123]..."#;
        assert_eq!(extract_security_token(body), Some("AVrkPzzB6i4".to_string()));
    }

    #[test]
    fn missing_security_token_is_none() {
        assert_eq!(extract_security_token("<html></html>"), None);
    }
}
