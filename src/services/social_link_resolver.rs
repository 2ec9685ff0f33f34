use std::time::Duration;

use fake_user_agent::get_rua;
use reqwest::header::USER_AGENT;
use scraper::{Html, Selector};
use url::Url;

use crate::configuration::Settings;
use crate::error::LinkResolutionError;

use super::with_retries;

const SOCIAL_DOMAINS: [&str; 2] = ["facebook.com", "fb.com"];

/// Stage 3: scans a listing's website for a link to its social page.
pub struct SocialLinkResolver {
    client: reqwest::Client,
    timeout: Duration,
    max_attempts: u32,
}

impl SocialLinkResolver {
    pub fn new(settings: &Settings) -> Result<Self, reqwest::Error> {
        Ok(SocialLinkResolver {
            client: reqwest::Client::builder().build()?,
            timeout: settings.http.page_timeout(),
            max_attempts: settings.pipeline.max_attempts,
        })
    }

    pub async fn resolve(&self, website: &str) -> Result<String, LinkResolutionError> {
        with_retries(self.max_attempts, || self.resolve_once(website)).await
    }

    async fn resolve_once(&self, website: &str) -> Result<String, LinkResolutionError> {
        let response = self
            .client
            .get(website)
            .header(USER_AGENT, get_rua())
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(LinkResolutionError::Status(response.status()));
        }
        let body = response.text().await?;
        extract_social_link(&body).ok_or(LinkResolutionError::NoSocialLink)
    }
}

/// First anchor pointing at a social page. Bare-domain placeholder links,
/// which carry no page-specific path, are skipped.
pub fn extract_social_link(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let a_tag_selector = Selector::parse("a").unwrap();

    document
        .select(&a_tag_selector)
        .filter_map(|tag| tag.value().attr("href"))
        .filter(|href| is_social_link(href))
        .find(|href| !is_placeholder(href))
        .map(|href| href.to_string())
}

fn is_social_link(href: &str) -> bool {
    let Ok(parsed) = Url::parse(href) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    SOCIAL_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}

fn is_placeholder(href: &str) -> bool {
    match Url::parse(href) {
        Ok(parsed) => matches!(parsed.path(), "" | "/") && parsed.query().is_none(),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::extract_social_link;

    #[test]
    fn first_social_anchor_wins() {
        let body = r#"
            <html><body>
                <a href="/about">About us</a>
                <a href="https://twitter.com/acme">Twitter</a>
                <a href="https://www.facebook.com/acmebakery">Facebook</a>
                <a href="https://www.facebook.com/acmebakery/reviews">Reviews</a>
            </body></html>
        "#;
        assert_eq!(
            extract_social_link(body),
            Some("https://www.facebook.com/acmebakery".to_string())
        );
    }

    #[test]
    fn short_domain_subpages_count() {
        let body = r#"<a href="https://fb.com/acmebakery">Find us</a>"#;
        assert_eq!(
            extract_social_link(body),
            Some("https://fb.com/acmebakery".to_string())
        );
    }

    #[test]
    fn bare_domain_placeholders_are_unresolved() {
        let body = r#"
            <a href="https://facebook.com">Facebook</a>
            <a href="http://www.facebook.com/">Facebook</a>
        "#;
        assert_eq!(extract_social_link(body), None);
    }

    #[test]
    fn placeholders_do_not_mask_a_later_real_link() {
        let body = r#"
            <a href="https://www.facebook.com">Facebook</a>
            <a href="https://www.facebook.com/acmebakery">Our page</a>
        "#;
        assert_eq!(
            extract_social_link(body),
            Some("https://www.facebook.com/acmebakery".to_string())
        );
    }

    #[test]
    fn unrelated_and_relative_links_are_ignored() {
        let body = r#"
            <a href="/facebook.com/not-really">local</a>
            <a href="https://notfacebook.com/acme">lookalike</a>
        "#;
        assert_eq!(extract_social_link(body), None);
    }
}
