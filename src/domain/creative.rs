use serde_json::Value;

use super::listing::AdCreative;

/// Recognized ad display formats. Anything else is ineligible for
/// extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreativeFormat {
    Video,
    Image,
    Carousel,
}

impl CreativeFormat {
    pub fn from_snapshot(snapshot: &Value) -> Option<Self> {
        match snapshot["display_format"].as_str()? {
            "video" => Some(CreativeFormat::Video),
            "image" => Some(CreativeFormat::Image),
            "carousel" => Some(CreativeFormat::Carousel),
            _ => None,
        }
    }

    /// Pulls one creative out of an ad snapshot. The field paths differ per
    /// format; carousel ads keep their headline and destination on the first
    /// card instead of the snapshot itself.
    pub fn extract(&self, snapshot: &Value) -> Option<AdCreative> {
        let copy_text = unescape_html(snapshot["body"]["markup"]["__html"].as_str()?);
        let (media_url, headline, destination_url) = match self {
            CreativeFormat::Video => {
                let media = non_empty(snapshot["videos"][0]["video_hd_url"].as_str())
                    .or_else(|| non_empty(snapshot["videos"][0]["video_sd_url"].as_str()))
                    .or_else(|| non_empty(snapshot["images"][0]["original_image_url"].as_str()))?;
                (media.to_string(), title_of(snapshot), link_of(snapshot))
            }
            CreativeFormat::Image => {
                let media = non_empty(snapshot["images"][0]["original_image_url"].as_str())?;
                (media.to_string(), title_of(snapshot), link_of(snapshot))
            }
            CreativeFormat::Carousel => {
                let card = &snapshot["cards"][0];
                let media = non_empty(card["original_image_url"].as_str())
                    .or_else(|| non_empty(card["video_hd_url"].as_str()))
                    .or_else(|| non_empty(card["video_sd_url"].as_str()))?;
                (media.to_string(), title_of(card), link_of(card))
            }
        };

        Some(AdCreative {
            copy_text,
            media_url,
            headline,
            destination_url,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn title_of(node: &Value) -> String {
    node["title"].as_str().unwrap_or_default().to_string()
}

fn link_of(node: &Value) -> String {
    node["link_url"].as_str().unwrap_or_default().to_string()
}

/// Minimal HTML entity decoding for ad body markup.
pub fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
