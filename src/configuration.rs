use std::time::Duration;

use serde_aux::field_attributes::deserialize_number_from_string;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub http: HttpSettings,
    pub pipeline: PipelineSettings,
    pub export: ExportSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct HttpSettings {
    /// Upstream proxies for the token-authenticated calls; one is picked at
    /// random per session. Empty means direct connections.
    #[serde(default)]
    pub proxies: Vec<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub request_timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub page_timeout_secs: u64,
}

#[derive(serde::Deserialize, Clone)]
pub struct PipelineSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_pages: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub page_size: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_attempts: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub link_concurrency: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub identity_concurrency: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub ads_concurrency: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_ad_groups: usize,
}

#[derive(serde::Deserialize, Clone)]
pub struct ExportSettings {
    pub directory: String,
}

impl HttpSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let settings = config::Config::builder()
        .add_source(config::File::from(base_path.join("configuration.yaml")))
        .add_source(
            config::Environment::with_prefix("DRAGNET")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
