use reqwest::StatusCode;
use thiserror::Error;

/// The only errors `Pipeline::run` surfaces to its caller. Everything else
/// degrades by pruning listings from the working set.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("no initialization payload in map search response")]
    PayloadMissing,
}

#[derive(Debug, Error)]
pub enum DiscoveryPageError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("map search returned status {0}")]
    Status(StatusCode),
    #[error("unexpected page payload: {0}")]
    Payload(String),
}

#[derive(Debug, Error)]
pub enum LinkResolutionError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("website returned status {0}")]
    Status(StatusCode),
    #[error("no social page link on website")]
    NoSocialLink,
}

#[derive(Debug, Error)]
pub enum IdentityResolutionError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("social page returned status {0}")]
    Status(StatusCode),
    #[error("no security token on social page")]
    TokenMissing,
    #[error("social link has no path to derive a sub-route from")]
    NoSubRoute,
    #[error("route resolution response carried no page id")]
    PageIdMissing,
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("ads library returned status {0}")]
    Status(StatusCode),
    #[error("no security token on ads library page")]
    TokenMissing,
    #[error("ads library rejected the search")]
    RateLimited,
    #[error("unexpected ads payload: {0}")]
    Payload(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
