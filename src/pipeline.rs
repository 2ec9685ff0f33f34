use std::fmt;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::configuration::Settings;
use crate::domain::{AdCreative, WorkingSet};
use crate::error::PipelineError;
use crate::export::{ExportReport, ResultExporter};
use crate::services::{
    AdEnricher, GeoResolver, IdentityResolver, ListingDiscoverer, SocialLinkResolver,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Geocoding,
    Discovering,
    LinkResolving,
    IdentityResolving,
    AdEnriching,
    Exporting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Geocoding => "searching the location",
            Stage::Discovering => "discovering listings",
            Stage::LinkResolving => "resolving social links",
            Stage::IdentityResolving => "resolving page ids",
            Stage::AdEnriching => "searching ad libraries",
            Stage::Exporting => "exporting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Read-only progress snapshot; `total` is zero for stages without a fixed
/// item count.
#[derive(Debug, Clone)]
pub struct Progress {
    pub stage: Stage,
    pub completed: usize,
    pub total: usize,
}

/// Drives the five stages over one shared working set. Each stage fans out
/// to a bounded worker pool, fully joins, then a single drain pass applies
/// the keep/drop decisions before the next stage reads the set.
pub struct Pipeline {
    geo: GeoResolver,
    discoverer: ListingDiscoverer,
    links: Arc<SocialLinkResolver>,
    identities: Arc<IdentityResolver>,
    ads: Arc<AdEnricher>,
    exporter: ResultExporter,
    link_concurrency: usize,
    identity_concurrency: usize,
    ads_concurrency: usize,
    progress: watch::Sender<Progress>,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Result<Self, reqwest::Error> {
        let (progress, _) = watch::channel(Progress {
            stage: Stage::Geocoding,
            completed: 0,
            total: 0,
        });

        Ok(Pipeline {
            geo: GeoResolver::new(&settings)?,
            discoverer: ListingDiscoverer::new(&settings)?,
            links: Arc::new(SocialLinkResolver::new(&settings)?),
            identities: Arc::new(IdentityResolver::new(&settings)),
            ads: Arc::new(AdEnricher::new(&settings)),
            exporter: ResultExporter::new(&settings),
            link_concurrency: settings.pipeline.link_concurrency,
            identity_concurrency: settings.pipeline.identity_concurrency,
            ads_concurrency: settings.pipeline.ads_concurrency,
            progress,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub async fn run(&self, query: &str, radius_miles: f64) -> Result<ExportReport, PipelineError> {
        self.publish(Stage::Geocoding, 0, 0);
        let origin = match self.geo.resolve(query).await {
            Ok(origin) => origin,
            Err(e) => {
                self.publish(Stage::Failed, 0, 0);
                return Err(e.into());
            }
        };
        log::info!(
            "resolved \"{}\" to ({}, {})",
            query,
            origin.lat,
            origin.lng
        );

        self.publish(Stage::Discovering, 0, 0);
        let mut listings = self.discoverer.discover(query, radius_miles, origin).await;
        log::info!(
            "found {} listings within {} miles",
            listings.len(),
            radius_miles
        );

        self.resolve_links(&mut listings).await;
        self.resolve_identities(&mut listings).await;
        self.enrich_ads(&mut listings).await;

        self.publish(Stage::Exporting, 0, listings.len());
        let report = self.exporter.export(&listings, query)?;
        self.publish(Stage::Done, report.rows, report.rows);
        Ok(report)
    }

    async fn resolve_links(&self, listings: &mut WorkingSet) {
        let total = listings.len();
        self.publish(Stage::LinkResolving, 0, total);

        let semaphore = pool(self.link_concurrency, total);
        let mut workers = JoinSet::new();
        for listing in listings.iter() {
            let resolver = Arc::clone(&self.links);
            let semaphore = Arc::clone(&semaphore);
            let name = listing.name.clone();
            let website = listing.website.clone();
            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                match resolver.resolve(&website).await {
                    Ok(link) => (name, Some(link)),
                    Err(e) => {
                        log::error!("dropping {}: {}", name, e);
                        (name, None)
                    }
                }
            });
        }

        let outcomes = self.join_stage(Stage::LinkResolving, total, &mut workers).await;
        apply_link_outcomes(listings, outcomes);
        log::info!("{} of {} listings have a social page", listings.len(), total);
    }

    async fn resolve_identities(&self, listings: &mut WorkingSet) {
        let total = listings.len();
        self.publish(Stage::IdentityResolving, 0, total);

        let semaphore = pool(self.identity_concurrency, total);
        let mut workers = JoinSet::new();
        for listing in listings.iter() {
            let Some(social_link) = listing.social_link.clone() else {
                continue;
            };
            let resolver = Arc::clone(&self.identities);
            let semaphore = Arc::clone(&semaphore);
            let name = listing.name.clone();
            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                match resolver.resolve(&social_link).await {
                    Ok(page_id) => (name, Some(page_id)),
                    Err(e) => {
                        log::error!("dropping {}: {}", name, e);
                        (name, None)
                    }
                }
            });
        }

        let outcomes = self
            .join_stage(Stage::IdentityResolving, total, &mut workers)
            .await;
        apply_identity_outcomes(listings, outcomes);
        log::info!("{} of {} listings have a page id", listings.len(), total);
    }

    async fn enrich_ads(&self, listings: &mut WorkingSet) {
        let total = listings.len();
        self.publish(Stage::AdEnriching, 0, total);

        let semaphore = pool(self.ads_concurrency, total);
        let mut workers = JoinSet::new();
        for listing in listings.iter() {
            let Some(page_id) = listing.page_id.clone() else {
                continue;
            };
            let enricher = Arc::clone(&self.ads);
            let semaphore = Arc::clone(&semaphore);
            let name = listing.name.clone();
            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                match enricher.enrich(&page_id).await {
                    Ok(ads) if ads.is_empty() => {
                        log::info!("dropping {}: no active ads", name);
                        (name, None)
                    }
                    Ok(ads) => (name, Some(ads)),
                    Err(e) => {
                        log::error!("dropping {}: {}", name, e);
                        (name, None)
                    }
                }
            });
        }

        let outcomes = self.join_stage(Stage::AdEnriching, total, &mut workers).await;
        apply_ad_outcomes(listings, outcomes);
        log::info!("{} of {} listings run active ads", listings.len(), total);
    }

    async fn join_stage<T: Send + 'static>(
        &self,
        stage: Stage,
        total: usize,
        workers: &mut JoinSet<(String, Option<T>)>,
    ) -> Vec<(String, Option<T>)> {
        let mut outcomes = Vec::new();
        let mut completed = 0;
        while let Some(joined) = workers.join_next().await {
            completed += 1;
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => log::error!("stage worker panicked: {}", e),
            }
            self.publish(stage, completed, total);
        }
        outcomes
    }

    fn publish(&self, stage: Stage, completed: usize, total: usize) {
        self.progress.send_replace(Progress {
            stage,
            completed,
            total,
        });
    }
}

fn pool(limit: usize, items: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(limit.min(items).max(1)))
}

fn apply_link_outcomes(listings: &mut WorkingSet, outcomes: Vec<(String, Option<String>)>) {
    for (name, link) in outcomes {
        if let Some(link) = link {
            if let Some(listing) = listings.get_mut(&name) {
                listing.social_link = Some(link);
            }
        }
    }
    listings.retain(|listing| listing.social_link.is_some());
}

fn apply_identity_outcomes(listings: &mut WorkingSet, outcomes: Vec<(String, Option<String>)>) {
    for (name, page_id) in outcomes {
        if let Some(page_id) = page_id {
            if let Some(listing) = listings.get_mut(&name) {
                listing.page_id = Some(page_id);
            }
        }
    }
    listings.retain(|listing| listing.page_id.is_some());
}

fn apply_ad_outcomes(listings: &mut WorkingSet, outcomes: Vec<(String, Option<Vec<AdCreative>>)>) {
    for (name, ads) in outcomes {
        if let Some(ads) = ads {
            if let Some(listing) = listings.get_mut(&name) {
                listing.ads = Some(ads);
            }
        }
    }
    listings.retain(|listing| listing.ads.is_some());
}
