use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::db::Store;
use crate::error::BotError;
use crate::matcher::EligibilityPolicy;
use crate::models::{Enrichment, Offer, Profile, Source};
use crate::scrapers::SourceAdapter;

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Diffing,
    Enriching,
    Matching,
    Applying,
    Cleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Fetching => "fetching",
            Phase::Diffing => "diffing",
            Phase::Enriching => "enriching",
            Phase::Matching => "matching",
            Phase::Applying => "applying",
            Phase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub listed: usize,
    pub new_offers: usize,
    pub enriched: usize,
    pub applications: usize,
}

/// Drives one source through fetch, diff, enrich, match and apply.
///
/// A bot is bound to a single adapter and therefore a single browser
/// page; every step of a run happens sequentially.
pub struct Bot {
    store: Arc<dyn Store>,
    adapter: Arc<dyn SourceAdapter>,
    policy: Arc<EligibilityPolicy>,
    phase: Mutex<Phase>,
}

impl Bot {
    pub fn new(store: Arc<dyn Store>, adapter: Arc<dyn SourceAdapter>, policy: Arc<EligibilityPolicy>) -> Self {
        Self {
            store,
            adapter,
            policy,
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub fn source(&self) -> Source {
        self.adapter.source()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, phase: Phase) {
        debug!(source = %self.source(), "Entering {} phase", phase);
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = phase;
    }

    /// Run one cycle, reconnecting and retrying once if the store
    /// connection was lost. Errors are logged, never returned.
    ///
    /// Leftover new offers are only marked processed after the last
    /// attempt, so a retry still sees the offers the failed attempt stored.
    pub async fn run(&self) -> Option<RunSummary> {
        let mut result = self.attempt().await;

        if matches!(&result, Err(e) if e.is_connection_lost()) {
            warn!(source = %self.source(), "Store connection lost, reconnecting");
            match self.store.reconnect() {
                Ok(()) => {
                    result = self.attempt().await;
                    if result.is_err() {
                        error!(source = %self.source(), "Run failed again after reconnect");
                    }
                }
                Err(e) => error!(source = %self.source(), "Reconnect failed: {}", e),
            }
        }

        self.mark_leftovers();
        self.enter(Phase::Idle);
        result.ok()
    }

    /// A single attempt without retry; cleanup runs whatever happened
    pub async fn run_cycle(&self) -> Result<RunSummary, BotError> {
        let result = self.attempt().await;
        self.mark_leftovers();
        self.enter(Phase::Idle);
        result
    }

    async fn attempt(&self) -> Result<RunSummary, BotError> {
        let source = self.source();
        info!(source = %source, "Starting run");

        let result = self.process().await;
        match &result {
            Ok(summary) => info!(
                source = %source,
                listed = summary.listed,
                new_offers = summary.new_offers,
                enriched = summary.enriched,
                applications = summary.applications,
                "Run finished"
            ),
            Err(e) => error!(source = %source, phase = %self.phase(), "Run aborted: {}", e),
        }

        self.enter(Phase::Cleanup);
        if let Err(e) = self.adapter.release().await {
            warn!(source = %source, "Failed to release browser: {:#}", e);
        }
        result
    }

    /// Offers that reach matching are only those whose enrichment succeeded
    /// in this run; a failed detail page drops the offer for good.
    async fn process(&self) -> Result<RunSummary, BotError> {
        let source = self.source();

        self.enter(Phase::Fetching);
        let listing = self
            .adapter
            .fetch_listing(self.adapter.listing_url())
            .await
            .map_err(BotError::Fetch)?;

        let mut summary = RunSummary {
            listed: listing.len(),
            ..Default::default()
        };
        if listing.is_empty() {
            info!(source = %source, "No offers listed");
            return Ok(summary);
        }

        self.enter(Phase::Diffing);
        for raw in &listing {
            self.store.create_offer(source, raw)?;
        }
        let new_offers = self.store.get_new_offers(source)?;
        summary.new_offers = new_offers.len();
        info!(source = %source, "{} new offers", new_offers.len());

        self.enter(Phase::Enriching);
        let mut enriched = Vec::with_capacity(new_offers.len());
        for mut offer in new_offers {
            let outcome = self.enrich(&offer).await;
            self.store.mark_processed(offer.id)?;

            match outcome {
                Ok(enrichment) => {
                    offer.merge(&enrichment);
                    enriched.push(offer);
                }
                Err(e) if e.is_connection_lost() => return Err(e),
                Err(e) => warn!(source = %source, url = %offer.url, "Enrichment failed: {}", e),
            }
        }
        summary.enriched = enriched.len();

        self.enter(Phase::Matching);
        let profiles = self.store.get_enabled_profiles()?;
        let pairs: Vec<(&Offer, &Profile)> = enriched
            .iter()
            .flat_map(|offer| profiles.iter().map(move |profile| (offer, profile)))
            .filter(|(offer, profile)| self.policy.is_eligible(offer, profile))
            .collect();
        debug!(source = %source, "{} eligible offer/profile pairs", pairs.len());

        self.enter(Phase::Applying);
        for (offer, profile) in pairs {
            match self.apply(offer, profile).await {
                Ok(true) => summary.applications += 1,
                Ok(false) => warn!(
                    source = %source,
                    url = %offer.url,
                    profile = %profile.id,
                    "Application was not submitted"
                ),
                Err(e) if e.is_connection_lost() => return Err(e),
                Err(e) => error!(
                    source = %source,
                    url = %offer.url,
                    profile = %profile.id,
                    "Application failed: {}",
                    e
                ),
            }
        }

        Ok(summary)
    }

    async fn enrich(&self, offer: &Offer) -> Result<Enrichment, BotError> {
        self.adapter
            .visit_detail(&offer.url)
            .await
            .map_err(BotError::Adapter)?;
        let enrichment = self
            .adapter
            .gather_enrichment()
            .await
            .map_err(BotError::Adapter)?;
        self.store.update_offer_enrichment(offer.id, &enrichment)?;
        Ok(enrichment)
    }

    async fn apply(&self, offer: &Offer, profile: &Profile) -> Result<bool, BotError> {
        self.adapter
            .visit_detail(&offer.url)
            .await
            .map_err(BotError::Adapter)?;
        let submitted = self
            .adapter
            .apply_with_profile(profile)
            .await
            .map_err(BotError::Adapter)?;

        if submitted {
            self.store.record_application(offer.id, profile.id)?;
            info!(source = %self.source(), url = %offer.url, profile = %profile.id, "Applied");
        }
        Ok(submitted)
    }

    fn mark_leftovers(&self) {
        self.enter(Phase::Cleanup);
        match self.store.mark_new_offers_processed(self.source()) {
            Ok(0) => {}
            Ok(n) => debug!(source = %self.source(), "Marked {} leftover offers as processed", n),
            Err(e) => error!(source = %self.source(), "Failed to mark offers as processed: {}", e),
        }
    }
}
