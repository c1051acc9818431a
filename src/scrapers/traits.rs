use crate::models::{Enrichment, Profile, RawOffer, Source};
use anyhow::Result;
use async_trait::async_trait;

/// One housing company integration.
///
/// A single adapter drives one browsing session, so calls are made
/// sequentially: `visit_detail` positions the shared page that
/// `gather_enrichment` and `apply_with_profile` then work on.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Search-results page scraped at the start of each run
    fn listing_url(&self) -> &str;

    /// Extract all listing cards from the search-results page
    async fn fetch_listing(&self, url: &str) -> Result<Vec<RawOffer>>;

    /// Navigate the shared page to an offer's detail page
    async fn visit_detail(&self, offer_url: &str) -> Result<()>;

    /// Read fields only present on the current detail page
    async fn gather_enrichment(&self) -> Result<Enrichment> {
        Ok(Enrichment::default())
    }

    /// Fill and submit the application form of the current detail page
    async fn apply_with_profile(&self, profile: &Profile) -> Result<bool>;

    /// Close every page and the browser opened during the run
    async fn release(&self) -> Result<()> {
        Ok(())
    }
}
