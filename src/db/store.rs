use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Application, Enrichment, Offer, Profile, RawOffer, Source};

/// Persistence of offers and their new/seen and applied state
pub trait OfferStore: Send + Sync {
    /// Insert the offer unless its URL is already known.
    ///
    /// Returns the id of the stored row, whether it was created by this
    /// call or earlier.
    fn create_offer(&self, source: Source, offer: &RawOffer) -> Result<Uuid, StoreError>;

    /// Offers of `source` still awaiting enrichment, oldest first
    fn get_new_offers(&self, source: Source) -> Result<Vec<Offer>, StoreError>;

    /// Write the fields present in `enrichment`; absent fields stay untouched
    fn update_offer_enrichment(&self, id: Uuid, enrichment: &Enrichment) -> Result<(), StoreError>;

    fn mark_processed(&self, id: Uuid) -> Result<(), StoreError>;

    /// Clear the new flag on every offer of `source`
    fn mark_new_offers_processed(&self, source: Source) -> Result<usize, StoreError>;

    /// Record a submitted application; repeated calls are no-ops
    fn record_application(&self, offer_id: Uuid, profile_id: Uuid) -> Result<(), StoreError>;

    fn offers_since(&self, since: DateTime<Utc>) -> Result<Vec<Offer>, StoreError>;

    fn applications_for(&self, offer_id: Uuid) -> Result<Vec<Application>, StoreError>;
}

pub trait ProfileStore: Send + Sync {
    fn get_enabled_profiles(&self) -> Result<Vec<Profile>, StoreError>;

    fn upsert_profile(&self, profile: &Profile) -> Result<(), StoreError>;
}

pub trait Store: OfferStore + ProfileStore {
    /// Re-establish the underlying connection after it was lost
    fn reconnect(&self) -> Result<(), StoreError>;
}
