use std::collections::HashSet;

use crate::models::{Offer, Profile};

/// Districts nobody applies to unless configured otherwise
pub const DEFAULT_DISTRICT_BLACKLIST: [&str; 3] = ["Spandau", "Buch", "Steglitz-Zehlendorf"];

/// Decides which profiles may apply to which offers
#[derive(Debug, Clone, Default)]
pub struct EligibilityPolicy {
    district_blacklist: HashSet<String>,
}

impl EligibilityPolicy {
    pub fn new<I, S>(district_blacklist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            district_blacklist: district_blacklist.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_eligible(&self, offer: &Offer, profile: &Profile) -> bool {
        let rooms_ok = rooms_match(offer.rooms, profile);
        let wbs_ok = wbs_match(offer.wbs, profile);
        let district_ok = !self.is_blacklisted(offer.district.as_deref());

        rooms_ok && wbs_ok && district_ok
    }

    pub fn is_blacklisted(&self, district: Option<&str>) -> bool {
        district.is_some_and(|d| self.district_blacklist.contains(d.trim()))
    }
}

/// An unknown room count never rules a profile out
fn rooms_match(rooms: Option<i32>, profile: &Profile) -> bool {
    match rooms {
        Some(rooms) => profile.min_rooms <= rooms && rooms <= profile.max_rooms,
        None => true,
    }
}

fn wbs_match(required: Option<bool>, profile: &Profile) -> bool {
    match required {
        Some(true) => profile.accepts_wbs,
        Some(false) | None => true,
    }
}
