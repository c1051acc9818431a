use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Housing company a listing was scraped from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Source {
    Degewo,
    Gewobag,
    Howoge,
    Wbm,
}

impl Source {
    pub const ALL: [Source; 4] = [Source::Degewo, Source::Gewobag, Source::Howoge, Source::Wbm];

    /// Company identifier as stored in the `flats.company` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Degewo => "Degewo",
            Source::Gewobag => "Gewobag",
            Source::Howoge => "Howoge",
            Source::Wbm => "WBM",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown source: {s}"))
    }
}

/// Listing card data as extracted from a search-results page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawOffer {
    pub url: String,
    pub rent: Option<String>,
    pub size: Option<String>,
    pub rooms: Option<i32>,
    pub street: Option<String>,
    pub district: Option<String>,
    pub zip: Option<String>,
    /// Whether a Wohnberechtigungsschein is required, if the card says so
    pub wbs: Option<bool>,
}

/// Persisted offer row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    pub id: Uuid,
    pub source: Source,
    pub url: String,
    pub rent: Option<String>,
    pub size: Option<String>,
    pub rooms: Option<i32>,
    pub street: Option<String>,
    pub district: Option<String>,
    pub zip: Option<String>,
    pub wbs: Option<bool>,
    pub expose_url: Option<String>,
    pub is_new: bool,
    pub applied: bool,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// Merge detail-page data into this offer, leaving unobserved fields alone
    pub fn merge(&mut self, enrichment: &Enrichment) {
        if let Some(wbs) = enrichment.wbs {
            self.wbs = Some(wbs);
        }
        if let Some(zip) = &enrichment.zip {
            self.zip = Some(zip.clone());
        }
        if let Some(expose_url) = &enrichment.expose_url {
            self.expose_url = Some(expose_url.clone());
        }
    }
}

/// Fields only available on an offer's detail page.
///
/// `None` means "not observed on the page"; it never clears stored data.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Enrichment {
    pub wbs: Option<bool>,
    pub zip: Option<String>,
    pub expose_url: Option<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.wbs.is_none() && self.zip.is_none() && self.expose_url.is_none()
    }
}

/// Applicant details used to fill application forms
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Salutation as the forms expect it ("Herr", "Frau", ...)
    pub gender: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub zip: String,
    pub city: String,
    pub min_rooms: i32,
    pub max_rooms: i32,
    /// Holds a WBS and may apply to offers that require one
    #[serde(default)]
    pub accepts_wbs: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Submitted application for one offer on behalf of one profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub offer_id: Uuid,
    pub profile_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Parse a room count such as "3", "3 Zimmer" or "2,0".
///
/// Fractional or non-numeric counts yield `None`.
pub fn parse_rooms(text: &str) -> Option<i32> {
    let token = text.split_whitespace().next()?;
    let value: f32 = token.replace(',', ".").parse().ok()?;
    if value.fract() != 0.0 || value < 0.0 {
        return None;
    }
    Some(value as i32)
}

/// Trim scraped text and drop it when nothing is left
pub fn clean_text(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}
