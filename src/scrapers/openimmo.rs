use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};

use crate::models::{parse_rooms, Enrichment, Profile, RawOffer, Source};
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::html::{absolute_url, first_attr, first_text, leading_digits, own_text, selector, text_of};
use crate::scrapers::traits::SourceAdapter;

const GEWOBAG_URL: &str = "https://www.gewobag.de/fuer-mieter-und-mietinteressenten/mietangebote/?bezirke%5B%5D=charlottenburg-wilmersdorf&bezirke%5B%5D=friedrichshain-kreuzberg&bezirke%5B%5D=neukoelln&bezirke%5B%5D=pankow&bezirke%5B%5D=tempelhof-schoeneberg&objekttyp%5B%5D=wohnung&sort-by=recent";
const WBM_URL: &str = "https://www.wbm.de/wohnungen-berlin/angebote/";

const WBS_MARKER: &str = "WBS erforderlich:";

/// Sites built on the OpenImmo WordPress plugin (Gewobag, WBM).
///
/// Their listing pages are static HTML, so they are fetched over plain
/// HTTP; detail pages and forms go through the browser.
pub struct OpenImmo {
    source: Source,
    listing_url: String,
    client: Client,
    session: BrowserSession,
}

impl OpenImmo {
    pub fn gewobag(session: BrowserSession) -> Result<Self> {
        Self::new(Source::Gewobag, GEWOBAG_URL, session)
    }

    pub fn wbm(session: BrowserSession) -> Result<Self> {
        Self::new(Source::Wbm, WBM_URL, session)
    }

    fn new(source: Source, listing_url: &str, session: BrowserSession) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            source,
            listing_url: listing_url.to_string(),
            client,
            session,
        })
    }
}

pub fn parse_listing(html: &str, base_url: &str) -> Result<Vec<RawOffer>> {
    let document = Html::parse_document(html);
    let card_selector = selector(".row .openimmo-search-list-item")?;
    let rent_selector = selector("div.main-property-rent.main-property-value")?;
    let size_selector = selector("div.main-property-size.main-property-value")?;
    let rooms_selector = selector("div.main-property-rooms.main-property-value")?;
    let link_selector = selector(r#"a[title="Details"]"#)?;
    let address_selector = selector("div.address")?;
    let area_selector = selector("div.area")?;

    let mut offers = Vec::new();
    for (idx, card) in document.select(&card_selector).enumerate() {
        let Some(href) = first_attr(card, &link_selector, "href") else {
            warn!("OpenImmo: card {} has no details link, skipping", idx);
            continue;
        };

        // "Wilhelmstraße 12, 10963 Berlin/Kreuzberg"
        let (street, zip) = match first_text(card, &address_selector) {
            Some(address) => match address.split_once(',') {
                Some((street, rest)) => (Some(street.trim().to_string()), leading_digits(rest)),
                None => (Some(address.clone()), None),
            },
            None => (None, None),
        };

        offers.push(RawOffer {
            url: absolute_url(base_url, &href)?,
            rent: first_text(card, &rent_selector),
            size: first_text(card, &size_selector),
            rooms: first_text(card, &rooms_selector).as_deref().and_then(parse_rooms),
            street,
            district: first_text(card, &area_selector),
            zip,
            wbs: None,
        });
    }

    Ok(offers)
}

/// Detail pages list "WBS erforderlich: Ja/Nein" next to the other facts
fn wbs_requirement(document: &Html) -> Result<Option<bool>> {
    let any = selector("body *")?;
    let label = document
        .select(&any)
        .find(|el| own_text(*el).contains(WBS_MARKER));

    let Some(label) = label else {
        return Ok(None);
    };

    let text = label
        .parent()
        .and_then(ElementRef::wrap)
        .and_then(text_of)
        .unwrap_or_default();
    let answer = text
        .split_once(WBS_MARKER)
        .map_or("", |(_, rest)| rest)
        .to_lowercase();

    Ok(Some(!answer.contains("nein")))
}

pub fn parse_enrichment(html: &str, page_url: &str) -> Result<Enrichment> {
    let document = Html::parse_document(html);
    let expose_selector = selector("a.openimmo-detail__intro-expose-button.btn.download")?;

    let expose_url = match first_attr(document.root_element(), &expose_selector, "href") {
        Some(href) => Some(absolute_url(page_url, &href)?),
        None => None,
    };

    Ok(Enrichment {
        wbs: wbs_requirement(&document)?,
        zip: None,
        expose_url,
    })
}

#[async_trait]
impl SourceAdapter for OpenImmo {
    fn source(&self) -> Source {
        self.source
    }

    fn listing_url(&self) -> &str {
        &self.listing_url
    }

    async fn fetch_listing(&self, url: &str) -> Result<Vec<RawOffer>> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {} listing", self.source))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch {} listing: {}", self.source, response.status());
        }

        let html = response.text().await.context("Failed to read response body")?;
        debug!("Downloaded {} bytes of HTML", html.len());

        let offers = parse_listing(&html, url)?;
        info!("{}: parsed {} listing cards", self.source, offers.len());
        Ok(offers)
    }

    async fn visit_detail(&self, offer_url: &str) -> Result<()> {
        self.session.goto(offer_url).await
    }

    async fn gather_enrichment(&self) -> Result<Enrichment> {
        let (html, page_url) = self
            .session
            .with_page(|tab| Ok((tab.get_content()?, tab.get_url())))
            .await?;
        parse_enrichment(&html, &page_url)
    }

    async fn apply_with_profile(&self, profile: &Profile) -> Result<bool> {
        let profile = profile.clone();
        self.session
            .with_page(move |tab| {
                let gender = serde_json::to_string(&profile.gender)?;
                tab.evaluate(
                    &format!(
                        "(() => {{
                            const select = document.querySelector('select#powermail_field_anrede');
                            select.value = {gender};
                            select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                        }})()"
                    ),
                    false,
                )?;

                let fields = [
                    ("input#powermail_field_name", &profile.surname),
                    ("input#powermail_field_vorname", &profile.name),
                    ("input#powermail_field_strasse", &profile.street),
                    ("input#powermail_field_plz", &profile.zip),
                    ("input#powermail_field_ort", &profile.city),
                    ("input#powermail_field_e_mail", &profile.email),
                    ("input#powermail_field_telefon", &profile.phone),
                ];
                for (field, value) in fields {
                    tab.wait_for_element(field)?.type_into(value)?;
                }

                tab.wait_for_element("input#powermail_field_datenschutzhinweis_1")?;
                tab.evaluate(
                    "document.getElementById('powermail_field_datenschutzhinweis_1').click()",
                    false,
                )?;

                tab.wait_for_element(r#"button[type="submit"]"#)?.click()?;
                Ok(())
            })
            .await?;

        Ok(true)
    }

    async fn release(&self) -> Result<()> {
        self.session.release().await
    }
}
