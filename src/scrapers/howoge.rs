use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};

use crate::models::{parse_rooms, Profile, RawOffer, Source};
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::html::{absolute_url, first_attr, first_text, leading_digits, own_text, selector, text_of};
use crate::scrapers::traits::SourceAdapter;

const LISTING_URL: &str = "https://www.howoge.de/wohnungen-gewerbe/wohnungssuche.html?tx_howsite_json_list%5Bpage%5D=1&tx_howsite_json_list%5Blimit%5D=12&tx_howsite_json_list%5Bkiez%5D%5B%5D=Friedrichshain-Kreuzberg&tx_howsite_json_list%5Bkiez%5D%5B%5D=Mitte&tx_howsite_json_list%5Bkiez%5D%5B%5D=Charlottenburg-Wilmersdorf&tx_howsite_json_list%5Bkiez%5D%5B%5D=Neuk%C3%B6lln&tx_howsite_json_list%5Bkiez%5D%5B%5D=Tempelhof-Sch%C3%B6neberg";

const SUCCESS_XPATH: &str =
    r#"//div[contains(text(), "Ihre Anfrage wurde erfolgreich an die HOWOGE gesandt.")]"#;

/// HOWOGE integration; applications go through a five step wizard
pub struct Howoge {
    session: BrowserSession,
    listing_url: String,
}

impl Howoge {
    pub fn new(session: BrowserSession) -> Self {
        Self {
            session,
            listing_url: LISTING_URL.to_string(),
        }
    }
}

/// Value cell following the label cell that contains `label`
fn labelled_value(card: ElementRef<'_>, label: &str) -> Result<Option<String>> {
    let div_selector = selector("div.flat-data div")?;
    let value = card
        .select(&div_selector)
        .find(|div| own_text(*div).contains(label))
        .and_then(|div| div.next_siblings().find_map(ElementRef::wrap))
        .and_then(text_of);
    Ok(value)
}

/// Split "Straße 1, 10317 Berlin, Lichtenberg" into street, zip and district
fn split_address(address: &str) -> (Option<String>, Option<String>, Option<String>) {
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();
    let street = parts.first().filter(|s| !s.is_empty()).map(|s| s.to_string());
    let zip = parts.get(1).and_then(|s| leading_digits(s));
    let district = if parts.len() >= 3 {
        parts.last().filter(|s| !s.is_empty()).map(|s| s.to_string())
    } else {
        None
    };
    (street, zip, district)
}

pub fn parse_listing(html: &str, base_url: &str) -> Result<Vec<RawOffer>> {
    let document = Html::parse_document(html);
    let card_selector = selector("div.flat-single-grid-item")?;
    let address_selector = selector("div.address a")?;
    let div_selector = selector("div.flat-data div")?;

    let mut offers = Vec::new();
    for (idx, card) in document.select(&card_selector).enumerate() {
        let Some(href) = first_attr(card, &address_selector, "href") else {
            warn!("Howoge: card {} has no address link, skipping", idx);
            continue;
        };

        let (street, zip, district) = first_text(card, &address_selector)
            .map(|address| split_address(&address))
            .unwrap_or_default();

        let wbs = card
            .select(&div_selector)
            .any(|div| own_text(div).contains("WBS erforderlich"));

        offers.push(RawOffer {
            url: absolute_url(base_url, &href)?,
            rent: labelled_value(card, "Warmmiete")?,
            size: labelled_value(card, "Wohnfläche")?,
            rooms: labelled_value(card, "Zimmer")?.as_deref().and_then(parse_rooms),
            street,
            district,
            zip,
            wbs: Some(wbs),
        });
    }

    Ok(offers)
}

#[async_trait]
impl SourceAdapter for Howoge {
    fn source(&self) -> Source {
        Source::Howoge
    }

    fn listing_url(&self) -> &str {
        &self.listing_url
    }

    async fn fetch_listing(&self, url: &str) -> Result<Vec<RawOffer>> {
        self.session.goto(url).await?;
        let html = self.session.content().await?;
        debug!("Downloaded {} bytes of HTML", html.len());

        let offers = parse_listing(&html, url)?;
        info!("Howoge: parsed {} listing cards", offers.len());
        Ok(offers)
    }

    async fn visit_detail(&self, offer_url: &str) -> Result<()> {
        self.session.goto(offer_url).await
    }

    async fn apply_with_profile(&self, profile: &Profile) -> Result<bool> {
        let (page_url, href) = self
            .session
            .with_page(|tab| {
                let button = tab.wait_for_xpath(r#"//a[contains(text(), "Anfrage senden")]"#)?;
                Ok((tab.get_url(), button.get_attribute_value("href")?))
            })
            .await?;
        let href = href.context("Apply button has no link")?;
        self.session.goto(&absolute_url(&page_url, &href)?).await?;

        let profile = profile.clone();
        self.session
            .with_page(move |tab| {
                // Steps 1-4 are notices that only need to be acknowledged
                for next in 2..=5 {
                    tab.wait_for_element("div.step-content.show input.form-check-input")?
                        .click()?;
                    tab.wait_for_element(&format!(
                        r#"div.step-content.show button[data-process-next="{next}"]"#
                    ))?
                    .click()?;
                }

                let field = |name: &str| {
                    format!(r#"input[name="tx_howrealestate_visitform[visitRequest][{name}]"]"#)
                };
                tab.wait_for_element(&field("firstName"))?.type_into(&profile.name)?;
                tab.wait_for_element(&field("lastName"))?.type_into(&profile.surname)?;
                tab.wait_for_element(&field("email"))?.type_into(&profile.email)?;
                tab.wait_for_element(&field("phone"))?.type_into(&profile.phone)?;

                tab.wait_for_element(r#"button[data-process-step="6"]"#)?.click()?;
                tab.wait_for_xpath(SUCCESS_XPATH)?;
                Ok(())
            })
            .await?;

        Ok(true)
    }

    async fn release(&self) -> Result<()> {
        self.session.release().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <div class="flat-single-grid-item">
            <div class="address"><a href="/wohnungssuche/detail/1770-20673-15.html">Frankfurter Allee 135, 10365 Berlin, Lichtenberg</a></div>
            <div class="row flat-data">
                <div class="col">Warmmiete</div><div class="col">812,35 €</div>
                <div class="col">Wohnfläche</div><div class="col">61,4 m²</div>
                <div class="col">Zimmer</div><div class="col">2</div>
                <div class="col">WBS erforderlich</div>
            </div>
        </div>
        <div class="flat-single-grid-item">
            <div class="address"><a href="https://www.howoge.de/wohnungssuche/detail/2.html">Ostseestraße 8</a></div>
            <div class="row flat-data">
                <div class="col">Warmmiete</div><div class="col">1.020,00 €</div>
                <div class="col">Zimmer</div><div class="col">2,5</div>
            </div>
        </div>
    "#;

    #[test]
    fn test_parse_listing() {
        let offers = parse_listing(LISTING, "https://www.howoge.de/wohnungen-gewerbe/wohnungssuche.html").unwrap();
        assert_eq!(offers.len(), 2);

        let first = &offers[0];
        assert_eq!(first.url, "https://www.howoge.de/wohnungssuche/detail/1770-20673-15.html");
        assert_eq!(first.rent.as_deref(), Some("812,35 €"));
        assert_eq!(first.size.as_deref(), Some("61,4 m²"));
        assert_eq!(first.rooms, Some(2));
        assert_eq!(first.street.as_deref(), Some("Frankfurter Allee 135"));
        assert_eq!(first.zip.as_deref(), Some("10365"));
        assert_eq!(first.district.as_deref(), Some("Lichtenberg"));
        assert_eq!(first.wbs, Some(true));

        let second = &offers[1];
        assert_eq!(second.rooms, None);
        assert_eq!(second.size, None);
        assert_eq!(second.zip, None);
        assert_eq!(second.district, None);
        assert_eq!(second.wbs, Some(false));
    }

    #[test]
    fn test_split_address() {
        assert_eq!(
            split_address("Straße 1, 10317 Berlin, Lichtenberg"),
            (Some("Straße 1".into()), Some("10317".into()), Some("Lichtenberg".into()))
        );
        assert_eq!(split_address("Straße 1"), (Some("Straße 1".into()), None, None));
    }
}
