use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::Html;
use tracing::{debug, info, warn};

use crate::models::{parse_rooms, Enrichment, Profile, RawOffer, Source};
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::html::{absolute_url, first_attr, first_text, leading_digits, selector, text_of, xpath_literal};
use crate::scrapers::traits::SourceAdapter;

const LISTING_URL: &str = "https://immosuche.degewo.de/de/search?size=10&page=1&property_type_id=1&categories%5B%5D=1&district=33%2C+46%2C+3%2C+28%2C+29%2C+71%2C+60&rooms_radio=custom&rooms_from=1&rooms_to=4&order=rent_total_without_vat_asc";

/// degewo integration; the contact form lives in an embedded iframe
pub struct Degewo {
    session: BrowserSession,
    listing_url: String,
}

impl Degewo {
    pub fn new(session: BrowserSession) -> Self {
        Self {
            session,
            listing_url: LISTING_URL.to_string(),
        }
    }
}

/// Parse the search-results page into listing cards
pub fn parse_listing(html: &str, base_url: &str) -> Result<Vec<RawOffer>> {
    let document = Html::parse_document(html);
    let card_selector = selector("article.article-list__item.article-list__item--immosearch")?;
    let property_selector = selector("ul.article__properties span.text")?;
    let price_selector = selector("span.price")?;
    let meta_selector = selector("span.article__meta")?;
    let link_selector = selector("a[href]")?;

    let mut offers = Vec::new();
    for (idx, card) in document.select(&card_selector).enumerate() {
        let Some(href) = first_attr(card, &link_selector, "href") else {
            warn!("Degewo: card {} has no link, skipping", idx);
            continue;
        };

        let properties: Vec<Option<String>> = card.select(&property_selector).map(text_of).collect();
        let property = |i: usize| properties.get(i).cloned().flatten();

        // "Neuköllner Straße 1 | Neukölln"
        let (street, district) = match first_text(card, &meta_selector) {
            Some(meta) => match meta.split_once(" | ") {
                Some((street, district)) => (Some(street.trim().to_string()), Some(district.trim().to_string())),
                None => (Some(meta.clone()), None),
            },
            None => (None, None),
        };

        offers.push(RawOffer {
            url: absolute_url(base_url, &href)?,
            rent: first_text(card, &price_selector),
            size: property(1),
            rooms: property(0).as_deref().and_then(parse_rooms),
            street,
            district,
            zip: None,
            wbs: Some(property(3).as_deref() == Some("mit WBS")),
        });
    }

    Ok(offers)
}

/// The detail header reads "Street | 12353 Berlin-Neukölln"
pub fn parse_enrichment(html: &str) -> Result<Enrichment> {
    let document = Html::parse_document(html);
    let meta_selector = selector("header.article__header > span.expose__meta")?;

    let zip = first_text(document.root_element(), &meta_selector).and_then(|meta| {
        let after = meta.rsplit_once("| ").map_or(meta.as_str(), |(_, rest)| rest);
        leading_digits(after)
    });

    Ok(Enrichment {
        zip,
        ..Default::default()
    })
}

/// Option of the salutation dropdown
fn salutation_xpath(gender: &str) -> String {
    format!("//li[contains(text(), {})]", xpath_literal(gender))
}

#[async_trait]
impl SourceAdapter for Degewo {
    fn source(&self) -> Source {
        Source::Degewo
    }

    fn listing_url(&self) -> &str {
        &self.listing_url
    }

    async fn fetch_listing(&self, url: &str) -> Result<Vec<RawOffer>> {
        self.session.goto(url).await?;
        let html = self.session.content().await?;
        debug!("Downloaded {} bytes of HTML", html.len());

        let offers = parse_listing(&html, url)?;
        info!("Degewo: parsed {} listing cards", offers.len());
        Ok(offers)
    }

    async fn visit_detail(&self, offer_url: &str) -> Result<()> {
        self.session.goto(offer_url).await
    }

    async fn gather_enrichment(&self) -> Result<Enrichment> {
        let html = self.session.content().await?;
        parse_enrichment(&html)
    }

    async fn apply_with_profile(&self, profile: &Profile) -> Result<bool> {
        let frame_src = self
            .session
            .with_page(|tab| {
                let frame = tab.wait_for_element("section#kontakt iframe")?;
                let src = frame.get_attribute_value("src")?;
                let page_url = tab.get_url();
                Ok(src.map(|src| (page_url, src)))
            })
            .await?
            .context("Contact form iframe has no src")?;

        let form_url = absolute_url(&frame_src.0, &frame_src.1)?;
        self.session.goto(&form_url).await?;

        let profile = profile.clone();
        self.session
            .with_page(move |tab| {
                tab.wait_for_element("form.application-form")?;

                tab.wait_for_element("nz-select")?.click()?;
                tab.wait_for_xpath(&salutation_xpath(&profile.gender))?
                    .click()?;

                tab.wait_for_element("input#firstName")?.type_into(&profile.name)?;
                tab.wait_for_element("input#lastName")?.type_into(&profile.surname)?;
                tab.wait_for_element("input#email")?.type_into(&profile.email)?;
                tab.wait_for_element("input#phone-number")?.type_into(&profile.phone)?;

                tab.evaluate("document.querySelector('form.application-form').submit()", false)?;
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
        <html><body>
        <article class="article-list__item article-list__item--immosearch">
            <a href="/de/properties/W1100-40107-0404-0101"></a>
            <span class="article__meta">Käthe-Dorsch-Ring 1 | Neukölln</span>
            <ul class="article__properties">
                <li><span class="text">1 Zimmer</span></li>
                <li><span class="text">31,2 m²</span></li>
                <li><span class="text">ab sofort</span></li>
                <li><span class="text">mit WBS</span></li>
            </ul>
            <span class="price">298,83 €</span>
        </article>
        <article class="article-list__item article-list__item--immosearch">
            <a href="https://immosuche.degewo.de/de/properties/W2"></a>
            <span class="article__meta">Theodor-Loos-Weg 17 | Neukölln</span>
            <ul class="article__properties">
                <li><span class="text">2 Zimmer</span></li>
                <li><span class="text">42,9 m²</span></li>
            </ul>
            <span class="price">403,08 €</span>
        </article>
        <article class="article-list__item article-list__item--immosearch">
            <span class="article__meta">No link here</span>
        </article>
        </body></html>
    "#;

    #[test]
    fn test_parse_listing() {
        let offers = parse_listing(LISTING, "https://immosuche.degewo.de/de/search?page=1").unwrap();
        assert_eq!(offers.len(), 2);

        assert_eq!(
            offers[0],
            RawOffer {
                url: "https://immosuche.degewo.de/de/properties/W1100-40107-0404-0101".into(),
                rent: Some("298,83 €".into()),
                size: Some("31,2 m²".into()),
                rooms: Some(1),
                street: Some("Käthe-Dorsch-Ring 1".into()),
                district: Some("Neukölln".into()),
                zip: None,
                wbs: Some(true),
            }
        );

        assert_eq!(offers[1].rooms, Some(2));
        assert_eq!(offers[1].wbs, Some(false));
        assert_eq!(offers[1].url, "https://immosuche.degewo.de/de/properties/W2");
    }

    #[test]
    fn test_parse_enrichment_reads_zip() {
        let html = r#"<header class="article__header">
            <span class="expose__meta">Käthe-Dorsch-Ring 1 | 12353 Berlin-Neukölln</span>
        </header>"#;
        let enrichment = parse_enrichment(html).unwrap();
        assert_eq!(enrichment.zip.as_deref(), Some("12353"));
        assert_eq!(enrichment.wbs, None);
    }

    #[test]
    fn test_parse_enrichment_without_header_is_empty() {
        assert!(parse_enrichment("<html></html>").unwrap().is_empty());
    }

    #[test]
    fn test_salutation_xpath_quotes_value() {
        assert_eq!(salutation_xpath("Herr"), "//li[contains(text(), 'Herr')]");
        assert_eq!(salutation_xpath("Div'ers"), r#"//li[contains(text(), "Div'ers")]"#);
    }
}
