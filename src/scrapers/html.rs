use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use scraper::{ElementRef, Selector};

use crate::models::clean_text;

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector `{css}`: {e}"))
}

/// Whitespace-normalized text of an element and its descendants
pub fn text_of(element: ElementRef<'_>) -> Option<String> {
    clean_text(&element.text().collect::<String>())
}

/// Text of the element's own text nodes, ignoring descendants
pub fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|text| {
            let text: &str = text;
            text.to_owned()
        })
        .collect()
}

pub fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope.select(sel).next().and_then(text_of)
}

pub fn first_attr(scope: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    scope
        .select(sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|value| value.trim().to_string())
}

/// Resolve a possibly relative link against the page it was found on
pub fn absolute_url(base: &str, href: &str) -> Result<String> {
    let base = Url::parse(base).with_context(|| format!("Invalid base URL {base}"))?;
    let url = base
        .join(href)
        .with_context(|| format!("Invalid link {href}"))?;
    Ok(url.to_string())
}

/// Leading run of ASCII digits, e.g. the zip code in "12353 Berlin"
pub fn leading_digits(text: &str) -> Option<String> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Quote `text` as an XPath string literal.
///
/// XPath 1.0 has no escapes, so text holding both quote kinds is
/// assembled with `concat()`.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }

    let parts: Vec<String> = text
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(r#", "'", "#))
}
