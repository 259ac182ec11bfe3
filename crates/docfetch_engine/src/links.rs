use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::ContentVerifier;

/// Elements that can point at an embedded or linked document.
const CANDIDATE_SELECTOR: &str = "a[href], iframe[src], embed[src], object[data]";

/// Resolved URLs of every candidate element, in document order.
pub fn candidate_links(html: &str, base_url: Option<&str>) -> Vec<String> {
    let Ok(selector) = Selector::parse(CANDIDATE_SELECTOR) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let base_url = base_url.and_then(|b| Url::parse(b).ok());

    let links = document
        .select(&selector)
        .filter_map(link_target)
        .filter_map(|raw| resolve_url(raw, base_url.as_ref()))
        .map(String::from)
        .collect();
    links
}

/// First candidate whose path ends with the verifier's extension.
pub fn find_artifact_link(
    html: &str,
    base_url: Option<&str>,
    verifier: &ContentVerifier,
) -> Option<String> {
    candidate_links(html, base_url)
        .into_iter()
        .find(|url| verifier.url_has_extension(url))
}

fn link_target(element: ElementRef<'_>) -> Option<&str> {
    let attr = match element.value().name() {
        "a" => "href",
        "object" => "data",
        _ => "src",
    };
    element.value().attr(attr)
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("mailto:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.and_then(|base| base.join(trimmed).ok())
}
