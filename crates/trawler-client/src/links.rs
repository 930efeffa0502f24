//! Link discovery for HTML pages.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

/// Collect absolute http(s) links from `<a href>` elements.
///
/// Relative hrefs are resolved against `base_url`, fragments are dropped,
/// and each URL appears once in document order. Unparseable hrefs and
/// other schemes (`mailto:`, `javascript:`, ...) are skipped.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
    {
        let Ok(mut url) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);
        let url = url.to_string();
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }

    links
}

/// True when both URLs parse and share a host.
pub fn same_host(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a.host_str().is_some() && a.host_str() == b.host_str(),
        _ => false,
    }
}
