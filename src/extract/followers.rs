use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

const COUNT_PATTERN: &str = r"([\d\.,]+[kKmM]?)";

fn count_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(COUNT_PATTERN).ok()).as_ref()
}

/// Converts a displayed follower count into a plain integer string
///
/// Commas are dropped and a trailing `k`/`m` (any case) scales the number;
/// fractional results are truncated. Anything unparsable yields an empty
/// string.
///
/// ```
/// use profile_harvest::extract::normalize_follower_count;
///
/// assert_eq!(normalize_follower_count("90.2K"), "90200");
/// assert_eq!(normalize_follower_count("1,234"), "1234");
/// assert_eq!(normalize_follower_count("abc"), "");
/// ```
pub fn normalize_follower_count(text: &str) -> String {
    let text = text.trim().to_lowercase().replace(',', "");
    if text.is_empty() {
        return String::new();
    }

    let (number, multiplier) = if let Some(n) = text.strip_suffix('k') {
        (n, 1_000.0)
    } else if let Some(n) = text.strip_suffix('m') {
        (n, 1_000_000.0)
    } else {
        (text.as_str(), 1.0)
    };

    match number.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => {
            let scaled = (value * multiplier).trunc();
            if scaled.abs() < i64::MAX as f64 {
                (scaled as i64).to_string()
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}

/// Finds the raw follower count text on a profile page
///
/// Looked up in order: the followers stat link (its value span, its
/// `interactionCount` meta, a number in its text, a number in its title),
/// then the page-level `soundcloud:follower_count` meta tag.
pub(crate) fn find_follower_text(document: &Html) -> Option<String> {
    let from_link = Selector::parse(r#"a[href$="/followers"]"#)
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .and_then(|link| follower_text_in_link(&link));

    from_link.or_else(|| {
        let selector = Selector::parse(r#"meta[property="soundcloud:follower_count"][content]"#).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    })
}

fn follower_text_in_link(link: &ElementRef<'_>) -> Option<String> {
    if let Ok(selector) = Selector::parse(r#"span[data-testid="value"]"#) {
        if let Some(span) = link.select(&selector).next() {
            let text = span.text().collect::<String>().trim().to_string();
            return Some(text).filter(|t| !t.is_empty());
        }
    }

    if let Ok(selector) = Selector::parse(r#"meta[itemprop="interactionCount"]"#) {
        let content = link
            .select(&selector)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .filter(|c| !c.trim().is_empty());
        if let Some(content) = content {
            return Some(content.trim().to_string());
        }
    }

    let pattern = count_pattern()?;
    let link_text: String = link.text().map(str::trim).collect();
    if let Some(m) = pattern.captures(&link_text).and_then(|c| c.get(1)) {
        return Some(m.as_str().to_string());
    }

    link.value()
        .attr("title")
        .filter(|title| title.to_lowercase().contains("followers"))
        .and_then(|title| pattern.captures(title))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
