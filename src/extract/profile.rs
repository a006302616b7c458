use super::followers::{find_follower_text, normalize_follower_count};
use super::links::{classify_link, strip_mailto, unwrap_gate_url, ProfileLink};
use super::Extractor;
use crate::output::ProfileRecord;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

const EMAIL_PATTERN: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";
const WEB_PROFILES_SELECTOR: &str = "div.web-profiles a[href]";
const BIOGRAPHY_SELECTOR: &str = "div.biographyText p, div.truncatedUserDescription q";

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

/// Extracts profile data from a rendered profile page
///
/// # Extraction Rules
///
/// - Links come from the web-profiles block; `gate.sc` redirects are unwrapped
///   and each link fills the first empty matching field
/// - The website is the first plain http(s) link not on a social or
///   streaming domain
/// - Emails come from `mailto:` links and from the biography text
/// - Followers come from the followers stat link, falling back to page meta
///
/// Missing elements leave fields empty; extraction never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileExtractor;

impl ProfileExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for ProfileExtractor {
    fn extract(&self, html: &str, url: &str) -> ProfileRecord {
        let document = Html::parse_document(html);
        let mut record = ProfileRecord::new(url);

        extract_profile_links(&document, &mut record);
        extract_biography_emails(&document, &mut record);

        if let Some(text) = find_follower_text(&document) {
            record.followers = normalize_follower_count(&text);
            if record.followers.is_empty() {
                tracing::debug!("Could not parse follower count '{}' on {}", text, url);
            }
        }

        record
    }
}

fn extract_profile_links(document: &Html, record: &mut ProfileRecord) {
    let selector = match Selector::parse(WEB_PROFILES_SELECTOR) {
        Ok(s) => s,
        Err(_) => return,
    };

    for element in document.select(&selector) {
        let href = match element.value().attr("href") {
            Some(h) => h,
            None => continue,
        };

        match classify_link(&unwrap_gate_url(href)) {
            ProfileLink::Email(address) => record.add_email(&address),
            ProfileLink::Social(kind, link) => {
                let field = kind.field(record);
                if field.is_empty() {
                    *field = link;
                }
            }
            ProfileLink::Website(link) => {
                if record.website.is_empty() {
                    record.website = link;
                }
            }
            ProfileLink::Other => {}
        }
    }
}

fn extract_biography_emails(document: &Html, record: &mut ProfileRecord) {
    let biography = match Selector::parse(BIOGRAPHY_SELECTOR)
        .ok()
        .and_then(|selector| document.select(&selector).next())
    {
        Some(element) => element,
        None => return,
    };

    if let Ok(mailto_selector) = Selector::parse("a[href]") {
        for anchor in biography.select(&mailto_selector) {
            if let Some(address) = anchor.value().attr("href").and_then(strip_mailto) {
                if !address.is_empty() {
                    record.add_email(&address);
                }
            }
        }
    }

    if let Some(pattern) = email_pattern() {
        let text = biography.text().collect::<Vec<_>>().join(" ");
        for m in pattern.find_iter(&text) {
            record.add_email(m.as_str());
        }
    }
}
