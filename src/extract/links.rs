use crate::output::ProfileRecord;
use url::Url;

/// Social fields a profile link can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Instagram,
    Youtube,
    Facebook,
    Twitter,
    Songkick,
    Telegram,
    Tiktok,
    Linkedin,
}

impl LinkKind {
    /// Domains recognized for each kind, checked in declaration order
    const DOMAINS: &'static [(LinkKind, &'static [&'static str])] = &[
        (LinkKind::Instagram, &["instagram.com"]),
        (LinkKind::Youtube, &["youtube.com", "youtu.be"]),
        (LinkKind::Facebook, &["facebook.com", "fb.me"]),
        (LinkKind::Twitter, &["twitter.com", "x.com"]),
        (LinkKind::Songkick, &["songkick.com"]),
        (LinkKind::Telegram, &["t.me", "telegram.me"]),
        (LinkKind::Tiktok, &["tiktok.com"]),
        (LinkKind::Linkedin, &["linkedin.com"]),
    ];

    /// The record field this kind fills
    pub fn field<'a>(&self, record: &'a mut ProfileRecord) -> &'a mut String {
        match self {
            LinkKind::Instagram => &mut record.instagram,
            LinkKind::Youtube => &mut record.youtube,
            LinkKind::Facebook => &mut record.facebook,
            LinkKind::Twitter => &mut record.twitter,
            LinkKind::Songkick => &mut record.songkick,
            LinkKind::Telegram => &mut record.telegram,
            LinkKind::Tiktok => &mut record.tiktok,
            LinkKind::Linkedin => &mut record.linkedin,
        }
    }
}

/// Hosts that never count as the artist's own website
const NON_WEBSITE_KEYWORDS: &[&str] = &[
    "instagram",
    "youtube",
    "facebook",
    "twitter",
    "songkick",
    "tiktok",
    "linkedin",
];
const NON_WEBSITE_DOMAINS: &[&str] = &[
    "t.me",
    "soundcloud.com",
    "spotify.com",
    "apple.com",
    "bandcamp.com",
];

/// Classified profile link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileLink {
    Email(String),
    Social(LinkKind, String),
    Website(String),
    Other,
}

/// Returns the destination of a `gate.sc` redirect link
///
/// The target is taken from the percent-decoded `url` query parameter. Other
/// links, and gate links without that parameter, are returned unchanged.
pub fn unwrap_gate_url(href: &str) -> String {
    if !href.contains("gate.sc") {
        return href.to_string();
    }

    Url::parse(href)
        .ok()
        .filter(|url| url.host_str().map(|h| domain_matches(h, "gate.sc")).unwrap_or(false))
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "url")
                .map(|(_, value)| value.into_owned())
        })
        .filter(|target| !target.is_empty())
        .unwrap_or_else(|| href.to_string())
}

/// Classifies an already-unwrapped link
pub fn classify_link(link: &str) -> ProfileLink {
    let link = link.trim();
    if link.is_empty() {
        return ProfileLink::Other;
    }

    if let Some(address) = strip_mailto(link) {
        return if address.is_empty() {
            ProfileLink::Other
        } else {
            ProfileLink::Email(address)
        };
    }

    let host = match Url::parse(link).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
        Some(h) => h,
        None => return ProfileLink::Other,
    };

    for (kind, domains) in LinkKind::DOMAINS {
        if domains.iter().any(|d| domain_matches(&host, d)) {
            return ProfileLink::Social(*kind, link.to_string());
        }
    }

    let is_http = link.to_ascii_lowercase().starts_with("http");
    let excluded = NON_WEBSITE_KEYWORDS.iter().any(|k| host.contains(k))
        || NON_WEBSITE_DOMAINS.iter().any(|d| domain_matches(&host, d));
    if is_http && !excluded {
        ProfileLink::Website(link.to_string())
    } else {
        ProfileLink::Other
    }
}

/// Extracts the address from a `mailto:` link, dropping any query part
pub(crate) fn strip_mailto(link: &str) -> Option<String> {
    let prefix = link.get(..7)?;
    if !prefix.eq_ignore_ascii_case("mailto:") {
        return None;
    }
    let address = &link[7..];
    let address = address.split('?').next().unwrap_or_default();
    Some(address.trim().to_string())
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .map(|prefix| prefix.ends_with('.'))
            .unwrap_or(false)
}
