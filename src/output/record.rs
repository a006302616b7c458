/// Column order of the result CSV
pub const CSV_COLUMNS: [&str; 13] = [
    "url",
    "followers",
    "website",
    "youtube",
    "facebook",
    "twitter",
    "instagram",
    "songkick",
    "telegram",
    "tiktok",
    "linkedin",
    "emails",
    "error",
];

/// Separator used when flattening `emails` into a single CSV cell
pub const EMAIL_SEPARATOR: &str = ", ";

/// Extraction result for one target
///
/// Every field defaults to empty. A record with an empty `error` is a success
/// and goes to the sink; anything else is routed for retry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileRecord {
    pub url: String,
    /// Normalized integer string, or empty when unknown
    pub followers: String,
    pub website: String,
    pub youtube: String,
    pub facebook: String,
    pub twitter: String,
    pub instagram: String,
    pub songkick: String,
    pub telegram: String,
    pub tiktok: String,
    pub linkedin: String,
    /// Unique emails in discovery order
    pub emails: Vec<String>,
    pub error: String,
}

impl ProfileRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Creates a record that carries only a failure description
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            error: error.into(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    /// Appends to the error description, keeping earlier messages
    pub fn push_error(&mut self, message: &str) {
        if self.error.is_empty() {
            self.error = message.to_string();
        } else {
            self.error.push_str("; ");
            self.error.push_str(message);
        }
    }

    /// Adds an email unless it is already present
    pub fn add_email(&mut self, email: &str) {
        if !self.emails.iter().any(|e| e == email) {
            self.emails.push(email.to_string());
        }
    }

    /// Flattens the record into CSV cells in [`CSV_COLUMNS`] order
    pub fn to_row(&self) -> [String; 13] {
        [
            self.url.clone(),
            self.followers.clone(),
            self.website.clone(),
            self.youtube.clone(),
            self.facebook.clone(),
            self.twitter.clone(),
            self.instagram.clone(),
            self.songkick.clone(),
            self.telegram.clone(),
            self.tiktok.clone(),
            self.linkedin.clone(),
            self.emails.join(EMAIL_SEPARATOR),
            self.error.clone(),
        ]
    }
}
