pub mod imap;

use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use mail_parser::MessageParser;
use regex::Regex;
use tracing::{info, warn};

use crate::config::Settings;
use imap::ImapSession;

static EDITION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"TLDR\s*(\w+)").unwrap());

const MAILBOX: &str = "INBOX";
const DEFAULT_CATEGORY: &str = "TLDR";

/// A decoded newsletter message, ready for parsing.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: String,
    pub subject: String,
    pub category: String,
    pub body: String,
}

/// Fetch every newsletter from `settings.sender` received in the last `days_back` days.
pub async fn fetch_newsletters(settings: &Settings, days_back: u32) -> Result<Vec<RawDocument>> {
    let mut session = ImapSession::connect(&settings.imap_host, settings.imap_port).await?;
    session
        .login(&settings.gmail_address, &settings.gmail_app_password)
        .await
        .context("IMAP login failed")?;
    session.select(MAILBOX).await?;

    let since = search_since(chrono::Local::now().date_naive(), days_back);
    let criteria = format!("FROM {} SINCE {}", imap::quote(&settings.sender), since);
    let hits = session.search(&criteria).await?;
    info!("Found {} messages from {} since {}", hits.len(), settings.sender, since);

    let mut docs = Vec::with_capacity(hits.len());
    for seq in hits {
        match session.fetch_rfc822(seq).await {
            Ok(Some(raw)) => match decode_message(&raw, &seq.to_string()) {
                Some(doc) => docs.push(doc),
                None => warn!("Message {} could not be decoded, skipping", seq),
            },
            Ok(None) => warn!("Message {} returned no body, skipping", seq),
            Err(e) => warn!("Fetch failed for message {}: {:#}", seq, e),
        }
    }

    if let Err(e) = session.logout().await {
        warn!("IMAP logout failed: {:#}", e);
    }
    Ok(docs)
}

/// Decode a raw RFC 822 message. `fallback_id` is used when there is no Message-ID.
pub fn decode_message(raw: &[u8], fallback_id: &str) -> Option<RawDocument> {
    let message = MessageParser::default().parse(raw)?;

    let from = message
        .from()
        .and_then(|addrs| addrs.first())
        .map(|addr| match (addr.name(), addr.address()) {
            (Some(name), Some(address)) => format!("{} <{}>", name, address),
            (Some(name), None) => name.to_string(),
            (None, address) => address.unwrap_or("").to_string(),
        })
        .unwrap_or_default();

    Some(RawDocument {
        id: message
            .message_id()
            .map(canonical_message_id)
            .unwrap_or_else(|| fallback_id.to_string()),
        subject: message.subject().unwrap_or("").to_string(),
        category: newsletter_category(&from),
        body: message.body_text(0).map(|b| b.into_owned()).unwrap_or_default(),
    })
}

/// Message-ID without surrounding whitespace or angle brackets, the form
/// stored in the processed-documents table.
pub fn canonical_message_id(id: &str) -> String {
    let id = id.trim();
    id.strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(id)
        .trim()
        .to_string()
}

/// "TLDR AI <dan@tldrnewsletter.com>" → "TLDR AI"; anything else → "TLDR".
pub fn newsletter_category(from: &str) -> String {
    EDITION_RE
        .captures(from)
        .map(|caps| format!("TLDR {}", &caps[1]))
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

/// IMAP SEARCH date, e.g. "18-Oct-2026".
fn search_since(today: NaiveDate, days_back: u32) -> String {
    (today - Duration::days(i64::from(days_back)))
        .format("%d-%b-%Y")
        .to_string()
}

/// Read a message or a plain body from disk; `.eml` files are MIME-decoded.
pub fn load_document(path: &std::path::Path) -> Result<RawDocument> {
    let raw = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path.display().to_string();

    let is_eml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"));
    if is_eml {
        return decode_message(&raw, &name)
            .with_context(|| format!("{} is not a parseable email", name));
    }

    Ok(RawDocument {
        id: name,
        subject: String::new(),
        category: DEFAULT_CATEGORY.to_string(),
        body: String::from_utf8_lossy(&raw).into_owned(),
    })
}
