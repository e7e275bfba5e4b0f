use anyhow::{Context, Result};

const DEFAULT_DEEPL_URL: &str = "https://api-free.deepl.com/v2/translate";
const DEFAULT_TARGET_LANG: &str = "KO";
const DEFAULT_IMAP_HOST: &str = "imap.gmail.com";
const DEFAULT_IMAP_PORT: u16 = 993;
const DEFAULT_SENDER: &str = "tldrnewsletter.com";
const DEFAULT_DB_PATH: &str = "data/tldr.sqlite";

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub gmail_address: String,
    pub gmail_app_password: String,
    pub deepl_api_key: String,
    pub slack_webhook_url: String,
    pub deepl_api_url: String,
    pub target_lang: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub sender: String,
    pub db_path: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let imap_port = match get("TLDR_IMAP_PORT") {
            Some(p) => p
                .trim()
                .parse()
                .with_context(|| format!("TLDR_IMAP_PORT is not a port number: {}", p))?,
            None => DEFAULT_IMAP_PORT,
        };

        Ok(Settings {
            gmail_address: or("GMAIL_ADDRESS", ""),
            gmail_app_password: or("GMAIL_APP_PASSWORD", ""),
            deepl_api_key: or("DEEPL_API_KEY", ""),
            slack_webhook_url: or("SLACK_WEBHOOK_URL", ""),
            deepl_api_url: or("DEEPL_API_URL", DEFAULT_DEEPL_URL),
            target_lang: or("TLDR_TARGET_LANG", DEFAULT_TARGET_LANG),
            imap_host: or("TLDR_IMAP_HOST", DEFAULT_IMAP_HOST),
            imap_port,
            sender: or("TLDR_SENDER", DEFAULT_SENDER),
            db_path: or("TLDR_DB_PATH", DEFAULT_DB_PATH),
        })
    }

    /// (variable, is_set) for every credential the `run` command needs.
    pub fn required(&self, translate: bool, publish: bool) -> Vec<(&'static str, bool)> {
        let mut vars = vec![
            ("GMAIL_ADDRESS", !self.gmail_address.is_empty()),
            ("GMAIL_APP_PASSWORD", !self.gmail_app_password.is_empty()),
        ];
        if translate {
            vars.push(("DEEPL_API_KEY", !self.deepl_api_key.is_empty()));
        }
        if publish {
            vars.push(("SLACK_WEBHOOK_URL", !self.slack_webhook_url.is_empty()));
        }
        vars
    }
}
