use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

use crate::config::Settings;
use crate::parser::Article;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct DeeplResponse {
    translations: Vec<DeeplTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeeplTranslation {
    text: String,
}

/// DeepL client. Failures never propagate: the original text is returned instead.
pub struct Translator {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    target_lang: String,
}

impl Translator {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            api_url: settings.deepl_api_url.clone(),
            api_key: settings.deepl_api_key.clone(),
            target_lang: settings.target_lang.clone(),
        })
    }

    pub async fn translate(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        match self.request_with_retry(text).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!("DeepL translation failed, keeping original text: {:#}", e);
                text.to_string()
            }
        }
    }

    /// Translate title and summary of each article; section and url pass through.
    pub async fn translate_articles(&self, articles: &[Article]) -> Vec<Article> {
        let pb = ProgressBar::new(articles.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} translating")
        {
            pb.set_style(style.progress_chars("=> "));
        }

        let mut out = Vec::with_capacity(articles.len());
        for article in articles {
            let title = self.translate(&article.title).await;
            let summary = self.translate(&article.summary).await;
            out.push(Article {
                section: article.section.clone(),
                title: title.trim().to_string(),
                url: article.url.clone(),
                summary: summary.trim().to_string(),
            });
            pb.inc(1);
        }

        pb.finish_and_clear();
        out
    }

    async fn request_with_retry(&self, text: &str) -> Result<String> {
        for attempt in 0..=MAX_RETRIES {
            let response = self
                .client
                .post(&self.api_url)
                .header(AUTHORIZATION, format!("DeepL-Auth-Key {}", self.api_key))
                .form(&[("text", text), ("target_lang", self.target_lang.as_str())])
                .send()
                .await
                .context("DeepL request failed")?;

            let status = response.status();
            if status == StatusCode::OK {
                let body: DeeplResponse = response.json().await.context("malformed DeepL response")?;
                return first_translation(body);
            }

            if !should_retry(status) || attempt == MAX_RETRIES {
                bail!("DeepL API returned {}", status);
            }

            let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
            warn!(
                "DeepL returned {} ({}), backing off {:.1}s",
                status,
                attempt_label(attempt),
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
        }

        bail!("DeepL retries exhausted")
    }
}

/// "attempt 1/4": one initial try plus `MAX_RETRIES` retries.
fn attempt_label(attempt: u32) -> String {
    format!("attempt {}/{}", attempt + 1, MAX_RETRIES + 1)
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn first_translation(body: DeeplResponse) -> Result<String> {
    body.translations
        .into_iter()
        .next()
        .map(|t| t.text)
        .context("DeepL response had no translations")
}
