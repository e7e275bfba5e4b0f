use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::parser::Article;

/// Only the first articles of a newsletter make it into one message.
pub const MAX_ARTICLES: usize = 12;

/// Newsletter edition → header glyph.
pub const EDITION_GLYPHS: &[(&str, &str)] = &[
    ("TLDR", "📬"),
    ("TLDR AI", "🤖"),
    ("TLDR InfoSec", "🔐"),
    ("TLDR Crypto", "₿"),
    ("TLDR Founders", "🚀"),
    ("TLDR Design", "🎨"),
    ("TLDR Marketing", "📈"),
    ("TLDR DevOps", "⚙️"),
    ("TLDR Web", "🌐"),
];
const DEFAULT_EDITION_GLYPH: &str = "📬";

pub fn edition_glyph(category: &str) -> &'static str {
    EDITION_GLYPHS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, glyph)| *glyph)
        .unwrap_or(DEFAULT_EDITION_GLYPH)
}

/// Block Kit payload: header, date/count context, divider, then the first
/// `MAX_ARTICLES` articles with a bold heading whenever the section changes.
pub fn format_message(category: &str, articles: &[Article], date: NaiveDate) -> Value {
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {
                "type": "plain_text",
                "text": format!("{} {}", edition_glyph(category), category),
                "emoji": true,
            }
        }),
        json!({
            "type": "context",
            "elements": [{
                "type": "mrkdwn",
                "text": format!("📅 {} • {} articles", date.format("%Y-%m-%d"), articles.len()),
            }]
        }),
        json!({ "type": "divider" }),
    ];

    let mut current_section = "";
    for article in articles.iter().take(MAX_ARTICLES) {
        if !article.section.is_empty() && article.section != current_section {
            current_section = &article.section;
            blocks.push(mrkdwn_section(format!("*{}*", escape_mrkdwn(current_section))));
        }
        blocks.push(mrkdwn_section(format!(
            "<{}|{}>\n→ {}",
            escape_mrkdwn(&article.url),
            escape_mrkdwn(&article.title),
            escape_mrkdwn(&article.summary)
        )));
    }

    json!({ "blocks": blocks })
}

/// Slack control characters. `&` goes first so entities are not double-escaped.
fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn mrkdwn_section(text: String) -> Value {
    json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": text }
    })
}

/// POST the message to an incoming webhook. `Ok(false)` means Slack answered
/// with something other than 200.
pub async fn publish(client: &reqwest::Client, webhook_url: &str, message: &Value) -> Result<bool> {
    let response = client
        .post(webhook_url)
        .json(message)
        .send()
        .await
        .context("Slack webhook request failed")?;
    Ok(response.status() == reqwest::StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(section: &str, title: &str) -> Article {
        Article {
            section: section.into(),
            title: title.into(),
            url: format!("https://example.com/{}", title),
            summary: format!("About {}.", title),
        }
    }

    fn texts(message: &Value) -> Vec<String> {
        message["blocks"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|b| b["type"] == "section")
            .map(|b| b["text"]["text"].as_str().unwrap().to_string())
            .collect()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn header_and_context() {
        let msg = format_message("TLDR AI", &[article("", "a")], date());
        let blocks = msg["blocks"].as_array().unwrap();
        assert_eq!(blocks[0]["text"]["text"], "🤖 TLDR AI");
        assert_eq!(blocks[1]["elements"][0]["text"], "📅 2026-10-19 • 1 articles");
        assert_eq!(blocks[2]["type"], "divider");
    }

    #[test]
    fn unknown_edition_uses_default_glyph() {
        assert_eq!(edition_glyph("TLDR Fintech"), "📬");
        assert_eq!(edition_glyph("TLDR DevOps"), "⚙️");
    }

    #[test]
    fn article_block_format() {
        let msg = format_message("TLDR", &[article("", "x")], date());
        assert_eq!(texts(&msg), vec!["<https://example.com/x|x>\n→ About x."]);
    }

    #[test]
    fn control_characters_are_escaped() {
        let a = Article {
            section: "R&D".into(),
            title: "Vec<T> -> Box<[T]>".into(),
            url: "https://example.com/a?x=1&y=2".into(),
            summary: "a > b & c < d.".into(),
        };
        let t = texts(&format_message("TLDR", &[a], date()));
        assert_eq!(t[0], "*R&amp;D*");
        assert_eq!(
            t[1],
            "<https://example.com/a?x=1&amp;y=2|Vec&lt;T&gt; -&gt; Box&lt;[T]&gt;>\n→ a &gt; b &amp; c &lt; d."
        );
        // Exactly one unescaped link delimiter pair remains.
        assert_eq!(t[1].matches('<').count(), 1);
        assert_eq!(t[1].matches('>').count(), 1);
    }

    #[test]
    fn headings_on_section_change_only() {
        let articles = vec![
            article("", "a"),
            article("S1", "b"),
            article("S1", "c"),
            article("S2", "d"),
            article("", "e"),
            article("S1", "f"),
        ];
        let t = texts(&format_message("TLDR", &articles, date()));
        let headings: Vec<&str> = t.iter().filter(|s| s.starts_with('*')).map(String::as_str).collect();
        assert_eq!(headings, vec!["*S1*", "*S2*", "*S1*"]);
        assert_eq!(t.len(), 9);
        // An unlabelled article keeps the previous heading current.
        assert!(t[6].contains("|e>"));
        assert_eq!(t[7], "*S1*");
    }

    #[test]
    fn capped_at_twelve() {
        let articles: Vec<Article> = (0..20).map(|i| article("", &format!("t{}", i))).collect();
        let msg = format_message("TLDR", &articles, date());
        assert_eq!(texts(&msg).len(), MAX_ARTICLES);
        // The count still reflects every article found.
        assert_eq!(msg["blocks"][1]["elements"][0]["text"], "📅 2026-10-19 • 20 articles");
    }
}
