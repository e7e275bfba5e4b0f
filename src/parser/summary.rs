use std::sync::LazyLock;

use regex::Regex;

static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());

const LEAD_SENTENCES: usize = 2;
const MAX_CHARS: usize = 300;
const ELLIPSIS: &str = "...";

/// First two sentences of `text`, capped at 300 chars.
pub fn summarize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lead = split_sentences(text)
        .into_iter()
        .take(LEAD_SENTENCES)
        .collect::<Vec<_>>()
        .join(" ");

    if lead.chars().count() > MAX_CHARS {
        let keep = MAX_CHARS - ELLIPSIS.len();
        let mut cut: String = lead.chars().take(keep).collect();
        cut.push_str(ELLIPSIS);
        cut
    } else {
        lead
    }
}

/// Split after `.`/`!`/`?` when followed by whitespace. The terminator stays
/// with its sentence; the whitespace is dropped.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END_RE.find_iter(text) {
        // terminators are single-byte ASCII
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);
    sentences
}

// ── Tests ──
