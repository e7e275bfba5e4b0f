use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::links::LinkTable;
use super::sections::classify_section;
use super::summary::summarize;
use super::Article;

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s*\((\d+)\s*MINUTE\s*READ\)\s*\[(\d+)\]").unwrap()
});
static HEADER_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z][A-Z\s&]+$").unwrap());

/// Glyphs that may stand alone on the line above an all-caps section header.
pub const SECTION_MARKERS: &[&str] = &[
    "🚀", "🧠", "🧑‍💻", "🧑", "💻", "🎁", "⚡", "📰", "🔒", "🎨", "💰", "📣", "👔", "🔭", "🏢",
    "🌱", "💭",
];

/// Lower-cased phrases that mark sponsor, footer, or promo text.
pub const BOILERPLATE_PHRASES: &[&str] = &[
    "sign up",
    "advertise",
    "unsubscribe",
    "manage your",
    "referral",
    "tldr is hiring",
    "want to work",
    "love tldr",
];

const BLANK_RUN_LIMIT: usize = 2;

enum State {
    Scanning,
    InBody(Draft),
}

/// An article whose title line has been seen but whose body is still open.
struct Draft {
    title: String,
    link_ref: Option<u32>,
    description: Vec<String>,
    blank_run: usize,
}

/// Why an open article body ended on a non-blank line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    NextTitle,
    SectionMarker,
    Boilerplate,
}

struct ParseCursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    section: String,
    links: &'a LinkTable,
    articles: Vec<Article>,
}

/// Scan `body` line by line and emit every article whose link resolves.
pub fn segment(body: &str, links: &LinkTable) -> Vec<Article> {
    let normalized = body.replace("\r\n", "\n");
    let mut cursor = ParseCursor {
        lines: normalized.split(['\n', '\r']).map(str::trim).collect(),
        pos: 0,
        section: String::new(),
        links,
        articles: Vec::new(),
    };

    let mut state = State::Scanning;
    while cursor.pos < cursor.lines.len() {
        state = match state {
            State::Scanning => cursor.scan(),
            State::InBody(draft) => cursor.accumulate(draft),
        };
    }
    if let State::InBody(draft) = state {
        cursor.finish(draft);
    }

    cursor.articles
}

impl<'a> ParseCursor<'a> {
    fn scan(&mut self) -> State {
        let line = self.lines[self.pos];

        if is_section_marker(line) {
            if let Some(header) = self.header_after(self.pos) {
                self.section = classify_section(header);
                debug!(section = %self.section, line = self.pos, "section header");
                self.pos += 2;
                return State::Scanning;
            }
        } else if let Some((title, link_ref)) = match_title(line) {
            self.pos += 1;
            return State::InBody(Draft {
                title,
                link_ref,
                description: Vec::new(),
                blank_run: 0,
            });
        }

        self.pos += 1;
        State::Scanning
    }

    fn accumulate(&mut self, mut draft: Draft) -> State {
        let line = self.lines[self.pos];

        if line.is_empty() {
            draft.blank_run += 1;
            if draft.blank_run >= BLANK_RUN_LIMIT {
                return self.terminate(draft);
            }
            self.pos += 1;
            return State::InBody(draft);
        }

        draft.blank_run = 0;
        if let Some(boundary) = body_boundary(line) {
            debug!(?boundary, line = self.pos, title = %draft.title, "article body ended");
            return self.terminate(draft);
        }

        draft.description.push(line.to_string());
        self.pos += 1;
        State::InBody(draft)
    }

    /// Close the draft without consuming the current line, so `scan` sees it next.
    fn terminate(&mut self, draft: Draft) -> State {
        self.finish(draft);
        State::Scanning
    }

    fn finish(&mut self, draft: Draft) {
        let links = self.links;
        let url = draft.link_ref.map(|n| links.resolve(n)).unwrap_or("");

        if draft.title.is_empty() || url.is_empty() {
            debug!(title = %draft.title, link_ref = ?draft.link_ref, "dropping article without resolvable link");
            return;
        }

        self.articles.push(Article {
            section: self.section.clone(),
            title: draft.title,
            url: url.to_string(),
            summary: summarize(&draft.description.join(" ")),
        });
    }

    /// The all-caps header text on the line after a marker glyph, if any.
    fn header_after(&self, idx: usize) -> Option<&'a str> {
        self.lines
            .get(idx + 1)
            .copied()
            .filter(|next| !next.is_empty() && HEADER_TEXT_RE.is_match(next))
    }
}

fn match_title(line: &str) -> Option<(String, Option<u32>)> {
    let caps = TITLE_RE.captures(line)?;
    Some((caps[1].trim().to_string(), caps[3].parse().ok()))
}

fn is_section_marker(line: &str) -> bool {
    let glyph = line.trim_end_matches('\u{fe0f}').trim_end();
    SECTION_MARKERS.contains(&glyph)
}

fn is_boilerplate(line: &str) -> bool {
    let lower = line.to_lowercase();
    BOILERPLATE_PHRASES.iter().any(|p| lower.contains(p))
}

/// Termination checks for a non-blank body line, in precedence order.
fn body_boundary(line: &str) -> Option<Boundary> {
    if TITLE_RE.is_match(line) {
        Some(Boundary::NextTitle)
    } else if is_section_marker(line) {
        Some(Boundary::SectionMarker)
    } else if is_boilerplate(line) {
        Some(Boundary::Boilerplate)
    } else {
        None
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(u32, &str)]) -> LinkTable {
        entries.iter().map(|(n, u)| (*n, u.to_string())).collect()
    }

    fn titles(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.title.as_str()).collect()
    }

    #[test]
    fn back_to_back_titles() {
        let body = "Foo (3 MINUTE READ) [1]\nDesc text.\nBar (2 MINUTE READ) [2]\n";
        let links = table(&[(1, "http://a"), (2, "http://b")]);
        let articles = segment(body, &links);
        assert_eq!(
            articles,
            vec![
                Article {
                    section: String::new(),
                    title: "Foo".into(),
                    url: "http://a".into(),
                    summary: "Desc text.".into(),
                },
                Article {
                    section: String::new(),
                    title: "Bar".into(),
                    url: "http://b".into(),
                    summary: String::new(),
                },
            ]
        );
    }

    #[test]
    fn double_blank_ends_body() {
        let body = "Foo (3 MINUTE READ) [1]\nFirst line.\n\nStill foo.\n\n\nStray trailing text.\n";
        let articles = segment(body, &table(&[(1, "http://a")]));
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].summary, "First line. Still foo.");
    }

    #[test]
    fn boilerplate_ends_body() {
        let body = "Foo (3 MINUTE READ) [1]\nReal text.\nClick here to UNSUBSCRIBE from this list.\nMore junk.";
        let articles = segment(body, &table(&[(1, "http://a")]));
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].summary, "Real text.");
    }

    #[test]
    fn section_marker_ends_body_and_sets_section() {
        let body = "\
🚀

HEADLINES & LAUNCHES
";
        // Header must be on the line directly after the glyph.
        let articles = segment(body, &LinkTable::default());
        assert!(articles.is_empty());

        let body = "\
Early bird (1 MINUTE READ) [1]
Before any section.
🚀
HEADLINES & LAUNCHES
Launch (4 MINUTE READ) [2]
Something launched.
🧠
DEEP DIVES & ANALYSIS
Dive (9 minute read) [3]
Deep stuff.
";
        let links = table(&[(1, "http://1"), (2, "http://2"), (3, "http://3")]);
        let articles = segment(body, &links);
        assert_eq!(titles(&articles), vec!["Early bird", "Launch", "Dive"]);
        assert_eq!(articles[0].section, "");
        assert_eq!(articles[0].summary, "Before any section.");
        assert_eq!(articles[1].section, "📰 Headlines & Launches");
        assert_eq!(articles[1].summary, "Something launched.");
        assert_eq!(articles[2].section, "🧠 Deep Dives & Analysis");
    }

    #[test]
    fn unresolved_link_is_dropped() {
        let body = "A (1 MINUTE READ) [1]\nx.\nB (1 MINUTE READ) [2]\ny.\nC (1 MINUTE READ) [3]\nz.\n";
        let articles = segment(body, &table(&[(1, "http://a"), (3, "http://c")]));
        assert_eq!(titles(&articles), vec!["A", "C"]);
        assert!(articles.iter().all(|a| !a.title.is_empty() && !a.url.is_empty()));
        // B's body must not bleed into neighbours.
        assert_eq!(articles[0].summary, "x.");
        assert_eq!(articles[1].summary, "z.");
    }

    #[test]
    fn no_links_means_no_articles() {
        let body = "A (1 MINUTE READ) [1]\nx.\n";
        assert!(segment(body, &LinkTable::default()).is_empty());
    }

    #[test]
    fn glyph_without_header_is_skipped() {
        let body = "💰\nnot a header\nA (2 MINUTE READ) [1]\ntext.";
        let articles = segment(body, &table(&[(1, "http://a")]));
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].section, "");
    }

    #[test]
    fn variation_selector_glyph() {
        let body = "⚡\u{fe0f}\nQUICK LINKS\nA (2 MINUTE READ) [1]\ntext.";
        let articles = segment(body, &table(&[(1, "http://a")]));
        assert_eq!(articles[0].section, "⚡ Quick Links");
    }

    #[test]
    fn crlf_lines() {
        let body = "A (2 MINUTE READ) [1]\r\nOne.\r\nTwo.\r\n\r\n\r\nlater\r\n";
        let articles = segment(body, &table(&[(1, "http://a")]));
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].summary, "One. Two.");
    }

    #[test]
    fn eof_closes_open_body() {
        let body = "A (2 MINUTE READ) [1]\nOne. Two. Three.";
        let articles = segment(body, &table(&[(1, "http://a")]));
        assert_eq!(articles[0].summary, "One. Two.");
    }

    #[test]
    fn title_with_trailing_text_and_odd_spacing() {
        let body = "  Rust 2.0 announced(12minute read)[5] extra  \nbody.";
        let articles = segment(body, &table(&[(5, "https://rust")]));
        assert_eq!(articles[0].title, "Rust 2.0 announced");
    }

    #[test]
    fn boilerplate_outside_body_is_ignored() {
        let body = "Sign up for our newsletter\nA (2 MINUTE READ) [1]\ntext.";
        let articles = segment(body, &table(&[(1, "http://a")]));
        assert_eq!(articles.len(), 1);
    }

    #[test]
    fn boundary_precedence() {
        assert_eq!(body_boundary("Advertise (1 MINUTE READ) [9]"), Some(Boundary::NextTitle));
        assert_eq!(body_boundary("🔒"), Some(Boundary::SectionMarker));
        assert_eq!(body_boundary("Want to work at TLDR?"), Some(Boundary::Boilerplate));
        assert_eq!(body_boundary("Ordinary sentence."), None);
    }

    #[test]
    fn marker_shapes() {
        assert!(is_section_marker("🧑‍💻"));
        assert!(is_section_marker("🎨 "));
        assert!(!is_section_marker("🚀 Launch"));
        assert!(!is_section_marker("🤖"));
        assert!(match_title("No annotation here [1]").is_none());
    }
}
