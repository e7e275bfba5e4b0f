use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static LINKS_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Links:\s*-+").unwrap());
static LINK_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]\s*(https?://\S+)").unwrap());

/// Reference number → URL, taken from the trailing "Links:" appendix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTable {
    urls: HashMap<u32, String>,
}

impl LinkTable {
    pub fn insert(&mut self, number: u32, url: impl Into<String>) {
        self.urls.insert(number, url.into());
    }

    /// Unknown numbers resolve to "".
    pub fn resolve(&self, number: u32) -> &str {
        self.urls.get(&number).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl FromIterator<(u32, String)> for LinkTable {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        let mut table = LinkTable::default();
        for (number, url) in iter {
            table.insert(number, url);
        }
        table
    }
}

pub fn build_link_table(body: &str) -> LinkTable {
    links_region(body)
        .map(|region| {
            LINK_REF_RE
                .captures_iter(region)
                .filter_map(|caps| Some((caps[1].parse::<u32>().ok()?, caps[2].to_string())))
                .collect::<LinkTable>()
        })
        .unwrap_or_default()
}

/// Everything after the last "Links:" + dashes marker.
fn links_region(body: &str) -> Option<&str> {
    LINKS_MARKER_RE
        .find_iter(body)
        .last()
        .map(|m| &body[m.end()..])
}

// ── Tests ──
