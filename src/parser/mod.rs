pub mod links;
pub mod sections;
pub mod segmenter;
pub mod summary;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One extracted newsletter entry. Only built when both title and url are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub section: String,
    pub title: String,
    pub url: String,
    pub summary: String,
}

/// Two-step pipeline: body → link table → segmented articles.
pub fn parse_document(body: &str) -> Vec<Article> {
    let links = links::build_link_table(body);
    if links.is_empty() {
        debug!("no links appendix found, articles cannot resolve");
    } else {
        debug!(links = links.len(), "link table built");
    }
    segmenter::segment(body, &links)
}

// ── Tests ──
