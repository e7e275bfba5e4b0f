use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::mail::{canonical_message_id, RawDocument};
use crate::parser::Article;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create database directory {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS processed_documents (
            id            TEXT PRIMARY KEY,
            category      TEXT,
            subject       TEXT,
            article_count INTEGER NOT NULL DEFAULT 0,
            processed_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS articles (
            id           INTEGER PRIMARY KEY,
            document_id  TEXT NOT NULL REFERENCES processed_documents(id),
            position     INTEGER NOT NULL,
            section      TEXT NOT NULL,
            title        TEXT NOT NULL,
            url          TEXT NOT NULL,
            summary      TEXT NOT NULL,
            UNIQUE(document_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_articles_document ON articles(document_id);
        ",
    )?;
    Ok(())
}

// ── De-duplication ──

pub fn processed_ids(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT id FROM processed_documents")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<HashSet<String>, _>>()?;
    Ok(ids)
}

/// Mark a document as published and archive the articles extracted from it.
pub fn record_published(conn: &Connection, doc: &RawDocument, articles: &[Article]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM articles WHERE document_id = ?1", [&doc.id])?;
    tx.execute(
        "INSERT OR REPLACE INTO processed_documents (id, category, subject, article_count)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![doc.id, doc.category, doc.subject, articles.len() as i64],
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO articles (document_id, position, section, title, url, summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (i, a) in articles.iter().enumerate() {
            stmt.execute(rusqlite::params![doc.id, i as i64, a.section, a.title, a.url, a.summary])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Load ids from an older run's id list. Returns how many were new.
///
/// Old lists hold raw `Message-ID` headers (`<x@y>`); they are stored in the
/// same bracket-free form that fetched documents carry.
pub fn import_ids(conn: &Connection, ids: &[String]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO processed_documents (id) VALUES (?1)")?;
        for id in ids {
            let id = canonical_message_id(id);
            if id.is_empty() {
                continue;
            }
            count += stmt.execute([&id])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Stats ──

pub struct CategoryStats {
    pub category: String,
    pub documents: usize,
    pub articles: usize,
}

pub struct Stats {
    pub documents: usize,
    pub articles: usize,
    pub by_category: Vec<CategoryStats>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let documents: usize =
        conn.query_row("SELECT COUNT(*) FROM processed_documents", [], |r| r.get(0))?;
    let articles: usize = conn.query_row("SELECT COUNT(*) FROM articles", [], |r| r.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT COALESCE(category, '(imported)'), COUNT(*), COALESCE(SUM(article_count), 0)
         FROM processed_documents
         GROUP BY 1
         ORDER BY 1",
    )?;
    let by_category = stmt
        .query_map([], |row| {
            Ok(CategoryStats {
                category: row.get(0)?,
                documents: row.get(1)?,
                articles: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stats {
        documents,
        articles,
        by_category,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn doc(id: &str, category: &str) -> RawDocument {
        RawDocument {
            id: id.into(),
            subject: "subject".into(),
            category: category.into(),
            body: String::new(),
        }
    }

    fn article(title: &str) -> Article {
        Article {
            section: "⚡ Quick Links".into(),
            title: title.into(),
            url: format!("https://example.com/{}", title),
            summary: String::new(),
        }
    }

    #[test]
    fn record_then_seen() {
        let conn = memory_db();
        assert!(processed_ids(&conn).unwrap().is_empty());

        record_published(&conn, &doc("<a@b>", "TLDR AI"), &[article("x"), article("y")]).unwrap();
        let ids = processed_ids(&conn).unwrap();
        assert!(ids.contains("<a@b>"));

        let s = get_stats(&conn).unwrap();
        assert_eq!(s.documents, 1);
        assert_eq!(s.articles, 2);
        assert_eq!(s.by_category[0].category, "TLDR AI");
        assert_eq!(s.by_category[0].articles, 2);
    }

    #[test]
    fn re_recording_replaces_articles() {
        let conn = memory_db();
        let d = doc("id-1", "TLDR");
        record_published(&conn, &d, &[article("x"), article("y")]).unwrap();
        record_published(&conn, &d, &[article("z")]).unwrap();
        let s = get_stats(&conn).unwrap();
        assert_eq!(s.documents, 1);
        assert_eq!(s.articles, 1);
    }

    #[test]
    fn import_is_idempotent() {
        let conn = memory_db();
        let ids = vec!["one".to_string(), "two".to_string(), "one".to_string()];
        assert_eq!(import_ids(&conn, &ids).unwrap(), 2);
        assert_eq!(import_ids(&conn, &ids).unwrap(), 0);

        let s = get_stats(&conn).unwrap();
        assert_eq!(s.by_category[0].category, "(imported)");
        assert_eq!(s.by_category[0].documents, 2);
        assert_eq!(s.by_category[0].articles, 0);
    }

    #[test]
    fn imported_header_ids_match_fetched_documents() {
        let conn = memory_db();
        let legacy = vec!["<fixture-0001@tldrnewsletter.com>".to_string(), "  ".to_string()];
        assert_eq!(import_ids(&conn, &legacy).unwrap(), 1);

        let eml = Path::new("tests/fixtures/tldr_ai.eml");
        let fetched = crate::mail::load_document(eml).unwrap();
        assert!(processed_ids(&conn).unwrap().contains(&fetched.id));

        // Bracketed and bare forms of one id are the same document.
        assert_eq!(import_ids(&conn, &["fixture-0001@tldrnewsletter.com".to_string()]).unwrap(), 0);
    }
}
