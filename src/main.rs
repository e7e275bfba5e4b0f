mod config;
mod db;
mod mail;
mod parser;
mod slack;
mod translate;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tracing::{info, warn};

use config::Settings;
use mail::RawDocument;
use parser::Article;
use translate::Translator;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "tldr_digest", about = "TLDR newsletter → translated Slack digest")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new newsletters, translate them and post to Slack
    Run {
        /// How many days back to search the mailbox
        #[arg(short, long, default_value = "1")]
        days: u32,
        /// Print the Slack payload instead of posting it (nothing is recorded)
        #[arg(long)]
        dry_run: bool,
        /// Post the original English text
        #[arg(long)]
        no_translate: bool,
    },
    /// Parse newsletter bodies (.txt) or raw messages (.eml) from disk
    Parse {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Emit JSON instead of a readable listing
        #[arg(long)]
        json: bool,
    },
    /// Show processed newsletter statistics
    Stats,
    /// Mark ids from a JSON array file as already processed
    ImportIds {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let result = execute(Cli::parse()).await;

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            days,
            dry_run,
            no_translate,
        } => run(&Settings::from_env()?, days, dry_run, !no_translate).await,
        Commands::Parse { files, json } => parse_files(&files, json),
        Commands::Stats => {
            let settings = Settings::from_env()?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Newsletters: {}", s.documents);
            println!("Articles:    {}", s.articles);
            if !s.by_category.is_empty() {
                println!();
                println!("{:<16} | {:>6} | {:>8}", "Category", "Issues", "Articles");
                println!("{}", "-".repeat(36));
                for c in &s.by_category {
                    println!("{:<16} | {:>6} | {:>8}", c.category, c.documents, c.articles);
                }
            }
            Ok(())
        }
        Commands::ImportIds { path } => {
            let settings = Settings::from_env()?;
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let ids: Vec<String> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of ids", path.display()))?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let inserted = db::import_ids(&conn, &ids)?;
            println!("Imported {} new ids ({} in file)", inserted, ids.len());
            Ok(())
        }
    }
}

/// Offline: needs no credentials or settings.
fn parse_files(files: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let parsed: Vec<(RawDocument, Vec<Article>)> = files
        .par_iter()
        .map(|path| -> anyhow::Result<(RawDocument, Vec<Article>)> {
            let doc = mail::load_document(path)?;
            let articles = parser::parse_document(&doc.body);
            Ok((doc, articles))
        })
        .collect::<anyhow::Result<_>>()?;

    if json {
        let out: Vec<_> = parsed
            .iter()
            .map(|(doc, articles)| {
                serde_json::json!({
                    "id": doc.id,
                    "category": doc.category,
                    "articles": articles,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for (doc, articles) in &parsed {
            print_articles(doc, articles);
        }
    }
    Ok(())
}

async fn run(settings: &Settings, days: u32, dry_run: bool, translate: bool) -> anyhow::Result<()> {
    let required = settings.required(translate, !dry_run);
    if required.iter().any(|(_, set)| !set) {
        println!("Missing configuration:");
        for (name, set) in &required {
            println!("  {}: {}", name, if *set { "✓" } else { "✗" });
        }
        bail!("required environment variables are not set");
    }

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let seen = db::processed_ids(&conn)?;

    let docs = mail::fetch_newsletters(settings, days).await?;
    let found = docs.len();
    let fresh: Vec<RawDocument> = docs.into_iter().filter(|d| !seen.contains(&d.id)).collect();
    println!("Found {} newsletters ({} new)", found, fresh.len());
    if fresh.is_empty() {
        return Ok(());
    }

    let parsed: Vec<(RawDocument, Vec<Article>)> = fresh
        .into_par_iter()
        .map(|doc| {
            let articles = parser::parse_document(&doc.body);
            (doc, articles)
        })
        .collect();

    let translator = if translate {
        Some(Translator::new(settings)?)
    } else {
        None
    };
    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let today = chrono::Local::now().date_naive();

    let mut published = 0usize;
    for (doc, articles) in &parsed {
        info!(
            category = %doc.category,
            subject = %doc.subject,
            articles = articles.len(),
            "Processing newsletter"
        );
        if articles.is_empty() {
            warn!("No articles found in {:?}, skipping", doc.subject);
            continue;
        }

        let outgoing = match &translator {
            Some(t) => t.translate_articles(articles).await,
            None => articles.clone(),
        };
        let message = slack::format_message(&doc.category, &outgoing, today);

        if dry_run {
            println!("{}", serde_json::to_string_pretty(&message)?);
            continue;
        }

        match slack::publish(&http, &settings.slack_webhook_url, &message).await {
            Ok(true) => {
                db::record_published(&conn, doc, articles)?;
                published += 1;
                info!("Posted {} to Slack", doc.category);
            }
            Ok(false) => warn!("Slack rejected {:?}", doc.subject),
            Err(e) => warn!("Slack publish failed for {:?}: {:#}", doc.subject, e),
        }
    }

    if !dry_run {
        println!("Published {} of {} newsletters.", published, parsed.len());
    }
    Ok(())
}

fn print_articles(doc: &RawDocument, articles: &[Article]) {
    println!("== {} [{}] ({} articles)", doc.id, doc.category, articles.len());
    for a in articles {
        if a.section.is_empty() {
            println!("- {}", a.title);
        } else {
            println!("- [{}] {}", a.section, a.title);
        }
        println!("  {}", a.url);
        if !a.summary.is_empty() {
            println!("  → {}", a.summary);
        }
    }
    println!();
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──
