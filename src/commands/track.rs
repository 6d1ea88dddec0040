//! `track add` / `track list` / `track remove` command handlers.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use serde_json::json;
use stackwatch_core::catalog::{NewTrackingRecord, TrackingStore};
use stackwatch_core::title::clean_title;

use crate::cli::{TrackAddArgs, TrackMode};

/// Derives a stable `olid` slug from a cleaned title when the caller
/// doesn't supply one explicitly (§3.1: "unique external identifier
/// derived from title").
fn slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_was_dash = true; // suppress a leading dash
    for ch in title.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

pub async fn run_track_add(tracking_store: &TrackingStore, args: &TrackAddArgs) -> Result<()> {
    let title = clean_title(&args.title);
    let olid = args.olid.clone().unwrap_or_else(|| slug(&title));

    let (track_all_editions, track_new_only) = match args.mode {
        TrackMode::All => (true, false),
        TrackMode::New => (false, true),
        TrackMode::Watch => (false, false),
    };

    let selected_editions: HashMap<String, bool> = HashMap::new();
    let selected_years: HashSet<i32> = args.years.iter().copied().collect();
    let metadata = json!({});

    let record = NewTrackingRecord {
        olid: &olid,
        title: &title,
        publisher: None,
        issn: None,
        first_publish_year: None,
        language: &args.language,
        category: &args.category,
        track_all_editions,
        track_new_only,
        selected_editions: &selected_editions,
        selected_years: &selected_years,
        delete_from_client_on_completion: args.delete_on_completion,
        metadata: &metadata,
    };

    let id = tracking_store.upsert(&record).await?;
    println!("tracking #{id}: {title} (olid={olid}, language={}, category={})", args.language, args.category);
    Ok(())
}

pub async fn run_track_list(tracking_store: &TrackingStore) -> Result<()> {
    let records = tracking_store.list_active().await?;
    if records.is_empty() {
        println!("no active tracking records");
        return Ok(());
    }
    for record in &records {
        let mode = if record.track_all_editions {
            "all"
        } else if record.track_new_only {
            "new"
        } else {
            "watch"
        };
        println!(
            "#{:<4} {:<8} {:<30} olid={} language={}",
            record.id, mode, record.title, record.olid, record.language
        );
    }
    Ok(())
}

pub async fn run_track_remove(tracking_store: &TrackingStore, olid: &str) -> Result<()> {
    let Some(record) = tracking_store.get_by_olid(olid).await? else {
        println!("no tracking record with olid={olid}");
        return Ok(());
    };
    tracking_store.delete(record.id).await?;
    println!("stopped tracking {} (olid={olid})", record.title);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_collapses_punctuation_and_case() {
        assert_eq!(slug("Wired Magazine, UK!"), "wired-magazine-uk");
    }

    #[test]
    fn test_slug_trims_trailing_dash() {
        assert_eq!(slug("2600"), "2600");
        assert_eq!(slug("PC Gamer: "), "pc-gamer");
    }
}
