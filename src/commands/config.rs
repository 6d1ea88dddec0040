//! `config` command handler: print the effective, fully-merged config.

use anyhow::Result;
use stackwatch_core::config::StackwatchConfig;

pub fn run_config_show(config: &StackwatchConfig) -> Result<()> {
    println!("[storage]");
    println!("db_path = {}", config.storage.db_path.display());
    println!("download_dir = {}", config.storage.download_dir.display());
    println!("organize_dir = {}", config.storage.organize_dir.display());
    println!("cache_dir = {}", config.storage.cache_dir.display());
    println!();
    println!("[matching]");
    println!("fuzzy_threshold = {}", config.matching.fuzzy_threshold);
    println!(
        "duplicate_date_threshold_days = {}",
        config.matching.duplicate_date_threshold_days
    );
    println!();
    println!("[downloads]");
    println!("max_retries = {}", config.downloads.max_retries);
    println!("max_per_batch = {}", config.downloads.max_per_batch);
    println!();
    println!("[tasks]");
    println!("auto_download_interval = {}s", config.tasks.auto_download_interval);
    println!("download_monitor_interval = {}s", config.tasks.download_monitor_interval);
    println!("cleanup_covers_interval = {}s", config.tasks.cleanup_covers_interval);
    println!();
    println!("[providers]");
    println!("rss feeds configured = {}", config.providers.rss.len());
    println!();
    println!("[client]");
    println!("sabnzbd configured = {}", config.client.sabnzbd.is_some());
    Ok(())
}
