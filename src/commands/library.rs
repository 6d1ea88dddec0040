//! `library list` command handler.

use anyhow::Result;
use stackwatch_core::catalog::LibraryStore;

pub async fn run_library_list(library_store: &LibraryStore) -> Result<()> {
    let entries = library_store.list_all().await?;
    if entries.is_empty() {
        println!("library is empty");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "#{:<4} {:<30} {} {}",
            entry.id,
            entry.title,
            entry.issue_date(),
            entry.file_path
        );
    }
    Ok(())
}
