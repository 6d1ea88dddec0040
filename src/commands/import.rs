//! `import` command handler: manually runs the Import Pipeline on a
//! single file, the CLI's equivalent of the Monitor's directory-scan
//! entry point (§4.6).

use anyhow::Result;
use stackwatch_core::catalog::{LibraryStore, SubmissionStore, TrackingStore};
use stackwatch_core::config::StackwatchConfig;
use stackwatch_core::importer::{self, CoverConfig, ImportCollaborators, ImportOptions, ImportOutcome};

use crate::cli::ImportArgs;

pub async fn run_import(
    args: &ImportArgs,
    config: &StackwatchConfig,
    library_store: &LibraryStore,
    submission_store: &SubmissionStore,
    tracking_store: &TrackingStore,
) -> Result<()> {
    let options = ImportOptions {
        skip_organize: args.in_place,
        tracking_mode: None,
        cover: CoverConfig {
            dpi: config.pdf.cover_dpi_high,
            quality: config.pdf.cover_quality_high,
        },
        organization_pattern: config.import.organization_pattern.clone(),
        category_prefix: config.import.category_prefix.clone(),
        fuzzy_threshold: config.matching.fuzzy_threshold,
        duplicate_date_threshold_days: config.matching.duplicate_date_threshold_days,
    };

    let covers_dir = config.storage.organize_dir.join(".covers");
    let collaborators = ImportCollaborators {
        library_store,
        submission_store,
        tracking_store,
        organize_base: &config.storage.organize_dir,
        covers_dir: &covers_dir,
        submission_id: None,
    };

    match importer::import_file(&args.path, &options, &collaborators).await? {
        ImportOutcome::Imported { library_entry_id, final_path, cover_path } => {
            println!("imported as library entry #{library_entry_id}: {}", final_path.display());
            if let Some(cover) = cover_path {
                println!("cover: {}", cover.display());
            }
        }
        ImportOutcome::DuplicateSkipped { existing_entry_id } => {
            println!("skipped: duplicate of library entry #{existing_entry_id}");
        }
    }

    Ok(())
}
