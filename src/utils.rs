//! Utility functions
use std::fs::{read_dir, remove_dir};
use std::path::Path;

use crate::batch::{BatchReport, Migrator};
use crate::config::GitMigratorConfig;
use crate::errors::GitMigratorError;
use crate::transport::get_transport;

/// Main function to migrate repositories
/// # Errors
/// Error if the configuration is invalid or the transport can't run
pub async fn main_migrate(config: GitMigratorConfig) -> Result<BatchReport, GitMigratorError> {
    let migration_config = config.to_migration_config()?;
    let transport = get_transport(config.transport());
    transport.check_available().await?;
    println!("Using the {} transport", transport.name());
    println!(
        "Migrating {} repositories from {} to {}",
        migration_config.repos.len(),
        migration_config.origin_host,
        migration_config.dest_host
    );
    let work_dir = migration_config.work_dir.clone();
    let report = Migrator::new(transport).run(migration_config).await?;
    print_report(&report);
    if config.has_generated_work_dir() {
        remove_if_empty(&work_dir);
    }
    Ok(report)
}

/// Print one line per repository, then the summary
pub(crate) fn print_report(report: &BatchReport) {
    println!();
    for outcome in report.outcomes() {
        let marker = if outcome.is_failed() { "FAIL" } else { " OK " };
        println!("[{marker}] {outcome}");
        if let Some(diagnostic) = outcome
            .error_detail()
            .and_then(|detail| detail.error.diagnostic())
        {
            for line in diagnostic.lines() {
                println!("       {line}");
            }
        }
    }
    println!("{}", report.summary());
}

/// Remove `path` if it is an empty directory
fn remove_if_empty(path: &Path) {
    let is_empty = read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if is_empty {
        match remove_dir(path) {
            Ok(()) => log::debug!("Removed {}", path.display()),
            Err(e) => log::warn!("Unable to remove {}: {e}", path.display()),
        }
    }
}
