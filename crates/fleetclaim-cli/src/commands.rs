//! Subcommand flows

use anyhow::{Context, Result};
use fleetclaim_core::{
    file_timestamp, read_manifest, AuditEntry, AuditLog, ClaimGrouper, ClaimSummary, Directory,
    DirectorySnapshot, NamingPolicy, OutputFiles, ValidationPipeline, ValidationReport,
};
use std::path::Path;
use tracing::{info, warn};

use crate::config::{ClaimConfig, ValidateConfig};

/// Validate a supplier manifest and write the three output sets.
///
/// The audit log gets a run block even when the run aborts.
pub async fn validate<D: Directory>(
    directory: &D,
    config: &ValidateConfig,
    policy: &NamingPolicy,
) -> Result<OutputFiles> {
    let log = AuditLog::new(&config.log_file);
    let result = run_validation(directory, config, policy).await;

    let written = match &result {
        Ok((_, report)) => {
            let summary = report.summary_line();
            info!("{}", summary);
            log.write_run("Validation Run", &summary, &report.entries)
        }
        Err(e) => log.write_run(
            "Validation Run",
            &format!("Process stopped: {:#}", e),
            &[AuditEntry::error(None, format!("{:#}", e))],
        ),
    };
    if let Err(e) = written {
        warn!(path = %log.path().display(), error = %e, "Failed to write validation log");
    }

    result.map(|(files, _)| files)
}

async fn run_validation<D: Directory>(
    directory: &D,
    config: &ValidateConfig,
    policy: &NamingPolicy,
) -> Result<(OutputFiles, ValidationReport)> {
    let timestamp = file_timestamp();
    info!(input = %config.input.display(), "Starting validation");

    let snapshot = DirectorySnapshot::fetch(directory, policy)
        .await
        .context("Failed to load organizations, networks and inventory")?;

    let rows = read_manifest(&config.input)
        .with_context(|| format!("Failed to read manifest {}", config.input.display()))?;

    let report = ValidationPipeline::new(&snapshot, policy)
        .run(directory, &rows)
        .await;

    let files = report
        .write_outputs(&config.output_dir, &timestamp)
        .with_context(|| format!("Failed to write outputs to {}", config.output_dir.display()))?;

    Ok((files, report))
}

/// Claim every device listed in a validated file.
///
/// Returns `None` when there is no input file to process.
pub async fn claim<D: Directory>(
    directory: &D,
    config: &ClaimConfig,
    policy: &NamingPolicy,
) -> Result<Option<ClaimSummary>> {
    let log = AuditLog::new(&config.log_file);
    if let Err(e) = log.start_execution() {
        warn!(path = %log.path().display(), error = %e, "Failed to write claim log");
    }

    if !config.input.exists() {
        log.record(AuditEntry::error(
            None,
            format!("File {} not found.", config.input.display()),
        ));
        return Ok(None);
    }

    let summary = ClaimGrouper::new(policy, &log)
        .process_file(directory, &config.input, &config.claimed_dir, &file_timestamp())
        .await
        .with_context(|| format!("Claim aborted for {}", config.input.display()))?;

    Ok(Some(summary))
}

/// Print the paths produced by a validation run
pub fn print_outputs(files: &OutputFiles) {
    for path in [&files.ignored, &files.rejected, &files.validated]
        .into_iter()
        .flatten()
    {
        println!("{}", path.display());
    }
}

/// Print a claim summary and any per-serial failures
pub fn print_claim_summary(summary: &ClaimSummary) {
    println!(
        "{} claimed, {} updated out of {}",
        summary.claimed, summary.updated, summary.total
    );
    for failed in &summary.failed {
        println!("  {}", failed);
    }
}

pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}
