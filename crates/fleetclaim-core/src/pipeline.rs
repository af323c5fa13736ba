//! Validation phase: classify a whole manifest and write the three outputs

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::audit::AuditEntry;
use crate::classify::RowClassifier;
use crate::directory::Directory;
use crate::manifest::{ManifestRow, DELIMITER};
use crate::policy::NamingPolicy;
use crate::record::{Disposition, RecordRow, ValidationRecord};
use crate::sequence::SequenceAllocator;
use crate::snapshot::DirectorySnapshot;

pub const IGNORED_SUFFIX: &str = "ignored_inventory.csv";
pub const REJECTED_SUFFIX: &str = "error_validation.csv";
pub const VALIDATED_SUFFIX: &str = "validated_upload.csv";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Records of one validation run, split by disposition, in manifest order
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub already_added: Vec<ValidationRecord>,
    pub rejected: Vec<ValidationRecord>,
    pub validated: Vec<ValidationRecord>,
    /// One entry per manifest row
    pub entries: Vec<AuditEntry>,
}

/// Paths of the files written for a report; sets with no rows are skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFiles {
    pub ignored: Option<PathBuf>,
    pub rejected: Option<PathBuf>,
    pub validated: Option<PathBuf>,
}

impl ValidationReport {
    pub fn total(&self) -> usize {
        self.already_added.len() + self.rejected.len() + self.validated.len()
    }

    /// Rows whose serial was found in an inventory, assigned or not
    pub fn inventory_hits(&self) -> usize {
        self.already_added.len() + self.rejected.iter().filter(|r| r.in_inventory).count()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Summary: {} lines marked as already added, {} validated, {} rejected.",
            self.inventory_hits(),
            self.validated.len(),
            self.rejected.len()
        )
    }

    fn push(&mut self, record: ValidationRecord) {
        let entry = match record.disposition {
            Disposition::AlreadyAdded => AuditEntry::info(
                Some(record.line),
                format!("Serial: {} already in network {}", record.serial, record.network_name),
            ),
            Disposition::Validated => AuditEntry::info(
                Some(record.line),
                format!(
                    "Serial: {} -> {}",
                    record.serial,
                    record.device_name.as_deref().unwrap_or_default()
                ),
            ),
            Disposition::Rejected => AuditEntry::warn(
                Some(record.line),
                format!(
                    "Serial: {}, Input: {}, Msg: {}",
                    record.serial, record.input_network_name, record.message
                ),
            ),
        };
        self.entries.push(entry);

        match record.disposition {
            Disposition::AlreadyAdded => self.already_added.push(record),
            Disposition::Validated => self.validated.push(record),
            Disposition::Rejected => self.rejected.push(record),
        }
    }

    /// Write the non-empty record sets as `<timestamp>_<suffix>` files
    pub fn write_outputs(&self, dir: &Path, timestamp: &str) -> Result<OutputFiles, OutputError> {
        std::fs::create_dir_all(dir)?;

        let write = |records: &[ValidationRecord], suffix: &str| -> Result<Option<PathBuf>, OutputError> {
            if records.is_empty() {
                return Ok(None);
            }
            let path = dir.join(format!("{}_{}", timestamp, suffix));
            write_records(&path, records)?;
            info!(path = %path.display(), rows = records.len(), "Generated output file");
            Ok(Some(path))
        };

        Ok(OutputFiles {
            ignored: write(self.already_added.as_slice(), IGNORED_SUFFIX)?,
            rejected: write(self.rejected.as_slice(), REJECTED_SUFFIX)?,
            validated: write(self.validated.as_slice(), VALIDATED_SUFFIX)?,
        })
    }
}

/// Write records in the fixed column order
pub fn write_records(path: &Path, records: &[ValidationRecord]) -> Result<(), OutputError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?;
    for record in records {
        writer.serialize(RecordRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// One validation run over a manifest.
///
/// Owns the run-scoped sequence and address caches, so each pipeline starts
/// from a clean slate.
pub struct ValidationPipeline<'a> {
    classifier: RowClassifier<'a>,
    allocator: SequenceAllocator,
}

impl<'a> ValidationPipeline<'a> {
    pub fn new(snapshot: &'a DirectorySnapshot, policy: &'a NamingPolicy) -> Self {
        Self {
            classifier: RowClassifier::new(snapshot, policy),
            allocator: SequenceAllocator::new(),
        }
    }

    /// Classify every row, strictly in order
    pub async fn run<D: Directory>(&mut self, directory: &D, rows: &[ManifestRow]) -> ValidationReport {
        let mut report = ValidationReport::default();
        for row in rows {
            let record = self
                .classifier
                .classify(directory, &mut self.allocator, row)
                .await;
            report.push(record);
        }

        info!(
            rows = rows.len(),
            already_added = report.already_added.len(),
            validated = report.validated.len(),
            rejected = report.rejected.len(),
            "Validation complete"
        );
        report
    }
}
