//! Claim phase: register validated devices and apply their metadata
//!
//! Input is the validated file written by the validation phase. The whole
//! batch is checked before anything is sent: duplicate serials or rows that
//! are not `good`/not-already-added abort it. Devices are then claimed one
//! network at a time and each accepted serial gets a single update carrying
//! its name, tags and address. Remote failures are logged per serial or per
//! group and never stop the run.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::audit::{AuditEntry, AuditLog};
use crate::directory::{DeviceUpdate, Directory};
use crate::manifest::DELIMITER;
use crate::policy::NamingPolicy;
use crate::record::RecordRow;

const CLAIMED_PREFIX: &str = "claimed_";
const ERROR_PREFIX: &str = "error_claimed_";

#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse claim input: {0}")]
    Csv(#[from] csv::Error),
    #[error("Input file failed pre-processing validation ({} issues)", .0.len())]
    Preconditions(Vec<PreconditionIssue>),
}

/// A batch-level problem found before any claim is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionIssue {
    DuplicateSerial {
        line: usize,
        serial: String,
    },
    InvalidStatus {
        line: usize,
        serial: String,
        status: String,
        already_added: String,
    },
}

impl std::fmt::Display for PreconditionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateSerial { line, serial } => {
                write!(f, "Line {}: Duplicate serial '{}' found.", line, serial)
            }
            Self::InvalidStatus { line, serial, status, already_added } => write!(
                f,
                "Line {}: Serial '{}' has invalid status '{}' or Already Added is '{}'.",
                line, serial, status, already_added
            ),
        }
    }
}

/// A validated row with its line number in the claim input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRow {
    /// 1-based file line (the header is line 1)
    pub line: usize,
    pub row: RecordRow,
}

/// Load the validated file
pub fn load_claim_rows(path: &Path) -> Result<Vec<ClaimRow>, ClaimError> {
    let file = std::fs::File::open(path)?;
    load_claim_rows_from(file)
}

pub fn load_claim_rows_from<R: Read>(reader: R) -> Result<Vec<ClaimRow>, ClaimError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<RecordRow>().enumerate() {
        rows.push(ClaimRow {
            line: index + 2,
            row: result?,
        });
    }
    Ok(rows)
}

/// Reject the batch on duplicate serials or rows not marked for claim
pub fn check_preconditions(rows: &[ClaimRow]) -> Result<(), ClaimError> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.row.serial.as_str()).or_default() += 1;
    }

    let mut issues: Vec<PreconditionIssue> = rows
        .iter()
        .filter(|r| counts.get(r.row.serial.as_str()).copied().unwrap_or(0) > 1)
        .map(|r| PreconditionIssue::DuplicateSerial {
            line: r.line,
            serial: r.row.serial.clone(),
        })
        .collect();

    issues.extend(
        rows.iter()
            .filter(|r| {
                !r.row.status.eq_ignore_ascii_case("good")
                    || !r.row.already_added.eq_ignore_ascii_case("false")
            })
            .map(|r| PreconditionIssue::InvalidStatus {
                line: r.line,
                serial: r.row.serial.clone(),
                status: r.row.status.clone(),
                already_added: r.row.already_added.clone(),
            }),
    );

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ClaimError::Preconditions(issues))
    }
}

/// Rows targeting one network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimGroup {
    pub network_id: String,
    pub network_name: String,
    pub org_id: String,
    pub org_name: String,
    pub rows: Vec<ClaimRow>,
}

impl ClaimGroup {
    pub fn serials(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.row.serial.clone()).collect()
    }

    fn find(&self, serial: &str) -> Option<&ClaimRow> {
        self.rows.iter().find(|r| r.row.serial == serial)
    }
}

/// Group rows by network and organization identity, in key order
pub fn group_rows(rows: Vec<ClaimRow>) -> Vec<ClaimGroup> {
    let mut groups: BTreeMap<(String, String, String, String), Vec<ClaimRow>> = BTreeMap::new();
    for row in rows {
        let key = (
            row.row.network_id.clone(),
            row.row.network_name.clone(),
            row.row.org_id.clone(),
            row.row.org_name.clone(),
        );
        groups.entry(key).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|((network_id, network_name, org_id, org_name), rows)| ClaimGroup {
            network_id,
            network_name,
            org_id,
            org_name,
            rows,
        })
        .collect()
}

/// A serial that was not fully claimed and updated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSerial {
    pub line: Option<usize>,
    pub serial: String,
    pub reason: String,
}

impl std::fmt::Display for FailedSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "Line {}: {} ({})", line, self.serial, self.reason),
            None => write!(f, "{} ({})", self.serial, self.reason),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSummary {
    pub total: usize,
    pub claimed: usize,
    pub updated: usize,
    pub failed: Vec<FailedSerial>,
}

/// Claims groups of validated devices and applies their metadata
pub struct ClaimGrouper<'a> {
    policy: &'a NamingPolicy,
    log: &'a AuditLog,
}

impl<'a> ClaimGrouper<'a> {
    pub fn new(policy: &'a NamingPolicy, log: &'a AuditLog) -> Self {
        Self { policy, log }
    }

    /// Load, check, claim and archive a validated file.
    ///
    /// The input is always moved into `archive_dir`, with an error prefix
    /// when loading or the precondition checks failed.
    pub async fn process_file<D: Directory>(
        &self,
        directory: &D,
        input: &Path,
        archive_dir: &Path,
        timestamp: &str,
    ) -> Result<ClaimSummary, ClaimError> {
        let result = self.process_rows(directory, input).await;

        match archive_input(input, archive_dir, result.is_err(), timestamp) {
            Ok(path) => self.log.record(AuditEntry::info(
                None,
                format!("Input file moved to {}", path.display()),
            )),
            Err(e) => self.log.record(AuditEntry::error(
                None,
                format!("Error moving file {}: {}", input.display(), e),
            )),
        }

        result
    }

    async fn process_rows<D: Directory>(
        &self,
        directory: &D,
        input: &Path,
    ) -> Result<ClaimSummary, ClaimError> {
        let rows = load_claim_rows(input).map_err(|e| {
            self.log.record(AuditEntry::error(None, format!("Process stopped: {}", e)));
            e
        })?;

        if let Err(e) = check_preconditions(&rows) {
            if let ClaimError::Preconditions(issues) = &e {
                for issue in issues {
                    self.log.record(AuditEntry::error(None, issue.to_string()));
                }
            }
            self.log.record(AuditEntry::error(None, format!("Process stopped: {}", e)));
            return Err(e);
        }

        self.log.record(AuditEntry::info(
            None,
            format!("Found {} devices to process.", rows.len()),
        ));
        let groups = group_rows(rows);
        Ok(self.run(directory, &groups).await)
    }

    /// Claim every group, one network at a time
    pub async fn run<D: Directory>(&self, directory: &D, groups: &[ClaimGroup]) -> ClaimSummary {
        let mut summary = ClaimSummary {
            total: groups.iter().map(|g| g.rows.len()).sum(),
            ..ClaimSummary::default()
        };

        for group in groups {
            self.claim_group(directory, group, &mut summary).await;
        }

        self.log.record(AuditEntry::info(
            None,
            format!(
                "DONE: {} claimed, {} updated out of {}.",
                summary.claimed, summary.updated, summary.total
            ),
        ));
        summary
    }

    async fn claim_group<D: Directory>(
        &self,
        directory: &D,
        group: &ClaimGroup,
        summary: &mut ClaimSummary,
    ) {
        let serials = group.serials();
        self.log.record(AuditEntry::info(
            None,
            format!(
                "Attempting claim of {} device(s) in network {} ({})",
                serials.len(),
                group.network_name,
                group.network_id
            ),
        ));

        let response = match directory.claim_devices(&group.network_id, &serials).await {
            Ok(response) => response,
            Err(e) => {
                self.log.record(AuditEntry::warn(
                    None,
                    format!("Batch claim failed for network {}: {}", group.network_id, e),
                ));
                summary.failed.extend(group.rows.iter().map(|r| FailedSerial {
                    line: Some(r.line),
                    serial: r.row.serial.clone(),
                    reason: format!("claim failed: {}", e),
                }));
                return;
            }
        };

        if !response.serials.is_empty() {
            self.log.record(AuditEntry::info(
                None,
                format!("Claim successful for: {}", response.serials.join(", ")),
            ));
            summary.claimed += response.serials.len();
        }

        for error in &response.errors {
            let serial = error.serial.clone().unwrap_or_else(|| "Unknown".to_string());
            let line = group.find(&serial).map(|r| r.line);
            let reason = error.errors.join(", ");
            self.log.record(AuditEntry::warn(
                line,
                format!("Claim failed for {}: {}", serial, reason),
            ));
            summary.failed.push(FailedSerial { line, serial, reason });
        }

        for serial in &response.serials {
            let Some(row) = group.find(serial) else {
                self.log.record(AuditEntry::warn(
                    None,
                    format!("Claimed serial {} is not part of this batch, skipping update", serial),
                ));
                continue;
            };
            self.update_device(directory, row, summary).await;
        }
    }

    async fn update_device<D: Directory>(
        &self,
        directory: &D,
        row: &ClaimRow,
        summary: &mut ClaimSummary,
    ) {
        let tags = self.policy.claim_tags(row.row.marker_tags());
        let update = DeviceUpdate::new(&row.row.device_name, tags, Some(row.row.address.as_str()));
        let serial = &row.row.serial;

        if update.address.is_none() {
            self.log.record(AuditEntry::warn(
                Some(row.line),
                format!("{}: no address found, proceeding without one", serial),
            ));
        }

        match directory.update_device(serial, &update).await {
            Ok(()) => {
                self.log.record(AuditEntry::info(
                    Some(row.line),
                    format!(
                        "{} updated to Name: {}, Tags: {:?}",
                        serial, update.name, update.tags
                    ),
                ));
                summary.updated += 1;
            }
            Err(e) => {
                self.log.record(AuditEntry::warn(
                    Some(row.line),
                    format!("{} update failed: {}", serial, e),
                ));
                summary.failed.push(FailedSerial {
                    line: Some(row.line),
                    serial: serial.clone(),
                    reason: format!("update failed: {}", e),
                });
            }
        }
    }
}

/// Move a processed input file into the archive directory
pub fn archive_input(
    input: &Path,
    archive_dir: &Path,
    failed: bool,
    timestamp: &str,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(archive_dir)?;
    let prefix = if failed { ERROR_PREFIX } else { CLAIMED_PREFIX };
    let target = archive_dir.join(format!("{}process_log_{}.csv", prefix, timestamp));

    if std::fs::rename(input, &target).is_err() {
        // rename fails across filesystems
        std::fs::copy(input, &target)?;
        std::fs::remove_file(input)?;
    }
    Ok(target)
}
