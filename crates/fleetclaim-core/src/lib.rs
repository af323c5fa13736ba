//! Fleetclaim Core - Manifest reconciliation and device naming engine
//!
//! This crate provides the logic behind both phases of a fleetclaim run:
//! - Directory snapshot of organizations, networks and inventory
//! - Network matching and naming prefix validation
//! - Per-network sequence allocation for device names
//! - Row classification into already-added / validated / rejected records
//! - Claim grouping, batch claim and per-device metadata updates

pub mod audit;
pub mod claim;
pub mod classify;
pub mod directory;
pub mod manifest;
pub mod matcher;
pub mod pipeline;
pub mod policy;
pub mod prefix;
pub mod record;
pub mod sequence;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::{AuditEntry, AuditLevel, AuditLog};
pub use claim::{
    archive_input, check_preconditions, group_rows, load_claim_rows, load_claim_rows_from,
    ClaimError, ClaimGroup, ClaimGrouper, ClaimRow, ClaimSummary, FailedSerial,
    PreconditionIssue,
};
pub use classify::{Rejection, RowClassifier};
pub use directory::{
    ClaimResponse, DeviceUpdate, Directory, DirectoryError, InventoryDevice, NetworkDevice,
    NetworkInfo, Organization, SerialError,
};
pub use manifest::{read_manifest, read_manifest_from, ManifestError, ManifestRow};
pub use matcher::find_network_matches;
pub use pipeline::{
    write_records, OutputError, OutputFiles, ValidationPipeline, ValidationReport,
};
pub use policy::NamingPolicy;
pub use prefix::{NamingPrefix, PrefixError};
pub use record::{Disposition, RecordRow, ValidationRecord};
pub use sequence::{Allocation, SequenceAllocator};
pub use snapshot::{DirectorySnapshot, InventoryRecord, NetworkRecord, TagMarkers};

/// Timestamp format used in output and archive file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Current local time formatted for use in file names
pub fn file_timestamp() -> String {
    chrono::Local::now().format(FILE_TIMESTAMP_FORMAT).to_string()
}
