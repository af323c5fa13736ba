//! Per-row decision procedure
//!
//! Checks run in a fixed order and the first failing one decides the row:
//! inventory lookup, network match, naming prefix, mandatory tag, sequence
//! allocation, name length, progressive ceiling. Each step returns
//! `Result<_, Rejection>` so the short-circuit is just `?`.

use thiserror::Error;
use tracing::debug;

use crate::directory::Directory;
use crate::manifest::ManifestRow;
use crate::matcher::find_network_matches;
use crate::policy::NamingPolicy;
use crate::prefix::{NamingPrefix, PrefixError};
use crate::record::{Disposition, ValidationRecord};
use crate::sequence::SequenceAllocator;
use crate::snapshot::{DirectorySnapshot, InventoryRecord, NetworkRecord};

pub const MSG_ALREADY_ADDED: &str = "device already successfully added";
pub const MSG_VALIDATED: &str = "validated for claim";

/// Network name used when an inventory device points at an unknown network
const UNKNOWN_NETWORK: &str = "Unknown";

/// Why a row was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("serial number is empty")]
    MissingSerial,
    #[error("serial in inventory but not assigned to a network")]
    Unassigned,
    #[error("network not found")]
    NetworkNotFound,
    #[error("potential network name overlap ({0} candidates)")]
    NetworkOverlap(usize),
    #[error(transparent)]
    InvalidPrefix(#[from] PrefixError),
    #[error("network missing mandatory tag '{0}'")]
    MissingMandatoryTag(String),
    #[error("AP name too long ({0} chars)")]
    NameTooLong(usize),
    #[error("progressive number exceeds {0}")]
    SequenceOverflow(u32),
}

/// Classifies manifest rows against a directory snapshot
pub struct RowClassifier<'a> {
    snapshot: &'a DirectorySnapshot,
    policy: &'a NamingPolicy,
}

impl<'a> RowClassifier<'a> {
    pub fn new(snapshot: &'a DirectorySnapshot, policy: &'a NamingPolicy) -> Self {
        Self { snapshot, policy }
    }

    /// Produce exactly one record for a manifest row
    pub async fn classify<D: Directory>(
        &self,
        directory: &D,
        allocator: &mut SequenceAllocator,
        row: &ManifestRow,
    ) -> ValidationRecord {
        let mut record = ValidationRecord {
            line: row.line,
            disposition: Disposition::Rejected,
            in_inventory: false,
            shipment_date: row.shipment_date.clone(),
            input_network_name: row.network_name.clone(),
            serial: row.serial.clone(),
            org_id: String::new(),
            org_name: String::new(),
            network_id: String::new(),
            network_name: String::new(),
            prefix: None,
            diagnostic_tag: None,
            connectivity_tag: None,
            address: None,
            device_name: None,
            message: String::new(),
        };

        match self.evaluate(directory, allocator, row, &mut record).await {
            Ok(disposition) => record.disposition = disposition,
            Err(rejection) => {
                debug!(line = row.line, serial = %row.serial, reason = %rejection, "Row rejected");
                record.disposition = Disposition::Rejected;
                record.message = rejection.to_string();
            }
        }
        record
    }

    async fn evaluate<D: Directory>(
        &self,
        directory: &D,
        allocator: &mut SequenceAllocator,
        row: &ManifestRow,
        record: &mut ValidationRecord,
    ) -> Result<Disposition, Rejection> {
        if row.serial.is_empty() {
            return Err(Rejection::MissingSerial);
        }

        if let Some(inventory) = self.snapshot.inventory(&row.serial) {
            return self.already_added(inventory, record);
        }

        let network = self.resolve_network(&row.network_name)?;
        record.org_id = network.org_id.clone();
        record.org_name = network.org_name.clone();
        record.network_id = network.network_id.clone();
        record.network_name = network.network_name.clone();

        let prefix = NamingPrefix::parse(&network.network_name)?;
        let stem = prefix.stem();
        record.prefix = Some(prefix);

        let markers = self.snapshot.markers(&network.network_id);
        if self.policy.requires_mandatory_tag() {
            let tag = markers
                .mandatory
                .ok_or_else(|| Rejection::MissingMandatoryTag(self.policy.mandatory_tag.clone()))?;
            record.diagnostic_tag = Some(tag);
        }

        let allocation = allocator
            .allocate(directory, &network.network_id, &stem)
            .await;
        let name = NamingPolicy::device_name(&stem, allocation.number);

        let length = name.chars().count();
        if length >= self.policy.max_name_len {
            return Err(Rejection::NameTooLong(length));
        }
        if allocation.number > self.policy.max_progressive {
            return Err(Rejection::SequenceOverflow(self.policy.max_progressive));
        }

        record.device_name = Some(name);
        record.address = allocation.address;
        record.connectivity_tag = markers.optional;
        record.message = MSG_VALIDATED.to_string();
        Ok(Disposition::Validated)
    }

    fn already_added(
        &self,
        inventory: &InventoryRecord,
        record: &mut ValidationRecord,
    ) -> Result<Disposition, Rejection> {
        record.in_inventory = true;
        record.org_id = inventory.org_id.clone();
        record.org_name = inventory.org_name.clone();

        let network_id = inventory.network_id.as_ref().ok_or(Rejection::Unassigned)?;
        record.network_id = network_id.clone();
        record.network_name = self
            .snapshot
            .network(network_id)
            .map(|n| n.network_name.clone())
            .unwrap_or_else(|| UNKNOWN_NETWORK.to_string());
        record.message = MSG_ALREADY_ADDED.to_string();
        Ok(Disposition::AlreadyAdded)
    }

    fn resolve_network(&self, candidate: &str) -> Result<&'a NetworkRecord, Rejection> {
        let matches = find_network_matches(candidate, self.snapshot.networks());
        match matches.as_slice() {
            [] => Err(Rejection::NetworkNotFound),
            [network] => Ok(*network),
            many => Err(Rejection::NetworkOverlap(many.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Organization;
    use crate::testing::{device, named, network, FakeDirectory};

    fn row(line: usize, network_name: &str, serial: &str) -> ManifestRow {
        ManifestRow {
            line,
            shipment_date: "2024-05-01".to_string(),
            network_name: network_name.to_string(),
            serial: serial.to_string(),
        }
    }

    fn snapshot(policy: &NamingPolicy, networks: &[(&str, &str)], tagged: &[&str]) -> DirectorySnapshot {
        let mut inventory = vec![
            device("ADDED-1", Some("N1"), &[]),
            device("LOOSE-1", None, &[]),
            device("GHOST-1", Some("N-GONE"), &[]),
        ];
        for (i, net_id) in tagged.iter().enumerate() {
            inventory.push(device(&format!("TAG-{}", i), Some(*net_id), &["Diagnostic", "connectivity"]));
        }

        let mut snapshot = DirectorySnapshot::new(policy);
        snapshot.add_organization(
            &Organization { id: "1".into(), name: "Acme".into() },
            &inventory,
            &networks.iter().map(|(id, name)| network(id, name)).collect::<Vec<_>>(),
        );
        snapshot
    }

    async fn classify_one(
        snapshot: &DirectorySnapshot,
        policy: &NamingPolicy,
        directory: &FakeDirectory,
        allocator: &mut SequenceAllocator,
        row: ManifestRow,
    ) -> ValidationRecord {
        RowClassifier::new(snapshot, policy)
            .classify(directory, allocator, &row)
            .await
    }

    #[tokio::test]
    async fn test_validated_row() {
        let policy = NamingPolicy::default();
        let snapshot = snapshot(&policy, &[("N1", "US-ABC-P1-Acme Downtown")], &["N1"]);
        let directory = FakeDirectory::new()
            .with_network_devices("N1", vec![named("US-ABC-P1-AP04-N", Some("1 Main St"))]);
        let mut allocator = SequenceAllocator::new();

        let record = classify_one(&snapshot, &policy, &directory, &mut allocator, row(1, "us-abc-p1-acme", "NEW-1")).await;

        assert_eq!(record.disposition, Disposition::Validated);
        assert_eq!(record.device_name.as_deref(), Some("US-ABC-P1-AP05-N"));
        assert_eq!(record.address.as_deref(), Some("1 Main St"));
        assert_eq!(record.diagnostic_tag.as_deref(), Some("Diagnostic"));
        assert_eq!(record.connectivity_tag.as_deref(), Some("connectivity"));
        assert_eq!(record.org_name, "Acme");
        assert!(!record.in_inventory);
    }

    #[tokio::test]
    async fn test_inventory_with_network_is_already_added() {
        let policy = NamingPolicy::default();
        // Network name is invalid and unmatched: inventory still wins
        let snapshot = snapshot(&policy, &[("N1", "bad name")], &[]);
        let directory = FakeDirectory::new();
        let mut allocator = SequenceAllocator::new();

        let record = classify_one(&snapshot, &policy, &directory, &mut allocator, row(1, "nowhere", "ADDED-1")).await;
        assert_eq!(record.disposition, Disposition::AlreadyAdded);
        assert_eq!(record.network_name, "bad name");
        assert_eq!(record.message, MSG_ALREADY_ADDED);

        let ghost = classify_one(&snapshot, &policy, &directory, &mut allocator, row(2, "", "GHOST-1")).await;
        assert_eq!(ghost.disposition, Disposition::AlreadyAdded);
        assert_eq!(ghost.network_name, "Unknown");
        assert_eq!(directory.device_reads.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_inventory_without_network_is_rejected() {
        let policy = NamingPolicy::default();
        let snapshot = snapshot(&policy, &[], &[]);
        let mut allocator = SequenceAllocator::new();

        let record = classify_one(&snapshot, &policy, &FakeDirectory::new(), &mut allocator, row(1, "x", "LOOSE-1")).await;
        assert_eq!(record.disposition, Disposition::Rejected);
        assert!(record.in_inventory);
        assert_eq!(record.org_id, "1");
        assert_eq!(record.message, "serial in inventory but not assigned to a network");
    }

    #[tokio::test]
    async fn test_match_failures() {
        let policy = NamingPolicy::default();
        let snapshot = snapshot(
            &policy,
            &[("E", "US-ABC-P1-Store12-East"), ("W", "US-ABC-P1-Store12-West")],
            &["E", "W"],
        );
        let directory = FakeDirectory::new();
        let mut allocator = SequenceAllocator::new();

        let overlap = classify_one(&snapshot, &policy, &directory, &mut allocator, row(1, "US-ABC-P1-Store12", "S1")).await;
        assert_eq!(overlap.message, Rejection::NetworkOverlap(2).to_string());
        assert!(overlap.message.starts_with("potential network name overlap"));

        let missing = classify_one(&snapshot, &policy, &directory, &mut allocator, row(2, "Store99", "S2")).await;
        assert_eq!(missing.message, "network not found");
        assert_eq!(missing.disposition, Disposition::Rejected);
    }

    #[tokio::test]
    async fn test_invalid_prefix_never_allocates() {
        let policy = NamingPolicy::default();
        let snapshot = snapshot(&policy, &[("N1", "USA-ABC-P1-Acme")], &["N1"]);
        let directory = FakeDirectory::new();
        let mut allocator = SequenceAllocator::new();

        let record = classify_one(&snapshot, &policy, &directory, &mut allocator, row(1, "USA-ABC-P1-Acme", "S1")).await;
        assert_eq!(record.disposition, Disposition::Rejected);
        assert_eq!(record.message, PrefixError::InvalidCountry("USA".into()).to_string());
        assert_eq!(allocator.last_issued("N1"), None);
    }

    #[tokio::test]
    async fn test_missing_mandatory_tag() {
        let policy = NamingPolicy::default();
        let snapshot = snapshot(&policy, &[("N1", "US-ABC-P1-Acme")], &[]);
        let mut allocator = SequenceAllocator::new();

        let record = classify_one(&snapshot, &policy, &FakeDirectory::new(), &mut allocator, row(1, "US-ABC-P1-Acme", "S1")).await;
        assert_eq!(record.message, "network missing mandatory tag 'diagnostic'");
        assert_eq!(allocator.last_issued("N1"), None);
    }

    #[tokio::test]
    async fn test_mandatory_tag_can_be_disabled() {
        let policy = NamingPolicy {
            mandatory_tag: String::new(),
            ..NamingPolicy::default()
        };
        let snapshot = snapshot(&policy, &[("N1", "US-ABC-P1-Acme")], &[]);
        let mut allocator = SequenceAllocator::new();

        let record = classify_one(&snapshot, &policy, &FakeDirectory::new(), &mut allocator, row(1, "US-ABC-P1-Acme", "S1")).await;
        assert_eq!(record.disposition, Disposition::Validated);
        assert_eq!(record.diagnostic_tag, None);
    }

    #[tokio::test]
    async fn test_name_length_boundary() {
        let policy = NamingPolicy::default();
        // "US-ABC-" + partner + "-AP01-N" = partner + 14 chars
        let fits = format!("US-ABC-{}-Shop", "P".repeat(35));
        let too_long = format!("US-ABC-{}-Shop", "Q".repeat(36));
        let snapshot = snapshot(&policy, &[("N1", fits.as_str()), ("N2", too_long.as_str())], &["N1", "N2"]);
        let directory = FakeDirectory::new();
        let mut allocator = SequenceAllocator::new();

        let ok = classify_one(&snapshot, &policy, &directory, &mut allocator, row(1, &fits, "S1")).await;
        assert_eq!(ok.disposition, Disposition::Validated);
        assert_eq!(ok.device_name.unwrap().len(), 49);

        let long = classify_one(&snapshot, &policy, &directory, &mut allocator, row(2, &too_long, "S2")).await;
        assert_eq!(long.disposition, Disposition::Rejected);
        assert_eq!(long.message, "AP name too long (50 chars)");
        assert_eq!(long.device_name, None);
        // The number stays consumed
        assert_eq!(allocator.last_issued("N2"), Some(1));
    }

    #[tokio::test]
    async fn test_progressive_boundary() {
        let policy = NamingPolicy::default();
        let snapshot = snapshot(&policy, &[("N1", "US-ABC-P1-Acme")], &["N1"]);
        let directory = FakeDirectory::new()
            .with_network_devices("N1", vec![named("US-ABC-P1-AP98-N", None)]);
        let mut allocator = SequenceAllocator::new();

        let last = classify_one(&snapshot, &policy, &directory, &mut allocator, row(1, "US-ABC-P1-Acme", "S1")).await;
        assert_eq!(last.device_name.as_deref(), Some("US-ABC-P1-AP99-N"));

        let over = classify_one(&snapshot, &policy, &directory, &mut allocator, row(2, "US-ABC-P1-Acme", "S2")).await;
        assert_eq!(over.disposition, Disposition::Rejected);
        assert_eq!(over.message, "progressive number exceeds 99");

        let again = classify_one(&snapshot, &policy, &directory, &mut allocator, row(3, "US-ABC-P1-Acme", "S3")).await;
        assert_eq!(again.disposition, Disposition::Rejected);
        assert_eq!(allocator.last_issued("N1"), Some(101));
    }

    #[tokio::test]
    async fn test_empty_serial_rejected() {
        let policy = NamingPolicy::default();
        let snapshot = snapshot(&policy, &[("N1", "US-ABC-P1-Acme")], &["N1"]);
        let mut allocator = SequenceAllocator::new();

        let record = classify_one(&snapshot, &policy, &FakeDirectory::new(), &mut allocator, row(1, "US-ABC-P1-Acme", "")).await;
        assert_eq!(record.message, "serial number is empty");
        assert_eq!(allocator.last_issued("N1"), None);
    }
}
