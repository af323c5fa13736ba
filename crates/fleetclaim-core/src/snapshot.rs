//! Read-only per-run view of the remote directory

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::directory::{Directory, DirectoryError, InventoryDevice, NetworkInfo, Organization};
use crate::policy::NamingPolicy;

/// Where a serial already lives in the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    pub org_id: String,
    pub org_name: String,
    /// Network the device is assigned to, if any
    pub network_id: Option<String>,
}

/// A network together with its owning organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRecord {
    pub org_id: String,
    pub org_name: String,
    pub network_id: String,
    pub network_name: String,
}

/// Marker tags observed on devices of a network, spelled as found on the device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMarkers {
    /// Value of the mandatory marker (e.g. "diagnostic")
    pub mandatory: Option<String>,
    /// Value of the optional marker (e.g. "connectivity")
    pub optional: Option<String>,
}

/// Snapshot of inventory, networks and tag markers, built once per run
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    inventory: HashMap<String, InventoryRecord>,
    networks: Vec<NetworkRecord>,
    markers: HashMap<String, TagMarkers>,
    mandatory_tag: String,
    optional_tag: String,
}

impl DirectorySnapshot {
    /// Create an empty snapshot recognizing the policy's marker tags
    pub fn new(policy: &NamingPolicy) -> Self {
        Self {
            inventory: HashMap::new(),
            networks: Vec::new(),
            markers: HashMap::new(),
            mandatory_tag: policy.mandatory_tag.clone(),
            optional_tag: policy.optional_tag.clone(),
        }
    }

    /// Read every organization's inventory and networks from the directory
    pub async fn fetch<D: Directory>(
        directory: &D,
        policy: &NamingPolicy,
    ) -> Result<Self, DirectoryError> {
        let mut snapshot = Self::new(policy);

        let organizations = directory.organizations().await?;
        info!(count = organizations.len(), "Fetched organizations");

        for org in &organizations {
            info!(org = %org.name, "Processing organization");
            let inventory = directory.inventory_devices(&org.id).await?;
            let networks = directory.networks(&org.id).await?;
            snapshot.add_organization(org, &inventory, &networks);
        }

        info!(
            serials = snapshot.inventory.len(),
            networks = snapshot.networks.len(),
            "Directory snapshot ready"
        );
        Ok(snapshot)
    }

    /// Merge one organization's inventory and networks into the snapshot
    pub fn add_organization(
        &mut self,
        org: &Organization,
        inventory: &[InventoryDevice],
        networks: &[NetworkInfo],
    ) {
        for device in inventory {
            let network_id = device
                .network_id
                .as_ref()
                .filter(|id| !id.is_empty())
                .cloned();

            if let Some(net_id) = &network_id {
                self.record_markers(net_id, &device.tags);
            }

            if let Some(existing) = self.inventory.get(&device.serial) {
                warn!(
                    serial = %device.serial,
                    kept = %existing.org_id,
                    ignored = %org.id,
                    "Serial listed in more than one inventory"
                );
                continue;
            }

            self.inventory.insert(
                device.serial.clone(),
                InventoryRecord {
                    org_id: org.id.clone(),
                    org_name: org.name.clone(),
                    network_id,
                },
            );
        }

        self.networks.extend(networks.iter().map(|net| NetworkRecord {
            org_id: org.id.clone(),
            org_name: org.name.clone(),
            network_id: net.id.clone(),
            network_name: net.name.clone(),
        }));

        debug!(
            org = %org.id,
            devices = inventory.len(),
            networks = networks.len(),
            "Added organization to snapshot"
        );
    }

    fn record_markers(&mut self, network_id: &str, tags: &[String]) {
        for tag in tags {
            if tag.is_empty() {
                continue;
            }
            if tag.eq_ignore_ascii_case(&self.mandatory_tag) {
                self.markers
                    .entry(network_id.to_string())
                    .or_default()
                    .mandatory = Some(tag.clone());
            } else if tag.eq_ignore_ascii_case(&self.optional_tag) {
                self.markers
                    .entry(network_id.to_string())
                    .or_default()
                    .optional = Some(tag.clone());
            }
        }
    }

    /// Look up a serial in the inventory
    pub fn inventory(&self, serial: &str) -> Option<&InventoryRecord> {
        self.inventory.get(serial)
    }

    /// All networks across organizations
    pub fn networks(&self) -> &[NetworkRecord] {
        &self.networks
    }

    /// Find a network by id
    pub fn network(&self, network_id: &str) -> Option<&NetworkRecord> {
        self.networks.iter().find(|n| n.network_id == network_id)
    }

    /// Marker tags for a network (empty if none were seen)
    pub fn markers(&self, network_id: &str) -> TagMarkers {
        self.markers.get(network_id).cloned().unwrap_or_default()
    }
}
