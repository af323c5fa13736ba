//! In-memory directory used by unit tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::directory::{
    ClaimResponse, DeviceUpdate, Directory, DirectoryError, InventoryDevice, NetworkDevice,
    NetworkInfo, Organization, SerialError,
};

pub fn device(serial: &str, network_id: Option<&str>, tags: &[&str]) -> InventoryDevice {
    InventoryDevice {
        serial: serial.to_string(),
        network_id: network_id.map(str::to_string),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn network(id: &str, name: &str) -> NetworkInfo {
    NetworkInfo {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn named(name: &str, address: Option<&str>) -> NetworkDevice {
    NetworkDevice {
        serial: None,
        name: Some(name.to_string()),
        address: address.map(str::to_string),
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    orgs: Vec<(Organization, Vec<InventoryDevice>, Vec<NetworkInfo>)>,
    network_devices: HashMap<String, Vec<NetworkDevice>>,
    failing_networks: HashSet<String>,
    failing_claims: HashSet<String>,
    rejected_serials: HashSet<String>,
    failing_updates: HashSet<String>,
    pub device_reads: Mutex<Vec<String>>,
    pub claims: Mutex<Vec<(String, Vec<String>)>>,
    pub updates: Mutex<Vec<(String, DeviceUpdate)>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_org(
        mut self,
        id: &str,
        name: &str,
        inventory: Vec<InventoryDevice>,
        networks: Vec<NetworkInfo>,
    ) -> Self {
        let org = Organization {
            id: id.to_string(),
            name: name.to_string(),
        };
        self.orgs.push((org, inventory, networks));
        self
    }

    pub fn with_network_devices(mut self, network_id: &str, devices: Vec<NetworkDevice>) -> Self {
        self.network_devices.insert(network_id.to_string(), devices);
        self
    }

    pub fn failing_network(mut self, network_id: &str) -> Self {
        self.failing_networks.insert(network_id.to_string());
        self
    }

    pub fn failing_claim(mut self, network_id: &str) -> Self {
        self.failing_claims.insert(network_id.to_string());
        self
    }

    pub fn rejecting_serial(mut self, serial: &str) -> Self {
        self.rejected_serials.insert(serial.to_string());
        self
    }

    pub fn failing_update(mut self, serial: &str) -> Self {
        self.failing_updates.insert(serial.to_string());
        self
    }

    pub fn device_read_count(&self, network_id: &str) -> usize {
        self.device_reads
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == network_id)
            .count()
    }
}

impl Directory for FakeDirectory {
    async fn organizations(&self) -> Result<Vec<Organization>, DirectoryError> {
        Ok(self.orgs.iter().map(|(org, _, _)| org.clone()).collect())
    }

    async fn inventory_devices(&self, org_id: &str) -> Result<Vec<InventoryDevice>, DirectoryError> {
        Ok(self
            .orgs
            .iter()
            .find(|(org, _, _)| org.id == org_id)
            .map(|(_, inventory, _)| inventory.clone())
            .unwrap_or_default())
    }

    async fn networks(&self, org_id: &str) -> Result<Vec<NetworkInfo>, DirectoryError> {
        Ok(self
            .orgs
            .iter()
            .find(|(org, _, _)| org.id == org_id)
            .map(|(_, _, networks)| networks.clone())
            .unwrap_or_default())
    }

    async fn network_devices(&self, network_id: &str) -> Result<Vec<NetworkDevice>, DirectoryError> {
        self.device_reads.lock().unwrap().push(network_id.to_string());
        if self.failing_networks.contains(network_id) {
            return Err(DirectoryError::Transport("connection reset".to_string()));
        }
        Ok(self
            .network_devices
            .get(network_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn claim_devices(
        &self,
        network_id: &str,
        serials: &[String],
    ) -> Result<ClaimResponse, DirectoryError> {
        self.claims
            .lock()
            .unwrap()
            .push((network_id.to_string(), serials.to_vec()));
        if self.failing_claims.contains(network_id) {
            return Err(DirectoryError::Status {
                status: 400,
                message: "Network is not accepting claims".to_string(),
            });
        }

        let mut response = ClaimResponse::default();
        for serial in serials {
            if self.rejected_serials.contains(serial) {
                response.errors.push(SerialError {
                    serial: Some(serial.clone()),
                    errors: vec!["Device already claimed".to_string()],
                });
            } else {
                response.serials.push(serial.clone());
            }
        }
        Ok(response)
    }

    async fn update_device(&self, serial: &str, update: &DeviceUpdate) -> Result<(), DirectoryError> {
        if self.failing_updates.contains(serial) {
            return Err(DirectoryError::Status {
                status: 404,
                message: "Device not found".to_string(),
            });
        }
        self.updates
            .lock()
            .unwrap()
            .push((serial.to_string(), update.clone()));
        Ok(())
    }
}
