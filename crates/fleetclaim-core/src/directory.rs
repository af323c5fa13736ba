//! Remote directory contract and the records it exchanges
//!
//! The directory is the cloud dashboard holding organizations, networks and
//! claimed devices. Rate limiting and retries belong to the implementation;
//! callers issue each operation once and await it before the next.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Directory returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("Rate limit retries exhausted after {0} attempts")]
    RateLimited(u32),
}

/// An organization visible to the API key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

/// A device in an organization's inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDevice {
    pub serial: String,
    /// Network the device is assigned to, if any
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A network owned by an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
}

/// A device currently in a network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDevice {
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Physical street address
    #[serde(default)]
    pub address: Option<String>,
}

/// Per-serial failure reported by a claim request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialError {
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Outcome of a claim request: accepted serials plus per-serial errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResponse {
    #[serde(default)]
    pub serials: Vec<String>,
    #[serde(default)]
    pub errors: Vec<SerialError>,
}

/// Metadata applied to a freshly claimed device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    pub name: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Re-center the map marker on the new address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_map_marker: Option<bool>,
}

impl DeviceUpdate {
    /// Build an update, attaching the address only when it is non-empty
    pub fn new(name: impl Into<String>, tags: Vec<String>, address: Option<&str>) -> Self {
        let address = address
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        let move_map_marker = address.as_ref().map(|_| true);
        Self {
            name: name.into(),
            tags,
            address,
            move_map_marker,
        }
    }
}

/// Operations consumed from the remote directory.
///
/// Claims and updates are not idempotent; implementations may retry
/// transport-level throttling but callers never re-issue them.
#[allow(async_fn_in_trait)]
pub trait Directory {
    /// List every organization visible to the caller
    async fn organizations(&self) -> Result<Vec<Organization>, DirectoryError>;

    /// List an organization's full device inventory
    async fn inventory_devices(&self, org_id: &str) -> Result<Vec<InventoryDevice>, DirectoryError>;

    /// List an organization's networks
    async fn networks(&self, org_id: &str) -> Result<Vec<NetworkInfo>, DirectoryError>;

    /// List the devices currently in a network
    async fn network_devices(&self, network_id: &str) -> Result<Vec<NetworkDevice>, DirectoryError>;

    /// Atomically claim a set of serials into a network
    async fn claim_devices(
        &self,
        network_id: &str,
        serials: &[String],
    ) -> Result<ClaimResponse, DirectoryError>;

    /// Update a device's name, tags and address
    async fn update_device(&self, serial: &str, update: &DeviceUpdate) -> Result<(), DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_device_null_network() {
        let json = r#"{"serial":"Q2XX-AAAA-0001","networkId":null,"tags":["Connectivity"]}"#;
        let device: InventoryDevice = serde_json::from_str(json).unwrap();
        assert_eq!(device.network_id, None);
        assert_eq!(device.tags, vec!["Connectivity".to_string()]);
    }

    #[test]
    fn test_update_skips_empty_address() {
        let update = DeviceUpdate::new("US-ABC-P1-AP01-N", vec!["NEW-AP".into()], Some("  "));
        assert_eq!(update.address, None);
        assert_eq!(update.move_map_marker, None);

        let json = serde_json::to_value(&update).unwrap();
        assert!(json.get("address").is_none());
        assert!(json.get("moveMapMarker").is_none());
    }

    #[test]
    fn test_update_with_address_moves_marker() {
        let update = DeviceUpdate::new("US-ABC-P1-AP01-N", vec![], Some("1 Main St"));
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["address"], "1 Main St");
        assert_eq!(json["moveMapMarker"], true);
    }

    #[test]
    fn test_claim_response_partial() {
        let json = r#"{"serials":["A"],"errors":[{"serial":"B","errors":["Device already claimed"]}]}"#;
        let response: ClaimResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.serials, vec!["A".to_string()]);
        assert_eq!(response.errors[0].serial.as_deref(), Some("B"));
    }
}
