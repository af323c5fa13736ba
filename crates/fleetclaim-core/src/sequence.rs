//! Per-network progressive numbering and address discovery
//!
//! Each network is scanned at most once per run: the first allocation reads
//! the network's devices, takes the highest `<stem>-APnn-N` number in use and
//! remembers the first non-empty address. Later allocations for the same
//! network only increment the cached counter. Numbers are never handed back,
//! even when the row that received one is later rejected.

use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::directory::{Directory, NetworkDevice};

/// A progressive number plus the address to apply, if one was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub number: u32,
    pub address: Option<String>,
}

/// Run-scoped sequence and address caches keyed by network id
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    last_issued: HashMap<String, u32>,
    addresses: HashMap<String, Option<String>>,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next progressive number for a network
    pub async fn allocate<D: Directory>(
        &mut self,
        directory: &D,
        network_id: &str,
        stem: &str,
    ) -> Allocation {
        if !self.last_issued.contains_key(network_id) {
            let (start, address) = scan_network(directory, network_id, stem).await;
            self.last_issued.insert(network_id.to_string(), start);
            self.addresses.insert(network_id.to_string(), address);
        }

        let counter = self
            .last_issued
            .entry(network_id.to_string())
            .or_default();
        *counter += 1;

        Allocation {
            number: *counter,
            address: self.addresses.get(network_id).cloned().flatten(),
        }
    }

    /// Last number issued for a network in this run
    pub fn last_issued(&self, network_id: &str) -> Option<u32> {
        self.last_issued.get(network_id).copied()
    }
}

async fn scan_network<D: Directory>(
    directory: &D,
    network_id: &str,
    stem: &str,
) -> (u32, Option<String>) {
    match directory.network_devices(network_id).await {
        Ok(devices) => {
            let start = highest_number(&devices, stem);
            let address = first_address(&devices);
            debug!(
                network = %network_id,
                devices = devices.len(),
                start,
                has_address = address.is_some(),
                "Scanned network for existing device names"
            );
            (start, address)
        }
        Err(e) => {
            warn!(
                network = %network_id,
                error = %e,
                "Failed to read network devices, numbering from 0 without address"
            );
            (0, None)
        }
    }
}

fn highest_number(devices: &[NetworkDevice], stem: &str) -> u32 {
    let pattern = format!(r"^{}-AP(\d{{2}})-N$", regex::escape(stem));
    let Ok(re) = Regex::new(&pattern) else {
        return 0;
    };

    devices
        .iter()
        .filter_map(|d| d.name.as_deref())
        .filter_map(|name| re.captures(name))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

fn first_address(devices: &[NetworkDevice]) -> Option<String> {
    devices
        .iter()
        .filter_map(|d| d.address.as_deref())
        .map(str::trim)
        .find(|a| !a.is_empty())
        .map(str::to_string)
}
