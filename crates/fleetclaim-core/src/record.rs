//! Validation records and their tabular form

use serde::{Deserialize, Serialize};

use crate::prefix::NamingPrefix;

/// Final classification of a manifest row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Serial is already in a network
    AlreadyAdded,
    /// Ready to be claimed
    Validated,
    /// Failed a check; see the record message
    Rejected,
}

impl Disposition {
    /// Value written to the `Status` column
    pub fn status(&self) -> &'static str {
        match self {
            Self::AlreadyAdded | Self::Validated => "good",
            Self::Rejected => "bad",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AlreadyAdded => "already-added",
            Self::Validated => "validated",
            Self::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

/// Result of validating one manifest row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRecord {
    pub line: usize,
    pub disposition: Disposition,
    /// Serial was found in an organization inventory
    pub in_inventory: bool,
    pub shipment_date: String,
    pub input_network_name: String,
    pub serial: String,
    pub org_id: String,
    pub org_name: String,
    pub network_id: String,
    pub network_name: String,
    pub prefix: Option<NamingPrefix>,
    pub diagnostic_tag: Option<String>,
    pub connectivity_tag: Option<String>,
    pub address: Option<String>,
    pub device_name: Option<String>,
    pub message: String,
}

/// Fixed-order row written to output files and read back by the claim phase.
///
/// Every field is kept as text so hand-edited files can still be loaded and
/// checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Already Added")]
    pub already_added: String,
    #[serde(rename = "Shipment Date", default)]
    pub shipment_date: String,
    #[serde(rename = "Input Network Name", default)]
    pub input_network_name: String,
    #[serde(rename = "Serial Number")]
    pub serial: String,
    #[serde(rename = "Org ID")]
    pub org_id: String,
    #[serde(rename = "Org Name")]
    pub org_name: String,
    #[serde(rename = "Network ID")]
    pub network_id: String,
    #[serde(rename = "Full Network Name")]
    pub network_name: String,
    #[serde(rename = "Country Code", default)]
    pub country_code: String,
    #[serde(rename = "Region Code", default)]
    pub region_code: String,
    #[serde(rename = "Partner ID", default)]
    pub partner_id: String,
    #[serde(rename = "Naming Prefix", default)]
    pub naming_prefix: String,
    #[serde(rename = "Diagnostic Tag", default)]
    pub diagnostic_tag: String,
    #[serde(rename = "Connectivity", default)]
    pub connectivity: String,
    #[serde(rename = "Connectivity Tag", default)]
    pub connectivity_tag: String,
    #[serde(rename = "Address", default)]
    pub address: String,
    #[serde(rename = "AP Name", default)]
    pub device_name: String,
    #[serde(rename = "Messages", default)]
    pub messages: String,
}

fn flag(value: bool, yes: &'static str, no: &'static str) -> String {
    if value { yes } else { no }.to_string()
}

impl From<&ValidationRecord> for RecordRow {
    fn from(record: &ValidationRecord) -> Self {
        let prefix = record.prefix.as_ref();
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            status: record.disposition.status().to_string(),
            already_added: flag(record.in_inventory, "true", "false"),
            shipment_date: record.shipment_date.clone(),
            input_network_name: record.input_network_name.clone(),
            serial: record.serial.clone(),
            org_id: record.org_id.clone(),
            org_name: record.org_name.clone(),
            network_id: record.network_id.clone(),
            network_name: record.network_name.clone(),
            country_code: prefix.map(|p| p.country.clone()).unwrap_or_default(),
            region_code: prefix.map(|p| p.region.clone()).unwrap_or_default(),
            partner_id: prefix.map(|p| p.partner.clone()).unwrap_or_default(),
            naming_prefix: prefix.map(NamingPrefix::stem).unwrap_or_default(),
            diagnostic_tag: text(&record.diagnostic_tag),
            connectivity: flag(record.connectivity_tag.is_some(), "yes", "no"),
            connectivity_tag: text(&record.connectivity_tag),
            address: text(&record.address),
            device_name: text(&record.device_name),
            messages: record.message.clone(),
        }
    }
}

impl RecordRow {
    /// Marker tags recorded for this row, mandatory first
    pub fn marker_tags(&self) -> Vec<&str> {
        let mut tags = vec![self.diagnostic_tag.as_str()];
        if self.connectivity.trim().eq_ignore_ascii_case("yes") {
            tags.push(self.connectivity_tag.as_str());
        }
        tags.into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("nan"))
            .collect()
    }
}
