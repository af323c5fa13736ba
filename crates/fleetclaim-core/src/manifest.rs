//! Shipment manifest reader
//!
//! Manifests are `;`-delimited with a header row naming at least
//! `Shipment date`, `Network name` and `Serial number`. Headers and values
//! may carry stray quote characters, which are stripped.

use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Field delimiter shared by manifests and output files
pub const DELIMITER: u8 = b';';

pub const COL_SHIPMENT_DATE: &str = "Shipment date";
pub const COL_NETWORK_NAME: &str = "Network name";
pub const COL_SERIAL: &str = "Serial number";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse manifest: {0}")]
    Csv(#[from] csv::Error),
    #[error("Manifest is missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// One shipment line naming a serial and its target network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    /// 1-based data row index
    pub line: usize,
    pub shipment_date: String,
    pub network_name: String,
    pub serial: String,
}

/// Read a manifest file
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestRow>, ManifestError> {
    let file = std::fs::File::open(path)?;
    let rows = read_manifest_from(file)?;
    debug!(path = %path.display(), rows = rows.len(), "Read manifest");
    Ok(rows)
}

/// Read a manifest from any reader
pub fn read_manifest_from<R: Read>(reader: R) -> Result<Vec<ManifestRow>, ManifestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(clean).collect();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or(ManifestError::MissingColumn(name))
    };
    let date_col = column(COL_SHIPMENT_DATE)?;
    let network_col = column(COL_NETWORK_NAME)?;
    let serial_col = column(COL_SERIAL)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let field = |col: usize| record.get(col).map(clean).unwrap_or_default();
        rows.push(ManifestRow {
            line: index + 1,
            shipment_date: field(date_col),
            network_name: field(network_col),
            serial: field(serial_col),
        });
    }

    Ok(rows)
}

fn clean(value: &str) -> String {
    value.trim().trim_matches('"').trim().to_string()
}
