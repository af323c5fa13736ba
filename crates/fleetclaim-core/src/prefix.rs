//! Naming prefix parsing
//!
//! Canonical network names look like `US-ABC-P1-Acme Store`: a two-letter
//! country code, a three-character region code, an alphanumeric partner id
//! and a free-form remainder. The first three components form the stem of
//! every device name in the network.

use thiserror::Error;

/// Component delimiter in canonical network names
pub const DELIMITER: char = '-';

const MIN_COMPONENTS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixError {
    #[error("network name has {0} components, expected at least 4 (country-region-partner-name)")]
    TooFewComponents(usize),
    #[error("invalid country code '{0}': expected 2 letters")]
    InvalidCountry(String),
    #[error("invalid region code '{0}': expected 3 alphanumeric characters")]
    InvalidRegion(String),
    #[error("invalid partner id '{0}': expected alphanumeric characters")]
    InvalidPartner(String),
}

/// Validated `country-region-partner` naming prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPrefix {
    pub country: String,
    pub region: String,
    pub partner: String,
}

impl NamingPrefix {
    /// Parse and validate a canonical network name.
    ///
    /// The remainder after the partner id is required but never inspected.
    pub fn parse(network_name: &str) -> Result<Self, PrefixError> {
        let parts: Vec<&str> = network_name.split(DELIMITER).collect();
        if parts.len() < MIN_COMPONENTS {
            return Err(PrefixError::TooFewComponents(parts.len()));
        }

        let (country, region, partner) = (parts[0], parts[1], parts[2]);

        if country.chars().count() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PrefixError::InvalidCountry(country.to_string()));
        }
        if region.chars().count() != 3 || !region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PrefixError::InvalidRegion(region.to_string()));
        }
        if partner.is_empty() || !partner.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PrefixError::InvalidPartner(partner.to_string()));
        }

        Ok(Self {
            country: country.to_string(),
            region: region.to_string(),
            partner: partner.to_string(),
        })
    }

    /// The delimiter-joined stem used for device names
    pub fn stem(&self) -> String {
        format!(
            "{}{d}{}{d}{}",
            self.country,
            self.region,
            self.partner,
            d = DELIMITER
        )
    }
}

impl std::fmt::Display for NamingPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stem())
    }
}
