//! Free-text network name resolution

use crate::snapshot::NetworkRecord;

/// Find the networks a manifest network name refers to.
///
/// A single case-insensitive exact match wins outright. Otherwise every
/// network whose name starts with the candidate (case-insensitive) is
/// returned; the caller treats zero as "not found" and several as an
/// ambiguous overlap. A blank candidate matches nothing.
pub fn find_network_matches<'a>(
    candidate: &str,
    networks: &'a [NetworkRecord],
) -> Vec<&'a NetworkRecord> {
    let candidate = candidate.trim().to_lowercase();
    if candidate.is_empty() {
        return Vec::new();
    }

    let exact: Vec<&NetworkRecord> = networks
        .iter()
        .filter(|n| n.network_name.to_lowercase() == candidate)
        .collect();
    if exact.len() == 1 {
        return exact;
    }

    networks
        .iter()
        .filter(|n| n.network_name.to_lowercase().starts_with(&candidate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(id: &str, name: &str) -> NetworkRecord {
        NetworkRecord {
            org_id: "1".to_string(),
            org_name: "Org".to_string(),
            network_id: id.to_string(),
            network_name: name.to_string(),
        }
    }

    fn ids(matches: &[&NetworkRecord]) -> Vec<String> {
        matches.iter().map(|n| n.network_id.clone()).collect()
    }

    #[test]
    fn test_prefix_overlap_is_ambiguous() {
        let networks = vec![net("E", "Store12-East"), net("W", "Store12-West")];
        assert_eq!(ids(&find_network_matches("Store12", &networks)), vec!["E", "W"]);
    }

    #[test]
    fn test_exact_match_wins() {
        let networks = vec![net("E", "Store12-East"), net("S", "Store12")];
        assert_eq!(ids(&find_network_matches("store12", &networks)), vec!["S"]);
    }

    #[test]
    fn test_truncated_name_resolves() {
        let networks = vec![net("A", "US-ABC-P1-Acme Downtown"), net("B", "US-ABC-P2-Other")];
        assert_eq!(ids(&find_network_matches("us-abc-p1-acme", &networks)), vec!["A"]);
    }

    #[test]
    fn test_duplicate_exact_names_fall_through() {
        // Same name in two organizations: both match the prefix tier too
        let networks = vec![net("A", "Shop"), net("B", "Shop")];
        assert_eq!(find_network_matches("Shop", &networks).len(), 2);
    }

    #[test]
    fn test_blank_candidate_matches_nothing() {
        let networks = vec![net("A", "US-ABC-P1-Acme")];
        assert!(find_network_matches("", &networks).is_empty());
        assert!(find_network_matches("   ", &networks).is_empty());
    }

    #[test]
    fn test_no_match() {
        let networks = vec![net("A", "Shop")];
        assert!(find_network_matches("Warehouse", &networks).is_empty());
    }
}
