//! Naming and tagging policy

use serde::{Deserialize, Serialize};

/// Policy applied when naming and claiming devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingPolicy {
    /// Marker tag a network must carry before devices are named into it
    #[serde(default = "default_mandatory_tag")]
    pub mandatory_tag: String,
    /// Marker tag copied onto new devices when the network carries it
    #[serde(default = "default_optional_tag")]
    pub optional_tag: String,
    /// Tag applied to every newly claimed device
    #[serde(default = "default_new_device_tag")]
    pub new_device_tag: String,
    /// Device names this long or longer are rejected
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
    /// Highest progressive number that may be assigned
    #[serde(default = "default_max_progressive")]
    pub max_progressive: u32,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            mandatory_tag: default_mandatory_tag(),
            optional_tag: default_optional_tag(),
            new_device_tag: default_new_device_tag(),
            max_name_len: default_max_name_len(),
            max_progressive: default_max_progressive(),
        }
    }
}

fn default_mandatory_tag() -> String {
    "diagnostic".to_string()
}

fn default_optional_tag() -> String {
    "connectivity".to_string()
}

fn default_new_device_tag() -> String {
    "NEW-AP".to_string()
}

fn default_max_name_len() -> usize {
    50
}

fn default_max_progressive() -> u32 {
    99
}

impl NamingPolicy {
    /// Compose the device name for a stem and progressive number
    pub fn device_name(stem: &str, number: u32) -> String {
        format!("{}-AP{:02}-N", stem, number)
    }

    /// Whether networks must carry the mandatory marker tag
    pub fn requires_mandatory_tag(&self) -> bool {
        !self.mandatory_tag.trim().is_empty()
    }

    /// Tags applied to a claimed device, new-device marker first, no repeats
    pub fn claim_tags<'a>(&self, markers: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        push_unique(&mut tags, &self.new_device_tag);
        for tag in markers {
            push_unique(&mut tags, tag);
        }
        tags
    }
}

fn push_unique(tags: &mut Vec<String>, tag: &str) {
    let tag = tag.trim();
    if !tag.is_empty() && !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
        tags.push(tag.to_string());
    }
}
