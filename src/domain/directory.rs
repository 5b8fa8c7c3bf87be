use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Prefix,
    Contains,
}

/// Maps caller ids to a pickup area. Rules are tried in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupRule {
    pub kind: MatchKind,
    pub pattern: String,
    pub area: String,
}

impl PickupRule {
    fn matches(&self, caller: &str) -> bool {
        match self.kind {
            MatchKind::Prefix => caller.starts_with(&self.pattern),
            MatchKind::Contains => caller.contains(&self.pattern),
        }
    }
}

/// Caller credentials and fulfilment details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    /// Caller id → password.
    pub users: HashMap<String, String>,
    #[serde(default)]
    pub addresses: HashMap<String, String>,
    pub default_address: String,
    /// Area → pickup point description.
    pub pickup_points: HashMap<String, String>,
    #[serde(default)]
    pub pickup_rules: Vec<PickupRule>,
    pub default_area: String,
}

impl Directory {
    pub fn authenticate(&self, caller: &str, password: &str) -> bool {
        self.users
            .get(caller)
            .is_some_and(|expected| expected == password)
    }

    pub fn delivery_address(&self, caller: &str) -> &str {
        self.addresses
            .get(caller)
            .map(String::as_str)
            .unwrap_or(self.default_address.as_str())
    }

    pub fn pickup_point(&self, caller: &str) -> &str {
        let area = self
            .pickup_rules
            .iter()
            .find(|rule| rule.matches(caller))
            .map(|rule| rule.area.as_str())
            .unwrap_or(self.default_area.as_str());
        self.pickup_points
            .get(area)
            .or_else(|| self.pickup_points.get(&self.default_area))
            .map(String::as_str)
            .unwrap_or(self.default_address.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Directory {
        Directory {
            users: HashMap::from([("1234567890".to_string(), "123".to_string())]),
            addresses: HashMap::from([(
                "1234567890".to_string(),
                "123 Main Street, Soweto".to_string(),
            )]),
            default_address: "Default Street".to_string(),
            pickup_points: HashMap::from([
                ("sandton".to_string(), "Sandton City".to_string()),
                ("midrand".to_string(), "Mall of Africa".to_string()),
                ("soweto".to_string(), "Soweto Mall".to_string()),
            ]),
            pickup_rules: vec![
                PickupRule {
                    kind: MatchKind::Prefix,
                    pattern: "098".to_string(),
                    area: "sandton".to_string(),
                },
                PickupRule {
                    kind: MatchKind::Contains,
                    pattern: "076".to_string(),
                    area: "midrand".to_string(),
                },
            ],
            default_area: "soweto".to_string(),
        }
    }

    #[test]
    fn test_authenticate() {
        let directory = directory();
        assert!(directory.authenticate("1234567890", "123"));
        assert!(!directory.authenticate("1234567890", "124"));
        assert!(!directory.authenticate("0000000000", "123"));
    }

    #[test]
    fn test_delivery_address_falls_back() {
        let directory = directory();
        assert_eq!(directory.delivery_address("1234567890"), "123 Main Street, Soweto");
        assert_eq!(directory.delivery_address("999"), "Default Street");
    }

    #[test]
    fn test_pickup_rules_in_order() {
        let directory = directory();
        assert_eq!(directory.pickup_point("0987654321"), "Sandton City");
        assert_eq!(directory.pickup_point("0980760000"), "Sandton City");
        assert_eq!(directory.pickup_point("1230761111"), "Mall of Africa");
        assert_eq!(directory.pickup_point("1111111111"), "Soweto Mall");
    }
}
