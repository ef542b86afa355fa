//! Named target presets loaded once at startup.

use serde_json::{Map, Value};
use tracing::warn;

use crate::protocol::TargetConfig;

/// Ordered, read-only set of target presets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRegistry {
    entries: Vec<(String, TargetConfig)>,
}

impl TargetRegistry {
    /// Parse a JSON object of `name -> TargetConfig`.
    ///
    /// Anything unreadable yields an empty registry; entries that are not objects
    /// are skipped. Declaration order is kept.
    pub fn from_json(raw: &str) -> Self {
        let object = match serde_json::from_str::<Map<String, Value>>(raw) {
            Ok(object) => object,
            Err(error) => {
                warn!("ignoring target configs: {}", error);
                return Self::default();
            }
        };

        let entries = object
            .into_iter()
            .filter_map(|(name, value)| {
                match serde_json::from_value::<TargetConfig>(value) {
                    Ok(config) => Some((name, config)),
                    Err(error) => {
                        warn!("skipping target config {}: {}", name, error);
                        None
                    }
                }
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Target names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&TargetConfig> {
        self.entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, config)| config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order() {
        let registry = TargetRegistry::from_json(
            r#"{
                "zeta": {"target_id": "z", "target_url": "ws://z:1/ws"},
                "alpha": {"target_id": "a", "target_url": "ws://a:1/ws", "api_base": "http://a:2"}
            }"#,
        );

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(
            registry.get("alpha"),
            Some(&TargetConfig {
                target_id: "a".to_string(),
                target_url: "ws://a:1/ws".to_string(),
                api_base: Some("http://a:2".to_string()),
            })
        );
    }

    #[test]
    fn invalid_json_gives_empty_registry() {
        assert!(TargetRegistry::from_json("{oops").is_empty());
        assert!(TargetRegistry::from_json("[1,2]").is_empty());
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let registry = TargetRegistry::from_json(
            r#"{"bad": 5, "good": {"target_id": "g"}}"#,
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("good").map(|config| config.target_url.as_str()),
            Some("")
        );
    }

    #[test]
    fn unknown_name_is_absent() {
        assert!(TargetRegistry::default().get("missing").is_none());
        assert!(TargetRegistry::from_json("{}").get("missing").is_none());
    }
}
