//! Label selectors: `key=value,key2=value2`

use crate::error::{ChangesError, Result};
use std::collections::BTreeMap;

/// Every listed label must be present with exactly the given value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    labels: BTreeMap<String, String>,
}

impl Selector {
    pub fn parse(text: &str) -> Result<Self> {
        let mut labels = BTreeMap::new();
        for pair in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| ChangesError::InvalidSelector {
                selector: text.to_string(),
                reason: format!("{:?} is not key=value", pair),
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ChangesError::InvalidSelector {
                    selector: text.to_string(),
                    reason: format!("{:?} has an empty key", pair),
                });
            }
            labels.insert(key.to_string(), value.trim().to_string());
        }
        Ok(Self { labels })
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.labels.iter().all(|(k, v)| labels.get(k) == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_match() {
        let selector = Selector::parse("env=prod, os = linux").unwrap();
        let mut labels = BTreeMap::new();
        labels.insert("env".to_string(), "prod".to_string());
        assert!(!selector.matches(&labels));
        labels.insert("os".to_string(), "linux".to_string());
        assert!(selector.matches(&labels));
    }

    #[test]
    fn empty_selector_matches_everything() {
        let selector = Selector::parse("").unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&BTreeMap::new()));
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert!(matches!(
            Selector::parse("env"),
            Err(ChangesError::InvalidSelector { .. })
        ));
        assert!(Selector::parse("=prod").is_err());
    }
}
