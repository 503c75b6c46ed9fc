//! Settings that control how the catalog validates and deletes categories.

use serde::{Deserialize, Serialize};

use crate::{Error, category::DeletePolicy};

/// The default maximum depth of the category forest, where a root has depth 1.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// The largest accepted maximum depth.
pub const MAX_ALLOWED_DEPTH: usize = 10_000;

/// Runtime settings for a [Catalog](crate::Catalog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// The deepest a category may sit in its tree.
    ///
    /// Ancestor walks and subtree traversals never go further than this, which
    /// bounds how long the database lock is held.
    pub max_depth: usize,

    /// The policy used when a caller does not name one explicitly.
    pub delete_policy: DeletePolicy,
}

impl CatalogConfig {
    /// Check that the settings are usable.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if `max_depth` is zero or greater than
    /// [MAX_ALLOWED_DEPTH].
    pub fn validate(self) -> Result<Self, Error> {
        if self.max_depth == 0 {
            return Err(Error::InvalidConfig("max_depth must be at least 1"));
        }

        if self.max_depth > MAX_ALLOWED_DEPTH {
            return Err(Error::InvalidConfig("max_depth must be at most 10000"));
        }

        Ok(self)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            delete_policy: DeletePolicy::Reparent,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, category::DeletePolicy};

    use super::{CatalogConfig, DEFAULT_MAX_DEPTH, MAX_ALLOWED_DEPTH};

    #[test]
    fn default_reparents_and_uses_default_depth() {
        let config = CatalogConfig::default();

        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.delete_policy, DeletePolicy::Reparent);
    }

    #[test]
    fn validate_rejects_zero_depth() {
        let config = CatalogConfig {
            max_depth: 0,
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_huge_depth() {
        let huge = CatalogConfig {
            max_depth: usize::MAX,
            ..Default::default()
        };
        let largest = CatalogConfig {
            max_depth: MAX_ALLOWED_DEPTH,
            ..Default::default()
        };

        assert!(matches!(huge.validate(), Err(Error::InvalidConfig(_))));
        assert_eq!(largest.validate(), Ok(largest));
    }

    #[test]
    fn deserialized_huge_depth_is_rejected() {
        let config: CatalogConfig = serde_json::from_str(r#"{"max_depth": 20000}"#).unwrap();

        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: CatalogConfig = serde_json::from_str(r#"{"delete_policy": "cascade"}"#).unwrap();

        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.delete_policy, DeletePolicy::Cascade);
    }
}
