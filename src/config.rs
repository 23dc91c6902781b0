//! Bind options and file-based configuration
//!
//! [`BindOptions`] is what [`crate::Engine::bind`] consumes. [`BindConfig`]
//! is its serializable subset, loadable from YAML:
//!
//! ```yaml
//! attr_prefix: app          # app-scope, app-text, ...
//! duplicate_scopes: reject  # warn (default) | reject
//! timings: true
//! ```

use std::path::Path;

use anyhow::{Context as _, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::BindError;

/// Attribute prefix used when none is configured
pub const DEFAULT_ATTR_PREFIX: &str = "binded";

/// Binder kind marking scope boundaries
pub const SCOPE_KIND: &str = "scope";

static PREFIX_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{0,32}$").unwrap());

/// What to do when two scopes register the same alias in one parent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateScopePolicy {
    /// Log a warning, last registration wins
    #[default]
    Warn,
    /// Abort the bind with `DuplicateScope`
    Reject,
}

/// Options for one bind pass
#[derive(Clone, Default)]
pub struct BindOptions {
    pub context: Context,
    pub attr_prefix: Option<String>,
    pub duplicate_scopes: DuplicateScopePolicy,
    pub timings: bool,
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.attr_prefix = Some(prefix.into());
        self
    }

    pub fn with_duplicate_scopes(mut self, policy: DuplicateScopePolicy) -> Self {
        self.duplicate_scopes = policy;
        self
    }

    pub fn with_timings(mut self, timings: bool) -> Self {
        self.timings = timings;
        self
    }

    /// Effective prefix (configured or default)
    pub fn prefix(&self) -> &str {
        self.attr_prefix.as_deref().unwrap_or(DEFAULT_ATTR_PREFIX)
    }

    /// Check the prefix against `^[a-z]{0,32}$`
    pub fn validate(&self) -> Result<(), BindError> {
        let prefix = self.prefix();
        if !PREFIX_PATTERN.is_match(prefix) {
            return Err(BindError::InvalidPrefix {
                prefix: prefix.to_string(),
            });
        }
        Ok(())
    }

    /// Attribute carrying scope boundaries (`<prefix>-scope`)
    pub fn scope_attribute(&self) -> String {
        attribute_name(self.prefix(), SCOPE_KIND)
    }
}

/// `<prefix>-<kind>`, or just `<kind>` for an empty prefix
pub fn attribute_name(prefix: &str, kind: &str) -> String {
    if prefix.is_empty() {
        kind.to_string()
    } else {
        format!("{prefix}-{kind}")
    }
}

/// `<prefix><Kind>` (e.g. `bindedText`), or just `<kind>` for an empty prefix
pub fn property_name(prefix: &str, kind: &str) -> String {
    if prefix.is_empty() {
        return kind.to_string();
    }
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => format!("{prefix}{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => prefix.to_string(),
    }
}

/// Serializable subset of [`BindOptions`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BindConfig {
    pub attr_prefix: Option<String>,
    pub duplicate_scopes: DuplicateScopePolicy,
    pub timings: bool,
}

impl BindConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).with_context(|| "Failed to parse bind config YAML")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bind config from {:?}", path))?;
        Self::from_yaml(&yaml).with_context(|| format!("Invalid bind config in {:?}", path))
    }

    /// Combine with a (non-serializable) handler context
    pub fn into_options(self, context: Context) -> BindOptions {
        BindOptions {
            context,
            attr_prefix: self.attr_prefix,
            duplicate_scopes: self.duplicate_scopes,
            timings: self.timings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_prefix() {
        let options = BindOptions::new();
        assert_eq!(options.prefix(), "binded");
        assert_eq!(options.scope_attribute(), "binded-scope");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn prefix_validation() {
        assert!(BindOptions::new().with_prefix("app").validate().is_ok());
        assert!(BindOptions::new().with_prefix("").validate().is_ok());
        assert!(BindOptions::new().with_prefix("a".repeat(32)).validate().is_ok());

        for bad in ["App", "app-x", "a1", "a".repeat(33).as_str()] {
            let err = BindOptions::new().with_prefix(bad).validate().unwrap_err();
            assert!(matches!(err, BindError::InvalidPrefix { .. }), "{bad}");
        }
    }

    #[test]
    fn names_from_prefix() {
        assert_eq!(attribute_name("binded", "text"), "binded-text");
        assert_eq!(attribute_name("", "text"), "text");
        assert_eq!(property_name("binded", "text"), "bindedText");
        assert_eq!(property_name("", "text"), "text");
    }

    #[test]
    fn config_from_yaml() {
        let config = BindConfig::from_yaml(
            "attr_prefix: app\nduplicate_scopes: reject\ntimings: true\n",
        )
        .unwrap();
        assert_eq!(config.attr_prefix.as_deref(), Some("app"));
        assert_eq!(config.duplicate_scopes, DuplicateScopePolicy::Reject);
        assert!(config.timings);

        let options = config.into_options(Context::new());
        assert_eq!(options.prefix(), "app");
    }

    #[test]
    fn config_defaults_and_unknown_fields() {
        let config = BindConfig::from_yaml("{}").unwrap();
        assert_eq!(config, BindConfig::default());
        assert!(BindConfig::from_yaml("prefix: app").is_err());
    }

    #[test]
    fn config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "duplicate_scopes: warn").unwrap();
        let config = BindConfig::from_file(file.path()).unwrap();
        assert_eq!(config.duplicate_scopes, DuplicateScopePolicy::Warn);

        let err = BindConfig::from_file(Path::new("/nonexistent/bind.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read bind config"));
    }
}
