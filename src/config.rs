//! Provider options.
//!
//! Options are fixed when the provider is built. They can be written in code,
//! read from environment variables, or (with the `config` feature)
//! deserialized from JSON.

use std::env;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Execution strategy used to run call-site graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum ServiceProviderMode {
    /// Interprets the first resolution of a type, compiles it from the second on
    #[default]
    Dynamic,
    /// Interprets the graph on every resolution
    Runtime,
    /// Compiles the graph into closures on first resolution
    Compiled,
}

impl FromStr for ServiceProviderMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dynamic" => Ok(ServiceProviderMode::Dynamic),
            "runtime" => Ok(ServiceProviderMode::Runtime),
            "compiled" => Ok(ServiceProviderMode::Compiled),
            other => Err(format!("unknown provider mode '{other}'")),
        }
    }
}

/// Options applied when building a provider.
///
/// # Examples
///
/// ```rust
/// use callsite_di::{ServiceCollection, ServiceProviderMode, ServiceProviderOptions};
///
/// let options = ServiceProviderOptions::default()
///     .with_validate_on_build(true)
///     .with_validate_scopes(true)
///     .with_mode(ServiceProviderMode::Compiled);
///
/// let provider = ServiceCollection::new().build_with_options(options).unwrap();
/// assert_eq!(provider.options().mode, ServiceProviderMode::Compiled);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ServiceProviderOptions {
    /// Build every registration's graph while building the provider and
    /// fail with all problems found
    pub validate_on_build: bool,
    /// Reject singletons capturing scoped services and scoped services
    /// resolved from the root scope
    pub validate_scopes: bool,
    /// Execution strategy
    pub mode: ServiceProviderMode,
}

impl ServiceProviderOptions {
    /// Both validations enabled, as during development.
    pub fn validating() -> Self {
        Self {
            validate_on_build: true,
            validate_scopes: true,
            mode: ServiceProviderMode::default(),
        }
    }

    pub fn with_validate_on_build(mut self, enabled: bool) -> Self {
        self.validate_on_build = enabled;
        self
    }

    pub fn with_validate_scopes(mut self, enabled: bool) -> Self {
        self.validate_scopes = enabled;
        self
    }

    pub fn with_mode(mut self, mode: ServiceProviderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Reads `{PREFIX}_VALIDATE_ON_BUILD`, `{PREFIX}_VALIDATE_SCOPES` and
    /// `{PREFIX}_MODE`. Unset variables keep their defaults; unparsable ones
    /// are logged and ignored.
    pub fn from_env_with_prefix(prefix: &str) -> Self {
        let prefix = prefix.to_uppercase();
        let lookup = |name: &str| env::var(format!("{prefix}_{name}")).ok();
        let mut options = Self::default();

        if let Some(value) = lookup("VALIDATE_ON_BUILD") {
            match parse_flag(&value) {
                Some(flag) => options.validate_on_build = flag,
                None => warn!(value = %value, "ignoring invalid VALIDATE_ON_BUILD"),
            }
        }
        if let Some(value) = lookup("VALIDATE_SCOPES") {
            match parse_flag(&value) {
                Some(flag) => options.validate_scopes = flag,
                None => warn!(value = %value, "ignoring invalid VALIDATE_SCOPES"),
            }
        }
        if let Some(value) = lookup("MODE") {
            match value.parse() {
                Ok(mode) => options.mode = mode,
                Err(err) => warn!(error = %err, "ignoring invalid MODE"),
            }
        }
        options
    }

    /// Parses options from JSON. Missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ServiceProviderOptions::default();
        assert!(!options.validate_on_build);
        assert!(!options.validate_scopes);
        assert_eq!(options.mode, ServiceProviderMode::Dynamic);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Runtime".parse::<ServiceProviderMode>(), Ok(ServiceProviderMode::Runtime));
        assert_eq!(" compiled ".parse::<ServiceProviderMode>(), Ok(ServiceProviderMode::Compiled));
        assert!("emit".parse::<ServiceProviderMode>().is_err());
    }

    #[test]
    fn test_environment_source() {
        env::set_var("CSDI_TEST_VALIDATE_ON_BUILD", "yes");
        env::set_var("CSDI_TEST_VALIDATE_SCOPES", "maybe");
        env::set_var("CSDI_TEST_MODE", "runtime");

        let options = ServiceProviderOptions::from_env_with_prefix("csdi_test");
        assert!(options.validate_on_build);
        assert!(!options.validate_scopes);
        assert_eq!(options.mode, ServiceProviderMode::Runtime);

        env::remove_var("CSDI_TEST_VALIDATE_ON_BUILD");
        env::remove_var("CSDI_TEST_VALIDATE_SCOPES");
        env::remove_var("CSDI_TEST_MODE");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_json_source() {
        let options = ServiceProviderOptions::from_json(r#"{"validate_scopes": true, "mode": "compiled"}"#).unwrap();
        assert!(options.validate_scopes);
        assert!(!options.validate_on_build);
        assert_eq!(options.mode, ServiceProviderMode::Compiled);

        assert!(ServiceProviderOptions::from_json(r#"{"mode": "emit"}"#).is_err());
    }
}
